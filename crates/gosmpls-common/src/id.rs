//! Per-node identifier generators.
//!
//! Every node owns its own generators (packet ids, event ids, signaling
//! session ids). They are handed to the node at construction and reset with
//! it, so two nodes never share counters.

use thiserror::Error;

/// Error returned when a generator has no identifiers left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("identifier space exhausted")]
    Exhausted,
}

/// Integer types usable as identifiers.
pub trait IdValue: Copy + PartialEq + std::fmt::Debug {
    /// First identifier handed out.
    const FIRST: Self;
    /// Last identifier handed out.
    const LAST: Self;

    /// Returns the successor, or `None` past [`IdValue::LAST`].
    fn successor(self) -> Option<Self>;
}

macro_rules! impl_id_value {
    ($($ty:ty),*) => {
        $(
            impl IdValue for $ty {
                const FIRST: Self = 1;
                const LAST: Self = <$ty>::MAX;

                fn successor(self) -> Option<Self> {
                    self.checked_add(1)
                }
            }
        )*
    };
}

impl_id_value!(u16, u32, u64);

/// Monotonic identifier generator.
///
/// By default identifier 0 is never handed out so it can stand for "no id"
/// on the wire. Once [`IdValue::LAST`] has been returned every further call fails
/// with [`IdError::Exhausted`] until [`IdGenerator::reset`] is called.
#[derive(Debug, Clone)]
pub struct IdGenerator<T: IdValue> {
    first: T,
    next: Option<T>,
    last: T,
}

impl<T: IdValue> IdGenerator<T> {
    /// Creates a generator covering the whole value range.
    pub fn new() -> Self {
        Self::with_last(T::LAST)
    }

    /// Creates a generator that stops after `last`.
    pub fn with_last(last: T) -> Self {
        Self::with_range(T::FIRST, last)
    }

    /// Creates a generator handing out `first..=last`.
    pub fn with_range(first: T, last: T) -> Self {
        Self {
            first,
            next: Some(first),
            last,
        }
    }

    /// Returns the next identifier.
    pub fn next_id(&mut self) -> Result<T, IdError> {
        let current = self.next.ok_or(IdError::Exhausted)?;
        self.next = if current == self.last {
            None
        } else {
            current.successor()
        };
        Ok(current)
    }

    /// Returns true if no identifiers remain.
    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// Restarts the generator from the first identifier.
    pub fn reset(&mut self) {
        self.next = Some(self.first);
    }
}

impl<T: IdValue> Default for IdGenerator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ids_start_at_one() {
        let mut ids: IdGenerator<u32> = IdGenerator::new();
        assert_eq!(ids.next_id().unwrap(), 1);
        assert_eq!(ids.next_id().unwrap(), 2);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let mut ids: IdGenerator<u16> = IdGenerator::with_last(3);
        assert_eq!(ids.next_id().unwrap(), 1);
        assert_eq!(ids.next_id().unwrap(), 2);
        assert_eq!(ids.next_id().unwrap(), 3);
        assert!(ids.is_exhausted());
        assert_eq!(ids.next_id(), Err(IdError::Exhausted));
        assert_eq!(ids.next_id(), Err(IdError::Exhausted));
    }

    #[test]
    fn test_type_max_is_last_id() {
        let mut ids: IdGenerator<u16> = IdGenerator::with_last(u16::MAX);
        ids.next = Some(u16::MAX);
        assert_eq!(ids.next_id().unwrap(), u16::MAX);
        assert!(ids.next_id().is_err());
    }

    #[test]
    fn test_custom_range() {
        let mut ids: IdGenerator<u32> = IdGenerator::with_range(16, 17);
        assert_eq!(ids.next_id().unwrap(), 16);
        assert_eq!(ids.next_id().unwrap(), 17);
        assert!(ids.next_id().is_err());
        ids.reset();
        assert_eq!(ids.next_id().unwrap(), 16);
    }

    #[test]
    fn test_reset() {
        let mut ids: IdGenerator<u64> = IdGenerator::with_last(1);
        ids.next_id().unwrap();
        assert!(ids.next_id().is_err());
        ids.reset();
        assert_eq!(ids.next_id().unwrap(), 1);
    }
}
