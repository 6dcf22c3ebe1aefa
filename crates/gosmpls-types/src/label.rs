//! MPLS label type with validation.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 20-bit MPLS label value (0-1048575).
///
/// Labels 0-15 are reserved for control purposes. Label 1 is used in a
/// GoS domain as the marker pushed on top of packets that ask for
/// Guarantee of Service. Values from 16 upwards can be assigned by label
/// distribution.
///
/// # Examples
///
/// ```
/// use gosmpls_types::MplsLabel;
///
/// let label = MplsLabel::new(16).unwrap();
/// assert!(label.is_assignable());
///
/// assert!(MplsLabel::GOS_MARKER.is_reserved());
/// assert!(MplsLabel::new(1 << 20).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct MplsLabel(u32);

impl MplsLabel {
    /// Largest encodable label value.
    pub const MAX: u32 = 1_048_575;

    /// First value that label distribution may hand out.
    pub const FIRST_ASSIGNABLE: u32 = 16;

    /// Reserved label pushed on top of GoS packets.
    pub const GOS_MARKER: MplsLabel = MplsLabel(1);

    /// Creates a new label.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not fit in 20 bits.
    pub const fn new(value: u32) -> Result<Self, ParseError> {
        if value <= Self::MAX {
            Ok(MplsLabel(value))
        } else {
            Err(ParseError::InvalidLabel(value))
        }
    }

    /// Creates an assignable label, rejecting the reserved range.
    pub const fn assignable(value: u32) -> Result<Self, ParseError> {
        if value >= Self::FIRST_ASSIGNABLE && value <= Self::MAX {
            Ok(MplsLabel(value))
        } else {
            Err(ParseError::InvalidLabel(value))
        }
    }

    /// Returns the label as a u32.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns true for the reserved control range (0-15).
    pub const fn is_reserved(&self) -> bool {
        self.0 < Self::FIRST_ASSIGNABLE
    }

    /// Returns true if this label may be handed out by label distribution.
    pub const fn is_assignable(&self) -> bool {
        !self.is_reserved()
    }

    /// Returns true if this is the GoS marker label.
    pub const fn is_gos_marker(&self) -> bool {
        self.0 == Self::GOS_MARKER.0
    }
}

impl fmt::Display for MplsLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MplsLabel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidLabel(u32::MAX))?;
        MplsLabel::new(value)
    }
}

impl TryFrom<u32> for MplsLabel {
    type Error = ParseError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        MplsLabel::new(value)
    }
}

impl From<MplsLabel> for u32 {
    fn from(label: MplsLabel) -> u32 {
        label.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_labels() {
        assert!(MplsLabel::new(0).is_ok());
        assert!(MplsLabel::new(16).is_ok());
        assert!(MplsLabel::new(MplsLabel::MAX).is_ok());
    }

    #[test]
    fn test_invalid_labels() {
        assert!(MplsLabel::new(MplsLabel::MAX + 1).is_err());
        assert!(MplsLabel::new(u32::MAX).is_err());
    }

    #[test]
    fn test_reserved_range() {
        for value in 0..16 {
            assert!(MplsLabel::new(value).unwrap().is_reserved());
            assert!(MplsLabel::assignable(value).is_err());
        }
        assert!(MplsLabel::assignable(16).unwrap().is_assignable());
    }

    #[test]
    fn test_gos_marker() {
        assert!(MplsLabel::GOS_MARKER.is_gos_marker());
        assert_eq!(MplsLabel::GOS_MARKER.as_u32(), 1);
        assert!(!MplsLabel::new(16).unwrap().is_gos_marker());
    }

    #[test]
    fn test_parse() {
        let label: MplsLabel = "1024".parse().unwrap();
        assert_eq!(label.as_u32(), 1024);
        assert!("abc".parse::<MplsLabel>().is_err());
    }

    #[test]
    fn test_ordering() {
        let l1 = MplsLabel::new(20).unwrap();
        let l2 = MplsLabel::new(30).unwrap();
        assert!(l1 < l2);
    }
}
