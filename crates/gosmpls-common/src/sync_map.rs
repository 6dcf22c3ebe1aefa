//! Ordered map wrapper that never creates entries implicitly.
//!
//! Node tables are scanned once per tick and entries are dropped while the
//! scan runs. `SyncMap` keeps that pattern explicit:
//!
//! - `get()` / `get_mut()` never create entries
//! - creation only goes through `insert()`
//! - `retain()` visits every entry exactly once and may drop any of them
//!
//! Iteration follows key order so a simulation run is reproducible.

use std::collections::BTreeMap;

/// An ordered map wrapper that prevents auto-vivification.
///
/// # Example
///
/// ```
/// use gosmpls_common::SyncMap;
///
/// let mut map: SyncMap<u32, i32> = SyncMap::new();
///
/// // get() returns None for missing keys (doesn't create entry)
/// assert!(map.get(&7).is_none());
///
/// // Must explicitly insert
/// map.insert(7, 42);
/// assert_eq!(map.get(&7), Some(&42));
/// ```
#[derive(Debug, Clone)]
pub struct SyncMap<K, V> {
    inner: BTreeMap<K, V>,
}

impl<K, V> SyncMap<K, V>
where
    K: Ord,
{
    /// Creates a new empty map.
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns true if the map contains the given key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns a reference to the value for the given key.
    ///
    /// **This never creates entries.**
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Returns a mutable reference to the value for the given key.
    ///
    /// **This never creates entries.**
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// Returns the old value if the key was already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    /// Removes a key from the map.
    ///
    /// Removing an absent key is a no-op returning `None`.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key)
    }

    /// Clears all entries from the map.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Returns an iterator over key-value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }

    /// Returns a mutable iterator over values in key order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.inner.values_mut()
    }

    /// Returns the first value matching `predicate`, in key order.
    pub fn find(&self, mut predicate: impl FnMut(&V) -> bool) -> Option<(&K, &V)> {
        self.inner.iter().find(|(_, v)| predicate(v))
    }

    /// Visits every entry once with mutable access, keeping those for which
    /// `f` returns true.
    ///
    /// Entries dropped by `f` are removed without disturbing the visit of the
    /// remaining ones: nothing is skipped and nothing is visited twice.
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.inner.retain(f);
    }
}

impl<K, V> Default for SyncMap<K, V>
where
    K: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for SyncMap<K, V>
where
    K: Ord,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}
