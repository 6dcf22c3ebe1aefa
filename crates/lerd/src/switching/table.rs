//! Switching table.

use log::debug;

use gosmpls_common::{IdGenerator, SyncMap};
use gosmpls_types::MplsLabel;

use crate::error::{LerError, Result};
use crate::ports::PortId;

use super::types::{EntryKey, EntryKind, SwitchingEntry};

/// Stable handle of an entry, valid until the entry is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

/// Forwarding state of a node.
///
/// Entries live in an id-keyed arena so an entry keeps its handle while
/// its upstream-facing label is still unknown; a secondary index maps
/// (port, label-or-FEC, kind) to the handle once the value is bound.
/// Exclusive access comes from `&mut self`.
#[derive(Debug)]
pub struct SwitchingTable {
    entries: SyncMap<EntryId, SwitchingEntry>,
    index: SyncMap<EntryKey, EntryId>,
    entry_ids: IdGenerator<u64>,
    labels: IdGenerator<u32>,
}

impl SwitchingTable {
    pub fn new() -> Self {
        Self {
            entries: SyncMap::new(),
            index: SyncMap::new(),
            entry_ids: IdGenerator::new(),
            labels: IdGenerator::with_range(MplsLabel::FIRST_ASSIGNABLE, MplsLabel::MAX),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts an entry. At most one entry may exist per key.
    pub fn insert(&mut self, entry: SwitchingEntry) -> Result<EntryId> {
        if let Some(key) = entry.key() {
            if self.index.contains_key(&key) {
                return Err(LerError::DuplicateEntry(key));
            }
        }
        let id = EntryId(
            self.entry_ids
                .next_id()
                .map_err(|_| LerError::IdExhausted("switching entry"))?,
        );
        if let Some(key) = entry.key() {
            self.index.insert(key, id);
        }
        debug!("switching entry {:?} inserted: {:?}", id, entry.key());
        self.entries.insert(id, entry);
        Ok(id)
    }

    pub fn lookup(&self, port: PortId, label_or_fec: u32, kind: EntryKind) -> Option<EntryId> {
        self.index
            .get(&EntryKey::new(port, label_or_fec, kind))
            .copied()
    }

    /// Finds the entry created for an upstream session arriving on `port`.
    pub fn lookup_by_upstream_session(&self, session: u32, port: PortId) -> Option<EntryId> {
        self.entries
            .find(|e| e.upstream_session == Some(session) && e.incoming_port == port)
            .map(|(id, _)| *id)
    }

    /// Finds the entry owning a local session.
    pub fn lookup_by_local_session(&self, session: u32) -> Option<EntryId> {
        self.entries
            .find(|e| e.local_session == session)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, id: EntryId) -> Option<&SwitchingEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut SwitchingEntry> {
        self.entries.get_mut(&id)
    }

    /// Removes an entry. Removing an absent entry is a no-op.
    pub fn remove(&mut self, id: EntryId) -> Option<SwitchingEntry> {
        let entry = self.entries.remove(&id)?;
        if let Some(key) = entry.key() {
            self.index.remove(&key);
        }
        Some(entry)
    }

    /// Removes the entry stored under a key. Absent keys are a no-op.
    pub fn remove_key(&mut self, port: PortId, label_or_fec: u32, kind: EntryKind) -> Option<SwitchingEntry> {
        let id = self.lookup(port, label_or_fec, kind)?;
        self.remove(id)
    }

    /// Visits every entry once, removing those for which `f` returns false.
    ///
    /// `f` may freely mutate the entry it is given, except for its key
    /// fields.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(EntryId, &mut SwitchingEntry) -> bool,
    {
        let mut dropped = Vec::new();
        self.entries.retain(|id, entry| {
            let keep = f(*id, entry);
            if !keep {
                dropped.extend(entry.key());
            }
            keep
        });
        for key in dropped {
            self.index.remove(&key);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &SwitchingEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    /// Allocates a fresh local label.
    pub fn new_label(&mut self) -> Result<MplsLabel> {
        let value = self
            .labels
            .next_id()
            .map_err(|_| LerError::IdExhausted("label"))?;
        MplsLabel::assignable(value).map_err(|_| LerError::IdExhausted("label"))
    }

    /// Gives an entry its upstream-facing label if it has none yet.
    ///
    /// Returns the entry's label-or-FEC value.
    pub fn bind_local_label(&mut self, id: EntryId) -> Result<u32> {
        let current = self
            .entries
            .get(&id)
            .ok_or(LerError::EntryNotFound(id))?
            .label_or_fec;
        if let Some(value) = current {
            return Ok(value);
        }
        let value = self.new_label()?.as_u32();
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.label_or_fec = Some(value);
            if let Some(key) = entry.key() {
                self.index.insert(key, id);
            }
        }
        Ok(value)
    }

    /// Drops every entry and restarts the label counter.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.entry_ids.reset();
        self.labels.reset();
    }
}

impl Default for SwitchingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switching::{LabelStackOp, LabelState};
    use gosmpls_types::Ipv4Address;
    use pretty_assertions::assert_eq;

    fn entry(port: PortId, value: Option<u32>, session: u32) -> SwitchingEntry {
        let mut e = SwitchingEntry::new(
            EntryKind::Label,
            port,
            LabelStackOp::Swap,
            Ipv4Address::new(10, 0, 2, 1),
            session,
        );
        e.label_or_fec = value;
        e
    }

    #[test]
    fn test_insert_lookup_remove() {
        let mut table = SwitchingTable::new();
        let id = table.insert(entry(1, Some(20), 1)).unwrap();

        assert_eq!(table.lookup(1, 20, EntryKind::Label), Some(id));
        assert_eq!(table.lookup(1, 20, EntryKind::Fec), None);
        assert_eq!(table.lookup(2, 20, EntryKind::Label), None);

        assert!(table.remove_key(1, 20, EntryKind::Label).is_some());
        assert!(table.is_empty());
        // idempotent
        assert!(table.remove_key(1, 20, EntryKind::Label).is_none());
        assert!(table.remove(id).is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut table = SwitchingTable::new();
        table.insert(entry(1, Some(20), 1)).unwrap();
        let err = table.insert(entry(1, Some(20), 2)).unwrap_err();
        assert_eq!(err, LerError::DuplicateEntry(EntryKey::new(1, 20, EntryKind::Label)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unbound_entries_coexist() {
        let mut table = SwitchingTable::new();
        let a = table.insert(entry(1, None, 1)).unwrap();
        let b = table.insert(entry(1, None, 2)).unwrap();
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_session_lookups() {
        let mut table = SwitchingTable::new();
        let mut e = entry(3, None, 7);
        e.upstream_session = Some(42);
        let id = table.insert(e).unwrap();

        assert_eq!(table.lookup_by_upstream_session(42, 3), Some(id));
        assert_eq!(table.lookup_by_upstream_session(42, 4), None);
        assert_eq!(table.lookup_by_local_session(7), Some(id));
        assert_eq!(table.lookup_by_local_session(42), None);
    }

    #[test]
    fn test_labels_start_above_reserved_range() {
        let mut table = SwitchingTable::new();
        assert_eq!(table.new_label().unwrap().as_u32(), 16);
        assert_eq!(table.new_label().unwrap().as_u32(), 17);
        table.reset();
        assert_eq!(table.new_label().unwrap().as_u32(), 16);
    }

    #[test]
    fn test_bind_local_label_indexes_entry() {
        let mut table = SwitchingTable::new();
        let id = table.insert(entry(2, None, 1)).unwrap();

        let value = table.bind_local_label(id).unwrap();
        assert_eq!(value, 16);
        assert_eq!(table.lookup(2, 16, EntryKind::Label), Some(id));
        // already bound: unchanged
        assert_eq!(table.bind_local_label(id).unwrap(), 16);
    }

    #[test]
    fn test_retain_removes_during_scan() {
        let mut table = SwitchingTable::new();
        for i in 0..6u32 {
            table.insert(entry(1, Some(16 + i), i)).unwrap();
        }

        let mut visited = 0;
        table.retain(|_, e| {
            visited += 1;
            if e.local_session % 2 == 0 {
                return false;
            }
            e.outgoing_label = LabelState::Requested;
            true
        });

        assert_eq!(visited, 6);
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup(1, 16, EntryKind::Label), None);
        let kept = table.lookup(1, 17, EntryKind::Label).unwrap();
        assert_eq!(table.get(kept).unwrap().outgoing_label, LabelState::Requested);
    }
}
