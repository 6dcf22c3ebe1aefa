//! Table of outstanding retransmission requests.

use gosmpls_common::SyncMap;
use gosmpls_types::Ipv4Address;

use crate::pdu::MplsPdu;
use crate::ports::PortId;

use super::types::RecoveryRequestEntry;

/// A request due for retransmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRetransmission {
    pub flow_id: u32,
    pub packet_id: u32,
    pub target: Ipv4Address,
    pub outgoing_port: PortId,
}

/// Outstanding retransmission requests of a node.
#[derive(Debug)]
pub struct RecoveryTable {
    entries: SyncMap<(u32, u32), RecoveryRequestEntry>,
    timeout_ns: u64,
    attempts: u32,
}

impl RecoveryTable {
    pub fn new(timeout_ns: u64, attempts: u32) -> Self {
        Self {
            entries: SyncMap::new(),
            timeout_ns,
            attempts,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers a request for a lost GoS packet.
    ///
    /// Returns `None` for packets without GoS options and for packets
    /// already being recovered.
    pub fn add_entry(&mut self, packet: &MplsPdu, outgoing_port: PortId) -> Option<&RecoveryRequestEntry> {
        let gos = packet.header.gos.as_ref()?;
        let key = (gos.flow_id, gos.packet_id);
        if self.entries.contains_key(&key) {
            return None;
        }
        let entry = RecoveryRequestEntry::new(
            gos.flow_id,
            gos.packet_id,
            outgoing_port,
            gos.crossed_active_nodes.clone(),
            self.timeout_ns,
            self.attempts,
        );
        self.entries.insert(key, entry);
        self.entries.get(&key)
    }

    pub fn get(&self, flow_id: u32, packet_id: u32) -> Option<&RecoveryRequestEntry> {
        self.entries.get(&(flow_id, packet_id))
    }

    pub fn get_mut(&mut self, flow_id: u32, packet_id: u32) -> Option<&mut RecoveryRequestEntry> {
        self.entries.get_mut(&(flow_id, packet_id))
    }

    /// Removes an entry. Absent entries are a no-op.
    pub fn remove(&mut self, flow_id: u32, packet_id: u32) -> Option<RecoveryRequestEntry> {
        self.entries.remove(&(flow_id, packet_id))
    }

    /// Drops every request leaving through `port`.
    pub fn remove_for_port(&mut self, port: PortId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.outgoing_port != port);
        before - self.entries.len()
    }

    pub fn decrease_timeout(&mut self, ns: u64) {
        for entry in self.entries.values_mut() {
            entry.decrease_timeout(ns);
        }
    }

    /// Purges exhausted requests and returns those due for retransmission,
    /// with their timer rearmed and an attempt consumed.
    pub fn update_entries(&mut self) -> Vec<PendingRetransmission> {
        let mut due = Vec::new();
        self.entries.retain(|_, entry| {
            if !entry.timed_out() {
                return true;
            }
            if entry.is_purgeable() {
                return false;
            }
            let Some(target) = entry.crossed_node() else {
                return false;
            };
            entry.consume_attempt();
            due.push(PendingRetransmission {
                flow_id: entry.flow_id,
                packet_id: entry.packet_id,
                target,
                outgoing_port: entry.outgoing_port,
            });
            true
        });
        due
    }

    pub fn set_retries(&mut self, timeout_ns: u64, attempts: u32) {
        self.timeout_ns = timeout_ns;
        self.attempts = attempts;
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
