//! Local packet cache of GoS packets (DMGP).
//!
//! Active nodes keep a copy of the GoS packets they forward so a downstream
//! node that loses one can ask for a retransmission.

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::pdu::MplsPdu;

/// Bounded FIFO store of MPLS GoS packets keyed by (flow id, packet id).
#[derive(Debug, Clone)]
pub struct LocalPacketCache {
    capacity_octets: u64,
    occupied_octets: u64,
    order: VecDeque<(u32, u32)>,
    packets: HashMap<(u32, u32), MplsPdu>,
}

impl LocalPacketCache {
    pub fn new(size_kb: u32) -> Self {
        Self {
            capacity_octets: u64::from(size_kb) * 1024,
            occupied_octets: 0,
            order: VecDeque::new(),
            packets: HashMap::new(),
        }
    }

    /// Stores a copy of a GoS packet, evicting the oldest ones as needed.
    ///
    /// Returns false if the packet is not a GoS packet or cannot fit even in
    /// an empty cache.
    pub fn put(&mut self, packet: MplsPdu) -> bool {
        let Some(key) = packet.gos_key() else {
            return false;
        };
        let size = u64::from(packet.size());
        if size > self.capacity_octets {
            debug!("packet {:?} larger than the whole cache, not stored", key);
            return false;
        }
        self.remove(&key);
        while self.occupied_octets + size > self.capacity_octets {
            if !self.evict_oldest() {
                break;
            }
        }
        self.occupied_octets += size;
        self.order.push_back(key);
        self.packets.insert(key, packet);
        true
    }

    /// Returns a copy of a cached packet.
    pub fn get(&self, flow_id: u32, packet_id: u32) -> Option<MplsPdu> {
        self.packets.get(&(flow_id, packet_id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn occupied_octets(&self) -> u64 {
        self.occupied_octets
    }

    /// Changes the capacity, evicting the oldest packets if it shrinks.
    pub fn set_size_kb(&mut self, size_kb: u32) {
        self.capacity_octets = u64::from(size_kb) * 1024;
        while self.occupied_octets > self.capacity_octets {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    pub fn reset(&mut self) {
        self.order.clear();
        self.packets.clear();
        self.occupied_octets = 0;
    }

    fn remove(&mut self, key: &(u32, u32)) {
        if let Some(old) = self.packets.remove(key) {
            self.occupied_octets -= u64::from(old.size());
            self.order.retain(|k| k != key);
        }
    }

    fn evict_oldest(&mut self) -> bool {
        let Some(key) = self.order.pop_front() else {
            return false;
        };
        if let Some(old) = self.packets.remove(&key) {
            self.occupied_octets -= u64::from(old.size());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{GosOptions, Ipv4Header, Ipv4Pdu};
    use gosmpls_types::{GosLevel, Ipv4Address, MplsLabel};
    use pretty_assertions::assert_eq;

    // 20 header + 12 options + 4 label + payload
    fn packet(packet_id: u32, payload: u32) -> MplsPdu {
        let header = Ipv4Header::new(Ipv4Address::new(10, 0, 0, 1), Ipv4Address::new(10, 0, 0, 2))
            .with_gos(GosOptions::new(GosLevel::BEST_EFFORT, 1, packet_id));
        let ip = Ipv4Pdu::new(u64::from(packet_id), header, payload);
        MplsPdu::encapsulate(ip, u64::from(packet_id), MplsLabel::new(16).unwrap())
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = LocalPacketCache::new(1);
        assert!(cache.put(packet(1, 64)));
        assert_eq!(cache.get(1, 1), Some(packet(1, 64)));
        assert_eq!(cache.get(1, 2), None);
        assert_eq!(cache.occupied_octets(), 100);
    }

    #[test]
    fn test_fifo_eviction() {
        // 1024 octets hold four 220-octet packets, not five
        let mut cache = LocalPacketCache::new(1);
        for id in 1..=5 {
            assert!(cache.put(packet(id, 184)));
        }
        assert_eq!(cache.len(), 4);
        assert!(cache.get(1, 1).is_none());
        assert!(cache.get(1, 5).is_some());
    }

    #[test]
    fn test_rejects_oversized_and_plain_packets() {
        let mut cache = LocalPacketCache::new(1);
        assert!(!cache.put(packet(1, 2000)));

        let plain = Ipv4Pdu::new(1, Ipv4Header::new(Ipv4Address::new(10, 0, 0, 1), Ipv4Address::new(10, 0, 0, 2)), 10);
        assert!(!cache.put(MplsPdu::encapsulate(plain, 1, MplsLabel::new(16).unwrap())));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_replacing_same_key_keeps_accounting() {
        let mut cache = LocalPacketCache::new(1);
        cache.put(packet(1, 64));
        cache.put(packet(1, 64));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.occupied_octets(), 100);
    }

    #[test]
    fn test_shrink_evicts() {
        let mut cache = LocalPacketCache::new(2);
        for id in 1..=8 {
            cache.put(packet(id, 184));
        }
        assert_eq!(cache.len(), 8);
        cache.set_size_kb(1);
        assert_eq!(cache.len(), 4);
        cache.reset();
        assert_eq!(cache.occupied_octets(), 0);
    }
}
