//! IPv4 packets and the GoS header option.

use gosmpls_types::{GosLevel, Ipv4Address};

/// Size of an IPv4 header without options.
pub const IPV4_HEADER_OCTETS: u32 = 20;

/// Size of the GoS option without crossed nodes.
pub const GOS_OPTIONS_BASE_OCTETS: u32 = 12;

/// Crossed active nodes recorded in the GoS option (40 octets of options).
pub const MAX_CROSSED_ACTIVE_NODES: usize = 7;

/// TTL given to freshly generated packets.
pub const DEFAULT_TTL: u8 = 255;

/// GoS option carried in the IPv4 header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GosOptions {
    pub level: GosLevel,
    pub flow_id: u32,
    pub packet_id: u32,
    /// Active nodes that cached this packet, oldest first.
    pub crossed_active_nodes: Vec<Ipv4Address>,
}

impl GosOptions {
    pub fn new(level: GosLevel, flow_id: u32, packet_id: u32) -> Self {
        Self {
            level,
            flow_id,
            packet_id,
            crossed_active_nodes: Vec::new(),
        }
    }

    /// Records that `address` cached the packet. The oldest node is forgotten
    /// once the option is full.
    pub fn mark_crossed(&mut self, address: Ipv4Address) {
        if self.crossed_active_nodes.last() == Some(&address) {
            return;
        }
        if self.crossed_active_nodes.len() == MAX_CROSSED_ACTIVE_NODES {
            self.crossed_active_nodes.remove(0);
        }
        self.crossed_active_nodes.push(address);
    }

    /// Returns the active node that most recently cached the packet.
    pub fn last_crossed_active_node(&self) -> Option<Ipv4Address> {
        self.crossed_active_nodes.last().copied()
    }

    pub fn size(&self) -> u32 {
        GOS_OPTIONS_BASE_OCTETS + 4 * self.crossed_active_nodes.len() as u32
    }
}

/// IPv4 header, reduced to what the simulation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub origin: Ipv4Address,
    pub tail_end: Ipv4Address,
    pub ttl: u8,
    pub gos: Option<GosOptions>,
}

impl Ipv4Header {
    pub fn new(origin: Ipv4Address, tail_end: Ipv4Address) -> Self {
        Self {
            origin,
            tail_end,
            ttl: DEFAULT_TTL,
            gos: None,
        }
    }

    pub fn with_gos(mut self, gos: GosOptions) -> Self {
        self.gos = Some(gos);
        self
    }

    pub fn size(&self) -> u32 {
        IPV4_HEADER_OCTETS + self.gos.as_ref().map_or(0, GosOptions::size)
    }
}

/// An IPv4 packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Pdu {
    pub id: u64,
    pub header: Ipv4Header,
    pub payload_octets: u32,
}

impl Ipv4Pdu {
    pub fn new(id: u64, header: Ipv4Header, payload_octets: u32) -> Self {
        Self {
            id,
            header,
            payload_octets,
        }
    }

    pub fn is_gos(&self) -> bool {
        self.header.gos.is_some()
    }

    pub fn size(&self) -> u32 {
        self.header.size() + self.payload_octets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(last: u8) -> Ipv4Address {
        Ipv4Address::new(10, 0, 1, last)
    }

    #[test]
    fn test_mark_crossed_keeps_most_recent() {
        let mut gos = GosOptions::new(GosLevel::BEST_EFFORT, 1, 1);
        assert_eq!(gos.last_crossed_active_node(), None);

        for i in 1..=9 {
            gos.mark_crossed(addr(i));
        }
        assert_eq!(gos.crossed_active_nodes.len(), MAX_CROSSED_ACTIVE_NODES);
        assert_eq!(gos.crossed_active_nodes.first(), Some(&addr(3)));
        assert_eq!(gos.last_crossed_active_node(), Some(addr(9)));
    }

    #[test]
    fn test_mark_crossed_twice_by_same_node() {
        let mut gos = GosOptions::new(GosLevel::BEST_EFFORT, 1, 1);
        gos.mark_crossed(addr(1));
        gos.mark_crossed(addr(1));
        assert_eq!(gos.crossed_active_nodes, vec![addr(1)]);
        assert_eq!(gos.size(), 16);
    }

    #[test]
    fn test_header_size() {
        let header = Ipv4Header::new(addr(1), addr(2));
        assert_eq!(header.size(), 20);
        assert_eq!(header.ttl, DEFAULT_TTL);

        let header = header.with_gos(GosOptions::new(GosLevel::BEST_EFFORT, 1, 1));
        assert_eq!(header.size(), 32);
    }
}
