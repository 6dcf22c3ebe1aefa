//! MPLS packets and label stacks.

use gosmpls_types::{GosLevel, MplsLabel};

use super::ipv4::{Ipv4Header, Ipv4Pdu};

/// Size of one label stack entry.
pub const LABEL_OCTETS: u32 = 4;

/// One entry of a label stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelStackEntry {
    pub label: MplsLabel,
    pub exp: u8,
    pub ttl: u8,
    pub bottom_of_stack: bool,
}

impl LabelStackEntry {
    pub fn new(label: MplsLabel, exp: u8, ttl: u8, bottom_of_stack: bool) -> Self {
        Self {
            label,
            exp,
            ttl,
            bottom_of_stack,
        }
    }

    /// Builds the GoS marker pushed on top of GoS traffic.
    pub fn gos_marker(level: GosLevel, ttl: u8) -> Self {
        Self::new(MplsLabel::GOS_MARKER, level.exp(), ttl, false)
    }

    pub fn is_gos_marker(&self) -> bool {
        self.label.is_gos_marker()
    }
}

/// A label stack; the last element is the top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelStack(Vec<LabelStackEntry>);

impl LabelStack {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, entry: LabelStackEntry) {
        self.0.push(entry);
    }

    pub fn pop(&mut self) -> Option<LabelStackEntry> {
        self.0.pop()
    }

    pub fn top(&self) -> Option<&LabelStackEntry> {
        self.0.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut LabelStackEntry> {
        self.0.last_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates from bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &LabelStackEntry> {
        self.0.iter()
    }
}

/// An MPLS packet: a label stack in front of an IPv4 packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MplsPdu {
    pub id: u64,
    pub header: Ipv4Header,
    pub payload_octets: u32,
    pub stack: LabelStack,
}

impl MplsPdu {
    /// Wraps an IPv4 packet under a single bottom-of-stack label.
    ///
    /// The label TTL is the IPv4 TTL minus one.
    pub fn encapsulate(packet: Ipv4Pdu, id: u64, label: MplsLabel) -> Self {
        let ttl = packet.header.ttl.saturating_sub(1);
        let mut stack = LabelStack::new();
        stack.push(LabelStackEntry::new(label, 0, ttl, true));
        Self {
            id,
            header: packet.header,
            payload_octets: packet.payload_octets,
            stack,
        }
    }

    /// Strips the label stack. The IPv4 TTL is taken from the top label.
    pub fn decapsulate(self, id: u64) -> Ipv4Pdu {
        let mut header = self.header;
        if let Some(top) = self.stack.top() {
            header.ttl = top.ttl;
        }
        Ipv4Pdu::new(id, header, self.payload_octets)
    }

    /// True for packets carrying the GoS option.
    pub fn is_gos(&self) -> bool {
        self.header.gos.is_some()
    }

    /// Returns (flow id, packet id) of a GoS packet.
    pub fn gos_key(&self) -> Option<(u32, u32)> {
        self.header.gos.as_ref().map(|g| (g.flow_id, g.packet_id))
    }

    pub fn size(&self) -> u32 {
        self.header.size() + self.payload_octets + LABEL_OCTETS * self.stack.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::GosOptions;
    use gosmpls_types::Ipv4Address;
    use pretty_assertions::assert_eq;

    fn ipv4() -> Ipv4Pdu {
        let header = Ipv4Header::new(Ipv4Address::new(10, 0, 0, 1), Ipv4Address::new(10, 0, 2, 1));
        Ipv4Pdu::new(1, header, 512)
    }

    #[test]
    fn test_encapsulate() {
        let label = MplsLabel::new(20).unwrap();
        let mpls = MplsPdu::encapsulate(ipv4(), 2, label);

        assert_eq!(mpls.id, 2);
        assert_eq!(mpls.stack.len(), 1);
        let top = mpls.stack.top().unwrap();
        assert_eq!(top.label, label);
        assert_eq!(top.exp, 0);
        assert_eq!(top.ttl, 254);
        assert!(top.bottom_of_stack);
    }

    #[test]
    fn test_push_then_pop_round_trip() {
        let original = ipv4();
        let mpls = MplsPdu::encapsulate(original.clone(), 2, MplsLabel::new(16).unwrap());
        let back = mpls.decapsulate(3);

        assert_eq!(back.header.ttl, original.header.ttl - 1);
        assert_eq!(back.payload_octets, original.payload_octets);
        assert_eq!(back.header.origin, original.header.origin);
        assert_eq!(back.header.tail_end, original.header.tail_end);
    }

    #[test]
    fn test_gos_marker_entry() {
        let level = GosLevel::new(1, true).unwrap();
        let marker = LabelStackEntry::gos_marker(level, 9);
        assert!(marker.is_gos_marker());
        assert_eq!(marker.exp, 5);
        assert!(!marker.bottom_of_stack);
    }

    #[test]
    fn test_gos_key() {
        let mut packet = ipv4();
        let mpls = MplsPdu::encapsulate(packet.clone(), 2, MplsLabel::new(16).unwrap());
        assert_eq!(mpls.gos_key(), None);

        packet.header.gos = Some(GosOptions::new(GosLevel::BEST_EFFORT, 4, 9));
        let mpls = MplsPdu::encapsulate(packet, 2, MplsLabel::new(16).unwrap());
        assert_eq!(mpls.gos_key(), Some((4, 9)));
    }
}
