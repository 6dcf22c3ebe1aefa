//! Outstanding retransmission request.

use gosmpls_types::Ipv4Address;

use crate::ports::PortId;

/// Bookkeeping of one retransmission request, keyed by (flow id, packet id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryRequestEntry {
    pub flow_id: u32,
    pub packet_id: u32,
    /// Port the request leaves through.
    pub outgoing_port: PortId,
    /// Active nodes that cached the packet, oldest first.
    crossed_nodes: Vec<Ipv4Address>,
    timeout_ns: i64,
    attempts: u32,
    default_timeout_ns: i64,
}

impl RecoveryRequestEntry {
    pub fn new(
        flow_id: u32,
        packet_id: u32,
        outgoing_port: PortId,
        crossed_nodes: Vec<Ipv4Address>,
        timeout_ns: u64,
        attempts: u32,
    ) -> Self {
        let timeout_ns = i64::try_from(timeout_ns).unwrap_or(i64::MAX);
        Self {
            flow_id,
            packet_id,
            outgoing_port,
            crossed_nodes,
            timeout_ns,
            attempts,
            default_timeout_ns: timeout_ns,
        }
    }

    pub fn key(&self) -> (u32, u32) {
        (self.flow_id, self.packet_id)
    }

    /// Node currently asked for the retransmission.
    pub fn crossed_node(&self) -> Option<Ipv4Address> {
        self.crossed_nodes.last().copied()
    }

    /// Gives up on the current target and falls back to the node that
    /// cached the packet before it.
    pub fn fall_back(&mut self) -> Option<Ipv4Address> {
        self.crossed_nodes.pop();
        self.crossed_node()
    }

    /// No retransmission attempt is left.
    pub fn is_purgeable(&self) -> bool {
        self.attempts == 0
    }

    /// The timer expired and another attempt can be made.
    pub fn is_retryable(&self) -> bool {
        self.timeout_ns <= 0 && self.attempts > 0
    }

    pub fn timed_out(&self) -> bool {
        self.timeout_ns <= 0
    }

    pub fn decrease_timeout(&mut self, ns: u64) {
        let ns = i64::try_from(ns).unwrap_or(i64::MAX);
        self.timeout_ns = self.timeout_ns.saturating_sub(ns);
    }

    /// Rearms the timer without touching the attempts.
    pub fn reset_timeout(&mut self) {
        self.timeout_ns = self.default_timeout_ns;
    }

    /// Rearms the timer and consumes an attempt.
    pub fn consume_attempt(&mut self) {
        self.attempts = self.attempts.saturating_sub(1);
        self.reset_timeout();
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
    fn test_fall_back_walks_crossed_nodes() {
        let mut entry = RecoveryRequestEntry::new(1, 2, 0, vec![addr(1), addr(2)], 10, 3);
        assert_eq!(entry.crossed_node(), Some(addr(2)));
        assert_eq!(entry.fall_back(), Some(addr(1)));
        assert_eq!(entry.fall_back(), None);
        assert_eq!(entry.fall_back(), None);
    }

    #[test]
    fn test_retry_and_purge() {
        let mut entry = RecoveryRequestEntry::new(1, 2, 0, vec![addr(1)], 10, 1);
        assert!(!entry.is_retryable());
        entry.decrease_timeout(10);
        assert!(entry.is_retryable());

        entry.consume_attempt();
        assert!(!entry.timed_out());
        assert!(entry.is_purgeable());

        entry.decrease_timeout(10);
        assert!(entry.timed_out());
        assert!(!entry.is_retryable());
    }
}
