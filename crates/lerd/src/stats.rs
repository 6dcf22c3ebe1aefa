//! Traffic statistics.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::pdu::Pdu;

/// Fate of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Discard,
}

/// Statistics sink. Write-only from the engine's point of view.
pub trait StatsSink: Send + Sync {
    fn record(&self, pdu: &Pdu, outcome: Outcome);
}

/// Per-class packet counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficCounters {
    pub ipv4: u64,
    pub mpls: u64,
    /// GoS traffic by level, with and without backup LSP folded together.
    pub gos: [u64; 4],
    pub signaling: u64,
    pub recovery: u64,
    pub other: u64,
}

impl TrafficCounters {
    fn count(&mut self, pdu: &Pdu) {
        if let Some(gos) = pdu.gos() {
            self.gos[usize::from(gos.level.level())] += 1;
            return;
        }
        match pdu {
            Pdu::Ipv4(_) => self.ipv4 += 1,
            Pdu::Mpls(_) => self.mpls += 1,
            Pdu::Signaling(_) => self.signaling += 1,
            Pdu::Recovery(_) => self.recovery += 1,
            Pdu::Other { .. } => self.other += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.ipv4 + self.mpls + self.gos.iter().sum::<u64>() + self.signaling + self.recovery + self.other
    }
}

/// Point-in-time copy of [`LerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LerStatsSnapshot {
    pub sent: TrafficCounters,
    pub discarded: TrafficCounters,
}

/// Statistics of an active LER.
#[derive(Debug)]
pub struct LerStats {
    enabled: AtomicBool,
    counters: Mutex<LerStatsSnapshot>,
}

impl LerStats {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            counters: Mutex::new(LerStatsSnapshot::default()),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> LerStatsSnapshot {
        *self.counters.lock()
    }

    pub fn reset(&self) {
        *self.counters.lock() = LerStatsSnapshot::default();
    }
}

impl Default for LerStats {
    fn default() -> Self {
        Self::new(true)
    }
}

impl StatsSink for LerStats {
    fn record(&self, pdu: &Pdu, outcome: Outcome) {
        if !self.is_enabled() {
            return;
        }
        let mut counters = self.counters.lock();
        match outcome {
            Outcome::Sent => counters.sent.count(pdu),
            Outcome::Discard => counters.discarded.count(pdu),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{GosOptions, Ipv4Header, Ipv4Pdu};
    use gosmpls_types::{GosLevel, Ipv4Address};
    use pretty_assertions::assert_eq;

    fn ipv4(level: Option<GosLevel>) -> Pdu {
        let mut header = Ipv4Header::new(Ipv4Address::new(10, 0, 0, 1), Ipv4Address::new(10, 0, 0, 2));
        header.gos = level.map(|l| GosOptions::new(l, 1, 1));
        Pdu::Ipv4(Ipv4Pdu::new(1, header, 10))
    }

    #[test]
    fn test_gos_levels_fold_backup() {
        let stats = LerStats::new(true);
        stats.record(&ipv4(Some(GosLevel::new(2, false).unwrap())), Outcome::Sent);
        stats.record(&ipv4(Some(GosLevel::new(2, true).unwrap())), Outcome::Sent);
        stats.record(&ipv4(None), Outcome::Discard);
        stats.record(&Pdu::Other { id: 9, size: 1 }, Outcome::Discard);

        let snap = stats.snapshot();
        assert_eq!(snap.sent.gos, [0, 0, 2, 0]);
        assert_eq!(snap.sent.total(), 2);
        assert_eq!(snap.discarded.ipv4, 1);
        assert_eq!(snap.discarded.other, 1);
    }

    #[test]
    fn test_disabled_records_nothing() {
        let stats = LerStats::new(false);
        stats.record(&ipv4(None), Outcome::Sent);
        assert_eq!(stats.snapshot(), LerStatsSnapshot::default());

        stats.set_enabled(true);
        stats.record(&ipv4(None), Outcome::Sent);
        assert_eq!(stats.snapshot().sent.ipv4, 1);

        stats.reset();
        assert_eq!(stats.snapshot(), LerStatsSnapshot::default());
    }
}
