//! Simulation events emitted by a node.

use parking_lot::Mutex;
use serde::Serialize;

use gosmpls_types::Ipv4Address;

use crate::pdu::PduKind;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    PacketRouted { pdu: PduKind },
    PacketSent { pdu: PduKind },
    PacketGenerated { pdu: PduKind, size: u32 },
    PacketDiscarded { pdu: PduKind },
    NodeCongested { level: u32 },
    /// An entry left the switching table.
    LabelRemoved,
}

/// An event emitted by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationEvent {
    /// Per-node, monotonically increasing.
    pub id: u64,
    pub source: Ipv4Address,
    /// Simulated time, in ns.
    pub instant: u64,
    pub kind: EventKind,
}

/// Fire-and-forget event bus.
///
/// Errors are logged by the emitter and never abort protocol processing.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SimulationEvent) -> Result<(), String>;
}

/// Drops every event.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: SimulationEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<SimulationEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    pub fn events(&self) -> Vec<SimulationEvent> {
        self.events.lock().clone()
    }

    /// Counts the recorded events of a kind.
    pub fn count(&self, predicate: impl Fn(&EventKind) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(&e.kind)).count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: SimulationEvent) -> Result<(), String> {
        self.events.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u64, kind: EventKind) -> SimulationEvent {
        SimulationEvent {
            id,
            source: Ipv4Address::new(10, 0, 0, 1),
            instant: 0,
            kind,
        }
    }

    #[test]
    fn test_event_log_counts_by_kind() {
        let log = EventLog::new();
        log.emit(event(1, EventKind::LabelRemoved)).unwrap();
        log.emit(event(2, EventKind::PacketRouted { pdu: PduKind::Mpls })).unwrap();
        log.emit(event(3, EventKind::LabelRemoved)).unwrap();

        assert_eq!(log.len(), 3);
        assert_eq!(log.count(|k| matches!(k, EventKind::LabelRemoved)), 2);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_event_serializes() {
        let json = serde_json::to_string(&event(7, EventKind::NodeCongested { level: 40 })).unwrap();
        assert!(json.contains("\"NodeCongested\""));
        assert!(json.contains("\"10.0.0.1\""));
    }
}
