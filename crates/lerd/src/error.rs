//! Engine error type.

use thiserror::Error;

use gosmpls_types::Ipv4Address;

use crate::ports::PortId;
use crate::switching::{EntryId, EntryKey, LabelEvent, LabelState};

/// Errors raised while handling a single packet or entry.
///
/// None of these are fatal to the node: the caller discards the packet (or
/// abandons the entry creation) and carries on with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LerError {
    /// A per-node identifier generator has nothing left to hand out.
    #[error("{0} identifiers exhausted")]
    IdExhausted(&'static str),
    /// The topology knows no path towards the destination.
    #[error("no next hop from {from} towards {to}")]
    NoNextHop { from: Ipv4Address, to: Ipv4Address },
    /// Port not found.
    #[error("port not found: {0}")]
    PortNotFound(PortId),
    /// The port exists but nothing is attached to it.
    #[error("no link attached to port {0}")]
    LinkNotFound(PortId),
    /// The outgoing-label state machine rejected an event.
    #[error("illegal label transition from {from} on {event}")]
    IllegalTransition { from: LabelState, event: LabelEvent },
    /// An entry with the same key is already in the switching table.
    #[error("switching entry already exists: {0}")]
    DuplicateEntry(EntryKey),
    /// The entry was removed meanwhile.
    #[error("switching entry not found: {0:?}")]
    EntryNotFound(EntryId),
    /// The packet cannot be classified on the port it arrived on.
    #[error("unsupported flow: {0}")]
    UnsupportedFlow(String),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, LerError>;
