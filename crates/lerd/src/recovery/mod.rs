//! Packet recovery bookkeeping.

mod table;
mod types;

pub use table::{PendingRetransmission, RecoveryTable};
pub use types::RecoveryRequestEntry;
