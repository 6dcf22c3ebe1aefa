//! The active LER node and its protocol engines.
//!
//! - `node`: construction, accessors and the per-tick driver
//! - `forwarding`: the forwarding loop and label stack operations
//! - `ldp`: label distribution (request / assign / withdraw, backup LSPs)
//! - `gpsrp`: retransmission of lost GoS packets
//! - `connectivity`: reconciliation with link state and failover

mod connectivity;
mod forwarding;
mod gpsrp;
mod io;
mod ldp;
mod node;

pub use forwarding::fec_fingerprint;
pub use node::ActiveLerNode;
