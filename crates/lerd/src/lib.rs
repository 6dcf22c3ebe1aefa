//! Active Label Edge Router engine for MPLS domains with Guarantee of Service.
//!
//! A node of this crate sits at the edge of (or inside) a simulated MPLS
//! domain. Once per simulation tick it reconciles broken links, advances its
//! signaling and recovery timers, and drains its ports under a nanosecond
//! budget derived from its switching power.
//!
//! # Architecture
//!
//! ```text
//!            tick(step_ns)
//!                 │
//!                 ▼
//!          ActiveLerNode ──> connectivity sweep ──> SwitchingTable
//!                 │                                 RecoveryTable
//!                 ├──> timer pass (LDP / GPSRP retries)
//!                 └──> forwarding loop
//!                        ├── IPv4 / MPLS ──> label stack ops ──> Port
//!                        ├── signaling   ──> LDP engine
//!                        └── recovery    ──> GPSRP engine ──> LocalPacketCache
//! ```
//!
//! # Key Components
//!
//! - [`ler::ActiveLerNode`]: the node and its per-tick driver
//! - [`switching`]: switching table and the outgoing-label state machine
//! - [`recovery`]: outstanding retransmission requests
//! - [`ports`] / [`topology`]: contracts of the surrounding node framework
//! - [`sim`]: in-memory links, ports and topology used by the `lerd` binary

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod ler;
pub mod pdu;
pub mod ports;
pub mod recovery;
pub mod sim;
pub mod stats;
pub mod switching;
pub mod topology;

pub use cache::LocalPacketCache;
pub use config::{ConfigError, LerConfig};
pub use error::{LerError, Result};
pub use events::{EventKind, EventLog, EventSink, NullEventSink, SimulationEvent};
pub use ler::ActiveLerNode;
pub use pdu::{Pdu, PduKind};
pub use ports::{Link, Port, PortId, PortSet};
pub use stats::{LerStats, LerStatsSnapshot, Outcome, StatsSink};
pub use topology::Topology;
