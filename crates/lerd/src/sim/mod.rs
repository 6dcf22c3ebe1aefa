//! In-memory links, ports and topology.
//!
//! Enough of a node framework to run LERs against each other: used by the
//! `lerd` binary and the integration tests.

mod domain;
mod link;
mod port;
mod topology;

pub use domain::{Domain, NodeHandle};
pub use link::SimLink;
pub use port::{connect, SimPort, SimPortSet};
pub use topology::SimTopology;

use thiserror::Error;

use gosmpls_types::Ipv4Address;

use crate::config::ConfigError;

/// Errors raised while building a simulated domain.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("no node at {0}")]
    UnknownNode(Ipv4Address),

    #[error("address {0} is already in use")]
    DuplicateAddress(Ipv4Address),

    #[error("{0} has no port")]
    Unconnected(Ipv4Address),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
