//! Common types for the GoS-over-MPLS simulation domain.
//!
//! This crate provides type-safe representations of the primitives shared
//! by every node of a simulated MPLS domain with Guarantee of Service:
//!
//! - [`Ipv4Address`]: node and host addresses
//! - [`MplsLabel`]: 20-bit MPLS label values (0-15 reserved)
//! - [`LinkKind`]: whether a link is inside or outside the MPLS domain
//! - [`GosLevel`]: requested Guarantee of Service level (EXP field)

mod gos;
mod ip;
mod label;
mod link;

pub use gos::GosLevel;
pub use ip::Ipv4Address;
pub use label::MplsLabel;
pub use link::LinkKind;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid MPLS label: {0} (must be 0-1048575)")]
    InvalidLabel(u32),

    #[error("invalid GoS level: {0} (EXP must be 0-7)")]
    InvalidGosLevel(u8),

    #[error("invalid link kind: {0}")]
    InvalidLinkKind(String),
}
