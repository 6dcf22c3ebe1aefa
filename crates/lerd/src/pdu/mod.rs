//! Packets handled by the engine.
//!
//! Every variant is owned by the forwarding loop while it is processed and
//! moves into the outgoing port's link on a successful send.

mod control;
mod ipv4;
mod mpls;

pub use control::{
    RecoveryMessage, RecoveryPdu, SignalingDirection, SignalingMessage, SignalingPdu,
    RECOVERY_PAYLOAD_OCTETS, SIGNALING_PAYLOAD_OCTETS,
};
pub use ipv4::{
    GosOptions, Ipv4Header, Ipv4Pdu, DEFAULT_TTL, GOS_OPTIONS_BASE_OCTETS, IPV4_HEADER_OCTETS,
    MAX_CROSSED_ACTIVE_NODES,
};
pub use mpls::{LabelStack, LabelStackEntry, MplsPdu, LABEL_OCTETS};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse packet classification used by events and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PduKind {
    Ipv4,
    Ipv4Gos,
    Mpls,
    MplsGos,
    Signaling,
    Recovery,
    Other,
}

impl fmt::Display for PduKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ipv4 => "IPv4",
            Self::Ipv4Gos => "IPv4_GOS",
            Self::Mpls => "MPLS",
            Self::MplsGos => "MPLS_GOS",
            Self::Signaling => "TLDP",
            Self::Recovery => "GPSRP",
            Self::Other => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// A packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    Ipv4(Ipv4Pdu),
    Mpls(MplsPdu),
    Signaling(SignalingPdu),
    Recovery(RecoveryPdu),
    /// Anything the node does not know how to switch.
    Other { id: u64, size: u32 },
}

impl Pdu {
    pub fn id(&self) -> u64 {
        match self {
            Self::Ipv4(p) => p.id,
            Self::Mpls(p) => p.id,
            Self::Signaling(p) => p.id,
            Self::Recovery(p) => p.id,
            Self::Other { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> PduKind {
        match self {
            Self::Ipv4(p) if p.is_gos() => PduKind::Ipv4Gos,
            Self::Ipv4(_) => PduKind::Ipv4,
            Self::Mpls(p) if p.is_gos() => PduKind::MplsGos,
            Self::Mpls(_) => PduKind::Mpls,
            Self::Signaling(_) => PduKind::Signaling,
            Self::Recovery(_) => PduKind::Recovery,
            Self::Other { .. } => PduKind::Other,
        }
    }

    /// Size on the wire, in octets.
    pub fn size(&self) -> u32 {
        match self {
            Self::Ipv4(p) => p.size(),
            Self::Mpls(p) => p.size(),
            Self::Signaling(p) => p.size(),
            Self::Recovery(p) => p.size(),
            Self::Other { size, .. } => *size,
        }
    }

    /// Returns the GoS options carried in the IPv4 header, if any.
    pub fn gos(&self) -> Option<&GosOptions> {
        match self {
            Self::Ipv4(p) => p.header.gos.as_ref(),
            Self::Mpls(p) => p.header.gos.as_ref(),
            _ => None,
        }
    }
}

impl From<Ipv4Pdu> for Pdu {
    fn from(p: Ipv4Pdu) -> Self {
        Self::Ipv4(p)
    }
}

impl From<MplsPdu> for Pdu {
    fn from(p: MplsPdu) -> Self {
        Self::Mpls(p)
    }
}

impl From<SignalingPdu> for Pdu {
    fn from(p: SignalingPdu) -> Self {
        Self::Signaling(p)
    }
}

impl From<RecoveryPdu> for Pdu {
    fn from(p: RecoveryPdu) -> Self {
        Self::Recovery(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gosmpls_types::{GosLevel, Ipv4Address, MplsLabel};

    fn ipv4(gos: bool) -> Ipv4Pdu {
        let mut header = Ipv4Header::new(Ipv4Address::new(10, 0, 0, 1), Ipv4Address::new(10, 0, 2, 1));
        if gos {
            header.gos = Some(GosOptions::new(GosLevel::new(2, true).unwrap(), 7, 1));
        }
        Ipv4Pdu::new(1, header, 100)
    }

    #[test]
    fn test_kind() {
        assert_eq!(Pdu::from(ipv4(false)).kind(), PduKind::Ipv4);
        assert_eq!(Pdu::from(ipv4(true)).kind(), PduKind::Ipv4Gos);

        let label = MplsLabel::new(16).unwrap();
        let mpls = MplsPdu::encapsulate(ipv4(true), 2, label);
        assert_eq!(Pdu::from(mpls).kind(), PduKind::MplsGos);
        assert_eq!(Pdu::Other { id: 3, size: 9 }.kind(), PduKind::Other);
    }

    #[test]
    fn test_size() {
        assert_eq!(Pdu::from(ipv4(false)).size(), 120);
        // 12 octets of GoS options, no crossed node yet
        assert_eq!(Pdu::from(ipv4(true)).size(), 132);

        let label = MplsLabel::new(16).unwrap();
        let mpls = MplsPdu::encapsulate(ipv4(false), 2, label);
        assert_eq!(Pdu::from(mpls).size(), 124);
    }

    #[test]
    fn test_gos_accessor() {
        let pdu = Pdu::from(ipv4(true));
        assert_eq!(pdu.gos().map(|g| g.flow_id), Some(7));
        assert!(Pdu::Other { id: 3, size: 9 }.gos().is_none());
    }
}
