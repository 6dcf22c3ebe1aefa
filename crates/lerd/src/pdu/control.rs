//! Signaling (TLDP) and recovery (GPSRP) packets.

use std::fmt;

use gosmpls_types::{Ipv4Address, MplsLabel};

use super::ipv4::Ipv4Header;

/// Size of a signaling payload.
pub const SIGNALING_PAYLOAD_OCTETS: u32 = 24;

/// Size of a recovery payload.
pub const RECOVERY_PAYLOAD_OCTETS: u32 = 16;

/// Label distribution message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalingMessage {
    Request,
    RequestOk,
    RequestDenied,
    Withdrawal,
    WithdrawalOk,
}

impl fmt::Display for SignalingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Request => "REQUEST",
            Self::RequestOk => "REQUEST_OK",
            Self::RequestDenied => "REQUEST_DENIED",
            Self::Withdrawal => "WITHDRAWAL",
            Self::WithdrawalOk => "WITHDRAWAL_OK",
        };
        write!(f, "{}", s)
    }
}

/// Which way a signaling message travels along the LSP.
///
/// Forward messages travel towards the tail end and carry the sender's
/// local session id. Backward messages travel towards the head end and
/// carry the receiver's local session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalingDirection {
    Forward,
    Backward,
    BackwardBackup,
}

impl SignalingDirection {
    pub fn is_forward(&self) -> bool {
        matches!(self, Self::Forward)
    }
}

/// A label distribution message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingPdu {
    pub id: u64,
    pub header: Ipv4Header,
    pub message: SignalingMessage,
    pub session_id: u32,
    /// Tail end of the LSP being negotiated.
    pub target: Ipv4Address,
    /// Meaningful on [`SignalingMessage::RequestOk`] only.
    pub label: Option<MplsLabel>,
    /// The LSP being negotiated is a backup LSP.
    pub backup_lsp: bool,
    pub direction: SignalingDirection,
}

impl SignalingPdu {
    pub fn new(
        id: u64,
        origin: Ipv4Address,
        neighbor: Ipv4Address,
        message: SignalingMessage,
        session_id: u32,
        target: Ipv4Address,
    ) -> Self {
        Self {
            id,
            header: Ipv4Header::new(origin, neighbor),
            message,
            session_id,
            target,
            label: None,
            backup_lsp: false,
            direction: SignalingDirection::Forward,
        }
    }

    pub fn with_label(mut self, label: MplsLabel) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_backup_lsp(mut self, backup_lsp: bool) -> Self {
        self.backup_lsp = backup_lsp;
        self
    }

    pub fn with_direction(mut self, direction: SignalingDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn size(&self) -> u32 {
        self.header.size() + SIGNALING_PAYLOAD_OCTETS
    }
}

/// Retransmission protocol message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryMessage {
    RetransmissionRequest,
    RetransmissionNotPossible,
    RetransmissionOk,
}

impl fmt::Display for RecoveryMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RetransmissionRequest => "RETRANSMISSION_REQUEST",
            Self::RetransmissionNotPossible => "RETRANSMISSION_NOT_POSSIBLE",
            Self::RetransmissionOk => "RETRANSMISSION_OK",
        };
        write!(f, "{}", s)
    }
}

/// A retransmission protocol message, addressed to `header.tail_end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPdu {
    pub id: u64,
    pub header: Ipv4Header,
    pub message: RecoveryMessage,
    pub flow_id: u32,
    pub packet_id: u32,
}

impl RecoveryPdu {
    pub fn new(
        id: u64,
        origin: Ipv4Address,
        target: Ipv4Address,
        message: RecoveryMessage,
        flow_id: u32,
        packet_id: u32,
    ) -> Self {
        Self {
            id,
            header: Ipv4Header::new(origin, target),
            message,
            flow_id,
            packet_id,
        }
    }

    pub fn size(&self) -> u32 {
        self.header.size() + RECOVERY_PAYLOAD_OCTETS
    }
}
