//! Switching entry types and the outgoing-label state machine.

use std::fmt;

use gosmpls_types::{Ipv4Address, LinkKind, MplsLabel};

use crate::error::{LerError, Result};
use crate::ports::PortId;

/// Whether an entry classifies unlabeled or labeled traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    /// Unlabeled traffic, keyed by FEC fingerprint.
    Fec,
    /// Labeled traffic (ILM), keyed by incoming label.
    Label,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fec => write!(f, "FEC"),
            Self::Label => write!(f, "LABEL"),
        }
    }
}

/// Label stack operation applied to matching traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelStackOp {
    Push,
    Pop,
    Swap,
    Noop,
}

impl LabelStackOp {
    /// Picks the operation from the kinds of the links around the node.
    pub fn for_links(incoming: LinkKind, outgoing: LinkKind) -> Self {
        match (incoming, outgoing) {
            (LinkKind::External, LinkKind::External) => Self::Noop,
            (LinkKind::External, LinkKind::Internal) => Self::Push,
            (LinkKind::Internal, LinkKind::External) => Self::Pop,
            (LinkKind::Internal, LinkKind::Internal) => Self::Swap,
        }
    }
}

impl fmt::Display for LabelStackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Swap => "SWAP",
            Self::Noop => "NOOP",
        };
        write!(f, "{}", s)
    }
}

/// State of an outgoing (or backup outgoing) label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LabelState {
    #[default]
    Undefined,
    Requested,
    /// Egress side of the domain: no downstream label is needed.
    Assigned,
    Unavailable,
    Removing,
    Withdrawn,
    /// A concrete label handed out by the downstream neighbor.
    Label(MplsLabel),
}

/// Events driving [`LabelState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelEvent {
    Request,
    Assign(MplsLabel),
    Deny,
    Withdraw,
    WithdrawAck,
}

impl fmt::Display for LabelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Assign(label) => write!(f, "assign({})", label),
            Self::Deny => write!(f, "deny"),
            Self::Withdraw => write!(f, "withdraw"),
            Self::WithdrawAck => write!(f, "withdraw-ack"),
        }
    }
}

impl LabelState {
    /// Applies an event, rejecting transitions the protocol does not allow.
    ///
    /// Withdrawing an already removing label is accepted so withdrawals
    /// can be retransmitted.
    pub fn apply(&mut self, event: LabelEvent) -> Result<()> {
        let next = match (*self, event) {
            (Self::Undefined, LabelEvent::Request) => Self::Requested,
            (Self::Requested, LabelEvent::Assign(label)) if label.is_assignable() => Self::Label(label),
            (Self::Requested, LabelEvent::Deny) => Self::Unavailable,
            (
                Self::Undefined
                | Self::Requested
                | Self::Assigned
                | Self::Unavailable
                | Self::Removing
                | Self::Label(_),
                LabelEvent::Withdraw,
            ) => Self::Removing,
            (Self::Removing, LabelEvent::WithdrawAck) => Self::Withdrawn,
            (from, event) => return Err(LerError::IllegalTransition { from, event }),
        };
        *self = next;
        Ok(())
    }

    /// Returns the concrete label, if one has been assigned.
    pub fn label(&self) -> Option<MplsLabel> {
        match self {
            Self::Label(label) => Some(*label),
            _ => None,
        }
    }

    /// True if traffic can be switched with this label.
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Assigned | Self::Label(_))
    }

    /// True once nothing is left to tear down.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Undefined | Self::Withdrawn)
    }
}

impl fmt::Display for LabelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "UNDEFINED"),
            Self::Requested => write!(f, "LABEL_REQUESTED"),
            Self::Assigned => write!(f, "LABEL_ASSIGNED"),
            Self::Unavailable => write!(f, "LABEL_UNAVAILABLE"),
            Self::Removing => write!(f, "REMOVING_LABEL"),
            Self::Withdrawn => write!(f, "LABEL_WITHDRAWN"),
            Self::Label(label) => write!(f, "{}", label),
        }
    }
}

/// Key of a switching entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub incoming_port: PortId,
    pub label_or_fec: u32,
    pub kind: EntryKind,
}

impl EntryKey {
    pub fn new(incoming_port: PortId, label_or_fec: u32, kind: EntryKind) -> Self {
        Self {
            incoming_port,
            label_or_fec,
            kind,
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.incoming_port, self.kind, self.label_or_fec)
    }
}

/// Role of a port with respect to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    Incoming,
    Outgoing,
    BackupOutgoing,
}

/// A switching table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchingEntry {
    pub kind: EntryKind,
    pub incoming_port: PortId,
    /// Unset until an upstream-facing label is bound.
    pub label_or_fec: Option<u32>,
    pub outgoing_port: Option<PortId>,
    pub outgoing_label: LabelState,
    pub backup_outgoing_port: Option<PortId>,
    pub backup_outgoing_label: LabelState,
    pub operation: LabelStackOp,
    pub local_session: u32,
    /// Session of the upstream neighbor, when the entry was signaled.
    pub upstream_session: Option<u32>,
    /// The entry is part of a backup LSP.
    pub backup_lsp: bool,
    pub tail_end: Ipv4Address,
    timeout_ns: i64,
    attempts: u32,
    default_timeout_ns: i64,
    default_attempts: u32,
}

impl SwitchingEntry {
    pub fn new(
        kind: EntryKind,
        incoming_port: PortId,
        operation: LabelStackOp,
        tail_end: Ipv4Address,
        local_session: u32,
    ) -> Self {
        Self {
            kind,
            incoming_port,
            label_or_fec: None,
            outgoing_port: None,
            outgoing_label: LabelState::Undefined,
            backup_outgoing_port: None,
            backup_outgoing_label: LabelState::Undefined,
            operation,
            local_session,
            upstream_session: None,
            backup_lsp: false,
            tail_end,
            timeout_ns: 0,
            attempts: 0,
            default_timeout_ns: 0,
            default_attempts: 0,
        }
    }

    /// Arms the retransmission timer.
    pub fn with_retries(mut self, timeout_ns: u64, attempts: u32) -> Self {
        self.default_timeout_ns = i64::try_from(timeout_ns).unwrap_or(i64::MAX);
        self.default_attempts = attempts;
        self.timeout_ns = self.default_timeout_ns;
        self.attempts = attempts;
        self
    }

    /// Returns the table key, once the upstream-facing value is known.
    pub fn key(&self) -> Option<EntryKey> {
        self.label_or_fec
            .map(|value| EntryKey::new(self.incoming_port, value, self.kind))
    }

    /// Tells which role `port` plays for this entry.
    ///
    /// The incoming port wins when it is also used outwards (hairpin).
    pub fn role_of(&self, port: PortId) -> Option<PortRole> {
        if port == self.incoming_port {
            Some(PortRole::Incoming)
        } else if Some(port) == self.outgoing_port {
            Some(PortRole::Outgoing)
        } else if Some(port) == self.backup_outgoing_port {
            Some(PortRole::BackupOutgoing)
        } else {
            None
        }
    }

    /// A backup LSP is signaled and ready to carry traffic.
    pub fn backup_lsp_established(&self) -> bool {
        self.backup_outgoing_port.is_some() && self.backup_outgoing_label.label().is_some()
    }

    /// A backup LSP exists in some form and must be torn down with the entry.
    pub fn backup_lsp_needs_teardown(&self) -> bool {
        self.backup_outgoing_port.is_some()
            && !matches!(
                self.backup_outgoing_label,
                LabelState::Undefined | LabelState::Removing | LabelState::Withdrawn
            )
    }

    /// Forgets the backup LSP without signaling.
    pub fn clear_backup(&mut self) {
        self.backup_outgoing_port = None;
        self.backup_outgoing_label = LabelState::Undefined;
    }

    /// Moves traffic to the backup LSP, which becomes the primary one.
    pub fn switch_to_backup(&mut self) {
        self.outgoing_port = self.backup_outgoing_port.take();
        self.outgoing_label = std::mem::take(&mut self.backup_outgoing_label);
    }

    /// Nothing is left to tear down in either direction.
    pub fn is_fully_withdrawn(&self) -> bool {
        self.outgoing_label == LabelState::Withdrawn
            && (self.backup_outgoing_port.is_none() || self.backup_outgoing_label.is_terminal())
    }

    pub fn decrease_timeout(&mut self, ns: u64) {
        let ns = i64::try_from(ns).unwrap_or(i64::MAX);
        self.timeout_ns = self.timeout_ns.saturating_sub(ns);
    }

    pub fn timed_out(&self) -> bool {
        self.timeout_ns <= 0
    }

    pub fn attempts_left(&self) -> u32 {
        self.attempts
    }

    /// Rearms the timer and consumes an attempt.
    ///
    /// Returns false if no attempt was left.
    pub fn consume_attempt(&mut self) -> bool {
        if self.attempts == 0 {
            return false;
        }
        self.attempts -= 1;
        self.timeout_ns = self.default_timeout_ns;
        true
    }

    /// Rearms the timer and restores every attempt.
    pub fn reset_retries(&mut self) {
        self.timeout_ns = self.default_timeout_ns;
        self.attempts = self.default_attempts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn label(value: u32) -> MplsLabel {
        MplsLabel::new(value).unwrap()
    }

    #[test]
    fn test_request_assign() {
        let mut state = LabelState::Undefined;
        state.apply(LabelEvent::Request).unwrap();
        assert_eq!(state, LabelState::Requested);
        state.apply(LabelEvent::Assign(label(16))).unwrap();
        assert_eq!(state, LabelState::Label(label(16)));
        assert!(state.is_usable());
    }

    #[test]
    fn test_request_deny() {
        let mut state = LabelState::Requested;
        state.apply(LabelEvent::Deny).unwrap();
        assert_eq!(state, LabelState::Unavailable);
        assert!(!state.is_usable());
    }

    #[test]
    fn test_assign_reserved_label_rejected() {
        let mut state = LabelState::Requested;
        let err = state.apply(LabelEvent::Assign(label(3))).unwrap_err();
        assert_eq!(
            err,
            LerError::IllegalTransition {
                from: LabelState::Requested,
                event: LabelEvent::Assign(label(3)),
            }
        );
        assert_eq!(state, LabelState::Requested);
    }

    #[test]
    fn test_assign_while_undefined_rejected() {
        let mut state = LabelState::Undefined;
        assert!(state.apply(LabelEvent::Assign(label(20))).is_err());
        assert_eq!(state, LabelState::Undefined);
    }

    #[test]
    fn test_withdraw_lifecycle() {
        for start in [
            LabelState::Requested,
            LabelState::Assigned,
            LabelState::Unavailable,
            LabelState::Label(label(40)),
            LabelState::Removing,
        ] {
            let mut state = start;
            state.apply(LabelEvent::Withdraw).unwrap();
            assert_eq!(state, LabelState::Removing, "from {}", start);
            state.apply(LabelEvent::WithdrawAck).unwrap();
            assert_eq!(state, LabelState::Withdrawn);
        }
    }

    #[test]
    fn test_withdrawn_is_final() {
        let mut state = LabelState::Withdrawn;
        assert!(state.apply(LabelEvent::Withdraw).is_err());
        assert!(state.apply(LabelEvent::Request).is_err());
        assert!(state.apply(LabelEvent::WithdrawAck).is_err());
    }

    #[test]
    fn test_operation_from_links() {
        use LinkKind::{External, Internal};
        assert_eq!(LabelStackOp::for_links(External, External), LabelStackOp::Noop);
        assert_eq!(LabelStackOp::for_links(External, Internal), LabelStackOp::Push);
        assert_eq!(LabelStackOp::for_links(Internal, External), LabelStackOp::Pop);
        assert_eq!(LabelStackOp::for_links(Internal, Internal), LabelStackOp::Swap);
    }

    fn entry() -> SwitchingEntry {
        let mut e = SwitchingEntry::new(
            EntryKind::Label,
            0,
            LabelStackOp::Swap,
            Ipv4Address::new(10, 0, 2, 1),
            1,
        )
        .with_retries(100, 2);
        e.outgoing_port = Some(1);
        e.outgoing_label = LabelState::Label(label(20));
        e
    }

    #[test]
    fn test_role_of() {
        let mut e = entry();
        e.backup_outgoing_port = Some(2);
        assert_eq!(e.role_of(0), Some(PortRole::Incoming));
        assert_eq!(e.role_of(1), Some(PortRole::Outgoing));
        assert_eq!(e.role_of(2), Some(PortRole::BackupOutgoing));
        assert_eq!(e.role_of(3), None);
    }

    #[test]
    fn test_switch_to_backup() {
        let mut e = entry();
        e.backup_outgoing_port = Some(2);
        e.backup_outgoing_label = LabelState::Label(label(30));
        assert!(e.backup_lsp_established());

        e.switch_to_backup();
        assert_eq!(e.outgoing_port, Some(2));
        assert_eq!(e.outgoing_label, LabelState::Label(label(30)));
        assert_eq!(e.backup_outgoing_port, None);
        assert_eq!(e.backup_outgoing_label, LabelState::Undefined);
        assert!(!e.backup_lsp_established());
    }

    #[test]
    fn test_retry_budget() {
        let mut e = entry();
        e.decrease_timeout(60);
        assert!(!e.timed_out());
        e.decrease_timeout(60);
        assert!(e.timed_out());

        assert!(e.consume_attempt());
        assert!(!e.timed_out());
        assert!(e.consume_attempt());
        assert!(!e.consume_attempt());
        assert_eq!(e.attempts_left(), 0);

        e.reset_retries();
        assert_eq!(e.attempts_left(), 2);
    }

    #[test]
    fn test_fully_withdrawn() {
        let mut e = entry();
        e.outgoing_label = LabelState::Withdrawn;
        assert!(e.is_fully_withdrawn());

        e.backup_outgoing_port = Some(2);
        e.backup_outgoing_label = LabelState::Removing;
        assert!(!e.is_fully_withdrawn());
        assert!(!e.backup_lsp_needs_teardown());

        e.backup_outgoing_label = LabelState::Withdrawn;
        assert!(e.is_fully_withdrawn());
    }
}
