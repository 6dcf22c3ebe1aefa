//! Label distribution protocol (TLDP) engine.
//!
//! Forward messages (requests and withdrawals sent downstream) carry the
//! sender's local session id and are matched by (upstream session, port).
//! Backward messages carry the receiver's local session id and are matched
//! by it alone.

use log::{debug, info, warn};

use gosmpls_types::{Ipv4Address, MplsLabel};

use crate::error::{LerError, Result};
use crate::events::EventKind;
use crate::pdu::{SignalingDirection, SignalingMessage, SignalingPdu};
use crate::ports::PortId;
use crate::switching::{EntryId, EntryKind, LabelEvent, LabelStackOp, LabelState, PortRole, SwitchingEntry};

use super::forwarding::Disposition;
use super::io::NodeIo;
use super::node::ActiveLerNode;

fn backward(backup_lsp: bool) -> SignalingDirection {
    if backup_lsp {
        SignalingDirection::BackwardBackup
    } else {
        SignalingDirection::Backward
    }
}

/// Session id, direction and backup flag to use towards `port`.
fn session_towards(entry: &SwitchingEntry, port: PortId) -> Option<(u32, SignalingDirection, bool)> {
    match entry.role_of(port)? {
        PortRole::Incoming => entry
            .upstream_session
            .map(|s| (s, backward(entry.backup_lsp), entry.backup_lsp)),
        PortRole::Outgoing => Some((entry.local_session, SignalingDirection::Forward, entry.backup_lsp)),
        PortRole::BackupOutgoing => Some((entry.local_session, SignalingDirection::Forward, true)),
    }
}

/// Completes the teardown of a label with no peer left to acknowledge it.
fn withdraw_locally(state: &mut LabelState) {
    if *state == LabelState::Withdrawn {
        return;
    }
    if let Err(e) = state
        .apply(LabelEvent::Withdraw)
        .and_then(|()| state.apply(LabelEvent::WithdrawAck))
    {
        debug!("local withdrawal rejected: {}", e);
    }
}

impl NodeIo {
    #[allow(clippy::too_many_arguments)]
    fn send_signaling(
        &mut self,
        port: PortId,
        message: SignalingMessage,
        session: u32,
        target: Ipv4Address,
        direction: SignalingDirection,
        backup_lsp: bool,
        label: Option<MplsLabel>,
    ) -> bool {
        let Some(neighbor) = self.neighbor(port) else {
            debug!("{}: no neighbor on port {}, {} not sent", self.address, port, message);
            return false;
        };
        let id = match self.next_packet_id() {
            Ok(id) => id,
            Err(e) => {
                warn!("{}: {} not sent: {}", self.address, message, e);
                return false;
            }
        };
        let mut pdu = SignalingPdu::new(id, self.address, neighbor, message, session, target)
            .with_direction(direction)
            .with_backup_lsp(backup_lsp);
        if let Some(label) = label {
            pdu = pdu.with_label(label);
        }
        debug!(
            "{}: {} session {} towards {} on port {}",
            self.address, message, session, target, port
        );
        self.send_generated(port, pdu.into())
    }

    /// Asks the downstream neighbor for a label, moving an undefined label
    /// to requested. Also used to retransmit pending requests.
    pub(crate) fn request_label(&mut self, entry: &mut SwitchingEntry) -> bool {
        if entry.outgoing_label == LabelState::Undefined {
            if let Err(e) = entry.outgoing_label.apply(LabelEvent::Request) {
                debug!("{}: {}", self.address, e);
                return false;
            }
        }
        if entry.outgoing_label != LabelState::Requested {
            return false;
        }
        let Some(port) = entry.outgoing_port else {
            return false;
        };
        self.send_signaling(
            port,
            SignalingMessage::Request,
            entry.local_session,
            entry.tail_end,
            SignalingDirection::Forward,
            entry.backup_lsp,
            None,
        )
    }

    /// Asks a neighbor other than the primary next hop for a backup label.
    ///
    /// Only done once per entry, and only after the primary LSP is up.
    pub(crate) fn request_backup_label(&mut self, entry: &mut SwitchingEntry) -> bool {
        if entry.backup_outgoing_port.is_some()
            || entry.backup_outgoing_label != LabelState::Undefined
            || entry.outgoing_label.label().is_none()
        {
            return false;
        }
        let primary = entry.outgoing_port.and_then(|p| self.neighbor(p));
        let Some(hop) = self.next_hop(entry.tail_end, primary) else {
            debug!("{}: no alternate path towards {}", self.address, entry.tail_end);
            return false;
        };
        if Some(hop) == primary || Some(hop) == self.neighbor(entry.incoming_port) {
            return false;
        }
        let Some(port) = self.port_towards(hop) else {
            return false;
        };
        if !self.is_internal(port) {
            return false;
        }
        if let Err(e) = entry.backup_outgoing_label.apply(LabelEvent::Request) {
            debug!("{}: {}", self.address, e);
            return false;
        }
        entry.backup_outgoing_port = Some(port);
        self.send_signaling(
            port,
            SignalingMessage::Request,
            entry.local_session,
            entry.tail_end,
            SignalingDirection::Forward,
            true,
            None,
        )
    }

    /// Hands the entry's label to the upstream neighbor.
    pub(crate) fn send_assign(&mut self, entry: &SwitchingEntry) -> bool {
        let Some(session) = entry.upstream_session else {
            return false;
        };
        let Some(label) = entry.label_or_fec.and_then(|v| MplsLabel::assignable(v).ok()) else {
            warn!("{}: no assignable label bound for session {}", self.address, session);
            return false;
        };
        self.send_signaling(
            entry.incoming_port,
            SignalingMessage::RequestOk,
            session,
            entry.tail_end,
            backward(entry.backup_lsp),
            entry.backup_lsp,
            Some(label),
        )
    }

    /// Tells the upstream neighbor no label will be available.
    pub(crate) fn send_deny(&mut self, entry: &SwitchingEntry) -> bool {
        let Some(session) = entry.upstream_session else {
            return false;
        };
        self.send_signaling(
            entry.incoming_port,
            SignalingMessage::RequestDenied,
            session,
            entry.tail_end,
            backward(entry.backup_lsp),
            entry.backup_lsp,
            None,
        )
    }

    /// Starts tearing down the label bound to `port` and tells the peer.
    ///
    /// Returns true if a withdrawal is now in flight and an acknowledgment
    /// is expected.
    pub(crate) fn send_withdrawal(&mut self, entry: &mut SwitchingEntry, port: PortId) -> bool {
        let Some(role) = entry.role_of(port) else {
            return false;
        };
        let state = match role {
            PortRole::BackupOutgoing => &mut entry.backup_outgoing_label,
            PortRole::Incoming | PortRole::Outgoing => &mut entry.outgoing_label,
        };
        if let Err(e) = state.apply(LabelEvent::Withdraw) {
            debug!("{}: {}", self.address, e);
            return false;
        }
        let Some((session, direction, backup_lsp)) = session_towards(entry, port) else {
            return false;
        };
        if !self.is_internal(port) || self.link_is_broken(port) {
            return false;
        }
        self.send_signaling(
            port,
            SignalingMessage::Withdrawal,
            session,
            entry.tail_end,
            direction,
            backup_lsp,
            None,
        )
    }

    /// Acknowledges a withdrawal received on `port`.
    pub(crate) fn send_withdrawal_ack(&mut self, entry: &SwitchingEntry, port: PortId) -> bool {
        let Some((session, direction, backup_lsp)) = session_towards(entry, port) else {
            return false;
        };
        self.send_signaling(
            port,
            SignalingMessage::WithdrawalOk,
            session,
            entry.tail_end,
            direction,
            backup_lsp,
            None,
        )
    }

    /// Retransmits the withdrawals of an entry being removed.
    pub(crate) fn resend_withdrawals(&mut self, entry: &mut SwitchingEntry) {
        if entry.upstream_session.is_some() {
            let port = entry.incoming_port;
            self.send_withdrawal(entry, port);
        }
        if let Some(port) = entry.outgoing_port {
            self.send_withdrawal(entry, port);
        }
        if entry.backup_outgoing_label == LabelState::Removing {
            if let Some(port) = entry.backup_outgoing_port {
                self.send_withdrawal(entry, port);
            }
        }
    }

    /// Moves traffic to the established backup LSP.
    pub(crate) fn fail_over(&mut self, entry: &mut SwitchingEntry) {
        if let Some(link) = entry.backup_outgoing_port.and_then(|p| self.link(p)) {
            link.set_lsp_up();
        }
        if let Some(link) = entry.outgoing_port.and_then(|p| self.link(p)) {
            link.set_backup_lsp_down();
        }
        entry.switch_to_backup();
        info!(
            "{}: LSP towards {} switched to backup via port {:?}",
            self.address, entry.tail_end, entry.outgoing_port
        );
    }

    /// Withdraws the backup LSP, if one exists in any form.
    pub(crate) fn teardown_backup(&mut self, entry: &mut SwitchingEntry) {
        if !entry.backup_lsp_needs_teardown() {
            return;
        }
        let Some(port) = entry.backup_outgoing_port else {
            return;
        };
        if !self.send_withdrawal(entry, port) {
            entry.clear_backup();
        }
    }

    /// Gives up on a backup withdrawal that was never acknowledged.
    fn abandon_backup(&self, entry: &mut SwitchingEntry) {
        if entry.backup_outgoing_label != LabelState::Removing {
            return;
        }
        if let Some(link) = entry.backup_outgoing_port.and_then(|p| self.link(p)) {
            link.set_backup_lsp_down();
        }
        entry.clear_backup();
    }

    /// Releases the link of an established primary LSP.
    fn release_outgoing_link(&self, entry: &SwitchingEntry) {
        if let Some(link) = entry.outgoing_port.and_then(|p| self.link(p)) {
            if entry.backup_lsp {
                link.set_backup_lsp_down();
            } else {
                link.remove_lsp();
            }
        }
    }

    /// Upstream tears the LSP down. Returns true if the entry is done.
    fn withdrawal_from_upstream(&mut self, entry: &mut SwitchingEntry, port: PortId) -> bool {
        self.send_withdrawal_ack(entry, port);
        match entry.outgoing_label {
            LabelState::Removing => return false,
            LabelState::Withdrawn => return entry.is_fully_withdrawn(),
            LabelState::Undefined | LabelState::Assigned => withdraw_locally(&mut entry.outgoing_label),
            LabelState::Requested | LabelState::Unavailable | LabelState::Label(_) => {
                let downstream = entry
                    .outgoing_port
                    .filter(|p| self.is_internal(*p) && !self.link_is_broken(*p));
                let in_flight = match downstream {
                    Some(out) => self.send_withdrawal(entry, out),
                    None => false,
                };
                if !in_flight {
                    withdraw_locally(&mut entry.outgoing_label);
                }
            }
        }
        self.teardown_backup(entry);
        entry.is_fully_withdrawn()
    }

    /// Downstream tears our primary LSP down. Returns true if the entry is
    /// done.
    fn withdrawal_from_downstream(&mut self, entry: &mut SwitchingEntry, port: PortId) -> bool {
        self.send_withdrawal_ack(entry, port);
        match entry.outgoing_label {
            LabelState::Removing => return false,
            LabelState::Withdrawn => return entry.is_fully_withdrawn(),
            LabelState::Label(_) if entry.backup_lsp_established() => {
                self.fail_over(entry);
                return false;
            }
            LabelState::Label(_) => self.release_outgoing_link(entry),
            _ => {}
        }
        let upstream = entry.upstream_session.is_some()
            && self.is_internal(entry.incoming_port)
            && !self.link_is_broken(entry.incoming_port);
        let in_flight = upstream && {
            let incoming = entry.incoming_port;
            self.send_withdrawal(entry, incoming)
        };
        if !in_flight {
            withdraw_locally(&mut entry.outgoing_label);
        }
        self.teardown_backup(entry);
        entry.is_fully_withdrawn()
    }

    /// The backup next hop tears our backup LSP down. Returns true if the
    /// entry is done.
    fn withdrawal_from_backup(&mut self, entry: &mut SwitchingEntry, port: PortId) -> bool {
        self.send_withdrawal_ack(entry, port);
        if entry.backup_outgoing_label.label().is_some() {
            if let Some(link) = self.link(port) {
                link.set_backup_lsp_down();
            }
        }
        entry.clear_backup();
        entry.outgoing_label == LabelState::Withdrawn
    }
}

impl ActiveLerNode {
    pub(crate) fn handle_signaling(&mut self, pdu: SignalingPdu, port: PortId) -> Disposition {
        match pdu.message {
            SignalingMessage::Request => self.handle_request(pdu, port),
            SignalingMessage::RequestOk => self.handle_request_ok(pdu, port),
            SignalingMessage::RequestDenied => self.handle_request_denied(pdu, port),
            SignalingMessage::Withdrawal => self.handle_withdrawal(pdu, port),
            SignalingMessage::WithdrawalOk => self.handle_withdrawal_ok(pdu, port),
        }
    }

    fn reject(&mut self, pdu: SignalingPdu, reason: &str) -> Disposition {
        debug!(
            "{}: {} session {} dropped: {}",
            self.io.address, pdu.message, pdu.session_id, reason
        );
        self.io.discard(pdu.into());
        Disposition::Discarded
    }

    /// Finds the entry a withdrawal (or its acknowledgment) refers to.
    fn lookup_withdrawal(&self, pdu: &SignalingPdu, port: PortId) -> Option<(EntryId, PortRole)> {
        let id = if pdu.direction.is_forward() {
            self.switching.lookup_by_upstream_session(pdu.session_id, port)?
        } else {
            self.switching.lookup_by_local_session(pdu.session_id)?
        };
        let role = self.switching.get(id)?.role_of(port)?;
        Some((id, role))
    }

    fn handle_request(&mut self, pdu: SignalingPdu, port: PortId) -> Disposition {
        let id = match self.switching.lookup_by_upstream_session(pdu.session_id, port) {
            Some(id) => id,
            None => match self.create_entry_from_request(&pdu, port) {
                Ok(id) => id,
                Err(e) => {
                    warn!("{}: cannot serve label request: {}", self.io.address, e);
                    self.io.send_signaling(
                        port,
                        SignalingMessage::RequestDenied,
                        pdu.session_id,
                        pdu.target,
                        backward(pdu.backup_lsp),
                        pdu.backup_lsp,
                        None,
                    );
                    return Disposition::Routed;
                }
            },
        };
        let Some(entry) = self.switching.get_mut(id) else {
            return self.reject(pdu, "entry vanished");
        };
        match entry.outgoing_label {
            LabelState::Undefined => {
                self.io.request_label(entry);
            }
            LabelState::Requested => {}
            LabelState::Unavailable => {
                self.io.send_deny(entry);
            }
            LabelState::Assigned | LabelState::Label(_) => {
                self.io.send_assign(entry);
            }
            LabelState::Removing => {
                self.io.send_withdrawal(entry, port);
            }
            LabelState::Withdrawn => return self.reject(pdu, "LSP already withdrawn"),
        }
        Disposition::Routed
    }

    fn handle_request_ok(&mut self, pdu: SignalingPdu, port: PortId) -> Disposition {
        let Some(label) = pdu.label else {
            return self.reject(pdu, "no label");
        };
        let Some(id) = self.switching.lookup_by_local_session(pdu.session_id) else {
            return self.reject(pdu, "unknown session");
        };
        let role = self.switching.get(id).and_then(|e| e.role_of(port));
        match role {
            Some(PortRole::Outgoing) => {
                let Some(entry) = self.switching.get_mut(id) else {
                    return self.reject(pdu, "entry vanished");
                };
                if let Err(e) = entry.outgoing_label.apply(LabelEvent::Assign(label)) {
                    return self.reject(pdu, &e.to_string());
                }
                if let Err(e) = self.switching.bind_local_label(id) {
                    warn!("{}: cannot bind a local label: {}", self.io.address, e);
                }
                let Some(entry) = self.switching.get_mut(id) else {
                    return Disposition::Routed;
                };
                if let Some(link) = self.io.link(port) {
                    if entry.backup_lsp {
                        link.set_backup_lsp();
                    } else {
                        link.set_lsp_up();
                    }
                }
                info!(
                    "{}: LSP towards {} up via port {} with label {}",
                    self.io.address, entry.tail_end, port, label
                );
                self.io.send_assign(entry);
            }
            Some(PortRole::BackupOutgoing) => {
                let Some(entry) = self.switching.get_mut(id) else {
                    return self.reject(pdu, "entry vanished");
                };
                if let Err(e) = entry.backup_outgoing_label.apply(LabelEvent::Assign(label)) {
                    return self.reject(pdu, &e.to_string());
                }
                if let Some(link) = self.io.link(port) {
                    link.set_backup_lsp();
                }
                info!(
                    "{}: backup LSP towards {} up via port {} with label {}",
                    self.io.address, entry.tail_end, port, label
                );
            }
            Some(PortRole::Incoming) | None => return self.reject(pdu, "not from a downstream port"),
        }
        Disposition::Routed
    }

    fn handle_request_denied(&mut self, pdu: SignalingPdu, port: PortId) -> Disposition {
        let Some(id) = self.switching.lookup_by_local_session(pdu.session_id) else {
            return self.reject(pdu, "unknown session");
        };
        let Some(entry) = self.switching.get_mut(id) else {
            return self.reject(pdu, "entry vanished");
        };
        match entry.role_of(port) {
            Some(PortRole::Outgoing) => {
                if let Err(e) = entry.outgoing_label.apply(LabelEvent::Deny) {
                    return self.reject(pdu, &e.to_string());
                }
                info!("{}: label towards {} denied", self.io.address, entry.tail_end);
                self.io.send_deny(entry);
            }
            Some(PortRole::BackupOutgoing) => {
                if let Err(e) = entry.backup_outgoing_label.apply(LabelEvent::Deny) {
                    return self.reject(pdu, &e.to_string());
                }
                info!("{}: backup label towards {} denied", self.io.address, entry.tail_end);
            }
            Some(PortRole::Incoming) | None => return self.reject(pdu, "not from a downstream port"),
        }
        Disposition::Routed
    }

    fn handle_withdrawal(&mut self, pdu: SignalingPdu, port: PortId) -> Disposition {
        let Some((id, role)) = self.lookup_withdrawal(&pdu, port) else {
            return self.reject(pdu, "unknown session");
        };
        let Some(entry) = self.switching.get_mut(id) else {
            return self.reject(pdu, "entry vanished");
        };
        let done = match role {
            PortRole::Incoming => self.io.withdrawal_from_upstream(entry, port),
            PortRole::Outgoing => self.io.withdrawal_from_downstream(entry, port),
            PortRole::BackupOutgoing => self.io.withdrawal_from_backup(entry, port),
        };
        if done {
            self.remove_entry(id);
        }
        Disposition::Routed
    }

    fn handle_withdrawal_ok(&mut self, pdu: SignalingPdu, port: PortId) -> Disposition {
        let Some((id, role)) = self.lookup_withdrawal(&pdu, port) else {
            return self.reject(pdu, "unknown session");
        };
        let Some(entry) = self.switching.get_mut(id) else {
            return self.reject(pdu, "entry vanished");
        };
        let done = match role {
            PortRole::Incoming => {
                if !matches!(entry.outgoing_label, LabelState::Removing | LabelState::Withdrawn) {
                    return self.reject(pdu, "no withdrawal pending upstream");
                }
                true
            }
            PortRole::Outgoing => {
                if entry.outgoing_label != LabelState::Removing {
                    return self.reject(pdu, "no withdrawal pending downstream");
                }
                self.io.release_outgoing_link(entry);
                withdraw_locally(&mut entry.outgoing_label);
                entry.is_fully_withdrawn()
            }
            PortRole::BackupOutgoing => {
                if entry.backup_outgoing_label != LabelState::Removing {
                    return self.reject(pdu, "no backup withdrawal pending");
                }
                if let Some(link) = self.io.link(port) {
                    link.set_backup_lsp_down();
                }
                entry.clear_backup();
                entry.outgoing_label == LabelState::Withdrawn
            }
        };
        if done {
            self.remove_entry(id);
        }
        Disposition::Routed
    }

    /// Creates the entry serving a label request from upstream.
    fn create_entry_from_request(&mut self, pdu: &SignalingPdu, port: PortId) -> Result<EntryId> {
        let hop = self.io.next_hop(pdu.target, None).ok_or(LerError::NoNextHop {
            from: self.io.address,
            to: pdu.target,
        })?;
        let outgoing = self
            .io
            .port_towards(hop)
            .ok_or(LerError::NoNextHop { from: self.io.address, to: pdu.target })?;
        let in_kind = self.io.attached_link(port)?.kind();
        let out_kind = self.io.attached_link(outgoing)?.kind();
        let session = self.io.next_session_id()?;

        let mut entry = SwitchingEntry::new(
            EntryKind::Label,
            port,
            LabelStackOp::for_links(in_kind, out_kind),
            pdu.target,
            session,
        )
        .with_retries(self.config.signaling_timeout_ns, self.config.signaling_attempts);
        entry.outgoing_port = Some(outgoing);
        entry.upstream_session = Some(pdu.session_id);
        entry.backup_lsp = pdu.backup_lsp;
        if self.io.is_exit_ler(pdu.target) {
            entry.label_or_fec = Some(self.switching.new_label()?.as_u32());
            entry.outgoing_label = LabelState::Assigned;
        }
        debug!(
            "{}: new {} entry for session {} on port {} towards {}",
            self.io.address, entry.operation, pdu.session_id, port, pdu.target
        );
        self.switching.insert(entry)
    }

    /// Advances the signaling retransmission timers by one tick.
    pub(crate) fn signaling_timer_pass(&mut self) {
        let step = self.step_ns;
        let io = &mut self.io;
        self.switching.retain(|_, entry| {
            entry.decrease_timeout(step);
            let backup_removing = entry.backup_outgoing_label == LabelState::Removing;
            let keep = match entry.outgoing_label {
                LabelState::Requested | LabelState::Removing if !entry.timed_out() => true,
                LabelState::Requested => {
                    if entry.consume_attempt() {
                        debug!("{}: retrying label request towards {}", io.address, entry.tail_end);
                        io.request_label(entry);
                        true
                    } else {
                        info!("{}: label request towards {} timed out", io.address, entry.tail_end);
                        io.send_deny(entry);
                        false
                    }
                }
                LabelState::Removing => {
                    if entry.consume_attempt() {
                        debug!("{}: retrying withdrawal towards {}", io.address, entry.tail_end);
                        io.resend_withdrawals(entry);
                        true
                    } else {
                        info!("{}: withdrawal towards {} never acknowledged", io.address, entry.tail_end);
                        io.abandon_backup(entry);
                        false
                    }
                }
                _ if backup_removing && !entry.timed_out() => true,
                _ if backup_removing => {
                    if entry.consume_attempt() {
                        debug!("{}: retrying backup withdrawal towards {}", io.address, entry.tail_end);
                        if let Some(port) = entry.backup_outgoing_port {
                            io.send_withdrawal(entry, port);
                        }
                        true
                    } else {
                        info!(
                            "{}: backup withdrawal towards {} never acknowledged",
                            io.address, entry.tail_end
                        );
                        io.abandon_backup(entry);
                        entry.reset_retries();
                        entry.outgoing_label != LabelState::Withdrawn
                    }
                }
                _ => {
                    entry.reset_retries();
                    true
                }
            };
            if !keep {
                io.emit(EventKind::LabelRemoved);
            }
            keep
        });
    }
}
