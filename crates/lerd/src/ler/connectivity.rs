//! Per-tick reconciliation of the tables with link state.

use log::{debug, info};

use crate::events::EventKind;
use crate::pdu::RecoveryMessage;
use crate::ports::PortId;
use crate::switching::{LabelState, SwitchingEntry};

use super::io::NodeIo;
use super::node::ActiveLerNode;

fn tearing_down(entry: &SwitchingEntry) -> bool {
    matches!(entry.outgoing_label, LabelState::Removing | LabelState::Withdrawn)
}

/// The peer behind `port` can take part in a teardown.
fn signaling_peer(io: &NodeIo, port: PortId) -> bool {
    io.is_internal(port) && !io.link_is_broken(port)
}

/// Brings one entry in line with its links. Returns false if the entry has
/// to go.
fn reconcile_entry(io: &mut NodeIo, entry: &mut SwitchingEntry) -> bool {
    let Some(outgoing) = entry.outgoing_port else {
        return false;
    };
    if io.link(entry.incoming_port).is_none() || io.link(outgoing).is_none() {
        return false;
    }
    let in_broken = io.link_is_broken(entry.incoming_port);
    let out_broken = io.link_is_broken(outgoing);

    if let Some(backup) = entry.backup_outgoing_port {
        if io.link_is_broken(backup) && !tearing_down(entry) {
            debug!("{}: backup link towards {} broke", io.address, entry.tail_end);
            entry.clear_backup();
        }
    }

    if out_broken && !in_broken && !tearing_down(entry) && entry.backup_lsp_established() {
        io.fail_over(entry);
        return true;
    }

    let in_external = !io.is_internal(entry.incoming_port);
    let out_external = !io.is_internal(outgoing);
    if (in_broken && out_broken) || (in_broken && out_external) || (out_broken && in_external) {
        debug!(
            "{}: entry {:?} towards {} lost its path",
            io.address,
            entry.key(),
            entry.tail_end
        );
        return false;
    }

    if tearing_down(entry) {
        return true;
    }

    if out_broken {
        if entry.upstream_session.is_some() && signaling_peer(io, entry.incoming_port) {
            info!(
                "{}: outgoing link towards {} broke, withdrawing upstream",
                io.address, entry.tail_end
            );
            let incoming = entry.incoming_port;
            io.send_withdrawal(entry, incoming);
            io.teardown_backup(entry);
            return true;
        }
        return false;
    }

    if in_broken {
        if entry.outgoing_label != LabelState::Undefined && signaling_peer(io, outgoing) {
            info!(
                "{}: incoming link of LSP towards {} broke, withdrawing downstream",
                io.address, entry.tail_end
            );
            io.send_withdrawal(entry, outgoing);
            io.teardown_backup(entry);
            return true;
        }
        return false;
    }
    true
}

impl ActiveLerNode {
    /// Reconciles the switching and recovery tables with the current link
    /// state.
    pub(crate) fn check_connectivity(&mut self) {
        let io = &mut self.io;
        self.switching.retain(|_, entry| {
            let keep = reconcile_entry(io, entry);
            if !keep {
                io.emit(EventKind::LabelRemoved);
            }
            keep
        });

        self.recovery.decrease_timeout(self.step_ns);
        let broken: Vec<PortId> = (0..self.io.ports.num_ports())
            .filter(|&port| self.io.link(port).is_some_and(|l| l.is_broken()))
            .collect();
        for port in broken {
            let purged = self.recovery.remove_for_port(port);
            if purged > 0 {
                debug!(
                    "{}: dropped {} recovery requests on broken port {}",
                    self.io.address, purged, port
                );
            }
        }

        for due in self.recovery.update_entries() {
            if self.io.link_is_broken(due.outgoing_port) {
                continue;
            }
            self.io.send_recovery(
                due.outgoing_port,
                RecoveryMessage::RetransmissionRequest,
                due.target,
                due.flow_id,
                due.packet_id,
            );
        }
    }
}
