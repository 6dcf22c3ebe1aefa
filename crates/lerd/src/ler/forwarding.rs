//! Forwarding loop: classification, label stack operations and dispatch.

use log::{debug, warn};

use gosmpls_types::{GosLevel, Ipv4Address, LinkKind};

use crate::error::{LerError, Result};
use crate::pdu::{Ipv4Pdu, LabelStackEntry, MplsPdu, Pdu};
use crate::ports::PortId;
use crate::switching::{EntryId, EntryKind, LabelStackOp, LabelState, SwitchingEntry};

use super::node::ActiveLerNode;

/// What happened to a packet pulled from a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Forwarded or consumed by a protocol engine.
    Routed,
    /// Put back on its port to wait for a label.
    Requeued,
    Discarded,
}

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Stable FEC fingerprint of an (origin, destination) pair: 32-bit FNV-1a
/// over the eight address octets.
pub fn fec_fingerprint(origin: Ipv4Address, tail_end: Ipv4Address) -> u32 {
    origin
        .octets()
        .iter()
        .chain(tail_end.octets().iter())
        .fold(FNV_OFFSET_BASIS, |hash, octet| {
            (hash ^ u32::from(*octet)).wrapping_mul(FNV_PRIME)
        })
}

impl ActiveLerNode {
    /// Drains the ports while the tick's budget allows. Returns true if at
    /// least one packet was pulled.
    pub(crate) fn route_packets(&mut self) -> bool {
        let mut routed_any = false;
        loop {
            let Some(size) = self.io.ports.next_packet_size() else {
                break;
            };
            if u64::from(size) > self.max_switchable_octets() {
                break;
            }
            let Some((port, pdu)) = self.io.ports.next_packet() else {
                break;
            };
            routed_any = true;
            let size = pdu.size();
            let disposition = match pdu {
                Pdu::Ipv4(packet) => self.handle_ipv4(packet, port),
                Pdu::Mpls(packet) => self.handle_mpls(packet, port),
                Pdu::Signaling(packet) => self.handle_signaling(packet, port),
                Pdu::Recovery(packet) => self.handle_recovery(packet, port),
                other @ Pdu::Other { .. } => {
                    self.io.discard(other);
                    Disposition::Discarded
                }
            };
            if disposition != Disposition::Discarded {
                self.available_ns -= self.ns_for_octets(size);
            }
        }
        routed_any
    }

    fn handle_ipv4(&mut self, packet: Ipv4Pdu, port: PortId) -> Disposition {
        let fec = fec_fingerprint(packet.header.origin, packet.header.tail_end);
        let id = match self.switching.lookup(port, fec, EntryKind::Fec) {
            Some(id) => id,
            None => match self.create_fec_entry(&packet, port, fec) {
                Ok(id) => id,
                Err(e) => {
                    debug!("{}: cannot classify IPv4 packet {}: {}", self.io.address, packet.id, e);
                    self.io.discard(packet.into());
                    return Disposition::Discarded;
                }
            },
        };
        let wants_backup = packet
            .header
            .gos
            .as_ref()
            .is_some_and(|g| g.level.wants_backup_lsp());
        let Some(entry) = self.switching.get_mut(id) else {
            self.io.discard(packet.into());
            return Disposition::Discarded;
        };

        match entry.outgoing_label {
            LabelState::Undefined => {
                self.io.request_label(entry);
                self.io.requeue(port, packet.into());
                return Disposition::Requeued;
            }
            LabelState::Requested => {
                self.io.requeue(port, packet.into());
                return Disposition::Requeued;
            }
            LabelState::Unavailable | LabelState::Removing | LabelState::Withdrawn => {
                self.io.discard(packet.into());
                return Disposition::Discarded;
            }
            LabelState::Assigned | LabelState::Label(_) => {}
        }

        match entry.operation {
            LabelStackOp::Push => {
                let (Some(label), Some(out)) = (entry.outgoing_label.label(), entry.outgoing_port) else {
                    self.io.discard(packet.into());
                    return Disposition::Discarded;
                };
                if wants_backup {
                    self.io.request_backup_label(entry);
                }
                let id = match self.io.next_packet_id() {
                    Ok(id) => id,
                    Err(e) => {
                        warn!("{}: cannot label packet {}: {}", self.io.address, packet.id, e);
                        self.io.discard(packet.into());
                        return Disposition::Discarded;
                    }
                };
                let ttl = packet.header.ttl;
                let mut mpls = MplsPdu::encapsulate(packet, id, label);
                if let Some(gos) = mpls.header.gos.as_mut() {
                    let marker = LabelStackEntry::gos_marker(gos.level, ttl);
                    gos.mark_crossed(self.io.address);
                    mpls.stack.push(marker);
                    self.cache.put(mpls.clone());
                }
                self.io.forward(out, mpls.into());
                Disposition::Routed
            }
            LabelStackOp::Noop => {
                let Some(out) = entry.outgoing_port else {
                    self.io.discard(packet.into());
                    return Disposition::Discarded;
                };
                self.io.forward(out, packet.into());
                Disposition::Routed
            }
            LabelStackOp::Pop | LabelStackOp::Swap => {
                debug!("{}: {} makes no sense on unlabeled traffic", self.io.address, entry.operation);
                self.io.discard(packet.into());
                Disposition::Discarded
            }
        }
    }

    fn handle_mpls(&mut self, mut packet: MplsPdu, port: PortId) -> Disposition {
        let marker = match packet.stack.top() {
            Some(top) if top.is_gos_marker() => packet.stack.pop(),
            _ => None,
        };
        let wants_backup = marker
            .and_then(|m| GosLevel::from_exp(m.exp).ok())
            .is_some_and(|level| level.wants_backup_lsp());
        let reattach = |packet: &mut MplsPdu| {
            if let Some(m) = marker {
                packet.stack.push(m);
            }
        };

        let Some(top) = packet.stack.top().copied() else {
            reattach(&mut packet);
            self.io.discard(packet.into());
            return Disposition::Discarded;
        };
        let incoming = top.label.as_u32();
        let id = match self.switching.lookup(port, incoming, EntryKind::Label) {
            Some(id) => id,
            None => match self.create_ilm_entry(&packet, port, incoming) {
                Ok(id) => id,
                Err(e) => {
                    debug!("{}: cannot classify MPLS packet {}: {}", self.io.address, packet.id, e);
                    reattach(&mut packet);
                    self.io.discard(packet.into());
                    return Disposition::Discarded;
                }
            },
        };
        let Some(entry) = self.switching.get_mut(id) else {
            reattach(&mut packet);
            self.io.discard(packet.into());
            return Disposition::Discarded;
        };

        match entry.outgoing_label {
            LabelState::Undefined => {
                self.io.request_label(entry);
                reattach(&mut packet);
                self.io.requeue(port, packet.into());
                return Disposition::Requeued;
            }
            LabelState::Requested => {
                reattach(&mut packet);
                self.io.requeue(port, packet.into());
                return Disposition::Requeued;
            }
            LabelState::Unavailable | LabelState::Removing | LabelState::Withdrawn => {
                reattach(&mut packet);
                self.io.discard(packet.into());
                return Disposition::Discarded;
            }
            LabelState::Assigned | LabelState::Label(_) => {}
        }

        let Some(out) = entry.outgoing_port else {
            reattach(&mut packet);
            self.io.discard(packet.into());
            return Disposition::Discarded;
        };
        let cache_copy = match entry.operation {
            LabelStackOp::Push | LabelStackOp::Swap => {
                let Some(label) = entry.outgoing_label.label() else {
                    reattach(&mut packet);
                    self.io.discard(packet.into());
                    return Disposition::Discarded;
                };
                if wants_backup {
                    self.io.request_backup_label(entry);
                }
                let ttl = top.ttl.saturating_sub(1);
                if entry.operation == LabelStackOp::Push {
                    packet.stack.push(LabelStackEntry::new(label, 0, ttl, false));
                } else if let Some(top) = packet.stack.top_mut() {
                    top.label = label;
                    top.ttl = ttl;
                }
                reattach(&mut packet);
                marker.is_some()
            }
            LabelStackOp::Pop if top.bottom_of_stack => {
                let id = match self.io.next_packet_id() {
                    Ok(id) => id,
                    Err(e) => {
                        warn!("{}: cannot unlabel packet {}: {}", self.io.address, packet.id, e);
                        self.io.discard(packet.into());
                        return Disposition::Discarded;
                    }
                };
                self.io.forward(out, packet.decapsulate(id).into());
                return Disposition::Routed;
            }
            LabelStackOp::Pop => {
                packet.stack.pop();
                reattach(&mut packet);
                false
            }
            LabelStackOp::Noop => {
                reattach(&mut packet);
                false
            }
        };

        if cache_copy {
            if let Some(gos) = packet.header.gos.as_mut() {
                gos.mark_crossed(self.io.address);
            }
            self.cache.put(packet.clone());
        }
        self.io.forward(out, packet.into());
        Disposition::Routed
    }

    /// Creates the FEC entry classifying unlabeled traffic.
    fn create_fec_entry(&mut self, packet: &Ipv4Pdu, port: PortId, fec: u32) -> Result<EntryId> {
        let tail_end = packet.header.tail_end;
        let in_kind = self.io.attached_link(port)?.kind();
        if in_kind.is_internal() {
            return Err(LerError::UnsupportedFlow(format!(
                "unlabeled traffic on internal port {}",
                port
            )));
        }
        let mut entry = self.new_entry(EntryKind::Fec, port, in_kind, tail_end)?;
        entry.label_or_fec = Some(fec);
        self.switching.insert(entry)
    }

    /// Creates the ILM entry for a label nobody signaled on this port.
    fn create_ilm_entry(&mut self, packet: &MplsPdu, port: PortId, label: u32) -> Result<EntryId> {
        let in_kind = self.io.attached_link(port)?.kind();
        let mut entry = self.new_entry(EntryKind::Label, port, in_kind, packet.header.tail_end)?;
        entry.label_or_fec = Some(label);
        self.switching.insert(entry)
    }

    fn new_entry(
        &mut self,
        kind: EntryKind,
        port: PortId,
        in_kind: LinkKind,
        tail_end: Ipv4Address,
    ) -> Result<SwitchingEntry> {
        let no_path = || LerError::NoNextHop {
            from: self.io.address,
            to: tail_end,
        };
        let hop = self.io.next_hop(tail_end, None).ok_or_else(no_path)?;
        let outgoing = self.io.port_towards(hop).ok_or_else(no_path)?;
        let out_kind = self.io.attached_link(outgoing)?.kind();
        let session = self.io.next_session_id()?;

        let mut entry = SwitchingEntry::new(
            kind,
            port,
            LabelStackOp::for_links(in_kind, out_kind),
            tail_end,
            session,
        )
        .with_retries(self.config.signaling_timeout_ns, self.config.signaling_attempts);
        entry.outgoing_port = Some(outgoing);
        if self.io.is_exit_ler(tail_end) {
            entry.outgoing_label = LabelState::Assigned;
        }
        debug!(
            "{}: new {} entry on port {} towards {}: {}",
            self.io.address, kind, port, tail_end, entry.operation
        );
        Ok(entry)
    }
}
