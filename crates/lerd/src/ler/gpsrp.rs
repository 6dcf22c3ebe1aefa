//! Packet recovery protocol (GPSRP) engine.

use log::{debug, info, warn};

use gosmpls_types::Ipv4Address;

use crate::pdu::{MplsPdu, RecoveryMessage, RecoveryPdu};
use crate::ports::PortId;

use super::forwarding::Disposition;
use super::io::NodeIo;
use super::node::ActiveLerNode;

impl NodeIo {
    pub(crate) fn send_recovery(
        &mut self,
        port: PortId,
        message: RecoveryMessage,
        target: Ipv4Address,
        flow_id: u32,
        packet_id: u32,
    ) -> bool {
        let id = match self.next_packet_id() {
            Ok(id) => id,
            Err(e) => {
                warn!("{}: {} not sent: {}", self.address, message, e);
                return false;
            }
        };
        debug!(
            "{}: {} for {}:{} to {} on port {}",
            self.address, message, flow_id, packet_id, target, port
        );
        let pdu = RecoveryPdu::new(id, self.address, target, message, flow_id, packet_id);
        self.send_generated(port, pdu.into())
    }
}

impl ActiveLerNode {
    /// Starts recovering a GoS packet that arrived damaged on `port`.
    pub(crate) fn run_recovery_protocol(&mut self, packet: &MplsPdu, port: PortId) {
        let Some(entry) = self.recovery.add_entry(packet, port) else {
            return;
        };
        let (flow_id, packet_id) = entry.key();
        match entry.crossed_node() {
            Some(target) => {
                self.io.send_recovery(
                    port,
                    RecoveryMessage::RetransmissionRequest,
                    target,
                    flow_id,
                    packet_id,
                );
            }
            None => {
                debug!(
                    "{}: nobody cached {}:{}, giving up",
                    self.io.address, flow_id, packet_id
                );
                self.recovery.remove(flow_id, packet_id);
            }
        }
    }

    pub(crate) fn handle_recovery(&mut self, pdu: RecoveryPdu, port: PortId) -> Disposition {
        if pdu.header.tail_end != self.io.address {
            return self.relay_recovery(pdu);
        }
        match pdu.message {
            RecoveryMessage::RetransmissionRequest => {
                match self.cache.get(pdu.flow_id, pdu.packet_id) {
                    Some(packet) => {
                        info!(
                            "{}: retransmitting {}:{} for {}",
                            self.io.address, pdu.flow_id, pdu.packet_id, pdu.header.origin
                        );
                        self.io.send_recovery(
                            port,
                            RecoveryMessage::RetransmissionOk,
                            pdu.header.origin,
                            pdu.flow_id,
                            pdu.packet_id,
                        );
                        self.io.resend(port, packet.into());
                    }
                    None => {
                        self.io.send_recovery(
                            port,
                            RecoveryMessage::RetransmissionNotPossible,
                            pdu.header.origin,
                            pdu.flow_id,
                            pdu.packet_id,
                        );
                    }
                }
            }
            RecoveryMessage::RetransmissionNotPossible => self.retry_elsewhere(&pdu),
            RecoveryMessage::RetransmissionOk => {
                if self.recovery.remove(pdu.flow_id, pdu.packet_id).is_none() {
                    debug!(
                        "{}: late {} for {}:{}",
                        self.io.address, pdu.message, pdu.flow_id, pdu.packet_id
                    );
                }
            }
        }
        Disposition::Routed
    }

    /// Sends a recovery message one hop closer to its target.
    fn relay_recovery(&mut self, pdu: RecoveryPdu) -> Disposition {
        let target = pdu.header.tail_end;
        let port = self
            .io
            .next_hop(target, None)
            .and_then(|hop| self.io.port_towards(hop));
        match port {
            Some(port) => {
                self.io.forward(port, pdu.into());
                Disposition::Routed
            }
            None => {
                debug!("{}: no path to {} for {}", self.io.address, target, pdu.message);
                self.io.discard(pdu.into());
                Disposition::Discarded
            }
        }
    }

    /// The asked node lost the packet: ask the node that cached it before.
    fn retry_elsewhere(&mut self, pdu: &RecoveryPdu) {
        let Some(entry) = self.recovery.get_mut(pdu.flow_id, pdu.packet_id) else {
            return;
        };
        entry.reset_timeout();
        if entry.is_purgeable() {
            self.recovery.remove(pdu.flow_id, pdu.packet_id);
            return;
        }
        if entry.crossed_node() == Some(pdu.header.origin) {
            entry.fall_back();
        }
        let Some(target) = entry.crossed_node() else {
            debug!(
                "{}: no cached copy of {}:{} left in the domain",
                self.io.address, pdu.flow_id, pdu.packet_id
            );
            self.recovery.remove(pdu.flow_id, pdu.packet_id);
            return;
        };
        entry.consume_attempt();
        let port = entry.outgoing_port;
        self.io.send_recovery(
            port,
            RecoveryMessage::RetransmissionRequest,
            target,
            pdu.flow_id,
            pdu.packet_id,
        );
    }
}
