//! Collaborators and per-node generators shared by the protocol engines.

use std::sync::Arc;

use log::{debug, warn};

use gosmpls_common::IdGenerator;
use gosmpls_types::{Ipv4Address, LinkKind};

use crate::error::{LerError, Result};
use crate::events::{EventKind, EventSink, SimulationEvent};
use crate::pdu::Pdu;
use crate::ports::{Link, Port, PortId, PortSet};
use crate::stats::{Outcome, StatsSink};
use crate::topology::Topology;

/// Everything a node reaches outside its own tables.
pub(crate) struct NodeIo {
    pub(crate) address: Ipv4Address,
    pub(crate) ports: Arc<dyn PortSet>,
    pub(crate) topology: Arc<dyn Topology>,
    events: Arc<dyn EventSink>,
    stats: Arc<dyn StatsSink>,
    packet_ids: IdGenerator<u64>,
    event_ids: IdGenerator<u64>,
    session_ids: IdGenerator<u32>,
    /// Simulated time of the current tick, in ns.
    pub(crate) instant: u64,
}

impl NodeIo {
    pub(crate) fn new(
        address: Ipv4Address,
        ports: Arc<dyn PortSet>,
        topology: Arc<dyn Topology>,
        events: Arc<dyn EventSink>,
        stats: Arc<dyn StatsSink>,
    ) -> Self {
        Self {
            address,
            ports,
            topology,
            events,
            stats,
            packet_ids: IdGenerator::new(),
            event_ids: IdGenerator::new(),
            session_ids: IdGenerator::new(),
            instant: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.packet_ids.reset();
        self.event_ids.reset();
        self.session_ids.reset();
        self.instant = 0;
    }

    pub(crate) fn next_packet_id(&mut self) -> Result<u64> {
        self.packet_ids
            .next_id()
            .map_err(|_| LerError::IdExhausted("packet"))
    }

    pub(crate) fn next_session_id(&mut self) -> Result<u32> {
        self.session_ids
            .next_id()
            .map_err(|_| LerError::IdExhausted("signaling session"))
    }

    /// Emits an event. Sink failures never abort processing.
    pub(crate) fn emit(&mut self, kind: EventKind) {
        let id = match self.event_ids.next_id() {
            Ok(id) => id,
            Err(_) => {
                warn!("{}: event identifiers exhausted, dropping {:?}", self.address, kind);
                return;
            }
        };
        let event = SimulationEvent {
            id,
            source: self.address,
            instant: self.instant,
            kind,
        };
        if let Err(e) = self.events.emit(event) {
            warn!("{}: failed to emit event: {}", self.address, e);
        }
    }

    pub(crate) fn port(&self, id: PortId) -> Result<Arc<dyn Port>> {
        self.ports.port(id).ok_or(LerError::PortNotFound(id))
    }

    /// The link attached to `port`, which must exist.
    pub(crate) fn attached_link(&self, port: PortId) -> Result<Arc<dyn Link>> {
        self.port(port)?.link().ok_or(LerError::LinkNotFound(port))
    }

    pub(crate) fn link(&self, port: PortId) -> Option<Arc<dyn Link>> {
        self.ports.port(port).and_then(|p| p.link())
    }

    pub(crate) fn link_kind(&self, port: PortId) -> Option<LinkKind> {
        self.link(port).map(|l| l.kind())
    }

    /// Missing links count as broken.
    pub(crate) fn link_is_broken(&self, port: PortId) -> bool {
        self.link(port).map_or(true, |l| l.is_broken())
    }

    pub(crate) fn is_internal(&self, port: PortId) -> bool {
        self.link_kind(port) == Some(LinkKind::Internal)
    }

    pub(crate) fn neighbor(&self, port: PortId) -> Option<Ipv4Address> {
        self.ports.ip_of_neighbor(port)
    }

    pub(crate) fn next_hop(&self, to: Ipv4Address, exclude: Option<Ipv4Address>) -> Option<Ipv4Address> {
        self.topology.next_hop(self.address, to, exclude)
    }

    pub(crate) fn port_towards(&self, address: Ipv4Address) -> Option<PortId> {
        self.ports.port_connected_to(address).map(|p| p.id())
    }

    /// This node hands traffic for `address` out of the domain.
    pub(crate) fn is_exit_ler(&self, address: Ipv4Address) -> bool {
        self.next_hop(address, None)
            .and_then(|hop| self.ports.port_connected_to(hop))
            .and_then(|port| port.link())
            .is_some_and(|link| link.kind() == LinkKind::External)
    }

    fn put_on_port(&self, port: PortId, pdu: Pdu) -> std::result::Result<(), Pdu> {
        match self.port(port) {
            Ok(p) => {
                self.stats.record(&pdu, Outcome::Sent);
                p.put_packet_on_link(pdu);
                Ok(())
            }
            Err(e) => {
                debug!("{}: {}", self.address, e);
                Err(pdu)
            }
        }
    }

    /// Forwards a transit packet.
    pub(crate) fn forward(&mut self, port: PortId, pdu: Pdu) -> bool {
        let kind = pdu.kind();
        match self.put_on_port(port, pdu) {
            Ok(()) => {
                self.emit(EventKind::PacketRouted { pdu: kind });
                true
            }
            Err(pdu) => {
                self.discard(pdu);
                false
            }
        }
    }

    /// Sends a packet built by this node.
    pub(crate) fn send_generated(&mut self, port: PortId, pdu: Pdu) -> bool {
        let kind = pdu.kind();
        let size = pdu.size();
        match self.put_on_port(port, pdu) {
            Ok(()) => {
                self.emit(EventKind::PacketGenerated { pdu: kind, size });
                self.emit(EventKind::PacketSent { pdu: kind });
                true
            }
            Err(pdu) => {
                self.discard(pdu);
                false
            }
        }
    }

    /// Sends a copy of a packet this node already forwarded once.
    pub(crate) fn resend(&mut self, port: PortId, pdu: Pdu) -> bool {
        let kind = pdu.kind();
        match self.put_on_port(port, pdu) {
            Ok(()) => {
                self.emit(EventKind::PacketSent { pdu: kind });
                true
            }
            Err(pdu) => {
                self.discard(pdu);
                false
            }
        }
    }

    /// Puts a packet back on the port it arrived on.
    pub(crate) fn requeue(&mut self, port: PortId, pdu: Pdu) -> bool {
        match self.port(port) {
            Ok(p) => {
                p.re_enqueue(pdu);
                true
            }
            Err(e) => {
                debug!("{}: {}", self.address, e);
                self.discard(pdu);
                false
            }
        }
    }

    pub(crate) fn discard(&mut self, pdu: Pdu) {
        debug!("{}: discarding {} packet {}", self.address, pdu.kind(), pdu.id());
        self.stats.record(&pdu, Outcome::Discard);
        self.emit(EventKind::PacketDiscarded { pdu: pdu.kind() });
    }
}
