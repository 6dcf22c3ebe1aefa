//! Port and link contracts of the surrounding node framework.
//!
//! Ports and links are owned by the topology. A node only reaches them
//! through these traits and never holds a lock of its own across a call,
//! so implementations must be safe to use from neighbors ticking in
//! parallel.

use std::sync::Arc;

use gosmpls_types::{Ipv4Address, LinkKind};

use crate::pdu::{MplsPdu, Pdu};

/// Index of a port within its node.
pub type PortId = usize;

/// A link between two ports.
pub trait Link: Send + Sync {
    /// Returns whether the link is inside or outside the MPLS domain.
    fn kind(&self) -> LinkKind;

    /// Returns true if the link is down.
    fn is_broken(&self) -> bool;

    /// Records that a primary LSP has been established over this link.
    fn set_lsp_up(&self);

    /// Records that a primary LSP over this link has been torn down.
    fn remove_lsp(&self);

    /// Records that a backup LSP has been established over this link.
    fn set_backup_lsp(&self);

    /// Records that a backup LSP over this link has been torn down.
    fn set_backup_lsp_down(&self);
}

/// A port of the node.
pub trait Port: Send + Sync {
    fn id(&self) -> PortId;

    /// Returns the attached link, if any.
    fn link(&self) -> Option<Arc<dyn Link>>;

    /// Returns the address of the node at the other end of the link.
    fn neighbor_address(&self) -> Option<Ipv4Address>;

    /// Hands the packet to the link for delivery to the neighbor.
    fn put_packet_on_link(&self, pdu: Pdu);

    /// Puts a packet back at the tail of this port's input buffer.
    fn re_enqueue(&self, pdu: Pdu);
}

/// The set of ports of a node.
pub trait PortSet: Send + Sync {
    fn num_ports(&self) -> usize;

    fn port(&self, id: PortId) -> Option<Arc<dyn Port>>;

    /// Returns the port whose neighbor is `address`.
    fn port_connected_to(&self, address: Ipv4Address) -> Option<Arc<dyn Port>> {
        (0..self.num_ports())
            .filter_map(|id| self.port(id))
            .find(|port| port.neighbor_address() == Some(address))
    }

    /// Returns the address of the neighbor reached through `id`.
    fn ip_of_neighbor(&self, id: PortId) -> Option<Ipv4Address> {
        self.port(id).and_then(|port| port.neighbor_address())
    }

    /// Returns true if any input buffer holds a packet.
    fn has_pending_packets(&self) -> bool;

    /// Returns the size in octets of the packet [`PortSet::next_packet`]
    /// would return.
    fn next_packet_size(&self) -> Option<u32>;

    /// Pulls the next packet, scanning the ports round robin.
    fn next_packet(&self) -> Option<(PortId, Pdu)>;

    /// Returns the buffer occupation of the fullest port, in percent.
    fn congestion_level(&self) -> u32;

    /// Drains the GoS packets that arrived damaged but identifiable.
    fn take_damaged_packets(&self) -> Vec<(PortId, MplsPdu)>;
}
