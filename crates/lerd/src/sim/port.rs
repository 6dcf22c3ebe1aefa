//! Buffered ports and the per-node port set.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use log::debug;
use parking_lot::{Mutex, RwLock};

use gosmpls_types::{Ipv4Address, LinkKind};

use crate::pdu::{MplsPdu, Pdu, PduKind};
use crate::ports::{Link, Port, PortId, PortSet};

use super::link::SimLink;

struct Attachment {
    link: Arc<SimLink>,
    peer: Weak<SimPort>,
    neighbor: Ipv4Address,
}

#[derive(Default)]
struct InputBuffer {
    packets: VecDeque<Pdu>,
    octets: u64,
}

impl InputBuffer {
    fn push(&mut self, pdu: Pdu) {
        self.octets += u64::from(pdu.size());
        self.packets.push_back(pdu);
    }

    fn pop(&mut self) -> Option<Pdu> {
        let pdu = self.packets.pop_front()?;
        self.octets = self.octets.saturating_sub(u64::from(pdu.size()));
        Some(pdu)
    }
}

/// A port with a bounded input buffer.
///
/// Packets that overflow the buffer are lost. Labeled GoS packets keep
/// enough of their header to be identified and are kept aside for the
/// recovery protocol.
pub struct SimPort {
    id: PortId,
    owner: Ipv4Address,
    capacity_octets: u64,
    attachment: RwLock<Option<Attachment>>,
    buffer: Mutex<InputBuffer>,
    damaged: Mutex<Vec<MplsPdu>>,
    dropped: AtomicU64,
}

impl SimPort {
    fn new(id: PortId, owner: Ipv4Address, capacity_octets: u64) -> Self {
        Self {
            id,
            owner,
            capacity_octets,
            attachment: RwLock::new(None),
            buffer: Mutex::new(InputBuffer::default()),
            damaged: Mutex::new(Vec::new()),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn owner(&self) -> Ipv4Address {
        self.owner
    }

    /// Packets lost on this port without a trace.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().packets.len()
    }

    /// Takes every packet waiting in the input buffer.
    pub fn drain(&self) -> Vec<Pdu> {
        let mut buffer = self.buffer.lock();
        buffer.octets = 0;
        buffer.packets.drain(..).collect()
    }

    /// Input buffer occupation, in percent.
    pub fn occupation(&self) -> u32 {
        if self.capacity_octets == 0 {
            return 100;
        }
        let octets = self.buffer.lock().octets;
        u32::try_from(octets.saturating_mul(100) / self.capacity_octets)
            .unwrap_or(u32::MAX)
            .min(100)
    }

    fn attach(&self, link: Arc<SimLink>, peer: &Arc<SimPort>) {
        *self.attachment.write() = Some(Attachment {
            link,
            peer: Arc::downgrade(peer),
            neighbor: peer.owner,
        });
    }

    /// Accepts a packet coming off the link.
    fn receive(&self, pdu: Pdu) {
        let mut buffer = self.buffer.lock();
        if buffer.octets + u64::from(pdu.size()) > self.capacity_octets {
            drop(buffer);
            debug!("{}: port {} overflowed", self.owner, self.id);
            self.damage(pdu);
            return;
        }
        buffer.push(pdu);
    }

    fn damage(&self, pdu: Pdu) {
        match pdu {
            Pdu::Mpls(packet) if packet.is_gos() => self.damaged.lock().push(packet),
            _ => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn peek_size(&self) -> Option<u32> {
        self.buffer.lock().packets.front().map(Pdu::size)
    }

    fn take(&self) -> Option<Pdu> {
        self.buffer.lock().pop()
    }
}

impl Port for SimPort {
    fn id(&self) -> PortId {
        self.id
    }

    fn link(&self) -> Option<Arc<dyn Link>> {
        self.attachment
            .read()
            .as_ref()
            .map(|a| a.link.clone() as Arc<dyn Link>)
    }

    fn neighbor_address(&self) -> Option<Ipv4Address> {
        self.attachment.read().as_ref().map(|a| a.neighbor)
    }

    fn put_packet_on_link(&self, pdu: Pdu) {
        let target = self.attachment.read().as_ref().and_then(|a| {
            if a.link.is_broken() {
                None
            } else {
                a.peer.upgrade().map(|peer| (peer, a.link.is_lossy()))
            }
        });
        match target {
            Some((peer, true)) if pdu.kind() == PduKind::MplsGos => peer.damage(pdu),
            Some((peer, _)) => peer.receive(pdu),
            None => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn re_enqueue(&self, pdu: Pdu) {
        self.buffer.lock().push(pdu);
    }
}

/// The ports of one node, scanned round robin.
pub struct SimPortSet {
    owner: Ipv4Address,
    capacity_octets: u64,
    ports: RwLock<Vec<Arc<SimPort>>>,
    cursor: AtomicUsize,
}

impl SimPortSet {
    pub fn new(owner: Ipv4Address, capacity_octets: u64) -> Self {
        Self {
            owner,
            capacity_octets,
            ports: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn owner(&self) -> Ipv4Address {
        self.owner
    }

    /// Adds an unattached port.
    pub fn add_port(&self) -> Arc<SimPort> {
        let mut ports = self.ports.write();
        let port = Arc::new(SimPort::new(ports.len(), self.owner, self.capacity_octets));
        ports.push(port.clone());
        port
    }

    pub fn sim_port(&self, id: PortId) -> Option<Arc<SimPort>> {
        self.ports.read().get(id).cloned()
    }

    pub fn sim_ports(&self) -> Vec<Arc<SimPort>> {
        self.ports.read().clone()
    }

    /// First port holding a packet, starting at the cursor.
    fn next_busy_port(&self) -> Option<Arc<SimPort>> {
        let ports = self.ports.read();
        let count = ports.len();
        if count == 0 {
            return None;
        }
        let start = self.cursor.load(Ordering::SeqCst) % count;
        (0..count)
            .map(|offset| &ports[(start + offset) % count])
            .find(|port| port.pending() > 0)
            .cloned()
    }
}

impl PortSet for SimPortSet {
    fn num_ports(&self) -> usize {
        self.ports.read().len()
    }

    fn port(&self, id: PortId) -> Option<Arc<dyn Port>> {
        self.sim_port(id).map(|p| p as Arc<dyn Port>)
    }

    fn has_pending_packets(&self) -> bool {
        self.ports.read().iter().any(|p| p.pending() > 0)
    }

    fn next_packet_size(&self) -> Option<u32> {
        self.next_busy_port().and_then(|p| p.peek_size())
    }

    fn next_packet(&self) -> Option<(PortId, Pdu)> {
        let port = self.next_busy_port()?;
        let pdu = port.take()?;
        self.cursor.store(port.id + 1, Ordering::SeqCst);
        Some((port.id, pdu))
    }

    fn congestion_level(&self) -> u32 {
        self.ports
            .read()
            .iter()
            .map(|p| p.occupation())
            .max()
            .unwrap_or(0)
    }

    fn take_damaged_packets(&self) -> Vec<(PortId, MplsPdu)> {
        self.ports
            .read()
            .iter()
            .flat_map(|p| {
                let id = p.id;
                std::mem::take(&mut *p.damaged.lock())
                    .into_iter()
                    .map(move |packet| (id, packet))
            })
            .collect()
    }
}

/// Links two ports and returns the new link.
pub fn connect(a: &Arc<SimPort>, b: &Arc<SimPort>, kind: LinkKind) -> Arc<SimLink> {
    let link = Arc::new(SimLink::new(kind));
    a.attach(link.clone(), b);
    b.attach(link.clone(), a);
    link
}
