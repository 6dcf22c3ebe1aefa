//! A simulated MPLS domain: LERs, hosts and the links between them.

use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;

use gosmpls_types::{Ipv4Address, LinkKind};

use crate::config::LerConfig;
use crate::events::EventSink;
use crate::ler::ActiveLerNode;
use crate::pdu::Pdu;
use crate::ports::Port;
use crate::stats::LerStats;

use super::link::SimLink;
use super::port::{connect, SimPortSet};
use super::topology::SimTopology;
use super::SimError;

/// Input buffer of hosts, which never congest.
const HOST_BUFFER_OCTETS: u64 = u64::MAX / 2;

const OCTETS_PER_MB: u64 = 1_048_576;

/// Shared handle to a node of the domain.
pub type NodeHandle = Arc<Mutex<ActiveLerNode>>;

struct Endpoint {
    address: Ipv4Address,
    ports: Arc<SimPortSet>,
}

/// LERs and plain hosts wired together.
///
/// Every tick, nodes run on blocking tasks in parallel; they only meet
/// through port buffers and link flags.
pub struct Domain {
    topology: Arc<SimTopology>,
    events: Arc<dyn EventSink>,
    endpoints: Vec<Endpoint>,
    links: Vec<(Ipv4Address, Ipv4Address, Arc<SimLink>)>,
    nodes: Vec<NodeHandle>,
    instant: u64,
}

impl Domain {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            topology: Arc::new(SimTopology::new()),
            events,
            endpoints: Vec::new(),
            links: Vec::new(),
            nodes: Vec::new(),
            instant: 0,
        }
    }

    pub fn topology(&self) -> &Arc<SimTopology> {
        &self.topology
    }

    /// Simulated time, in ns.
    pub fn instant(&self) -> u64 {
        self.instant
    }

    fn endpoint(&self, address: Ipv4Address) -> Result<&Endpoint, SimError> {
        self.endpoints
            .iter()
            .find(|e| e.address == address)
            .ok_or(SimError::UnknownNode(address))
    }

    fn register(&mut self, name: &str, address: Ipv4Address, capacity: u64) -> Result<Arc<SimPortSet>, SimError> {
        if self.topology.contains(address) {
            return Err(SimError::DuplicateAddress(address));
        }
        self.topology.add_node(name, address);
        let ports = Arc::new(SimPortSet::new(address, capacity));
        self.endpoints.push(Endpoint {
            address,
            ports: ports.clone(),
        });
        Ok(ports)
    }

    /// Adds an active LER.
    pub fn add_ler(&mut self, config: LerConfig) -> Result<NodeHandle, SimError> {
        config.validate(self.topology.as_ref(), false)?;
        let capacity = u64::from(config.buffer_size_mb) * OCTETS_PER_MB;
        let ports = self.register(&config.name, config.address, capacity)?;
        let stats = Arc::new(LerStats::new(config.generate_stats));
        info!("adding LER {} at {}", config.name, config.address);
        let node = ActiveLerNode::new(
            config,
            ports,
            self.topology.clone(),
            self.events.clone(),
            stats,
        );
        let handle = Arc::new(Mutex::new(node));
        self.nodes.push(handle.clone());
        Ok(handle)
    }

    /// Adds a traffic source or sink outside the MPLS domain.
    pub fn add_host(&mut self, name: &str, address: Ipv4Address) -> Result<(), SimError> {
        self.register(name, address, HOST_BUFFER_OCTETS).map(|_| ())
    }

    /// Applies a new configuration to a running LER.
    pub fn reconfigure(&mut self, config: LerConfig) -> Result<(), SimError> {
        let node = self.node(config.address).ok_or(SimError::UnknownNode(config.address))?;
        let previous = node.lock().name().to_string();
        self.topology.rename_node(config.address, config.name.clone());
        if let Err(e) = config.validate(self.topology.as_ref(), true) {
            self.topology.rename_node(config.address, previous);
            return Err(e.into());
        }
        node.lock().reconfigure(config);
        Ok(())
    }

    /// Wires two endpoints together.
    pub fn connect(&mut self, a: Ipv4Address, b: Ipv4Address, kind: LinkKind) -> Result<Arc<SimLink>, SimError> {
        let port_a = self.endpoint(a)?.ports.add_port();
        let port_b = self.endpoint(b)?.ports.add_port();
        let link = connect(&port_a, &port_b, kind);
        self.topology.add_link(a, b, link.clone());
        self.links.push((a, b, link.clone()));
        Ok(link)
    }

    /// The first link between `a` and `b`, in either direction.
    pub fn link(&self, a: Ipv4Address, b: Ipv4Address) -> Option<Arc<SimLink>> {
        self.links
            .iter()
            .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
            .map(|(_, _, link)| link.clone())
    }

    /// The LER at `address`.
    pub fn node(&self, address: Ipv4Address) -> Option<NodeHandle> {
        self.nodes
            .iter()
            .find(|n| n.lock().address() == address)
            .cloned()
    }

    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    /// Sends a packet from a host through its first port.
    pub fn inject(&self, host: Ipv4Address, pdu: impl Into<Pdu>) -> Result<(), SimError> {
        let port = self
            .endpoint(host)?
            .ports
            .sim_port(0)
            .ok_or(SimError::Unconnected(host))?;
        port.put_packet_on_link(pdu.into());
        Ok(())
    }

    /// Takes every packet delivered to `host`.
    pub fn received(&self, host: Ipv4Address) -> Result<Vec<Pdu>, SimError> {
        let endpoint = self.endpoint(host)?;
        Ok(endpoint
            .ports
            .sim_ports()
            .iter()
            .flat_map(|port| port.drain())
            .collect())
    }

    /// Runs one tick on every node, one after the other, in insertion
    /// order.
    pub fn step(&mut self, step_ns: u64) {
        self.instant += step_ns;
        for node in &self.nodes {
            node.lock().tick(step_ns, self.instant);
        }
    }

    /// Runs one tick on every node in parallel.
    pub async fn tick(&mut self, step_ns: u64) {
        self.instant += step_ns;
        let instant = self.instant;
        let tasks: Vec<_> = self
            .nodes
            .iter()
            .cloned()
            .map(|node| tokio::task::spawn_blocking(move || node.lock().tick(step_ns, instant)))
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("node tick at {} ns failed: {}", instant, e);
            }
        }
    }
}
