//! Shortest-path topology over the simulated links.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use gosmpls_types::Ipv4Address;

use crate::ports::Link;
use crate::topology::Topology;

use super::link::SimLink;

#[derive(Default)]
struct Graph {
    names: HashMap<Ipv4Address, String>,
    /// Adjacency in insertion order, which makes path selection stable.
    edges: HashMap<Ipv4Address, Vec<(Ipv4Address, Arc<SimLink>)>>,
}

/// Hop-count routing that ignores broken links.
#[derive(Default)]
pub struct SimTopology {
    graph: RwLock<Graph>,
}

impl SimTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&self, name: impl Into<String>, address: Ipv4Address) {
        let mut graph = self.graph.write();
        graph.names.insert(address, name.into());
        graph.edges.entry(address).or_default();
    }

    pub fn rename_node(&self, address: Ipv4Address, name: impl Into<String>) {
        if let Some(current) = self.graph.write().names.get_mut(&address) {
            *current = name.into();
        }
    }

    pub fn contains(&self, address: Ipv4Address) -> bool {
        self.graph.read().names.contains_key(&address)
    }

    pub fn add_link(&self, a: Ipv4Address, b: Ipv4Address, link: Arc<SimLink>) {
        let mut graph = self.graph.write();
        graph.edges.entry(a).or_default().push((b, link.clone()));
        graph.edges.entry(b).or_default().push((a, link));
    }

    fn usable_neighbors<'a>(
        graph: &'a Graph,
        node: Ipv4Address,
    ) -> impl Iterator<Item = Ipv4Address> + 'a {
        graph
            .edges
            .get(&node)
            .into_iter()
            .flatten()
            .filter(|(_, link)| !link.is_broken())
            .map(|(neighbor, _)| *neighbor)
    }
}

impl Topology for SimTopology {
    fn next_hop(
        &self,
        from: Ipv4Address,
        to: Ipv4Address,
        exclude: Option<Ipv4Address>,
    ) -> Option<Ipv4Address> {
        if from == to {
            return None;
        }
        let graph = self.graph.read();
        let mut visited = HashSet::from([from]);
        // (node, first hop taken to reach it)
        let mut queue = VecDeque::new();
        for hop in Self::usable_neighbors(&graph, from) {
            if Some(hop) == exclude || !visited.insert(hop) {
                continue;
            }
            if hop == to {
                return Some(hop);
            }
            queue.push_back((hop, hop));
        }
        while let Some((node, first)) = queue.pop_front() {
            for next in Self::usable_neighbors(&graph, node) {
                if !visited.insert(next) {
                    continue;
                }
                if next == to {
                    return Some(first);
                }
                queue.push_back((next, first));
            }
        }
        None
    }

    fn count_nodes_named(&self, name: &str) -> usize {
        self.graph.read().names.values().filter(|n| n.as_str() == name).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gosmpls_types::LinkKind;

    fn addr(last: u8) -> Ipv4Address {
        Ipv4Address::new(10, 0, 1, last)
    }

    /// 1 - 2 - 3 with a detour 1 - 4 - 5 - 3.
    fn ring() -> (SimTopology, Arc<SimLink>) {
        let topology = SimTopology::new();
        for (i, name) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            topology.add_node(*name, addr(i as u8 + 1));
        }
        let short = Arc::new(SimLink::new(LinkKind::Internal));
        topology.add_link(addr(1), addr(2), short.clone());
        topology.add_link(addr(2), addr(3), Arc::new(SimLink::new(LinkKind::Internal)));
        topology.add_link(addr(1), addr(4), Arc::new(SimLink::new(LinkKind::Internal)));
        topology.add_link(addr(4), addr(5), Arc::new(SimLink::new(LinkKind::Internal)));
        topology.add_link(addr(5), addr(3), Arc::new(SimLink::new(LinkKind::Internal)));
        (topology, short)
    }

    #[test]
    fn test_shortest_path() {
        let (topology, _) = ring();
        assert_eq!(topology.next_hop(addr(1), addr(3), None), Some(addr(2)));
        assert_eq!(topology.next_hop(addr(1), addr(2), None), Some(addr(2)));
        assert_eq!(topology.next_hop(addr(1), addr(1), None), None);
        assert_eq!(topology.next_hop(addr(1), addr(9), None), None);
    }

    #[test]
    fn test_excluded_first_hop() {
        let (topology, _) = ring();
        assert_eq!(topology.next_hop(addr(1), addr(3), Some(addr(2))), Some(addr(4)));
    }

    #[test]
    fn test_broken_link_is_avoided() {
        let (topology, short) = ring();
        short.set_broken(true);
        assert_eq!(topology.next_hop(addr(1), addr(3), None), Some(addr(4)));
    }

    #[test]
    fn test_count_nodes_named() {
        let (topology, _) = ring();
        assert_eq!(topology.count_nodes_named("A"), 1);
        topology.rename_node(addr(2), "A");
        assert_eq!(topology.count_nodes_named("A"), 2);
        assert_eq!(topology.count_nodes_named("Z"), 0);
    }
}
