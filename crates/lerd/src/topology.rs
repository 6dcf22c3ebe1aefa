//! Topology lookups consumed by the engine.

use gosmpls_types::Ipv4Address;

/// Read-only view of the topology a node lives in.
pub trait Topology: Send + Sync {
    /// Returns the neighbor of `from` on the shortest path towards `to`.
    ///
    /// With `exclude` set, paths whose first hop is `exclude` are ignored,
    /// which yields a diverse next hop for backup LSPs.
    fn next_hop(
        &self,
        from: Ipv4Address,
        to: Ipv4Address,
        exclude: Option<Ipv4Address>,
    ) -> Option<Ipv4Address>;

    /// Returns how many nodes carry `name`.
    fn count_nodes_named(&self, name: &str) -> usize;
}
