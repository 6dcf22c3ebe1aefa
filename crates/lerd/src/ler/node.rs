//! The active LER node and its per-tick driver.

use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use gosmpls_types::Ipv4Address;

use crate::cache::LocalPacketCache;
use crate::config::LerConfig;
use crate::events::{EventKind, EventSink};
use crate::ports::PortSet;
use crate::recovery::RecoveryTable;
use crate::stats::LerStats;
use crate::switching::{EntryId, SwitchingTable};
use crate::topology::Topology;

use super::io::NodeIo;

/// An active Label Edge Router.
///
/// Owns its switching table, recovery table and packet cache; reaches
/// ports, topology, event bus and statistics through the collaborators
/// injected at construction. Exclusive access during a tick comes from
/// `&mut self`.
pub struct ActiveLerNode {
    pub(crate) config: LerConfig,
    pub(crate) switching: SwitchingTable,
    pub(crate) recovery: RecoveryTable,
    pub(crate) cache: LocalPacketCache,
    pub(crate) io: NodeIo,
    stats: Arc<LerStats>,
    /// Time left to switch packets, in ns. Carried over between ticks while
    /// packets are pending.
    pub(crate) available_ns: f64,
    pub(crate) step_ns: u64,
    idle_ticks: u64,
}

impl fmt::Debug for ActiveLerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveLerNode")
            .field("name", &self.config.name)
            .field("address", &self.config.address)
            .field("entries", &self.switching.len())
            .field("recovery_entries", &self.recovery.len())
            .field("cached_packets", &self.cache.len())
            .field("available_ns", &self.available_ns)
            .finish()
    }
}

impl ActiveLerNode {
    pub fn new(
        config: LerConfig,
        ports: Arc<dyn PortSet>,
        topology: Arc<dyn Topology>,
        events: Arc<dyn EventSink>,
        stats: Arc<LerStats>,
    ) -> Self {
        stats.set_enabled(config.generate_stats);
        let io = NodeIo::new(config.address, ports, topology, events, stats.clone());
        Self {
            switching: SwitchingTable::new(),
            recovery: RecoveryTable::new(config.recovery_timeout_ns, config.recovery_attempts),
            cache: LocalPacketCache::new(config.cache_size_kb),
            io,
            stats,
            available_ns: 0.0,
            step_ns: 0,
            idle_ticks: 0,
            config,
        }
    }

    pub fn config(&self) -> &LerConfig {
        &self.config
    }

    pub fn address(&self) -> Ipv4Address {
        self.config.address
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn stats(&self) -> &Arc<LerStats> {
        &self.stats
    }

    pub fn switching_table(&self) -> &SwitchingTable {
        &self.switching
    }

    pub fn recovery_table(&self) -> &RecoveryTable {
        &self.recovery
    }

    pub fn cache(&self) -> &LocalPacketCache {
        &self.cache
    }

    /// Ticks in a row in which no packet was switched.
    pub fn idle_ticks(&self) -> u64 {
        self.idle_ticks
    }

    /// Replaces the configuration of a running node.
    pub fn reconfigure(&mut self, config: LerConfig) {
        self.cache.set_size_kb(config.cache_size_kb);
        self.recovery
            .set_retries(config.recovery_timeout_ns, config.recovery_attempts);
        self.stats.set_enabled(config.generate_stats);
        self.io.address = config.address;
        self.config = config;
    }

    /// Nanoseconds needed to switch one bit.
    pub fn ns_per_bit(&self) -> f64 {
        1_000_000_000.0 / (f64::from(self.config.switching_power_mbps) * 1_048_576.0)
    }

    /// Nanoseconds needed to switch `octets`.
    pub fn ns_for_octets(&self, octets: u32) -> f64 {
        self.ns_per_bit() * f64::from(octets) * 8.0
    }

    /// Octets that can still be switched in the current tick.
    pub fn max_switchable_octets(&self) -> u64 {
        if self.available_ns <= 0.0 {
            return 0;
        }
        let bits = (self.available_ns / self.ns_per_bit()).floor();
        (bits / 8.0).floor() as u64
    }

    /// Cost used by routing: a mix of congestion and table occupation.
    pub fn routing_weight(&self) -> i64 {
        let congestion = f64::from(self.io.ports.congestion_level()) * 0.7;
        let occupation = 10.0 * self.switching.len() as f64 * 0.3;
        congestion as i64 + occupation as i64
    }

    /// This node hands traffic for `address` out of the domain.
    pub fn is_exit_ler(&self, address: Ipv4Address) -> bool {
        self.io.is_exit_ler(address)
    }

    /// Runs one simulation tick worth `step_ns` of switching time.
    pub fn tick(&mut self, step_ns: u64, instant: u64) {
        self.io.instant = instant;
        self.step_ns = step_ns;
        if self.io.ports.has_pending_packets() {
            self.available_ns += step_ns as f64;
        } else {
            self.available_ns = step_ns as f64;
            self.idle_ticks = 0;
        }

        let level = self.io.ports.congestion_level();
        self.io.emit(EventKind::NodeCongested { level });

        for (port, packet) in self.io.ports.take_damaged_packets() {
            self.run_recovery_protocol(&packet, port);
        }
        self.check_connectivity();
        self.signaling_timer_pass();
        if self.route_packets() {
            self.idle_ticks = 0;
        } else {
            self.idle_ticks += 1;
        }
    }

    /// Restores the freshly constructed state.
    pub fn reset(&mut self) {
        info!("{}: resetting node {}", self.config.address, self.config.name);
        self.switching.reset();
        self.recovery.reset();
        self.cache.reset();
        self.io.reset();
        self.stats.reset();
        self.available_ns = 0.0;
        self.step_ns = 0;
        self.idle_ticks = 0;
    }

    /// Removes an entry and announces it.
    pub(crate) fn remove_entry(&mut self, id: EntryId) {
        if let Some(entry) = self.switching.remove(id) {
            debug!(
                "{}: switching entry {:?} towards {} removed",
                self.io.address,
                entry.key(),
                entry.tail_end
            );
            self.io.emit(EventKind::LabelRemoved);
        }
    }
}
