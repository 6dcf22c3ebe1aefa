//! Node configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gosmpls_types::Ipv4Address;

use crate::topology::Topology;

/// Default switching power in Mbps.
pub const DEFAULT_SWITCHING_POWER_MBPS: u32 = 512;

/// Default port buffer size in MB.
pub const DEFAULT_BUFFER_SIZE_MB: u32 = 1;

/// Default local packet cache size in KB.
pub const DEFAULT_CACHE_SIZE_KB: u32 = 1;

/// Default signaling/recovery retransmission timer in ns.
pub const DEFAULT_TIMEOUT_NS: u64 = 50_000;

/// Default number of retransmissions before giving up.
pub const DEFAULT_ATTEMPTS: u32 = 8;

/// Configuration validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("node name is empty")]
    Unnamed,
    #[error("node name contains only blank spaces")]
    OnlyBlankSpaces,
    #[error("node name already in use: {0}")]
    NameAlreadyExists(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("malformed configuration: {0}")]
    Parse(String),
}

/// Active LER configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LerConfig {
    pub name: String,
    pub address: Ipv4Address,
    #[serde(default = "default_switching_power")]
    pub switching_power_mbps: u32,
    #[serde(default = "default_buffer_size")]
    pub buffer_size_mb: u32,
    #[serde(default = "default_cache_size")]
    pub cache_size_kb: u32,
    #[serde(default = "default_timeout")]
    pub signaling_timeout_ns: u64,
    #[serde(default = "default_attempts")]
    pub signaling_attempts: u32,
    #[serde(default = "default_timeout")]
    pub recovery_timeout_ns: u64,
    #[serde(default = "default_attempts")]
    pub recovery_attempts: u32,
    #[serde(default = "default_generate_stats")]
    pub generate_stats: bool,
}

fn default_switching_power() -> u32 {
    DEFAULT_SWITCHING_POWER_MBPS
}

fn default_buffer_size() -> u32 {
    DEFAULT_BUFFER_SIZE_MB
}

fn default_cache_size() -> u32 {
    DEFAULT_CACHE_SIZE_KB
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_NS
}

fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

fn default_generate_stats() -> bool {
    true
}

impl LerConfig {
    /// Creates a configuration with default knobs.
    pub fn new(name: impl Into<String>, address: Ipv4Address) -> Self {
        Self {
            name: name.into(),
            address,
            switching_power_mbps: DEFAULT_SWITCHING_POWER_MBPS,
            buffer_size_mb: DEFAULT_BUFFER_SIZE_MB,
            cache_size_kb: DEFAULT_CACHE_SIZE_KB,
            signaling_timeout_ns: DEFAULT_TIMEOUT_NS,
            signaling_attempts: DEFAULT_ATTEMPTS,
            recovery_timeout_ns: DEFAULT_TIMEOUT_NS,
            recovery_attempts: DEFAULT_ATTEMPTS,
            generate_stats: true,
        }
    }

    /// Sets the switching power.
    pub fn with_switching_power(mut self, mbps: u32) -> Self {
        self.switching_power_mbps = mbps;
        self
    }

    /// Sets the local packet cache size.
    pub fn with_cache_size(mut self, kb: u32) -> Self {
        self.cache_size_kb = kb;
        self
    }

    /// Sets the signaling retransmission timer and attempts.
    pub fn with_signaling_retries(mut self, timeout_ns: u64, attempts: u32) -> Self {
        self.signaling_timeout_ns = timeout_ns;
        self.signaling_attempts = attempts;
        self
    }

    /// Sets the recovery retransmission timer and attempts.
    pub fn with_recovery_retries(mut self, timeout_ns: u64, attempts: u32) -> Self {
        self.recovery_timeout_ns = timeout_ns;
        self.recovery_attempts = attempts;
        self
    }

    /// Parses a JSON configuration and checks its scalar knobs.
    ///
    /// The name is only checked against the topology by [`LerConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LerConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate_knobs()?;
        Ok(config)
    }

    /// Validates the configuration against the nodes already in the topology.
    ///
    /// On reconfiguration the node itself is already registered under its
    /// name, so the name only clashes when more than one node carries it.
    pub fn validate(&self, topology: &dyn Topology, reconfiguration: bool) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Unnamed);
        }
        if self.name.chars().all(|c| c == ' ') {
            return Err(ConfigError::OnlyBlankSpaces);
        }
        let allowed = usize::from(reconfiguration);
        if topology.count_nodes_named(&self.name) > allowed {
            return Err(ConfigError::NameAlreadyExists(self.name.clone()));
        }
        self.validate_knobs()
    }

    fn validate_knobs(&self) -> Result<(), ConfigError> {
        let zero = |field: &'static str| ConfigError::InvalidValue {
            field,
            reason: "must be greater than zero".to_string(),
        };
        if self.switching_power_mbps == 0 {
            return Err(zero("switching_power_mbps"));
        }
        if self.buffer_size_mb == 0 {
            return Err(zero("buffer_size_mb"));
        }
        if self.cache_size_kb == 0 {
            return Err(zero("cache_size_kb"));
        }
        if self.signaling_timeout_ns == 0 {
            return Err(zero("signaling_timeout_ns"));
        }
        if self.recovery_timeout_ns == 0 {
            return Err(zero("recovery_timeout_ns"));
        }
        if self.signaling_attempts == 0 {
            return Err(zero("signaling_attempts"));
        }
        if self.recovery_attempts == 0 {
            return Err(zero("recovery_attempts"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct NamedNodes(Vec<&'static str>);

    impl Topology for NamedNodes {
        fn next_hop(
            &self,
            _from: Ipv4Address,
            _to: Ipv4Address,
            _exclude: Option<Ipv4Address>,
        ) -> Option<Ipv4Address> {
            None
        }

        fn count_nodes_named(&self, name: &str) -> usize {
            self.0.iter().filter(|n| **n == name).count()
        }
    }

    fn config(name: &str) -> LerConfig {
        LerConfig::new(name, Ipv4Address::new(10, 0, 0, 1))
    }

    #[test]
    fn test_defaults() {
        let cfg = config("A");
        assert_eq!(cfg.switching_power_mbps, 512);
        assert_eq!(cfg.buffer_size_mb, 1);
        assert_eq!(cfg.cache_size_kb, 1);
        assert_eq!(cfg.signaling_attempts, 8);
        assert!(cfg.generate_stats);
    }

    #[test]
    fn test_validate_name() {
        let topo = NamedNodes(vec!["A", "B"]);
        assert_eq!(config("").validate(&topo, false), Err(ConfigError::Unnamed));
        assert_eq!(config("   ").validate(&topo, false), Err(ConfigError::OnlyBlankSpaces));
        assert_eq!(
            config("A").validate(&topo, false),
            Err(ConfigError::NameAlreadyExists("A".to_string()))
        );
        assert_eq!(config("C").validate(&topo, false), Ok(()));
    }

    #[test]
    fn test_validate_reconfiguration() {
        let topo = NamedNodes(vec!["A", "B"]);
        assert_eq!(config("A").validate(&topo, true), Ok(()));

        let clash = NamedNodes(vec!["A", "A"]);
        assert!(matches!(
            config("A").validate(&clash, true),
            Err(ConfigError::NameAlreadyExists(_))
        ));
    }

    #[test]
    fn test_validate_zero_knob() {
        let topo = NamedNodes(vec![]);
        let cfg = config("A").with_switching_power(0);
        assert!(matches!(
            cfg.validate(&topo, false),
            Err(ConfigError::InvalidValue { field: "switching_power_mbps", .. })
        ));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let cfg = LerConfig::from_json(r#"{"name":"A","address":"10.0.0.1","cache_size_kb":4}"#)
            .unwrap();
        assert_eq!(cfg.name, "A");
        assert_eq!(cfg.address, Ipv4Address::new(10, 0, 0, 1));
        assert_eq!(cfg.cache_size_kb, 4);
        assert_eq!(cfg.signaling_timeout_ns, DEFAULT_TIMEOUT_NS);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(LerConfig::from_json("{"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            LerConfig::from_json(r#"{"name":"A","address":"10.0.0.1","recovery_attempts":0}"#),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
