//! Configuration file support for ovn-gatewayd
//!
//! Loads and validates the gateway configuration from a TOML file.
//! Default location: /etc/ovn-gateway/gatewayd.toml

use ovn_gateway_common::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::subnets::node_router_port;
use crate::types::{
    IpFamily, IpSetNaming, DEFAULT_IPSET_PREFIX, DEFAULT_MAX_SET_SIZE, LOCAL_POD_SET,
    MAX_IPSET_NAME_LEN, SUBNET_SET,
};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ovn-gateway/gatewayd.toml";

/// ipset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpSetConfig {
    /// Prefix of kernel set names
    #[serde(default = "default_ipset_prefix")]
    pub prefix: String,

    /// Maximum members per set
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

/// OVN northbound configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvnConfig {
    /// Northbound database address (e.g. "tcp:10.0.0.1:6641")
    #[serde(default)]
    pub nb_address: Option<String>,

    /// `ovn-nbctl --timeout` in seconds
    #[serde(default = "default_ovn_timeout")]
    pub timeout_secs: u64,
}

/// Complete gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Logical cluster router name
    #[serde(default = "default_cluster_router")]
    pub cluster_router: String,

    /// Node join switch name
    #[serde(default = "default_node_switch")]
    pub node_switch: String,

    /// Node this agent runs on; the hostname when unset
    #[serde(default)]
    pub node_name: Option<String>,

    /// Reconciliation tick in seconds
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Re-check the NAT rule this often while running; never when unset
    #[serde(default)]
    pub rule_resync_interval_secs: Option<u64>,

    /// Address family of the managed sets and rule
    #[serde(default)]
    pub ip_family: IpFamily,

    #[serde(default)]
    pub ipset: IpSetConfig,

    #[serde(default)]
    pub ovn: OvnConfig,
}

fn default_ipset_prefix() -> String {
    DEFAULT_IPSET_PREFIX.to_string()
}

fn default_max_size() -> usize {
    DEFAULT_MAX_SET_SIZE
}

fn default_ovn_timeout() -> u64 {
    30
}

fn default_cluster_router() -> String {
    "ovn-cluster".to_string()
}

fn default_node_switch() -> String {
    "join".to_string()
}

fn default_resync_interval() -> u64 {
    3
}

impl Default for IpSetConfig {
    fn default() -> Self {
        Self {
            prefix: default_ipset_prefix(),
            max_size: default_max_size(),
        }
    }
}

impl Default for OvnConfig {
    fn default() -> Self {
        Self {
            nb_address: None,
            timeout_secs: default_ovn_timeout(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cluster_router: default_cluster_router(),
            node_switch: default_node_switch(),
            node_name: None,
            resync_interval_secs: default_resync_interval(),
            rule_resync_interval_secs: None,
            ip_family: IpFamily::default(),
            ipset: IpSetConfig::default(),
            ovn: OvnConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from file, falling back to defaults if the file
    /// does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                GatewayError::invalid_config(
                    path.display().to_string(),
                    format!("failed to parse: {}", e),
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(GatewayError::Io(e)),
        }
    }

    /// Reconciliation tick as Duration
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// NAT rule re-check interval as Duration, if enabled
    pub fn rule_resync_interval(&self) -> Option<Duration> {
        self.rule_resync_interval_secs.map(Duration::from_secs)
    }

    /// Router port whose networks are excluded from the subnet set
    pub fn node_router_port(&self) -> String {
        node_router_port(&self.cluster_router, &self.node_switch)
    }

    /// Kernel set naming for the configured prefix and family
    pub fn naming(&self) -> IpSetNaming {
        IpSetNaming::new(self.ipset.prefix.clone(), self.ip_family)
    }

    /// Validate configuration
    pub fn validate(&self) -> GatewayResult<()> {
        if self.cluster_router.is_empty() {
            return Err(GatewayError::invalid_config(
                "cluster_router",
                "must not be empty",
            ));
        }

        if self.node_switch.is_empty() {
            return Err(GatewayError::invalid_config("node_switch", "must not be empty"));
        }

        if matches!(self.node_name.as_deref(), Some("")) {
            return Err(GatewayError::invalid_config("node_name", "must not be empty"));
        }

        if self.resync_interval_secs == 0 {
            return Err(GatewayError::invalid_config(
                "resync_interval_secs",
                "must be > 0",
            ));
        }

        if self.rule_resync_interval_secs == Some(0) {
            return Err(GatewayError::invalid_config(
                "rule_resync_interval_secs",
                "must be > 0 when set",
            ));
        }

        if self.ipset.prefix.is_empty() {
            return Err(GatewayError::invalid_config("ipset.prefix", "must not be empty"));
        }

        if self.ipset.max_size == 0 {
            return Err(GatewayError::invalid_config("ipset.max_size", "must be > 0"));
        }

        let naming = self.naming();
        for set_id in [SUBNET_SET, LOCAL_POD_SET] {
            let name = naming.temp_name(set_id);
            if name.len() > MAX_IPSET_NAME_LEN {
                return Err(GatewayError::invalid_config(
                    "ipset.prefix",
                    format!(
                        "set name '{}' exceeds {} characters",
                        name, MAX_IPSET_NAME_LEN
                    ),
                ));
            }
        }

        if self.ovn.timeout_secs == 0 {
            return Err(GatewayError::invalid_config("ovn.timeout_secs", "must be > 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.cluster_router, "ovn-cluster");
        assert_eq!(config.node_switch, "join");
        assert_eq!(config.node_router_port(), "ovn-cluster-join");
        assert_eq!(config.resync_interval(), Duration::from_secs(3));
        assert_eq!(config.rule_resync_interval(), None);
        assert_eq!(config.ip_family, IpFamily::Ipv4);
        assert_eq!(config.ipset.max_size, 1_048_576);
        assert_eq!(config.ovn.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
cluster_router = "ovn-cluster"
node_switch = "join"
node_name = "node-1"
rule_resync_interval_secs = 60
ip_family = "ipv6"

[ovn]
nb_address = "tcp:10.0.0.1:6641"
"#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.node_name.as_deref(), Some("node-1"));
        assert_eq!(config.rule_resync_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.ip_family, IpFamily::Ipv6);
        assert_eq!(config.ovn.nb_address.as_deref(), Some("tcp:10.0.0.1:6641"));
        // Unspecified values should use defaults
        assert_eq!(config.resync_interval_secs, 3);
        assert_eq!(config.ovn.timeout_secs, 30);
        assert_eq!(config.ipset.prefix, "ovn");
        assert_eq!(config.naming().main_name(SUBNET_SET), "ovn60subnets");
    }

    #[test]
    fn test_toml_round_trip_keys() {
        let toml_str = toml::to_string(&GatewayConfig::default()).unwrap();
        assert!(toml_str.contains("cluster_router"));
        assert!(toml_str.contains("[ipset]"));
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = GatewayConfig::load_or_default("/nonexistent/gatewayd.toml").unwrap();
        assert_eq!(config.cluster_router, "ovn-cluster");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "node_switch = \"join-2\"\nresync_interval_secs = 10").unwrap();

        let config = GatewayConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.node_switch, "join-2");
        assert_eq!(config.resync_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resync_interval_secs = \"soon\"").unwrap();

        let err = GatewayConfig::load_or_default(file.path()).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = GatewayConfig::default();
        config.resync_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.rule_resync_interval_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let mut config = GatewayConfig::default();
        config.node_switch.clear();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.node_name = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_long_prefix() {
        let mut config = GatewayConfig::default();
        config.ipset.prefix = "x".repeat(20);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds 31 characters"));
    }
}
