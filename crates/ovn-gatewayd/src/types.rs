//! Gateway type definitions and constants

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Set identifier holding every cluster pod subnet
pub const SUBNET_SET: &str = "subnets";

/// Set identifier holding the IPs of pods scheduled on this node
pub const LOCAL_POD_SET: &str = "local-pod-ip";

/// Default prefix for kernel ipset names
pub const DEFAULT_IPSET_PREFIX: &str = "ovn";

/// Default maximum element count of each gateway set (2^20)
pub const DEFAULT_MAX_SET_SIZE: usize = 1_048_576;

/// Kernel limit on ipset name length (IPSET_MAXNAMELEN - 1)
pub const MAX_IPSET_NAME_LEN: usize = 31;

/// iptables table holding the masquerade rule
pub const NAT_TABLE: &str = "nat";

/// iptables chain holding the masquerade rule
pub const POSTROUTING_CHAIN: &str = "POSTROUTING";

/// Address family the gateway sets and rule are managed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    #[default]
    Ipv4,
    Ipv6,
}

impl IpFamily {
    /// IP version number used in kernel set names
    pub fn version(&self) -> u8 {
        match self {
            IpFamily::Ipv4 => 4,
            IpFamily::Ipv6 => 6,
        }
    }

    /// Value of the ipset `family` option
    pub fn ipset_family(&self) -> &'static str {
        match self {
            IpFamily::Ipv4 => "inet",
            IpFamily::Ipv6 => "inet6",
        }
    }

    /// Longest valid prefix length for this family
    pub fn max_prefix_len(&self) -> u8 {
        match self {
            IpFamily::Ipv4 => 32,
            IpFamily::Ipv6 => 128,
        }
    }

    /// Returns true if `member` is a well-formed element of a `set_type`
    /// set of this family.
    ///
    /// `hash:ip` takes a bare address. `hash:net` also takes `addr/len`
    /// with a decimal prefix length no longer than the family allows.
    pub fn accepts(&self, set_type: IpSetType, member: &str) -> bool {
        let (addr, prefix_len) = match member.split_once('/') {
            Some((addr, len)) => (addr, Some(len)),
            None => (member, None),
        };

        let family_ok = match addr.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => *self == IpFamily::Ipv4,
            Ok(IpAddr::V6(_)) => *self == IpFamily::Ipv6,
            Err(_) => false,
        };
        if !family_ok {
            return false;
        }

        match (set_type, prefix_len) {
            (_, None) => true,
            (IpSetType::HashIp, Some(_)) => false,
            (IpSetType::HashNet, Some(len)) => {
                !len.is_empty()
                    && len.bytes().all(|b| b.is_ascii_digit())
                    && len
                        .parse::<u8>()
                        .is_ok_and(|len| len <= self.max_prefix_len())
            }
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::Ipv4 => write!(f, "ipv4"),
            IpFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// Element kind of a named set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpSetType {
    /// Network (CIDR) members
    HashNet,
    /// Single address members
    HashIp,
}

impl IpSetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpSetType::HashNet => "hash:net",
            IpSetType::HashIp => "hash:ip",
        }
    }
}

impl fmt::Display for IpSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of a named set, independent of its membership
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpSetMetadata {
    /// Unprefixed identifier (e.g. "subnets")
    pub set_id: String,
    /// Element kind
    pub set_type: IpSetType,
    /// Maximum number of members
    pub max_size: usize,
}

impl IpSetMetadata {
    pub fn new(set_id: impl Into<String>, set_type: IpSetType, max_size: usize) -> Self {
        Self {
            set_id: set_id.into(),
            set_type,
            max_size,
        }
    }
}

/// Maps set identifiers to kernel set names.
///
/// The live set is `<prefix><version>0<id>`; the staging set used for
/// atomic swaps is `<prefix><version>1<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpSetNaming {
    prefix: String,
    family: IpFamily,
}

impl IpSetNaming {
    pub fn new(prefix: impl Into<String>, family: IpFamily) -> Self {
        Self {
            prefix: prefix.into(),
            family,
        }
    }

    pub fn family(&self) -> IpFamily {
        self.family
    }

    /// Name of the live kernel set
    pub fn main_name(&self, set_id: &str) -> String {
        format!("{}{}0{}", self.prefix, self.family.version(), set_id)
    }

    /// Name of the temporary set swapped into place on apply
    pub fn temp_name(&self, set_id: &str) -> String {
        format!("{}{}1{}", self.prefix, self.family.version(), set_id)
    }
}

impl Default for IpSetNaming {
    fn default() -> Self {
        Self::new(DEFAULT_IPSET_PREFIX, IpFamily::Ipv4)
    }
}

/// The pod attributes the gateway reads from the inventory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PodInfo {
    pub namespace: String,
    pub name: String,
    /// Node the pod is scheduled to (empty when unscheduled)
    pub node_name: String,
    pub host_network: bool,
    /// Primary pod IP (empty until assigned)
    pub pod_ip: String,
}
