//! OVN Gateway Daemon - node-local masquerade reconciler
//!
//! ovn-gatewayd keeps outbound pod traffic on this node masqueraded unless
//! it is destined to another pod subnet of the overlay:
//! - Cluster subnet snapshot from the OVN logical router ports
//! - Local pod IP snapshot from the Kubernetes pod inventory
//! - Atomic full replacement of the two ipsets on every tick
//! - A single POSTROUTING masquerade rule, installed once

pub mod backend;
pub mod commands;
pub mod config;
pub mod gateway_mgr;
pub mod ipsets;
pub mod iptables;
pub mod ovn;
pub mod pods;
pub mod subnets;
pub mod types;

pub use backend::{IpSetBackend, OvnClient, PodLister, RuleBackend};
pub use config::GatewayConfig;
pub use gateway_mgr::{GatewayBackends, GatewayMgr, GatewayState};
pub use types::{IpFamily, IpSetMetadata, IpSetNaming, IpSetType, PodInfo};
