//! Capability traits for the external collaborators of the gateway.
//!
//! The reconciler only talks to these traits. Production implementations
//! live in [`crate::ipsets`], [`crate::iptables`], [`crate::ovn`] and
//! [`crate::pods`]; tests substitute in-memory fakes.

use async_trait::async_trait;
use ovn_gateway_common::GatewayResult;

use crate::types::{IpSetMetadata, PodInfo};

/// Named set backend with staged, batched updates.
#[async_trait]
pub trait IpSetBackend: Send + Sync {
    /// Stages a full replacement of the set's membership.
    ///
    /// Nothing reaches the kernel until [`IpSetBackend::apply_updates`].
    fn add_or_replace_ip_set(&self, meta: IpSetMetadata, members: Vec<String>)
        -> GatewayResult<()>;

    /// Applies every staged replacement in one batch.
    async fn apply_updates(&self) -> GatewayResult<()>;
}

/// Firewall rule backend.
#[async_trait]
pub trait RuleBackend: Send + Sync {
    /// Returns true if `rule` is present in `table`/`chain`.
    async fn exists(&self, table: &str, chain: &str, rule: &[String]) -> GatewayResult<bool>;

    /// Appends `rule` to `table`/`chain` unless an identical rule exists.
    async fn append_unique(&self, table: &str, chain: &str, rule: &[String]) -> GatewayResult<()>;
}

/// Read-only pod inventory.
#[async_trait]
pub trait PodLister: Send + Sync {
    /// Lists every pod in every namespace.
    async fn list_pods(&self) -> GatewayResult<Vec<PodInfo>>;
}

/// Overlay control-plane query.
#[async_trait]
pub trait OvnClient: Send + Sync {
    /// Returns the raw logical router port listing: a port name line
    /// followed by its networks line, for every port.
    async fn list_logical_router_ports(&self) -> GatewayResult<String>;
}
