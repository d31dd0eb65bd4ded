//! OVN northbound router port query

use async_trait::async_trait;
use ovn_gateway_common::{shell, GatewayError, GatewayResult};
use tracing::trace;

use crate::backend::OvnClient;
use crate::commands::build_list_router_ports_cmd;

/// Queries the northbound database through `ovn-nbctl`
pub struct OvnNbClient {
    command: String,
}

impl OvnNbClient {
    /// `nb_address` is passed as `--db`; without it `ovn-nbctl` uses its
    /// own default (local socket or `OVN_NB_DB`).
    pub fn new(nb_address: Option<&str>, timeout_secs: u64) -> Self {
        Self {
            command: build_list_router_ports_cmd(nb_address, timeout_secs),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl OvnClient for OvnNbClient {
    async fn list_logical_router_ports(&self) -> GatewayResult<String> {
        let output = shell::exec_or_throw(&self.command)
            .await
            .map_err(|e| GatewayError::ovn_query(e.to_string()))?;
        trace!(bytes = output.len(), "Listed logical router ports");
        Ok(output)
    }
}
