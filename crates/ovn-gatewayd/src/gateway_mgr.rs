//! Gateway Manager - keeps the masquerade ipsets and NAT rule converged

use std::sync::Arc;

use ovn_gateway_common::GatewayResult;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::backend::{IpSetBackend, OvnClient, PodLister, RuleBackend};
use crate::commands::build_nat_rule;
use crate::config::GatewayConfig;
use crate::pods::local_pod_ips;
use crate::subnets::parse_subnets;
use crate::types::{
    IpSetMetadata, IpSetType, LOCAL_POD_SET, NAT_TABLE, POSTROUTING_CHAIN, SUBNET_SET,
};

/// Reconciler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    /// Initial sync not yet completed
    Starting,
    /// Periodic resync loop active
    Running,
    /// Terminal
    Stopped,
}

/// External collaborators injected into the manager
#[derive(Clone)]
pub struct GatewayBackends {
    pub pods: Arc<dyn PodLister>,
    pub ovn: Arc<dyn OvnClient>,
    pub ipsets: Arc<dyn IpSetBackend>,
    pub rules: Arc<dyn RuleBackend>,
}

/// Gateway Manager
///
/// Derives the cluster subnet and local pod snapshots, replaces both ipsets
/// with them, and keeps the masquerade rule installed exactly once.
pub struct GatewayMgr {
    config: GatewayConfig,

    /// Node whose pods are masqueraded
    node_name: String,

    /// Router port excluded from the subnet set
    excluded_port: String,

    /// Masquerade rule tokens
    nat_rule: Vec<String>,

    backends: GatewayBackends,

    state: GatewayState,

    /// When the NAT rule was last ensured
    last_rule_check: Option<Instant>,
}

impl GatewayMgr {
    pub fn new(config: GatewayConfig, node_name: impl Into<String>, backends: GatewayBackends) -> Self {
        let excluded_port = config.node_router_port();
        let nat_rule = build_nat_rule(&config.naming());
        let node_name = node_name.into();

        info!(node = %node_name, excluded_port = %excluded_port, "GatewayMgr initialized");

        Self {
            config,
            node_name,
            excluded_port,
            nat_rule,
            backends,
            state: GatewayState::Starting,
            last_rule_check: None,
        }
    }

    pub fn state(&self) -> GatewayState {
        self.state
    }

    pub fn nat_rule(&self) -> &[String] {
        &self.nat_rule
    }

    /// Current cluster subnets, minus this node's join network
    pub async fn compute_subnets(&self) -> GatewayResult<Vec<String>> {
        let output = self.backends.ovn.list_logical_router_ports().await?;
        let subnets = parse_subnets(&output, &self.excluded_port)?;
        debug!(subnets = ?subnets, "Computed subnets");
        Ok(subnets)
    }

    /// Current IPs of overlay pods scheduled on this node
    pub async fn compute_local_pod_ips(&self) -> GatewayResult<Vec<String>> {
        let pods = self.backends.pods.list_pods().await?;
        let ips = local_pod_ips(&pods, &self.node_name);
        debug!(local_pod_ips = ?ips, "Computed local pod ips");
        Ok(ips)
    }

    /// Replace both sets with the given snapshots in one batch
    pub async fn sync_sets(&self, subnets: Vec<String>, pod_ips: Vec<String>) -> GatewayResult<()> {
        let max_size = self.config.ipset.max_size;
        let ipsets = &self.backends.ipsets;

        ipsets.add_or_replace_ip_set(
            IpSetMetadata::new(SUBNET_SET, IpSetType::HashNet, max_size),
            subnets,
        )?;
        ipsets.add_or_replace_ip_set(
            IpSetMetadata::new(LOCAL_POD_SET, IpSetType::HashIp, max_size),
            pod_ips,
        )?;
        ipsets.apply_updates().await
    }

    /// Install the masquerade rule if it is not present
    pub async fn ensure_rule(&self) -> GatewayResult<()> {
        let rules = &self.backends.rules;
        if rules
            .exists(NAT_TABLE, POSTROUTING_CHAIN, &self.nat_rule)
            .await?
        {
            trace!("NAT rule present");
            return Ok(());
        }

        info!(rule = %self.nat_rule.join(" "), "NAT rule missing, appending");
        rules
            .append_unique(NAT_TABLE, POSTROUTING_CHAIN, &self.nat_rule)
            .await
    }

    /// One reconciliation cycle: both snapshots, then the set replacement.
    ///
    /// Sets are untouched unless both snapshots were read.
    pub async fn reconcile(&self) -> GatewayResult<()> {
        let subnets = self.compute_subnets().await?;
        let pod_ips = self.compute_local_pod_ips().await?;
        self.sync_sets(subnets, pod_ips).await
    }

    /// Initial sync. Any failure stops the manager.
    pub async fn start(&mut self) -> GatewayResult<()> {
        info!("start gateway");
        self.state = GatewayState::Starting;

        if let Err(e) = self.initial_sync().await {
            error!(error = %e, "Gateway startup failed");
            self.state = GatewayState::Stopped;
            return Err(e);
        }

        self.last_rule_check = Some(Instant::now());
        self.state = GatewayState::Running;
        Ok(())
    }

    async fn initial_sync(&self) -> GatewayResult<()> {
        self.reconcile().await?;
        self.ensure_rule().await
    }

    /// Periodic cycle. Failures are logged and the cycle is skipped.
    pub async fn on_tick(&mut self) {
        trace!("tick");
        if let Err(e) = self.reconcile().await {
            if e.is_retryable() {
                warn!(error = %e, "Gateway reconciliation failed, keeping previous sets");
            } else {
                error!(error = %e, "Gateway reconciliation failed, keeping previous sets");
            }
        }

        let Some(interval) = self.config.rule_resync_interval() else {
            return;
        };
        let due = self
            .last_rule_check
            .map_or(true, |last| last.elapsed() >= interval);
        if due {
            self.last_rule_check = Some(Instant::now());
            if let Err(e) = self.ensure_rule().await {
                error!(error = %e, "NAT rule check failed");
            }
        }
    }

    /// Run the initial sync, then resync every tick until `shutdown`.
    ///
    /// Only the initial sync can fail; errors while running are logged.
    pub async fn run(&mut self, shutdown: CancellationToken) -> GatewayResult<()> {
        self.start().await?;

        let period = self.config.resync_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("exit gateway");
                    break;
                }
                _ = ticker.tick() => {
                    self.on_tick().await;
                }
            }
        }

        self.state = GatewayState::Stopped;
        Ok(())
    }
}
