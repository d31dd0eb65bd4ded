//! In-memory fakes for the gateway backends

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ovn_gateway_common::{GatewayError, GatewayResult};
use ovn_gatewayd::{
    GatewayBackends, IpSetBackend, IpSetMetadata, OvnClient, PodInfo, PodLister, RuleBackend,
};
use parking_lot::Mutex;

pub const LISTING: &str = "\
ovn-cluster-join
100.64.0.1/16

ovn-cluster-ovn-default
10.16.0.1/16

ovn-cluster-tenant-a
10.20.0.1/24
";

pub fn pod(name: &str, node: &str, host_network: bool, ip: &str) -> PodInfo {
    PodInfo {
        namespace: "default".to_string(),
        name: name.to_string(),
        node_name: node.to_string(),
        host_network,
        pod_ip: ip.to_string(),
    }
}

/// Router port listing; `None` makes the query fail
pub struct FakeOvn {
    pub output: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl FakeOvn {
    pub fn new(output: &str) -> Self {
        Self {
            output: Mutex::new(Some(output.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_output(&self, output: Option<&str>) {
        *self.output.lock() = output.map(str::to_string);
    }
}

#[async_trait]
impl OvnClient for FakeOvn {
    async fn list_logical_router_ports(&self) -> GatewayResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.output
            .lock()
            .clone()
            .ok_or_else(|| GatewayError::ovn_query("northbound unreachable"))
    }
}

/// Pod inventory; `None` makes the read fail
pub struct FakePods {
    pub pods: Mutex<Option<Vec<PodInfo>>>,
    pub calls: AtomicUsize,
}

impl FakePods {
    pub fn new(pods: Vec<PodInfo>) -> Self {
        Self {
            pods: Mutex::new(Some(pods)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_pods(&self, pods: Option<Vec<PodInfo>>) {
        *self.pods.lock() = pods;
    }
}

#[async_trait]
impl PodLister for FakePods {
    async fn list_pods(&self) -> GatewayResult<Vec<PodInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pods
            .lock()
            .clone()
            .ok_or_else(|| GatewayError::pod_inventory("cache not synced"))
    }
}

/// Set backend keeping "kernel" membership after every apply
#[derive(Default)]
pub struct FakeIpSets {
    pub pending: Mutex<BTreeMap<String, (IpSetMetadata, Vec<String>)>>,
    pub applied: Mutex<BTreeMap<String, Vec<String>>>,
    pub stage_calls: AtomicUsize,
    pub apply_calls: AtomicUsize,
    pub fail_apply: AtomicBool,
}

impl FakeIpSets {
    pub fn members(&self, set_id: &str) -> Option<Vec<String>> {
        self.applied.lock().get(set_id).cloned()
    }

    pub fn stage_calls(&self) -> usize {
        self.stage_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpSetBackend for FakeIpSets {
    fn add_or_replace_ip_set(
        &self,
        meta: IpSetMetadata,
        members: Vec<String>,
    ) -> GatewayResult<()> {
        self.stage_calls.fetch_add(1, Ordering::SeqCst);
        self.pending
            .lock()
            .insert(meta.set_id.clone(), (meta, members));
        Ok(())
    }

    async fn apply_updates(&self) -> GatewayResult<()> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(GatewayError::ip_set("*", "restore failed"));
        }
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut applied = self.applied.lock();
        for (set_id, (_, members)) in pending {
            applied.insert(set_id, members);
        }
        Ok(())
    }
}

/// Rule backend over an in-memory chain
#[derive(Default)]
pub struct FakeRules {
    pub chain: Mutex<Vec<(String, String, Vec<String>)>>,
    pub exists_calls: AtomicUsize,
    pub append_calls: AtomicUsize,
    pub fail_exists: AtomicBool,
}

impl FakeRules {
    pub fn rule_count(&self) -> usize {
        self.chain.lock().len()
    }

    pub fn delete_all(&self) {
        self.chain.lock().clear();
    }

    pub fn calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst) + self.append_calls.load(Ordering::SeqCst)
    }

    fn contains(&self, table: &str, chain: &str, rule: &[String]) -> bool {
        self.chain
            .lock()
            .iter()
            .any(|(t, c, r)| t == table && c == chain && r.as_slice() == rule)
    }
}

#[async_trait]
impl RuleBackend for FakeRules {
    async fn exists(&self, table: &str, chain: &str, rule: &[String]) -> GatewayResult<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_exists.load(Ordering::SeqCst) {
            return Err(GatewayError::iptables("xtables lock held"));
        }
        Ok(self.contains(table, chain, rule))
    }

    async fn append_unique(&self, table: &str, chain: &str, rule: &[String]) -> GatewayResult<()> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if !self.contains(table, chain, rule) {
            self.chain
                .lock()
                .push((table.to_string(), chain.to_string(), rule.to_vec()));
        }
        Ok(())
    }
}

/// A full set of fakes plus the backends handle wired to them
pub struct Harness {
    pub ovn: Arc<FakeOvn>,
    pub pods: Arc<FakePods>,
    pub ipsets: Arc<FakeIpSets>,
    pub rules: Arc<FakeRules>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            ovn: Arc::new(FakeOvn::new(LISTING)),
            pods: Arc::new(FakePods::new(vec![
                pod("web-0", "node-1", false, "10.16.0.5"),
                pod("web-1", "node-2", false, "10.16.0.6"),
                pod("kube-proxy", "node-1", true, "192.168.1.10"),
                pod("pending", "node-1", false, ""),
            ])),
            ipsets: Arc::new(FakeIpSets::default()),
            rules: Arc::new(FakeRules::default()),
        }
    }

    pub fn backends(&self) -> GatewayBackends {
        GatewayBackends {
            pods: self.pods.clone(),
            ovn: self.ovn.clone(),
            ipsets: self.ipsets.clone(),
            rules: self.rules.clone(),
        }
    }
}
