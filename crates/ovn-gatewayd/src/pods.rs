//! Local pod IP snapshot and the Kubernetes pod inventory

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::{reflector, watcher, WatchStreamExt};
use kube::{Api, Client};
use ovn_gateway_common::{GatewayError, GatewayResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::PodLister;
use crate::types::PodInfo;

/// Select the IPs of pods that are scheduled on `node_name`, use the
/// overlay network, and have been assigned an address.
///
/// Inventory order is kept; nothing is sorted or deduplicated.
pub fn local_pod_ips(pods: &[PodInfo], node_name: &str) -> Vec<String> {
    pods.iter()
        .filter(|pod| pod.node_name == node_name && !pod.host_network && !pod.pod_ip.is_empty())
        .map(|pod| pod.pod_ip.clone())
        .collect()
}

/// Hostname of this machine, the default node name.
pub fn local_hostname() -> GatewayResult<String> {
    let name = nix::unistd::gethostname()
        .map_err(|e| GatewayError::internal(format!("gethostname failed: {}", e)))?;
    name.into_string()
        .map_err(|raw| GatewayError::internal(format!("hostname is not UTF-8: {:?}", raw)))
}

/// Extract the gateway-relevant fields of a pod object.
pub fn pod_info(pod: &Pod) -> PodInfo {
    let spec = pod.spec.as_ref();
    PodInfo {
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        name: pod.metadata.name.clone().unwrap_or_default(),
        node_name: spec.and_then(|s| s.node_name.clone()).unwrap_or_default(),
        host_network: spec.and_then(|s| s.host_network).unwrap_or(false),
        pod_ip: pod
            .status
            .as_ref()
            .and_then(|s| s.pod_ip.clone())
            .unwrap_or_default(),
    }
}

/// Pod inventory backed by a reflector cache over all namespaces.
pub struct KubePodLister {
    store: reflector::Store<Pod>,
}

impl KubePodLister {
    /// Start watching pods and wait for the initial list to land in the
    /// cache.
    ///
    /// The returned task drives the watch until `shutdown` is cancelled.
    pub async fn start(
        client: Client,
        shutdown: CancellationToken,
    ) -> GatewayResult<(Self, JoinHandle<()>)> {
        let api: Api<Pod> = Api::all(client);
        let (reader, writer) = reflector::store();
        let mut events = reflector(writer, watcher(api, watcher::Config::default()))
            .default_backoff()
            .touched_objects()
            .boxed();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events.next() => match event {
                        Some(Ok(_)) => {}
                        Some(Err(e)) => warn!(error = %e, "Pod watch error"),
                        None => {
                            warn!("Pod watch stream ended");
                            break;
                        }
                    },
                }
            }
            debug!("Pod watch stopped");
        });

        reader
            .wait_until_ready()
            .await
            .map_err(|e| GatewayError::pod_inventory(e.to_string()))?;
        info!(pods = reader.state().len(), "Pod cache synced");

        Ok((Self { store: reader }, handle))
    }
}

#[async_trait]
impl PodLister for KubePodLister {
    async fn list_pods(&self) -> GatewayResult<Vec<PodInfo>> {
        Ok(self
            .store
            .state()
            .iter()
            .map(|pod: &Arc<Pod>| pod_info(pod))
            .collect())
    }
}
