//! OVN Gateway Daemon Entry Point

use std::future::Future;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ovn_gatewayd::config::DEFAULT_CONFIG_PATH;
use ovn_gatewayd::ipsets::IpSetManager;
use ovn_gatewayd::iptables::Iptables;
use ovn_gatewayd::ovn::OvnNbClient;
use ovn_gatewayd::pods::{local_hostname, KubePodLister};
use ovn_gatewayd::{GatewayBackends, GatewayConfig, GatewayMgr};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Node gateway reconciler for the OVN overlay
#[derive(Parser, Debug)]
#[command(name = "ovn-gatewayd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Node name (defaults to the config file value, then the hostname)
    #[arg(long, env = "NODE_NAME")]
    node_name: Option<String>,

    /// Logical cluster router name
    #[arg(long)]
    cluster_router: Option<String>,

    /// Node join switch name
    #[arg(long)]
    node_switch: Option<String>,

    /// Reconciliation interval in seconds
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args).await {
        Ok(()) => {
            info!("ovn-gatewayd exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "ovn-gatewayd exiting with error");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    let mut config = GatewayConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config))?;

    if let Some(router) = &args.cluster_router {
        config.cluster_router = router.clone();
    }
    if let Some(switch) = &args.node_switch {
        config.node_switch = switch.clone();
    }
    if let Some(secs) = args.interval_secs {
        config.resync_interval_secs = secs;
    }
    if let Some(node) = &args.node_name {
        config.node_name = Some(node.clone());
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    let node_name = match &config.node_name {
        Some(name) => name.clone(),
        None => local_hostname().context("resolving node name")?,
    };

    info!(
        node = %node_name,
        cluster_router = %config.cluster_router,
        node_switch = %config.node_switch,
        interval_secs = config.resync_interval_secs,
        family = %config.ip_family,
        "Starting ovn-gatewayd"
    );

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let client = kube::Client::try_default()
        .await
        .context("creating Kubernetes client")?;
    let (pods, pod_watch) = KubePodLister::start(client, shutdown.clone())
        .await
        .context("syncing pod cache")?;

    let backends = GatewayBackends {
        pods: Arc::new(pods),
        ovn: Arc::new(OvnNbClient::new(
            config.ovn.nb_address.as_deref(),
            config.ovn.timeout_secs,
        )),
        ipsets: Arc::new(IpSetManager::new(config.naming())),
        rules: Arc::new(Iptables::new(config.ip_family)),
    };

    let mut mgr = GatewayMgr::new(config, node_name, backends);
    let result = mgr.run(shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = pod_watch.await {
        warn!(error = %e, "Pod watch task panicked");
    }

    result.context("gateway reconciler failed")
}

/// Cancel `shutdown` on SIGINT or SIGTERM
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => Some(sigterm),
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                None
            }
        };

        match wait_for_signal(tokio::signal::ctrl_c(), sigterm).await {
            Some(name) => {
                info!(signal = name, "Received shutdown signal");
                shutdown.cancel();
            }
            None => error!("No shutdown signal handler could be installed"),
        }
    });
}

/// Wait for the first delivered signal and return its name.
///
/// A handler that fails is logged and no longer waited on. Returns `None`
/// only when neither handler is usable.
async fn wait_for_signal(
    sigint: impl Future<Output = io::Result<()>>,
    sigterm: Option<Signal>,
) -> Option<&'static str> {
    let sigint = async {
        match sigint.await {
            Ok(()) => Some("SIGINT"),
            Err(e) => {
                error!(error = %e, "Failed to install SIGINT handler");
                None
            }
        }
    };
    let sigterm = async {
        match sigterm {
            Some(mut sigterm) => sigterm.recv().await.map(|()| "SIGTERM"),
            None => None,
        }
    };
    tokio::pin!(sigint, sigterm);

    let (mut sigint_done, mut sigterm_done) = (false, false);
    loop {
        tokio::select! {
            got = &mut sigint, if !sigint_done => match got {
                Some(name) => return Some(name),
                None => sigint_done = true,
            },
            got = &mut sigterm, if !sigterm_done => match got {
                Some(name) => return Some(name),
                None => sigterm_done = true,
            },
            else => return None,
        }
    }
}
