//! Mesos discovery/monitoring probe
//!
//! Periodically interrogates a Mesos or DC/OS cluster and produces a
//! normalized inventory of nodes, containers and applications with resource
//! capacities and usage, for consumption by an external optimization
//! server.

use anyhow::{bail, Context, Result};
use clap::Parser;
use probe_lib::client::HttpClientFactory;
use probe_lib::dto::EntityKind;
use probe_lib::health::{components, HealthRegistry};
use probe_lib::{
    DiscoveryExecutor, MesosVendor, PartitionStrategy, ProbeLogger, ProbeMetrics, TargetConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const PROBE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Mesos cluster discovery and monitoring probe
#[derive(Parser)]
#[command(name = "mesos-probe", version, about)]
struct Cli {
    /// Mesos vendor: 'Apache Mesos' or 'Mesosphere DCOS'
    #[arg(long, env = "PROBE_MESOS_TYPE", default_value = "Apache Mesos")]
    mesos_type: String,

    /// Comma-separated host[:port] list of the cluster's masters
    #[arg(long, env = "PROBE_MASTER_IP_PORT")]
    master_ip_port: Option<String>,

    /// Username for the master login
    #[arg(long, env = "PROBE_MASTER_USER", default_value = "")]
    master_user: String,

    /// Password for the master login
    #[arg(long, env = "PROBE_MASTER_PWD", default_value = "")]
    master_pwd: String,

    /// Path to a JSON target configuration; takes precedence over the
    /// individual target flags
    #[arg(long, env = "PROBE_TARGET_CONFIG")]
    target_config: Option<PathBuf>,
}

fn target_from_cli(cli: &Cli) -> Result<TargetConfig> {
    if let Some(path) = &cli.target_config {
        return TargetConfig::from_file(path)
            .with_context(|| format!("loading target config {}", path.display()));
    }

    let vendor = MesosVendor::parse(&cli.mesos_type).context("parsing --mesos-type")?;
    let Some(master_ip_port) = cli.master_ip_port.clone() else {
        bail!("--master-ip-port (or --target-config) is required");
    };
    let target = TargetConfig {
        vendor,
        master_ip_port,
        username: cli.master_user.clone(),
        password: cli.master_pwd.clone(),
    };
    target.validate()?;
    Ok(target)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();
    // target config errors are fatal at startup
    let target = target_from_cli(&cli)?;
    let probe_config = config::ProbeConfig::load()?;
    info!(
        vendor = %target.vendor,
        masters = %target.master_ip_port,
        interval_secs = probe_config.discovery_interval_secs,
        "probe configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::LEADER_TRACKER).await;
    health_registry.register(components::DISCOVERY).await;
    health_registry.register(components::API).await;

    let metrics = ProbeMetrics::new();
    let logger = ProbeLogger::new(target.master_ip_port.clone());
    logger.log_startup(PROBE_VERSION);

    let factory = Arc::new(HttpClientFactory::new(
        target.vendor,
        Duration::from_secs(probe_config.request_timeout_secs),
    )?);
    let mut executor = DiscoveryExecutor::new(
        target,
        factory,
        PartitionStrategy::FixedWorkerCount(probe_config.worker_count),
    )?;

    // One login attempt up front; failure is not fatal, the cycle loop
    // re-elects on its own schedule.
    match executor.validate_target().await {
        Ok(()) => health_registry.set_healthy(components::LEADER_TRACKER).await,
        Err(err) => {
            warn!(error = %err, "initial leader login failed");
            health_registry
                .set_unhealthy(components::LEADER_TRACKER, err.to_string())
                .await;
        }
    }

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));
    health_registry.set_ready(true).await;
    let api_state = app_state.clone();
    let api_port = probe_config.api_port;
    tokio::spawn(async move {
        if let Err(err) = api::serve(api_port, api_state).await {
            warn!(error = %err, "API server exited");
        }
    });

    run_discovery_loop(
        &mut executor,
        &health_registry,
        &metrics,
        &logger,
        Duration::from_secs(probe_config.discovery_interval_secs),
    )
    .await;

    logger.log_shutdown("SIGINT received");
    Ok(())
}

async fn run_discovery_loop(
    executor: &mut DiscoveryExecutor,
    health_registry: &HealthRegistry,
    metrics: &ProbeMetrics,
    logger: &ProbeLogger,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let start = std::time::Instant::now();
                match executor.discover().await {
                    Ok(result) => {
                        let elapsed = start.elapsed();
                        metrics.observe_cycle_latency(elapsed.as_secs_f64());
                        metrics.record_cycle(result.entities.len(), result.errors.len());
                        let nodes = result
                            .entities
                            .iter()
                            .filter(|e| e.kind == EntityKind::VirtualMachine)
                            .count();
                        let containers = result
                            .entities
                            .iter()
                            .filter(|e| e.kind == EntityKind::Container)
                            .count();
                        metrics.record_snapshot(nodes, containers);
                        logger.log_cycle(
                            result.entities.len(),
                            result.errors.len(),
                            elapsed.as_millis(),
                        );

                        health_registry.set_healthy(components::LEADER_TRACKER).await;
                        if result.errors.is_empty() {
                            health_registry.set_healthy(components::DISCOVERY).await;
                        } else {
                            health_registry
                                .set_degraded(
                                    components::DISCOVERY,
                                    format!("{} agents failed", result.errors.len()),
                                )
                                .await;
                        }
                        // The entity graph is handed to the upstream session
                        // from here; transport lives outside this process.
                    }
                    Err(err) => {
                        logger.log_cycle_failure(&err.to_string());
                        health_registry
                            .set_unhealthy(components::DISCOVERY, err.to_string())
                            .await;
                        if matches!(err, probe_lib::Error::LeaderUnavailable(_)) {
                            health_registry
                                .set_unhealthy(components::LEADER_TRACKER, err.to_string())
                                .await;
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }
}
