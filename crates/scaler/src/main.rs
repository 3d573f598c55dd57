//! Fleet capacity scaler
//!
//! Runs the capacity control loop for a machine-set-backed compute
//! fleet: two periodic pollers (cluster node utilization, job-platform
//! pending backlog), a merge loop feeding the decision policy, and the
//! scale actuator.

use anyhow::Result;
use scaler_lib::{
    health::components, BacklogSource, HealthRegistry, KubeCluster, MergeLoop,
    NodeUtilizationSource, ObserveOnlyPolicy, Poller, PollerConfig, RetryPolicy, ScaleActuator,
    ScalerMetrics,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

mod api;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting fleet-scaler");

    // Load configuration
    let config = config::ScalerConfig::load()?;
    let instance_groups = config.instance_groups()?;
    let workload_namespaces = config.workload_namespaces()?;
    info!(
        instance_groups = ?instance_groups,
        poll_interval_secs = config.poll_interval_secs,
        "Scaler configured"
    );

    // Initialize health registry and metrics
    let health = HealthRegistry::new();
    health.register(components::NODE_POLLER).await;
    health.register(components::BACKLOG_POLLER).await;
    health.register(components::MERGE_LOOP).await;
    let metrics = ScalerMetrics::new();

    // Signal sources
    let cluster = Arc::new(
        KubeCluster::connect(&config.cluster_api_server, &config.cluster_token).await?,
    );
    let utilization = NodeUtilizationSource::new(cluster.clone(), workload_namespaces);
    let backlog = BacklogSource::new(
        Url::parse(&config.backlog_url)?,
        config.backlog_token.clone(),
        instance_groups,
        RetryPolicy::default(),
    )?;

    // Pollers and merge loop, coordinated only through channels
    let poller_config = PollerConfig {
        interval: Duration::from_secs(config.poll_interval_secs),
        ..PollerConfig::default()
    };
    let (node_poller, nodes_rx) = Poller::new(
        components::NODE_POLLER,
        Arc::new(utilization),
        poller_config.clone(),
        metrics.clone(),
        health.clone(),
    );
    let (backlog_poller, backlog_rx) = Poller::new(
        components::BACKLOG_POLLER,
        Arc::new(backlog),
        poller_config,
        metrics.clone(),
        health.clone(),
    );

    let actuator = Arc::new(
        ScaleActuator::new(cluster, metrics.clone())
            .with_drain_wait(Duration::from_secs(config.drain_wait_secs)),
    );
    let merge = MergeLoop::new(
        Arc::new(ObserveOnlyPolicy),
        actuator,
        metrics.clone(),
        health.clone(),
    );

    // Spawn the three workers with a shared shutdown signal
    let (shutdown_tx, _) = broadcast::channel(1);
    let node_handle = tokio::spawn(node_poller.run(shutdown_tx.subscribe()));
    let backlog_handle = tokio::spawn(backlog_poller.run(shutdown_tx.subscribe()));
    let merge_handle = tokio::spawn(merge.run(nodes_rx, backlog_rx, shutdown_tx.subscribe()));

    // Start health and metrics server
    let app_state = Arc::new(api::AppState::new(health.clone(), metrics.clone()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    health.set_ready(true).await;

    // Wait for shutdown signal, then stop every worker deterministically
    tokio::signal::ctrl_c().await?;
    info!("SIGINT received; shutting down");
    health.set_ready(false).await;
    let _ = shutdown_tx.send(());

    let _ = tokio::join!(node_handle, backlog_handle, merge_handle);
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
