//! Docker exporter - container status and usage as Prometheus metrics
//!
//! Polls the docker CLI on a fixed interval and serves the resulting
//! per-container gauges for scraping.

use anyhow::{Context, Result};
use docker_exporter::{api, config::ExporterConfig};
use exporter_lib::{
    health::{components, HealthRegistry},
    ContainerGauges, DockerCliInspector, ExporterMetrics, PollLoopBuilder, StructuredLogger,
};
use prometheus::Registry;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ExporterConfig::load().context("Failed to load configuration")?;
    info!(
        docker_binary = %config.docker_binary,
        use_sudo = config.use_sudo,
        command_timeout_secs = config.command_timeout_secs,
        "Exporter configured"
    );

    let registry = Registry::new();
    let gauges = Arc::new(ContainerGauges::register(&registry)?);
    let metrics = ExporterMetrics::register(&registry)?;

    let health_registry = HealthRegistry::new();
    health_registry.register(components::POLLER).await;
    health_registry.register(components::RUNTIME).await;

    let inspector = DockerCliInspector::new(&config.docker_binary)
        .with_sudo(config.use_sudo)
        .with_timeout(config.command_timeout());

    let poll_loop = PollLoopBuilder::new()
        .inspector(Arc::new(inspector))
        .gauges(gauges)
        .metrics(metrics)
        .health(health_registry.clone())
        .interval(config.poll_interval())
        .stale_after_cycles(config.stale_after_cycles)
        .build()?;

    let logger = StructuredLogger::new(config.listen_addr());
    logger.log_startup(EXPORTER_VERSION, config.poll_interval_secs);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let poll_handle = tokio::spawn(poll_loop.run(shutdown_rx));

    let app_state = Arc::new(api::AppState::new(registry, health_registry));
    let mut server_shutdown = shutdown_tx.subscribe();
    let mut api_handle = tokio::spawn(api::serve(config.listen_addr(), app_state, async move {
        let _ = server_shutdown.recv().await;
    }));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        served = &mut api_handle => {
            logger.log_shutdown("exposition server stopped");
            let _ = shutdown_tx.send(());
            served?.context("Exposition server failed")?;
            return Ok(());
        }
    }

    let _ = shutdown_tx.send(());
    poll_handle.await?;
    api_handle.await??;
    info!("Shutdown complete");

    Ok(())
}
