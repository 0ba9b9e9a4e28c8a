//! Container poll loop
//!
//! Runs the reconciler forever with a fixed pause after each completed
//! cycle. Cycles never overlap: a slow cycle simply delays the next one.

use super::{CycleSummary, Reconciler, RuntimeInspector};
use crate::health::{components, HealthRegistry};
use crate::observability::ExporterMetrics;
use crate::registry::ContainerGauges;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

/// Configuration for the poll loop
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Pause between the end of one cycle and the start of the next (default: 5 seconds)
    pub interval: Duration,
    /// Evict identities missing from this many listings; 0 disables eviction
    pub stale_after_cycles: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            stale_after_cycles: 0,
        }
    }
}

/// Periodically reconciles runtime state into the container gauges
pub struct PollLoop {
    reconciler: Reconciler,
    gauges: Arc<ContainerGauges>,
    metrics: ExporterMetrics,
    health: HealthRegistry,
    config: PollConfig,
}

impl PollLoop {
    pub fn new(
        reconciler: Reconciler,
        gauges: Arc<ContainerGauges>,
        metrics: ExporterMetrics,
        health: HealthRegistry,
        config: PollConfig,
    ) -> Self {
        Self {
            reconciler,
            gauges,
            metrics,
            health,
            config,
        }
    }

    /// Run until a shutdown signal is received
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            stale_after_cycles = self.config.stale_after_cycles,
            "Starting container poll loop"
        );
        self.health.set_healthy(components::POLLER).await;

        let mut cycle_count = 0u64;
        loop {
            let summary = self.run_cycle().await;
            cycle_count += 1;
            debug!(
                cycle = cycle_count,
                listed = summary.listed,
                running = summary.running,
                stats_applied = summary.stats_applied,
                "Poll cycle complete"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = shutdown.recv() => {
                    info!(cycles = cycle_count, "Shutting down container poll loop");
                    break;
                }
            }
        }

        self.health
            .set_unhealthy(components::POLLER, "Poll loop stopped")
            .await;
    }

    /// Run exactly one reconciliation cycle and record its outcome
    pub async fn run_cycle(&self) -> CycleSummary {
        let start = Instant::now();
        let summary = self.reconciler.reconcile(&self.gauges).await;

        self.metrics
            .observe_poll_duration(start.elapsed().as_secs_f64());
        self.metrics
            .record_cycle(&summary, chrono::Utc::now().timestamp());

        if self.config.stale_after_cycles > 0 && !summary.list_failed() {
            let evicted = self.gauges.evict_unseen(self.config.stale_after_cycles);
            if !evicted.is_empty() {
                info!(
                    evicted = evicted.len(),
                    remaining = self.gauges.len(),
                    "Evicted containers missing from recent listings"
                );
            }
        }

        self.update_health(&summary).await;
        summary
    }

    async fn update_health(&self, summary: &CycleSummary) {
        match (&summary.list_error, &summary.stats_error) {
            (Some(e), _) => {
                self.health
                    .set_degraded(components::RUNTIME, format!("container listing failed: {e}"))
                    .await;
            }
            (None, Some(e)) => {
                self.health
                    .set_degraded(components::RUNTIME, format!("stats query failed: {e}"))
                    .await;
                self.health.set_ready(true).await;
            }
            (None, None) => {
                self.health.set_healthy(components::RUNTIME).await;
                self.health.set_ready(true).await;
            }
        }
    }
}

/// Builder for creating the poll loop
pub struct PollLoopBuilder {
    inspector: Option<Arc<dyn RuntimeInspector>>,
    gauges: Option<Arc<ContainerGauges>>,
    metrics: Option<ExporterMetrics>,
    health: HealthRegistry,
    config: PollConfig,
}

impl PollLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            inspector: None,
            gauges: None,
            metrics: None,
            health: HealthRegistry::new(),
            config: PollConfig::default(),
        }
    }

    pub fn inspector(mut self, inspector: Arc<dyn RuntimeInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn gauges(mut self, gauges: Arc<ContainerGauges>) -> Self {
        self.gauges = Some(gauges);
        self
    }

    pub fn metrics(mut self, metrics: ExporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    /// Set the pause between cycles
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Enable TTL eviction after `cycles` listings without the container
    pub fn stale_after_cycles(mut self, cycles: u64) -> Self {
        self.config.stale_after_cycles = cycles;
        self
    }

    pub fn build(self) -> Result<PollLoop> {
        let inspector = self
            .inspector
            .ok_or_else(|| anyhow::anyhow!("Runtime inspector is required"))?;
        let gauges = self
            .gauges
            .ok_or_else(|| anyhow::anyhow!("Container gauges are required"))?;
        let metrics = self
            .metrics
            .ok_or_else(|| anyhow::anyhow!("Exporter metrics are required"))?;

        Ok(PollLoop::new(
            Reconciler::new(inspector),
            gauges,
            metrics,
            self.health,
            self.config,
        ))
    }
}

impl Default for PollLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
