//! Observability infrastructure for the exporter
//!
//! Provides:
//! - Self metrics about the poll loop (latency, failures, freshness)
//! - Structured JSON lifecycle logging with tracing

use crate::collector::CycleSummary;
use prometheus::{
    Gauge, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry,
};
use tracing::info;

/// Histogram buckets for poll cycle duration (in seconds)
const POLL_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Poll phases reported in error counters
pub mod phases {
    pub const LIST: &str = "list";
    pub const STATS: &str = "stats";
}

/// Sources of malformed input reported in counters
pub mod sources {
    pub const LIST: &str = "list";
    pub const STATS: &str = "stats";
    pub const SIZE: &str = "size";
    pub const PERCENT: &str = "percent";
}

/// Metrics describing the exporter itself
///
/// Cloning is cheap; clones share the underlying collectors.
#[derive(Clone)]
pub struct ExporterMetrics {
    poll_duration_seconds: Histogram,
    poll_errors: IntCounterVec,
    malformed_lines: IntCounterVec,
    last_successful_poll: Gauge,
    containers_observed: IntGauge,
}

impl ExporterMetrics {
    /// Create the collectors and register them with `registry`
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let poll_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "docker_exporter_poll_duration_seconds",
                "Time spent on one reconciliation cycle",
            )
            .buckets(POLL_BUCKETS.to_vec()),
        )?;
        let poll_errors = IntCounterVec::new(
            Opts::new(
                "docker_exporter_poll_errors_total",
                "Runtime queries that failed, by phase",
            ),
            &["phase"],
        )?;
        let malformed_lines = IntCounterVec::new(
            Opts::new(
                "docker_exporter_malformed_lines_total",
                "Runtime output fragments that could not be parsed, by source",
            ),
            &["source"],
        )?;
        let last_successful_poll = Gauge::new(
            "docker_exporter_last_successful_poll_timestamp_seconds",
            "Unix time of the last cycle whose container listing succeeded",
        )?;
        let containers_observed = IntGauge::new(
            "docker_exporter_containers_observed",
            "Containers reported by the last successful listing",
        )?;

        registry.register(Box::new(poll_duration_seconds.clone()))?;
        registry.register(Box::new(poll_errors.clone()))?;
        registry.register(Box::new(malformed_lines.clone()))?;
        registry.register(Box::new(last_successful_poll.clone()))?;
        registry.register(Box::new(containers_observed.clone()))?;

        Ok(Self {
            poll_duration_seconds,
            poll_errors,
            malformed_lines,
            last_successful_poll,
            containers_observed,
        })
    }

    /// Record a poll cycle duration observation
    pub fn observe_poll_duration(&self, duration_secs: f64) {
        self.poll_duration_seconds.observe(duration_secs);
    }

    /// Increment the failure counter of a poll phase
    pub fn inc_poll_errors(&self, phase: &str) {
        self.poll_errors.with_label_values(&[phase]).inc();
    }

    /// Add to the malformed input counter of a source
    pub fn add_malformed(&self, source: &str, count: u64) {
        if count > 0 {
            self.malformed_lines.with_label_values(&[source]).inc_by(count);
        }
    }

    /// Fold one cycle summary into the self metrics
    pub fn record_cycle(&self, summary: &CycleSummary, timestamp_secs: i64) {
        if summary.list_failed() {
            self.inc_poll_errors(phases::LIST);
            return;
        }

        self.last_successful_poll.set(timestamp_secs as f64);
        self.containers_observed.set(summary.listed as i64);
        if summary.stats_failed() {
            self.inc_poll_errors(phases::STATS);
        }
        self.add_malformed(sources::LIST, summary.malformed_list_lines);
        self.add_malformed(sources::STATS, summary.malformed_stats_lines);
        self.add_malformed(sources::SIZE, summary.unparsed_sizes);
        self.add_malformed(sources::PERCENT, summary.invalid_percent_lines);
    }

    pub fn poll_errors(&self, phase: &str) -> u64 {
        self.poll_errors.with_label_values(&[phase]).get()
    }

    pub fn malformed(&self, source: &str) -> u64 {
        self.malformed_lines.with_label_values(&[source]).get()
    }

    pub fn last_successful_poll(&self) -> f64 {
        self.last_successful_poll.get()
    }
}

/// Structured logger for exporter lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    listen_addr: String,
}

impl StructuredLogger {
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
        }
    }

    /// Log exporter startup
    pub fn log_startup(&self, version: &str, poll_interval_secs: u64) {
        info!(
            event = "exporter_started",
            listen_addr = %self.listen_addr,
            exporter_version = %version,
            poll_interval_secs = poll_interval_secs,
            "Docker exporter started"
        );
    }

    /// Log exporter shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            listen_addr = %self.listen_addr,
            reason = %reason,
            "Docker exporter shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_metrics_registration() {
        let registry = Registry::new();
        let metrics = ExporterMetrics::register(&registry).unwrap();

        metrics.observe_poll_duration(0.2);
        metrics.inc_poll_errors(phases::STATS);

        assert_eq!(metrics.poll_errors(phases::STATS), 1);
        assert_eq!(metrics.poll_errors(phases::LIST), 0);
        assert!(ExporterMetrics::register(&registry).is_err());
    }

    #[test]
    fn test_record_cycle_list_failure_keeps_timestamp() {
        let registry = Registry::new();
        let metrics = ExporterMetrics::register(&registry).unwrap();

        metrics.record_cycle(
            &CycleSummary {
                listed: 3,
                ..CycleSummary::default()
            },
            1_700_000_000,
        );
        metrics.record_cycle(
            &CycleSummary {
                list_error: Some("docker ps timed out".to_string()),
                ..CycleSummary::default()
            },
            1_700_000_005,
        );

        assert_eq!(metrics.last_successful_poll(), 1_700_000_000.0);
        assert_eq!(metrics.poll_errors(phases::LIST), 1);
    }

    #[test]
    fn test_record_cycle_counts_malformed_input() {
        let registry = Registry::new();
        let metrics = ExporterMetrics::register(&registry).unwrap();

        metrics.record_cycle(
            &CycleSummary {
                listed: 1,
                malformed_list_lines: 2,
                unparsed_sizes: 1,
                invalid_percent_lines: 3,
                stats_error: Some("docker stats exited with 1".to_string()),
                ..CycleSummary::default()
            },
            0,
        );

        assert_eq!(metrics.malformed(sources::LIST), 2);
        assert_eq!(metrics.malformed(sources::STATS), 0);
        assert_eq!(metrics.malformed(sources::SIZE), 1);
        assert_eq!(metrics.malformed(sources::PERCENT), 3);
        assert_eq!(metrics.poll_errors(phases::STATS), 1);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("0.0.0.0:1919");
        assert_eq!(logger.listen_addr, "0.0.0.0:1919");
    }
}
