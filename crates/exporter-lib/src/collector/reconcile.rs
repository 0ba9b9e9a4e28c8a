//! Reconciliation of runtime output into the container gauges
//!
//! One cycle lists every container, writes its status gauge, zeroes usage
//! for stopped containers, then fetches stats for all running containers in
//! a single batched query and writes their usage gauges.

use super::RuntimeInspector;
use crate::models::{ContainerIdentity, ContainerStats, ListedContainer};
use crate::registry::ContainerGauges;
use crate::size::try_parse_size;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Substring of the runtime's status text that marks a running container
const RUNNING_MARKER: &str = "Up";

/// Separator between received and transmitted bytes in the net I/O column
const NET_IO_SEPARATOR: &str = " / ";

/// Outcome of one reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleSummary {
    /// Containers in the listing
    pub listed: usize,
    /// Listed containers that were running
    pub running: usize,
    /// Stats lines written to the gauges
    pub stats_applied: usize,
    /// Running containers absent from the stats output
    pub missing_stats: usize,
    pub malformed_list_lines: u64,
    pub malformed_stats_lines: u64,
    /// Stats lines dropped because cpu or memory was not a number
    pub invalid_percent_lines: u64,
    /// Net I/O values that degraded to zero
    pub unparsed_sizes: u64,
    pub list_error: Option<String>,
    pub stats_error: Option<String>,
}

impl CycleSummary {
    pub fn list_failed(&self) -> bool {
        self.list_error.is_some()
    }

    pub fn stats_failed(&self) -> bool {
        self.stats_error.is_some()
    }
}

/// A stats line that could not be applied
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsLineError {
    #[error("expected id:name:cpu:mem:netio")]
    Malformed,

    #[error("invalid {field} value {value:?} for {identity}")]
    InvalidPercent {
        identity: ContainerIdentity,
        field: &'static str,
        value: String,
    },
}

/// A successfully parsed stats line
#[derive(Debug, Clone, PartialEq)]
pub struct StatsLine {
    pub stats: ContainerStats,
    /// Net I/O values that could not be parsed and were recorded as zero
    pub unparsed_sizes: u64,
}

/// Parse one `id:name:status` line, `None` if it has fewer than three fields
pub fn parse_list_line(line: &str) -> Option<ListedContainer> {
    let parts: Vec<&str> = line.trim().split(':').collect();
    if parts.len() < 3 {
        return None;
    }

    Some(ListedContainer {
        identity: ContainerIdentity::new(parts[0].trim(), parts[1].trim()),
        running: parts[2].contains(RUNNING_MARKER),
    })
}

/// Parse one `id:name:cpu%:mem%:rx / tx` line
pub fn parse_stats_line(line: &str) -> Result<StatsLine, StatsLineError> {
    let parts: Vec<&str> = line.trim().split(':').collect();
    if parts.len() < 5 {
        return Err(StatsLineError::Malformed);
    }

    let net_io: Vec<&str> = parts[4].trim().split(NET_IO_SEPARATOR).collect();
    let [rx, tx] = net_io[..] else {
        return Err(StatsLineError::Malformed);
    };

    let identity = ContainerIdentity::new(parts[0].trim(), parts[1].trim());
    let cpu_percent = parse_percent(parts[2]).ok_or_else(|| StatsLineError::InvalidPercent {
        identity: identity.clone(),
        field: "cpu",
        value: parts[2].trim().to_string(),
    })?;
    let mem_percent = parse_percent(parts[3]).ok_or_else(|| StatsLineError::InvalidPercent {
        identity: identity.clone(),
        field: "memory",
        value: parts[3].trim().to_string(),
    })?;

    let mut unparsed_sizes = 0;
    let mut bytes = |text: &str| {
        try_parse_size(text).unwrap_or_else(|| {
            debug!(value = %text.trim(), "Unparseable byte size, recording 0");
            unparsed_sizes += 1;
            0.0
        })
    };
    let net_rx_bytes = bytes(rx);
    let net_tx_bytes = bytes(tx);

    Ok(StatsLine {
        stats: ContainerStats {
            identity,
            cpu_percent,
            mem_percent,
            net_rx_bytes,
            net_tx_bytes,
        },
        unparsed_sizes,
    })
}

fn parse_percent(field: &str) -> Option<f64> {
    let field = field.trim();
    field.strip_suffix('%').unwrap_or(field).trim().parse().ok()
}

/// Runs reconciliation cycles against a runtime inspector
pub struct Reconciler {
    inspector: Arc<dyn RuntimeInspector>,
}

impl Reconciler {
    pub fn new(inspector: Arc<dyn RuntimeInspector>) -> Self {
        Self { inspector }
    }

    /// Run one full cycle, writing results into `gauges`
    ///
    /// Runtime failures are logged and reported in the summary; they never
    /// abort the caller. A failed listing leaves every gauge untouched.
    pub async fn reconcile(&self, gauges: &ContainerGauges) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let listing = match self.inspector.list_containers().await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Failed to list containers, skipping cycle");
                summary.list_error = Some(e.to_string());
                return summary;
            }
        };
        gauges.advance_cycle();

        let mut needs_stats = HashSet::new();
        for line in listing.lines().filter(|l| !l.trim().is_empty()) {
            let Some(container) = parse_list_line(line) else {
                debug!(line = %line, "Skipping malformed container listing line");
                summary.malformed_list_lines += 1;
                continue;
            };

            summary.listed += 1;
            gauges.set_status(&container.identity, container.running);

            if container.running {
                needs_stats.insert(container.identity);
            } else {
                gauges.zero_usage(&container.identity);
            }
        }
        summary.running = needs_stats.len();

        if needs_stats.is_empty() {
            return summary;
        }

        let stats_output = match self.inspector.stats_for_running().await {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    error = %e,
                    running = summary.running,
                    "Failed to fetch container stats, keeping previous usage values"
                );
                summary.stats_error = Some(e.to_string());
                return summary;
            }
        };

        for line in stats_output.lines().filter(|l| !l.trim().is_empty()) {
            match parse_stats_line(line) {
                Ok(parsed) => {
                    gauges.set_usage(&parsed.stats);
                    needs_stats.remove(&parsed.stats.identity);
                    summary.stats_applied += 1;
                    summary.unparsed_sizes += parsed.unparsed_sizes;
                }
                Err(StatsLineError::Malformed) => {
                    debug!(line = %line, "Skipping malformed stats line");
                    summary.malformed_stats_lines += 1;
                }
                Err(e @ StatsLineError::InvalidPercent { .. }) => {
                    warn!(error = %e, "Failed to parse container stats, skipping line");
                    summary.invalid_percent_lines += 1;
                }
            }
        }

        // Containers that stopped or started between the two queries keep their previous usage
        summary.missing_stats = needs_stats.len();
        if summary.missing_stats > 0 {
            debug!(
                missing = summary.missing_stats,
                "Running containers absent from stats output"
            );
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_line_running() {
        let container = parse_list_line("c1:web:Up 3 days").unwrap();
        assert_eq!(container.identity, ContainerIdentity::new("c1", "web"));
        assert!(container.running);
    }

    #[test]
    fn test_parse_list_line_trims_identity() {
        let container = parse_list_line("  c1 : web :Up 2 hours (healthy)").unwrap();
        assert_eq!(container.identity, ContainerIdentity::new("c1", "web"));
        assert!(container.running);
    }

    #[test]
    fn test_parse_list_line_stopped_states() {
        for status in ["Exited (0) 2 hours ago", "Created", "Restarting (1) 5 seconds ago"] {
            let container = parse_list_line(&format!("c2:db:{status}")).unwrap();
            assert!(!container.running, "{status} should not count as running");
        }
    }

    #[test]
    fn test_parse_list_line_marker_is_case_sensitive() {
        assert!(!parse_list_line("c3:job:up to no good").unwrap().running);
    }

    #[test]
    fn test_parse_list_line_too_few_fields() {
        assert_eq!(parse_list_line("abc123:onlytwoparts"), None);
        assert_eq!(parse_list_line("garbage"), None);
    }

    #[test]
    fn test_parse_stats_line() {
        let parsed = parse_stats_line("c1:web:2.5%:10.0%:1.2kB / 3.4MB").unwrap();

        assert_eq!(parsed.stats.identity, ContainerIdentity::new("c1", "web"));
        assert_eq!(parsed.stats.cpu_percent, 2.5);
        assert_eq!(parsed.stats.mem_percent, 10.0);
        assert!((parsed.stats.net_rx_bytes - 1228.8).abs() < 1e-6);
        assert!((parsed.stats.net_tx_bytes - 3.4 * 1024.0 * 1024.0).abs() < 1e-6);
        assert_eq!(parsed.unparsed_sizes, 0);
    }

    #[test]
    fn test_parse_stats_line_too_few_fields() {
        assert_eq!(
            parse_stats_line("c1:web:2.5%:10.0%"),
            Err(StatsLineError::Malformed)
        );
    }

    #[test]
    fn test_parse_stats_line_net_io_without_separator() {
        assert_eq!(
            parse_stats_line("c1:web:2.5%:10.0%:1.2kB"),
            Err(StatsLineError::Malformed)
        );
        assert_eq!(
            parse_stats_line("c1:web:2.5%:10.0%:1kB / 2kB / 3kB"),
            Err(StatsLineError::Malformed)
        );
    }

    #[test]
    fn test_parse_stats_line_invalid_cpu() {
        match parse_stats_line("c1:web:--:10.0%:1kB / 1kB") {
            Err(StatsLineError::InvalidPercent { field, value, .. }) => {
                assert_eq!(field, "cpu");
                assert_eq!(value, "--");
            }
            other => panic!("expected invalid cpu, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_stats_line_invalid_memory() {
        assert!(matches!(
            parse_stats_line("c1:web:1%:n/a:1kB / 1kB"),
            Err(StatsLineError::InvalidPercent { field: "memory", .. })
        ));
    }

    #[test]
    fn test_parse_stats_line_bad_size_degrades_to_zero() {
        let parsed = parse_stats_line("c1:web:1%:2%:??? / 0B").unwrap();

        assert_eq!(parsed.stats.net_rx_bytes, 0.0);
        assert_eq!(parsed.stats.net_tx_bytes, 0.0);
        assert_eq!(parsed.unparsed_sizes, 1);
    }
}
