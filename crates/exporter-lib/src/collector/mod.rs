//! Container status and usage collection
//!
//! This module queries the container runtime for its container listing and
//! live stats, reconciles the text output into the container gauges, and
//! drives that reconciliation on a fixed interval.

mod docker_cli;
mod r#loop;
mod reconcile;


pub use docker_cli::{DockerCliInspector, LIST_FORMAT, STATS_FORMAT};
pub use r#loop::{PollConfig, PollLoop, PollLoopBuilder};
pub use reconcile::{
    parse_list_line, parse_stats_line, CycleSummary, Reconciler, StatsLine, StatsLineError,
};

use crate::error::InspectorResult;

pub use async_trait::async_trait;

/// Source of raw container runtime output
///
/// Both queries return the runtime's stdout unparsed, one container per line.
#[async_trait]
pub trait RuntimeInspector: Send + Sync {
    /// All containers regardless of state, as `id:name:status` lines
    async fn list_containers(&self) -> InspectorResult<String>;

    /// One snapshot of running containers, as `id:name:cpu%:mem%:rx / tx` lines
    async fn stats_for_running(&self) -> InspectorResult<String>;
}
