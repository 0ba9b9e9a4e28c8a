//! Library for the docker container metrics exporter
//!
//! This crate provides the core functionality for:
//! - Querying the container runtime for status and live stats
//! - Parsing the runtime's human-readable output
//! - Reconciling results into label-indexed Prometheus gauges
//! - Driving reconciliation on a fixed poll interval
//! - Health checks and self observability

pub mod collector;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod registry;
pub mod size;

pub use collector::{
    DockerCliInspector, PollConfig, PollLoop, PollLoopBuilder, Reconciler, RuntimeInspector,
};
pub use error::{InspectorError, InspectorResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
pub use registry::{ContainerGauges, GaugeKind};
pub use size::{parse_size, try_parse_size};
