//! Health check infrastructure for the exporter
//!
//! Tracks whether the poll loop is alive and whether the container runtime
//! answered the most recent cycle. Backs the `/healthz` and `/readyz` probes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is failing but metrics are still served (possibly stale)
    Degraded,
    /// Component has stopped
    Unhealthy,
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|health| health.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReadinessResponse {
    fn not_ready(reason: &str) -> Self {
        Self {
            ready: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Component names for health tracking
pub mod components {
    pub const POLLER: &str = "poller";
    pub const RUNTIME: &str = "runtime";
}

/// Health registry for tracking component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<AtomicBool>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.set_healthy(name).await;
    }

    pub async fn set_healthy(&self, name: &str) {
        self.record(name, ComponentHealth::healthy()).await;
    }

    /// Poll failures degrade a component; stale metrics are still served
    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.record(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.record(name, ComponentHealth::unhealthy(message)).await;
    }

    async fn record(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    /// Mark the exporter as having completed its first listing
    pub async fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        if !self.ready.load(Ordering::SeqCst) {
            return ReadinessResponse::not_ready("No container listing has completed yet");
        }

        match self.health().await.status {
            ComponentStatus::Unhealthy => ReadinessResponse::not_ready("Poll loop is not running"),
            _ => ReadinessResponse {
                ready: true,
                reason: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_runtime_degraded_keeps_exporter_operational() {
        let registry = HealthRegistry::new();
        registry.register(components::POLLER).await;
        registry.register(components::RUNTIME).await;
        registry.set_ready(true).await;

        registry
            .set_degraded(components::RUNTIME, "docker ps failed")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::RUNTIME].message.as_deref(),
            Some("docker ps failed")
        );
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_stopped_poller_is_unhealthy_and_not_ready() {
        let registry = HealthRegistry::new();
        registry.register(components::POLLER).await;
        registry.set_ready(true).await;

        registry
            .set_unhealthy(components::POLLER, "Poll loop stopped")
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
        assert!(!registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[test]
    fn test_compute_status_reports_worst_component() {
        let mut components = HashMap::new();
        components.insert("a".to_string(), ComponentHealth::healthy());
        components.insert("b".to_string(), ComponentHealth::degraded("slow"));
        assert_eq!(
            HealthResponse::compute_status(&components),
            ComponentStatus::Degraded
        );

        components.insert("c".to_string(), ComponentHealth::unhealthy("down"));
        assert_eq!(
            HealthResponse::compute_status(&components),
            ComponentStatus::Unhealthy
        );
    }

    #[test]
    fn test_component_status_serializes_lowercase() {
        let json = serde_json::to_string(&ComponentHealth::degraded("slow")).unwrap();
        assert!(json.contains("\"status\":\"degraded\""));
    }
}
