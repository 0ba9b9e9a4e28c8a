//! Per-container gauge registry
//!
//! Holds the five label-indexed gauge vectors that make up the exported
//! container metrics. Each vector carries its own lock, so a scrape only
//! ever waits on the vector it is currently encoding.
//!
//! Entries are created on first write and are never removed unless TTL
//! eviction is explicitly requested through [`ContainerGauges::evict_unseen`].

use crate::models::{ContainerIdentity, ContainerStats};
use dashmap::DashMap;
use prometheus::{core::Collector, GaugeVec, Opts, Registry};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Label names shared by every container gauge
pub const LABELS: &[&str] = &["name", "id"];

/// Selects one of the tracked gauges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeKind {
    Status,
    CpuPercent,
    MemPercent,
    NetReceived,
    NetTransmitted,
}

/// Label-indexed container gauges registered into a Prometheus registry
pub struct ContainerGauges {
    status: GaugeVec,
    cpu_percent: GaugeVec,
    mem_percent: GaugeVec,
    net_received: GaugeVec,
    net_transmitted: GaugeVec,
    /// Listing cycle in which each identity was last written
    last_seen: DashMap<ContainerIdentity, u64>,
    cycle: AtomicU64,
}

impl ContainerGauges {
    /// Create the gauge vectors and register them with `registry`
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            status: gauge_vec(
                registry,
                "docker_container_status",
                "Container status (1: running, 0: stopped)",
            )?,
            cpu_percent: gauge_vec(
                registry,
                "docker_container_cpu_usage_percent",
                "CPU usage in percentage",
            )?,
            mem_percent: gauge_vec(
                registry,
                "docker_container_memory_usage_percent",
                "Memory usage in percentage",
            )?,
            net_received: gauge_vec(
                registry,
                "docker_container_network_received_bytes",
                "Network received bytes",
            )?,
            net_transmitted: gauge_vec(
                registry,
                "docker_container_network_transmitted_bytes",
                "Network transmitted bytes",
            )?,
            last_seen: DashMap::new(),
            cycle: AtomicU64::new(0),
        })
    }

    /// Start a new listing cycle, returning its number
    pub fn advance_cycle(&self) -> u64 {
        self.cycle.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Set the status gauge to 1.0 for running containers and 0.0 otherwise
    pub fn set_status(&self, identity: &ContainerIdentity, running: bool) {
        let value = if running { 1.0 } else { 0.0 };
        self.gauge(GaugeKind::Status)
            .with_label_values(&identity.label_values())
            .set(value);
        self.touch(identity);
    }

    /// Overwrite the four usage gauges from a stats sample
    pub fn set_usage(&self, stats: &ContainerStats) {
        let labels = stats.identity.label_values();
        self.cpu_percent
            .with_label_values(&labels)
            .set(stats.cpu_percent);
        self.mem_percent
            .with_label_values(&labels)
            .set(stats.mem_percent);
        self.net_received
            .with_label_values(&labels)
            .set(stats.net_rx_bytes);
        self.net_transmitted
            .with_label_values(&labels)
            .set(stats.net_tx_bytes);
        self.touch(&stats.identity);
    }

    /// Reset the four usage gauges of a stopped container to zero
    pub fn zero_usage(&self, identity: &ContainerIdentity) {
        self.set_usage(&ContainerStats {
            identity: identity.clone(),
            cpu_percent: 0.0,
            mem_percent: 0.0,
            net_rx_bytes: 0.0,
            net_tx_bytes: 0.0,
        });
    }

    /// Remove identities that have not been written for `max_age` listing cycles
    pub fn evict_unseen(&self, max_age: u64) -> Vec<ContainerIdentity> {
        let current = self.cycle.load(Ordering::SeqCst);
        let mut evicted = Vec::new();

        self.last_seen.retain(|identity, seen| {
            if current.saturating_sub(*seen) < max_age {
                return true;
            }

            let labels = identity.label_values();
            for vec in self.vectors() {
                // Usage gauges may never have been written for this identity
                let _ = vec.remove_label_values(&labels);
            }
            debug!(container_id = %identity.id, name = %identity.name, "Evicted stale container");
            evicted.push(identity.clone());
            false
        });

        evicted
    }

    /// Current value of one gauge, `None` if never written
    pub fn value(&self, kind: GaugeKind, identity: &ContainerIdentity) -> Option<f64> {
        self.gauge(kind)
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .find(|metric| {
                let labels = metric.get_label();
                labels.len() == LABELS.len()
                    && labels.iter().all(|pair| match pair.get_name() {
                        "name" => pair.get_value() == identity.name,
                        "id" => pair.get_value() == identity.id,
                        _ => false,
                    })
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    /// Number of identities currently tracked
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    fn touch(&self, identity: &ContainerIdentity) {
        let cycle = self.cycle.load(Ordering::SeqCst);
        self.last_seen.insert(identity.clone(), cycle);
    }

    fn gauge(&self, kind: GaugeKind) -> &GaugeVec {
        match kind {
            GaugeKind::Status => &self.status,
            GaugeKind::CpuPercent => &self.cpu_percent,
            GaugeKind::MemPercent => &self.mem_percent,
            GaugeKind::NetReceived => &self.net_received,
            GaugeKind::NetTransmitted => &self.net_transmitted,
        }
    }

    fn vectors(&self) -> [&GaugeVec; 5] {
        [
            &self.status,
            &self.cpu_percent,
            &self.mem_percent,
            &self.net_received,
            &self.net_transmitted,
        ]
    }
}

fn gauge_vec(registry: &Registry, name: &str, help: &str) -> prometheus::Result<GaugeVec> {
    let vec = GaugeVec::new(Opts::new(name, help), LABELS)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}
