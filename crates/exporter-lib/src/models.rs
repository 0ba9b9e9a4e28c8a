//! Core data models for the exporter

use std::fmt;

/// Label tuple that keys every per-container gauge
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerIdentity {
    pub id: String,
    pub name: String,
}

impl ContainerIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Label values in gauge declaration order (`name`, `id`)
    pub fn label_values(&self) -> [&str; 2] {
        [self.name.as_str(), self.id.as_str()]
    }
}

impl fmt::Display for ContainerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// One row of the container listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListedContainer {
    pub identity: ContainerIdentity,
    pub running: bool,
}

/// Live resource usage for a running container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStats {
    pub identity: ContainerIdentity,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub net_rx_bytes: f64,
    pub net_tx_bytes: f64,
}
