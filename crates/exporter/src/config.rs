//! Exporter configuration

use anyhow::{ensure, Result};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable prefix, e.g. `EXPORTER_LISTEN_PORT`
pub const ENV_PREFIX: &str = "EXPORTER";

/// Exporter configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExporterConfig {
    /// TCP port serving the exposition and health endpoints
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Pause between poll cycles in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Upper bound on a single runtime command in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Docker client executable
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,

    /// Run the docker client through sudo
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,

    /// Drop containers missing from this many listings; 0 keeps them forever
    #[serde(default)]
    pub stale_after_cycles: u64,
}

fn default_listen_port() -> u16 {
    1919
}

fn default_poll_interval() -> u64 {
    5
}

fn default_command_timeout() -> u64 {
    30
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_use_sudo() -> bool {
    true
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            poll_interval_secs: default_poll_interval(),
            command_timeout_secs: default_command_timeout(),
            docker_binary: default_docker_binary(),
            use_sudo: default_use_sudo(),
            stale_after_cycles: 0,
        }
    }
}

impl ExporterConfig {
    /// Load configuration from `EXPORTER_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;

        ensure!(config.poll_interval_secs > 0, "poll interval must be positive");
        ensure!(
            config.command_timeout_secs > 0,
            "command timeout must be positive"
        );

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }
}
