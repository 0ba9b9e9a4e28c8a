//! Error types for runtime inspection

use std::time::Duration;
use thiserror::Error;

/// Failure to obtain output from the container runtime
#[derive(Debug, Error)]
pub enum InspectorError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to collect output of `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    NonZeroExit {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

pub type InspectorResult<T> = std::result::Result<T, InspectorError>;
