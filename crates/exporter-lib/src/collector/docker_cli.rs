//! Runtime inspector backed by the docker command line client

use super::RuntimeInspector;
use crate::error::{InspectorError, InspectorResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Time a timed-out command group gets to exit after SIGTERM before SIGKILL
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Go template for `docker ps`
pub const LIST_FORMAT: &str = "{{.ID}}:{{.Names}}:{{.Status}}";

/// Go template for `docker stats`
pub const STATS_FORMAT: &str = "{{.ID}}:{{.Name}}:{{.CPUPerc}}:{{.MemPerc}}:{{.NetIO}}";

/// Invokes `[sudo] docker ...` and returns its stdout
#[derive(Debug, Clone)]
pub struct DockerCliInspector {
    binary: PathBuf,
    use_sudo: bool,
    timeout: Duration,
}

impl Default for DockerCliInspector {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCliInspector {
    /// Create an inspector running `binary` through sudo with a 30 second timeout
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            use_sudo: true,
            timeout: Duration::from_secs(30),
        }
    }

    /// Whether to prefix invocations with `sudo`
    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    /// Upper bound on a single invocation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, args: &[&str]) -> (Command, String) {
        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(&self.binary);
            cmd
        } else {
            Command::new(&self.binary)
        };
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so a timeout reaches docker behind sudo
        #[cfg(unix)]
        cmd.process_group(0);

        let prefix = if self.use_sudo { "sudo " } else { "" };
        let display = format!("{}{} {}", prefix, self.binary.display(), args.join(" "));
        (cmd, display)
    }

    async fn run(&self, args: &[&str]) -> InspectorResult<String> {
        let (mut cmd, command) = self.command(args);
        debug!(command = %command, "Invoking container runtime");

        let child = cmd.spawn().map_err(|source| InspectorError::Spawn {
            command: command.clone(),
            source,
        })?;
        let pgid = child.id();

        let output = child.wait_with_output();
        tokio::pin!(output);

        let output = tokio::select! {
            result = &mut output => result.map_err(|source| InspectorError::Wait {
                command: command.clone(),
                source,
            })?,
            _ = tokio::time::sleep(self.timeout) => {
                signal_group(pgid, GroupSignal::Terminate);
                if tokio::time::timeout(KILL_GRACE, &mut output).await.is_err() {
                    signal_group(pgid, GroupSignal::Kill);
                }
                return Err(InspectorError::Timeout {
                    command,
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(InspectorError::NonZeroExit {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

/// Signal every process in the group led by `pgid`
#[cfg(unix)]
fn signal_group(pgid: Option<u32>, signal: GroupSignal) {
    let Some(pgid) = pgid else {
        return;
    };
    let signo = match signal {
        GroupSignal::Terminate => libc::SIGTERM,
        GroupSignal::Kill => libc::SIGKILL,
    };

    // SAFETY: kill has no memory preconditions; a negative pid addresses the process group
    let result = unsafe { libc::kill(-(pgid as libc::pid_t), signo) };
    if result != 0 {
        debug!(pgid = pgid, signal = ?signal, "Process group already exited");
    }
}

/// Without process groups only the direct child is killed, on drop
#[cfg(not(unix))]
fn signal_group(_pgid: Option<u32>, _signal: GroupSignal) {}

#[async_trait]
impl RuntimeInspector for DockerCliInspector {
    async fn list_containers(&self) -> InspectorResult<String> {
        self.run(&["ps", "-a", "--format", LIST_FORMAT]).await
    }

    async fn stats_for_running(&self) -> InspectorResult<String> {
        self.run(&["stats", "--no-stream", "--format", STATS_FORMAT])
            .await
    }
}
