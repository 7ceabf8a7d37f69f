//! Spawning the plugin executable and reaping it afterwards.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rise_plugin::Duplex;
use tracing::{debug, warn};

use super::{CONNECTION_TARGET, PluginConnection};
use crate::error::ClientError;

/// Channel over a child's standard output and input.
pub type PluginChannel = Duplex<ChildStdout, ChildStdin>;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a plugin process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited by itself.
    Exited(ExitStatus),
    /// The process outlived the grace period and was killed.
    Killed,
}

/// Running plugin process. Killed on drop if still alive.
#[derive(Debug)]
pub struct PluginProcess {
    child: Child,
    reaped: bool,
}

impl PluginProcess {
    /// Spawns `program` with piped standard input and output. Standard error
    /// is inherited so plugin diagnostics stay visible.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Spawn`] when the executable cannot be started.
    pub fn spawn<I, S>(
        program: &Path,
        args: I,
    ) -> Result<(Self, PluginConnection<PluginChannel>), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        debug!(
            target: CONNECTION_TARGET,
            program = %program.display(),
            "spawning plugin"
        );
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ClientError::Spawn {
                path: program.to_path_buf(),
                source: Arc::new(source),
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let mut process = Self {
            child,
            reaped: false,
        };
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            process.kill();
            return Err(ClientError::MissingPipe {
                stream: "standard input or output",
            });
        };
        Ok((process, PluginConnection::new(Duplex::new(stdout, stdin))))
    }

    /// Operating system process id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Waits up to `timeout` for the process to exit, then kills it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Wait`] when the process status cannot be read.
    pub fn wait(&mut self, timeout: Duration) -> Result<ExitOutcome, ClientError> {
        let start = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.reaped = true;
                    debug!(target: CONNECTION_TARGET, ?status, "plugin exited");
                    return Ok(ExitOutcome::Exited(status));
                }
                Ok(None) if start.elapsed() >= timeout => {
                    warn!(
                        target: CONNECTION_TARGET,
                        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        "plugin did not exit, killing it"
                    );
                    self.kill();
                    return Ok(ExitOutcome::Killed);
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    return Err(ClientError::Wait {
                        source: Arc::new(source),
                    });
                }
            }
        }
    }

    fn kill(&mut self) {
        if self.reaped {
            return;
        }
        drop(self.child.kill());
        drop(self.child.wait());
        self.reaped = true;
    }
}

impl Drop for PluginProcess {
    fn drop(&mut self) {
        self.kill();
    }
}
