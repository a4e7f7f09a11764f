//! ngrok process supervision
//!
//! A reaper task exclusively owns the [`Child`]. It publishes the exit
//! status on a watch channel and accepts a single forced-kill request, so
//! no two tasks ever mutate the child at once.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{oneshot, watch};

use crate::config::TunnelConfig;

/// Reply slot for a forced-kill request
type KillReply = oneshot::Sender<io::Result<()>>;

/// Observes the exit of a supervised process
#[derive(Debug, Clone)]
pub struct ExitWatch {
    rx: watch::Receiver<Option<ExitStatus>>,
}

impl ExitWatch {
    /// Whether the process is gone.
    ///
    /// A reaper that ended without a status (wait failed) counts as exited.
    pub fn has_exited(&self) -> bool {
        self.rx.borrow().is_some() || self.rx.has_changed().is_err()
    }

    /// Exit status, if the process has exited
    pub fn status(&self) -> Option<ExitStatus> {
        *self.rx.borrow()
    }

    /// Wait for the process to exit.
    ///
    /// Returns `None` if the status could not be collected.
    pub async fn wait(&mut self) -> Option<ExitStatus> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(status) => *status,
            Err(_) => None,
        }
    }
}

/// Timings of the escalating shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownPolicy {
    /// Delay between exit checks
    pub poll_interval: Duration,
    /// Exit checks before the process is killed
    pub retries: u32,
}

impl ShutdownPolicy {
    /// Build the policy from tunnel configuration
    pub fn from_config(config: &TunnelConfig) -> Self {
        Self {
            poll_interval: config.shutdown_poll_interval,
            retries: config.shutdown_retries,
        }
    }
}

/// Shutdown state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownState {
    /// Graceful termination not yet requested
    Running,
    /// Termination requested, `attempt` exit checks done
    Polling { attempt: u32 },
    /// Graceful shutdown unavailable or exhausted
    Forced,
}

/// Handle to a running ngrok process
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    exit: ExitWatch,
    kill_tx: Option<oneshot::Sender<KillReply>>,
}

impl ProcessHandle {
    /// Launch `binary http <port>` with stderr captured.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(binary: &Path, port: u16) -> io::Result<(Self, ChildStderr)> {
        let mut child = Command::new(binary)
            .arg("http")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stderr not captured"))?;
        let pid = child.id();

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(reap(child, kill_rx, exit_tx));

        Ok((
            Self {
                pid,
                exit: ExitWatch { rx: exit_rx },
                kill_tx: Some(kill_tx),
            },
            stderr,
        ))
    }

    /// OS process id
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Watch for the exit of this process
    pub fn exit_watch(&self) -> ExitWatch {
        self.exit.clone()
    }

    /// Whether the process is gone
    pub fn has_exited(&self) -> bool {
        self.exit.has_exited()
    }

    /// Exit status, if the process has exited
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit.status()
    }

    /// Ask the process to terminate gracefully.
    ///
    /// Returns `false` when graceful termination is unavailable on this
    /// platform.
    #[cfg(unix)]
    fn request_termination(&self) -> io::Result<bool> {
        let Some(pid) = self.pid else {
            return Ok(false);
        };
        let pid = libc::pid_t::try_from(pid)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: kill(2) has no memory-safety preconditions
        let result = unsafe { libc::kill(pid, libc::SIGTERM) };
        if result == 0 {
            Ok(true)
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn request_termination(&self) -> io::Result<bool> {
        Ok(false)
    }

    /// Kill the process and wait for it to be reaped.
    ///
    /// Only the first call reaches the process; later calls succeed.
    pub async fn kill(&mut self) -> io::Result<()> {
        let Some(kill_tx) = self.kill_tx.take() else {
            return Ok(());
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if kill_tx.send(reply_tx).is_err() {
            // Reaper finished: the process has already been collected
            return Ok(());
        }
        reply_rx.await.unwrap_or(Ok(()))
    }

    /// Stop the process: request termination, poll for exit, then kill.
    pub async fn shutdown(&mut self, policy: ShutdownPolicy, verbose: bool) -> io::Result<()> {
        let mut state = ShutdownState::Running;

        loop {
            if self.has_exited() {
                if verbose {
                    tracing::info!("ngrok shutdown successful");
                }
                return Ok(());
            }

            state = match state {
                ShutdownState::Running => {
                    if verbose {
                        tracing::info!("Sending termination signal to ngrok (pid {:?})", self.pid);
                    }
                    match self.request_termination() {
                        Ok(true) => ShutdownState::Polling { attempt: 0 },
                        Ok(false) => ShutdownState::Forced,
                        Err(e) => {
                            tracing::warn!("Failed to signal ngrok process: {}", e);
                            ShutdownState::Forced
                        }
                    }
                }
                ShutdownState::Polling { attempt } if attempt >= policy.retries => {
                    ShutdownState::Forced
                }
                ShutdownState::Polling { attempt } => {
                    if verbose {
                        tracing::debug!("Waiting for ngrok process to shut down ({})", attempt + 1);
                    }
                    tokio::time::sleep(policy.poll_interval).await;
                    ShutdownState::Polling {
                        attempt: attempt + 1,
                    }
                }
                ShutdownState::Forced => {
                    if verbose {
                        tracing::info!("ngrok did not shut down gracefully, killing process");
                    }
                    return self.kill().await;
                }
            };
        }
    }
}

/// Own the child until it exits or a kill is requested.
///
/// A dropped kill sender counts as a kill request, so a forgotten handle
/// does not leave the process running.
async fn reap(
    mut child: Child,
    mut kill_rx: oneshot::Receiver<KillReply>,
    exit_tx: watch::Sender<Option<ExitStatus>>,
) {
    let (status, reply) = tokio::select! {
        status = child.wait() => (status, None),
        request = &mut kill_rx => {
            let result = child.kill().await;
            (child.wait().await, request.ok().map(|reply| (reply, result)))
        }
    };

    // Publish before replying so a returned kill() implies has_exited()
    match status {
        Ok(status) => {
            exit_tx.send_replace(Some(status));
        }
        Err(e) => tracing::warn!("Failed to collect ngrok exit status: {}", e),
    }
    drop(exit_tx);

    if let Some((reply, result)) = reply {
        let _ = reply.send(result);
    }
}
