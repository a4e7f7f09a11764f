//! ngrok tunnel lifecycle
//!
//! `open` launches `ngrok http <port>` and races three sources to decide
//! the outcome: the status API reporting the session, the process failing,
//! and the startup timeout. Whichever settles first wins; the losing tasks
//! are left to finish on their own and their results are discarded.
//!
//! `close` releases the single-instance guard before stopping the process,
//! so a slow shutdown never blocks a tunnel opened elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};
use tunneler::{Endpoint, Tunneler};

use crate::classify::Classifier;
use crate::config::TunnelConfig;
use crate::discovery::{ConnectionInfo, DiscoveryPoller};
use crate::error::{ConfigError, Result, TunnelError};
use crate::guard::TunnelGuard;
use crate::process::{ProcessHandle, ShutdownPolicy};
use crate::watcher::ProcessWatcher;

/// Mutable state of one tunnel
#[derive(Debug, Default)]
struct TunnelState {
    /// True between a successful open and the matching close
    opened: bool,
    process: Option<ProcessHandle>,
    endpoints: Vec<Endpoint>,
}

/// Rolls back an open whose future is dropped before it settles
struct PendingOpen<'a> {
    state: &'a mut TunnelState,
    guard: &'a TunnelGuard,
    armed: bool,
}

impl Drop for PendingOpen<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("ngrok tunnel open cancelled, killing ngrok process");
            // Dropping the handle makes the reaper kill the process
            self.state.process.take();
            self.state.opened = false;
            self.guard.release();
        }
    }
}

/// An ngrok `http` tunnel
///
/// Only one tunnel per [`TunnelGuard`] can be open at a time; by default
/// all tunnels share [`TunnelGuard::global`]. Call [`NgrokTunnel::close`]
/// when done. Dropping an open tunnel kills the process as a last resort.
#[derive(Debug)]
pub struct NgrokTunnel {
    accepted_terms: bool,
    verbose: bool,
    config: TunnelConfig,
    classifier: Classifier,
    guard: TunnelGuard,
    state: Mutex<TunnelState>,
}

impl NgrokTunnel {
    /// Create a tunnel with the default configuration.
    ///
    /// `accepted_terms` acknowledges the ngrok terms of service
    /// (<https://ngrok.com/tos>); `open` refuses to run without it.
    /// `verbose` logs progress through `tracing`.
    pub fn new(accepted_terms: bool, verbose: bool) -> Self {
        Self::build(accepted_terms, verbose, TunnelConfig::default())
    }

    /// Create a tunnel with a custom configuration
    pub fn with_config(
        accepted_terms: bool,
        verbose: bool,
        config: TunnelConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(accepted_terms, verbose, config))
    }

    fn build(accepted_terms: bool, verbose: bool, config: TunnelConfig) -> Self {
        Self {
            accepted_terms,
            verbose,
            config,
            classifier: Classifier::default(),
            guard: TunnelGuard::global().clone(),
            state: Mutex::new(TunnelState::default()),
        }
    }

    /// Use `guard` instead of the process-wide guard
    pub fn with_guard(mut self, guard: TunnelGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Use `classifier` for ngrok's diagnostic output
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Tunnel configuration
    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    /// Guard this tunnel participates in
    pub fn guard(&self) -> &TunnelGuard {
        &self.guard
    }

    /// Whether the ngrok terms of service were accepted
    pub fn accepted_terms(&self) -> bool {
        self.accepted_terms
    }

    /// Whether progress is logged
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Whether the tunnel is open
    pub async fn is_opened(&self) -> bool {
        self.state.lock().await.opened
    }

    /// Whether the ngrok process of an open tunnel is still running
    pub async fn is_running(&self) -> bool {
        let state = self.state.lock().await;
        state.opened && state.process.as_ref().is_some_and(|p| !p.has_exited())
    }

    /// Endpoints of the open tunnel (empty when closed)
    pub async fn endpoints(&self) -> Vec<Endpoint> {
        self.state.lock().await.endpoints.clone()
    }

    /// The encrypted endpoint of the open tunnel
    pub async fn secure_endpoint(&self) -> Option<Endpoint> {
        self.state
            .lock()
            .await
            .endpoints
            .iter()
            .find(|e| e.secure)
            .cloned()
    }

    /// Start ngrok and wait for its public endpoints
    pub async fn open(&self, port: u16) -> Result<Vec<Endpoint>> {
        let mut state = self.state.lock().await;

        if !self.accepted_terms {
            return Err(TunnelError::NotAccepted);
        }
        if state.opened {
            return Err(TunnelError::AlreadyOpened);
        }
        if port == 0 {
            return Err(TunnelError::InvalidPort(port));
        }
        if !self.guard.try_acquire() {
            return Err(TunnelError::ExistingTunnel);
        }
        state.opened = true;

        let mut pending = PendingOpen {
            state: &mut *state,
            guard: &self.guard,
            armed: true,
        };
        let result = self.start(port, &mut *pending.state).await;

        match result {
            Ok(endpoints) => {
                pending.state.endpoints = endpoints.clone();
                pending.armed = false;
                Ok(endpoints)
            }
            Err(e) => {
                if self.verbose {
                    tracing::warn!("Failed to open ngrok tunnel: {}", e);
                }
                // close() cannot reach a tunnel that never opened, so stop the process here
                let process = pending.state.process.take();
                pending.state.opened = false;
                self.guard.release();
                pending.armed = false;

                if let Some(mut process) = process {
                    if let Err(err) = process.shutdown(self.shutdown_policy(), self.verbose).await {
                        tracing::warn!("Failed to stop ngrok after failed open: {}", err);
                    }
                }
                Err(e)
            }
        }
    }

    /// Stop ngrok. Closing a tunnel that is not open succeeds.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if !state.opened {
            if self.verbose {
                tracing::info!("Close called and tunnel not open, nothing to do");
            }
            return Ok(());
        }
        state.opened = false;
        state.endpoints.clear();
        self.guard.release();

        let Some(mut process) = state.process.take() else {
            return Ok(());
        };
        if process.has_exited() {
            if self.verbose {
                tracing::info!("ngrok already exited");
            }
            return Ok(());
        }
        process.shutdown(self.shutdown_policy(), self.verbose).await?;
        Ok(())
    }

    /// Locate and launch ngrok, then wait for the outcome
    async fn start(&self, port: u16, state: &mut TunnelState) -> Result<Vec<Endpoint>> {
        if self.verbose {
            tracing::info!("Searching for {} on PATH...", self.config.binary);
        }
        let binary = which::which(&self.config.binary).map_err(|source| TunnelError::NotFound {
            binary: self.config.binary.clone(),
            source,
        })?;
        if self.verbose {
            tracing::info!("ngrok found at {}", binary.display());
        }

        let poller = DiscoveryPoller::new(&self.config, self.verbose)?;

        let (process, stderr) =
            ProcessHandle::spawn(&binary, port).map_err(|source| TunnelError::Spawn {
                binary: binary.display().to_string(),
                source,
            })?;
        if self.verbose {
            tracing::info!("Started ngrok http {} (pid {:?})", port, process.pid());
        }
        let exit = process.exit_watch();
        state.process = Some(process);

        let (failure_tx, failure_rx) = oneshot::channel();
        let watcher = ProcessWatcher::new(self.classifier.clone(), self.verbose);
        tokio::spawn(watcher.run(stderr, exit, failure_tx));

        let (info_tx, info_rx) = oneshot::channel();
        tokio::spawn(poller.run(info_tx));

        settle(info_rx, failure_rx, self.config.startup_timeout).await
    }

    fn shutdown_policy(&self) -> ShutdownPolicy {
        ShutdownPolicy::from_config(&self.config)
    }
}

/// Wait for the first of discovery, process failure, or timeout.
///
/// A slot closed without a value disables its branch.
async fn settle(
    discovery: oneshot::Receiver<ConnectionInfo>,
    failure: oneshot::Receiver<TunnelError>,
    timeout: Duration,
) -> Result<Vec<Endpoint>> {
    tokio::select! {
        Ok(info) = discovery => info,
        Ok(err) = failure => Err(err),
        _ = tokio::time::sleep(timeout) => Err(TunnelError::StartupTimeout(timeout)),
    }
}

#[async_trait]
impl Tunneler for NgrokTunnel {
    type Error = TunnelError;

    async fn open(&self, port: u16) -> Result<Vec<Endpoint>> {
        NgrokTunnel::open(self, port).await
    }

    async fn close(&self) -> Result<()> {
        NgrokTunnel::close(self).await
    }
}

impl Drop for NgrokTunnel {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.opened {
            tracing::warn!("NgrokTunnel dropped while still open, killing ngrok process");
            // Dropping the handle makes the reaper kill the process
            state.process.take();
            state.opened = false;
            self.guard.release();
        }
    }
}
