//! Connection discovery
//!
//! Polls the ngrok agent's local status API until it reports the tunnels
//! of an established session.

use serde::Deserialize;
use std::time::Duration;
use tokio::sync::oneshot;
use tunneler::Endpoint;

use crate::config::TunnelConfig;
use crate::error::{Result, TunnelError};

/// Tunnels ngrok opens for one `http` session (one http, one https)
pub const EXPECTED_TUNNELS: usize = 2;

/// Result of connection discovery
pub type ConnectionInfo = Result<Vec<Endpoint>>;

/// Response from `GET /api/tunnels`
#[derive(Debug, Deserialize)]
struct TunnelsResponse {
    tunnels: Vec<TunnelEntry>,
}

#[derive(Debug, Deserialize)]
struct TunnelEntry {
    public_url: String,
    /// Absent protocol is treated as not secure
    #[serde(default)]
    proto: String,
}

/// What a single status poll found
#[derive(Debug)]
enum PollOutcome {
    /// Status API unreachable or malformed response
    Unavailable,
    /// Reachable, but no tunnel registered yet
    Pending,
    /// Session established
    Established(Vec<Endpoint>),
    /// Tunnel count cannot belong to a single session
    Ambiguous(usize),
}

/// Interpret a decoded status response
fn evaluate(response: TunnelsResponse) -> PollOutcome {
    match response.tunnels.len() {
        0 => PollOutcome::Pending,
        EXPECTED_TUNNELS => PollOutcome::Established(
            response
                .tunnels
                .into_iter()
                .map(|t| Endpoint::from_proto(t.public_url, &t.proto))
                .collect(),
        ),
        count => PollOutcome::Ambiguous(count),
    }
}

/// Polls the ngrok status API
#[derive(Debug, Clone)]
pub struct DiscoveryPoller {
    client: reqwest::Client,
    status_url: String,
    settle_delay: Duration,
    poll_interval: Duration,
    verbose: bool,
}

impl DiscoveryPoller {
    /// Create a poller from tunnel configuration
    pub fn new(config: &TunnelConfig, verbose: bool) -> Result<Self> {
        // The status API is local; proxy settings from the environment must not apply
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            status_url: config.status_url.clone(),
            settle_delay: config.settle_delay,
            poll_interval: config.poll_interval,
            verbose,
        })
    }

    /// Issue one status request
    async fn poll_once(&self) -> PollOutcome {
        if self.verbose {
            tracing::debug!("Querying {} for established tunnels", self.status_url);
        }

        let response = match self.client.get(&self.status_url).send().await {
            Ok(r) => r,
            Err(e) => {
                if self.verbose {
                    tracing::debug!("Status API not reachable: {}", e);
                }
                return PollOutcome::Unavailable;
            }
        };

        match response.json::<TunnelsResponse>().await {
            Ok(body) => evaluate(body),
            Err(e) => {
                if self.verbose {
                    tracing::debug!("Failed to decode status API response: {}", e);
                }
                PollOutcome::Unavailable
            }
        }
    }

    /// Poll until the session is established or found to be ambiguous.
    ///
    /// Retries without limit; callers bound the wait.
    pub async fn discover(&self) -> ConnectionInfo {
        tokio::time::sleep(self.settle_delay).await;

        loop {
            match self.poll_once().await {
                PollOutcome::Established(endpoints) => {
                    if self.verbose {
                        for endpoint in &endpoints {
                            tracing::info!("ngrok tunnel established at {}", endpoint);
                        }
                    }
                    return Ok(endpoints);
                }
                PollOutcome::Ambiguous(count) => {
                    return Err(TunnelError::MultipleTunnels { count });
                }
                PollOutcome::Pending => {
                    if self.verbose {
                        tracing::debug!("No tunnel registered yet");
                    }
                }
                PollOutcome::Unavailable => {}
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Run discovery and deliver the single result into `slot`.
    ///
    /// Stops early once the receiving side has gone away.
    pub async fn run(self, mut slot: oneshot::Sender<ConnectionInfo>) {
        let info = tokio::select! {
            info = self.discover() => info,
            _ = slot.closed() => {
                if self.verbose {
                    tracing::debug!("Discovery result no longer awaited, stopping");
                }
                return;
            }
        };
        // Receiver may have been dropped in the meantime; nothing to do then
        let _ = slot.send(info);
    }
}
