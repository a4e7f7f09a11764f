//! Tunnel configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;
use crate::error::ConfigError;

/// Default local status API of the ngrok agent
pub const DEFAULT_STATUS_URL: &str = "http://127.0.0.1:4040/api/tunnels";

/// Configuration for an ngrok tunnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Executable name (looked up on PATH) or path to the ngrok binary
    pub binary: String,

    /// Local status API listing the established tunnels
    pub status_url: String,

    /// How long to wait for ngrok before giving up
    #[serde(with = "duration_millis")]
    pub startup_timeout: Duration,

    /// How long to wait before the first status poll.
    ///
    /// With an ngrok process running elsewhere, a short delay lets the
    /// status API of that other process be read as ours. Raising it narrows
    /// the window but does not close it.
    #[serde(with = "duration_millis")]
    pub settle_delay: Duration,

    /// Delay between unsuccessful status polls
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Per-request timeout for status polls
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,

    /// Delay between exit checks after a graceful termination request
    #[serde(with = "duration_millis")]
    pub shutdown_poll_interval: Duration,

    /// Exit checks before the process is killed
    pub shutdown_retries: u32,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            binary: "ngrok".to_string(),
            status_url: DEFAULT_STATUS_URL.to_string(),
            startup_timeout: Duration::from_secs(20),
            settle_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(2),
            shutdown_poll_interval: Duration::from_millis(200),
            shutdown_retries: 20,
        }
    }
}

impl TunnelConfig {
    /// Check that the configuration can drive a tunnel
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary.trim().is_empty() {
            return Err(ConfigError::Invalid("binary must not be empty".into()));
        }
        if self.status_url.trim().is_empty() {
            return Err(ConfigError::Invalid("status_url must not be empty".into()));
        }
        if self.startup_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "startup_timeout must be greater than zero".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Upper bound on the graceful part of a shutdown
    pub fn graceful_shutdown_window(&self) -> Duration {
        self.shutdown_poll_interval * self.shutdown_retries
    }
}
