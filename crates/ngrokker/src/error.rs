//! Error types for ngrokker

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Result alias for tunnel operations
pub type Result<T> = std::result::Result<T, TunnelError>;

/// Errors returned by tunnel operations
#[derive(Error, Debug)]
pub enum TunnelError {
    /// The ngrok terms of service were not accepted
    #[error("Users have not accepted the ngrok terms of service (https://ngrok.com/tos)")]
    NotAccepted,

    /// Another tunnel in this process is already online
    #[error("Another ngrok tunnel is already online in this process")]
    ExistingTunnel,

    /// This tunnel was opened and not yet closed
    #[error("Tunnel already opened")]
    AlreadyOpened,

    /// Port outside the accepted range
    #[error("Invalid local port: {0}")]
    InvalidPort(u16),

    /// Executable not found on the search path
    #[error("Executable '{binary}' not found on PATH: {source}")]
    NotFound {
        binary: String,
        #[source]
        source: which::Error,
    },

    /// Process could not be launched
    #[error("Failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while supervising the process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be set up
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// ngrok refused to start because another session is running
    #[error("ngrok cannot be started because there are too many simultaneous connections")]
    TooManyConnections,

    /// ngrok wrote diagnostic output that matched no known failure
    #[error("ngrok produced unexpected output: {0}")]
    UnexpectedOutput(String),

    /// The status API reported an ambiguous set of tunnels
    #[error("More than one ngrok tunnel detected ({count} tunnels reported)")]
    MultipleTunnels { count: usize },

    /// Nothing settled before the startup timeout elapsed
    #[error("ngrok startup timed out after {0:?}")]
    StartupTimeout(Duration),

    /// Process exited with a failure status
    #[error("ngrok exited unexpectedly: {0}")]
    ProcessExited(ExitStatus),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(TunnelError::AlreadyOpened.to_string(), "Tunnel already opened");
        assert_eq!(
            TunnelError::MultipleTunnels { count: 3 }.to_string(),
            "More than one ngrok tunnel detected (3 tunnels reported)"
        );
        assert!(TunnelError::UnexpectedOutput("boom".into())
            .to_string()
            .ends_with("boom"));
    }

    #[test]
    fn test_io_conversion() {
        let err: TunnelError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, TunnelError::Io(_)));
    }
}
