//! Configuration for ngrokker
//!
//! A [`TunnelConfig`] can be kept in a TOML file; omitted keys take their
//! defaults. Files are validated on load and before they are written, so a
//! config that reaches [`crate::NgrokTunnel::with_config`] from disk is
//! already usable.

pub mod serde_utils;
mod tunnel;

pub use tunnel::{TunnelConfig, DEFAULT_STATUS_URL};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Per-user ngrokker directory (`<config_dir>/ngrokker`)
pub fn default_config_dir() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("ngrokker")
}

/// Where [`load_default_config`] looks for the tunnel configuration
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Read and validate a tunnel configuration file
pub fn load_config(path: &Path) -> Result<TunnelConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::Invalid(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };

    let config: TunnelConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration at [`default_config_path`], falling back to the
/// defaults when no file exists
pub fn load_default_config() -> Result<TunnelConfig, ConfigError> {
    match load_config(&default_config_path()) {
        Err(ConfigError::NotFound(_)) => Ok(TunnelConfig::default()),
        other => other,
    }
}

/// Validate `config` and write it to `path`, creating parent directories
pub fn save_config(path: &Path, config: &TunnelConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::Invalid(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("ngrokker/config.toml"));
    }

    #[test]
    fn test_load_missing_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(matches!(load_config(&path), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = TunnelConfig {
            binary: "/opt/ngrok/bin/ngrok".to_string(),
            settle_delay: Duration::from_millis(250),
            ..TunnelConfig::default()
        };
        save_config(&path, &config).unwrap();

        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "settle_delay = 0\nshutdown_retries = 3\n").unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.settle_delay, Duration::ZERO);
        assert_eq!(loaded.shutdown_retries, 3);
        assert_eq!(loaded.binary, "ngrok");
        assert_eq!(loaded.startup_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_malformed_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "settle_delay = \"soon\"").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval = 0\n").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let config = TunnelConfig {
            startup_timeout: Duration::ZERO,
            ..TunnelConfig::default()
        };

        assert!(matches!(
            save_config(&path, &config),
            Err(ConfigError::Invalid(_))
        ));
        assert!(!path.exists());
    }
}
