//! ngrokker: Programmatic ngrok introspective tunnels
//!
//! Launches the `ngrok` agent for a local port, discovers the public
//! endpoints it establishes through its local status API, and shuts it
//! down again.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ngrokker::NgrokTunnel;
//!
//! # async fn example() -> ngrokker::Result<()> {
//! let tunnel = NgrokTunnel::new(true, false);
//! let endpoints = tunnel.open(8080).await?;
//! for endpoint in &endpoints {
//!     println!("{} (secure: {})", endpoint.url, endpoint.secure);
//! }
//! tunnel.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod discovery;
pub mod error;
pub mod guard;
pub mod process;
pub mod tunnel;
pub mod watcher;

pub use classify::Classifier;
pub use config::TunnelConfig;
pub use error::{ConfigError, Result, TunnelError};
pub use guard::TunnelGuard;
pub use tunnel::NgrokTunnel;
pub use tunneler::{Endpoint, Tunneler};
