//! tunneler: Provider-neutral interface for introspective tunnels
//!
//! A tunnel exposes a local port on one or more public URLs. This crate
//! holds the types shared between tunnel providers and their callers.

mod endpoint;
mod traits;

pub use endpoint::{Endpoint, SECURE_SCHEME};
pub use traits::Tunneler;
