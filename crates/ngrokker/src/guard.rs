//! Single-instance guard
//!
//! The free ngrok plan allows one agent session at a time, so a second
//! tunnel in the same process is refused locally instead of being rejected
//! by ngrok after launch. The guard is an in-process flag only; it knows
//! nothing about ngrok processes started elsewhere.

use std::sync::{Arc, Mutex, OnceLock};

/// Shared "a tunnel is open" flag
///
/// Clones share the same state. Tunnels use [`TunnelGuard::global`] unless
/// given their own guard, which keeps tests independent of each other.
#[derive(Debug, Clone, Default)]
pub struct TunnelGuard {
    existing_tunnel: Arc<Mutex<bool>>,
}

impl TunnelGuard {
    /// Create a new, released guard
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide guard
    pub fn global() -> &'static TunnelGuard {
        static GLOBAL: OnceLock<TunnelGuard> = OnceLock::new();
        GLOBAL.get_or_init(TunnelGuard::new)
    }

    /// Atomically check and set the flag.
    ///
    /// Returns `false` if the guard was already held.
    pub fn try_acquire(&self) -> bool {
        let mut held = self.lock();
        if *held {
            return false;
        }
        *held = true;
        true
    }

    /// Clear the flag
    pub fn release(&self) {
        *self.lock() = false;
    }

    /// Whether a tunnel currently holds the guard
    pub fn is_held(&self) -> bool {
        *self.lock()
    }

    /// Whether two handles share the same state
    pub fn same_as(&self, other: &TunnelGuard) -> bool {
        Arc::ptr_eq(&self.existing_tunnel, &other.existing_tunnel)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, bool> {
        // A bool cannot be left half-written, so a poisoned lock is still usable
        self.existing_tunnel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
