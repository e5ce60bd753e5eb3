//! Connectivity probes.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether a data connection is currently usable.
///
/// Polled synchronously while selecting a provider, so implementations
/// must answer from cached state and never block.
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true if network-requiring providers may be used.
    fn is_available(&self) -> bool;
}

/// Probe that always reports a connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConnected;

impl ConnectivityProbe for AlwaysConnected {
    fn is_available(&self) -> bool {
        true
    }
}

/// Probe backed by a flag that the host application flips when the
/// platform reports connectivity changes.
#[derive(Debug)]
pub struct ManualConnectivity {
    online: AtomicBool,
}

impl ManualConnectivity {
    /// Create a probe with the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Update the reported state.
    pub fn set_available(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityProbe for ManualConnectivity {
    fn is_available(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_connected() {
        assert!(AlwaysConnected.is_available());
    }

    #[test]
    fn test_manual_connectivity_toggles() {
        let probe = ManualConnectivity::new(false);
        assert!(!probe.is_available());

        probe.set_available(true);
        assert!(probe.is_available());

        probe.set_available(false);
        assert!(!probe.is_available());
    }

    #[test]
    fn test_manual_connectivity_defaults_online() {
        assert!(ManualConnectivity::default().is_available());
    }
}
