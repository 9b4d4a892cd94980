//! Power state requests
//!
//! Decides whether a lid close or sleep button press should suspend the
//! machine and forwards the request to the session manager.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::hardware::DockProbe;

pub mod logind;

pub use logind::LogindSuspend;

/// Power error types
#[derive(Error, Debug)]
pub enum PowerError {
    /// System bus unreachable
    #[error("D-Bus error: {0}")]
    Bus(#[source] zbus::Error),

    /// The suspend call itself failed
    #[error("Suspend request rejected: {0}")]
    Rejected(String),
}

/// Result type for power operations
pub type Result<T> = std::result::Result<T, PowerError>;

/// What asked for the suspend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// Lid closed
    Lid,
    /// Sleep button pressed
    Button,
}

impl std::fmt::Display for SuspendReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lid => write!(f, "lid"),
            Self::Button => write!(f, "button"),
        }
    }
}

/// Something that can put the machine to sleep
#[cfg_attr(test, mockall::automock)]
pub trait SuspendBackend: Send + Sync {
    /// Suspend now
    fn suspend(&self) -> Result<()>;
}

/// Suspend policy
pub struct PowerStateManager {
    dock: Arc<dyn DockProbe>,
    backend: Box<dyn SuspendBackend>,
}

impl PowerStateManager {
    /// Create a manager using `dock` for the lid policy and `backend` to suspend
    pub fn new(dock: Arc<dyn DockProbe>, backend: Box<dyn SuspendBackend>) -> Self {
        Self { dock, backend }
    }

    /// Manager that suspends through logind
    pub fn with_logind(dock: Arc<dyn DockProbe>) -> Self {
        Self::new(dock, Box::new(LogindSuspend::new()))
    }

    /// Request a suspend
    ///
    /// A button press always suspends. A lid close suspends only when the
    /// dock device is known and the machine is not docked.
    ///
    /// # Returns
    ///
    /// `true` if the suspend request was issued and accepted
    pub fn request_suspend(&self, reason: SuspendReason) -> bool {
        if reason == SuspendReason::Lid {
            if !self.dock.probe() {
                warn!("Dock device unavailable, ignoring lid event");
                return false;
            }
            if self.dock.is_docked() {
                warn!("Ignoring lid event when docked");
                return false;
            }
        }

        info!("Suspending ({})", reason);
        match self.backend.suspend() {
            Ok(()) => true,
            Err(e) => {
                warn!("Suspend failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockDockProbe;

    fn dock(sane: bool, docked: bool) -> Arc<MockDockProbe> {
        let mut dock = MockDockProbe::new();
        dock.expect_probe().return_const(sane);
        dock.expect_is_docked().return_const(docked);
        Arc::new(dock)
    }

    fn backend(times: usize) -> Box<MockSuspendBackend> {
        let mut backend = MockSuspendBackend::new();
        backend.expect_suspend().times(times).returning(|| Ok(()));
        Box::new(backend)
    }

    #[test]
    fn test_button_always_suspends() {
        let manager = PowerStateManager::new(dock(false, true), backend(1));
        assert!(manager.request_suspend(SuspendReason::Button));
    }

    #[test]
    fn test_lid_suspends_when_undocked() {
        let manager = PowerStateManager::new(dock(true, false), backend(1));
        assert!(manager.request_suspend(SuspendReason::Lid));
    }

    #[test]
    fn test_lid_ignored_when_docked() {
        let manager = PowerStateManager::new(dock(true, true), backend(0));
        assert!(!manager.request_suspend(SuspendReason::Lid));
    }

    #[test]
    fn test_lid_ignored_without_dock_device() {
        let manager = PowerStateManager::new(dock(false, false), backend(0));
        assert!(!manager.request_suspend(SuspendReason::Lid));
    }

    #[test]
    fn test_backend_failure() {
        let mut backend = MockSuspendBackend::new();
        backend
            .expect_suspend()
            .returning(|| Err(PowerError::Rejected("denied".into())));
        let manager = PowerStateManager::new(dock(true, false), Box::new(backend));
        assert!(!manager.request_suspend(SuspendReason::Button));
    }
}
