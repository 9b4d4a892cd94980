//! systemd-logind suspend backend

use tracing::{debug, info};
use zbus::blocking::Connection;
use zbus::proxy;

use super::{PowerError, Result, SuspendBackend};

/// systemd-logind Manager interface
#[proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LoginManager {
    /// Suspend the system
    #[zbus(name = "Suspend")]
    fn suspend(&self, interactive: bool) -> zbus::Result<()>;

    /// Whether the caller may suspend (`yes`, `no`, `challenge`, `na`)
    #[zbus(name = "CanSuspend")]
    fn can_suspend(&self) -> zbus::Result<String>;
}

/// Suspends through logind on the system bus
///
/// A fresh connection is opened for every request; suspends are rare and
/// the daemon may outlive a bus restart.
#[derive(Debug, Default)]
pub struct LogindSuspend;

impl LogindSuspend {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }

    fn manager(connection: &Connection) -> Result<LoginManagerProxyBlocking<'_>> {
        LoginManagerProxyBlocking::new(connection).map_err(PowerError::Bus)
    }

    /// logind's answer to `CanSuspend`
    pub fn can_suspend(&self) -> Result<String> {
        let connection = Connection::system().map_err(PowerError::Bus)?;
        let answer = Self::manager(&connection)?
            .can_suspend()
            .map_err(PowerError::Bus)?;
        debug!("logind CanSuspend: {}", answer);
        Ok(answer)
    }
}

impl SuspendBackend for LogindSuspend {
    fn suspend(&self) -> Result<()> {
        let connection = Connection::system().map_err(PowerError::Bus)?;
        info!("Requesting suspend from logind");
        let reply = Self::manager(&connection)?
            .suspend(true)
            .map_err(|e| PowerError::Rejected(e.to_string()));
        reply
    }
}
