//! Docking station detection

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{read_attribute, Result};

/// sysfs directory of the ThinkPad dock device
pub const DOCK_SYSFS_PATH: &str = "/sys/devices/platform/dock.2";

/// `modalias` contents identifying an IBM/Lenovo dock
pub const IBM_DOCK_MODALIAS: &str = "acpi:IBM0079:PNP0C15:LNXDOCK:\n";

/// Dock presence and state
#[cfg_attr(test, mockall::automock)]
pub trait DockProbe: Send + Sync {
    /// Whether a genuine ThinkPad dock device is present
    fn probe(&self) -> bool;

    /// Whether the machine currently sits in the dock
    fn is_docked(&self) -> bool;
}

/// sysfs-backed dock probe
#[derive(Debug, Clone)]
pub struct Dock {
    sysfs_path: PathBuf,
    expected_modalias: String,
}

impl Default for Dock {
    fn default() -> Self {
        Self::new(DOCK_SYSFS_PATH, IBM_DOCK_MODALIAS)
    }
}

impl Dock {
    /// Dock device at `sysfs_path` identified by `expected_modalias`
    pub fn new(sysfs_path: impl Into<PathBuf>, expected_modalias: impl Into<String>) -> Self {
        Self {
            sysfs_path: sysfs_path.into(),
            expected_modalias: expected_modalias.into(),
        }
    }

    /// sysfs directory of the dock device
    pub fn sysfs_path(&self) -> &Path {
        &self.sysfs_path
    }

    /// Raw `modalias` contents
    pub fn modalias(&self) -> Result<String> {
        read_attribute(&self.sysfs_path.join("modalias"))
    }

    /// Raw `docked` state: `true` when the first byte is `1`
    pub fn docked(&self) -> Result<bool> {
        let contents = read_attribute(&self.sysfs_path.join("docked"))?;
        Ok(contents.starts_with('1'))
    }
}

impl DockProbe for Dock {
    fn probe(&self) -> bool {
        match self.modalias() {
            Ok(modalias) if modalias == self.expected_modalias => true,
            Ok(modalias) => {
                debug!("Dock modalias {:?} does not match", modalias);
                false
            }
            Err(e) => {
                debug!("Dock not present: {}", e);
                false
            }
        }
    }

    fn is_docked(&self) -> bool {
        self.docked().unwrap_or_else(|e| {
            warn!("Cannot read dock state: {}", e);
            false
        })
    }
}
