//! ThinkPad sysfs probes
//!
//! Dock state, ThinkLight and panel backlight, read and written through the
//! kernel's sysfs attribute files.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod backlight;
pub mod dock;
pub mod thinklight;

pub use backlight::{Backlight, BacklightSystem};
pub use dock::{Dock, DockProbe, DOCK_SYSFS_PATH, IBM_DOCK_MODALIAS};
pub use thinklight::{ThinkLight, THINKLIGHT_PATH};

#[cfg(test)]
pub use dock::MockDockProbe;

/// Hardware error types
#[derive(Error, Debug)]
pub enum HardwareError {
    /// A sysfs attribute could not be read or written
    #[error("{}: {source}", path.display())]
    Sysfs {
        /// Attribute path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// A sysfs attribute held something unexpected
    #[error("{}: unexpected contents {contents:?}", path.display())]
    Parse {
        /// Attribute path
        path: PathBuf,
        /// What was read
        contents: String,
    },

    /// No backlight interface found
    #[error("No supported backlight interface found")]
    NoBacklight,
}

/// Result type for hardware operations
pub type Result<T> = std::result::Result<T, HardwareError>;

pub(crate) fn read_attribute(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| HardwareError::Sysfs {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_int_attribute(path: &Path) -> Result<i64> {
    let contents = read_attribute(path)?;
    match contents.trim().parse() {
        Ok(value) => Ok(value),
        Err(_) => Err(HardwareError::Parse {
            path: path.to_path_buf(),
            contents,
        }),
    }
}

pub(crate) fn write_attribute(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value).map_err(|source| HardwareError::Sysfs {
        path: path.to_path_buf(),
        source,
    })
}
