//! ThinkLight keyboard lamp

use std::path::{Path, PathBuf};

use super::{read_attribute, HardwareError, Result};

/// LED brightness attribute of the ThinkLight
pub const THINKLIGHT_PATH: &str = "/sys/class/leds/tpacpi::thinklight/brightness";

/// ThinkLight state reader
#[derive(Debug, Clone)]
pub struct ThinkLight {
    path: PathBuf,
}

impl Default for ThinkLight {
    fn default() -> Self {
        Self::new(THINKLIGHT_PATH)
    }
}

impl ThinkLight {
    /// ThinkLight whose brightness attribute lives at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Brightness attribute path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the machine has a ThinkLight
    pub fn probe(&self) -> bool {
        self.path.exists()
    }

    /// Whether the lamp is lit
    pub fn is_on(&self) -> Result<bool> {
        let contents = read_attribute(&self.path)?;
        match contents.trim().chars().next() {
            Some('0') => Ok(false),
            Some(_) => Ok(true),
            None => Err(HardwareError::Parse {
                path: self.path.clone(),
                contents,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_states() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brightness");
        let light = ThinkLight::new(&path);
        assert!(!light.probe());
        assert!(light.is_on().is_err());

        fs::write(&path, "0\n").unwrap();
        assert!(light.probe());
        assert!(!light.is_on().unwrap());

        fs::write(&path, "255\n").unwrap();
        assert!(light.is_on().unwrap());
    }

    #[test]
    fn test_empty_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brightness");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            ThinkLight::new(&path).is_on(),
            Err(HardwareError::Parse { .. })
        ));
    }
}
