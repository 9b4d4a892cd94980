//! Panel backlight
//!
//! Reads from the first backlight interface present and writes to all of
//! them, so hybrid-graphics machines stay in sync.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{read_int_attribute, write_attribute, HardwareError, Result};

/// A sysfs backlight interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklightSystem {
    /// Short name, e.g. `intel`
    pub name: String,
    /// sysfs directory holding `brightness` and `max_brightness`
    pub path: PathBuf,
}

impl BacklightSystem {
    /// Interface `name` rooted at `path`
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    fn is_present(&self) -> bool {
        self.path.exists()
    }

    fn max_brightness(&self) -> Result<i64> {
        read_int_attribute(&self.path.join("max_brightness"))
    }

    fn brightness(&self) -> Result<i64> {
        read_int_attribute(&self.path.join("brightness"))
    }

    fn level(&self) -> Result<f32> {
        let max = self.max_brightness()?;
        if max <= 0 {
            return Err(HardwareError::Parse {
                path: self.path.join("max_brightness"),
                contents: max.to_string(),
            });
        }
        Ok(self.brightness()? as f32 / max as f32)
    }

    fn set_level(&self, factor: f32) -> Result<i64> {
        let value = (self.max_brightness()? as f32 * factor) as i64;
        write_attribute(&self.path.join("brightness"), &value.to_string())?;
        Ok(value)
    }
}

/// Panel backlight across the known interfaces
#[derive(Debug, Clone)]
pub struct Backlight {
    systems: Vec<BacklightSystem>,
}

impl Default for Backlight {
    fn default() -> Self {
        Self::new(vec![
            BacklightSystem::new("intel", "/sys/class/backlight/intel_backlight"),
            BacklightSystem::new("nvidia", "/sys/class/backlight/nv_backlight"),
        ])
    }
}

impl Backlight {
    /// Backlight over `systems`, in lookup order
    pub fn new(systems: Vec<BacklightSystem>) -> Self {
        Self { systems }
    }

    /// Backlight over sysfs directories, named after their last component
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Self {
        Self::new(
            paths
                .iter()
                .map(|p| {
                    let p = p.as_ref();
                    let name = p
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| p.display().to_string());
                    BacklightSystem::new(name, p)
                })
                .collect(),
        )
    }

    /// Interfaces present on this machine
    pub fn available(&self) -> Vec<&BacklightSystem> {
        self.systems.iter().filter(|s| s.is_present()).collect()
    }

    /// Current level as a fraction of the maximum, from the first interface present
    pub fn level(&self) -> Result<f32> {
        let system = self
            .systems
            .iter()
            .find(|s| s.is_present())
            .ok_or(HardwareError::NoBacklight)?;
        system.level()
    }

    /// Set every present interface to `factor` of its maximum
    ///
    /// `factor` is clamped to `0.0..=1.0`. Fails only if no interface
    /// accepted the new level.
    pub fn set_level(&self, factor: f32) -> Result<()> {
        let factor = factor.clamp(0.0, 1.0);
        let mut last_error = HardwareError::NoBacklight;
        let mut applied = false;

        for system in self.systems.iter().filter(|s| s.is_present()) {
            match system.set_level(factor) {
                Ok(value) => {
                    debug!("{} backlight set to {}", system.name, value);
                    applied = true;
                }
                Err(e) => {
                    warn!("Failed to set {} backlight: {}", system.name, e);
                    last_error = e;
                }
            }
        }

        if applied {
            Ok(())
        } else {
            Err(last_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_backlight(root: &Path, name: &str, max: i64, current: i64) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("max_brightness"), format!("{max}\n")).unwrap();
        fs::write(dir.join("brightness"), format!("{current}\n")).unwrap();
        dir
    }

    fn brightness(dir: &Path) -> i64 {
        fs::read_to_string(dir.join("brightness"))
            .unwrap()
            .trim()
            .parse()
            .unwrap()
    }

    #[test]
    fn test_level_from_first_present() {
        let root = tempfile::tempdir().unwrap();
        let nvidia = fake_backlight(root.path(), "nv_backlight", 100, 25);
        let backlight = Backlight::from_paths(&[root.path().join("intel_backlight"), nvidia]);
        assert!((backlight.level().unwrap() - 0.25).abs() < f32::EPSILON);
        assert_eq!(backlight.available().len(), 1);
    }

    #[test]
    fn test_set_level_writes_all() {
        let root = tempfile::tempdir().unwrap();
        let intel = fake_backlight(root.path(), "intel_backlight", 1000, 10);
        let nvidia = fake_backlight(root.path(), "nv_backlight", 100, 10);
        let backlight = Backlight::from_paths(&[&intel, &nvidia]);

        backlight.set_level(0.5).unwrap();
        assert_eq!(brightness(&intel), 500);
        assert_eq!(brightness(&nvidia), 50);
    }

    #[test]
    fn test_set_level_clamps() {
        let root = tempfile::tempdir().unwrap();
        let intel = fake_backlight(root.path(), "intel_backlight", 1000, 10);
        let backlight = Backlight::from_paths(&[&intel]);

        backlight.set_level(3.0).unwrap();
        assert_eq!(brightness(&intel), 1000);
        backlight.set_level(-1.0).unwrap();
        assert_eq!(brightness(&intel), 0);
    }

    #[test]
    fn test_no_backlight() {
        let root = tempfile::tempdir().unwrap();
        let backlight = Backlight::from_paths(&[root.path().join("missing")]);
        assert!(matches!(backlight.level(), Err(HardwareError::NoBacklight)));
        assert!(matches!(
            backlight.set_level(0.5),
            Err(HardwareError::NoBacklight)
        ));
    }
}
