//! Configuration management
//!
//! Handles loading and validation of the daemon configuration from a TOML
//! file. Every section and key is optional and falls back to the defaults of
//! a stock ThinkPad.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod types;

pub use types::{AcpiConfig, DisplayConfig, DockConfig, HardwareConfig, LoggingConfig};

use crate::acpi::AcpiSourceConfig;
use crate::hardware::{Backlight, Dock, ThinkLight};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// ACPI event source configuration
    #[serde(default)]
    pub acpi: AcpiConfig,
    /// Dock detection configuration
    #[serde(default)]
    pub dock: DockConfig,
    /// Display server configuration
    #[serde(default)]
    pub display: DisplayConfig,
    /// ThinkLight and backlight paths
    #[serde(default)]
    pub hardware: HardwareConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.acpi.socket_path.is_absolute() {
            anyhow::bail!(
                "acpid socket path must be absolute: {}",
                self.acpi.socket_path.display()
            );
        }

        if self.acpi.line_buffer_size == 0 {
            anyhow::bail!("line_buffer_size must be greater than zero");
        }
        if self.acpi.dispatch_workers == 0 {
            anyhow::bail!("dispatch_workers must be greater than zero");
        }
        if self.acpi.dispatch_queue_depth == 0 {
            anyhow::bail!("dispatch_queue_depth must be greater than zero");
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        Ok(())
    }

    /// Settings for the ACPI event source
    pub fn acpi_source(&self) -> AcpiSourceConfig {
        AcpiSourceConfig {
            socket_path: self.acpi.socket_path.clone(),
            line_buffer_size: self.acpi.line_buffer_size,
            dispatch_workers: self.acpi.dispatch_workers,
            dispatch_queue_depth: self.acpi.dispatch_queue_depth,
            enable_socket_listener: self.acpi.enable_socket_listener,
            enable_device_listener: self.acpi.enable_device_listener,
            dock_path: self.dock.sysfs_path.to_string_lossy().into_owned(),
            machinecheck_path: self.dock.machinecheck_path.clone(),
            settle_delay: Duration::from_millis(self.dock.settle_delay_ms),
        }
    }

    /// Dock probe for the configured device
    pub fn dock_probe(&self) -> Dock {
        Dock::new(&self.dock.sysfs_path, self.dock.expected_modalias.as_str())
    }

    /// ThinkLight at the configured path
    pub fn thinklight(&self) -> ThinkLight {
        ThinkLight::new(&self.hardware.thinklight_path)
    }

    /// Backlight over the configured directories
    pub fn backlight(&self) -> Backlight {
        Backlight::from_paths(&self.hardware.backlight_paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert_eq!(config.acpi.socket_path, Path::new("/var/run/acpid.socket"));
        assert_eq!(config.acpi.line_buffer_size, 128);
        assert_eq!(config.dock.expected_modalias, "acpi:IBM0079:PNP0C15:LNXDOCK:\n");
        assert_eq!(config.dock.settle_delay_ms, 1000);
        assert!(!config.display.dry_run);
        assert_eq!(config.hardware.backlight_paths.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [acpi]
            dispatch_workers = 2

            [display]
            display_name = ":1"
            "#,
        )
        .unwrap();
        assert_eq!(config.acpi.dispatch_workers, 2);
        assert_eq!(config.acpi.dispatch_queue_depth, 64);
        assert!(config.acpi.enable_device_listener);
        assert_eq!(config.display.display_name.as_deref(), Some(":1"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation_relative_socket() {
        let mut config = Config::default_config();
        config.acpi.socket_path = "acpid.socket".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_sizes() {
        let mut config = Config::default_config();
        config.acpi.dispatch_workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default_config();
        config.acpi.line_buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default_config();
        config.acpi.dispatch_queue_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_level() {
        let mut config = Config::default_config();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thinkpad.toml");
        std::fs::write(&path, "[dock]\nsettle_delay_ms = 250\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.acpi_source().settle_delay, Duration::from_millis(250));

        assert!(Config::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_acpi_source_mapping() {
        let mut config = Config::default_config();
        config.acpi.enable_socket_listener = false;
        let source = config.acpi_source();
        assert!(!source.enable_socket_listener);
        assert_eq!(source.dock_path, "/sys/devices/platform/dock.2");
        assert_eq!(source.line_buffer_size, 128);
    }
}
