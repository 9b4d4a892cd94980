//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::acpi::listener::{ACPID_SOCKET_PATH, DEFAULT_LINE_BUFFER_SIZE, MACHINECHECK_PATH};
use crate::hardware::{DOCK_SYSFS_PATH, IBM_DOCK_MODALIAS, THINKLIGHT_PATH};

/// ACPI event source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcpiConfig {
    /// acpid socket path
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Longest acpid line accepted; longer lines are discarded
    #[serde(default = "default_line_buffer_size")]
    pub line_buffer_size: usize,

    /// Handler worker threads
    #[serde(default = "default_dispatch_workers")]
    pub dispatch_workers: usize,

    /// Handler jobs that may queue before new ones are dropped
    #[serde(default = "default_dispatch_queue_depth")]
    pub dispatch_queue_depth: usize,

    /// Listen on the acpid socket
    #[serde(default = "default_true")]
    pub enable_socket_listener: bool,

    /// Listen for udev dock and power-state notifications
    #[serde(default = "default_true")]
    pub enable_device_listener: bool,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(ACPID_SOCKET_PATH)
}

fn default_line_buffer_size() -> usize {
    DEFAULT_LINE_BUFFER_SIZE
}

fn default_dispatch_workers() -> usize {
    4
}

fn default_dispatch_queue_depth() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for AcpiConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            line_buffer_size: default_line_buffer_size(),
            dispatch_workers: default_dispatch_workers(),
            dispatch_queue_depth: default_dispatch_queue_depth(),
            enable_socket_listener: true,
            enable_device_listener: true,
        }
    }
}

/// Dock detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockConfig {
    /// sysfs directory of the dock device
    #[serde(default = "default_dock_path")]
    pub sysfs_path: PathBuf,

    /// `modalias` contents of a genuine dock, including the trailing newline
    #[serde(default = "default_modalias")]
    pub expected_modalias: String,

    /// Wait before reading the dock state after a notification (ms)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// sysfs path prefix of machine-check devices, used for suspend/resume detection
    #[serde(default = "default_machinecheck_path")]
    pub machinecheck_path: String,
}

fn default_dock_path() -> PathBuf {
    PathBuf::from(DOCK_SYSFS_PATH)
}

fn default_modalias() -> String {
    IBM_DOCK_MODALIAS.to_string()
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_machinecheck_path() -> String {
    MACHINECHECK_PATH.to_string()
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            sysfs_path: default_dock_path(),
            expected_modalias: default_modalias(),
            settle_delay_ms: default_settle_delay_ms(),
            machinecheck_path: default_machinecheck_path(),
        }
    }
}

/// Display server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// X11 display name (None = `$DISPLAY`)
    #[serde(default)]
    pub display_name: Option<String>,

    /// Record configuration requests instead of sending them
    #[serde(default)]
    pub dry_run: bool,
}

/// sysfs paths of the ThinkLight and backlight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// ThinkLight brightness attribute
    #[serde(default = "default_thinklight_path")]
    pub thinklight_path: PathBuf,

    /// Backlight directories, read in order and all written
    #[serde(default = "default_backlight_paths")]
    pub backlight_paths: Vec<PathBuf>,
}

fn default_thinklight_path() -> PathBuf {
    PathBuf::from(THINKLIGHT_PATH)
}

fn default_backlight_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/sys/class/backlight/intel_backlight"),
        PathBuf::from("/sys/class/backlight/nv_backlight"),
    ]
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            thinklight_path: default_thinklight_path(),
            backlight_paths: default_backlight_paths(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for log files (None = console only)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_dir: None,
        }
    }
}
