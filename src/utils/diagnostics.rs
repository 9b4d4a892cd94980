//! System Diagnostics
//!
//! Startup diagnostics for debugging: host information and the presence of
//! the services and device nodes the daemon depends on.

use std::path::{Path, PathBuf};

use sysinfo::System;
use tracing::{info, warn};

use crate::acpi::listener::ACPID_SOCKET_PATH;
use crate::hardware::{DOCK_SYSFS_PATH, THINKLIGHT_PATH};

/// System information for diagnostics
#[derive(Debug, Clone)]
pub struct SystemInfo {
    /// Operating system name (e.g., "Linux", "Ubuntu")
    pub os_name: String,
    /// Operating system version string
    pub os_version: String,

    /// Kernel version string
    pub kernel_version: String,

    /// Number of logical CPU cores
    pub cpu_count: usize,

    /// Total system memory in megabytes
    pub total_memory_mb: u64,

    /// System hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Gather system information
    pub fn gather() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version().unwrap_or_else(|| "Unknown".to_string()),
            cpu_count: sys.cpus().len(),
            total_memory_mb: sys.total_memory() / 1024 / 1024,
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    /// Log system information
    pub fn log(&self) {
        info!("=== System Information ===");
        info!("  OS: {} {}", self.os_name, self.os_version);
        info!("  Kernel: {}", self.kernel_version);
        info!("  Hostname: {}", self.hostname);
        info!("  CPUs: {}", self.cpu_count);
        info!("  Memory: {} MB", self.total_memory_mb);
    }
}

/// Presence of the daemon's external dependencies
#[derive(Debug, Clone)]
pub struct EnvironmentReport {
    /// X11 display from the environment
    pub display: Option<String>,
    /// acpid socket path checked
    pub acpid_socket: PathBuf,
    /// Whether the acpid socket exists
    pub acpid_present: bool,
    /// Whether the dock device node exists
    pub dock_present: bool,
    /// Whether the ThinkLight attribute exists
    pub thinklight_present: bool,
}

impl EnvironmentReport {
    /// Check the default locations
    pub fn gather() -> Self {
        Self::gather_at(Path::new(ACPID_SOCKET_PATH), Path::new(DOCK_SYSFS_PATH))
    }

    /// Check an explicit acpid socket and dock node
    pub fn gather_at(acpid_socket: &Path, dock_path: &Path) -> Self {
        Self {
            display: detect_display(),
            acpid_socket: acpid_socket.to_path_buf(),
            acpid_present: acpid_socket.exists(),
            dock_present: dock_path.exists(),
            thinklight_present: Path::new(THINKLIGHT_PATH).exists(),
        }
    }

    /// Log the report, warning about anything missing
    pub fn log(&self) {
        info!("=== Environment ===");
        match &self.display {
            Some(name) => info!("  X11 display: {}", name),
            None => warn!("  X11 display: not set (DISPLAY is empty)"),
        }

        if self.acpid_present {
            info!("  acpid socket: {}", self.acpid_socket.display());
        } else {
            warn!(
                "  acpid socket: {} missing, is acpid running?",
                self.acpid_socket.display()
            );
        }

        info!(
            "  Dock device: {}",
            if self.dock_present { "present" } else { "not found" }
        );
        info!(
            "  ThinkLight: {}",
            if self.thinklight_present { "present" } else { "not found" }
        );
    }
}

/// X11 display named by `$DISPLAY`
pub fn detect_display() -> Option<String> {
    std::env::var("DISPLAY").ok().filter(|d| !d.is_empty())
}

/// Log complete diagnostics on startup
pub fn log_startup_diagnostics() {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║          Startup Diagnostics                              ║");
    info!("╚════════════════════════════════════════════════════════════╝");

    SystemInfo::gather().log();
    EnvironmentReport::gather().log();

    info!("=== Build ===");
    info!("  Version: {}", env!("CARGO_PKG_VERSION"));
    #[cfg(debug_assertions)]
    info!("  Build: debug");
    #[cfg(not(debug_assertions))]
    info!("  Build: release");

    info!("╚════════════════════════════════════════════════════════════╝");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_info_gather() {
        let info = SystemInfo::gather();
        assert!(!info.os_name.is_empty());
        assert!(info.cpu_count > 0);
    }

    #[test]
    fn test_environment_report_paths() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("acpid.socket");
        std::fs::write(&socket, "").unwrap();

        let report = EnvironmentReport::gather_at(&socket, &dir.path().join("dock.2"));
        assert!(report.acpid_present);
        assert!(!report.dock_present);
        assert_eq!(report.acpid_socket, socket);
    }

    #[test]
    fn test_environment_report_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = EnvironmentReport::gather_at(&dir.path().join("acpid.socket"), dir.path());
        report.display = Some(":0".to_string());
        report.log();
        report.display = None;
        report.log();
    }
}
