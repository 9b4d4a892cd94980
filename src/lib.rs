//! # lamco-thinkpad
//!
//! ThinkPad hardware support for Linux: RandR multi-monitor layout, ACPI and
//! udev event dispatch, dock, backlight and ThinkLight helpers, and suspend
//! requests.
//!
//! # Architecture
//!
//! ```text
//! lamco-thinkpad
//!   ├─> Display (DisplayServer trait: X11/RandR or dry-run recorder)
//!   │     └─> Multi-Monitor (resources, monitor graph, layout, commit)
//!   ├─> ACPI (acpid socket + udev listeners → EventBus → handlers)
//!   ├─> Hardware (dock, ThinkLight, backlight over sysfs)
//!   ├─> Power (suspend policy, logind over D-Bus)
//!   └─> INI (settings store for layout profiles)
//! ```
//!
//! # Event Flow
//!
//! **acpid:** socket line → classification table → [`acpi::AcpiEvent`] → bus
//!
//! **udev:** device notification → dock re-probe / suspend debounce → bus
//!
//! **bus:** every event → one job per registered handler → worker pool
//!
//! # Layout Flow
//!
//! **Build:** [`multimon::ConfigurationManager`] → primary + neighbours + mirrors
//!
//! **Commit:** grab → positions → controller configs → screen size → ungrab

#![warn(missing_docs)]
#![warn(clippy::all)]

/// ACPI and udev event source
pub mod acpi;

/// Daemon configuration
pub mod config;

/// Display server access
pub mod display;

/// ThinkPad sysfs probes
pub mod hardware;

/// INI settings store
pub mod ini;

/// Multi-monitor layout
pub mod multimon;

/// Suspend requests
pub mod power;

/// Utility functions
pub mod utils;

pub use acpi::{AcpiEvent, AcpiEventHandler, AcpiEventSource};
pub use display::{DisplayServer, DryRunDisplay, X11Display};
pub use multimon::ConfigurationManager;
