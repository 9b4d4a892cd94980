//! Utility Functions and Diagnostics
//!
//! System diagnostics and user-friendly error formatting.
//!
//! ## Diagnostics
//!
//! The [`diagnostics`] module describes the runtime environment at startup:
//!
//! ```rust,no_run
//! use lamco_thinkpad::utils::{log_startup_diagnostics, SystemInfo};
//!
//! let sys_info = SystemInfo::gather();
//! sys_info.log(); // OS, kernel, CPU count, memory
//!
//! log_startup_diagnostics(); // plus X11 display, acpid socket, dock node
//! ```
//!
//! ## Error Formatting
//!
//! The [`errors`] module turns fatal errors into a message with
//! troubleshooting steps for X11, acpid, udev, dock and configuration
//! failures:
//!
//! ```rust
//! use lamco_thinkpad::utils::format_user_error;
//!
//! let error = anyhow::anyhow!("Failed to connect to acpid socket /var/run/acpid.socket");
//! let message = format_user_error(&error);
//! assert!(message.contains("acpid"));
//! ```

pub mod diagnostics;
pub mod errors;

pub use diagnostics::{detect_display, log_startup_diagnostics, EnvironmentReport, SystemInfo};
pub use errors::format_user_error;
