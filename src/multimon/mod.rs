//! Multi-Monitor Layout Module
//!
//! Models the outputs of a RandR screen as a graph of monitors and turns
//! that graph into concrete controller configurations.
//!
//! # Overview
//!
//! - [`ScreenResourceSet`] snapshots controllers, outputs and modes, and
//!   keeps the pool of free controllers
//! - [`Monitor`] wraps one output and the controller driving it
//! - [`ConfigurationManager`] owns the monitors, records neighbour and
//!   mirror relations, and commits the resulting layout
//!
//! # Layout Graph
//!
//! Monitors live in an arena owned by the manager and refer to each other by
//! [`MonitorId`]. Each monitor has at most one neighbour per side and at most
//! one mirror. Exactly one monitor is primary; every other monitor is placed
//! by walking the primary's four neighbour chains:
//!
//! ```text
//!            ┌──────┐
//!            │ top  │
//!   ┌──────┬─┴──────┴─┬───────┐
//!   │ left │  primary  │ right │
//!   └──────┴─┬──────┬─┴───────┘
//!            │bottom│
//!            └──────┘
//! ```
//!
//! Relations are not forced to be symmetric; only the direction walked away
//! from the primary matters.
//!
//! # Commit
//!
//! [`ConfigurationManager::commit`] grabs the server, positions every
//! monitor, applies each controller configuration, sizes the screen to fit
//! and ungrabs. Individual failures are logged and do not stop the commit.

use std::fmt;

use thiserror::Error;

use crate::display::DisplayError;

pub mod layout;
pub mod manager;
pub mod monitor;
pub mod profile;
pub mod resources;

pub use layout::ScreenLimits;
pub use manager::{CommitReport, ConfigurationManager};
pub use monitor::{Monitor, MonitorState};
pub use profile::LayoutProfile;
pub use resources::ScreenResourceSet;

/// Multi-monitor error types
#[derive(Error, Debug)]
pub enum MultiMonitorError {
    /// Display server request failed
    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    /// Operation needs a primary monitor
    #[error("No primary monitor designated")]
    NoPrimary,

    /// No monitor with this id
    #[error("Monitor not found: {0}")]
    MonitorNotFound(MonitorId),

    /// No monitor with this interface name
    #[error("No monitor named {0}")]
    UnknownOutput(String),

    /// Operation needs the monitor to hold a controller
    #[error("Monitor {0} has no controller")]
    NoController(String),

    /// The two monitors share no mode
    #[error("{0} and {1} have no mode in common")]
    NoCommonMode(String, String),

    /// A monitor cannot be related to itself
    #[error("Monitor {0} cannot be its own neighbour or mirror")]
    SelfReference(MonitorId),

    /// Layout profile could not be read or written
    #[error("Layout profile: {0}")]
    Profile(#[from] crate::ini::IniError),

    /// Layout profile is incomplete or malformed
    #[error("Invalid layout profile: {0}")]
    InvalidProfile(String),
}

/// Result type for multi-monitor operations
pub type Result<T> = std::result::Result<T, MultiMonitorError>;

/// Index of a monitor in its manager's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorId(pub usize);

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Side of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// West
    Left = 0,
    /// East
    Right = 1,
    /// North
    Top = 2,
    /// South
    Bottom = 3,
}

impl Direction {
    /// All four sides
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Top,
        Direction::Bottom,
    ];
}

/// Position on the screen in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    /// Horizontal offset
    pub x: i32,
    /// Vertical offset
    pub y: i32,
}

impl Point {
    /// New point
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}+{}", self.x, self.y)
    }
}
