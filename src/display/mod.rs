//! Display Server Abstraction
//!
//! Typed view of the RandR resources the multi-monitor engine works with,
//! and the [`DisplayServer`] trait every backend implements.
//!
//! # Backends
//!
//! - [`X11Display`] talks RandR 1.5 to a live X server through `x11rb`
//! - [`DryRunDisplay`] serves a fixed snapshot and records every mutation,
//!   used by tests and by the CLI `--dry-run` flag
//!
//! # Identifiers
//!
//! Controllers (CRTCs), outputs and modes are opaque server handles. They are
//! wrapped in newtypes so a controller id can never be passed where an output
//! id is expected. The protocol's "None" handle is modelled as `Option`.

use std::fmt;

use thiserror::Error;

pub mod dry_run;
pub mod x11;

pub use dry_run::{DisplayCall, DryRunDisplay};
pub use x11::X11Display;

/// Display server error types
#[derive(Error, Debug)]
pub enum DisplayError {
    /// Could not open a connection to the display server
    #[error("Failed to connect to display server: {0}")]
    Connect(String),

    /// The RandR extension is missing or too old
    #[error("RandR extension unavailable: {0}")]
    RandrUnavailable(String),

    /// A query request failed
    #[error("Query for {what} failed: {reason}")]
    Query {
        /// What was being queried
        what: String,
        /// Underlying failure
        reason: String,
    },

    /// A configuration request failed to reach the server
    #[error("Configuration request failed: {0}")]
    Apply(String),

    /// The server answered a configuration request with a non-success status
    #[error("Controller {controller} rejected configuration (status {status})")]
    Rejected {
        /// Controller the request targeted
        controller: ControllerId,
        /// Raw status reported by the server
        status: u8,
    },

    /// Value does not fit the protocol's field width
    #[error("Value out of protocol range: {0}")]
    OutOfRange(String),
}

/// Result type for display operations
pub type Result<T> = std::result::Result<T, DisplayError>;

macro_rules! server_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{:#x}"), self.0)
            }
        }
    };
}

server_id!(
    /// Handle of a display controller (CRTC)
    ControllerId,
    "crtc:"
);
server_id!(
    /// Handle of a physical video output
    OutputId,
    "output:"
);
server_id!(
    /// Handle of a video mode
    ModeId,
    "mode:"
);

/// Mode flag bits as reported by RandR
pub mod mode_flags {
    /// Interlaced scan-out
    pub const INTERLACE: u32 = 1 << 4;
    /// Each line is scanned twice
    pub const DOUBLE_SCAN: u32 = 1 << 5;
}

/// A video mode offered by the display server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeInfo {
    /// Mode handle
    pub id: ModeId,
    /// Horizontal resolution in pixels
    pub width: u32,
    /// Vertical resolution in pixels
    pub height: u32,
    /// Pixel clock in Hz
    pub dot_clock: u32,
    /// Total horizontal line length including blanking
    pub htotal: u32,
    /// Total vertical frame length including blanking
    pub vtotal: u32,
    /// Raw mode flags, see [`mode_flags`]
    pub flags: u32,
    /// Human readable name, e.g. `1920x1080`
    pub name: String,
}

impl ModeInfo {
    /// Refresh rate in Hz, or 0.0 when the timings are unknown
    pub fn refresh_rate(&self) -> f64 {
        let mut vtotal = f64::from(self.vtotal);
        if self.flags & mode_flags::DOUBLE_SCAN != 0 {
            vtotal *= 2.0;
        }
        if self.flags & mode_flags::INTERLACE != 0 {
            vtotal /= 2.0;
        }
        let frame = f64::from(self.htotal) * vtotal;
        if frame == 0.0 {
            0.0
        } else {
            f64::from(self.dot_clock) / frame
        }
    }
}

/// Output rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// Upright
    #[default]
    Normal,
    /// Rotated 90 degrees counter-clockwise
    Left,
    /// Upside down
    Inverted,
    /// Rotated 270 degrees counter-clockwise
    Right,
}

impl Rotation {
    /// Build a rotation from degrees; only right angles are accepted
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Self::Normal),
            90 => Some(Self::Left),
            180 => Some(Self::Inverted),
            270 => Some(Self::Right),
            _ => None,
        }
    }

    /// Rotation in degrees
    pub fn degrees(self) -> u16 {
        match self {
            Self::Normal => 0,
            Self::Left => 90,
            Self::Inverted => 180,
            Self::Right => 270,
        }
    }

    /// Decode the rotation part of a RandR rotation mask (reflection bits ignored)
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0x0f {
            0x02 => Self::Left,
            0x04 => Self::Inverted,
            0x08 => Self::Right,
            _ => Self::Normal,
        }
    }

    /// RandR rotation mask for this rotation
    pub fn bits(self) -> u16 {
        match self {
            Self::Normal => 0x01,
            Self::Left => 0x02,
            Self::Inverted => 0x04,
            Self::Right => 0x08,
        }
    }

    /// Whether width and height swap under this rotation
    pub fn is_transposed(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Physical connection state of an output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A sink is attached
    Connected,
    /// Nothing attached
    Disconnected,
    /// The driver cannot tell
    Unknown,
}

/// Snapshot of an output's properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    /// Output handle
    pub id: OutputId,
    /// Interface name, e.g. `LVDS-1` or `DP-2`
    pub name: String,
    /// Connection state
    pub connection: ConnectionState,
    /// Physical width in millimetres
    pub mm_width: u32,
    /// Physical height in millimetres
    pub mm_height: u32,
    /// Controller currently driving the output
    pub controller: Option<ControllerId>,
    /// Controllers able to drive the output
    pub possible_controllers: Vec<ControllerId>,
    /// Modes supported by the output
    pub modes: Vec<ModeId>,
    /// Number of leading entries in `modes` the sink prefers
    pub preferred_count: u16,
}

/// Snapshot of a controller's current configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerInfo {
    /// Controller handle
    pub id: ControllerId,
    /// Horizontal position on the screen
    pub x: i32,
    /// Vertical position on the screen
    pub y: i32,
    /// Current scan-out width
    pub width: u32,
    /// Current scan-out height
    pub height: u32,
    /// Current mode, `None` when disabled
    pub mode: Option<ModeId>,
    /// Current rotation
    pub rotation: Rotation,
    /// Outputs currently driven
    pub outputs: Vec<OutputId>,
}

impl ControllerInfo {
    /// A disabled controller at the origin
    pub fn disabled(id: ControllerId) -> Self {
        Self {
            id,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            mode: None,
            rotation: Rotation::Normal,
            outputs: Vec::new(),
        }
    }
}

/// Configuration request for a single controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Horizontal position on the screen
    pub x: i32,
    /// Vertical position on the screen
    pub y: i32,
    /// Mode to scan out, `None` disables the controller
    pub mode: Option<ModeId>,
    /// Rotation
    pub rotation: Rotation,
    /// Outputs to drive; empty when disabling
    pub outputs: Vec<OutputId>,
}

/// Logical screen dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Width in millimetres
    pub mm_width: u32,
    /// Height in millimetres
    pub mm_height: u32,
}

/// Screen resources as enumerated by the server
#[derive(Debug, Clone, Default)]
pub struct ResourceSnapshot {
    /// Configuration timestamp that must accompany configuration requests
    pub config_timestamp: u32,
    /// Controllers in server enumeration order
    pub controllers: Vec<ControllerId>,
    /// Outputs in server enumeration order
    pub outputs: Vec<OutputId>,
    /// Modes in server enumeration order
    pub modes: Vec<ModeInfo>,
}

/// Operations the layout engine needs from a display server
///
/// Implementations must be usable from any thread; mutating requests take
/// `&self` and serialise internally.
pub trait DisplayServer: Send + Sync {
    /// Root window the screen resources belong to
    fn root_window(&self) -> u32;

    /// Enumerate controllers, outputs and modes
    fn screen_resources(&self) -> Result<ResourceSnapshot>;

    /// Query one output
    fn output_info(&self, output: OutputId, config_timestamp: u32) -> Result<OutputInfo>;

    /// Query one controller
    fn controller_info(
        &self,
        controller: ControllerId,
        config_timestamp: u32,
    ) -> Result<ControllerInfo>;

    /// Apply a configuration to one controller
    fn set_controller_config(
        &self,
        controller: ControllerId,
        config_timestamp: u32,
        config: &ControllerConfig,
    ) -> Result<()>;

    /// Resize the logical screen
    fn set_screen_size(&self, size: ScreenSize) -> Result<()>;

    /// Mark an output as primary
    fn set_output_primary(&self, output: OutputId) -> Result<()>;

    /// Suspend processing of other clients
    fn grab(&self) -> Result<()>;

    /// Resume processing of other clients
    fn ungrab(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(dot_clock: u32, htotal: u32, vtotal: u32, flags: u32) -> ModeInfo {
        ModeInfo {
            id: ModeId(1),
            width: 1920,
            height: 1080,
            dot_clock,
            htotal,
            vtotal,
            flags,
            name: "1920x1080".into(),
        }
    }

    #[test]
    fn test_refresh_rate() {
        let m = mode(148_500_000, 2200, 1125, 0);
        assert!((m.refresh_rate() - 60.0).abs() < 0.01);
    }

    #[test]
    fn test_refresh_rate_interlaced() {
        let m = mode(74_250_000, 2200, 1125, mode_flags::INTERLACE);
        assert!((m.refresh_rate() - 60.0).abs() < 0.01);
    }

    #[test]
    fn test_refresh_rate_unknown_timings() {
        assert_eq!(mode(0, 0, 0, 0).refresh_rate(), 0.0);
    }

    #[test]
    fn test_rotation_degrees() {
        for deg in [0, 90, 180, 270] {
            let r = Rotation::from_degrees(deg).unwrap();
            assert_eq!(r.degrees(), deg);
            assert_eq!(Rotation::from_bits(r.bits()), r);
        }
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn test_rotation_ignores_reflection_bits() {
        assert_eq!(Rotation::from_bits(0x02 | 0x10), Rotation::Left);
        assert!(Rotation::Left.is_transposed());
        assert!(Rotation::Right.is_transposed());
        assert!(!Rotation::Inverted.is_transposed());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ControllerId(0x42).to_string(), "crtc:0x42");
        assert_eq!(OutputId(7).to_string(), "output:0x7");
    }
}
