//! X11 RandR backend
//!
//! Thin mapping between [`DisplayServer`] and RandR 1.5 requests issued
//! through `x11rb`'s pure-Rust connection.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use x11rb::connection::Connection as _;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use super::{
    ConnectionState, ControllerConfig, ControllerId, ControllerInfo, DisplayError, DisplayServer,
    ModeId, ModeInfo, OutputId, OutputInfo, ResourceSnapshot, Result, Rotation, ScreenSize,
};

const RANDR_MAJOR: u32 = 1;
const RANDR_MINOR: u32 = 5;

static SHARED: Mutex<Option<Arc<X11Display>>> = parking_lot::const_mutex(None);

/// Connection to an X server with the RandR extension
pub struct X11Display {
    conn: RustConnection,
    root: u32,
    screen: usize,
}

impl std::fmt::Debug for X11Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X11Display")
            .field("root", &self.root)
            .field("screen", &self.screen)
            .finish_non_exhaustive()
    }
}

impl X11Display {
    /// Connect to `display_name`, or to `$DISPLAY` when `None`
    pub fn connect(display_name: Option<&str>) -> Result<Self> {
        let (conn, screen) =
            x11rb::connect(display_name).map_err(|e| DisplayError::Connect(e.to_string()))?;

        let root = conn
            .setup()
            .roots
            .get(screen)
            .map(|s| s.root)
            .ok_or_else(|| DisplayError::Connect(format!("screen {screen} does not exist")))?;

        let version = conn
            .randr_query_version(RANDR_MAJOR, RANDR_MINOR)
            .map_err(|e| DisplayError::RandrUnavailable(e.to_string()))?
            .reply()
            .map_err(|e| DisplayError::RandrUnavailable(e.to_string()))?;
        if version.major_version < 1 || (version.major_version == 1 && version.minor_version < 3) {
            return Err(DisplayError::RandrUnavailable(format!(
                "server speaks RandR {}.{}, need 1.3",
                version.major_version, version.minor_version
            )));
        }

        info!(
            "Connected to X server (screen {}, RandR {}.{})",
            screen, version.major_version, version.minor_version
        );
        Ok(Self { conn, root, screen })
    }

    /// Process-wide connection to the default display, opened on first use
    ///
    /// A failed attempt is not cached; the next call retries.
    pub fn shared() -> Result<Arc<Self>> {
        let mut slot = SHARED.lock();
        if let Some(display) = slot.as_ref() {
            return Ok(Arc::clone(display));
        }
        let display = Arc::new(Self::connect(None)?);
        *slot = Some(Arc::clone(&display));
        Ok(display)
    }

    fn query_error(what: impl Into<String>, e: impl std::fmt::Display) -> DisplayError {
        DisplayError::Query {
            what: what.into(),
            reason: e.to_string(),
        }
    }

    fn to_i16(value: i32, what: &str) -> Result<i16> {
        i16::try_from(value).map_err(|_| DisplayError::OutOfRange(format!("{what}={value}")))
    }

    fn to_u16(value: u32, what: &str) -> Result<u16> {
        u16::try_from(value).map_err(|_| DisplayError::OutOfRange(format!("{what}={value}")))
    }
}

fn none_to_option(handle: u32) -> Option<u32> {
    (handle != x11rb::NONE).then_some(handle)
}

impl DisplayServer for X11Display {
    fn root_window(&self) -> u32 {
        self.root
    }

    fn screen_resources(&self) -> Result<ResourceSnapshot> {
        let reply = self
            .conn
            .randr_get_screen_resources_current(self.root)
            .map_err(|e| Self::query_error("screen resources", e))?
            .reply()
            .map_err(|e| Self::query_error("screen resources", e))?;

        let mut offset = 0usize;
        let modes = reply
            .modes
            .iter()
            .map(|m| {
                let len = usize::from(m.name_len);
                let name = reply
                    .names
                    .get(offset..offset + len)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_default();
                offset += len;
                ModeInfo {
                    id: ModeId(m.id),
                    width: u32::from(m.width),
                    height: u32::from(m.height),
                    dot_clock: m.dot_clock,
                    htotal: u32::from(m.htotal),
                    vtotal: u32::from(m.vtotal),
                    flags: u32::from(m.mode_flags),
                    name,
                }
            })
            .collect();

        Ok(ResourceSnapshot {
            config_timestamp: reply.config_timestamp,
            controllers: reply.crtcs.iter().copied().map(ControllerId).collect(),
            outputs: reply.outputs.iter().copied().map(OutputId).collect(),
            modes,
        })
    }

    fn output_info(&self, output: OutputId, config_timestamp: u32) -> Result<OutputInfo> {
        let reply = self
            .conn
            .randr_get_output_info(output.0, config_timestamp)
            .map_err(|e| Self::query_error(output.to_string(), e))?
            .reply()
            .map_err(|e| Self::query_error(output.to_string(), e))?;

        let connection = if reply.connection == randr::Connection::CONNECTED {
            ConnectionState::Connected
        } else if reply.connection == randr::Connection::DISCONNECTED {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Unknown
        };

        Ok(OutputInfo {
            id: output,
            name: String::from_utf8_lossy(&reply.name).into_owned(),
            connection,
            mm_width: reply.mm_width,
            mm_height: reply.mm_height,
            controller: none_to_option(reply.crtc).map(ControllerId),
            possible_controllers: reply.crtcs.iter().copied().map(ControllerId).collect(),
            modes: reply.modes.iter().copied().map(ModeId).collect(),
            preferred_count: reply.num_preferred,
        })
    }

    fn controller_info(
        &self,
        controller: ControllerId,
        config_timestamp: u32,
    ) -> Result<ControllerInfo> {
        let reply = self
            .conn
            .randr_get_crtc_info(controller.0, config_timestamp)
            .map_err(|e| Self::query_error(controller.to_string(), e))?
            .reply()
            .map_err(|e| Self::query_error(controller.to_string(), e))?;

        Ok(ControllerInfo {
            id: controller,
            x: i32::from(reply.x),
            y: i32::from(reply.y),
            width: u32::from(reply.width),
            height: u32::from(reply.height),
            mode: none_to_option(reply.mode).map(ModeId),
            rotation: Rotation::from_bits(u16::from(reply.rotation)),
            outputs: reply.outputs.iter().copied().map(OutputId).collect(),
        })
    }

    fn set_controller_config(
        &self,
        controller: ControllerId,
        config_timestamp: u32,
        config: &ControllerConfig,
    ) -> Result<()> {
        let outputs: Vec<u32> = config.outputs.iter().map(|o| o.0).collect();
        let reply = self
            .conn
            .randr_set_crtc_config(
                controller.0,
                x11rb::CURRENT_TIME,
                config_timestamp,
                Self::to_i16(config.x, "x")?,
                Self::to_i16(config.y, "y")?,
                config.mode.map_or(x11rb::NONE, |m| m.0),
                randr::Rotation::from(config.rotation.bits()),
                &outputs,
            )
            .map_err(|e| DisplayError::Apply(e.to_string()))?
            .reply()
            .map_err(|e| DisplayError::Apply(e.to_string()))?;

        if reply.status != randr::SetConfig::SUCCESS {
            return Err(DisplayError::Rejected {
                controller,
                status: u8::from(reply.status),
            });
        }
        debug!("{} configured: {:?}", controller, config);
        Ok(())
    }

    fn set_screen_size(&self, size: ScreenSize) -> Result<()> {
        self.conn
            .randr_set_screen_size(
                self.root,
                Self::to_u16(size.width, "width")?,
                Self::to_u16(size.height, "height")?,
                size.mm_width,
                size.mm_height,
            )
            .map_err(|e| DisplayError::Apply(e.to_string()))?
            .check()
            .map_err(|e| DisplayError::Apply(e.to_string()))
    }

    fn set_output_primary(&self, output: OutputId) -> Result<()> {
        self.conn
            .randr_set_output_primary(self.root, output.0)
            .map_err(|e| DisplayError::Apply(e.to_string()))?
            .check()
            .map_err(|e| DisplayError::Apply(e.to_string()))
    }

    fn grab(&self) -> Result<()> {
        self.conn
            .grab_server()
            .map_err(|e| DisplayError::Apply(e.to_string()))?
            .check()
            .map_err(|e| DisplayError::Apply(e.to_string()))
    }

    fn ungrab(&self) -> Result<()> {
        self.conn
            .ungrab_server()
            .map_err(|e| DisplayError::Apply(e.to_string()))?
            .check()
            .map_err(|e| DisplayError::Apply(e.to_string()))
    }
}
