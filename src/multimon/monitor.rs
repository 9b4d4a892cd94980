//! Monitor model
//!
//! A [`Monitor`] wraps one physical output plus the controller (if any) that
//! drives it. Its lifecycle has three states:
//!
//! ```text
//!   Unbound ──reconfigure──► Bound-Off ──set_output_mode──► Bound-On
//!      ▲                        ▲  │                           │
//!      └────────release─────────┘  └────────turn_off◄──────────┘
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use super::resources::ScreenResourceSet;
use super::{Direction, MonitorId, Point};
use crate::display::{
    ConnectionState, ControllerConfig, ControllerId, ModeId, ModeInfo, OutputId, OutputInfo,
    Rotation,
};

/// Lifecycle state of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No controller
    Unbound,
    /// Controller held, no mode
    BoundOff,
    /// Controller held and scanning out a mode
    BoundOn,
}

#[derive(Debug, Clone)]
struct ControllerState {
    id: ControllerId,
    position: Point,
    mode: Option<Arc<ModeInfo>>,
    rotation: Rotation,
}

/// One physical output and its layout relations
#[derive(Debug, Clone)]
pub struct Monitor {
    output: OutputInfo,
    controller: Option<ControllerState>,
    primary: bool,
    neighbors: [Option<MonitorId>; 4],
    mirror: Option<MonitorId>,
}

impl Monitor {
    /// Build a monitor from an output snapshot
    ///
    /// If the output is already driven, its controller is claimed from the
    /// pool and the controller's current position, rotation and mode are
    /// adopted. A controller another monitor already claimed (one controller
    /// driving two outputs) is not shared; the monitor starts unbound.
    pub fn new(output: OutputInfo, resources: &mut ScreenResourceSet) -> Self {
        let controller = output.controller.and_then(|id| {
            if resources.mark_controller_as_busy(id) {
                Some(Self::adopt_controller(id, resources, true))
            } else {
                warn!(
                    "{} is driven by {}, which is already claimed; leaving it unbound",
                    output.name, id
                );
                None
            }
        });

        Self {
            output,
            controller,
            primary: false,
            neighbors: [None; 4],
            mirror: None,
        }
    }

    fn adopt_controller(
        id: ControllerId,
        resources: &ScreenResourceSet,
        keep_mode: bool,
    ) -> ControllerState {
        let Some(info) = resources.controller_info(id) else {
            warn!("No configuration known for {}, treating it as disabled", id);
            return ControllerState {
                id,
                position: Point::default(),
                mode: None,
                rotation: Rotation::Normal,
            };
        };

        let mode = if keep_mode {
            info.mode.and_then(|mode_id| {
                let found = resources.mode(mode_id).cloned();
                if found.is_none() {
                    warn!("{} scans out unknown {}", id, mode_id);
                }
                found
            })
        } else {
            None
        };

        ControllerState {
            id,
            position: Point::new(info.x, info.y),
            mode,
            rotation: info.rotation,
        }
    }

    /// Output handle
    pub fn output_id(&self) -> OutputId {
        self.output.id
    }

    /// Output snapshot
    pub fn output_info(&self) -> &OutputInfo {
        &self.output
    }

    /// Interface name, e.g. `LVDS-1`
    pub fn interface_name(&self) -> &str {
        &self.output.name
    }

    /// Whether a sink is attached
    pub fn is_connected(&self) -> bool {
        self.output.connection == ConnectionState::Connected
    }

    /// Physical width and height in millimetres, ignoring rotation
    pub fn physical_size_mm(&self) -> (u32, u32) {
        (self.output.mm_width, self.output.mm_height)
    }

    /// Lifecycle state
    pub fn state(&self) -> MonitorState {
        match &self.controller {
            None => MonitorState::Unbound,
            Some(c) if c.mode.is_none() => MonitorState::BoundOff,
            Some(_) => MonitorState::BoundOn,
        }
    }

    /// True when the monitor has no controller or no mode
    pub fn is_off(&self) -> bool {
        self.state() != MonitorState::BoundOn
    }

    /// Controller driving this monitor
    pub fn controller(&self) -> Option<ControllerId> {
        self.controller.as_ref().map(|c| c.id)
    }

    /// Current mode
    pub fn output_mode(&self) -> Option<&ModeInfo> {
        self.controller.as_ref()?.mode.as_deref()
    }

    /// Current rotation, `Normal` while unbound
    pub fn rotation(&self) -> Rotation {
        self.controller
            .as_ref()
            .map_or(Rotation::Normal, |c| c.rotation)
    }

    /// Claim a controller from the pool if the monitor has none
    ///
    /// Returns `false` when the pool is exhausted.
    pub fn reconfigure(&mut self, resources: &mut ScreenResourceSet) -> bool {
        if let Some(c) = &self.controller {
            debug!("{} already driven by {}", self.output.name, c.id);
            return true;
        }
        let Some(id) = resources.request_controller() else {
            warn!("No free controller for {}", self.output.name);
            return false;
        };
        self.controller = Some(Self::adopt_controller(id, resources, false));
        true
    }

    /// Return the controller to the pool
    pub fn release(&mut self, resources: &mut ScreenResourceSet) {
        if let Some(c) = self.controller.take() {
            resources.release_controller(c.id);
        }
    }

    /// Stop scanning out; the controller stays claimed
    pub fn turn_off(&mut self) {
        if let Some(c) = self.controller.as_mut() {
            c.mode = None;
        }
    }

    /// Select the mode to scan out
    ///
    /// Without a controller this only logs a warning. Returns whether the
    /// mode was applied.
    pub fn set_output_mode(&mut self, mode: ModeId, resources: &ScreenResourceSet) -> bool {
        let Some(c) = self.controller.as_mut() else {
            warn!("{} has no controller, cannot set {}", self.output.name, mode);
            return false;
        };
        let Some(info) = resources.mode(mode) else {
            warn!("{} does not exist on this screen", mode);
            return false;
        };
        if !self.output.modes.contains(&mode) {
            warn!("{} is not advertised by {}", info.name, self.output.name);
        }
        c.mode = Some(Arc::clone(info));
        true
    }

    /// Whether the output advertises `mode`
    pub fn is_output_mode_supported(&self, mode: ModeId) -> bool {
        self.output.modes.iter().any(|&m| m == mode)
    }

    /// Mode the output prefers, the last entry of its mode list
    pub fn preferred_output_mode(&self) -> Option<ModeId> {
        self.output.modes.last().copied()
    }

    /// Position on the screen, `None` while unbound
    pub fn position(&self) -> Option<Point> {
        self.controller.as_ref().map(|c| c.position)
    }

    /// Move the monitor; ignored with a warning while unbound
    pub fn set_position(&mut self, position: Point) {
        match self.controller.as_mut() {
            Some(c) => c.position = position,
            None => warn!("Cannot position {}, it has no controller", self.output.name),
        }
    }

    /// Rotate the monitor; ignored with a warning while unbound
    pub fn set_rotation(&mut self, rotation: Rotation) {
        match self.controller.as_mut() {
            Some(c) => c.rotation = rotation,
            None => warn!("Cannot rotate {}, it has no controller", self.output.name),
        }
    }

    /// Whether this is the primary monitor
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub(crate) fn set_primary_flag(&mut self, primary: bool) {
        self.primary = primary;
    }

    /// Neighbour in `direction`
    pub fn neighbor(&self, direction: Direction) -> Option<MonitorId> {
        self.neighbors[direction as usize]
    }

    pub(crate) fn set_neighbor(&mut self, direction: Direction, neighbor: Option<MonitorId>) {
        self.neighbors[direction as usize] = neighbor;
    }

    /// Monitor that mirrors this one
    pub fn mirror(&self) -> Option<MonitorId> {
        self.mirror
    }

    pub(crate) fn set_mirror_link(&mut self, mirror: Option<MonitorId>) {
        self.mirror = mirror;
    }

    /// Translate a length between mode axes and screen axes
    ///
    /// Under a 90° or 270° rotation a value equal to the mode height maps to
    /// the mode width and vice versa. Anything else passes through.
    pub fn rotate_normalize(&self, value: u32) -> u32 {
        match self.output_mode() {
            Some(mode) => swap_under_rotation(self.rotation(), value, mode.width, mode.height),
            None => value,
        }
    }

    /// [`rotate_normalize`](Self::rotate_normalize) for physical dimensions
    pub fn rotate_normalize_mm(&self, value: u32) -> u32 {
        swap_under_rotation(
            self.rotation(),
            value,
            self.output.mm_width,
            self.output.mm_height,
        )
    }

    /// Width and height on the screen in pixels; zero while off
    pub fn normalized_size(&self) -> (u32, u32) {
        match self.output_mode() {
            Some(mode) if !self.rotation().is_transposed() => (mode.width, mode.height),
            Some(mode) => (mode.height, mode.width),
            None => (0, 0),
        }
    }

    /// Width and height on the screen in millimetres; zero while off
    pub fn normalized_size_mm(&self) -> (u32, u32) {
        if self.is_off() {
            return (0, 0);
        }
        let (w, h) = (self.output.mm_width, self.output.mm_height);
        if self.rotation().is_transposed() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Request that applies this monitor's state to its controller
    ///
    /// An off monitor yields a request with no mode and no outputs.
    pub fn controller_config(&self) -> Option<(ControllerId, ControllerConfig)> {
        let c = self.controller.as_ref()?;
        let config = match &c.mode {
            Some(mode) => ControllerConfig {
                x: c.position.x,
                y: c.position.y,
                mode: Some(mode.id),
                rotation: c.rotation,
                outputs: vec![self.output.id],
            },
            None => ControllerConfig {
                x: c.position.x,
                y: c.position.y,
                mode: None,
                rotation: c.rotation,
                outputs: Vec::new(),
            },
        };
        Some((c.id, config))
    }
}

fn swap_under_rotation(rotation: Rotation, value: u32, width: u32, height: u32) -> u32 {
    if !rotation.is_transposed() {
        value
    } else if value == height {
        width
    } else if value == width {
        height
    } else {
        value
    }
}
