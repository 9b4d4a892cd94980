//! Recording display backend
//!
//! Serves a fixed set of screen resources and records every request made
//! against it. Configuration requests update the stored controller state so
//! later queries observe them, the way a real server would.

use std::collections::{BTreeMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{
    ControllerConfig, ControllerId, ControllerInfo, DisplayError, DisplayServer, ModeInfo,
    OutputId, OutputInfo, ResourceSnapshot, Result, ScreenSize,
};

/// A request received by [`DryRunDisplay`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    /// `grab`
    Grab,
    /// `ungrab`
    Ungrab,
    /// `set_controller_config`
    SetControllerConfig {
        /// Target controller
        controller: ControllerId,
        /// Requested configuration
        config: ControllerConfig,
    },
    /// `set_screen_size`
    SetScreenSize(ScreenSize),
    /// `set_output_primary`
    SetOutputPrimary(OutputId),
}

#[derive(Debug, Default)]
struct State {
    controllers: BTreeMap<ControllerId, ControllerInfo>,
    calls: Vec<DisplayCall>,
}

/// In-memory display server that records mutations
#[derive(Debug, Default)]
pub struct DryRunDisplay {
    config_timestamp: u32,
    controller_order: Vec<ControllerId>,
    outputs: Vec<OutputInfo>,
    modes: Vec<ModeInfo>,
    rejected: HashSet<ControllerId>,
    log_requests: bool,
    state: Mutex<State>,
}

impl DryRunDisplay {
    /// Empty server with no resources
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the resources of another server
    ///
    /// Outputs or controllers that fail to answer are left out.
    pub fn snapshot_of(server: &dyn DisplayServer) -> Result<Self> {
        let res = server.screen_resources()?;
        let mut display = Self::new().with_config_timestamp(res.config_timestamp);
        for mode in res.modes {
            display = display.with_mode(mode);
        }
        for controller in res.controllers {
            let info = server
                .controller_info(controller, res.config_timestamp)
                .unwrap_or_else(|_| ControllerInfo::disabled(controller));
            display = display.with_controller(info);
        }
        for output in res.outputs {
            if let Ok(info) = server.output_info(output, res.config_timestamp) {
                display = display.with_output(info);
            }
        }
        Ok(display)
    }

    /// Set the configuration timestamp reported to clients
    pub fn with_config_timestamp(mut self, timestamp: u32) -> Self {
        self.config_timestamp = timestamp;
        self
    }

    /// Add a mode
    pub fn with_mode(mut self, mode: ModeInfo) -> Self {
        self.modes.push(mode);
        self
    }

    /// Add a controller with its current configuration
    pub fn with_controller(mut self, info: ControllerInfo) -> Self {
        self.controller_order.push(info.id);
        self.state.get_mut().controllers.insert(info.id, info);
        self
    }

    /// Add an output
    pub fn with_output(mut self, info: OutputInfo) -> Self {
        self.outputs.push(info);
        self
    }

    /// Make configuration requests for `controller` fail
    pub fn rejecting(mut self, controller: ControllerId) -> Self {
        self.rejected.insert(controller);
        self
    }

    /// Log each mutating request at info level
    pub fn logging_requests(mut self) -> Self {
        self.log_requests = true;
        self
    }

    /// All requests received so far, in order
    pub fn calls(&self) -> Vec<DisplayCall> {
        self.state.lock().calls.clone()
    }

    /// Number of requests received so far
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Current configuration of a controller
    pub fn controller_state(&self, controller: ControllerId) -> Option<ControllerInfo> {
        self.state.lock().controllers.get(&controller).cloned()
    }

    fn record(&self, call: DisplayCall) {
        if self.log_requests {
            info!("dry-run: {:?}", call);
        } else {
            debug!("dry-run: {:?}", call);
        }
        self.state.lock().calls.push(call);
    }

    fn mode_size(&self, mode: Option<super::ModeId>) -> (u32, u32) {
        mode.and_then(|id| self.modes.iter().find(|m| m.id == id))
            .map_or((0, 0), |m| (m.width, m.height))
    }
}

impl DisplayServer for DryRunDisplay {
    fn root_window(&self) -> u32 {
        0
    }

    fn screen_resources(&self) -> Result<ResourceSnapshot> {
        Ok(ResourceSnapshot {
            config_timestamp: self.config_timestamp,
            controllers: self.controller_order.clone(),
            outputs: self.outputs.iter().map(|o| o.id).collect(),
            modes: self.modes.clone(),
        })
    }

    fn output_info(&self, output: OutputId, _config_timestamp: u32) -> Result<OutputInfo> {
        self.outputs
            .iter()
            .find(|o| o.id == output)
            .cloned()
            .ok_or_else(|| DisplayError::Query {
                what: output.to_string(),
                reason: "no such output".into(),
            })
    }

    fn controller_info(
        &self,
        controller: ControllerId,
        _config_timestamp: u32,
    ) -> Result<ControllerInfo> {
        self.controller_state(controller)
            .ok_or_else(|| DisplayError::Query {
                what: controller.to_string(),
                reason: "no such controller".into(),
            })
    }

    fn set_controller_config(
        &self,
        controller: ControllerId,
        _config_timestamp: u32,
        config: &ControllerConfig,
    ) -> Result<()> {
        self.record(DisplayCall::SetControllerConfig {
            controller,
            config: config.clone(),
        });
        if self.rejected.contains(&controller) {
            return Err(DisplayError::Rejected {
                controller,
                status: 3,
            });
        }

        let (width, height) = self.mode_size(config.mode);
        let mut state = self.state.lock();
        let info = state
            .controllers
            .get_mut(&controller)
            .ok_or_else(|| DisplayError::Apply(format!("{controller} does not exist")))?;
        info.x = config.x;
        info.y = config.y;
        info.mode = config.mode;
        info.rotation = config.rotation;
        info.outputs = config.outputs.clone();
        info.width = width;
        info.height = height;
        Ok(())
    }

    fn set_screen_size(&self, size: ScreenSize) -> Result<()> {
        self.record(DisplayCall::SetScreenSize(size));
        Ok(())
    }

    fn set_output_primary(&self, output: OutputId) -> Result<()> {
        self.record(DisplayCall::SetOutputPrimary(output));
        Ok(())
    }

    fn grab(&self) -> Result<()> {
        self.record(DisplayCall::Grab);
        Ok(())
    }

    fn ungrab(&self) -> Result<()> {
        self.record(DisplayCall::Ungrab);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{ConnectionState, ModeId, Rotation};

    fn display() -> DryRunDisplay {
        DryRunDisplay::new()
            .with_config_timestamp(7)
            .with_mode(ModeInfo {
                id: ModeId(10),
                width: 1280,
                height: 800,
                dot_clock: 0,
                htotal: 0,
                vtotal: 0,
                flags: 0,
                name: "1280x800".into(),
            })
            .with_controller(ControllerInfo::disabled(ControllerId(1)))
            .with_output(OutputInfo {
                id: OutputId(100),
                name: "LVDS-1".into(),
                connection: ConnectionState::Connected,
                mm_width: 261,
                mm_height: 163,
                controller: None,
                possible_controllers: vec![ControllerId(1)],
                modes: vec![ModeId(10)],
                preferred_count: 1,
            })
    }

    #[test]
    fn test_queries_do_not_record() {
        let d = display();
        let res = d.screen_resources().unwrap();
        assert_eq!(res.config_timestamp, 7);
        assert_eq!(res.outputs, vec![OutputId(100)]);
        d.output_info(OutputId(100), 7).unwrap();
        assert!(d.output_info(OutputId(5), 7).is_err());
        assert_eq!(d.call_count(), 0);
    }

    #[test]
    fn test_config_updates_controller_state() {
        let d = display();
        let cfg = ControllerConfig {
            x: 10,
            y: 20,
            mode: Some(ModeId(10)),
            rotation: Rotation::Left,
            outputs: vec![OutputId(100)],
        };
        d.set_controller_config(ControllerId(1), 7, &cfg).unwrap();

        let info = d.controller_info(ControllerId(1), 7).unwrap();
        assert_eq!((info.x, info.y), (10, 20));
        assert_eq!((info.width, info.height), (1280, 800));
        assert_eq!(info.rotation, Rotation::Left);
        assert_eq!(d.call_count(), 1);
    }

    #[test]
    fn test_rejecting_controller() {
        let d = display().rejecting(ControllerId(1));
        let cfg = ControllerConfig {
            x: 0,
            y: 0,
            mode: None,
            rotation: Rotation::Normal,
            outputs: vec![],
        };
        assert!(matches!(
            d.set_controller_config(ControllerId(1), 7, &cfg),
            Err(DisplayError::Rejected { .. })
        ));
        assert_eq!(d.call_count(), 1);
    }

    #[test]
    fn test_snapshot_of_copies_resources() {
        let d = display();
        let copy = DryRunDisplay::snapshot_of(&d).unwrap();
        let res = copy.screen_resources().unwrap();
        assert_eq!(res.controllers, vec![ControllerId(1)]);
        assert_eq!(res.modes.len(), 1);
        assert!(copy.output_info(OutputId(100), 7).is_ok());
    }
}
