//! Configuration Manager
//!
//! Owns the monitor arena for one screen, records the relations between
//! monitors and commits the resulting layout to the display server.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::layout::{self, ScreenLimits};
use super::{
    Direction, Monitor, MonitorId, MultiMonitorError, Result, ScreenResourceSet,
};
use crate::display::{DisplayServer, ModeId, Rotation, ScreenSize};

/// Outcome of a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitReport {
    /// Controller configurations the server accepted
    pub applied: usize,
    /// Controller configurations that failed
    pub failed: usize,
    /// Screen size requested, `None` if the screen was not resized
    pub screen_size: Option<ScreenSize>,
}

/// Monitor graph of one screen
pub struct ConfigurationManager {
    resources: ScreenResourceSet,
    monitors: Vec<Monitor>,
    primary: Option<MonitorId>,
}

impl std::fmt::Debug for ConfigurationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationManager")
            .field("monitors", &self.monitors.len())
            .field("primary", &self.primary)
            .finish_non_exhaustive()
    }
}

impl ConfigurationManager {
    /// Create a manager with one monitor per output of `resources`
    ///
    /// Outputs the server fails to describe are skipped with a warning.
    pub fn new(mut resources: ScreenResourceSet) -> Self {
        let display = Arc::clone(resources.display());
        let timestamp = resources.config_timestamp();
        let outputs = resources.outputs().to_vec();

        let mut monitors = Vec::with_capacity(outputs.len());
        for output in outputs {
            match display.output_info(output, timestamp) {
                Ok(info) => {
                    debug!("Monitor {}: {} ({:?})", monitors.len(), info.name, info.connection);
                    monitors.push(Monitor::new(info, &mut resources));
                }
                Err(e) => warn!("Skipping {}: {}", output, e),
            }
        }

        info!("Found {} monitors", monitors.len());
        Self {
            resources,
            monitors,
            primary: None,
        }
    }

    /// Enumerate `display` and build a manager for it
    ///
    /// # Errors
    ///
    /// Returns error if the screen resources cannot be queried
    pub fn from_display(display: Arc<dyn DisplayServer>) -> Result<Self> {
        Ok(Self::new(ScreenResourceSet::new(display)?))
    }

    /// Screen resources and controller pool
    pub fn resources(&self) -> &ScreenResourceSet {
        &self.resources
    }

    /// All monitors; a monitor's index is its [`MonitorId`]
    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    /// Look up a monitor
    pub fn monitor(&self, id: MonitorId) -> Result<&Monitor> {
        self.monitors
            .get(id.0)
            .ok_or(MultiMonitorError::MonitorNotFound(id))
    }

    fn monitor_mut(&mut self, id: MonitorId) -> Result<&mut Monitor> {
        self.monitors
            .get_mut(id.0)
            .ok_or(MultiMonitorError::MonitorNotFound(id))
    }

    /// Find a monitor by interface name, e.g. `LVDS-1`
    pub fn monitor_by_name(&self, name: &str) -> Result<MonitorId> {
        self.monitors
            .iter()
            .position(|m| m.interface_name() == name)
            .map(MonitorId)
            .ok_or_else(|| MultiMonitorError::UnknownOutput(name.to_string()))
    }

    /// Monitors with a sink attached
    pub fn connected_monitors(&self) -> Vec<MonitorId> {
        self.monitors
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_connected())
            .map(|(i, _)| MonitorId(i))
            .collect()
    }

    /// Current primary monitor
    pub fn primary(&self) -> Option<MonitorId> {
        self.primary
    }

    /// Designate the primary monitor
    ///
    /// # Arguments
    ///
    /// * `id` - Monitor that anchors the layout
    ///
    /// # Errors
    ///
    /// Returns error if `id` is unknown
    pub fn set_primary(&mut self, id: MonitorId) -> Result<()> {
        self.monitor(id)?;
        if let Some(previous) = self.primary.replace(id) {
            self.monitors[previous.0].set_primary_flag(false);
        }
        self.monitors[id.0].set_primary_flag(true);
        debug!("Primary monitor is now {}", self.monitors[id.0].interface_name());
        Ok(())
    }

    /// Set or clear the neighbour of `id` on one side
    ///
    /// # Arguments
    ///
    /// * `id` - Monitor being linked from
    /// * `direction` - Side of `id` the neighbour sits on
    /// * `neighbor` - Neighbour, or `None` to clear the link
    ///
    /// # Errors
    ///
    /// Returns error if either monitor is unknown or `neighbor == id`
    pub fn set_neighbor(
        &mut self,
        id: MonitorId,
        direction: Direction,
        neighbor: Option<MonitorId>,
    ) -> Result<()> {
        if let Some(n) = neighbor {
            self.monitor(n)?;
            if n == id {
                return Err(MultiMonitorError::SelfReference(id));
            }
        }
        self.monitor_mut(id)?.set_neighbor(direction, neighbor);
        Ok(())
    }

    /// Place `neighbor` to the left of `id`
    pub fn set_left(&mut self, id: MonitorId, neighbor: Option<MonitorId>) -> Result<()> {
        self.set_neighbor(id, Direction::Left, neighbor)
    }

    /// Place `neighbor` to the right of `id`
    pub fn set_right(&mut self, id: MonitorId, neighbor: Option<MonitorId>) -> Result<()> {
        self.set_neighbor(id, Direction::Right, neighbor)
    }

    /// Place `neighbor` above `id`
    pub fn set_top(&mut self, id: MonitorId, neighbor: Option<MonitorId>) -> Result<()> {
        self.set_neighbor(id, Direction::Top, neighbor)
    }

    /// Place `neighbor` below `id`
    pub fn set_bottom(&mut self, id: MonitorId, neighbor: Option<MonitorId>) -> Result<()> {
        self.set_neighbor(id, Direction::Bottom, neighbor)
    }

    /// First mode, in screen enumeration order, both monitors support
    pub fn find_common_output_mode(&self, a: MonitorId, b: MonitorId) -> Result<Option<ModeId>> {
        let (a, b) = (self.monitor(a)?, self.monitor(b)?);
        Ok(layout::find_common_output_mode(
            self.resources.modes().iter().map(|m| &**m),
            a,
            b,
        ))
    }

    /// Make `target` show the same content as `source`
    ///
    /// Both monitors get the first mode they have in common and `target` is
    /// moved onto `source`. Passing `None` clears the mirror of `source`.
    ///
    /// # Errors
    ///
    /// Returns error if either monitor is unknown or lacks a controller, or
    /// if they share no mode
    pub fn set_mirror(&mut self, source: MonitorId, target: Option<MonitorId>) -> Result<()> {
        let Some(target) = target else {
            self.monitor_mut(source)?.set_mirror_link(None);
            return Ok(());
        };
        if source == target {
            return Err(MultiMonitorError::SelfReference(source));
        }

        for id in [source, target] {
            let monitor = self.monitor(id)?;
            if monitor.controller().is_none() {
                return Err(MultiMonitorError::NoController(
                    monitor.interface_name().to_string(),
                ));
            }
        }

        let mode = self.find_common_output_mode(source, target)?.ok_or_else(|| {
            MultiMonitorError::NoCommonMode(
                self.monitors[source.0].interface_name().to_string(),
                self.monitors[target.0].interface_name().to_string(),
            )
        })?;

        self.monitors[source.0].set_output_mode(mode, &self.resources);
        self.monitors[target.0].set_output_mode(mode, &self.resources);
        if let Some(position) = self.monitors[source.0].position() {
            self.monitors[target.0].set_position(position);
        }
        self.monitors[source.0].set_mirror_link(Some(target));

        info!(
            "{} mirrors {} in {}",
            self.monitors[target.0].interface_name(),
            self.monitors[source.0].interface_name(),
            mode
        );
        Ok(())
    }

    /// Claim a free controller for `id`
    ///
    /// Returns `Ok(false)` when no controller is free; the monitor stays off.
    pub fn reconfigure(&mut self, id: MonitorId) -> Result<bool> {
        let monitor = self
            .monitors
            .get_mut(id.0)
            .ok_or(MultiMonitorError::MonitorNotFound(id))?;
        Ok(monitor.reconfigure(&mut self.resources))
    }

    /// Return the controller of `id` to the pool
    pub fn release(&mut self, id: MonitorId) -> Result<()> {
        let monitor = self
            .monitors
            .get_mut(id.0)
            .ok_or(MultiMonitorError::MonitorNotFound(id))?;
        monitor.release(&mut self.resources);
        Ok(())
    }

    /// Select the mode `id` scans out; `Ok(false)` if it could not be applied
    pub fn set_output_mode(&mut self, id: MonitorId, mode: ModeId) -> Result<bool> {
        let monitor = self
            .monitors
            .get_mut(id.0)
            .ok_or(MultiMonitorError::MonitorNotFound(id))?;
        Ok(monitor.set_output_mode(mode, &self.resources))
    }

    /// Rotate `id`
    pub fn set_rotation(&mut self, id: MonitorId, rotation: Rotation) -> Result<()> {
        self.monitor_mut(id)?.set_rotation(rotation);
        Ok(())
    }

    /// Stop `id` scanning out while keeping its controller
    pub fn turn_off(&mut self, id: MonitorId) -> Result<()> {
        self.monitor_mut(id)?.turn_off();
        Ok(())
    }

    /// Layout extents around the primary
    pub fn screen_limits(&self) -> Result<ScreenLimits> {
        let primary = self.primary.ok_or(MultiMonitorError::NoPrimary)?;
        Ok(layout::calculate_limits(&self.monitors, primary))
    }

    /// Screen size needed by the current layout
    pub fn screen_size(&self) -> Result<ScreenSize> {
        Ok(self.screen_limits()?.screen_size())
    }

    /// Monitors reachable from the primary, in application order
    ///
    /// The primary comes first, then each side's chain outward. Every
    /// monitor is followed by its mirror. Nothing is listed twice.
    pub fn layout_members(&self) -> Vec<MonitorId> {
        let Some(primary) = self.primary else {
            return Vec::new();
        };

        let mut walk = vec![primary];
        for direction in Direction::ALL {
            walk.extend(layout::chain(&self.monitors, primary, direction));
        }

        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(walk.len());
        for id in walk {
            if seen.insert(id) {
                members.push(id);
            }
            if let Some(mirror) = self.monitors[id.0].mirror() {
                if mirror.0 < self.monitors.len() && seen.insert(mirror) {
                    members.push(mirror);
                }
            }
        }
        members
    }

    fn apply(&self, id: MonitorId, report: &mut CommitReport) {
        let monitor = &self.monitors[id.0];
        let Some((controller, config)) = monitor.controller_config() else {
            debug!("{} has no controller, skipping", monitor.interface_name());
            return;
        };

        let display = self.resources.display();
        match display.set_controller_config(controller, self.resources.config_timestamp(), &config)
        {
            Ok(()) => {
                debug!(
                    "{} -> {} {:?} at {}+{} ({})",
                    monitor.interface_name(),
                    controller,
                    config.mode,
                    config.x,
                    config.y,
                    config.rotation
                );
                report.applied += 1;
            }
            Err(e) => {
                error!(
                    "Failed to configure {} on {}: {}",
                    monitor.interface_name(),
                    controller,
                    e
                );
                report.failed += 1;
            }
        }
    }

    /// Apply the layout to the display server
    ///
    /// The server is grabbed for the duration. Monitors are positioned
    /// around the primary, every monitor in the primary's graph is
    /// configured (off monitors are explicitly disabled), and the screen is
    /// resized last. A failed controller request is logged and the commit
    /// carries on.
    ///
    /// # Returns
    ///
    /// `None` without touching the server when no primary is set, otherwise
    /// a report of what was applied
    pub fn commit(&mut self) -> Option<CommitReport> {
        let Some(primary) = self.primary else {
            warn!("Commit requested without a primary monitor, nothing applied");
            return None;
        };

        let display = Arc::clone(self.resources.display());
        let mut report = CommitReport::default();

        if self.monitors[primary.0].is_off() {
            info!(
                "Primary {} is off, disabling it only",
                self.monitors[primary.0].interface_name()
            );
            self.apply(primary, &mut report);
            return Some(report);
        }

        if let Err(e) = display.grab() {
            error!("Failed to grab display server: {}", e);
            return Some(report);
        }

        layout::calculate_relative_positions(&mut self.monitors, primary);
        let size = layout::calculate_limits(&self.monitors, primary).screen_size();

        for id in self.layout_members() {
            self.apply(id, &mut report);
            if id == primary {
                if let Err(e) = display.set_output_primary(self.monitors[id.0].output_id()) {
                    warn!("Failed to mark primary output: {}", e);
                }
            }
        }

        match display.set_screen_size(size) {
            Ok(()) => report.screen_size = Some(size),
            Err(e) => error!(
                "Failed to resize screen to {}x{}: {}",
                size.width, size.height, e
            ),
        }

        if let Err(e) = display.ungrab() {
            error!("Failed to ungrab display server: {}", e);
        }

        info!(
            "Layout committed: {}x{} ({} applied, {} failed)",
            size.width, size.height, report.applied, report.failed
        );
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{ControllerId, ControllerInfo, DisplayCall, DryRunDisplay, OutputId};
    use crate::multimon::test_support::{active_display, mode, output};
    use crate::multimon::{MonitorState, Point};

    fn manager(display: &Arc<DryRunDisplay>) -> ConfigurationManager {
        ConfigurationManager::from_display(display.clone()).unwrap()
    }

    // ===== Lookup =====

    #[test]
    fn test_monitor_by_name() {
        let display = active_display(&[(1920, 1080), (1280, 800)]);
        let mgr = manager(&display);
        assert_eq!(mgr.monitor_by_name("OUT-1").unwrap(), MonitorId(1));
        assert!(matches!(
            mgr.monitor_by_name("HDMI-9"),
            Err(MultiMonitorError::UnknownOutput(_))
        ));
        assert_eq!(mgr.connected_monitors().len(), 2);
    }

    #[test]
    fn test_set_primary_moves_flag() {
        let display = active_display(&[(1920, 1080), (1280, 800)]);
        let mut mgr = manager(&display);
        mgr.set_primary(MonitorId(0)).unwrap();
        mgr.set_primary(MonitorId(1)).unwrap();
        assert!(!mgr.monitors()[0].is_primary());
        assert!(mgr.monitors()[1].is_primary());
        assert!(mgr.set_primary(MonitorId(5)).is_err());
    }

    #[test]
    fn test_self_neighbor_rejected() {
        let display = active_display(&[(1920, 1080)]);
        let mut mgr = manager(&display);
        assert!(matches!(
            mgr.set_right(MonitorId(0), Some(MonitorId(0))),
            Err(MultiMonitorError::SelfReference(_))
        ));
    }

    // ===== Commit =====

    #[test]
    fn test_commit_without_primary_touches_nothing() {
        let display = active_display(&[(1920, 1080), (1280, 1024)]);
        let mut mgr = manager(&display);
        mgr.set_right(MonitorId(0), Some(MonitorId(1))).unwrap();
        assert!(mgr.commit().is_none());
        assert_eq!(display.call_count(), 0);
    }

    #[test]
    fn test_commit_horizontal_pair() {
        let display = active_display(&[(1920, 1080), (1280, 1024)]);
        let mut mgr = manager(&display);
        mgr.set_primary(MonitorId(0)).unwrap();
        mgr.set_right(MonitorId(0), Some(MonitorId(1))).unwrap();

        let report = mgr.commit().unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(report.failed, 0);
        let size = report.screen_size.unwrap();
        assert_eq!((size.width, size.height), (3200, 1080));

        assert_eq!(mgr.monitors()[0].position(), Some(Point::new(0, 0)));
        assert_eq!(mgr.monitors()[1].position(), Some(Point::new(1920, 0)));

        let calls = display.calls();
        assert_eq!(calls.first(), Some(&DisplayCall::Grab));
        assert_eq!(calls.last(), Some(&DisplayCall::Ungrab));
        assert!(matches!(calls[calls.len() - 2], DisplayCall::SetScreenSize(_)));
        assert!(calls.contains(&DisplayCall::SetOutputPrimary(mgr.monitors()[0].output_id())));
    }

    #[test]
    fn test_commit_resizes_after_every_controller() {
        let display = active_display(&[(1920, 1080), (1280, 800), (1024, 768)]);
        let mut mgr = manager(&display);
        mgr.set_primary(MonitorId(0)).unwrap();
        mgr.set_left(MonitorId(0), Some(MonitorId(1))).unwrap();
        mgr.set_bottom(MonitorId(0), Some(MonitorId(2))).unwrap();
        mgr.commit().unwrap();

        let calls = display.calls();
        let resize = calls
            .iter()
            .position(|c| matches!(c, DisplayCall::SetScreenSize(_)))
            .unwrap();
        let last_config = calls
            .iter()
            .rposition(|c| matches!(c, DisplayCall::SetControllerConfig { .. }))
            .unwrap();
        assert!(last_config < resize);
    }

    #[test]
    fn test_commit_disables_off_monitor() {
        let display = active_display(&[(1920, 1080), (1280, 800)]);
        let mut mgr = manager(&display);
        mgr.set_primary(MonitorId(0)).unwrap();
        mgr.set_right(MonitorId(0), Some(MonitorId(1))).unwrap();
        mgr.turn_off(MonitorId(1)).unwrap();

        let report = mgr.commit().unwrap();
        assert_eq!(report.applied, 2);
        let disabled = display.controller_state(ControllerId(11)).unwrap();
        assert_eq!(disabled.mode, None);
        assert!(disabled.outputs.is_empty());
        let size = report.screen_size.unwrap();
        assert_eq!((size.width, size.height), (1920, 1080));
    }

    #[test]
    fn test_commit_continues_after_rejection() {
        let inner = Arc::try_unwrap(active_display(&[(1920, 1080), (1280, 800)])).unwrap();
        let display = Arc::new(inner.rejecting(ControllerId(11)));
        let mut mgr = manager(&display);
        mgr.set_primary(MonitorId(0)).unwrap();
        mgr.set_right(MonitorId(0), Some(MonitorId(1))).unwrap();

        let report = mgr.commit().unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.failed, 1);
        assert!(report.screen_size.is_some());
        assert_eq!(display.calls().last(), Some(&DisplayCall::Ungrab));
    }

    #[test]
    fn test_commit_with_primary_off_only_disables_primary() {
        let display = active_display(&[(1920, 1080), (1280, 800)]);
        let mut mgr = manager(&display);
        mgr.set_primary(MonitorId(0)).unwrap();
        mgr.set_right(MonitorId(0), Some(MonitorId(1))).unwrap();
        mgr.turn_off(MonitorId(0)).unwrap();

        let report = mgr.commit().unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.screen_size, None);
        assert_eq!(display.call_count(), 1);
    }

    #[test]
    fn test_commit_cyclic_layout_terminates() {
        let display = active_display(&[(1920, 1080), (1280, 800)]);
        let mut mgr = manager(&display);
        mgr.set_primary(MonitorId(0)).unwrap();
        mgr.set_right(MonitorId(0), Some(MonitorId(1))).unwrap();
        mgr.set_right(MonitorId(1), Some(MonitorId(0))).unwrap();

        let report = mgr.commit().unwrap();
        assert_eq!(report.applied, 2);
    }

    // ===== Mirroring =====

    fn mirror_display() -> Arc<DryRunDisplay> {
        let display = DryRunDisplay::new()
            .with_mode(mode(1, 1920, 1080))
            .with_mode(mode(2, 1280, 800))
            .with_mode(mode(3, 1024, 768))
            .with_controller(ControllerInfo::disabled(ControllerId(10)))
            .with_controller(ControllerInfo::disabled(ControllerId(11)))
            .with_controller(ControllerInfo::disabled(ControllerId(12)))
            .with_output(output(100, "LVDS-1", None, &[3, 2]))
            .with_output(output(101, "VGA-1", None, &[1, 3, 2]))
            .with_output(output(102, "DP-1", None, &[1]));
        Arc::new(display)
    }

    #[test]
    fn test_set_mirror_picks_first_common_mode() {
        let display = mirror_display();
        let mut mgr = manager(&display);
        for i in 0..2 {
            assert!(mgr.reconfigure(MonitorId(i)).unwrap());
        }
        mgr.set_output_mode(MonitorId(0), ModeId(3)).unwrap();

        mgr.set_mirror(MonitorId(0), Some(MonitorId(1))).unwrap();
        let source = &mgr.monitors()[0];
        let target = &mgr.monitors()[1];
        assert_eq!(source.output_mode().map(|m| m.id), Some(ModeId(2)));
        assert_eq!(target.output_mode().map(|m| m.id), Some(ModeId(2)));
        assert_eq!(source.position(), target.position());
        assert_eq!(source.mirror(), Some(MonitorId(1)));
    }

    #[test]
    fn test_set_mirror_without_common_mode() {
        let display = mirror_display();
        let mut mgr = manager(&display);
        mgr.reconfigure(MonitorId(0)).unwrap();
        mgr.reconfigure(MonitorId(2)).unwrap();
        assert!(matches!(
            mgr.set_mirror(MonitorId(0), Some(MonitorId(2))),
            Err(MultiMonitorError::NoCommonMode(_, _))
        ));
    }

    #[test]
    fn test_set_mirror_needs_controllers() {
        let display = mirror_display();
        let mut mgr = manager(&display);
        mgr.reconfigure(MonitorId(0)).unwrap();
        assert!(matches!(
            mgr.set_mirror(MonitorId(0), Some(MonitorId(1))),
            Err(MultiMonitorError::NoController(_))
        ));
    }

    #[test]
    fn test_commit_applies_mirror_after_source() {
        let display = mirror_display();
        let mut mgr = manager(&display);
        for i in 0..3 {
            mgr.reconfigure(MonitorId(i)).unwrap();
        }
        mgr.set_output_mode(MonitorId(2), ModeId(1)).unwrap();
        mgr.set_primary(MonitorId(2)).unwrap();
        mgr.set_left(MonitorId(2), Some(MonitorId(0))).unwrap();
        mgr.set_mirror(MonitorId(0), Some(MonitorId(1))).unwrap();

        assert_eq!(
            mgr.layout_members(),
            vec![MonitorId(2), MonitorId(0), MonitorId(1)]
        );

        let report = mgr.commit().unwrap();
        assert_eq!(report.applied, 3);
        assert_eq!(mgr.monitors()[0].position(), Some(Point::new(0, 0)));
        assert_eq!(mgr.monitors()[1].position(), Some(Point::new(0, 0)));
        assert_eq!(mgr.monitors()[2].position(), Some(Point::new(1280, 0)));
        let size = report.screen_size.unwrap();
        assert_eq!((size.width, size.height), (3200, 1080));
    }

    // ===== Pool =====

    #[test]
    fn test_reconfigure_runs_out_of_controllers() {
        let display = Arc::new(
            DryRunDisplay::new()
                .with_mode(mode(1, 1920, 1080))
                .with_controller(ControllerInfo::disabled(ControllerId(10)))
                .with_output(output(100, "LVDS-1", None, &[1]))
                .with_output(output(101, "VGA-1", None, &[1])),
        );
        let mut mgr = manager(&display);
        assert!(mgr.reconfigure(MonitorId(0)).unwrap());
        assert!(!mgr.reconfigure(MonitorId(1)).unwrap());
        assert_eq!(mgr.monitors()[1].state(), MonitorState::Unbound);

        mgr.release(MonitorId(0)).unwrap();
        assert!(mgr.reconfigure(MonitorId(1)).unwrap());
    }

    #[test]
    fn test_shared_controller_claimed_once() {
        // Controller 10 clones LVDS-1 onto VGA-1
        let display = Arc::new(
            DryRunDisplay::new()
                .with_mode(mode(1, 1024, 768))
                .with_controller(ControllerInfo {
                    id: ControllerId(10),
                    x: 0,
                    y: 0,
                    width: 1024,
                    height: 768,
                    mode: Some(ModeId(1)),
                    rotation: Rotation::Normal,
                    outputs: vec![OutputId(100), OutputId(101)],
                })
                .with_output(output(100, "LVDS-1", Some(10), &[1]))
                .with_output(output(101, "VGA-1", Some(10), &[1]))
                .with_output(output(102, "DP-1", None, &[1])),
        );
        let mut mgr = manager(&display);
        assert_eq!(mgr.monitors()[0].controller(), Some(ControllerId(10)));
        assert_eq!(mgr.monitors()[1].state(), MonitorState::Unbound);
        assert!(mgr.resources().available_controllers().is_empty());

        mgr.release(MonitorId(0)).unwrap();
        assert!(mgr.reconfigure(MonitorId(2)).unwrap());
        assert_eq!(mgr.monitors()[2].controller(), Some(ControllerId(10)));

        let holders = mgr
            .monitors()
            .iter()
            .filter(|m| m.controller() == Some(ControllerId(10)))
            .count();
        assert_eq!(holders, 1);
        assert!(!mgr.reconfigure(MonitorId(1)).unwrap());
    }
}
