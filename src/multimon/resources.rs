//! Screen resource snapshot and controller pool
//!
//! Enumerates the server's controllers, outputs and modes once and hands out
//! free controllers to monitors that need one.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::Result;
use crate::display::{ControllerId, ControllerInfo, DisplayServer, ModeId, ModeInfo, OutputId};

/// Resources of one screen plus the pool of unclaimed controllers
pub struct ScreenResourceSet {
    display: Arc<dyn DisplayServer>,
    config_timestamp: u32,
    controllers: Vec<ControllerId>,
    outputs: Vec<OutputId>,
    modes: Vec<Arc<ModeInfo>>,
    controller_infos: HashMap<ControllerId, ControllerInfo>,
    available: Vec<ControllerId>,
}

impl std::fmt::Debug for ScreenResourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenResourceSet")
            .field("config_timestamp", &self.config_timestamp)
            .field("controllers", &self.controllers)
            .field("outputs", &self.outputs)
            .field("modes", &self.modes.len())
            .field("available", &self.available)
            .finish()
    }
}

impl ScreenResourceSet {
    /// Enumerate the screen resources of `display`
    ///
    /// Every controller starts out available; monitors claim the ones they
    /// are already bound to when they are built.
    pub fn new(display: Arc<dyn DisplayServer>) -> Result<Self> {
        let snapshot = display.screen_resources()?;

        let mut controller_infos = HashMap::with_capacity(snapshot.controllers.len());
        for &controller in &snapshot.controllers {
            match display.controller_info(controller, snapshot.config_timestamp) {
                Ok(info) => {
                    controller_infos.insert(controller, info);
                }
                Err(e) => warn!("Failed to query {}: {}", controller, e),
            }
        }

        debug!(
            "Screen resources: {} controllers, {} outputs, {} modes",
            snapshot.controllers.len(),
            snapshot.outputs.len(),
            snapshot.modes.len()
        );

        Ok(Self {
            display,
            config_timestamp: snapshot.config_timestamp,
            available: snapshot.controllers.clone(),
            controllers: snapshot.controllers,
            outputs: snapshot.outputs,
            modes: snapshot.modes.into_iter().map(Arc::new).collect(),
            controller_infos,
        })
    }

    /// Display server the resources came from
    pub fn display(&self) -> &Arc<dyn DisplayServer> {
        &self.display
    }

    /// Timestamp to pass with configuration requests
    pub fn config_timestamp(&self) -> u32 {
        self.config_timestamp
    }

    /// All controllers in enumeration order
    pub fn controllers(&self) -> &[ControllerId] {
        &self.controllers
    }

    /// All outputs in enumeration order
    pub fn outputs(&self) -> &[OutputId] {
        &self.outputs
    }

    /// All modes in enumeration order
    pub fn modes(&self) -> &[Arc<ModeInfo>] {
        &self.modes
    }

    /// Look up a mode by id
    pub fn mode(&self, id: ModeId) -> Option<&Arc<ModeInfo>> {
        self.modes.iter().find(|m| m.id == id)
    }

    /// Configuration of a controller as it was at enumeration time
    pub fn controller_info(&self, controller: ControllerId) -> Option<&ControllerInfo> {
        self.controller_infos.get(&controller)
    }

    /// Controllers not claimed by any monitor
    pub fn available_controllers(&self) -> &[ControllerId] {
        &self.available
    }

    /// Claim the first free controller
    pub fn request_controller(&mut self) -> Option<ControllerId> {
        if self.available.is_empty() {
            return None;
        }
        let controller = self.available.remove(0);
        debug!("Handing out {}", controller);
        Some(controller)
    }

    /// Return a controller to the pool
    ///
    /// Releasing a controller twice, or one this screen does not own, is
    /// ignored.
    pub fn release_controller(&mut self, controller: ControllerId) {
        if !self.controllers.contains(&controller) {
            warn!("Ignoring release of unknown {}", controller);
            return;
        }
        if self.available.contains(&controller) {
            debug!("{} already released", controller);
            return;
        }
        self.available.push(controller);
    }

    /// Remove a controller from the pool because it is already in use
    ///
    /// Returns `false` if the controller was not in the pool, i.e. it is
    /// already claimed or does not belong to this screen.
    pub fn mark_controller_as_busy(&mut self, controller: ControllerId) -> bool {
        let before = self.available.len();
        self.available.retain(|&c| c != controller);
        self.available.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DryRunDisplay;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn resources(count: u32) -> ScreenResourceSet {
        let mut display = DryRunDisplay::new();
        for id in 1..=count {
            display = display.with_controller(ControllerInfo::disabled(ControllerId(id)));
        }
        ScreenResourceSet::new(Arc::new(display)).unwrap()
    }

    #[test]
    fn test_request_in_enumeration_order() {
        let mut res = resources(3);
        assert_eq!(res.request_controller(), Some(ControllerId(1)));
        assert_eq!(res.request_controller(), Some(ControllerId(2)));
        assert_eq!(res.request_controller(), Some(ControllerId(3)));
        assert_eq!(res.request_controller(), None);
    }

    #[test]
    fn test_release_returns_to_pool() {
        let mut res = resources(1);
        let c = res.request_controller().unwrap();
        assert!(res.request_controller().is_none());
        res.release_controller(c);
        assert_eq!(res.request_controller(), Some(c));
    }

    #[test]
    fn test_double_release_ignored() {
        let mut res = resources(2);
        res.release_controller(ControllerId(1));
        res.release_controller(ControllerId(99));
        assert_eq!(res.available_controllers().len(), 2);
    }

    #[test]
    fn test_mark_busy() {
        let mut res = resources(2);
        assert!(res.mark_controller_as_busy(ControllerId(1)));
        assert_eq!(res.available_controllers(), &[ControllerId(2)]);
        assert!(!res.mark_controller_as_busy(ControllerId(1)));
        assert!(!res.mark_controller_as_busy(ControllerId(99)));
    }

    #[derive(Debug, Clone)]
    enum PoolOp {
        Request,
        Release(usize),
        MarkBusy(u32),
    }

    fn pool_op() -> impl Strategy<Value = PoolOp> {
        prop_oneof![
            Just(PoolOp::Request),
            (0usize..8).prop_map(PoolOp::Release),
            (1u32..6).prop_map(PoolOp::MarkBusy),
        ]
    }

    proptest! {
        #[test]
        fn prop_controller_never_handed_out_twice(ops in prop::collection::vec(pool_op(), 0..64)) {
            let mut res = resources(5);
            let mut held: Vec<ControllerId> = Vec::new();
            let mut busy: HashSet<ControllerId> = HashSet::new();

            for op in ops {
                match op {
                    PoolOp::Request => {
                        if let Some(c) = res.request_controller() {
                            prop_assert!(!held.contains(&c));
                            prop_assert!(!busy.contains(&c));
                            held.push(c);
                        }
                    }
                    PoolOp::Release(i) => {
                        if !held.is_empty() {
                            let c = held.remove(i % held.len());
                            res.release_controller(c);
                        }
                    }
                    PoolOp::MarkBusy(id) => {
                        let c = ControllerId(id);
                        let free = !held.contains(&c) && !busy.contains(&c);
                        prop_assert_eq!(res.mark_controller_as_busy(c), free);
                        if free {
                            busy.insert(c);
                        }
                    }
                }
                let available: HashSet<_> = res.available_controllers().iter().copied().collect();
                prop_assert_eq!(available.len(), res.available_controllers().len());
                for c in held.iter().chain(&busy) {
                    prop_assert!(!available.contains(c));
                }
                prop_assert_eq!(available.len() + held.len() + busy.len(), 5);
            }
        }
    }
}
