//! Kernel device notification listener
//!
//! Watches the `platform` and `machinecheck` subsystems. Dock devices are
//! re-probed through [`DockProbe`] because the attribute values udev carries
//! with the notification are not reliable. Machine-check devices disappear
//! one CPU at a time when the system suspends and reappear on resume; those
//! notifications are folded into a single enter/exit pair.

use std::os::fd::AsFd;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, info, trace, warn};

use super::bus::EventBus;
use super::listener::StopSignal;
use super::{AcpiError, AcpiEvent, Result};
use crate::hardware::DockProbe;

/// One device notification
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceNotification {
    /// sysfs path of the device
    pub syspath: String,
    /// Subsystem, e.g. `platform`
    pub subsystem: Option<String>,
    /// Action, e.g. `add` or `remove`
    pub action: Option<String>,
}

impl DeviceNotification {
    /// Notification for `syspath` with the given action
    pub fn new(syspath: impl Into<String>, action: Option<&str>) -> Self {
        Self {
            syspath: syspath.into(),
            subsystem: None,
            action: action.map(str::to_string),
        }
    }
}

/// Source of device notifications
pub trait DeviceEventStream {
    /// Block until the next notification
    ///
    /// Returns `Ok(None)` once `stop` has been raised or the stream is
    /// exhausted.
    fn next_notification(&mut self, stop: &StopSignal) -> Result<Option<DeviceNotification>>;
}

/// udev monitor filtered to `platform` and `machinecheck`
pub struct UdevDeviceStream {
    socket: udev::MonitorSocket,
}

impl UdevDeviceStream {
    /// Subscribe to kernel device notifications
    pub fn open() -> Result<Self> {
        let socket = udev::MonitorBuilder::new()
            .and_then(|b| b.match_subsystem("platform"))
            .and_then(|b| b.match_subsystem("machinecheck"))
            .and_then(|b| b.listen())
            .map_err(|e| AcpiError::Udev(e.to_string()))?;
        debug!("udev monitor listening on platform and machinecheck");
        Ok(Self { socket })
    }
}

impl DeviceEventStream for UdevDeviceStream {
    fn next_notification(&mut self, stop: &StopSignal) -> Result<Option<DeviceNotification>> {
        loop {
            if stop.is_stopped() {
                return Ok(None);
            }

            let (device_ready, woken) = {
                let mut fds = [
                    PollFd::new(self.socket.as_fd(), PollFlags::POLLIN),
                    PollFd::new(stop.wake_fd(), PollFlags::POLLIN),
                ];
                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) => {}
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(AcpiError::Poll(e)),
                }
                let readable =
                    |fd: &PollFd<'_>| fd.revents().is_some_and(|r| r.contains(PollFlags::POLLIN));
                (readable(&fds[0]), readable(&fds[1]))
            };

            if woken || stop.is_stopped() {
                return Ok(None);
            }
            if !device_ready {
                continue;
            }

            let Some(event) = self.socket.iter().next() else {
                trace!("udev: readiness without a device");
                continue;
            };
            let device = event.device();
            return Ok(Some(DeviceNotification {
                syspath: device.syspath().to_string_lossy().into_owned(),
                subsystem: device
                    .subsystem()
                    .map(|s| s.to_string_lossy().into_owned()),
                action: device.action().map(|a| a.to_string_lossy().into_owned()),
            }));
        }
    }
}

/// Maps device notifications to events
pub struct DeviceClassifier {
    dock: Arc<dyn DockProbe>,
    dock_path: String,
    machinecheck_path: String,
    settle_delay: Duration,
    entering_s3s4: bool,
}

impl std::fmt::Debug for DeviceClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClassifier")
            .field("dock_path", &self.dock_path)
            .field("machinecheck_path", &self.machinecheck_path)
            .field("settle_delay", &self.settle_delay)
            .field("entering_s3s4", &self.entering_s3s4)
            .finish_non_exhaustive()
    }
}

impl DeviceClassifier {
    /// Create a classifier
    ///
    /// # Arguments
    ///
    /// * `dock` - Probe consulted when a dock device changes
    /// * `dock_path` - sysfs path identifying dock notifications
    /// * `machinecheck_path` - sysfs path prefix of per-CPU machine-check devices
    /// * `settle_delay` - Wait before reading the dock state
    pub fn new(
        dock: Arc<dyn DockProbe>,
        dock_path: impl Into<String>,
        machinecheck_path: impl Into<String>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            dock,
            dock_path: dock_path.into(),
            machinecheck_path: machinecheck_path.into(),
            settle_delay,
            entering_s3s4: false,
        }
    }

    /// Whether a suspend was seen and no resume yet
    pub fn is_entering_s3s4(&self) -> bool {
        self.entering_s3s4
    }

    /// Classify one notification
    ///
    /// Returns `None` for notifications that must not be dispatched: dock
    /// changes while the dock does not probe sane, and repeated machine-check
    /// transitions. Unrelated devices yield [`AcpiEvent::Unknown`].
    pub fn classify(&mut self, notification: &DeviceNotification) -> Option<AcpiEvent> {
        let mut event = AcpiEvent::Unknown;

        if notification.syspath.contains(&self.dock_path) {
            if !self.dock.probe() {
                warn!(
                    "Device event on {} but the dock does not probe sane",
                    notification.syspath
                );
                return None;
            }
            if !self.settle_delay.is_zero() {
                thread::sleep(self.settle_delay);
            }
            event = if self.dock.is_docked() {
                AcpiEvent::Docked
            } else {
                AcpiEvent::Undocked
            };
        }

        if notification.syspath.contains(&self.machinecheck_path) {
            match notification.action.as_deref() {
                Some("remove") => {
                    if self.entering_s3s4 {
                        trace!("Ignoring {} removal, already entering S3/S4", notification.syspath);
                        return None;
                    }
                    self.entering_s3s4 = true;
                    event = AcpiEvent::PowerS3S4Enter;
                }
                Some("add") => {
                    if !self.entering_s3s4 {
                        trace!("Ignoring {} addition outside S3/S4", notification.syspath);
                        return None;
                    }
                    self.entering_s3s4 = false;
                    event = AcpiEvent::PowerS3S4Exit;
                }
                _ => {}
            }
        }

        Some(event)
    }
}

/// Pull notifications from `stream`, classify and dispatch them
///
/// Runs until `stop` is raised or the stream fails. Returns the number of
/// events dispatched.
pub fn run_device_listener<S: DeviceEventStream>(
    stream: &mut S,
    classifier: &mut DeviceClassifier,
    bus: &EventBus,
    stop: &StopSignal,
) -> u64 {
    let mut dispatched = 0u64;
    info!("Device listener running");

    loop {
        let notification = match stream.next_notification(stop) {
            Ok(Some(n)) => n,
            Ok(None) => break,
            Err(e) => {
                warn!("Device listener stopping: {}", e);
                break;
            }
        };
        if stop.is_stopped() {
            break;
        }

        trace!(
            "udev: {} {:?}",
            notification.syspath,
            notification.action
        );
        if let Some(event) = classifier.classify(&notification) {
            debug!("udev: {} -> {}", notification.syspath, event);
            bus.dispatch(event);
            dispatched += 1;
        }
    }

    info!("Device listener stopped after {} events", dispatched);
    dispatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockDockProbe;
    use std::collections::VecDeque;

    const DOCK: &str = "/sys/devices/platform/dock.2";
    const MCE: &str = "/sys/devices/system/machinecheck/machinecheck";

    fn classifier(dock: MockDockProbe) -> DeviceClassifier {
        DeviceClassifier::new(Arc::new(dock), DOCK, MCE, Duration::ZERO)
    }

    fn mce(cpu: u32, action: &str) -> DeviceNotification {
        DeviceNotification::new(format!("{MCE}{cpu}"), Some(action))
    }

    // ===== Dock =====

    #[test]
    fn test_dock_reprobed() {
        let mut dock = MockDockProbe::new();
        dock.expect_probe().times(2).return_const(true);
        let mut states = [true, false].into_iter();
        dock.expect_is_docked()
            .times(2)
            .returning(move || states.next().unwrap_or(false));
        let mut c = classifier(dock);

        let n = DeviceNotification::new(DOCK, Some("change"));
        assert_eq!(c.classify(&n), Some(AcpiEvent::Docked));
        assert_eq!(c.classify(&n), Some(AcpiEvent::Undocked));
    }

    #[test]
    fn test_insane_dock_not_dispatched() {
        let mut dock = MockDockProbe::new();
        dock.expect_probe().return_const(false);
        dock.expect_is_docked().never();
        let mut c = classifier(dock);
        assert_eq!(c.classify(&DeviceNotification::new(DOCK, Some("change"))), None);
    }

    #[test]
    fn test_unrelated_device_is_unknown() {
        let mut dock = MockDockProbe::new();
        dock.expect_probe().never();
        let mut c = classifier(dock);
        let n = DeviceNotification::new("/sys/devices/platform/thinkpad_acpi", Some("change"));
        assert_eq!(c.classify(&n), Some(AcpiEvent::Unknown));
    }

    // ===== S3/S4 debounce =====

    #[test]
    fn test_s3s4_debounce() {
        let mut c = classifier(MockDockProbe::new());

        assert_eq!(c.classify(&mce(1, "remove")), Some(AcpiEvent::PowerS3S4Enter));
        assert!(c.is_entering_s3s4());
        assert_eq!(c.classify(&mce(2, "remove")), None);
        assert_eq!(c.classify(&mce(3, "remove")), None);

        assert_eq!(c.classify(&mce(1, "add")), Some(AcpiEvent::PowerS3S4Exit));
        assert!(!c.is_entering_s3s4());
        assert_eq!(c.classify(&mce(2, "add")), None);
        assert_eq!(c.classify(&mce(3, "add")), None);
    }

    #[test]
    fn test_add_without_remove_ignored() {
        let mut c = classifier(MockDockProbe::new());
        assert_eq!(c.classify(&mce(1, "add")), None);
    }

    #[test]
    fn test_machinecheck_other_action_is_unknown() {
        let mut c = classifier(MockDockProbe::new());
        assert_eq!(c.classify(&mce(1, "change")), Some(AcpiEvent::Unknown));
    }

    // ===== Listener loop =====

    struct Scripted(VecDeque<DeviceNotification>);

    impl DeviceEventStream for Scripted {
        fn next_notification(
            &mut self,
            _stop: &StopSignal,
        ) -> Result<Option<DeviceNotification>> {
            Ok(self.0.pop_front())
        }
    }

    #[test]
    fn test_listener_dispatches_debounced_stream() {
        let bus = EventBus::new(1, 32).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        bus.add_event_handler(Arc::new(move |event: AcpiEvent| {
            let _ = tx.send(event);
        }));
        let stop = StopSignal::new().unwrap();

        let mut stream = Scripted(
            [mce(1, "remove"), mce(2, "remove"), mce(1, "add"), mce(2, "add")]
                .into_iter()
                .collect(),
        );
        let mut c = classifier(MockDockProbe::new());
        assert_eq!(run_device_listener(&mut stream, &mut c, &bus, &stop), 2);

        bus.shutdown();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events, vec![AcpiEvent::PowerS3S4Enter, AcpiEvent::PowerS3S4Exit]);
    }
}
