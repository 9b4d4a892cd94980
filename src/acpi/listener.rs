//! Event source: lifecycle of the two listener threads

use std::io::Write;
use std::net::Shutdown;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::bus::EventBus;
use super::device::{run_device_listener, DeviceClassifier, DeviceEventStream, UdevDeviceStream};
use super::socket::{connect, run_socket_listener};
use super::{AcpiError, Result, SharedHandler};
use crate::hardware::{self, DockProbe};

/// Default acpid socket path
pub const ACPID_SOCKET_PATH: &str = "/var/run/acpid.socket";

/// Default maximum acpid line length
pub const DEFAULT_LINE_BUFFER_SIZE: usize = 128;

/// Default sysfs path prefix of per-CPU machine-check devices
pub const MACHINECHECK_PATH: &str = "/sys/devices/system/machinecheck/machinecheck";

/// Cooperative stop flag with a pollable wake-up descriptor
#[derive(Debug)]
pub struct StopSignal {
    stopped: AtomicBool,
    wake_tx: UnixStream,
    wake_rx: UnixStream,
}

impl StopSignal {
    /// New, un-raised signal
    pub fn new() -> Result<Self> {
        let (wake_tx, wake_rx) = UnixStream::pair()?;
        wake_rx.set_nonblocking(true)?;
        Ok(Self {
            stopped: AtomicBool::new(false),
            wake_tx,
            wake_rx,
        })
    }

    /// Raise the signal and wake anyone polling [`wake_fd`](Self::wake_fd)
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            if let Err(e) = (&self.wake_tx).write_all(&[1]) {
                warn!("Failed to wake device listener: {}", e);
            }
        }
    }

    /// Whether the signal has been raised
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Descriptor that becomes readable once the signal is raised
    pub fn wake_fd(&self) -> BorrowedFd<'_> {
        self.wake_rx.as_fd()
    }
}

/// Settings for [`AcpiEventSource`]
#[derive(Debug, Clone)]
pub struct AcpiSourceConfig {
    /// acpid socket path
    pub socket_path: PathBuf,
    /// Maximum acpid line length
    pub line_buffer_size: usize,
    /// Handler worker threads
    pub dispatch_workers: usize,
    /// Handler jobs that may wait for a worker
    pub dispatch_queue_depth: usize,
    /// Run the acpid socket listener
    pub enable_socket_listener: bool,
    /// Run the udev device listener
    pub enable_device_listener: bool,
    /// sysfs path of the dock device
    pub dock_path: String,
    /// sysfs path prefix of machine-check devices
    pub machinecheck_path: String,
    /// Wait before reading the dock state after a dock notification
    pub settle_delay: Duration,
}

impl Default for AcpiSourceConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(ACPID_SOCKET_PATH),
            line_buffer_size: DEFAULT_LINE_BUFFER_SIZE,
            dispatch_workers: 4,
            dispatch_queue_depth: 64,
            enable_socket_listener: true,
            enable_device_listener: true,
            dock_path: hardware::DOCK_SYSFS_PATH.to_string(),
            machinecheck_path: MACHINECHECK_PATH.to_string(),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// acpid and udev listeners feeding one [`EventBus`]
pub struct AcpiEventSource {
    config: AcpiSourceConfig,
    dock: Arc<dyn DockProbe>,
    bus: Arc<EventBus>,
    stop: Arc<StopSignal>,
    socket_slot: Arc<Mutex<Option<UnixStream>>>,
    socket_thread: Option<JoinHandle<()>>,
    device_thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for AcpiEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcpiEventSource")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .field("socket_listener", &self.socket_thread.is_some())
            .field("device_listener", &self.device_thread.is_some())
            .finish_non_exhaustive()
    }
}

impl AcpiEventSource {
    /// Create an idle event source
    ///
    /// # Arguments
    ///
    /// * `config` - Listener and dispatch settings
    /// * `dock` - Probe consulted on dock notifications
    ///
    /// # Errors
    ///
    /// Returns error if the dispatch workers or the stop signal cannot be created
    pub fn new(config: AcpiSourceConfig, dock: Arc<dyn DockProbe>) -> Result<Self> {
        let bus = Arc::new(EventBus::new(
            config.dispatch_workers,
            config.dispatch_queue_depth,
        )?);
        Ok(Self {
            config,
            dock,
            bus,
            stop: Arc::new(StopSignal::new()?),
            socket_slot: Arc::new(Mutex::new(None)),
            socket_thread: None,
            device_thread: None,
        })
    }

    /// Register a handler for every future event
    pub fn add_event_handler(&self, handler: SharedHandler) {
        self.bus.add_event_handler(handler);
    }

    /// Bus the listeners dispatch to
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Whether any listener thread is still running
    pub fn is_running(&self) -> bool {
        [&self.socket_thread, &self.device_thread]
            .into_iter()
            .flatten()
            .any(|t| !t.is_finished())
    }

    /// Start the listeners enabled in the configuration
    ///
    /// Failures are logged; a listener that cannot reach its event feed
    /// exits and the other keeps running.
    pub fn start(&mut self) {
        if self.config.enable_socket_listener {
            let path = self.config.socket_path.clone();
            if let Err(e) = self.start_socket_listener_with(move || connect(&path)) {
                error!("acpid listener not started: {}", e);
            }
        }
        if self.config.enable_device_listener {
            if let Err(e) = self.start_device_listener_with(UdevDeviceStream::open) {
                error!("Device listener not started: {}", e);
            }
        }
    }

    /// Start the socket listener on the stream returned by `connect`
    ///
    /// `connect` runs on the listener thread. If it fails the thread logs
    /// the error and exits.
    ///
    /// # Errors
    ///
    /// Returns error if the listener is already running, the source was
    /// stopped, or the thread cannot be spawned
    pub fn start_socket_listener_with<F>(&mut self, connect: F) -> Result<()>
    where
        F: FnOnce() -> Result<UnixStream> + Send + 'static,
    {
        self.check_startable(self.socket_thread.is_some(), "acpid")?;

        let bus = Arc::clone(&self.bus);
        let stop = Arc::clone(&self.stop);
        let slot = Arc::clone(&self.socket_slot);
        let line_capacity = self.config.line_buffer_size;

        let handle = thread::Builder::new()
            .name("acpi-socket".to_string())
            .spawn(move || {
                let stream = match connect() {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("{}. Is acpid running?", e);
                        return;
                    }
                };
                match stream.try_clone() {
                    Ok(clone) => *slot.lock() = Some(clone),
                    Err(e) => warn!("acpid stream cannot be interrupted on stop: {}", e),
                }
                if stop.is_stopped() {
                    return;
                }
                run_socket_listener(stream, line_capacity, &bus, &stop);
            })
            .map_err(|e| AcpiError::ThreadSpawn(format!("acpi-socket: {e}")))?;

        self.socket_thread = Some(handle);
        Ok(())
    }

    /// Start the device listener on the stream returned by `open`
    ///
    /// `open` runs on the listener thread. If it fails the thread logs the
    /// error and exits.
    ///
    /// # Errors
    ///
    /// Returns error if the listener is already running, the source was
    /// stopped, or the thread cannot be spawned
    pub fn start_device_listener_with<S, F>(&mut self, open: F) -> Result<()>
    where
        S: DeviceEventStream,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        self.check_startable(self.device_thread.is_some(), "device")?;

        let bus = Arc::clone(&self.bus);
        let stop = Arc::clone(&self.stop);
        let mut classifier = DeviceClassifier::new(
            Arc::clone(&self.dock),
            self.config.dock_path.clone(),
            self.config.machinecheck_path.clone(),
            self.config.settle_delay,
        );

        let handle = thread::Builder::new()
            .name("acpi-udev".to_string())
            .spawn(move || {
                let mut stream = match open() {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("Failed to open device monitor: {}", e);
                        return;
                    }
                };
                run_device_listener(&mut stream, &mut classifier, &bus, &stop);
            })
            .map_err(|e| AcpiError::ThreadSpawn(format!("acpi-udev: {e}")))?;

        self.device_thread = Some(handle);
        Ok(())
    }

    fn check_startable(&self, running: bool, name: &str) -> Result<()> {
        if self.stop.is_stopped() {
            return Err(AcpiError::ThreadSpawn(format!(
                "{name} listener: event source already stopped"
            )));
        }
        if running {
            return Err(AcpiError::ThreadSpawn(format!(
                "{name} listener already running"
            )));
        }
        Ok(())
    }

    /// Block until both listeners have exited on their own
    pub fn wait(&mut self) {
        self.join();
    }

    /// Stop both listeners and wait for them
    ///
    /// Handler jobs already queued still run; they are drained when the
    /// last reference to the bus is dropped.
    pub fn stop(&mut self) {
        if self.socket_thread.is_none() && self.device_thread.is_none() {
            self.stop.stop();
            return;
        }

        info!("Stopping ACPI event source");
        self.stop.stop();
        if let Some(stream) = self.socket_slot.lock().take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!("acpid stream shutdown: {}", e);
            }
        }
        self.join();
    }

    fn join(&mut self) {
        for (name, handle) in [
            ("acpi-socket", self.socket_thread.take()),
            ("acpi-udev", self.device_thread.take()),
        ] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    error!("{} listener panicked", name);
                }
            }
        }
    }
}

impl Drop for AcpiEventSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acpi::{AcpiEvent, DeviceNotification};
    use crate::hardware::MockDockProbe;
    use crossbeam_channel::{unbounded, Receiver};
    use std::time::Instant;

    fn source() -> (AcpiEventSource, Receiver<AcpiEvent>) {
        let config = AcpiSourceConfig {
            settle_delay: Duration::ZERO,
            ..AcpiSourceConfig::default()
        };
        let source = AcpiEventSource::new(config, Arc::new(MockDockProbe::new())).unwrap();
        let (tx, rx) = unbounded();
        source.add_event_handler(Arc::new(move |event: AcpiEvent| {
            let _ = tx.send(event);
        }));
        (source, rx)
    }

    #[test]
    fn test_stop_signal_wakes() {
        let stop = StopSignal::new().unwrap();
        assert!(!stop.is_stopped());
        stop.stop();
        stop.stop();
        assert!(stop.is_stopped());
        let mut buf = [0u8; 4];
        let n = std::io::Read::read(&mut &stop.wake_rx, &mut buf).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_socket_listener_end_to_end() {
        let (mut source, rx) = source();
        let (mut acpid, listener_end) = UnixStream::pair().unwrap();
        source
            .start_socket_listener_with(move || Ok(listener_end))
            .unwrap();

        acpid
            .write_all(b"button/lid LID close\nfoo/bar BAZ\n")
            .unwrap();
        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first, AcpiEvent::LidClosed);
        assert_eq!(second, AcpiEvent::Unknown);

        // acpid stays connected; stop must interrupt the blocked read
        let started = Instant::now();
        source.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!source.is_running());
    }

    #[test]
    fn test_socket_connect_failure_exits_thread() {
        let (mut source, _rx) = source();
        source
            .start_socket_listener_with(|| {
                Err(AcpiError::Udev("no acpid in test environment".into()))
            })
            .unwrap();
        source.wait();
        assert!(!source.is_running());
    }

    struct OneShot(Option<DeviceNotification>);

    impl DeviceEventStream for OneShot {
        fn next_notification(
            &mut self,
            stop: &StopSignal,
        ) -> Result<Option<DeviceNotification>> {
            if let Some(n) = self.0.take() {
                return Ok(Some(n));
            }
            while !stop.is_stopped() {
                thread::sleep(Duration::from_millis(5));
            }
            Ok(None)
        }
    }

    #[test]
    fn test_device_listener_until_stopped() {
        let (mut source, rx) = source();
        let notification = DeviceNotification::new(
            format!("{MACHINECHECK_PATH}1"),
            Some("remove"),
        );
        source
            .start_device_listener_with(move || Ok(OneShot(Some(notification))))
            .unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            AcpiEvent::PowerS3S4Enter
        );
        assert!(source.is_running());
        source.stop();
        assert!(!source.is_running());
    }

    #[test]
    fn test_cannot_start_twice_or_after_stop() {
        let (mut source, _rx) = source();
        source
            .start_device_listener_with(|| Ok(OneShot(None)))
            .unwrap();
        assert!(source
            .start_device_listener_with(|| Ok(OneShot(None)))
            .is_err());
        source.stop();
        assert!(source
            .start_socket_listener_with(|| Err(AcpiError::Udev("unused".into())))
            .is_err());
    }
}
