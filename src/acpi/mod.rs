//! ACPI and udev Event Dispatch
//!
//! Turns two independent kernel event feeds into one stream of [`AcpiEvent`]
//! values delivered to every registered handler.
//!
//! # Architecture
//!
//! ```text
//!  acpid socket ──► socket listener ──┐
//!   (text lines)    (line classifier) │
//!                                     ├──► EventBus ──► worker pool ──► handlers
//!  udev monitor ──► device listener ──┘    (bounded queue, drop-on-full)
//!  (platform,       (dock re-probe,
//!   machinecheck)    S3/S4 debounce)
//! ```
//!
//! Each listener runs on its own thread and preserves the order of its own
//! input; the two listeners are not ordered relative to each other. Every
//! handler receives each event as a separate job, so a slow handler never
//! holds up the listeners or the other handlers.
//!
//! # Shutdown
//!
//! [`AcpiEventSource::stop`] raises a stop flag, wakes the device listener
//! out of `poll(2)` and shuts the acpid stream down to unblock the socket
//! reader, then joins both threads. Dropping the [`EventBus`] lets the
//! workers finish jobs already queued before they are joined.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub mod bus;
pub mod classify;
pub mod device;
pub mod listener;
pub mod socket;

pub use bus::{DispatchStats, EventBus};
pub use classify::{classify_line, LineAccumulator};
pub use device::{DeviceClassifier, DeviceEventStream, DeviceNotification, UdevDeviceStream};
pub use listener::{AcpiEventSource, AcpiSourceConfig, StopSignal};

/// ACPI error types
#[derive(Error, Debug)]
pub enum AcpiError {
    /// Could not connect to the acpid socket
    #[error("Failed to connect to acpid socket {path}: {source}")]
    SocketConnect {
        /// Socket path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// udev monitor setup or receive failed
    #[error("udev error: {0}")]
    Udev(String),

    /// Waiting for device readiness failed
    #[error("poll failed: {0}")]
    Poll(#[from] nix::errno::Errno),

    /// A worker or listener thread could not be started
    #[error("Thread spawn failed: {0}")]
    ThreadSpawn(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ACPI operations
pub type Result<T> = std::result::Result<T, AcpiError>;

/// Normalised hardware event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcpiEvent {
    /// CPUs going offline for suspend or hibernate
    PowerS3S4Enter,
    /// CPUs back online after resume
    PowerS3S4Exit,
    /// Lid closed
    LidClosed,
    /// Lid opened
    LidOpened,
    /// Machine placed in the dock
    Docked,
    /// Machine removed from the dock
    Undocked,
    /// Power button
    ButtonPower,
    /// Volume up key
    ButtonVolumeUp,
    /// Volume down key
    ButtonVolumeDown,
    /// Microphone mute key
    ButtonMicMute,
    /// Speaker mute key
    ButtonMute,
    /// ThinkVantage key
    ButtonThinkVantage,
    /// Fn+F2 (lock)
    ButtonFnF2Lock,
    /// Fn+F3 (battery)
    ButtonFnF3Battery,
    /// Fn+F4 (sleep)
    ButtonFnF4Sleep,
    /// Fn+F5 (wireless)
    ButtonFnF5Wlan,
    /// Fn+F7 (projector)
    ButtonFnF7Projector,
    /// Fn+F12 (suspend)
    ButtonFnF12Suspend,
    /// Brightness up key
    ButtonBrightnessUp,
    /// Brightness down key
    ButtonBrightnessDown,
    /// Thermal zone notification
    ThermalZone,
    /// Anything not recognised
    Unknown,
}

impl AcpiEvent {
    /// Whether this event was recognised
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    /// Stable upper-case name, e.g. `LID_CLOSED`
    pub fn name(self) -> &'static str {
        match self {
            Self::PowerS3S4Enter => "POWER_S3S4_ENTER",
            Self::PowerS3S4Exit => "POWER_S3S4_EXIT",
            Self::LidClosed => "LID_CLOSED",
            Self::LidOpened => "LID_OPENED",
            Self::Docked => "DOCKED",
            Self::Undocked => "UNDOCKED",
            Self::ButtonPower => "BUTTON_POWER",
            Self::ButtonVolumeUp => "BUTTON_VOLUME_UP",
            Self::ButtonVolumeDown => "BUTTON_VOLUME_DOWN",
            Self::ButtonMicMute => "BUTTON_MICMUTE",
            Self::ButtonMute => "BUTTON_MUTE",
            Self::ButtonThinkVantage => "BUTTON_THINKVANTAGE",
            Self::ButtonFnF2Lock => "BUTTON_FNF2_LOCK",
            Self::ButtonFnF3Battery => "BUTTON_FNF3_BATTERY",
            Self::ButtonFnF4Sleep => "BUTTON_FNF4_SLEEP",
            Self::ButtonFnF5Wlan => "BUTTON_FNF5_WLAN",
            Self::ButtonFnF7Projector => "BUTTON_FNF7_PROJECTOR",
            Self::ButtonFnF12Suspend => "BUTTON_FNF12_SUSPEND",
            Self::ButtonBrightnessUp => "BUTTON_BRIGHTNESS_UP",
            Self::ButtonBrightnessDown => "BUTTON_BRIGHTNESS_DOWN",
            Self::ThermalZone => "THERMAL_ZONE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for AcpiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receiver of [`AcpiEvent`]s
///
/// Handlers are called from worker threads, possibly several at once, and
/// must tolerate [`AcpiEvent::Unknown`].
pub trait AcpiEventHandler: Send + Sync {
    /// Handle one event
    fn handle_event(&self, event: AcpiEvent);
}

impl<F> AcpiEventHandler for F
where
    F: Fn(AcpiEvent) + Send + Sync,
{
    fn handle_event(&self, event: AcpiEvent) {
        self(event)
    }
}

/// Shared handler reference as stored by the bus
pub type SharedHandler = Arc<dyn AcpiEventHandler>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_names() {
        assert_eq!(AcpiEvent::LidClosed.to_string(), "LID_CLOSED");
        assert_eq!(AcpiEvent::PowerS3S4Enter.name(), "POWER_S3S4_ENTER");
        assert!(!AcpiEvent::Unknown.is_known());
        assert!(AcpiEvent::Docked.is_known());
    }

    #[test]
    fn test_closure_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handler: SharedHandler = Arc::new(move |event: AcpiEvent| {
            if event == AcpiEvent::ButtonMute {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        handler.handle_event(AcpiEvent::ButtonMute);
        handler.handle_event(AcpiEvent::Unknown);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
