//! acpid line classification

use tracing::{trace, warn};

use super::AcpiEvent;

/// Substring patterns, in match order
///
/// Every pattern is tried; when more than one matches a line, the entry
/// furthest down the table decides.
const PATTERNS: &[(&str, AcpiEvent)] = &[
    ("button/power PBTN", AcpiEvent::ButtonPower),
    ("button/lid LID open", AcpiEvent::LidOpened),
    ("button/lid LID close", AcpiEvent::LidClosed),
    ("button/volumeup VOLUP", AcpiEvent::ButtonVolumeUp),
    ("button/volumedown VOLDN", AcpiEvent::ButtonVolumeDown),
    ("video/brightnessdown BRTDN", AcpiEvent::ButtonBrightnessDown),
    ("video/brightnessup BRTUP", AcpiEvent::ButtonBrightnessUp),
    ("button/f20 F20", AcpiEvent::ButtonMicMute),
    ("button/mute MUTE", AcpiEvent::ButtonMute),
    ("button/prog1 PROG1", AcpiEvent::ButtonThinkVantage),
    ("button/screenlock SCRNLCK", AcpiEvent::ButtonFnF2Lock),
    ("button/battery BAT", AcpiEvent::ButtonFnF3Battery),
    ("button/sleep SBTN", AcpiEvent::ButtonFnF4Sleep),
    ("button/wlan WLAN", AcpiEvent::ButtonFnF5Wlan),
    ("video/switchmode VMOD", AcpiEvent::ButtonFnF7Projector),
    ("button/suspend SUSP", AcpiEvent::ButtonFnF12Suspend),
    ("00000080 00004010", AcpiEvent::Docked),
    ("button/dock", AcpiEvent::Docked),
    ("00000080 00004011", AcpiEvent::Undocked),
    ("button/undock", AcpiEvent::Undocked),
    ("thermal_zone", AcpiEvent::ThermalZone),
];

/// Classify one acpid event line
pub fn classify_line(line: &str) -> AcpiEvent {
    PATTERNS
        .iter()
        .rev()
        .find(|(pattern, _)| line.contains(*pattern))
        .map_or(AcpiEvent::Unknown, |&(_, event)| event)
}

/// Splits a byte stream into newline-terminated lines of bounded length
///
/// A line that grows past the capacity is discarded up to and including its
/// terminating newline.
#[derive(Debug)]
pub struct LineAccumulator {
    buf: Vec<u8>,
    capacity: usize,
    discarding: bool,
}

impl LineAccumulator {
    /// New accumulator holding at most `capacity` bytes per line
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            discarding: false,
        }
    }

    /// Feed one byte; returns the completed line, without its newline
    pub fn push(&mut self, byte: u8) -> Option<String> {
        if byte == b'\n' {
            if std::mem::take(&mut self.discarding) {
                return None;
            }
            let line = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            trace!("acpid line: {:?}", line);
            return Some(line);
        }

        if self.discarding {
            return None;
        }
        if self.buf.len() >= self.capacity {
            warn!(
                "acpid line exceeds {} bytes, discarding it",
                self.capacity
            );
            self.buf.clear();
            self.discarding = true;
            return None;
        }
        self.buf.push(byte);
        None
    }

    /// Bytes buffered for the current line
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
