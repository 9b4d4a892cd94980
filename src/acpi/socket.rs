//! acpid socket listener

use std::io::{ErrorKind, Read};
use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::{debug, info, warn};

use super::bus::EventBus;
use super::classify::{classify_line, LineAccumulator};
use super::listener::StopSignal;
use super::{AcpiError, Result};

const READ_CHUNK: usize = 256;

/// Open the acpid event socket
pub fn connect(path: &Path) -> Result<UnixStream> {
    UnixStream::connect(path).map_err(|source| AcpiError::SocketConnect {
        path: path.display().to_string(),
        source,
    })
}

/// Read acpid lines from `reader` and dispatch one event per line
///
/// Runs until the stream ends, a read fails or `stop` is raised. Lines that
/// match no pattern are dispatched as [`AcpiEvent::Unknown`]. Returns the
/// number of events dispatched.
///
/// [`AcpiEvent::Unknown`]: super::AcpiEvent::Unknown
pub fn run_socket_listener<R: Read>(
    mut reader: R,
    line_capacity: usize,
    bus: &EventBus,
    stop: &StopSignal,
) -> u64 {
    let mut lines = LineAccumulator::new(line_capacity);
    let mut chunk = [0u8; READ_CHUNK];
    let mut dispatched = 0u64;

    info!("acpid listener running");
    while !stop.is_stopped() {
        let n = match reader.read(&mut chunk) {
            Ok(0) => {
                if !stop.is_stopped() {
                    warn!("acpid closed the event socket");
                }
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                if stop.is_stopped() {
                    debug!("acpid read interrupted by shutdown: {}", e);
                } else {
                    warn!("acpid read failed: {}", e);
                }
                break;
            }
        };

        for &byte in &chunk[..n] {
            if let Some(line) = lines.push(byte) {
                let event = classify_line(&line);
                debug!("acpid: {:?} -> {}", line, event);
                bus.dispatch(event);
                dispatched += 1;
            }
        }
    }

    info!("acpid listener stopped after {} events", dispatched);
    dispatched
}
