//! Deadline-bounded line I/O over a serial port.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};
use serialport::{ClearBuffer, SerialPort};

use super::error::DeviceError;

/// Per-read timeout configured on real serial ports. Reads block at most this
/// long before the link re-checks its own deadline.
pub const PORT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Back-off when a port reports no data without blocking
const IDLE_POLL: Duration = Duration::from_millis(1);

/// A byte stream the link can drive.
///
/// Reads returning [`io::ErrorKind::TimedOut`] or [`io::ErrorKind::WouldBlock`]
/// mean "no data yet"; any other error is treated as a lost connection.
pub trait Port: Read + Write + Send {
    /// Discard anything the device sent that has not been read yet
    fn clear_input(&mut self) -> io::Result<()>;
}

impl Port for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Line and prompt oriented reader/writer over a [`Port`]
pub struct SerialLink<P> {
    port: P,
    name: String,
    pending: Vec<u8>,
}

impl<P: Port> SerialLink<P> {
    /// Wrap a port; `name` is used in log messages
    pub fn new(port: P, name: impl Into<String>) -> Self {
        Self {
            port,
            name: name.into(),
            pending: Vec::new(),
        }
    }

    /// Port name (device path for real ports)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write `text` verbatim and flush
    pub fn send(&mut self, text: &str) -> Result<(), DeviceError> {
        trace!("{} <- {:?}", self.name, text);
        self.port.write_all(text.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one line, without its terminator.
    ///
    /// Returns `Ok(None)` when no complete line arrives before `timeout`.
    pub fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, DeviceError> {
        Ok(self
            .read_until(b"\n", timeout)?
            .map(|line| line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Read everything up to (and consuming) `marker`.
    ///
    /// The returned text excludes the marker. Returns `Ok(None)` on timeout,
    /// leaving partial data buffered.
    pub fn read_until(
        &mut self,
        marker: &[u8],
        timeout: Duration,
    ) -> Result<Option<String>, DeviceError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(pos) = find(&self.pending, marker) {
                let chunk: Vec<u8> = self.pending.drain(..pos + marker.len()).collect();
                let text = String::from_utf8_lossy(&chunk[..pos]).into_owned();
                trace!("{} -> {:?}", self.name, text);
                return Ok(Some(text));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            if !self.fill()? {
                thread::sleep(IDLE_POLL);
            }
        }
    }

    /// Collect further non-empty lines until the port stays silent for `quiet`
    pub fn drain_lines(&mut self, quiet: Duration) -> Result<Vec<String>, DeviceError> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line(quiet)? {
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        Ok(lines)
    }

    /// Drop buffered input, both ours and the port's
    pub fn clear_input(&mut self) -> Result<(), DeviceError> {
        if !self.pending.is_empty() {
            trace!(
                "{} discarding {} buffered bytes",
                self.name,
                self.pending.len()
            );
            self.pending.clear();
        }
        self.port.clear_input()?;
        Ok(())
    }

    /// Give back the underlying port
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Pull whatever the port has into `pending`; false when nothing arrived
    fn fill(&mut self) -> Result<bool, DeviceError> {
        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    return Ok(false)
                }
                Err(e) => return Err(DeviceError::IoError(e)),
            }
        }
    }
}

/// Open a real serial port with the link's read timeout
pub fn open_serial(name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, DeviceError> {
    debug!("Opening {} at {} baud", name, baud_rate);
    Ok(serialport::new(name, baud_rate)
        .timeout(PORT_READ_TIMEOUT)
        .open()?)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
