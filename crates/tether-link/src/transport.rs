//! Transport seam between the watchdog and the host serial stack
//!
//! The watchdog only ever talks to these traits, so tests can substitute a
//! scripted in-memory device for real hardware.

use std::io;
use std::time::Duration;

use serialport::SerialPort;
use tether_detect::PortScanner;

use crate::error::LinkError;

/// One handle on an open link
///
/// Read timeouts surface as `io::ErrorKind::TimedOut`, matching the
/// `serialport` crate's blocking read semantics. A timed-out or zero-length
/// read means nothing arrived; only other errors signal a dead link.
pub trait LinkPort: Send {
    /// Read available bytes, blocking up to the configured timeout
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all bytes and flush
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Clone the handle so another thread can write to the same link
    fn try_clone(&self) -> io::Result<Box<dyn LinkPort>>;
}

/// Presence checks and opens against one kind of device
pub trait Transport: Send + 'static {
    /// Whether the named port currently appears on the host
    fn is_present(&self, port: &str) -> bool;

    /// Open the named port with a bounded read timeout
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn LinkPort>, LinkError>;
}

/// Production transport backed by the host serial stack
pub struct SerialTransport {
    scanner: PortScanner,
}

impl SerialTransport {
    /// Create a transport over the host's serial ports
    pub fn new() -> Self {
        Self {
            scanner: PortScanner::new(),
        }
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SerialTransport {
    fn is_present(&self, port: &str) -> bool {
        self.scanner.is_present(port)
    }

    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn LinkPort>, LinkError> {
        let port = serialport::new(port, baud_rate)
            .timeout(read_timeout)
            .open()?;
        Ok(Box::new(SerialLink { port }))
    }
}

/// `LinkPort` over a blocking `serialport` handle
struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl LinkPort for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.port, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.port, data)?;
        io::Write::flush(&mut self.port)
    }

    fn try_clone(&self) -> io::Result<Box<dyn LinkPort>> {
        let port = self
            .port
            .try_clone()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Box::new(SerialLink { port }))
    }
}
