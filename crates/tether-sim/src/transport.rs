//! Scriptable simulated transport
//!
//! `SimTransport` implements the watchdog's transport seam over an
//! in-memory device. All clones share one device, so a test keeps a clone
//! as its control handle while the watchdog owns another.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tether_link::{LinkError, LinkPort, Transport};
use tracing::debug;

/// Scripted device state shared by the control handle and open ports
#[derive(Default)]
struct DeviceState {
    /// Whether the device is plugged in
    present: bool,
    /// Whether open attempts succeed while present
    accept_opens: bool,
    /// Bytes queued for delivery to reads
    rx: VecDeque<u8>,
    /// Bytes captured from writes
    written: Vec<u8>,
    /// Force the next read to fail with an I/O error
    fail_next_read: bool,
    /// Force the next read to return zero bytes without an error
    zero_next_read: bool,
    /// Total successful opens
    opens: u32,
    /// Total closed connections
    closes: u32,
    /// Connections open right now
    open_links: u32,
    /// Highest number of simultaneously open connections observed
    max_open_links: u32,
}

struct Shared {
    state: Mutex<DeviceState>,
    readable: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A simulated serial device implementing the watchdog transport seam
///
/// Starts unplugged; opens are admitted by default once the device is
/// present.
#[derive(Clone)]
pub struct SimTransport {
    shared: Arc<Shared>,
}

impl SimTransport {
    /// Create a device that is initially absent
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DeviceState {
                    accept_opens: true,
                    ..DeviceState::default()
                }),
                readable: Condvar::new(),
            }),
        }
    }

    /// Plug or unplug the device
    ///
    /// Unplugging wakes blocked reads, which then fail the way reads
    /// against a vanished device do.
    pub fn set_present(&self, present: bool) {
        self.shared.lock().present = present;
        self.shared.readable.notify_all();
    }

    /// Control whether open attempts succeed while the device is present
    pub fn set_accept_opens(&self, accept: bool) {
        self.shared.lock().accept_opens = accept;
    }

    /// Queue bytes for delivery to subsequent reads
    pub fn feed(&self, data: &[u8]) {
        self.shared.lock().rx.extend(data);
        self.shared.readable.notify_all();
    }

    /// Make the next read fail with an I/O error
    pub fn fail_next_read(&self) {
        self.shared.lock().fail_next_read = true;
        self.shared.readable.notify_all();
    }

    /// Make the next read return zero bytes without an error
    pub fn zero_next_read(&self) {
        self.shared.lock().zero_next_read = true;
        self.shared.readable.notify_all();
    }

    /// All bytes written to the device so far
    pub fn written(&self) -> Vec<u8> {
        self.shared.lock().written.clone()
    }

    /// Total successful opens
    pub fn open_count(&self) -> u32 {
        self.shared.lock().opens
    }

    /// Total closed connections
    pub fn close_count(&self) -> u32 {
        self.shared.lock().closes
    }

    /// Connections open right now
    pub fn currently_open(&self) -> u32 {
        self.shared.lock().open_links
    }

    /// Highest number of simultaneously open connections observed
    pub fn max_concurrent_opens(&self) -> u32 {
        self.shared.lock().max_open_links
    }
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimTransport {
    fn is_present(&self, _port: &str) -> bool {
        self.shared.lock().present
    }

    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn LinkPort>, LinkError> {
        let mut state = self.shared.lock();
        if !state.present || !state.accept_opens {
            debug!("Refused open of simulated device {}", port);
            return Err(LinkError::OpenFailed {
                port: port.to_string(),
                reason: "device refused open".to_string(),
            });
        }

        state.opens += 1;
        state.open_links += 1;
        state.max_open_links = state.max_open_links.max(state.open_links);
        drop(state);

        debug!("Opened simulated device {}", port);
        Ok(Box::new(SimPort {
            connection: Arc::new(Connection {
                shared: Arc::clone(&self.shared),
            }),
            shared: Arc::clone(&self.shared),
            read_timeout,
        }))
    }
}

/// Accounting token shared by every handle cloned from one open
///
/// The connection counts as closed when the last handle drops, so a
/// watchdog's reader and its writer clone together count as one open.
struct Connection {
    shared: Arc<Shared>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.closes += 1;
        state.open_links = state.open_links.saturating_sub(1);
    }
}

/// One handle on an open simulated connection
struct SimPort {
    shared: Arc<Shared>,
    connection: Arc<Connection>,
    read_timeout: Duration,
}

impl LinkPort for SimPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = Instant::now() + self.read_timeout;
        let mut state = self.shared.lock();

        loop {
            if state.fail_next_read || !state.present {
                state.fail_next_read = false;
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "device unplugged",
                ));
            }
            if state.zero_next_read {
                state.zero_next_read = false;
                return Ok(0);
            }
            if !state.rx.is_empty() {
                let n = buf.len().min(state.rx.len());
                for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
            }
            let (guard, _) = self
                .shared
                .readable
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = guard;
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.shared.lock();
        if !state.present {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device unplugged",
            ));
        }
        state.written.extend_from_slice(data);
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn LinkPort>> {
        Ok(Box::new(SimPort {
            shared: Arc::clone(&self.shared),
            connection: Arc::clone(&self.connection),
            read_timeout: self.read_timeout,
        }))
    }
}
