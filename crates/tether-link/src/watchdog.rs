//! Link watchdog: the connection-lifecycle state machine
//!
//! One background loop per watched port owns the open handle and walks a
//! small state machine: wait for enablement, poll until the port appears,
//! open it, then read with a bounded timeout until the device fails. The
//! loop is the sole opener and closer of the handle; the one exception is
//! `send`, which writes through a narrowly locked clone on the caller's
//! thread.
//!
//! The loop runs for the lifetime of the driver. Dropping the `LinkWatchdog`
//! handle disconnects the control channel, and the loop closes any open link
//! and exits at its next polling point.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::events::StatusEvent;
use crate::transport::{LinkPort, SerialTransport, Transport};

/// Read buffer size for one pass through the connected state
const READ_BUFFER_SIZE: usize = 512;

/// Shared slot holding a writable clone of the currently open link
///
/// The loop installs a clone on every successful open and clears the slot
/// before every close; `send` locks it just long enough to write. The lock
/// is never held across a blocking read.
type WriterSlot = Arc<Mutex<Option<Box<dyn LinkPort>>>>;

fn lock_slot(slot: &WriterSlot) -> MutexGuard<'_, Option<Box<dyn LinkPort>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to a running link watchdog
pub struct LinkWatchdog {
    control_tx: Sender<bool>,
    data_rx: Receiver<Vec<u8>>,
    status_rx: Receiver<StatusEvent>,
    writer: WriterSlot,
}

impl LinkWatchdog {
    /// Spawn a watchdog for a real serial port
    pub fn spawn(config: LinkConfig) -> Self {
        Self::spawn_with_transport(config, SerialTransport::new())
    }

    /// Spawn a watchdog over any transport
    ///
    /// Tests use this with a simulated transport; `spawn` is the production
    /// path.
    pub fn spawn_with_transport<T: Transport>(config: LinkConfig, transport: T) -> Self {
        let (control_tx, control_rx) = mpsc::channel();
        let (data_tx, data_rx) = mpsc::channel();
        let (status_tx, status_rx) = mpsc::channel();
        let writer: WriterSlot = Arc::new(Mutex::new(None));

        let worker = Watchdog {
            enabled: config.enabled,
            config,
            transport,
            control_rx,
            data_tx,
            status_tx,
            writer: Arc::clone(&writer),
            buffer: vec![0; READ_BUFFER_SIZE],
        };
        thread::spawn(move || worker.run());

        Self {
            control_tx,
            data_rx,
            status_rx,
            writer,
        }
    }

    /// Drain all data chunks received since the last poll, oldest first
    ///
    /// Non-blocking. Concatenating the chunks reconstructs the byte stream
    /// exactly as it was read from the device.
    pub fn poll_data(&self) -> Vec<Vec<u8>> {
        self.data_rx.try_iter().collect()
    }

    /// Drain all status transitions since the last poll, oldest first
    pub fn poll_status(&self) -> Vec<StatusEvent> {
        self.status_rx.try_iter().collect()
    }

    /// Request enabling or disabling the link
    ///
    /// Takes effect at the loop's next polling point, not synchronously.
    /// Rapid toggles coalesce: only the last value sent matters.
    pub fn set_enabled(&self, enabled: bool) {
        let _ = self.control_tx.send(enabled);
    }

    /// Transmit bytes on the link, best effort
    ///
    /// A no-op when no link is open. Runs on the caller's thread; the link
    /// may be closed by the loop at any moment, so write failures are
    /// swallowed. Outbound bytes carry no delivery contract.
    pub fn send(&self, data: &[u8]) {
        let mut slot = lock_slot(&self.writer);
        if let Some(port) = slot.as_mut() {
            if let Err(e) = port.write_all(data) {
                debug!("Dropped {} outbound bytes: {}", data.len(), e);
            }
        }
    }
}

/// Watchdog loop state
///
/// Opening is folded into `Discovering`: an open attempt either produces
/// the `Connected` handle or falls straight back to discovery. The handle
/// lives in the `Connected` variant, so leaving that state is what closes
/// the link.
enum LinkState {
    /// Disabled, waiting for an enable request
    AwaitingEnable,
    /// Enabled, waiting for the port to appear and open
    Discovering,
    /// Link open and being read
    Connected(Box<dyn LinkPort>),
}

/// The background loop half of a watchdog
struct Watchdog<T: Transport> {
    config: LinkConfig,
    transport: T,
    enabled: bool,
    control_rx: Receiver<bool>,
    data_tx: Sender<Vec<u8>>,
    status_tx: Sender<StatusEvent>,
    writer: WriterSlot,
    buffer: Vec<u8>,
}

impl<T: Transport> Watchdog<T> {
    fn run(mut self) {
        info!("Link watchdog started for {}", self.config.port);

        let mut state = if self.enabled {
            LinkState::Discovering
        } else {
            self.emit(StatusEvent::disabled());
            LinkState::AwaitingEnable
        };

        loop {
            state = match self.apply_control(state) {
                Some(next) => next,
                None => break,
            };

            state = match state {
                LinkState::AwaitingEnable => {
                    if self.idle_wait() {
                        LinkState::AwaitingEnable
                    } else {
                        break;
                    }
                }
                LinkState::Discovering => match self.discover() {
                    Some(next) => next,
                    None => break,
                },
                LinkState::Connected(port) => self.pump(port),
            };
        }

        self.clear_writer();
        info!("Link watchdog for {} exited", self.config.port);
    }

    /// Drain queued enable/disable requests and reconcile the state
    ///
    /// Every queued value is consumed; the last one wins. A disable observed
    /// while connected closes the link immediately, whatever the loop was
    /// doing. Returns `None` once the driver side is gone.
    fn apply_control(&mut self, state: LinkState) -> Option<LinkState> {
        loop {
            match self.control_rx.try_recv() {
                Ok(enabled) => self.enabled = enabled,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return None,
            }
        }

        match state {
            LinkState::Connected(port) if !self.enabled => {
                self.close(port);
                self.emit(StatusEvent::disabled());
                Some(LinkState::AwaitingEnable)
            }
            LinkState::Discovering if !self.enabled => {
                self.emit(StatusEvent::disabled());
                Some(LinkState::AwaitingEnable)
            }
            LinkState::AwaitingEnable if self.enabled => Some(LinkState::Discovering),
            other => Some(other),
        }
    }

    /// Bounded wait that wakes early on enable/disable traffic
    ///
    /// Returns `false` once the driver side is gone. A received value is
    /// recorded here and acted on by the next `apply_control` pass.
    fn idle_wait(&mut self) -> bool {
        match self.control_rx.recv_timeout(self.config.retry_interval) {
            Ok(enabled) => {
                self.enabled = enabled;
                true
            }
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// One presence poll and, if the port is visible, one open attempt
    fn discover(&mut self) -> Option<LinkState> {
        if !self.transport.is_present(&self.config.port) {
            self.emit(StatusEvent::offline());
            return self.idle_wait().then_some(LinkState::Discovering);
        }

        match self
            .transport
            .open(&self.config.port, self.config.baud_rate, self.config.read_timeout)
        {
            Ok(port) => {
                self.install_writer(port.as_ref());
                self.emit(StatusEvent::online());
                info!("Opened {} at {} baud", self.config.port, self.config.baud_rate);
                Some(LinkState::Connected(port))
            }
            Err(e) => {
                warn!("Cannot open {}: {}", self.config.port, e);
                self.emit(StatusEvent::open_failed(&e));
                self.idle_wait().then_some(LinkState::Discovering)
            }
        }
    }

    /// One bounded-timeout read while connected
    fn pump(&mut self, mut port: Box<dyn LinkPort>) -> LinkState {
        match port.read(&mut self.buffer) {
            Ok(n) if n > 0 => {
                debug!("Read {} bytes from {}", n, self.config.port);
                let _ = self.data_tx.send(self.buffer[..n].to_vec());
                LinkState::Connected(port)
            }
            // A zero-length or timed-out read means nothing arrived, not
            // that the device is gone
            Ok(_) => LinkState::Connected(port),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => LinkState::Connected(port),
            Err(e) => {
                warn!("Read error on {}: {}", self.config.port, e);
                self.close(port);
                LinkState::Discovering
            }
        }
    }

    /// Publish a writable clone of the newly opened link for `send`
    fn install_writer(&mut self, port: &dyn LinkPort) {
        match port.try_clone() {
            Ok(clone) => *lock_slot(&self.writer) = Some(clone),
            Err(e) => warn!("Link on {} is read-only, clone failed: {}", self.config.port, e),
        }
    }

    /// Close the link
    ///
    /// The writer slot is cleared before the handle drops, so `send` can
    /// never observe a handle the loop has already given up on.
    fn close(&mut self, port: Box<dyn LinkPort>) {
        self.clear_writer();
        drop(port);
    }

    fn clear_writer(&mut self) {
        *lock_slot(&self.writer) = None;
    }

    fn emit(&self, event: StatusEvent) {
        let _ = self.status_tx.send(event);
    }
}
