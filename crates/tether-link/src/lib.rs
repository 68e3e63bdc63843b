//! Serial Link Watchdog
//!
//! This crate keeps a single serial link alive across unplug/replug cycles.
//! A background loop owns the port handle and walks a small state machine:
//! wait for enablement, poll until the port appears, open it, then read with
//! a bounded timeout until the device fails. Received bytes and status
//! transitions are republished over unbounded channels, so the driver polls
//! at its own pace and never blocks the loop.
//!
//! Every failure is non-fatal. An open that is refused, a device that
//! vanishes mid-read, a write against a link that just closed: the loop
//! retreats to discovery and retries at a fixed interval, indefinitely.
//!
//! # Example
//!
//! ```rust,no_run
//! use tether_link::{LinkConfig, LinkWatchdog};
//!
//! let watchdog = LinkWatchdog::spawn(LinkConfig::new("/dev/ttyUSB0"));
//!
//! loop {
//!     for chunk in watchdog.poll_data() {
//!         print!("{}", String::from_utf8_lossy(&chunk));
//!     }
//!     for event in watchdog.poll_status() {
//!         eprintln!("{}", event.message);
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod transport;
pub mod watchdog;

pub use config::{LinkConfig, DEFAULT_BAUD_RATE};
pub use error::LinkError;
pub use events::{Severity, StatusEvent};
pub use transport::{LinkPort, SerialTransport, Transport};
pub use watchdog::LinkWatchdog;
