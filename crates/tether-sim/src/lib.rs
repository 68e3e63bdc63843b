//! Link Simulation Library
//!
//! This crate provides a scriptable stand-in for a real serial device so
//! watchdog behavior can be exercised without hardware. A test holds a
//! clone of the transport as a control handle and scripts the device:
//! plug and unplug it, admit or refuse opens, feed receive bytes, inject
//! read faults, and inspect written bytes and open/close accounting.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tether_link::{LinkPort, Transport};
//! use tether_sim::SimTransport;
//!
//! let sim = SimTransport::new();
//! sim.set_present(true);
//!
//! let mut port = sim.open("sim0", 115_200, Duration::from_millis(10)).unwrap();
//! sim.feed(b"hello");
//!
//! let mut buf = [0u8; 16];
//! let n = port.read(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"hello");
//! ```

pub mod transport;

pub use transport::SimTransport;
