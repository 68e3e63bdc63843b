//! Serial Port Detection Library
//!
//! This crate answers two questions about the host's serial ports: what is
//! visible right now, and whether one specific port is among them. The
//! presence check is cheap enough to call from a sub-second polling loop.
//!
//! # Example
//!
//! ```rust,no_run
//! use tether_detect::PortScanner;
//!
//! let scanner = PortScanner::new();
//!
//! if scanner.is_present("/dev/ttyUSB0") {
//!     println!("Device is plugged in");
//! }
//! ```

pub mod error;
pub mod scanner;

pub use error::DetectError;
pub use scanner::{PortScanner, ScannerConfig, SerialPortInfo};
