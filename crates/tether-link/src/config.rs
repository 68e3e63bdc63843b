//! Watchdog configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Baud rate used when none is configured explicitly
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Configuration for a link watchdog
///
/// The port name is fixed for the lifetime of the watchdog; watching a
/// different port means spawning a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Target port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// Baud rate for the opened link
    pub baud_rate: u32,
    /// Bounded timeout for a single blocking read
    pub read_timeout: Duration,
    /// Interval between presence polls and reopen attempts
    pub retry_interval: Duration,
    /// Whether the watchdog starts enabled
    pub enabled: bool,
}

impl LinkConfig {
    /// Create a configuration for a port with default timing
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(500),
            retry_interval: Duration::from_millis(500),
            enabled: true,
        }
    }
}
