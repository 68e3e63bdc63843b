//! Status events emitted by the link watchdog
//!
//! Every state transition publishes one of these on the status channel.
//! The driver consumes them append-only; the severity is a display hint,
//! not an error to handle.

use std::fmt;

/// Severity hint for displaying a status event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Normal lifecycle transition
    Info,
    /// Failure the watchdog is retrying
    Error,
}

/// A human-readable status transition
#[derive(Debug, Clone)]
pub struct StatusEvent {
    /// Display text
    pub message: String,
    /// Display hint
    pub severity: Severity,
}

impl StatusEvent {
    /// Link opened and reading
    pub fn online() -> Self {
        Self {
            message: "Online".to_string(),
            severity: Severity::Info,
        }
    }

    /// Target port not visible on the host
    pub fn offline() -> Self {
        Self {
            message: "Offline".to_string(),
            severity: Severity::Error,
        }
    }

    /// Watchdog disabled by request
    pub fn disabled() -> Self {
        Self {
            message: "Disabled".to_string(),
            severity: Severity::Info,
        }
    }

    /// Port visible but refused to open
    pub fn open_failed(reason: impl fmt::Display) -> Self {
        Self {
            message: format!("Cannot open port: {reason}"),
            severity: Severity::Error,
        }
    }
}
