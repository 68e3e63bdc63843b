//! Error types for the link watchdog
//!
//! None of these are fatal. The watchdog consumes every failure by
//! retreating to discovery and retrying at the configured interval; the
//! only surface the driver sees is the status event stream.

use thiserror::Error;

/// Errors that can occur while opening or driving a link
#[derive(Debug, Error)]
pub enum LinkError {
    /// Failed to open the target port
    #[error("failed to open {port}: {reason}")]
    OpenFailed {
        /// Port that refused to open
        port: String,
        /// Underlying reason
        reason: String,
    },

    /// Serial port error
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// I/O error on an open link
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
