//! Port-specific error types.
//!
//! Defines error types for serial port operations, separate from application-level
//! errors to maintain clean separation of concerns.

use std::io;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified path does not resolve to a device.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The device exists but the process may not open it.
    #[error("Permission denied opening serial port: {0}")]
    PermissionDenied(String),

    /// The path opened fine but is not a terminal device.
    #[error("Not a serial device: {0}")]
    NotATerminal(String),

    /// The path cannot be handed to the operating system.
    #[error("Invalid device path: {0:?}")]
    InvalidPath(String),

    /// Mark/space ("stick") parity has no register representation on this platform.
    #[error("Mark and space parity are not supported on this platform")]
    ParityMarkSpaceUnsupported,

    /// A distinct input baud rate has no register representation on this platform.
    #[error("A separate input baud rate is not supported on this platform")]
    InputBaudRateUnsupported,

    /// The requested baud rate cannot be encoded.
    #[error("Unsupported baud rate: {0}")]
    BaudRateUnsupported(u32),

    /// An OS call failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a PermissionDenied error from a port name.
    pub fn permission_denied(port_name: impl Into<String>) -> Self {
        Self::PermissionDenied(port_name.into())
    }

    /// Classify an error returned while opening `path`.
    pub fn from_open_error(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(path),
            io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::Io(err),
        }
    }

    /// Wrap the calling thread's last OS error.
    pub(crate) fn last_os_error() -> Self {
        Self::Io(io::Error::last_os_error())
    }

    /// Whether this is a non-blocking "try again" condition.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
    }
}

impl From<PortError> for io::Error {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Io(e) => e,
            PortError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, err),
            PortError::PermissionDenied(_) => io::Error::new(io::ErrorKind::PermissionDenied, err),
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
