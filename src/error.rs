//! Application-level error type for the command-line front end.

use crate::config::ConfigError;
use crate::port::PortError;
use std::time::Duration;
use thiserror::Error;

/// Unified application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("An I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("A serialization error occurred: {0}")]
    Serde(#[from] serde_json::Error),

    /// Could not install the tracing subscriber.
    #[error("Failed to initialise logging: {0}")]
    Logging(String),

    /// The receiving end never became readable.
    #[error("No data arrived within {0:?}")]
    Timeout(Duration),

    /// Loopback data came back different from what was sent.
    #[error("Loopback mismatch: sent {sent} bytes, received {received} ({matching} matching)")]
    LoopbackMismatch {
        sent: usize,
        received: usize,
        matching: usize,
    },

    /// Malformed command-line input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenient Result type for the application layer.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Port(PortError::NotFound(_)) => 2,
            Self::Port(PortError::PermissionDenied(_)) => 3,
            Self::Config(_) | Self::InvalidArgument(_) => 64,
            Self::Timeout(_) | Self::LoopbackMismatch { .. } => 5,
            _ => 1,
        }
    }
}
