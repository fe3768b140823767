//! Tracing subscriber setup for the binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the application so embedders keep control of their own output.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{AppError, AppResult};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Filter directive for a `-v` count, falling back to the configured level.
pub fn level_for(verbosity: u8, configured: &str) -> String {
    match verbosity {
        0 => configured.to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over both `verbosity` and `config.level`.
/// Output goes to `config.file` when set, stderr otherwise, so stdout stays
/// clean for command output.
pub fn init(config: &LoggingConfig, format: Option<LogFormat>, verbosity: u8) -> AppResult<()> {
    let directive = level_for(verbosity, &config.level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .map_err(|e| AppError::Logging(format!("invalid filter '{}': {}", directive, e)))?;

    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let ansi = config.file.is_none();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(verbosity > 1);

    let result = match format.unwrap_or(config.format) {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.with_ansi(ansi).pretty().try_init(),
        LogFormat::Compact => builder.with_ansi(ansi).compact().try_init(),
    };
    result.map_err(|e| AppError::Logging(e.to_string()))
}
