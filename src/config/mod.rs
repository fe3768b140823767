//! Configuration module for serialpoll.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIALPOLL_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. The platform config directory (`~/.config/serialpoll/config.toml` on
//!    Linux, `%APPDATA%\serialpoll\config\config.toml` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `SERIALPOLL_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIALPOLL_SERIAL_BAUD_RATE=9600`
//! - `SERIALPOLL_SERIAL_FLOW_CONTROL=hardware`
//! - `SERIALPOLL_TESTING_PORT=/dev/ttyUSB0`
//!
//! Legacy environment variables are also supported:
//! `TEST_PORT`, `TEST_PEER_PORT`, `TEST_BAUD`.
//!
//! # Example
//!
//! ```rust,no_run
//! use serialpoll::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let line = loader.config().serial.to_port_configuration();
//! println!("Default line settings: {}", line);
//! # Ok::<(), serialpoll::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, MonitorConfig, SerialConfig, TestingConfig};
