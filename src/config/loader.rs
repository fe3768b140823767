//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use crate::port::{DataBits, FlowControl, Parity, StopBits};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIALPOLL";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIALPOLL_CONFIG";

/// Application name used for the platform config directory.
const APP_NAME: &str = "serialpoll";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIALPOLL_CONFIG` environment variable (explicit path)
    /// 2. `./config.toml` (current directory)
    /// 3. The platform config directory, e.g. `~/.config/serialpoll/config.toml`
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides are applied; malformed values are ignored.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    get_default_config_path().filter(|path| path.exists())
}

/// Get the platform config directory for this application.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_var(key: &str) -> Option<(String, String)> {
    let name = format!("{}_{}", ENV_PREFIX, key);
    std::env::var(&name).ok().map(|value| (name, value))
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("Invalid number '{}'", value)))
}

/// Parse a lowercase enum name the same way the config file spells it.
fn parse_keyword<T: DeserializeOwned>(var: &str, value: &str) -> ConfigResult<T> {
    let normalized = value.trim().to_ascii_lowercase();
    T::deserialize(serde::de::value::StrDeserializer::<serde::de::value::Error>::new(
        &normalized,
    ))
    .map_err(|_| ConfigError::env_parse(var, format!("Unrecognized value '{}'", value)))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIALPOLL_<SECTION>_<KEY>`
/// For example:
/// - `SERIALPOLL_SERIAL_BAUD_RATE=9600`
/// - `SERIALPOLL_SERIAL_PARITY=even`
/// - `SERIALPOLL_TESTING_PORT=/dev/ttyUSB0`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some((_, val)) = env_var("SERIAL_DEFAULT_PORT") {
        config.serial.default_port = Some(val);
    }
    if let Some((var, val)) = env_var("SERIAL_BAUD_RATE") {
        config.serial.baud_rate = parse_number(&var, &val)?;
    }
    if let Some((var, val)) = env_var("SERIAL_INPUT_BAUD_RATE") {
        config.serial.input_baud_rate = Some(parse_number(&var, &val)?);
    }
    if let Some((var, val)) = env_var("SERIAL_PARITY") {
        config.serial.parity = parse_keyword::<Parity>(&var, &val)?;
    }
    if let Some((var, val)) = env_var("SERIAL_STOP_BITS") {
        config.serial.stop_bits = parse_keyword::<StopBits>(&var, &val)?;
    }
    if let Some((var, val)) = env_var("SERIAL_DATA_BITS") {
        config.serial.data_bits = parse_keyword::<DataBits>(&var, &val)?;
    }
    if let Some((var, val)) = env_var("SERIAL_FLOW_CONTROL") {
        config.serial.flow_control = parse_keyword::<FlowControl>(&var, &val)?;
    }

    // Monitor overrides
    if let Some((var, val)) = env_var("MONITOR_POLL_INTERVAL_MS") {
        config.monitor.poll_interval_ms = parse_number(&var, &val)?;
    }
    if let Some((var, val)) = env_var("MONITOR_DURATION_MS") {
        config.monitor.duration_ms = parse_number(&var, &val)?;
    }

    // Logging overrides
    if let Some((_, val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Some((var, val)) = env_var("LOGGING_FORMAT") {
        config.logging.format = parse_keyword::<LogFormat>(&var, &val)?;
    }

    // Testing overrides (also support legacy TEST_PORT etc.)
    if let Ok(val) = std::env::var(format!("{}_TESTING_PORT", ENV_PREFIX))
        .or_else(|_| std::env::var("TEST_PORT"))
    {
        config.testing.port = Some(val);
    }
    if let Ok(val) = std::env::var(format!("{}_TESTING_PEER_PORT", ENV_PREFIX))
        .or_else(|_| std::env::var("TEST_PEER_PORT"))
    {
        config.testing.peer_port = Some(val);
    }
    if let Ok(val) = std::env::var(format!("{}_TESTING_BAUD", ENV_PREFIX))
        .or_else(|_| std::env::var("TEST_BAUD"))
    {
        let var = format!("{}_TESTING_BAUD or TEST_BAUD", ENV_PREFIX);
        config.testing.baud = parse_number(&var, &val)?;
    }

    Ok(())
}
