//! serialpoll library
//!
//! Cross-platform serial port access built around non-blocking readiness
//! checks: enumerate devices, open one, apply symbolic line settings, poll for
//! received data, and have the original device settings restored on close.
//!
//! # Modules
//!
//! - `port`: the `SerialPortAdapter` trait, native POSIX/Windows handles,
//!   register mappers, device enumeration, and an in-memory mock
//! - `service`: caller-side poll loops (timeouts, draining, loopback checks)
//! - `config`: TOML configuration with environment overrides
//! - `logging`: tracing subscriber setup for applications
//! - `error`: application-level error type
//!
//! # Example
//!
//! ```no_run
//! use serialpoll::port::{self, FlushSelection, PortConfiguration, SerialPortAdapter};
//!
//! let mut handle = port::open("/dev/ttyUSB0")?;
//! handle.configure(&PortConfiguration::new(115_200u32))?;
//! handle.flush_queues(FlushSelection::BOTH)?;
//!
//! if handle.poll()? {
//!     let mut buf = [0u8; 64];
//!     let n = handle.read_bytes(&mut buf)?;
//!     println!("{:?}", &buf[..n]);
//! }
//! handle.close();
//! # Ok::<(), serialpoll::PortError>(())
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod port;
pub mod service;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult};
pub use port::{
    iterate, open, BaudRate, ControlLines, DataBits, FlowControl, FlushSelection, MockSerialPort,
    NativePort, Parity, PortConfiguration, PortError, PortIter, PortStub, SerialPortAdapter,
    StopBits,
};
pub use service::{LoopbackReport, MonitorSummary};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
