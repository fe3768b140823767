//! Port abstraction layer for serial communication.
//!
//! One trait, `SerialPortAdapter`, with a concrete handle per platform chosen
//! at compile time (`NativePort`), plus an in-memory `MockSerialPort` for
//! tests. `open` and `iterate` forward to the native implementation.

pub mod dcb;
pub mod enumerate;
pub mod error;
pub mod mock;
pub mod traits;
pub mod wait;

#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod windows;

pub use enumerate::{iterate, PortIter, PortStub, MAX_NAME_LEN, MAX_PATH_LEN};
pub use error::PortError;
pub use mock::MockSerialPort;
pub use traits::*;

#[cfg(unix)]
pub use enumerate::DirSource;
#[cfg(unix)]
pub use posix::PosixPort;
#[cfg(windows)]
pub use windows::WindowsPort;

/// The serial handle type of the build target.
#[cfg(unix)]
pub type NativePort = PosixPort;

/// The serial handle type of the build target.
#[cfg(windows)]
pub type NativePort = WindowsPort;

/// Open the device at `path` with the native backend.
pub fn open(path: &str) -> Result<NativePort, PortError> {
    NativePort::open(path)
}

/// Open `path` and apply `config` in one step.
///
/// On configuration failure the handle is closed before the error is returned.
pub fn open_with(path: &str, config: &PortConfiguration) -> Result<NativePort, PortError> {
    let mut port = open(path)?;
    port.configure(config)?;
    Ok(port)
}
