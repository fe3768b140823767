//! Translation of `PortConfiguration` into a termios register image.
//!
//! `map_config` is pure: it takes the image read from the device and returns the
//! image to commit, so the bit math is testable without hardware. Flags the
//! configuration does not manage are cleared to force raw mode; the line
//! discipline and unrelated control characters carry over from `previous`.

use super::speed;
use crate::port::error::PortError;
use crate::port::traits::{BaudRate, DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use serde::Serialize;
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;

/// Complete terminal state as the driver consumes it.
#[cfg(target_os = "linux")]
pub type RegisterImage = libc::termios2;

/// Complete terminal state as the driver consumes it.
#[cfg(not(target_os = "linux"))]
pub type RegisterImage = libc::termios;

/// XON octet for software flow control.
pub const XON: u8 = 0x11;
/// XOFF octet for software flow control.
pub const XOFF: u8 = 0x13;

/// Read the device's current register image.
pub fn read_image(fd: RawFd) -> Result<RegisterImage, PortError> {
    let mut image = MaybeUninit::<RegisterImage>::zeroed();

    #[cfg(target_os = "linux")]
    // SAFETY: TCGETS2 fills a termios2, which `image` has room for.
    let rc = unsafe { libc::ioctl(fd, libc::TCGETS2 as _, image.as_mut_ptr()) };

    #[cfg(not(target_os = "linux"))]
    // SAFETY: tcgetattr fills a termios, which `image` has room for.
    let rc = unsafe { libc::tcgetattr(fd, image.as_mut_ptr()) };

    if rc < 0 {
        return Err(PortError::last_os_error());
    }
    // SAFETY: zero-initialised and then filled by the kernel.
    Ok(unsafe { image.assume_init() })
}

/// Commit `image` immediately, without draining or discarding queued data.
pub fn write_image(fd: RawFd, image: &RegisterImage) -> Result<(), PortError> {
    #[cfg(target_os = "linux")]
    // SAFETY: TCSETS2 only reads the termios2 behind the pointer.
    let rc = unsafe { libc::ioctl(fd, libc::TCSETS2 as _, image as *const RegisterImage) };

    #[cfg(not(target_os = "linux"))]
    // SAFETY: tcsetattr only reads the termios behind the pointer.
    let rc = unsafe { libc::tcsetattr(fd, libc::TCSANOW, image) };

    if rc < 0 {
        return Err(PortError::last_os_error());
    }
    Ok(())
}

/// Build the image that applies `config` on top of `previous`.
pub fn map_config(
    config: &PortConfiguration,
    previous: &RegisterImage,
) -> Result<RegisterImage, PortError> {
    let mut image = *previous;

    // No input preprocessing, no output postprocessing, no line editing or signals.
    image.c_iflag = 0;
    image.c_oflag = 0;
    image.c_lflag = 0;
    image.c_cflag = libc::CREAD;

    image.c_cflag |= match config.data_bits {
        DataBits::Five => libc::CS5,
        DataBits::Six => libc::CS6,
        DataBits::Seven => libc::CS7,
        DataBits::Eight => libc::CS8,
    };

    if config.stop_bits == StopBits::Two {
        image.c_cflag |= libc::CSTOPB;
    }

    match config.parity {
        Parity::None => {}
        Parity::Odd => {
            image.c_cflag |= libc::PARENB | libc::PARODD;
            image.c_iflag |= libc::INPCK;
        }
        Parity::Even => {
            image.c_cflag |= libc::PARENB;
            image.c_iflag |= libc::INPCK;
        }
        Parity::Mark | Parity::Space => {
            let stick = speed::STICK_PARITY.ok_or(PortError::ParityMarkSpaceUnsupported)?;
            image.c_cflag |= libc::PARENB | stick;
            if config.parity == Parity::Mark {
                image.c_cflag |= libc::PARODD;
            }
            image.c_iflag |= libc::INPCK;
        }
    }

    match config.flow_control {
        FlowControl::None => image.c_cflag |= libc::CLOCAL,
        FlowControl::Software => image.c_iflag |= libc::IXON | libc::IXOFF,
        FlowControl::Hardware => image.c_cflag |= speed::HARDWARE_FLOW,
    }

    image.c_cc[libc::VSTART] = XON;
    image.c_cc[libc::VSTOP] = XOFF;
    image.c_cc[libc::VMIN] = 0;
    image.c_cc[libc::VTIME] = 0;

    speed::encode(&mut image, config.baud_rate, config.effective_input_baud())?;
    Ok(image)
}

/// Read back `(output, input)` speed from an image.
pub fn decode_baud(image: &RegisterImage) -> (BaudRate, BaudRate) {
    speed::decode(image)
}

/// Comparable copy of the fields an image carries.
///
/// libc's structs do not implement `PartialEq` without extra features, so
/// tests and diagnostics go through this instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterSnapshot {
    pub iflag: u64,
    pub oflag: u64,
    pub cflag: u64,
    pub lflag: u64,
    pub cc: Vec<u8>,
    pub ispeed: u64,
    pub ospeed: u64,
}

impl From<&RegisterImage> for RegisterSnapshot {
    fn from(image: &RegisterImage) -> Self {
        Self {
            iflag: image.c_iflag as u64,
            oflag: image.c_oflag as u64,
            cflag: image.c_cflag as u64,
            lflag: image.c_lflag as u64,
            cc: image.c_cc.to_vec(),
            ispeed: image.c_ispeed as u64,
            ospeed: image.c_ospeed as u64,
        }
    }
}
