//! POSIX serial port handle.
//!
//! The descriptor is opened non-blocking and without becoming the controlling
//! terminal. Readiness is a single zero-timeout `poll(2)`.

pub mod speed;
pub mod termios;

use self::termios::{RegisterImage, RegisterSnapshot};
use super::error::PortError;
use super::traits::{ControlLines, FlushSelection, PortConfiguration, SerialPortAdapter};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use tracing::{debug, warn};

/// An open POSIX serial device.
pub struct PosixPort {
    file: File,
    name: String,
    /// Register state from before our first `configure`, restored on drop.
    original: Option<RegisterImage>,
}

impl PosixPort {
    /// Open `path` read/write with `O_NOCTTY | O_NONBLOCK`.
    pub fn open(path: &str) -> Result<Self, PortError> {
        if path.contains('\0') {
            return Err(PortError::InvalidPath(path.to_string()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| PortError::from_open_error(path, e))?;

        // SAFETY: isatty only inspects the descriptor.
        if unsafe { libc::isatty(file.as_raw_fd()) } == 0 {
            return Err(PortError::NotATerminal(path.to_string()));
        }

        debug!("Opened serial port {}", path);
        Ok(Self {
            file,
            name: path.to_string(),
            original: None,
        })
    }

    /// Whether the pre-configure image has been captured for restore on close.
    pub fn is_configured(&self) -> bool {
        self.original.is_some()
    }

    /// The register image currently in effect on the device.
    pub fn current_image(&self) -> Result<RegisterImage, PortError> {
        termios::read_image(self.fd())
    }

    /// Comparable view of the image currently in effect.
    pub fn snapshot(&self) -> Result<RegisterSnapshot, PortError> {
        Ok(RegisterSnapshot::from(&self.current_image()?))
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn modem_bits(&self, request: libc::c_ulong, bits: libc::c_int) -> Result<(), PortError> {
        if bits == 0 {
            return Ok(());
        }
        // SAFETY: TIOCMBIS/TIOCMBIC read one c_int through the pointer.
        if unsafe { libc::ioctl(self.fd(), request as _, &bits) } < 0 {
            return Err(PortError::last_os_error());
        }
        Ok(())
    }
}

impl SerialPortAdapter for PosixPort {
    fn open(path: &str) -> Result<Self, PortError> {
        PosixPort::open(path)
    }

    fn configure(&mut self, config: &PortConfiguration) -> Result<(), PortError> {
        let fd = self.fd();
        let current = termios::read_image(fd)?;
        // Held before any write so a commit that fails halfway is still undone on close.
        if self.original.is_none() {
            self.original = Some(current);
        }
        let next = termios::map_config(config, &current)?;

        termios::write_image(fd, &next)?;
        speed::after_commit(fd, config.baud_rate, config.effective_input_baud())?;
        debug!("Configured {} as {}", self.name, config);
        Ok(())
    }

    fn flush_queues(&mut self, selection: FlushSelection) -> Result<(), PortError> {
        let queue = match (selection.input, selection.output) {
            (false, false) => return Ok(()),
            (true, false) => libc::TCIFLUSH,
            (false, true) => libc::TCOFLUSH,
            (true, true) => libc::TCIOFLUSH,
        };
        // SAFETY: tcflush only acts on the descriptor.
        if unsafe { libc::tcflush(self.fd(), queue) } < 0 {
            return Err(PortError::last_os_error());
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<bool, PortError> {
        let mut pfd = libc::pollfd {
            fd: self.fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: one valid pollfd, zero timeout.
        let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err.into());
        }
        if rc == 0 || pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            return Ok(false);
        }
        Ok(pfd.revents & libc::POLLIN != 0)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let n = self.file.read(buffer).map_err(PortError::Io)?;
        // With VMIN = VTIME = 0 a tty reports an empty queue as a zero-length read.
        if n == 0 && !buffer.is_empty() {
            return Err(PortError::Io(io::Error::from(io::ErrorKind::WouldBlock)));
        }
        Ok(n)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.file.write(data).map_err(PortError::Io)
    }

    fn bytes_to_read(&mut self) -> Result<usize, PortError> {
        let mut queued: libc::c_int = 0;
        // SAFETY: FIONREAD writes one c_int through the pointer.
        if unsafe { libc::ioctl(self.fd(), libc::FIONREAD as _, &mut queued) } < 0 {
            return Err(PortError::last_os_error());
        }
        Ok(queued.max(0) as usize)
    }

    fn set_control_lines(&mut self, lines: ControlLines) -> Result<(), PortError> {
        let mut raise = 0;
        let mut lower = 0;
        for (state, bit) in [(lines.dtr, libc::TIOCM_DTR), (lines.rts, libc::TIOCM_RTS)] {
            match state {
                Some(true) => raise |= bit,
                Some(false) => lower |= bit,
                None => {}
            }
        }
        self.modem_bits(libc::TIOCMBIS as libc::c_ulong, raise)?;
        self.modem_bits(libc::TIOCMBIC as libc::c_ulong, lower)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(self) {
        debug!("Closing serial port {}", self.name);
        drop(self)
    }
}

impl Drop for PosixPort {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            if let Err(e) = termios::write_image(self.fd(), &original) {
                warn!("Failed to restore settings on {}: {}", self.name, e);
            }
        }
    }
}

impl Read for PosixPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl Write for PosixPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl AsRawFd for PosixPort {
    fn as_raw_fd(&self) -> RawFd {
        self.fd()
    }
}

impl std::fmt::Debug for PosixPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosixPort")
            .field("name", &self.name)
            .field("fd", &self.fd())
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let result = PosixPort::open("/dev/nonexistent_port_12345");
        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_regular_file_is_not_a_terminal() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert!(matches!(
            PosixPort::open(path),
            Err(PortError::NotATerminal(_))
        ));
    }

    #[test]
    fn test_nul_in_path_rejected() {
        assert!(matches!(
            PosixPort::open("/dev/tty\0S0"),
            Err(PortError::InvalidPath(_))
        ));
    }
}
