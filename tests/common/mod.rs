//! Shared test utilities for serialpoll tests.
//!
//! This module provides common test infrastructure including:
//! - Mock loopback pairs with pre-programmed data
//! - Pseudo-terminal pairs standing in for a null-modem cable (Linux)
//! - Common configuration builders

#![allow(dead_code)]

use serialpoll::port::{
    DataBits, FlowControl, MockSerialPort, Parity, PortConfiguration, SerialPortAdapter, StopBits,
};

/// The 12-byte message used by the readiness/transfer scenarios.
pub const MESSAGE: &[u8; 12] = b"Hello World!";

/// Create a mock serial port with pre-programmed responses.
pub fn create_mock_port_with_responses(port_name: &str, responses: Vec<&[u8]>) -> MockSerialPort {
    let mut mock = MockSerialPort::new(port_name);
    for response in responses {
        mock.enqueue_read(response);
    }
    mock
}

/// Two mock endpoints, both configured with `config`.
pub fn configured_mock_pair(config: &PortConfiguration) -> (MockSerialPort, MockSerialPort) {
    let (mut a, mut b) = MockSerialPort::pair("MOCK_TX", "MOCK_RX");
    a.configure(config).expect("configure tx");
    b.configure(config).expect("configure rx");
    (a, b)
}

/// Every combination of line settings, at one rate.
pub fn all_line_settings(rate: u32) -> Vec<PortConfiguration> {
    let mut out = Vec::new();
    for parity in [Parity::None, Parity::Odd, Parity::Even, Parity::Mark, Parity::Space] {
        for stop_bits in [StopBits::One, StopBits::Two] {
            for data_bits in [DataBits::Five, DataBits::Six, DataBits::Seven, DataBits::Eight] {
                for flow in [FlowControl::None, FlowControl::Software, FlowControl::Hardware] {
                    out.push(
                        PortConfiguration::new(rate)
                            .with_parity(parity)
                            .with_stop_bits(stop_bits)
                            .with_data_bits(data_bits)
                            .with_flow_control(flow),
                    );
                }
            }
        }
    }
    out
}

#[cfg(target_os = "linux")]
pub mod pty {
    //! Pseudo-terminal pairs.
    //!
    //! The master side is opened through the same `PosixPort::open` as any
    //! device, so both ends exercise the real backend.

    use serialpoll::port::PosixPort;
    use std::os::unix::io::AsRawFd;

    pub struct PtyPair {
        pub master: PosixPort,
        pub slave_path: String,
    }

    impl PtyPair {
        pub fn open_slave(&self) -> PosixPort {
            PosixPort::open(&self.slave_path).expect("open pty slave")
        }
    }

    /// Allocate a pty pair, or `None` when the host has no usable `/dev/ptmx`.
    pub fn open_pair() -> Option<PtyPair> {
        let master = match PosixPort::open("/dev/ptmx") {
            Ok(m) => m,
            Err(e) => {
                println!("Skipping: cannot open /dev/ptmx: {}", e);
                return None;
            }
        };
        let fd = master.as_raw_fd();
        let mut name = [0 as libc::c_char; 128];
        // SAFETY: fd is a valid pty master; name is a writable buffer of the given length.
        unsafe {
            if libc::grantpt(fd) != 0 || libc::unlockpt(fd) != 0 {
                println!("Skipping: grantpt/unlockpt failed");
                return None;
            }
            if libc::ptsname_r(fd, name.as_mut_ptr(), name.len()) != 0 {
                println!("Skipping: ptsname_r failed");
                return None;
            }
        }
        // SAFETY: ptsname_r wrote a NUL-terminated string.
        let slave_path = unsafe { std::ffi::CStr::from_ptr(name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        Some(PtyPair { master, slave_path })
    }
}
