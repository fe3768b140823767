//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates serial port behavior without
//! requiring actual hardware. Two mocks can be cross-connected into a loopback
//! pair, so anything written on one end becomes readable on the other.

use super::error::PortError;
use super::traits::{ControlLines, FlushSelection, PortConfiguration, SerialPortAdapter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

/// Inner state of one mock endpoint, protected by a mutex for interior mutability.
#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes waiting to be read on this endpoint.
    read_queue: VecDeque<u8>,
    /// Bytes written but not yet delivered (only while the peer is stalled).
    write_queue: VecDeque<u8>,
    /// Log of all writes made on this endpoint.
    write_log: Vec<Vec<u8>>,
    /// Every configuration successfully applied, oldest first.
    configurations: Vec<PortConfiguration>,
    /// Settings in effect before the first `configure`.
    original: Option<Option<PortConfiguration>>,
    /// Settings currently in effect.
    current: Option<PortConfiguration>,
    /// Reject mark/space parity like a platform without stick parity.
    no_stick_parity: bool,
    /// One-shot I/O failure for the next read or write.
    fail_next: Option<io::ErrorKind>,
    /// Hold writes in `write_queue` instead of delivering them.
    stalled: bool,
    control_lines: ControlLines,
    flushes: Vec<FlushSelection>,
    closed: bool,
}

/// Mock serial port implementation for testing.
///
/// # Example
/// ```
/// use serialpoll::port::{MockSerialPort, SerialPortAdapter};
///
/// let (mut a, mut b) = MockSerialPort::pair("MOCK0", "MOCK1");
/// assert!(!b.poll().unwrap());
///
/// a.write_bytes(b"Hello").unwrap();
/// assert!(b.poll().unwrap());
///
/// let mut buffer = [0u8; 8];
/// let n = b.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello");
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    /// The port name/identifier.
    name: String,
    state: Arc<Mutex<MockPortState>>,
    /// The other end of a loopback pair, if any.
    peer: Option<Arc<Mutex<MockPortState>>>,
}

impl MockSerialPort {
    /// Create an unconnected mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
            peer: None,
        }
    }

    /// Create two endpoints wired TX-to-RX in both directions.
    pub fn pair(a: impl Into<String>, b: impl Into<String>) -> (Self, Self) {
        let mut left = Self::new(a);
        let mut right = Self::new(b);
        left.peer = Some(Arc::clone(&right.state));
        right.peer = Some(Arc::clone(&left.state));
        (left, right)
    }

    /// Make `configure` reject mark/space parity.
    pub fn without_stick_parity(self) -> Self {
        self.state.lock().no_stick_parity = true;
        self
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Make the next read or write fail with `kind`.
    pub fn fail_next(&mut self, kind: io::ErrorKind) {
        self.state.lock().fail_next = Some(kind);
    }

    /// While stalled, writes are accepted but not delivered to the peer.
    pub fn set_stalled(&mut self, stalled: bool) {
        let pending: Vec<u8> = {
            let mut state = self.state.lock();
            state.stalled = stalled;
            if stalled {
                return;
            }
            state.write_queue.drain(..).collect()
        };
        self.deliver(&pending);
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Settings currently in effect, `None` if never configured.
    pub fn current_configuration(&self) -> Option<PortConfiguration> {
        self.state.lock().current.clone()
    }

    /// Every configuration applied so far.
    pub fn configurations(&self) -> Vec<PortConfiguration> {
        self.state.lock().configurations.clone()
    }

    pub fn control_lines(&self) -> ControlLines {
        self.state.lock().control_lines
    }

    pub fn flushes(&self) -> Vec<FlushSelection> {
        self.state.lock().flushes.clone()
    }

    /// Whether any clone of this endpoint has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn deliver(&self, data: &[u8]) {
        match &self.peer {
            Some(peer) => peer.lock().read_queue.extend(data),
            None => {}
        }
    }

    fn take_failure(state: &mut MockPortState) -> Result<(), PortError> {
        match state.fail_next.take() {
            Some(kind) => Err(PortError::Io(io::Error::new(kind, "injected failure"))),
            None => Ok(()),
        }
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn open(path: &str) -> Result<Self, PortError> {
        Ok(Self::new(path))
    }

    fn configure(&mut self, config: &PortConfiguration) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.no_stick_parity && config.parity.is_stick() {
            return Err(PortError::ParityMarkSpaceUnsupported);
        }
        if state.original.is_none() {
            state.original = Some(state.current.clone());
        }
        state.current = Some(config.clone());
        state.configurations.push(config.clone());
        Ok(())
    }

    fn flush_queues(&mut self, selection: FlushSelection) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if selection.input {
            state.read_queue.clear();
        }
        if selection.output {
            state.write_queue.clear();
        }
        if !selection.is_empty() {
            state.flushes.push(selection);
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<bool, PortError> {
        Ok(!self.state.lock().read_queue.is_empty())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        Self::take_failure(&mut state)?;

        let n = buffer.len().min(state.read_queue.len());
        if n == 0 && !buffer.is_empty() {
            // Same shape as a non-blocking descriptor with nothing queued.
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::WouldBlock,
                "No data available",
            )));
        }
        for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let stalled = {
            let mut state = self.state.lock();
            Self::take_failure(&mut state)?;
            state.write_log.push(data.to_vec());
            if state.stalled {
                state.write_queue.extend(data);
            }
            state.stalled
        };
        if !stalled {
            self.deliver(data);
        }
        Ok(data.len())
    }

    fn bytes_to_read(&mut self) -> Result<usize, PortError> {
        Ok(self.available_bytes())
    }

    fn set_control_lines(&mut self, lines: ControlLines) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if lines.dtr.is_some() {
            state.control_lines.dtr = lines.dtr;
        }
        if lines.rts.is_some() {
            state.control_lines.rts = lines.rts;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(self) {
        let mut state = self.state.lock();
        if let Some(original) = state.original.take() {
            state.current = original;
        }
        state.closed = true;
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .field("paired", &self.peer.is_some())
            .finish()
    }
}
