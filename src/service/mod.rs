//! Caller-side poll loops built on `SerialPortAdapter`.
//!
//! The port layer never waits: `poll` answers immediately and reads return
//! `WouldBlock` when nothing is queued. The helpers here supply the timeout
//! and sleep policy a caller needs on top of that, on the caller's thread.
//!
//! # Architecture
//!
//! ```text
//! CLI ──> service::{wait_readable, drain, write_all, monitor, loopback_exchange}
//!                 │
//!                 └──> SerialPortAdapter (NativePort | MockSerialPort)
//! ```

use crate::port::{FlushSelection, PortError, SerialPortAdapter};
use serde::Serialize;
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Pause between retries of a write the driver could not accept.
const WRITE_RETRY_INTERVAL: Duration = Duration::from_millis(1);

// ========== Result Types ==========

/// Outcome of `loopback_exchange`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopbackReport {
    pub tx_port: String,
    pub rx_port: String,
    /// Whether the receiving end reported "not ready" before the write.
    pub idle_before_write: bool,
    /// Whether the receiving end became ready within the timeout.
    pub ready_after_write: bool,
    pub bytes_sent: usize,
    pub received: Vec<u8>,
    pub elapsed_ms: u64,
}

impl LoopbackReport {
    /// The received bytes equal the sent message.
    pub fn matches(&self, message: &[u8]) -> bool {
        self.received == message
    }
}

/// Totals from a `monitor` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MonitorSummary {
    pub bytes_read: u64,
    pub chunks: u64,
    pub polls: u64,
}

// ========== Poll Loops ==========

/// Poll until the port is readable or `timeout` passes.
///
/// Returns `Ok(false)` on timeout. A zero timeout polls exactly once.
pub fn wait_readable<P>(port: &mut P, timeout: Duration, interval: Duration) -> Result<bool, PortError>
where
    P: SerialPortAdapter + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        if port.poll()? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            trace!("{} not readable after {:?}", port.name(), timeout);
            return Ok(false);
        }
        thread::sleep(interval.min(deadline - now));
    }
}

/// Read everything currently queued, `chunk` bytes at a time.
pub fn drain<P>(port: &mut P, chunk: usize) -> Result<Vec<u8>, PortError>
where
    P: SerialPortAdapter + ?Sized,
{
    let mut buffer = vec![0u8; chunk.max(1)];
    let mut out = Vec::new();

    while port.poll()? {
        match port.read_bytes(&mut buffer) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buffer[..n]),
            Err(e) if e.is_would_block() => break,
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

/// Write all of `data`, retrying while the driver's queue is full.
///
/// Fails with `TimedOut` if the remainder is still not accepted after `timeout`.
pub fn write_all<P>(port: &mut P, data: &[u8], timeout: Duration) -> Result<(), PortError>
where
    P: SerialPortAdapter + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let mut written = 0;

    while written < data.len() {
        match port.write_bytes(&data[written..]) {
            Ok(n) if n > 0 => {
                written += n;
                continue;
            }
            Ok(_) => {}
            Err(e) if e.is_would_block() => {}
            Err(e) => return Err(e),
        }

        if Instant::now() >= deadline {
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!(
                    "wrote {} of {} bytes to {} before timing out",
                    written,
                    data.len(),
                    port.name()
                ),
            )));
        }
        thread::sleep(WRITE_RETRY_INTERVAL);
    }
    Ok(())
}

/// Poll for `duration`, handing every received chunk to `on_data`.
pub fn monitor<P, F>(
    port: &mut P,
    duration: Duration,
    interval: Duration,
    chunk: usize,
    mut on_data: F,
) -> Result<MonitorSummary, PortError>
where
    P: SerialPortAdapter + ?Sized,
    F: FnMut(&[u8]),
{
    let deadline = Instant::now() + duration;
    let mut summary = MonitorSummary::default();

    loop {
        summary.polls += 1;
        let data = drain(port, chunk)?;
        if !data.is_empty() {
            summary.bytes_read += data.len() as u64;
            summary.chunks += 1;
            on_data(&data);
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(interval.min(deadline - now));
    }

    debug!(
        "Monitored {} for {:?}: {} bytes in {} chunks",
        port.name(),
        duration,
        summary.bytes_read,
        summary.chunks
    );
    Ok(summary)
}

// ========== Loopback ==========

/// Send `message` on `tx` and collect it on `rx`.
///
/// The receive queue of `rx` is flushed first so stale bytes do not count.
/// Collection stops once as many bytes as were sent have arrived or `timeout`
/// passes; a short `received` is reported, not treated as an error.
pub fn loopback_exchange<T, R>(
    tx: &mut T,
    rx: &mut R,
    message: &[u8],
    timeout: Duration,
) -> Result<LoopbackReport, PortError>
where
    T: SerialPortAdapter + ?Sized,
    R: SerialPortAdapter + ?Sized,
{
    let started = Instant::now();
    let deadline = started + timeout;

    rx.flush_queues(FlushSelection::INPUT)?;
    let idle_before_write = !rx.poll()?;

    write_all(tx, message, timeout)?;
    let ready_after_write = wait_readable(rx, timeout, WRITE_RETRY_INTERVAL)?;

    let mut received = Vec::with_capacity(message.len());
    while ready_after_write && received.len() < message.len() {
        received.extend(drain(rx, message.len())?);
        if received.len() >= message.len() {
            break;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || !wait_readable(rx, remaining, WRITE_RETRY_INTERVAL)? {
            break;
        }
    }

    let report = LoopbackReport {
        tx_port: tx.name().to_string(),
        rx_port: rx.name().to_string(),
        idle_before_write,
        ready_after_write,
        bytes_sent: message.len(),
        received,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    debug!(
        "Loopback {} -> {}: sent {} received {}",
        report.tx_port,
        report.rx_port,
        report.bytes_sent,
        report.received.len()
    );
    Ok(report)
}

// ========== Tests ==========
