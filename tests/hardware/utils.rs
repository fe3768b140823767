//! Utility functions for hardware testing.
//!
//! Provides helpers for port discovery, test setup/teardown, and timing utilities.

use serialpoll::port::{self, NativePort, PortConfiguration, PortStub, SerialPortAdapter};
use std::env;
use std::time::{Duration, Instant};

/// Test port configuration from environment.
pub struct TestPortConfig {
    pub port_name: String,
    /// Second port wired to `port_name` through a null-modem cable.
    pub peer_name: Option<String>,
    pub baud_rate: u32,
}

impl TestPortConfig {
    /// Get test configuration from environment variables.
    pub fn from_env() -> Option<Self> {
        let port_name = env::var("TEST_PORT").ok()?;
        let peer_name = env::var("TEST_PEER_PORT").ok();
        let baud_rate = env::var("TEST_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(115_200);

        Some(TestPortConfig {
            port_name,
            peer_name,
            baud_rate,
        })
    }

    /// Create a port configuration for testing.
    pub fn to_port_config(&self) -> PortConfiguration {
        PortConfiguration::new(self.baud_rate)
    }
}

/// Discover all available serial ports on the system.
pub fn discover_available_ports() -> Vec<PortStub> {
    match port::iterate() {
        Ok(iter) => iter.filter_map(Result::ok).collect(),
        Err(_) => Vec::new(),
    }
}

/// Print available ports for debugging.
pub fn print_available_ports() {
    let ports = discover_available_ports();

    if ports.is_empty() {
        println!("No serial ports detected on this system");
        return;
    }

    println!("Available serial ports ({}):", ports.len());
    for (idx, stub) in ports.iter().enumerate() {
        println!("  {}. {} -> {}", idx + 1, stub.name(), stub.path());
    }
}

/// Check if a specific port path is enumerated.
pub fn is_port_available(path: &str) -> bool {
    discover_available_ports().iter().any(|p| p.path() == path)
}

/// Timing helper for measuring operation duration.
pub struct TimingHelper {
    start: Instant,
    name: String,
}

impl TimingHelper {
    pub fn new(name: &str) -> Self {
        println!("Starting: {}", name);
        TimingHelper {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        println!("Completed: {} in {:?}", self.name, elapsed);
        elapsed
    }
}

/// Both ends of a null-modem pair, opened and configured identically.
pub struct PairFixture {
    pub tx: NativePort,
    pub rx: NativePort,
}

impl PairFixture {
    /// Open `TEST_PORT` and `TEST_PEER_PORT` with `config`.
    pub fn setup(config: &PortConfiguration) -> Option<Self> {
        let env = TestPortConfig::from_env()?;
        let peer = env.peer_name.as_deref()?;
        println!(
            "Setting up pair fixture {} <-> {} at {}",
            env.port_name, peer, config
        );

        let tx = match port::open_with(&env.port_name, config) {
            Ok(p) => p,
            Err(e) => {
                println!("Failed to open {}: {}", env.port_name, e);
                return None;
            }
        };
        let rx = match port::open_with(peer, config) {
            Ok(p) => p,
            Err(e) => {
                println!("Failed to open {}: {}", peer, e);
                return None;
            }
        };
        Some(PairFixture { tx, rx })
    }

    pub fn teardown(self) {
        println!("Tearing down {} <-> {}", self.tx.name(), self.rx.name());
        self.tx.close();
        self.rx.close();
    }
}

/// Skip test with a clear message if hardware is not available.
#[macro_export]
macro_rules! skip_without_hardware {
    () => {
        if $crate::hardware::utils::TestPortConfig::from_env().is_none() {
            println!("Skipping: TEST_PORT environment variable not set");
            println!("   Set TEST_PORT=COM3 (or /dev/ttyUSB0) to run hardware tests");
            return;
        }
    };
}

/// Skip test unless a null-modem peer is configured.
#[macro_export]
macro_rules! skip_without_peer {
    () => {
        match $crate::hardware::utils::TestPortConfig::from_env() {
            Some(c) if c.peer_name.is_some() => {}
            _ => {
                println!("Skipping: TEST_PORT and TEST_PEER_PORT must both be set");
                println!("   This test requires two ports joined by a null-modem cable");
                return;
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_ports() {
        // Should not panic
        let ports = discover_available_ports();
        println!("Found {} ports", ports.len());
    }

    #[test]
    fn test_timing_helper() {
        let timer = TimingHelper::new("test operation");
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.finish();
        assert!(elapsed >= Duration::from_millis(10));
    }
}
