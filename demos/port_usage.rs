//! Example demonstrating the port abstraction module.
//!
//! Lists the serial devices on this host, then runs the poll/read loop against
//! an in-memory loopback pair. Pass a device path to run the same loop against
//! real hardware.
//!
//! ```bash
//! cargo run --example port_usage -- /dev/ttyUSB0
//! ```

use serialpoll::port::{
    self, FlushSelection, MockSerialPort, PortConfiguration, SerialPortAdapter,
};
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Port Abstraction Example ===\n");

    println!("1. Devices on this host:");
    list_devices()?;

    println!("\n2. Mock loopback pair:");
    mock_example()?;

    if let Some(path) = std::env::args().nth(1) {
        println!("\n3. Listening on {} for two seconds:", path);
        real_port_example(&path)?;
    }

    println!("\n=== Example complete ===");
    Ok(())
}

fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let mut found = 0;
    for stub in port::iterate()? {
        match stub {
            Ok(stub) => {
                found += 1;
                println!("  {} -> {}", stub.name(), stub.path());
            }
            Err(e) => println!("  (skipped entry: {})", e),
        }
    }
    if found == 0 {
        println!("  No serial devices found");
    }
    Ok(())
}

fn mock_example() -> Result<(), Box<dyn std::error::Error>> {
    let (mut tx, mut rx) = MockSerialPort::pair("MOCK0", "MOCK1");
    let config = PortConfiguration::new(115_200u32);
    tx.configure(&config)?;
    rx.configure(&config)?;

    println!("  ready before write: {}", rx.poll()?);
    tx.write_bytes(b"Hello World!")?;
    println!("  ready after write:  {}", rx.poll()?);

    let received = read_available(&mut rx)?;
    println!("  received: {}", String::from_utf8_lossy(&received));

    tx.close();
    rx.close();
    Ok(())
}

fn real_port_example(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut handle = port::open_with(path, &PortConfiguration::new(115_200u32))?;
    handle.flush_queues(FlushSelection::BOTH)?;

    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        let data = read_available(&mut handle)?;
        if !data.is_empty() {
            println!("  {} bytes: {:?}", data.len(), String::from_utf8_lossy(&data));
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    // Restores the settings the device had before `open_with`.
    handle.close();
    Ok(())
}

/// Works with any `SerialPortAdapter`: read until the port stops reporting ready.
fn read_available<P: SerialPortAdapter>(port: &mut P) -> Result<Vec<u8>, port::PortError> {
    let mut out = Vec::new();
    let mut buffer = [0u8; 64];
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
