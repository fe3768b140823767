//! Tests requiring actual serial hardware.
//!
//! These tests are skipped if no hardware is available.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! # Set environment variables
//! export TEST_PORT=/dev/ttyUSB0          # or \\.\COM3 on Windows
//! export TEST_PEER_PORT=/dev/ttyUSB1     # other end of a null-modem cable
//! export TEST_BAUD=115200                # optional, default: 115200
//!
//! # Run tests
//! cargo test --features hardware-tests -- --ignored
//! ```

use serialpoll::port::{
    self, FlowControl, FlushSelection, Parity, PortConfiguration, PortError, SerialPortAdapter,
};
use serialpoll::service;
use std::time::Duration;

use crate::common::MESSAGE;
use crate::hardware::utils::{PairFixture, TestPortConfig, TimingHelper};
use crate::{skip_without_hardware, skip_without_peer};

const ARRIVAL: Duration = Duration::from_secs(1);
const INTERVAL: Duration = Duration::from_millis(2);

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_open_close() {
    skip_without_hardware!();
    let env = TestPortConfig::from_env().unwrap();
    println!("Testing port: {} at {} baud", env.port_name, env.baud_rate);

    let mut handle = port::open(&env.port_name).expect("open failed");
    handle
        .configure(&env.to_port_config())
        .expect("configure failed");
    assert_eq!(handle.name(), env.port_name);
    handle.close();

    // The device must be openable again after close.
    port::open(&env.port_name).expect("reopen failed").close();
}

#[test]
#[ignore]
fn test_real_port_reconfigure() {
    skip_without_hardware!();
    let env = TestPortConfig::from_env().unwrap();
    let mut handle = port::open(&env.port_name).unwrap();

    let timer = TimingHelper::new("reconfigure across standard rates");
    for rate in [9600u32, 19_200, 57_600, 115_200] {
        handle
            .configure(&PortConfiguration::new(rate))
            .unwrap_or_else(|e| panic!("configure at {} failed: {}", rate, e));
    }
    timer.finish();
    handle.close();
}

#[test]
#[ignore]
fn test_readiness_transfer_scenario() {
    skip_without_peer!();
    let config = PortConfiguration::new(115_200u32);
    let mut pair = PairFixture::setup(&config).expect("pair setup failed");
    pair.rx.flush_queues(FlushSelection::BOTH).unwrap();

    assert!(!pair.rx.poll().unwrap(), "receiver ready before any write");

    service::write_all(&mut pair.tx, MESSAGE, ARRIVAL).unwrap();
    assert!(service::wait_readable(&mut pair.rx, ARRIVAL, INTERVAL).unwrap());
    // Let the whole message land before reading a partial buffer.
    std::thread::sleep(Duration::from_millis(50));

    let mut buffer = [0u8; 8];
    assert_eq!(pair.rx.read_bytes(&mut buffer).unwrap(), 8);
    assert_eq!(&buffer, &MESSAGE[..8]);
    assert!(pair.rx.poll().unwrap(), "4 bytes should remain queued");

    let mut rest = [0u8; 8];
    assert_eq!(pair.rx.read_bytes(&mut rest).unwrap(), 4);
    assert_eq!(&rest[..4], &MESSAGE[8..]);
    assert!(!pair.rx.poll().unwrap());

    pair.teardown();
}

#[test]
#[ignore]
fn test_input_flush_with_software_flow() {
    skip_without_peer!();
    let config = PortConfiguration::new(115_200u32).with_flow_control(FlowControl::Software);
    let mut pair = PairFixture::setup(&config).expect("pair setup failed");

    service::write_all(&mut pair.tx, MESSAGE, ARRIVAL).unwrap();
    assert!(service::wait_readable(&mut pair.rx, ARRIVAL, INTERVAL).unwrap());
    std::thread::sleep(Duration::from_millis(50));

    pair.rx.flush_queues(FlushSelection::INPUT).unwrap();
    assert!(!pair.rx.poll().unwrap(), "flushed data was still delivered");

    pair.teardown();
}

#[test]
#[ignore]
fn test_custom_baud_rate_transfer() {
    skip_without_peer!();
    let config = PortConfiguration::new(7667u32);
    let mut pair = match PairFixture::setup(&config) {
        Some(p) => p,
        None => {
            println!("Adapter rejected 7667 baud; skipping");
            return;
        }
    };

    let report = service::loopback_exchange(&mut pair.tx, &mut pair.rx, MESSAGE, ARRIVAL).unwrap();
    assert!(report.idle_before_write);
    assert!(report.matches(MESSAGE), "received {:?}", report.received);

    pair.teardown();
}

#[test]
#[ignore]
fn test_stick_parity_behaviour() {
    skip_without_hardware!();
    let env = TestPortConfig::from_env().unwrap();
    let mut handle = port::open(&env.port_name).unwrap();

    match handle.configure(&env.to_port_config().with_parity(Parity::Mark)) {
        Ok(()) => println!("Mark parity supported on this platform"),
        Err(PortError::ParityMarkSpaceUnsupported) => {
            println!("Mark parity unsupported; prior settings kept");
            handle.configure(&env.to_port_config()).unwrap();
        }
        Err(e) => panic!("unexpected error: {}", e),
    }
    handle.close();
}

#[cfg(unix)]
#[test]
#[ignore]
fn test_close_restores_original_registers() {
    skip_without_hardware!();
    let env = TestPortConfig::from_env().unwrap();

    let handle = port::open(&env.port_name).unwrap();
    let before = handle.snapshot().unwrap();
    handle.close();

    let mut handle = port::open(&env.port_name).unwrap();
    handle
        .configure(&PortConfiguration::new(57_600u32).with_parity(Parity::Even))
        .unwrap();
    assert_ne!(handle.snapshot().unwrap(), before);
    handle.close();

    let handle = port::open(&env.port_name).unwrap();
    assert_eq!(handle.snapshot().unwrap(), before);
    handle.close();
}
