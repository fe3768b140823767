//! Suites that drive real serial devices.
//!
//! `utils` reads `TEST_PORT`, `TEST_PEER_PORT` and `TEST_BAUD` and provides the
//! skip macros; the suites use them to pass vacuously on machines without
//! adapters attached.

pub mod port_discovery_tests;
pub mod real_port_tests;
pub mod utils;
