//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against fake adapters.  No serial device, broker or network is needed.

mod mock_hw;
mod pipeline_tests;
mod serial_protocol_tests;
