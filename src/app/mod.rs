//! Application core — decision logic, zero direct I/O.
//!
//! The irrigation cycle (forecast, ETo, soil reading, predictions, stress,
//! decision, pump, telemetry) is orchestrated here.  All interaction with
//! the outside world happens through the **port traits** in [`ports`],
//! keeping this layer testable without a network, a broker or a board.

pub mod events;
pub mod ports;
pub mod service;
