//! Irrigation controller library.
//!
//! Exposes the decision pipeline and its building blocks for the binary and
//! for integration testing.  Everything that touches a real serial port,
//! the weather provider or the broker is behind the `hardware` feature.

#![deny(unused_must_use)]

pub mod adapters;
pub mod agronomy;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod link;
pub mod prediction;
pub mod sensors;
