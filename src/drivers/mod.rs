//! Actuator drivers.
//!
//! The only actuator is the irrigation pump, switched by the microcontroller
//! on a timed serial command.

pub mod pump;

pub use pump::{Ack, Actuation, NoActionReason, PumpActuator, PumpPlan};
