//! Sensor subsystem.
//!
//! Only one sensor feeds the decision: the soil moisture sensor wired to the
//! microcontroller and queried over the serial link.

pub mod soil_moisture;

pub use soil_moisture::{Calibration, ReadingSource, SoilMoistureReading, SoilMoistureSensor};
