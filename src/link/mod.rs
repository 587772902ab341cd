//! Serial link layer shared by the sensor and pump clients.
//!
//! ```text
//!  SoilMoistureSensor ─┐                    ┌─▶ LinkOpener ─▶ SerialLink
//!                      ├─▶ SerialBus (lock) ┤
//!  PumpActuator ───────┘                    └─▶ LineReader (polled, deadline)
//! ```

pub mod bus;
pub mod line;
pub mod transport;

pub use bus::SerialBus;
pub use line::{LineError, LineReader};
pub use transport::{LinkOpener, SerialLink, write_all};
