//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements          | Connects to                    |
//! |----------------|---------------------|--------------------------------|
//! | `log_sink`     | EventSink           | `log` output                   |
//! |                | TelemetrySink       | `log` output (broker stand-in) |
//! | `model_store`  | PredictionPort      | JSON model artifacts on disk   |
//! | `weather_api`  | WeatherSource       | WeatherAPI.com over HTTPS      |
//! | `mqtt_sink`    | TelemetrySink       | MQTT broker                    |
//! | `serial_port`  | LinkOpener          | OS serial device (USB CDC)     |
//!
//! The soil sensor and pump clients implement their ports directly in
//! [`crate::sensors`] and [`crate::drivers`].  `mqtt_sink`, `serial_port`
//! and the HTTP half of `weather_api` need the `hardware` feature.

pub mod log_sink;
pub mod model_store;
#[cfg(feature = "hardware")]
pub mod mqtt_sink;
#[cfg(feature = "hardware")]
pub mod serial_port;
pub mod weather_api;
