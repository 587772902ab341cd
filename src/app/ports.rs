//! Port traits — the hexagonal boundary between the decision core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DecisionPipeline (domain)
//! ```
//!
//! Driven adapters (weather provider, serial sensor and pump, model store,
//! telemetry broker, event log) implement these traits.  The
//! [`DecisionPipeline`](super::service::DecisionPipeline) receives them as a
//! [`CyclePorts`] bundle per cycle, so the domain never touches a socket or a
//! serial device directly.
//!
//! ## Failure contract
//!
//! - [`SoilSensorPort`] and [`PumpPort`] never fail: they report degraded
//!   outcomes in their return values (fallback reading, `Ack`).
//! - Every other port returns a typed error the pipeline must handle; none of
//!   them may panic or block past its own deadline.

use crate::agronomy::Forecast;
use crate::drivers::pump::Actuation;
use crate::error::{ModelError, PublishError, WeatherError};
use crate::prediction::{ClassifierFeatures, IrrigationFeatures, MoistureFeatures};
use crate::sensors::SoilMoistureReading;

use super::events::CycleEvent;

// ───────────────────────────────────────────────────────────────
// Weather source (driven adapter: provider → domain)
// ───────────────────────────────────────────────────────────────

/// Daily forecast provider.
pub trait WeatherSource {
    /// Fetch `days` consecutive days starting today for `location`.
    ///
    /// Implementations return exactly `days` entries or an error; a short
    /// answer is [`WeatherError::Incomplete`].
    fn fetch_forecast(&mut self, location: &str, days: usize) -> Result<Forecast, WeatherError>;
}

// ───────────────────────────────────────────────────────────────
// Soil sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

pub trait SoilSensorPort {
    /// One reading per call; falls back to a configured default on failure.
    fn read_moisture(&mut self) -> SoilMoistureReading;
}

// ───────────────────────────────────────────────────────────────
// Prediction port (driven adapter: model artifacts → domain)
// ───────────────────────────────────────────────────────────────

/// The three trained capabilities the decision relies on.
///
/// Feature vectors are typed structs; an artifact trained on a different
/// feature list is rejected with [`ModelError::ShapeMismatch`] instead of
/// silently producing a wrong answer.
pub trait PredictionPort {
    /// Moisture fraction (0–1) for day 2 and day 3.
    fn forecast_moisture(&self, features: &MoistureFeatures) -> Result<[f64; 2], ModelError>;

    /// Whether today needs irrigation.
    fn classify_irrigate(&self, features: &ClassifierFeatures) -> Result<bool, ModelError>;

    /// Water depth (mm) to apply today.
    fn predict_amount(&self, features: &IrrigationFeatures) -> Result<f64, ModelError>;
}

// ───────────────────────────────────────────────────────────────
// Pump port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

pub trait PumpPort {
    /// Deliver `amount_mm`; the returned [`Actuation`] says whether the
    /// controller confirmed.
    fn irrigate(&mut self, amount_mm: f64) -> Actuation;
}

// ───────────────────────────────────────────────────────────────
// Telemetry sink (driven adapter: domain → broker)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
    /// 0, 1 or 2.
    pub qos: u8,
    pub retain: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            qos: 1,
            retain: true,
        }
    }
}

/// Generic publish/subscribe sink for the cycle's outputs.
pub trait TelemetrySink {
    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
        options: PublishOptions,
    ) -> Result<(), PublishError>;

    /// Block until queued messages are delivered or the sink's own deadline
    /// passes.  Sinks without a queue have nothing to do.
    fn flush(&mut self) -> Result<(), PublishError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The pipeline emits structured [`CycleEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &CycleEvent);
}

// ───────────────────────────────────────────────────────────────
// Per-cycle bundle
// ───────────────────────────────────────────────────────────────

/// Everything one cycle talks to, borrowed for the duration of the cycle.
pub struct CyclePorts<'a> {
    pub weather: &'a mut dyn WeatherSource,
    pub soil: &'a mut dyn SoilSensorPort,
    pub models: &'a dyn PredictionPort,
    pub pump: &'a mut dyn PumpPort,
    pub telemetry: &'a mut dyn TelemetrySink,
    pub events: &'a mut dyn EventSink,
}
