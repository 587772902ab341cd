//! Unified error types for the irrigation controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! pipeline's handling of partial failures uniform.  All variants are `Copy`
//! so they can be recorded in the cycle trace and passed through the FSM
//! context without allocation.

use core::fmt;

use crate::agronomy::FORECAST_DAYS;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in a control cycle funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The weather provider could not deliver a usable forecast.
    /// Fatal to the cycle: no reliable decision is possible.
    ProviderUnavailable(WeatherError),
    /// The soil moisture sensor could not be read.
    Sensor(SensorError),
    /// The pump command was not confirmed.
    Actuator(ActuatorError),
    /// A prediction model could not be used.
    Model(ModelError),
    /// A telemetry message could not be published.
    Publish(PublishError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable(e) => write!(f, "weather provider unavailable: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Model(e) => write!(f, "model: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Weather provider errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherError {
    /// Connection refused, DNS failure or request timeout.
    Unreachable,
    /// The provider answered with a non-2xx status.
    HttpStatus(u16),
    /// The response body could not be decoded.
    Malformed,
    /// Fewer forecast days than the decision horizon needs.
    Incomplete { got: usize },
    /// More days were requested than a forecast can hold.
    HorizonTooLong { requested: usize },
}

impl fmt::Display for WeatherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "provider unreachable"),
            Self::HttpStatus(code) => write!(f, "HTTP status {code}"),
            Self::Malformed => write!(f, "malformed forecast response"),
            Self::Incomplete { got } => write!(f, "incomplete forecast ({got} days)"),
            Self::HorizonTooLong { requested } => {
                write!(f, "{requested} days requested, at most {FORECAST_DAYS} supported")
            }
        }
    }
}

impl From<WeatherError> for Error {
    fn from(e: WeatherError) -> Self {
        Self::ProviderUnavailable(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Serial port could not be opened or written.
    Unreachable,
    /// No non-empty line arrived before the deadline.
    Timeout,
    /// The reply was not a single integer line.
    Protocol,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "sensor unreachable"),
            Self::Timeout => write!(f, "no reply before deadline"),
            Self::Protocol => write!(f, "malformed reply"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Serial port could not be opened or the command could not be written.
    Unreachable,
    /// The controller answered with something other than the ack token.
    NotAcknowledged,
    /// The command was written but no reply arrived.  The pump may be
    /// running unconfirmed.
    NoReply,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "actuator unreachable"),
            Self::NotAcknowledged => write!(f, "command not acknowledged"),
            Self::NoReply => write!(f, "no acknowledgment (pump state unconfirmed)"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Model errors
// ---------------------------------------------------------------------------

/// Which of the three prediction capabilities failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    MoistureForecast,
    IrrigationClassifier,
    IrrigationAmount,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoistureForecast => write!(f, "moisture forecast"),
            Self::IrrigationClassifier => write!(f, "irrigation classifier"),
            Self::IrrigationAmount => write!(f, "irrigation amount"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelError {
    /// The artifact is missing, unreadable or corrupt.
    Unavailable(ModelKind),
    /// The artifact's inputs or outputs do not match what the caller supplies.
    ShapeMismatch {
        kind: ModelKind,
        expected: usize,
        found: usize,
    },
}

impl ModelError {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Unavailable(kind) | Self::ShapeMismatch { kind, .. } => *kind,
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(kind) => write!(f, "{kind} model unavailable"),
            Self::ShapeMismatch {
                kind,
                expected,
                found,
            } => write!(
                f,
                "{kind} model shape mismatch (expected {expected}, found {found})"
            ),
        }
    }
}

impl From<ModelError> for Error {
    fn from(e: ModelError) -> Self {
        Self::Model(e)
    }
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The broker connection is gone.
    Disconnected,
    /// The outbound queue refused the message.
    Rejected,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "broker disconnected"),
            Self::Rejected => write!(f, "message rejected"),
        }
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
