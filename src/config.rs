//! System configuration parameters
//!
//! All tunable parameters for the irrigation controller, grouped by the
//! component that consumes them.
//!
//! Loading is hierarchical (lowest to highest precedence):
//! 1. Default values in code ([`SystemConfig::default`])
//! 2. An optional configuration file (TOML, JSON, ...)
//! 3. Environment variable overrides: `IRRIGATOR__<SECTION>__<KEY>`
//!
//! The result is validated before use.  Invalid ranges are rejected with
//! [`ConfigError::ValidationFailed`], never silently clamped.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "IRRIGATOR";

/// Core system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub site: SiteConfig,
    pub weather: WeatherConfig,
    pub serial: SerialConfig,
    pub sensor: SensorConfig,
    pub pump: PumpConfig,
    pub stress: StressConfig,
    pub models: ModelConfig,
    pub telemetry: TelemetryConfig,
    pub cycle: CycleConfig,
}

/// The plot being irrigated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Location query passed to the weather provider (city or "lat,lon").
    pub location: String,
    /// Site altitude above sea level (m).
    pub altitude_m: f64,
    /// Irrigated area (m²).
    pub area_m2: f64,
    /// Soil heat flux density G (MJ/m²/day).  Zero for daily steps.
    pub soil_heat_flux: f64,
    /// Net radiation proxy on days the provider flags rain (MJ/m²/day).
    pub wet_day_radiation: f64,
    /// Net radiation proxy on dry days (MJ/m²/day).
    pub dry_day_radiation: f64,
    /// Minimum humidity is estimated as `avg - spread` (percentage points).
    pub rh_min_spread_pct: f64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            location: "Sao Paulo".into(),
            altitude_m: 760.0,
            area_m2: 1.0,
            soil_heat_flux: 0.0,
            wet_day_radiation: 5.0,
            dry_day_radiation: 1.0,
            rh_min_spread_pct: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Base URL of the forecast API.
    pub api_base: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_base: "http://api.weatherapi.com/v1".into(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Serial link to the sensor / pump microcontroller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port the moisture sensor is attached to.
    pub sensor_port: String,
    /// Port the pump controller is attached to.  May equal `sensor_port`.
    pub pump_port: String,
    pub baud_rate: u32,
    /// Wait after opening the port before the first write (board reset).
    pub settle_delay_ms: u64,
    /// Sleep between polls while waiting for a reply line.
    pub poll_interval_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            sensor_port: "/dev/ttyACM0".into(),
            pump_port: "/dev/ttyACM0".into(),
            baud_rate: 9600,
            settle_delay_ms: 2000,
            poll_interval_ms: 100,
        }
    }
}

impl SerialConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Soil moisture sensor calibration and failure policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Analog channel queried with `R <channel>`.
    pub channel: u8,
    /// Raw reading at one calibration extreme (driest when `invert`).
    pub min_raw: i32,
    /// Raw reading at the other calibration extreme.
    pub max_raw: i32,
    /// True if the sensor reads higher for drier soil.
    pub invert: bool,
    /// Deadline for a reply line (s).
    pub timeout_secs: u64,
    /// Moisture (%) substituted when the sensor cannot be read.
    pub default_percent: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            min_raw: 200,
            max_raw: 900,
            invert: true,
            timeout_secs: 15,
            default_percent: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Pump flow rate (L/h).
    pub flow_rate_lph: f64,
    /// Deadline for the acknowledgment line (s).
    pub ack_timeout_secs: u64,
    /// Literal the controller sends after starting the pump.
    pub ack_token: String,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            flow_rate_lph: 1200.0,
            ack_timeout_secs: 10,
            ack_token: "OK".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Moisture (%) at or below which stress accumulates.
    pub alert_threshold_pct: f64,
    /// Crop tolerance coefficient.
    pub tolerance: f64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            alert_threshold_pct: 15.0,
            tolerance: 1.0,
        }
    }
}

/// Where the pre-trained model artifacts live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base directory; artifact paths below are resolved against it.
    pub base_dir: PathBuf,
    pub moisture_forecast: PathBuf,
    pub irrigation_classifier: PathBuf,
    pub irrigation_amount: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("models"),
            moisture_forecast: PathBuf::from("soil_moisture_forecast.json"),
            irrigation_classifier: PathBuf::from("irrigation_classifier.json"),
            irrigation_amount: PathBuf::from("irrigation_amount.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Publish to the broker.  When false, telemetry only goes to the log.
    pub enabled: bool,
    pub broker_host: String,
    pub broker_port: u16,
    /// Prefix for every topic, e.g. `irrigation/soil_moisture`.
    pub topic_prefix: String,
    /// 0, 1 or 2.
    pub qos: u8,
    /// Retained so a late subscriber sees the last value.
    pub retain: bool,
    /// Payloads for the daily decision topic.
    pub yes_label: String,
    pub no_label: String,
    /// Bound on waiting for publish acknowledgments before disconnecting (s).
    pub flush_timeout_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broker_host: "localhost".into(),
            broker_port: 1883,
            topic_prefix: "irrigation".into(),
            qos: 1,
            retain: true,
            yes_label: "Sim".into(),
            no_label: "Não".into(),
            flush_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Overall wall-clock budget for one cycle (s).
    pub budget_secs: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self { budget_secs: 120 }
    }
}

impl CycleConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }
}

// ───────────────────────────────────────────────────────────────
// Loading and validation
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    Load(config::ConfigError),
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Load(e) => write!(f, "config load failed: {}", e),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        Self::Load(e)
    }
}

impl SystemConfig {
    /// Load defaults, then `file` (if present), then environment overrides.
    pub fn load(file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let cfg: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make the pipeline unsafe or meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        use ConfigError::ValidationFailed as Invalid;

        let finite = [
            self.site.altitude_m,
            self.site.area_m2,
            self.site.soil_heat_flux,
            self.site.wet_day_radiation,
            self.site.dry_day_radiation,
            self.site.rh_min_spread_pct,
            self.sensor.default_percent,
            self.pump.flow_rate_lph,
            self.stress.alert_threshold_pct,
            self.stress.tolerance,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(Invalid("numeric parameters must be finite"));
        }
        if self.site.location.trim().is_empty() {
            return Err(Invalid("site.location must not be empty"));
        }
        if self.site.altitude_m >= 45_000.0 {
            return Err(Invalid("site.altitude_m out of range"));
        }
        if self.site.area_m2 <= 0.0 {
            return Err(Invalid("site.area_m2 must be positive"));
        }
        if !(0.0..=100.0).contains(&self.site.rh_min_spread_pct) {
            return Err(Invalid("site.rh_min_spread_pct must be within 0-100"));
        }
        if self.serial.baud_rate == 0 {
            return Err(Invalid("serial.baud_rate must be positive"));
        }
        if self.serial.poll_interval_ms == 0 {
            return Err(Invalid("serial.poll_interval_ms must be positive"));
        }
        if self.sensor.min_raw >= self.sensor.max_raw {
            return Err(Invalid("sensor.min_raw must be below sensor.max_raw"));
        }
        if !(0.0..=100.0).contains(&self.sensor.default_percent) {
            return Err(Invalid("sensor.default_percent must be within 0-100"));
        }
        if self.pump.flow_rate_lph <= 0.0 {
            return Err(Invalid("pump.flow_rate_lph must be positive"));
        }
        if self.pump.ack_token.trim().is_empty() {
            return Err(Invalid("pump.ack_token must not be empty"));
        }
        if !(0.0..=100.0).contains(&self.stress.alert_threshold_pct) {
            return Err(Invalid("stress.alert_threshold_pct must be within 0-100"));
        }
        if self.stress.tolerance < 0.0 {
            return Err(Invalid("stress.tolerance must not be negative"));
        }
        if self.telemetry.qos > 2 {
            return Err(Invalid("telemetry.qos must be 0, 1 or 2"));
        }
        if self.cycle.budget_secs == 0 {
            return Err(Invalid("cycle.budget_secs must be positive"));
        }
        Ok(())
    }
}
