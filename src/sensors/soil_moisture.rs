//! Capacitive/resistive soil moisture sensor behind the microcontroller.
//!
//! The board answers `R <channel>\n` with the raw ADC value on one line.
//! A two-point calibration maps raw counts to a moisture percentage:
//!
//! ```text
//!   raw ──clamp[min_raw, max_raw]──▶ fraction ∈ [0,1] ──(invert?)──▶ × 100 = %
//! ```
//!
//! ## Failure policy
//!
//! A flaky sensor must not stop the cycle.  Any open error, timeout or
//! malformed reply yields the configured default tagged as
//! [`ReadingSource::Fallback`] with the reason; [`SoilMoistureSensor::read`]
//! never returns an error.

use core::fmt::Write as _;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::app::ports::SoilSensorPort;
use crate::config::SystemConfig;
use crate::error::SensorError;
use crate::link::{LineError, LineReader, SerialBus, SerialLink, write_all};

/// Where a moisture value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingSource {
    /// A live, calibrated sensor reading.
    Sensor,
    /// The configured default, substituted because the read failed.
    Fallback(SensorError),
}

/// Soil moisture as consumed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilMoistureReading {
    /// Volumetric moisture (%), within [0, 100].
    pub percent: f64,
    pub source: ReadingSource,
    /// Raw ADC count, when the sensor answered.
    pub raw: Option<i32>,
}

impl SoilMoistureReading {
    pub fn sensor(percent: f64, raw: i32) -> Self {
        Self {
            percent,
            source: ReadingSource::Sensor,
            raw: Some(raw),
        }
    }

    pub fn fallback(percent: f64, reason: SensorError) -> Self {
        Self {
            percent,
            source: ReadingSource::Fallback(reason),
            raw: None,
        }
    }

    /// Moisture as a fraction in [0, 1].
    pub fn fraction(&self) -> f64 {
        self.percent / 100.0
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ReadingSource::Fallback(_))
    }
}

/// Two-point calibration.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub min_raw: i32,
    pub max_raw: i32,
    /// The sensor reads higher for drier soil.
    pub invert: bool,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            min_raw: 200,
            max_raw: 900,
            invert: true,
        }
    }
}

impl Calibration {
    /// Map a raw count to moisture percent.
    pub fn to_percent(&self, raw: i32) -> f64 {
        let span = f64::from(self.max_raw) - f64::from(self.min_raw);
        if span <= 0.0 {
            return 0.0;
        }
        let clamped = raw.clamp(self.min_raw, self.max_raw);
        let mut fraction = (f64::from(clamped) - f64::from(self.min_raw)) / span;
        if self.invert {
            fraction = 1.0 - fraction;
        }
        fraction * 100.0
    }
}

/// Serial client for the moisture sensor.
pub struct SoilMoistureSensor {
    bus: Arc<SerialBus>,
    port: String,
    baud_rate: u32,
    channel: u8,
    cal: Calibration,
    settle_delay: Duration,
    poll_interval: Duration,
    timeout: Duration,
    default_percent: f64,
}

impl SoilMoistureSensor {
    pub fn new(bus: Arc<SerialBus>, config: &SystemConfig) -> Self {
        Self {
            bus,
            port: config.serial.sensor_port.clone(),
            baud_rate: config.serial.baud_rate,
            channel: config.sensor.channel,
            cal: Calibration {
                min_raw: config.sensor.min_raw,
                max_raw: config.sensor.max_raw,
                invert: config.sensor.invert,
            },
            settle_delay: config.serial.settle_delay(),
            poll_interval: config.serial.poll_interval(),
            timeout: Duration::from_secs(config.sensor.timeout_secs),
            default_percent: config.sensor.default_percent,
        }
    }

    /// Override the reply deadline (sub-second deadlines in tests).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn calibration(&self) -> Calibration {
        self.cal
    }

    /// Query the sensor once.  Never fails: see the module-level policy.
    pub fn read(&mut self) -> SoilMoistureReading {
        match self.query_raw() {
            Ok(raw) => {
                let percent = self.cal.to_percent(raw);
                info!("soil moisture: raw={} -> {:.1}%", raw, percent);
                SoilMoistureReading::sensor(percent, raw)
            }
            Err(reason) => {
                warn!(
                    "soil moisture read failed on {} ({}); using default {:.1}%",
                    self.port, reason, self.default_percent
                );
                SoilMoistureReading::fallback(self.default_percent, reason)
            }
        }
    }

    fn query_raw(&self) -> Result<i32, SensorError> {
        let mut command: heapless::String<16> = heapless::String::new();
        writeln!(command, "R {}", self.channel).map_err(|_| SensorError::Protocol)?;

        let settle = self.settle_delay;
        let timeout = self.timeout;
        let poll = self.poll_interval;
        self.bus
            .with_link(&self.port, self.baud_rate, |link| {
                thread::sleep(settle);
                exchange(link, command.as_bytes(), poll, timeout)
            })
            .map_err(|e| {
                debug!("open {} failed: {}", self.port, e);
                SensorError::Unreachable
            })?
    }
}

fn exchange(
    link: &mut dyn SerialLink,
    command: &[u8],
    poll: Duration,
    timeout: Duration,
) -> Result<i32, SensorError> {
    link.discard_input().map_err(|_| SensorError::Unreachable)?;
    write_all(link, command).map_err(|_| SensorError::Unreachable)?;

    // The deadline starts after the write, not after the settle delay.
    let deadline = Instant::now() + timeout;
    let line = LineReader::new(poll)
        .next_non_empty_line(link, deadline)
        .map_err(|e| match e {
            LineError::Timeout => SensorError::Timeout,
            LineError::Overflow => SensorError::Protocol,
            LineError::Io(_) => SensorError::Unreachable,
        })?;

    line.parse::<i32>().map_err(|_| {
        warn!("sensor replied {:?}, expected an integer", line);
        SensorError::Protocol
    })
}

impl SoilSensorPort for SoilMoistureSensor {
    fn read_moisture(&mut self) -> SoilMoistureReading {
        self.read()
    }
}
