//! Agronomy arithmetic — pure functions, no I/O, no hidden state.
//!
//! - [`eto`] — FAO-56 Penman-Monteith daily reference evapotranspiration.
//! - [`stress`] — water stress score from soil moisture and ETo.
//!
//! The weather types consumed here are produced by a
//! [`WeatherSource`](crate::app::ports::WeatherSource) adapter.

pub mod eto;
pub mod stress;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of days in the decision horizon (today, +1, +2).
pub const FORECAST_DAYS: usize = 3;

/// Daily weather aggregates for one forecast day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyWeather {
    pub date: NaiveDate,
    /// Maximum air temperature (°C).
    pub tmax_c: f64,
    /// Minimum air temperature (°C).
    pub tmin_c: f64,
    /// Maximum relative humidity (%).
    pub rh_max_pct: f64,
    /// Minimum relative humidity (%).
    pub rh_min_pct: f64,
    /// Wind speed measured at 10 m (m/s).
    pub wind_10m_ms: f64,
    /// Provider expects rain on this day.
    pub rain_flag: bool,
    /// Total precipitation (mm).
    pub precip_mm: f64,
}

/// Exactly [`FORECAST_DAYS`] consecutive days, today first.
pub type Forecast = heapless::Vec<DailyWeather, FORECAST_DAYS>;

/// Reference evapotranspiration for one forecast day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtoResult {
    pub day_index: usize,
    /// Always ≥ 0 (mm/day).
    pub eto_mm_per_day: f64,
}

/// Crop water-deficit indicator for one forecast day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterStressScore {
    pub day_index: usize,
    /// Always ≥ 0.
    pub value: f64,
}
