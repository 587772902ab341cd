//! Water stress estimation.
//!
//! Stress accumulates only once soil moisture falls to the alert threshold:
//!
//! ```text
//!   moisture ≤ threshold:  stress = max(0, (threshold − moisture) · tolerance · ETo / 10)
//!   otherwise:             stress = 0
//! ```
//!
//! The `ETo / 10` factor is an empirical scaling carried by the trained
//! models' stress features; changing it invalidates them.

use super::{EtoResult, FORECAST_DAYS, WaterStressScore};
use crate::config::StressConfig;

/// Threshold and tolerance for the stress score.
#[derive(Debug, Clone, Copy)]
pub struct StressParams {
    /// Moisture (%) at or below which stress accumulates.
    pub alert_threshold_pct: f64,
    /// Crop tolerance coefficient.
    pub tolerance: f64,
}

impl From<&StressConfig> for StressParams {
    fn from(cfg: &StressConfig) -> Self {
        Self {
            alert_threshold_pct: cfg.alert_threshold_pct,
            tolerance: cfg.tolerance,
        }
    }
}

/// Stress score for a single day.
pub fn water_stress(moisture_pct: f64, eto_mm: f64, params: &StressParams) -> f64 {
    if moisture_pct <= params.alert_threshold_pct {
        let stress =
            (params.alert_threshold_pct - moisture_pct) * params.tolerance * (eto_mm / 10.0);
        if stress.is_finite() { stress.max(0.0) } else { 0.0 }
    } else {
        0.0
    }
}

/// Stress scores for the whole horizon, pairing each day's moisture with its ETo.
pub fn horizon_stress(
    moisture_pct: &[f64; FORECAST_DAYS],
    etos: &[EtoResult; FORECAST_DAYS],
    params: &StressParams,
) -> [WaterStressScore; FORECAST_DAYS] {
    core::array::from_fn(|i| WaterStressScore {
        day_index: etos[i].day_index,
        value: water_stress(moisture_pct[i], etos[i].eto_mm_per_day, params),
    })
}
