//! FAO-56 Penman-Monteith daily reference evapotranspiration.
//!
//! ```text
//!          0.408·Δ·(Rn − G) + γ·(900 / (T + 273))·u2·(es − ea)
//!   ETo = ─────────────────────────────────────────────────────
//!                       Δ + γ·(1 + 0.34·u2)
//! ```
//!
//! Humidity inputs are clamped so degenerate forecasts (RH > 100, or
//! minimum above maximum) cannot produce negative vapour pressure deficits
//! or NaN.  The result is clamped to ≥ 0.

use super::{DailyWeather, EtoResult};
use crate::config::SiteConfig;

/// Site constants that enter the equation alongside the weather.
#[derive(Debug, Clone, Copy)]
pub struct EtoSite {
    /// Altitude above sea level (m).
    pub altitude_m: f64,
    /// Soil heat flux density G (MJ/m²/day).
    pub soil_heat_flux: f64,
    /// Net radiation proxy on rainy days (MJ/m²/day).
    pub wet_day_radiation: f64,
    /// Net radiation proxy on dry days (MJ/m²/day).
    pub dry_day_radiation: f64,
}

impl From<&SiteConfig> for EtoSite {
    fn from(site: &SiteConfig) -> Self {
        Self {
            altitude_m: site.altitude_m,
            soil_heat_flux: site.soil_heat_flux,
            wet_day_radiation: site.wet_day_radiation,
            dry_day_radiation: site.dry_day_radiation,
        }
    }
}

impl EtoSite {
    /// The provider does not report radiation; it is proxied from the rain flag.
    pub fn net_radiation(&self, rain_flag: bool) -> f64 {
        if rain_flag {
            self.wet_day_radiation
        } else {
            self.dry_day_radiation
        }
    }
}

/// Convert a 10 m wind speed to the 2 m reference height (log profile).
pub fn wind_at_2m(u10: f64) -> f64 {
    u10 * (4.87 / (67.8_f64 * 10.0 - 5.42).ln())
}

/// Saturation vapour pressure (kPa) at `t_c` (Tetens form).
pub fn saturation_vapour_pressure(t_c: f64) -> f64 {
    0.6108 * ((17.27 * t_c) / (t_c + 237.3)).exp()
}

/// Atmospheric pressure (kPa) at `altitude_m` (barometric formula).
pub fn atmospheric_pressure(altitude_m: f64) -> f64 {
    101.3 * ((293.0 - 0.0065 * altitude_m) / 293.0).powf(5.26)
}

/// Psychrometric constant γ (kPa/°C) at `altitude_m`.
pub fn psychrometric_constant(altitude_m: f64) -> f64 {
    0.665e-3 * atmospheric_pressure(altitude_m)
}

/// Clamp humidity to [0,100] with `rh_min` at least one point below `rh_max`.
pub fn clamp_humidity(rh_max: f64, rh_min: f64) -> (f64, f64) {
    let rh_max = if rh_max.is_nan() { 0.0 } else { rh_max.clamp(0.0, 100.0) };
    let rh_min = if rh_min.is_nan() { 0.0 } else { rh_min };
    let rh_min = rh_min.min(rh_max - 1.0).clamp(0.0, 100.0);
    (rh_max, rh_min)
}

/// Daily reference evapotranspiration (mm/day), always ≥ 0.
#[allow(clippy::too_many_arguments)]
pub fn reference_eto(
    tmax: f64,
    tmin: f64,
    rh_max: f64,
    rh_min: f64,
    u10: f64,
    rn: f64,
    g: f64,
    altitude_m: f64,
) -> f64 {
    let (rh_max, rh_min) = clamp_humidity(rh_max, rh_min);

    let u2 = wind_at_2m(u10);
    let es_tmax = saturation_vapour_pressure(tmax);
    let es_tmin = saturation_vapour_pressure(tmin);
    let es = (es_tmax + es_tmin) / 2.0;
    let ea = (es_tmax * rh_min / 100.0 + es_tmin * rh_max / 100.0) / 2.0;

    let t_mean = (tmax + tmin) / 2.0;
    let delta = (4098.0 * es) / (t_mean + 237.3).powi(2);
    let gamma = psychrometric_constant(altitude_m);

    let denominator = delta + gamma * (1.0 + 0.34 * u2);
    if denominator == 0.0 {
        return 0.0;
    }

    let eto = (0.408 * delta * (rn - g) + gamma * (900.0 / (t_mean + 273.0)) * u2 * (es - ea))
        / denominator;

    if eto.is_finite() { eto.max(0.0) } else { 0.0 }
}

/// ETo for one forecast day.
pub fn daily_eto(day_index: usize, day: &DailyWeather, site: &EtoSite) -> EtoResult {
    EtoResult {
        day_index,
        eto_mm_per_day: reference_eto(
            day.tmax_c,
            day.tmin_c,
            day.rh_max_pct,
            day.rh_min_pct,
            day.wind_10m_ms,
            site.net_radiation(day.rain_flag),
            site.soil_heat_flux,
            site.altitude_m,
        ),
    }
}
