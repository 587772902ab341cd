//! Named feature vectors for the three prediction capabilities.
//!
//! Each model was trained on a fixed, ordered column list.  The structs here
//! carry one named field per column and emit them in exactly the order of
//! their `NAMES`; nothing downstream ever builds a raw `Vec<f64>` by hand.
//!
//! Day suffixes: `d1` is today, `d2` tomorrow, `d3` the day after.
//! Moisture is a fraction (0–1), temperatures °C, precipitation and ETo mm.

use crate::agronomy::{DailyWeather, EtoResult, FORECAST_DAYS, WaterStressScore};

/// A fixed-order model input.
pub trait FeatureVector {
    /// Column names, in training order.
    const NAMES: &'static [&'static str];

    /// Values in the same order as [`Self::NAMES`].
    fn values(&self) -> Vec<f64>;
}

// ── Moisture forecast ─────────────────────────────────────────

/// Input of the moisture forecaster: today's moisture plus the weather of
/// the two days being forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoistureFeatures {
    pub soil_moisture_d1: f64,
    pub min_temp_d2: f64,
    pub max_temp_d2: f64,
    pub min_temp_d3: f64,
    pub max_temp_d3: f64,
    pub precipitation_d2: f64,
    pub precipitation_d3: f64,
    pub reference_et_d2: f64,
    pub reference_et_d3: f64,
}

impl MoistureFeatures {
    pub fn assemble(
        moisture_today: f64,
        days: &[DailyWeather; FORECAST_DAYS],
        etos: &[EtoResult; FORECAST_DAYS],
    ) -> Self {
        Self {
            soil_moisture_d1: moisture_today,
            min_temp_d2: days[1].tmin_c,
            max_temp_d2: days[1].tmax_c,
            min_temp_d3: days[2].tmin_c,
            max_temp_d3: days[2].tmax_c,
            precipitation_d2: days[1].precip_mm,
            precipitation_d3: days[2].precip_mm,
            reference_et_d2: etos[1].eto_mm_per_day,
            reference_et_d3: etos[2].eto_mm_per_day,
        }
    }
}

impl FeatureVector for MoistureFeatures {
    const NAMES: &'static [&'static str] = &[
        "soil_moisture_d1",
        "min_temp_d2",
        "max_temp_d2",
        "min_temp_d3",
        "max_temp_d3",
        "precipitation_d2",
        "precipitation_d3",
        "reference_et_d2",
        "reference_et_d3",
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.soil_moisture_d1,
            self.min_temp_d2,
            self.max_temp_d2,
            self.min_temp_d3,
            self.max_temp_d3,
            self.precipitation_d2,
            self.precipitation_d3,
            self.reference_et_d2,
            self.reference_et_d3,
        ]
    }
}

// ── Irrigation amount ─────────────────────────────────────────

/// Input of the amount regressor: three days of moisture, temperature,
/// precipitation and ETo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrrigationFeatures {
    pub soil_moisture_d1: f64,
    pub soil_moisture_d2: f64,
    pub soil_moisture_d3: f64,
    pub min_temp_d1: f64,
    pub min_temp_d2: f64,
    pub min_temp_d3: f64,
    pub max_temp_d1: f64,
    pub max_temp_d2: f64,
    pub max_temp_d3: f64,
    pub precipitation_d1: f64,
    pub precipitation_d2: f64,
    pub precipitation_d3: f64,
    pub reference_et_d1: f64,
    pub reference_et_d2: f64,
    pub reference_et_d3: f64,
}

impl IrrigationFeatures {
    /// `moisture` holds fractions for today, tomorrow and the day after.
    pub fn assemble(
        moisture: [f64; FORECAST_DAYS],
        days: &[DailyWeather; FORECAST_DAYS],
        etos: &[EtoResult; FORECAST_DAYS],
    ) -> Self {
        Self {
            soil_moisture_d1: moisture[0],
            soil_moisture_d2: moisture[1],
            soil_moisture_d3: moisture[2],
            min_temp_d1: days[0].tmin_c,
            min_temp_d2: days[1].tmin_c,
            min_temp_d3: days[2].tmin_c,
            max_temp_d1: days[0].tmax_c,
            max_temp_d2: days[1].tmax_c,
            max_temp_d3: days[2].tmax_c,
            precipitation_d1: days[0].precip_mm,
            precipitation_d2: days[1].precip_mm,
            precipitation_d3: days[2].precip_mm,
            reference_et_d1: etos[0].eto_mm_per_day,
            reference_et_d2: etos[1].eto_mm_per_day,
            reference_et_d3: etos[2].eto_mm_per_day,
        }
    }
}

impl FeatureVector for IrrigationFeatures {
    const NAMES: &'static [&'static str] = &[
        "soil_moisture_d1",
        "soil_moisture_d2",
        "soil_moisture_d3",
        "min_temp_d1",
        "min_temp_d2",
        "min_temp_d3",
        "max_temp_d1",
        "max_temp_d2",
        "max_temp_d3",
        "precipitation_d1",
        "precipitation_d2",
        "precipitation_d3",
        "reference_et_d1",
        "reference_et_d2",
        "reference_et_d3",
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.soil_moisture_d1,
            self.soil_moisture_d2,
            self.soil_moisture_d3,
            self.min_temp_d1,
            self.min_temp_d2,
            self.min_temp_d3,
            self.max_temp_d1,
            self.max_temp_d2,
            self.max_temp_d3,
            self.precipitation_d1,
            self.precipitation_d2,
            self.precipitation_d3,
            self.reference_et_d1,
            self.reference_et_d2,
            self.reference_et_d3,
        ]
    }
}

// ── Irrigation classifier ─────────────────────────────────────

/// Input of the yes/no classifier: the regressor's columns followed by the
/// three stress scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierFeatures {
    pub base: IrrigationFeatures,
    pub water_stress_d1: f64,
    pub water_stress_d2: f64,
    pub water_stress_d3: f64,
}

impl ClassifierFeatures {
    pub fn assemble(base: IrrigationFeatures, stress: &[WaterStressScore; FORECAST_DAYS]) -> Self {
        Self {
            base,
            water_stress_d1: stress[0].value,
            water_stress_d2: stress[1].value,
            water_stress_d3: stress[2].value,
        }
    }
}

impl FeatureVector for ClassifierFeatures {
    const NAMES: &'static [&'static str] = &[
        "soil_moisture_d1",
        "soil_moisture_d2",
        "soil_moisture_d3",
        "min_temp_d1",
        "min_temp_d2",
        "min_temp_d3",
        "max_temp_d1",
        "max_temp_d2",
        "max_temp_d3",
        "precipitation_d1",
        "precipitation_d2",
        "precipitation_d3",
        "reference_et_d1",
        "reference_et_d2",
        "reference_et_d3",
        "water_stress_d1",
        "water_stress_d2",
        "water_stress_d3",
    ];

    fn values(&self) -> Vec<f64> {
        let mut values = self.base.values();
        values.extend([
            self.water_stress_d1,
            self.water_stress_d2,
            self.water_stress_d3,
        ]);
        values
    }
}
