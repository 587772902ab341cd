//! Stage handlers and table builder for the decision cycle.
//!
//! ```text
//!  FETCH_WEATHER ──[no forecast]──────────────────────────────┐
//!       │                                                     │
//!  COMPUTE_ETO ─▶ READ_SOIL ─▶ FORECAST_MOISTURE ──[fail]──┐  │
//!                                   │                      │  │
//!                            COMPUTE_STRESS                │  │
//!                                   │                      │  │
//!                               CLASSIFY ──[no / fail]──▶ SKIP│
//!                                   │ yes                  ▲  │
//!                               IRRIGATE ──[veto / fail]───┘  │
//!                                   │                      │  │
//!                                   └─────▶ PUBLISH ◀──────┘◀─┘
//!                                              │
//!                                            DONE
//!
//!  Before every blocking stage: [budget exhausted] ──▶ SKIP
//! ```
//!
//! Every `on_update` transitions on its first call; `Done` is the only
//! state that returns `None`.

use log::{debug, info, warn};

use super::context::{CycleContext, CycleStatus, StopReason};
use super::{StateDescriptor, StateId};
use crate::agronomy::eto::{EtoSite, daily_eto};
use crate::agronomy::stress::{StressParams, horizon_stress};
use crate::agronomy::{DailyWeather, FORECAST_DAYS};
use crate::app::events::CycleEvent;
use crate::app::ports::PublishOptions;
use crate::drivers::pump::PumpPlan;
use crate::error::{Error, ModelError, ModelKind, WeatherError};
use crate::prediction::{ClassifierFeatures, IrrigationFeatures, MoistureFeatures};
use crate::sensors::ReadingSource;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::FetchWeather,
            name: "FetchWeather",
            on_enter: Some(fetch_weather_enter),
            on_exit: None,
            on_update: fetch_weather_update,
        },
        StateDescriptor {
            id: StateId::ComputeEto,
            name: "ComputeEto",
            on_enter: None,
            on_exit: None,
            on_update: compute_eto_update,
        },
        StateDescriptor {
            id: StateId::ReadSoil,
            name: "ReadSoil",
            on_enter: None,
            on_exit: None,
            on_update: read_soil_update,
        },
        StateDescriptor {
            id: StateId::ForecastMoisture,
            name: "ForecastMoisture",
            on_enter: None,
            on_exit: None,
            on_update: forecast_moisture_update,
        },
        StateDescriptor {
            id: StateId::ComputeStress,
            name: "ComputeStress",
            on_enter: None,
            on_exit: None,
            on_update: compute_stress_update,
        },
        StateDescriptor {
            id: StateId::Classify,
            name: "Classify",
            on_enter: None,
            on_exit: None,
            on_update: classify_update,
        },
        StateDescriptor {
            id: StateId::Irrigate,
            name: "Irrigate",
            on_enter: Some(irrigate_enter),
            on_exit: None,
            on_update: irrigate_update,
        },
        StateDescriptor {
            id: StateId::Skip,
            name: "Skip",
            on_enter: Some(skip_enter),
            on_exit: None,
            on_update: skip_update,
        },
        StateDescriptor {
            id: StateId::Publish,
            name: "Publish",
            on_enter: Some(publish_enter),
            on_exit: Some(publish_exit),
            on_update: publish_update,
        },
        StateDescriptor {
            id: StateId::Done,
            name: "Done",
            on_enter: Some(done_enter),
            on_exit: None,
            on_update: done_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared guards
// ═══════════════════════════════════════════════════════════════════════════

/// True (and the stop reason recorded) when no time is left for a blocking step.
fn over_budget(ctx: &mut CycleContext<'_>, stage: StateId) -> bool {
    if !ctx.budget_exhausted() {
        return false;
    }
    warn!(
        "{:?}: cycle budget of {}s exhausted, diverting to Skip",
        stage,
        ctx.budget.as_secs()
    );
    ctx.stop_because(StopReason::BudgetExhausted);
    true
}

/// Regressor columns, available once moisture has been forecast.
fn irrigation_features(ctx: &CycleContext<'_>) -> Option<IrrigationFeatures> {
    let (days, etos, soil, forecast) = (ctx.days?, ctx.etos?, ctx.soil?, ctx.forecast?);
    Some(IrrigationFeatures::assemble(
        [soil.fraction(), forecast[0], forecast[1]],
        &days,
        &etos,
    ))
}

// ═══════════════════════════════════════════════════════════════════════════
//  FETCH_WEATHER
// ═══════════════════════════════════════════════════════════════════════════

fn fetch_weather_enter(ctx: &mut CycleContext<'_>) {
    info!(
        "FETCH: requesting {}-day forecast for {}",
        FORECAST_DAYS, ctx.config.site.location
    );
}

fn fetch_weather_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    let config = ctx.config;
    let result = ctx
        .ports
        .weather
        .fetch_forecast(&config.site.location, FORECAST_DAYS)
        .and_then(|forecast| {
            <[DailyWeather; FORECAST_DAYS]>::try_from(forecast.as_slice()).map_err(|_| {
                WeatherError::Incomplete {
                    got: forecast.len(),
                }
            })
        });

    match result {
        Ok(days) => {
            ctx.days = Some(days);
            Some(StateId::ComputeEto)
        }
        Err(e) => {
            ctx.warn(StateId::FetchWeather, Error::ProviderUnavailable(e));
            ctx.status = CycleStatus::NoWeatherData;
            ctx.stop_because(StopReason::WeatherUnavailable);
            Some(StateId::Publish)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  COMPUTE_ETO
// ═══════════════════════════════════════════════════════════════════════════

fn compute_eto_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    let Some(days) = ctx.days else {
        return Some(StateId::Skip);
    };
    let site = EtoSite::from(&ctx.config.site);
    let etos: [_; FORECAST_DAYS] = core::array::from_fn(|i| daily_eto(i, &days[i], &site));
    for (day, eto) in days.iter().zip(&etos) {
        info!("ETO: {} -> {:.2} mm/day", day.date, eto.eto_mm_per_day);
    }
    ctx.etos = Some(etos);
    Some(StateId::ReadSoil)
}

// ═══════════════════════════════════════════════════════════════════════════
//  READ_SOIL — never fails, may fall back
// ═══════════════════════════════════════════════════════════════════════════

fn read_soil_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    if over_budget(ctx, StateId::ReadSoil) {
        return Some(StateId::Skip);
    }
    let reading = ctx.ports.soil.read_moisture();
    if let ReadingSource::Fallback(reason) = reading.source {
        ctx.warn(StateId::ReadSoil, reason);
    }
    info!(
        "SOIL: {:.1}% ({})",
        reading.percent,
        if reading.is_fallback() { "fallback" } else { "sensor" }
    );
    ctx.soil = Some(reading);
    Some(StateId::ForecastMoisture)
}

// ═══════════════════════════════════════════════════════════════════════════
//  FORECAST_MOISTURE
// ═══════════════════════════════════════════════════════════════════════════

fn forecast_moisture_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    if over_budget(ctx, StateId::ForecastMoisture) {
        return Some(StateId::Skip);
    }
    let (Some(days), Some(etos), Some(soil)) = (ctx.days, ctx.etos, ctx.soil) else {
        return Some(StateId::Skip);
    };

    let features = MoistureFeatures::assemble(soil.fraction(), &days, &etos);
    match ctx
        .ports
        .models
        .forecast_moisture(&features)
        .and_then(bounded_fractions)
    {
        Ok(forecast) => {
            let pct = [soil.percent, forecast[0] * 100.0, forecast[1] * 100.0];
            info!(
                "FORECAST: moisture today/+1/+2 = {:.1}/{:.1}/{:.1}%",
                pct[0], pct[1], pct[2]
            );
            ctx.forecast = Some(forecast);
            ctx.moisture_pct = Some(pct);
            Some(StateId::ComputeStress)
        }
        Err(e) => {
            ctx.warn(StateId::ForecastMoisture, e);
            ctx.stop_because(StopReason::ForecastUnavailable);
            Some(StateId::Skip)
        }
    }
}

/// Moisture fractions live in [0, 1].  A non-finite forecast is unusable;
/// a finite one outside the range is pinned to it.
fn bounded_fractions(forecast: [f64; 2]) -> Result<[f64; 2], ModelError> {
    if forecast.iter().any(|f| !f.is_finite()) {
        warn!("FORECAST: non-finite moisture forecast {:?}", forecast);
        return Err(ModelError::Unavailable(ModelKind::MoistureForecast));
    }
    let clamped = forecast.map(|f| f.clamp(0.0, 1.0));
    if clamped != forecast {
        warn!(
            "FORECAST: moisture {:?} outside [0, 1], clamped to {:?}",
            forecast, clamped
        );
    }
    Ok(clamped)
}

// ═══════════════════════════════════════════════════════════════════════════
//  COMPUTE_STRESS
// ═══════════════════════════════════════════════════════════════════════════

fn compute_stress_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    let (Some(pct), Some(etos)) = (ctx.moisture_pct, ctx.etos) else {
        return Some(StateId::Skip);
    };
    let params = StressParams::from(&ctx.config.stress);
    let stress = horizon_stress(&pct, &etos, &params);
    debug!(
        "STRESS: {:.2}/{:.2}/{:.2}",
        stress[0].value, stress[1].value, stress[2].value
    );
    ctx.stress = Some(stress);
    Some(StateId::Classify)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CLASSIFY
// ═══════════════════════════════════════════════════════════════════════════

fn classify_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    if over_budget(ctx, StateId::Classify) {
        return Some(StateId::Skip);
    }
    let (Some(base), Some(stress)) = (irrigation_features(ctx), ctx.stress) else {
        return Some(StateId::Skip);
    };

    let features = ClassifierFeatures::assemble(base, &stress);
    match ctx.ports.models.classify_irrigate(&features) {
        Ok(true) => {
            info!("CLASSIFY: irrigation needed today");
            ctx.decision.should_irrigate = true;
            Some(StateId::Irrigate)
        }
        Ok(false) => {
            info!("CLASSIFY: no irrigation today");
            ctx.stop_because(StopReason::ClassifierDeclined);
            Some(StateId::Skip)
        }
        Err(e) => {
            ctx.warn(StateId::Classify, e);
            ctx.stop_because(StopReason::ClassifierFailed);
            Some(StateId::Skip)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IRRIGATE — regressor, then pump
// ═══════════════════════════════════════════════════════════════════════════

fn irrigate_enter(ctx: &mut CycleContext<'_>) {
    debug!("IRRIGATE: {:?} left in cycle budget", ctx.remaining());
}

fn irrigate_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    if over_budget(ctx, StateId::Irrigate) {
        return Some(StateId::Skip);
    }
    let Some(features) = irrigation_features(ctx) else {
        return Some(StateId::Skip);
    };

    let amount_mm = match ctx.ports.models.predict_amount(&features) {
        Ok(amount) => amount,
        Err(e) => {
            ctx.warn(StateId::Irrigate, e);
            ctx.stop_because(StopReason::RegressorFailed);
            return Some(StateId::Skip);
        }
    };
    if amount_mm.is_nan() || amount_mm <= 0.0 {
        warn!(
            "IRRIGATE: regressor predicted {:.2} mm, overriding the classifier",
            amount_mm
        );
        ctx.ports
            .events
            .emit(&CycleEvent::RegressorVeto { amount_mm });
        ctx.stop_because(StopReason::RegressorVeto);
        return Some(StateId::Skip);
    }

    let actuation = ctx.ports.pump.irrigate(amount_mm);
    if let Some(e) = actuation.error {
        ctx.warn(StateId::Irrigate, e);
    }
    match actuation.plan {
        PumpPlan::Run { duration_s, .. } => {
            ctx.decision.amount_mm = amount_mm;
            ctx.decision.pump_duration_s = duration_s;
            ctx.decision.ack = actuation.ack;
            ctx.status = CycleStatus::Completed;
            ctx.stop_because(StopReason::Irrigated);
            Some(StateId::Publish)
        }
        PumpPlan::NoAction(reason) => {
            warn!("IRRIGATE: {:.2} mm gives no pump run ({:?})", amount_mm, reason);
            ctx.stop_because(StopReason::NothingToPump);
            Some(StateId::Skip)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  SKIP — no actuation, zeroed amount
// ═══════════════════════════════════════════════════════════════════════════

fn skip_enter(ctx: &mut CycleContext<'_>) {
    info!("SKIP: no irrigation this cycle ({:?})", ctx.stop_reason);
}

fn skip_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    ctx.decision.amount_mm = 0.0;
    ctx.decision.pump_duration_s = 0;
    ctx.status = CycleStatus::Skipped;
    Some(StateId::Publish)
}

// ═══════════════════════════════════════════════════════════════════════════
//  PUBLISH
// ═══════════════════════════════════════════════════════════════════════════

fn publish_enter(ctx: &mut CycleContext<'_>) {
    if ctx.status != CycleStatus::NoWeatherData {
        let decision = ctx.decision;
        ctx.ports.events.emit(&CycleEvent::Decided(decision));
    }
}

/// Topic suffixes and payloads for this cycle, in publish order.
fn telemetry_messages(ctx: &CycleContext<'_>) -> Vec<(&'static str, String)> {
    let status = ("status", ctx.status.label().to_owned());
    if ctx.status == CycleStatus::NoWeatherData {
        return vec![status];
    }

    let telemetry = &ctx.config.telemetry;
    let decision = &ctx.decision;
    let mut messages = Vec::with_capacity(8);
    if let Some(soil) = ctx.soil {
        messages.push(("soil_moisture", format!("{:.1}", soil.percent)));
        let source = if soil.is_fallback() { "fallback" } else { "sensor" };
        messages.push(("soil_moisture_source", source.to_owned()));
    }
    if let Some(stress) = ctx.stress {
        messages.push(("water_stress_today", format!("{:.2}", stress[0].value)));
    }
    let label = if decision.should_irrigate {
        &telemetry.yes_label
    } else {
        &telemetry.no_label
    };
    messages.push(("irrigate_today", label.clone()));
    messages.push(("amount_today_mm", format!("{:.2}", decision.amount_mm)));
    messages.push(("pump_duration_today_s", decision.pump_duration_s.to_string()));
    messages.push(("pump_ack", decision.ack.label().to_owned()));
    messages.push(status);
    messages
}

fn publish_update(ctx: &mut CycleContext<'_>) -> Option<StateId> {
    let config = ctx.config;
    let telemetry = &config.telemetry;
    let options = PublishOptions {
        qos: telemetry.qos,
        retain: telemetry.retain,
    };
    let prefix = telemetry.topic_prefix.trim_end_matches('/');

    for (suffix, payload) in telemetry_messages(ctx) {
        let topic = format!("{prefix}/{suffix}");
        debug!("PUBLISH: {} = {}", topic, payload);
        if let Err(e) = ctx.ports.telemetry.publish(&topic, &payload, options) {
            ctx.warn(StateId::Publish, e);
            break;
        }
    }
    Some(StateId::Done)
}

fn publish_exit(ctx: &mut CycleContext<'_>) {
    if let Err(e) = ctx.ports.telemetry.flush() {
        ctx.warn(StateId::Publish, e);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DONE — terminal
// ═══════════════════════════════════════════════════════════════════════════

fn done_enter(ctx: &mut CycleContext<'_>) {
    let (status, reason) = (ctx.status, ctx.stop_reason);
    ctx.ports
        .events
        .emit(&CycleEvent::Finished { status, reason });
}

fn done_update(_ctx: &mut CycleContext<'_>) -> Option<StateId> {
    None
}
