//! Irrigator — one decision cycle per invocation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Adapters (outer ring)                     │
//! │                                                                  │
//! │  WeatherApiClient   SoilMoistureSensor   PumpActuator            │
//! │  (WeatherSource)    (SoilSensorPort)     (PumpPort)              │
//! │  FileModelStore     MqttTelemetrySink    LogEventSink            │
//! │  (PredictionPort)   (TelemetrySink)      (EventSink)             │
//! │                                                                  │
//! │  ──────────────── Port Trait Boundary ───────────────────        │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐    │
//! │  │          DecisionPipeline (table-driven FSM)             │    │
//! │  └──────────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exit status: 0 when the cycle ran (including skips), 1 when no weather
//! data could be obtained, 2 when configuration or bootstrap failed.
//! Scheduling repeated cycles is left to cron or a systemd timer.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};

use irrigator::adapters::log_sink::{LogEventSink, LogTelemetrySink};
use irrigator::adapters::model_store::FileModelStore;
use irrigator::adapters::mqtt_sink::MqttTelemetrySink;
use irrigator::adapters::serial_port::SystemSerialOpener;
use irrigator::adapters::weather_api::WeatherApiClient;
use irrigator::app::ports::{CyclePorts, TelemetrySink};
use irrigator::app::service::{CycleReport, DecisionPipeline};
use irrigator::config::SystemConfig;
use irrigator::drivers::PumpActuator;
use irrigator::fsm::context::CycleStatus;
use irrigator::link::SerialBus;
use irrigator::sensors::SoilMoistureSensor;

/// Used when neither `IRRIGATOR_CONFIG` nor an argument names a file.
const DEFAULT_CONFIG: &str = "config/irrigator";

fn main() -> ExitCode {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Irrigator v{}", env!("CARGO_PKG_VERSION"));

    match run() {
        Ok(CycleStatus::NoWeatherData) => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("bootstrap failed: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<CycleStatus> {
    // ── 1. Configuration ──────────────────────────────────────
    let path = env::var("IRRIGATOR_CONFIG")
        .ok()
        .or_else(|| env::args().nth(1))
        .unwrap_or_else(|| DEFAULT_CONFIG.to_owned());
    let config = SystemConfig::load(Some(&path))
        .with_context(|| format!("loading configuration (file: {path})"))?;
    info!("config: location={}, area={} m²", config.site.location, config.site.area_m2);
    if config.weather.api_key.is_empty() {
        warn!("weather.api_key is empty; the provider will refuse the request");
    }

    // ── 2. Adapters ───────────────────────────────────────────
    let bus = Arc::new(SerialBus::new(SystemSerialOpener));
    let mut soil = SoilMoistureSensor::new(Arc::clone(&bus), &config);
    let mut pump = PumpActuator::new(Arc::clone(&bus), &config);
    let mut weather = WeatherApiClient::new(&config).context("building the weather client")?;
    let models = FileModelStore::new(&config.models);
    let mut events = LogEventSink::new();
    let mut telemetry: Box<dyn TelemetrySink> = if config.telemetry.enabled {
        Box::new(MqttTelemetrySink::connect(&config.telemetry))
    } else {
        info!("telemetry disabled; publishing to the log only");
        Box::new(LogTelemetrySink::new())
    };

    // ── 3. One cycle ──────────────────────────────────────────
    let mut pipeline = DecisionPipeline::new(config);
    let report = pipeline.run_cycle(CyclePorts {
        weather: &mut weather,
        soil: &mut soil,
        models: &models,
        pump: &mut pump,
        telemetry: telemetry.as_mut(),
        events: &mut events,
    });

    print_summary(&report);
    Ok(report.status)
}

/// Human-readable cycle summary on stdout.
fn print_summary(report: &CycleReport) {
    println!("── irrigation cycle {} ──", report.cycle);
    if let (Some(days), Some(etos)) = (report.days, report.etos) {
        for (i, (day, eto)) in days.iter().zip(&etos).enumerate() {
            let moisture = report
                .moisture_pct
                .map_or_else(|| "-".to_owned(), |m| format!("{:.1}%", m[i]));
            let stress = report
                .stress
                .map_or_else(|| "-".to_owned(), |s| format!("{:.2}", s[i].value));
            println!(
                "  {}  ETo {:>5.2} mm  moisture {:>6}  stress {:>5}",
                day.date, eto.eto_mm_per_day, moisture, stress
            );
        }
    } else {
        println!("  no weather data");
    }
    if let Some(soil) = report.soil {
        println!(
            "  soil now: {:.1}% ({})",
            soil.percent,
            if soil.is_fallback() { "fallback" } else { "sensor" }
        );
    }
    let d = &report.decision;
    println!(
        "  irrigate: {}  amount: {:.2} mm  pump: {} s  ack: {}",
        if d.should_irrigate { "yes" } else { "no" },
        d.amount_mm,
        d.pump_duration_s,
        d.ack.label()
    );
    println!(
        "  status: {} ({:?}), {} warning(s)",
        report.status.label(),
        report.stop_reason,
        report.warnings.len()
    );
    for w in &report.warnings {
        println!("    - {:?}: {}", w.stage, w.error);
    }
}
