//! Whole-cycle tests: `DecisionPipeline` driven through fake ports.

use irrigator::app::events::CycleEvent;
use irrigator::app::ports::CyclePorts;
use irrigator::app::service::{CycleReport, DecisionPipeline};
use irrigator::config::SystemConfig;
use irrigator::drivers::Ack;
use irrigator::error::{
    ActuatorError, Error, ModelError, ModelKind, PublishError, SensorError, WeatherError,
};
use irrigator::fsm::StateId;
use irrigator::fsm::context::{CycleStatus, StopReason};

use crate::mock_hw::*;

struct Rig {
    pipeline: DecisionPipeline,
    weather: FakeWeather,
    soil: FakeSoil,
    models: FakeModels,
    pump: RecordingPump,
    telemetry: RecordingTelemetry,
    events: RecordingEvents,
}

impl Rig {
    fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    fn with_config(config: SystemConfig) -> Self {
        Self {
            pipeline: DecisionPipeline::new(config),
            weather: FakeWeather::ok(dry_spell()),
            soil: FakeSoil::percent(12.0),
            models: FakeModels::irrigating(5.0),
            pump: RecordingPump::answering(Ack::Ok),
            telemetry: RecordingTelemetry::new(),
            events: RecordingEvents::new(),
        }
    }

    fn run(&mut self) -> CycleReport {
        let report = self.pipeline.run_cycle(CyclePorts {
            weather: &mut self.weather,
            soil: &mut self.soil,
            models: &self.models,
            pump: &mut self.pump,
            telemetry: &mut self.telemetry,
            events: &mut self.events,
        });
        assert_terminated_once(&report);
        report
    }
}

fn assert_terminated_once(report: &CycleReport) {
    assert_eq!(report.trace.first(), Some(&StateId::FetchWeather));
    assert_eq!(report.trace.last(), Some(&StateId::Done));
    assert_eq!(
        report.trace.iter().filter(|s| **s == StateId::Done).count(),
        1
    );
    assert_ne!(report.stop_reason, StopReason::Pending);
}

fn has_warning(report: &CycleReport, stage: StateId, error: Error) -> bool {
    report
        .warnings
        .iter()
        .any(|w| w.stage == stage && w.error == error)
}

// ───────────────────────────────────────────────────────────────
// Happy path
// ───────────────────────────────────────────────────────────────

#[test]
fn dry_spell_irrigates_and_publishes() {
    let mut rig = Rig::new();
    let report = rig.run();

    assert_eq!(
        report.trace,
        vec![
            StateId::FetchWeather,
            StateId::ComputeEto,
            StateId::ReadSoil,
            StateId::ForecastMoisture,
            StateId::ComputeStress,
            StateId::Classify,
            StateId::Irrigate,
            StateId::Publish,
            StateId::Done,
        ]
    );
    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.stop_reason, StopReason::Irrigated);
    assert!(report.warnings.is_empty());

    // 5 mm on 1 m² at 1200 L/h = 15 s
    assert!(report.decision.should_irrigate);
    assert_eq!(report.decision.amount_mm, 5.0);
    assert_eq!(report.decision.pump_duration_s, 15);
    assert_eq!(report.decision.ack, Ack::Ok);
    assert_eq!(rig.pump.calls, vec![5.0]);

    assert_eq!(
        rig.telemetry.topics(),
        vec![
            "irrigation/soil_moisture",
            "irrigation/soil_moisture_source",
            "irrigation/water_stress_today",
            "irrigation/irrigate_today",
            "irrigation/amount_today_mm",
            "irrigation/pump_duration_today_s",
            "irrigation/pump_ack",
            "irrigation/status",
        ]
    );
    assert_eq!(rig.telemetry.payload("irrigation/soil_moisture"), Some("12.0"));
    assert_eq!(rig.telemetry.payload("irrigation/soil_moisture_source"), Some("sensor"));
    assert_eq!(rig.telemetry.payload("irrigation/irrigate_today"), Some("Sim"));
    assert_eq!(rig.telemetry.payload("irrigation/amount_today_mm"), Some("5.00"));
    assert_eq!(rig.telemetry.payload("irrigation/pump_duration_today_s"), Some("15"));
    assert_eq!(rig.telemetry.payload("irrigation/pump_ack"), Some("ok"));
    assert_eq!(rig.telemetry.payload("irrigation/status"), Some("ok"));
    assert_eq!(rig.telemetry.flushes, 1);
    for (_, _, options) in &rig.telemetry.messages {
        assert_eq!(options.qos, 1);
        assert!(options.retain);
    }
}

#[test]
fn weather_is_requested_for_the_configured_site() {
    let mut rig = Rig::new();
    rig.run();
    assert_eq!(rig.weather.requests, vec![("Sao Paulo".to_owned(), 3)]);
}

#[test]
fn stress_topic_matches_the_report() {
    let mut rig = Rig::new();
    let report = rig.run();

    let today = report.stress_today().unwrap();
    assert!(today > 0.0, "12 % is below the 15 % alert threshold");
    let expected = format!("{:.2}", today);
    assert_eq!(
        rig.telemetry.payload("irrigation/water_stress_today"),
        Some(expected.as_str())
    );
}

#[test]
fn moisture_model_sees_todays_fraction() {
    let mut rig = Rig::new();
    let report = rig.run();

    let input = rig.models.last_moisture_input.get().unwrap();
    assert!((input.soil_moisture_d1 - 0.12).abs() < 1e-12);
    let pct = report.moisture_pct.unwrap();
    assert_eq!(pct[0], 12.0);
    assert!((pct[1] - 10.0).abs() < 1e-9);
    assert!((pct[2] - 8.0).abs() < 1e-9);
}

#[test]
fn event_stream_brackets_the_cycle() {
    let mut rig = Rig::new();
    rig.run();

    let events = &rig.events.events;
    assert_eq!(events.first(), Some(&CycleEvent::Started { cycle: 1 }));
    assert!(matches!(
        events.last(),
        Some(CycleEvent::Finished {
            status: CycleStatus::Completed,
            reason: StopReason::Irrigated
        })
    ));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, CycleEvent::Decided(_)))
            .count(),
        1
    );
}

#[test]
fn cycles_are_numbered() {
    let mut rig = Rig::new();
    assert_eq!(rig.run().cycle, 1);
    assert_eq!(rig.run().cycle, 2);
    assert_eq!(rig.pipeline.cycles(), 2);
    assert_eq!(rig.pump.calls.len(), 2);
}

// ───────────────────────────────────────────────────────────────
// Weather failures
// ───────────────────────────────────────────────────────────────

#[test]
fn provider_down_publishes_only_the_no_data_marker() {
    let mut rig = Rig::new();
    rig.weather = FakeWeather::failing(WeatherError::Unreachable);
    let report = rig.run();

    assert_eq!(report.status, CycleStatus::NoWeatherData);
    assert_eq!(report.stop_reason, StopReason::WeatherUnavailable);
    assert_eq!(
        report.trace,
        vec![StateId::FetchWeather, StateId::Publish, StateId::Done]
    );
    assert!(has_warning(
        &report,
        StateId::FetchWeather,
        Error::ProviderUnavailable(WeatherError::Unreachable)
    ));

    assert_eq!(rig.soil.reads, 0);
    assert!(rig.pump.calls.is_empty());
    assert_eq!(rig.models.forecast_calls.get(), 0);
    assert_eq!(rig.telemetry.topics(), vec!["irrigation/status"]);
    assert_eq!(rig.telemetry.payload("irrigation/status"), Some("no-data"));
    assert!(
        !rig.events
            .events
            .iter()
            .any(|e| matches!(e, CycleEvent::Decided(_)))
    );
}

#[test]
fn short_forecast_counts_as_no_data() {
    let mut rig = Rig::new();
    let mut short = dry_spell();
    short.truncate(2);
    rig.weather = FakeWeather::ok(short);
    let report = rig.run();

    assert_eq!(report.status, CycleStatus::NoWeatherData);
    assert!(has_warning(
        &report,
        StateId::FetchWeather,
        Error::ProviderUnavailable(WeatherError::Incomplete { got: 2 })
    ));
}

// ───────────────────────────────────────────────────────────────
// Sensor fallback
// ───────────────────────────────────────────────────────────────

#[test]
fn sensor_timeout_falls_back_and_continues() {
    let mut rig = Rig::new();
    rig.soil = FakeSoil::fallback(30.0, SensorError::Timeout);
    let report = rig.run();

    assert!(report.visited(StateId::Classify));
    assert!(report.soil.unwrap().is_fallback());
    assert!(has_warning(
        &report,
        StateId::ReadSoil,
        Error::Sensor(SensorError::Timeout)
    ));
    assert_eq!(rig.telemetry.payload("irrigation/soil_moisture"), Some("30.0"));
    assert_eq!(
        rig.telemetry.payload("irrigation/soil_moisture_source"),
        Some("fallback")
    );
    assert_eq!(report.status, CycleStatus::Completed);
}

// ───────────────────────────────────────────────────────────────
// Model failures and vetoes
// ───────────────────────────────────────────────────────────────

#[test]
fn forecast_model_missing_skips() {
    let mut rig = Rig::new();
    rig.models.forecast = Err(ModelError::Unavailable(ModelKind::MoistureForecast));
    let report = rig.run();

    assert_eq!(report.status, CycleStatus::Skipped);
    assert_eq!(report.stop_reason, StopReason::ForecastUnavailable);
    assert!(report.visited(StateId::Skip));
    assert!(!report.visited(StateId::Classify));
    assert_eq!(rig.models.classify_calls.get(), 0);
    assert!(rig.pump.calls.is_empty());

    assert_eq!(rig.telemetry.payload("irrigation/water_stress_today"), None);
    assert_eq!(rig.telemetry.payload("irrigation/soil_moisture"), Some("12.0"));
    assert_eq!(rig.telemetry.payload("irrigation/irrigate_today"), Some("Não"));
    assert_eq!(rig.telemetry.payload("irrigation/amount_today_mm"), Some("0.00"));
    assert_eq!(rig.telemetry.payload("irrigation/pump_duration_today_s"), Some("0"));
    assert_eq!(rig.telemetry.payload("irrigation/pump_ack"), Some("not-sent"));
    assert_eq!(rig.telemetry.payload("irrigation/status"), Some("skipped"));
}

#[test]
fn out_of_range_forecast_is_clamped() {
    let mut rig = Rig::new();
    rig.models.forecast = Ok([-0.036, 1.14]);
    let report = rig.run();

    let pct = report.moisture_pct.unwrap();
    assert_eq!(pct, [12.0, 0.0, 100.0]);
    let stress = report.stress.unwrap();
    assert_eq!(stress[2].value, 0.0);
    assert!(stress[1].value > 0.0);
    assert!(report.warnings.is_empty());
    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(rig.models.classify_calls.get(), 1);
}

#[test]
fn non_finite_forecast_skips() {
    let mut rig = Rig::new();
    rig.models.forecast = Ok([f64::NAN, 0.1]);
    let report = rig.run();

    assert_eq!(report.status, CycleStatus::Skipped);
    assert_eq!(report.stop_reason, StopReason::ForecastUnavailable);
    assert!(has_warning(
        &report,
        StateId::ForecastMoisture,
        Error::Model(ModelError::Unavailable(ModelKind::MoistureForecast))
    ));
    assert_eq!(report.moisture_pct, None);
    assert_eq!(rig.models.classify_calls.get(), 0);
    assert!(rig.pump.calls.is_empty());
}

#[test]
fn classifier_declines() {
    let mut rig = Rig::new();
    rig.models.classify = Ok(false);
    let report = rig.run();

    assert_eq!(report.stop_reason, StopReason::ClassifierDeclined);
    assert!(!report.decision.should_irrigate);
    assert_eq!(rig.models.amount_calls.get(), 0);
    assert!(rig.pump.calls.is_empty());
    assert!(report.warnings.is_empty());
    assert!(report.stress.is_some());
}

#[test]
fn classifier_shape_mismatch_is_a_warning_and_a_skip() {
    let mut rig = Rig::new();
    let error = ModelError::ShapeMismatch {
        kind: ModelKind::IrrigationClassifier,
        expected: 17,
        found: 18,
    };
    rig.models.classify = Err(error);
    let report = rig.run();

    assert_eq!(report.stop_reason, StopReason::ClassifierFailed);
    assert!(has_warning(&report, StateId::Classify, Error::Model(error)));
    assert!(rig.pump.calls.is_empty());
    assert_eq!(report.status, CycleStatus::Skipped);
}

#[test]
fn zero_amount_vetoes_the_classifier() {
    let mut rig = Rig::new();
    rig.models.amount = Ok(0.0);
    let report = rig.run();

    assert_eq!(report.stop_reason, StopReason::RegressorVeto);
    assert!(rig.events.vetoed());
    assert!(rig.pump.calls.is_empty());
    // The classifier's verdict still stands in the published label.
    assert!(report.decision.should_irrigate);
    assert_eq!(report.decision.amount_mm, 0.0);
    assert_eq!(rig.telemetry.payload("irrigation/irrigate_today"), Some("Sim"));
    assert_eq!(rig.telemetry.payload("irrigation/amount_today_mm"), Some("0.00"));
    assert_eq!(report.status, CycleStatus::Skipped);
}

#[test]
fn negative_amount_vetoes_too() {
    let mut rig = Rig::new();
    rig.models.amount = Ok(-1.5);
    let report = rig.run();
    assert_eq!(report.stop_reason, StopReason::RegressorVeto);
    assert!(rig.pump.calls.is_empty());
}

#[test]
fn regressor_missing_skips() {
    let mut rig = Rig::new();
    rig.models.amount = Err(ModelError::Unavailable(ModelKind::IrrigationAmount));
    let report = rig.run();

    assert_eq!(report.stop_reason, StopReason::RegressorFailed);
    assert!(rig.pump.calls.is_empty());
    assert_eq!(report.warnings.len(), 1);
}

// ───────────────────────────────────────────────────────────────
// Pump outcomes
// ───────────────────────────────────────────────────────────────

#[test]
fn unconfirmed_pump_still_records_the_decision() {
    let mut rig = Rig::new();
    rig.pump = RecordingPump::answering(Ack::Nack);
    let report = rig.run();

    assert!(report.decision.should_irrigate);
    assert_eq!(report.decision.ack, Ack::Nack);
    assert_eq!(report.decision.pump_duration_s, 15);
    assert!(has_warning(
        &report,
        StateId::Irrigate,
        Error::Actuator(ActuatorError::NotAcknowledged)
    ));
    assert_eq!(rig.telemetry.payload("irrigation/pump_ack"), Some("nack"));
    assert_eq!(report.status, CycleStatus::Completed);
}

// ───────────────────────────────────────────────────────────────
// Budget and publish
// ───────────────────────────────────────────────────────────────

#[test]
fn exhausted_budget_never_reaches_the_pump() {
    let mut config = SystemConfig::default();
    config.cycle.budget_secs = 0;
    let mut rig = Rig::with_config(config);
    let report = rig.run();

    assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(rig.soil.reads, 0);
    assert!(rig.pump.calls.is_empty());
    assert!(report.visited(StateId::Publish));
    assert_eq!(rig.telemetry.payload("irrigation/soil_moisture"), None);
    assert_eq!(rig.telemetry.payload("irrigation/status"), Some("skipped"));
}

#[test]
fn broker_refusal_is_one_warning() {
    let mut rig = Rig::new();
    rig.telemetry.fail_after = Some(2);
    let report = rig.run();

    assert_eq!(rig.telemetry.messages.len(), 2);
    let publish_warnings: Vec<_> = report
        .warnings
        .iter()
        .filter(|w| w.stage == StateId::Publish)
        .collect();
    assert_eq!(publish_warnings.len(), 1);
    assert_eq!(
        publish_warnings[0].error,
        Error::Publish(PublishError::Disconnected)
    );
    // Actuation happened before publishing and is not undone.
    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(rig.pump.calls, vec![5.0]);
}

#[test]
fn custom_prefix_and_labels() {
    let mut config = SystemConfig::default();
    config.telemetry.topic_prefix = "farm/bed1/".into();
    config.telemetry.yes_label = "yes".into();
    config.telemetry.qos = 0;
    config.telemetry.retain = false;
    let mut rig = Rig::with_config(config);
    rig.run();

    assert_eq!(rig.telemetry.payload("farm/bed1/irrigate_today"), Some("yes"));
    let (_, _, options) = &rig.telemetry.messages[0];
    assert_eq!(options.qos, 0);
    assert!(!options.retain);
}
