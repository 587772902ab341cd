//! Line protocol tests: the real sensor and pump clients over a scripted link.

use std::sync::Arc;
use std::time::Duration;

use irrigator::app::ports::CyclePorts;
use irrigator::app::service::DecisionPipeline;
use irrigator::config::SystemConfig;
use irrigator::drivers::{Ack, NoActionReason, PumpActuator, PumpPlan};
use irrigator::error::{ActuatorError, Error, SensorError};
use irrigator::fsm::StateId;
use irrigator::fsm::context::CycleStatus;
use irrigator::link::SerialBus;
use irrigator::sensors::{ReadingSource, SoilMoistureSensor};

use crate::mock_hw::*;

const SHORT: Duration = Duration::from_millis(50);

fn quick_config() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.serial.settle_delay_ms = 0;
    config.serial.poll_interval_ms = 1;
    config.site.area_m2 = 2.0;
    config
}

fn rig() -> (ScriptedOpener, Arc<SerialBus>, SystemConfig) {
    let opener = ScriptedOpener::new();
    let bus = Arc::new(SerialBus::new(opener.clone()));
    (opener, bus, quick_config())
}

// ───────────────────────────────────────────────────────────────
// Soil moisture sensor
// ───────────────────────────────────────────────────────────────

#[test]
fn sensor_reads_and_calibrates() {
    let (opener, bus, config) = rig();
    opener.reply("550\r\n");
    let mut sensor = SoilMoistureSensor::new(bus, &config).with_timeout(SHORT);

    let reading = sensor.read();
    assert_eq!(reading.source, ReadingSource::Sensor);
    assert_eq!(reading.raw, Some(550));
    assert_eq!(reading.percent, 50.0);
    assert_eq!(opener.sent(), vec!["R 0\n".to_owned()]);
}

#[test]
fn sensor_skips_blank_lines_and_discards_stale_input() {
    let (opener, bus, config) = rig();
    opener.reply("\r\n\n900\n");
    let mut sensor = SoilMoistureSensor::new(bus, &config).with_timeout(SHORT);

    let reading = sensor.read();
    assert_eq!(reading.raw, Some(900));
    assert_eq!(reading.percent, 0.0);
}

#[test]
fn sensor_uses_the_configured_channel() {
    let (opener, bus, mut config) = rig();
    config.sensor.channel = 3;
    opener.reply("200\n");
    let mut sensor = SoilMoistureSensor::new(bus, &config).with_timeout(SHORT);

    assert_eq!(sensor.read().percent, 100.0);
    assert_eq!(opener.sent(), vec!["R 3\n".to_owned()]);
}

#[test]
fn silent_sensor_times_out_to_the_default() {
    let (opener, bus, config) = rig();
    opener.silent();
    let mut sensor = SoilMoistureSensor::new(bus, &config).with_timeout(SHORT);

    let reading = sensor.read();
    assert_eq!(reading.source, ReadingSource::Fallback(SensorError::Timeout));
    assert_eq!(reading.percent, config.sensor.default_percent);
    assert_eq!(reading.raw, None);
}

#[test]
fn garbage_reply_is_a_protocol_error() {
    let (opener, bus, config) = rig();
    opener.reply("abc\n");
    let mut sensor = SoilMoistureSensor::new(bus, &config).with_timeout(SHORT);

    assert_eq!(
        sensor.read().source,
        ReadingSource::Fallback(SensorError::Protocol)
    );
}

#[test]
fn missing_device_is_unreachable() {
    let (opener, bus, config) = rig();
    opener.fail_open();
    let mut sensor = SoilMoistureSensor::new(bus, &config).with_timeout(SHORT);

    assert_eq!(
        sensor.read().source,
        ReadingSource::Fallback(SensorError::Unreachable)
    );
}

// ───────────────────────────────────────────────────────────────
// Pump
// ───────────────────────────────────────────────────────────────

#[test]
fn pump_command_and_ack() {
    let (opener, bus, config) = rig();
    opener.reply("OK\r\n");
    let mut pump = PumpActuator::new(bus, &config).with_ack_timeout(SHORT);

    // 5 mm on 2 m² = 10 L at 1200 L/h = 30 s
    let actuation = pump.irrigate(5.0);
    assert_eq!(actuation.plan.duration_s(), 30);
    assert_eq!(actuation.ack, Ack::Ok);
    assert_eq!(actuation.error, None);
    assert_eq!(opener.sent(), vec!["ON 30\n".to_owned()]);
}

#[test]
fn pump_refusal_is_a_nack() {
    let (opener, bus, config) = rig();
    opener.reply("ERR\n");
    let mut pump = PumpActuator::new(bus, &config).with_ack_timeout(SHORT);

    let actuation = pump.irrigate(5.0);
    assert_eq!(actuation.ack, Ack::Nack);
    assert_eq!(actuation.error, Some(ActuatorError::NotAcknowledged));
}

#[test]
fn silent_pump_is_unconfirmed() {
    let (opener, bus, config) = rig();
    opener.silent();
    let mut pump = PumpActuator::new(bus, &config).with_ack_timeout(SHORT);

    let actuation = pump.irrigate(5.0);
    assert_eq!(actuation.ack, Ack::Nack);
    assert_eq!(actuation.error, Some(ActuatorError::NoReply));
    // The command went out even though nothing came back.
    assert_eq!(opener.sent(), vec!["ON 30\n".to_owned()]);
}

#[test]
fn unopenable_pump_is_unreachable() {
    let (opener, bus, config) = rig();
    opener.fail_open();
    let mut pump = PumpActuator::new(bus, &config).with_ack_timeout(SHORT);

    let actuation = pump.irrigate(5.0);
    assert_eq!(actuation.ack, Ack::Unreachable);
    assert_eq!(actuation.error, Some(ActuatorError::Unreachable));
}

#[test]
fn zero_amount_never_touches_the_port() {
    let (opener, bus, config) = rig();
    let mut pump = PumpActuator::new(bus, &config).with_ack_timeout(SHORT);

    let actuation = pump.irrigate(0.0);
    assert_eq!(
        actuation.plan,
        PumpPlan::NoAction(NoActionReason::NonPositiveAmount)
    );
    assert_eq!(actuation.ack, Ack::NotSent);
    assert_eq!(opener.opens(), 0);
}

// ───────────────────────────────────────────────────────────────
// Both clients sharing one port inside a cycle
// ───────────────────────────────────────────────────────────────

#[test]
fn cycle_over_a_shared_port() {
    let (opener, bus, config) = rig();
    opener.silent().reply("ERR\n");
    let mut soil = SoilMoistureSensor::new(Arc::clone(&bus), &config).with_timeout(SHORT);
    let mut pump = PumpActuator::new(bus, &config).with_ack_timeout(SHORT);

    let mut weather = FakeWeather::ok(dry_spell());
    let models = FakeModels::irrigating(5.0);
    let mut telemetry = RecordingTelemetry::new();
    let mut events = RecordingEvents::new();

    let mut pipeline = DecisionPipeline::new(config);
    let report = pipeline.run_cycle(CyclePorts {
        weather: &mut weather,
        soil: &mut soil,
        models: &models,
        pump: &mut pump,
        telemetry: &mut telemetry,
        events: &mut events,
    });

    // Default moisture (30 %) stands in for the silent sensor.
    let reading = report.soil.unwrap();
    assert!(reading.is_fallback());
    assert_eq!(reading.percent, 30.0);

    assert!(report.decision.should_irrigate);
    assert_eq!(report.decision.ack, Ack::Nack);
    assert_eq!(report.decision.pump_duration_s, 30);
    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.warnings.len(), 2);
    assert_eq!(report.warnings[0].stage, StateId::ReadSoil);
    assert_eq!(
        report.warnings[1].error,
        Error::Actuator(ActuatorError::NotAcknowledged)
    );

    assert_eq!(opener.sent(), vec!["R 0\n".to_owned(), "ON 30\n".to_owned()]);
    assert_eq!(telemetry.payload("irrigation/pump_ack"), Some("nack"));
}
