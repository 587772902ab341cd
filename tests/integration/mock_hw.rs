//! Fake adapters for integration tests.
//!
//! Every fake records what the pipeline asked of it so tests can assert on
//! the full interaction history without a network, a broker or a board.
//! `ScriptedOpener` stands in for the OS serial layer: each open consumes
//! one scripted reply, delivered only after the request has been written.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use irrigator::agronomy::{DailyWeather, Forecast};
use irrigator::app::events::CycleEvent;
use irrigator::app::ports::{
    EventSink, PredictionPort, PublishOptions, PumpPort, SoilSensorPort, TelemetrySink,
    WeatherSource,
};
use irrigator::drivers::pump::{Ack, Actuation, PumpPlan, plan};
use irrigator::error::{ActuatorError, ModelError, PublishError, SensorError, WeatherError};
use irrigator::link::{LinkOpener, SerialLink};
use irrigator::prediction::{ClassifierFeatures, IrrigationFeatures, MoistureFeatures};
use irrigator::sensors::SoilMoistureReading;

// ── Weather ───────────────────────────────────────────────────

pub fn day(offset: u32, tmax: f64, tmin: f64, rain: bool) -> DailyWeather {
    DailyWeather {
        date: NaiveDate::from_ymd_opt(2024, 10, 1 + offset).unwrap(),
        tmax_c: tmax,
        tmin_c: tmin,
        rh_max_pct: 65.0,
        rh_min_pct: 45.0,
        wind_10m_ms: 3.0,
        rain_flag: rain,
        precip_mm: if rain { 6.0 } else { 0.0 },
    }
}

/// Three hot, dry days.
pub fn dry_spell() -> Forecast {
    let mut f = Forecast::new();
    for (i, (tmax, tmin)) in [(32.0, 20.0), (33.0, 21.0), (31.0, 19.0)]
        .into_iter()
        .enumerate()
    {
        f.push(day(i as u32, tmax, tmin, false)).unwrap();
    }
    f
}

pub struct FakeWeather {
    pub result: Result<Forecast, WeatherError>,
    pub requests: Vec<(String, usize)>,
}

#[allow(dead_code)]
impl FakeWeather {
    pub fn ok(forecast: Forecast) -> Self {
        Self {
            result: Ok(forecast),
            requests: Vec::new(),
        }
    }

    pub fn failing(e: WeatherError) -> Self {
        Self {
            result: Err(e),
            requests: Vec::new(),
        }
    }
}

impl WeatherSource for FakeWeather {
    fn fetch_forecast(&mut self, location: &str, days: usize) -> Result<Forecast, WeatherError> {
        self.requests.push((location.to_owned(), days));
        self.result.clone()
    }
}

// ── Soil sensor ───────────────────────────────────────────────

pub struct FakeSoil {
    pub reading: SoilMoistureReading,
    pub reads: usize,
}

#[allow(dead_code)]
impl FakeSoil {
    pub fn percent(percent: f64) -> Self {
        Self {
            reading: SoilMoistureReading::sensor(percent, 0),
            reads: 0,
        }
    }

    pub fn fallback(percent: f64, reason: SensorError) -> Self {
        Self {
            reading: SoilMoistureReading::fallback(percent, reason),
            reads: 0,
        }
    }
}

impl SoilSensorPort for FakeSoil {
    fn read_moisture(&mut self) -> SoilMoistureReading {
        self.reads += 1;
        self.reading
    }
}

// ── Models ────────────────────────────────────────────────────

pub struct FakeModels {
    pub forecast: Result<[f64; 2], ModelError>,
    pub classify: Result<bool, ModelError>,
    pub amount: Result<f64, ModelError>,
    pub forecast_calls: Cell<usize>,
    pub classify_calls: Cell<usize>,
    pub amount_calls: Cell<usize>,
    pub last_moisture_input: Cell<Option<MoistureFeatures>>,
}

#[allow(dead_code)]
impl FakeModels {
    /// Dry outlook, classifier says yes, regressor asks for `amount_mm`.
    pub fn irrigating(amount_mm: f64) -> Self {
        Self {
            forecast: Ok([0.10, 0.08]),
            classify: Ok(true),
            amount: Ok(amount_mm),
            forecast_calls: Cell::new(0),
            classify_calls: Cell::new(0),
            amount_calls: Cell::new(0),
            last_moisture_input: Cell::new(None),
        }
    }
}

impl PredictionPort for FakeModels {
    fn forecast_moisture(&self, features: &MoistureFeatures) -> Result<[f64; 2], ModelError> {
        self.forecast_calls.set(self.forecast_calls.get() + 1);
        self.last_moisture_input.set(Some(*features));
        self.forecast
    }

    fn classify_irrigate(&self, _features: &ClassifierFeatures) -> Result<bool, ModelError> {
        self.classify_calls.set(self.classify_calls.get() + 1);
        self.classify
    }

    fn predict_amount(&self, _features: &IrrigationFeatures) -> Result<f64, ModelError> {
        self.amount_calls.set(self.amount_calls.get() + 1);
        self.amount
    }
}

// ── Pump ──────────────────────────────────────────────────────

/// Plans like the real driver (1 m², 1200 L/h) and answers with `ack`.
pub struct RecordingPump {
    pub ack: Ack,
    pub calls: Vec<f64>,
}

#[allow(dead_code)]
impl RecordingPump {
    pub fn answering(ack: Ack) -> Self {
        Self {
            ack,
            calls: Vec::new(),
        }
    }
}

impl PumpPort for RecordingPump {
    fn irrigate(&mut self, amount_mm: f64) -> Actuation {
        self.calls.push(amount_mm);
        let plan = plan(amount_mm, 1.0, 1200.0);
        if let PumpPlan::NoAction(_) = plan {
            return Actuation {
                plan,
                ack: Ack::NotSent,
                error: None,
            };
        }
        let error = match self.ack {
            Ack::Ok | Ack::NotSent => None,
            Ack::Nack => Some(ActuatorError::NotAcknowledged),
            Ack::Unreachable => Some(ActuatorError::Unreachable),
        };
        Actuation {
            plan,
            ack: self.ack,
            error,
        }
    }
}

// ── Telemetry ─────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTelemetry {
    pub messages: Vec<(String, String, PublishOptions)>,
    /// Refuse every publish after this many have been accepted.
    pub fail_after: Option<usize>,
    pub flushes: usize,
}

#[allow(dead_code)]
impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(&self, topic: &str) -> Option<&str> {
        self.messages
            .iter()
            .find(|(t, _, _)| t == topic)
            .map(|(_, p, _)| p.as_str())
    }

    pub fn topics(&self) -> Vec<&str> {
        self.messages.iter().map(|(t, _, _)| t.as_str()).collect()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
        options: PublishOptions,
    ) -> Result<(), PublishError> {
        if self.fail_after.is_some_and(|n| self.messages.len() >= n) {
            return Err(PublishError::Disconnected);
        }
        self.messages
            .push((topic.to_owned(), payload.to_owned(), options));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PublishError> {
        self.flushes += 1;
        Ok(())
    }
}

// ── Events ────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEvents {
    pub events: Vec<CycleEvent>,
}

#[allow(dead_code)]
impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vetoed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, CycleEvent::RegressorVeto { .. }))
    }
}

impl EventSink for RecordingEvents {
    fn emit(&mut self, event: &CycleEvent) {
        self.events.push(event.clone());
    }
}

// ── Scripted serial link ──────────────────────────────────────

#[derive(Default)]
pub struct Script {
    /// One entry per open: the bytes the device answers with, if any.
    pub replies: VecDeque<Option<Vec<u8>>>,
    /// Everything written, one string per open.
    pub sent: Vec<String>,
    pub opens: usize,
    pub fail_open: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedOpener {
    pub script: Arc<Mutex<Script>>,
}

#[allow(dead_code)]
impl ScriptedOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, bytes: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .replies
            .push_back(Some(bytes.as_bytes().to_vec()));
        self
    }

    pub fn silent(&self) -> &Self {
        self.script.lock().unwrap().replies.push_back(None);
        self
    }

    pub fn fail_open(&self) {
        self.script.lock().unwrap().fail_open = true;
    }

    pub fn sent(&self) -> Vec<String> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn opens(&self) -> usize {
        self.script.lock().unwrap().opens
    }
}

impl LinkOpener for ScriptedOpener {
    fn open(&self, _port: &str, _baud_rate: u32) -> io::Result<Box<dyn SerialLink>> {
        let mut script = self.script.lock().unwrap();
        if script.fail_open {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
        }
        script.opens += 1;
        script.sent.push(String::new());
        let reply = script.replies.pop_front().flatten();
        Ok(Box::new(ScriptedLink {
            script: Arc::clone(&self.script),
            reply,
            // Stale bytes the client must discard before its request.
            rx: b"stale\n".iter().copied().collect(),
        }))
    }
}

struct ScriptedLink {
    script: Arc<Mutex<Script>>,
    reply: Option<Vec<u8>>,
    rx: VecDeque<u8>,
}

impl SerialLink for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut script = self.script.lock().unwrap();
        if let Some(last) = script.sent.last_mut() {
            last.push_str(&String::from_utf8_lossy(data));
        }
        if data.contains(&b'\n') {
            if let Some(reply) = self.reply.take() {
                self.rx.extend(reply);
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn available(&mut self) -> io::Result<usize> {
        Ok(self.rx.len())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.rx.clear();
        Ok(())
    }
}
