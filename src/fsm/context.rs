//! Shared mutable context threaded through every stage handler.
//!
//! `CycleContext` is the "blackboard" of one decision cycle: the borrowed
//! ports, read-only configuration, every intermediate result as it becomes
//! known, the decision under construction and the cycle trace.  Stages fill
//! the `Option` slots in pipeline order; a `None` means "not available this
//! cycle" (not reached, or its producer failed).

use std::time::{Duration, Instant};

use crate::agronomy::{DailyWeather, EtoResult, FORECAST_DAYS, WaterStressScore};
use crate::app::events::CycleEvent;
use crate::app::ports::CyclePorts;
use crate::config::SystemConfig;
use crate::drivers::pump::Ack;
use crate::error::Error;
use crate::sensors::SoilMoistureReading;

use super::StateId;

// ---------------------------------------------------------------------------
// Decision output
// ---------------------------------------------------------------------------

/// Today's decision as published.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrrigationDecision {
    /// What the classifier said (false when it could not decide).
    pub should_irrigate: bool,
    /// Water actually commanded (mm), 0 on every skip path.
    pub amount_mm: f64,
    pub pump_duration_s: u32,
    /// Pump confirmation, independent of `should_irrigate`.
    pub ack: Ack,
}

impl Default for IrrigationDecision {
    fn default() -> Self {
        Self {
            should_irrigate: false,
            amount_mm: 0.0,
            pump_duration_s: 0,
            ack: Ack::NotSent,
        }
    }
}

/// Overall outcome of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// The pump branch ran (whatever the ack).
    Completed,
    /// The cycle ended on the Skip branch.
    Skipped,
    /// No forecast; nothing decided, only a marker published.
    NoWeatherData,
}

impl CycleStatus {
    /// Payload of the `status` topic.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "ok",
            Self::Skipped => "skipped",
            Self::NoWeatherData => "no-data",
        }
    }
}

/// Why the cycle ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Still running.
    Pending,
    WeatherUnavailable,
    ForecastUnavailable,
    ClassifierDeclined,
    ClassifierFailed,
    RegressorVeto,
    RegressorFailed,
    /// Amount was positive but the pump plan was a no-action.
    NothingToPump,
    BudgetExhausted,
    Irrigated,
}

/// A failure the cycle absorbed, tagged with the stage it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Warning {
    pub stage: StateId,
    pub error: Error,
}

// ---------------------------------------------------------------------------
// CycleContext
// ---------------------------------------------------------------------------

pub struct CycleContext<'a> {
    // -- Collaborators --
    pub ports: CyclePorts<'a>,
    pub config: &'a SystemConfig,

    // -- Timing --
    pub started: Instant,
    pub budget: Duration,

    // -- Blackboard --
    pub days: Option<[DailyWeather; FORECAST_DAYS]>,
    pub etos: Option<[EtoResult; FORECAST_DAYS]>,
    pub soil: Option<SoilMoistureReading>,
    /// Predicted moisture fraction for day 2 and day 3.
    pub forecast: Option<[f64; 2]>,
    /// Moisture percent for all three days (today measured, then forecast).
    pub moisture_pct: Option<[f64; FORECAST_DAYS]>,
    pub stress: Option<[WaterStressScore; FORECAST_DAYS]>,

    // -- Outcome --
    pub decision: IrrigationDecision,
    pub status: CycleStatus,
    pub stop_reason: StopReason,
    pub warnings: Vec<Warning>,
    /// Every state entered, in order, `Done` last.
    pub trace: Vec<StateId>,
}

impl<'a> CycleContext<'a> {
    pub fn new(ports: CyclePorts<'a>, config: &'a SystemConfig) -> Self {
        Self {
            ports,
            config,
            started: Instant::now(),
            budget: config.cycle.budget(),
            days: None,
            etos: None,
            soil: None,
            forecast: None,
            moisture_pct: None,
            stress: None,
            decision: IrrigationDecision::default(),
            status: CycleStatus::Skipped,
            stop_reason: StopReason::Pending,
            warnings: Vec::new(),
            trace: Vec::with_capacity(StateId::COUNT),
        }
    }

    /// Wall-clock time left in this cycle's budget.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn budget_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Record a non-fatal failure and tell the event sink.
    pub fn warn(&mut self, stage: StateId, error: impl Into<Error>) {
        let error = error.into();
        self.warnings.push(Warning { stage, error });
        self.ports.events.emit(&CycleEvent::Warning { stage, error });
    }

    /// Set the stop reason unless an earlier stage already decided it.
    pub fn stop_because(&mut self, reason: StopReason) {
        if self.stop_reason == StopReason::Pending {
            self.stop_reason = reason;
        }
    }
}
