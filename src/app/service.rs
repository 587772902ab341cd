//! Decision pipeline — the hexagonal core.
//!
//! [`DecisionPipeline`] owns the configuration and runs one table-driven FSM
//! per cycle.  All I/O flows through the [`CyclePorts`] handed to
//! [`run_cycle`](DecisionPipeline::run_cycle), so every path is testable with
//! fake adapters.
//!
//! ```text
//!  WeatherSource ──▶ ┌────────────────────────┐ ──▶ TelemetrySink
//!  SoilSensorPort ─▶ │    DecisionPipeline     │ ──▶ EventSink
//!  PredictionPort ─▶ │  FSM · ETo · stress     │
//!       PumpPort ◀── └────────────────────────┘
//! ```

use log::info;

use crate::agronomy::{DailyWeather, EtoResult, FORECAST_DAYS, WaterStressScore};
use crate::config::SystemConfig;
use crate::fsm::context::{CycleContext, CycleStatus, IrrigationDecision, StopReason, Warning};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::sensors::SoilMoistureReading;

use super::events::CycleEvent;
use super::ports::CyclePorts;

// ───────────────────────────────────────────────────────────────
// CycleReport
// ───────────────────────────────────────────────────────────────

/// Everything one cycle decided and observed.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub status: CycleStatus,
    pub decision: IrrigationDecision,
    pub stop_reason: StopReason,
    /// States entered, in order; always ends with exactly one `Done`.
    pub trace: Vec<StateId>,
    pub warnings: Vec<Warning>,
    pub days: Option<[DailyWeather; FORECAST_DAYS]>,
    pub etos: Option<[EtoResult; FORECAST_DAYS]>,
    pub soil: Option<SoilMoistureReading>,
    pub moisture_pct: Option<[f64; FORECAST_DAYS]>,
    pub stress: Option<[WaterStressScore; FORECAST_DAYS]>,
}

impl CycleReport {
    pub fn visited(&self, state: StateId) -> bool {
        self.trace.contains(&state)
    }

    /// Today's stress score, when it could be computed.
    pub fn stress_today(&self) -> Option<f64> {
        self.stress.map(|s| s[0].value)
    }
}

// ───────────────────────────────────────────────────────────────
// DecisionPipeline
// ───────────────────────────────────────────────────────────────

pub struct DecisionPipeline {
    config: SystemConfig,
    cycles: u64,
}

impl DecisionPipeline {
    pub fn new(config: SystemConfig) -> Self {
        Self { config, cycles: 0 }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Number of cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one full cycle, `FetchWeather` through `Done`.
    ///
    /// Never fails: every failure becomes a warning, a skip or the
    /// `NoWeatherData` status.  Taking `&mut self` keeps two cycles of one
    /// pipeline from overlapping.  The context borrows the configuration for
    /// as long as it holds the ports.
    pub fn run_cycle<'a>(&'a mut self, ports: CyclePorts<'a>) -> CycleReport {
        self.cycles += 1;
        let cycle = self.cycles;

        let mut ctx = CycleContext::new(ports, &self.config);
        ctx.ports.events.emit(&CycleEvent::Started { cycle });

        let mut fsm = Fsm::new(build_state_table(), StateId::FetchWeather);
        fsm.run(&mut ctx);

        info!(
            "cycle {} finished: {} ({:?}), {} warning(s), {} ticks",
            cycle,
            ctx.status.label(),
            ctx.stop_reason,
            ctx.warnings.len(),
            fsm.ticks()
        );

        CycleReport {
            cycle,
            status: ctx.status,
            decision: ctx.decision,
            stop_reason: ctx.stop_reason,
            trace: ctx.trace,
            warnings: ctx.warnings,
            days: ctx.days,
            etos: ctx.etos,
            soil: ctx.soil,
            moisture_pct: ctx.moisture_pct,
            stress: ctx.stress,
        }
    }
}
