//! Outbound cycle events.
//!
//! The [`DecisionPipeline`](super::service::DecisionPipeline) emits these
//! through the [`EventSink`](super::ports::EventSink) port while a cycle
//! runs.  Adapters on the other side decide what to do with them; the
//! binary logs them.

use crate::error::Error;
use crate::fsm::StateId;
use crate::fsm::context::{CycleStatus, IrrigationDecision, StopReason};

/// Structured events emitted by the decision core.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    /// A cycle began (carries the pipeline's cycle counter).
    Started { cycle: u64 },

    /// The cycle FSM moved between stages.
    StateChanged { from: StateId, to: StateId },

    /// A non-fatal failure the cycle absorbed.
    Warning { stage: StateId, error: Error },

    /// The classifier asked for water but the regressor predicted none.
    RegressorVeto { amount_mm: f64 },

    /// The final decision for today, before telemetry.
    Decided(IrrigationDecision),

    /// `Done` was reached.
    Finished {
        status: CycleStatus,
        reason: StopReason,
    },
}
