//! Log-based sinks.
//!
//! [`LogEventSink`] implements [`EventSink`] by writing one tagged line per
//! cycle event.  [`LogTelemetrySink`] implements [`TelemetrySink`] the same
//! way and stands in for the broker when telemetry is disabled or the broker
//! cannot be reached.

use log::{info, warn};

use crate::app::events::CycleEvent;
use crate::app::ports::{EventSink, PublishOptions, TelemetrySink};
use crate::error::PublishError;

/// Adapter that logs every [`CycleEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &CycleEvent) {
        match event {
            CycleEvent::Started { cycle } => {
                info!("START | cycle={}", cycle);
            }
            CycleEvent::StateChanged { from, to } => {
                info!("STAGE | {:?} -> {:?}", from, to);
            }
            CycleEvent::Warning { stage, error } => {
                warn!("WARN  | stage={:?} | {}", stage, error);
            }
            CycleEvent::RegressorVeto { amount_mm } => {
                warn!("VETO  | regressor predicted {:.2} mm", amount_mm);
            }
            CycleEvent::Decided(d) => {
                info!(
                    "DECIDE | irrigate={} | amount={:.2}mm | duration={}s | ack={}",
                    d.should_irrigate,
                    d.amount_mm,
                    d.pump_duration_s,
                    d.ack.label()
                );
            }
            CycleEvent::Finished { status, reason } => {
                info!("DONE  | status={} | reason={:?}", status.label(), reason);
            }
        }
    }
}

/// Telemetry sink that only logs what would have been published.
#[derive(Debug, Default)]
pub struct LogTelemetrySink {
    published: usize,
}

impl LogTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages accepted so far.
    pub fn published(&self) -> usize {
        self.published
    }
}

impl TelemetrySink for LogTelemetrySink {
    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
        options: PublishOptions,
    ) -> Result<(), PublishError> {
        info!(
            "TELEM | {} = {} (qos={}, retain={})",
            topic, payload, options.qos, options.retain
        );
        self.published += 1;
        Ok(())
    }
}
