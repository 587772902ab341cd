//! Irrigation pump driver (relay on the microcontroller, timed run).
//!
//! The board starts the pump on `ON <seconds>\n`, stops it itself when the
//! time is up, and answers with the acknowledgment token (`OK`).
//!
//! ## Safety contract
//!
//! - No command is ever sent for a zero or negative duration; such requests
//!   produce an explicit [`PumpPlan::NoAction`].
//! - Confirmation is reported separately from the decision: an unconfirmed
//!   command is [`Ack::Nack`] or [`Ack::Unreachable`], never `Ok`.
//! - One attempt per call, no retries.

use core::fmt::Write as _;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::app::ports::PumpPort;
use crate::config::SystemConfig;
use crate::error::ActuatorError;
use crate::link::{LineError, LineReader, SerialBus, SerialLink, write_all};

/// Why a request did not turn into a pump command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoActionReason {
    /// Requested depth is zero, negative or not a number.
    NonPositiveAmount,
    /// Configured flow rate is zero, negative or not a number.
    NonPositiveFlow,
    /// Volume rounds to a zero-second run.
    ZeroDuration,
    /// Run time does not fit the controller's `ON <seconds>` counter.
    DurationOverflow,
}

/// Result of converting a water depth into a pump run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PumpPlan {
    Run { liters: f64, duration_s: u32 },
    NoAction(NoActionReason),
}

impl PumpPlan {
    /// Run time in seconds; zero for `NoAction`.
    pub fn duration_s(&self) -> u32 {
        match self {
            Self::Run { duration_s, .. } => *duration_s,
            Self::NoAction(_) => 0,
        }
    }
}

/// Convert `amount_mm` over `area_m2` into a run time at `flow_rate_lph`.
///
/// 1 mm over 1 m² is 1 L; the run time is rounded up to whole seconds.
pub fn plan(amount_mm: f64, area_m2: f64, flow_rate_lph: f64) -> PumpPlan {
    if amount_mm.is_nan() || amount_mm <= 0.0 {
        return PumpPlan::NoAction(NoActionReason::NonPositiveAmount);
    }
    if flow_rate_lph.is_nan() || flow_rate_lph <= 0.0 {
        return PumpPlan::NoAction(NoActionReason::NonPositiveFlow);
    }

    let liters = amount_mm * area_m2;
    let seconds = (liters * 3600.0 / flow_rate_lph).ceil();
    if !seconds.is_finite() || seconds <= 0.0 {
        return PumpPlan::NoAction(NoActionReason::ZeroDuration);
    }
    if seconds > f64::from(u32::MAX) {
        return PumpPlan::NoAction(NoActionReason::DurationOverflow);
    }

    PumpPlan::Run {
        liters,
        duration_s: seconds as u32,
    }
}

/// Pump controller confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ack {
    /// No command was sent (no-action plan or skipped branch).
    #[default]
    NotSent,
    /// The controller confirmed with the ack token.
    Ok,
    /// The command was sent but not confirmed.
    Nack,
    /// The port could not be opened or written.
    Unreachable,
}

impl Ack {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotSent => "not-sent",
            Self::Ok => "ok",
            Self::Nack => "nack",
            Self::Unreachable => "unreachable",
        }
    }
}

/// What happened when the pump was asked to deliver a depth of water.
#[derive(Debug, Clone, PartialEq)]
pub struct Actuation {
    pub plan: PumpPlan,
    pub ack: Ack,
    /// Set whenever `ack` is `Nack` or `Unreachable`.
    pub error: Option<ActuatorError>,
}

impl Actuation {
    fn no_action(plan: PumpPlan) -> Self {
        Self {
            plan,
            ack: Ack::NotSent,
            error: None,
        }
    }
}

/// Serial client for the pump controller.
pub struct PumpActuator {
    bus: Arc<SerialBus>,
    port: String,
    baud_rate: u32,
    area_m2: f64,
    flow_rate_lph: f64,
    settle_delay: Duration,
    poll_interval: Duration,
    ack_timeout: Duration,
    ack_token: String,
}

impl PumpActuator {
    pub fn new(bus: Arc<SerialBus>, config: &SystemConfig) -> Self {
        Self {
            bus,
            port: config.serial.pump_port.clone(),
            baud_rate: config.serial.baud_rate,
            area_m2: config.site.area_m2,
            flow_rate_lph: config.pump.flow_rate_lph,
            settle_delay: config.serial.settle_delay(),
            poll_interval: config.serial.poll_interval(),
            ack_timeout: Duration::from_secs(config.pump.ack_timeout_secs),
            ack_token: config.pump.ack_token.clone(),
        }
    }

    /// Override the acknowledgment deadline (sub-second deadlines in tests).
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Deliver `amount_mm` of water: plan, command, await confirmation.
    pub fn irrigate(&mut self, amount_mm: f64) -> Actuation {
        let plan = plan(amount_mm, self.area_m2, self.flow_rate_lph);
        let PumpPlan::Run { liters, duration_s } = plan else {
            info!("pump: no action ({:?}) for {:.2} mm", plan, amount_mm);
            return Actuation::no_action(plan);
        };

        info!(
            "pump: {:.2} mm over {:.2} m² = {:.2} L -> ON {} s",
            amount_mm, self.area_m2, liters, duration_s
        );

        let result = self.command(duration_s);
        let (ack, error) = match result {
            Ok(()) => (Ack::Ok, None),
            Err(e @ ActuatorError::Unreachable) => (Ack::Unreachable, Some(e)),
            Err(e) => (Ack::Nack, Some(e)),
        };
        if let Some(e) = error {
            warn!("pump: ON {} s on {} not confirmed: {}", duration_s, self.port, e);
        }
        Actuation { plan, ack, error }
    }

    fn command(&self, duration_s: u32) -> Result<(), ActuatorError> {
        let mut command: heapless::String<24> = heapless::String::new();
        writeln!(command, "ON {}", duration_s).map_err(|_| ActuatorError::Unreachable)?;

        let settle = self.settle_delay;
        let poll = self.poll_interval;
        let timeout = self.ack_timeout;
        let token = self.ack_token.as_str();
        self.bus
            .with_link(&self.port, self.baud_rate, |link| {
                thread::sleep(settle);
                exchange(link, command.as_bytes(), token, poll, timeout)
            })
            .map_err(|_| ActuatorError::Unreachable)?
    }
}

fn exchange(
    link: &mut dyn SerialLink,
    command: &[u8],
    token: &str,
    poll: Duration,
    timeout: Duration,
) -> Result<(), ActuatorError> {
    link.discard_input().map_err(|_| ActuatorError::Unreachable)?;
    write_all(link, command).map_err(|_| ActuatorError::Unreachable)?;

    let deadline = Instant::now() + timeout;
    match LineReader::new(poll).next_line(link, deadline) {
        Ok(reply) if reply == token => Ok(()),
        Ok(reply) => {
            warn!("pump controller replied {:?}, expected {:?}", reply, token);
            Err(ActuatorError::NotAcknowledged)
        }
        // Once the command is out, the pump may be running: a failed read is
        // "unconfirmed", not "unreachable".
        Err(LineError::Timeout | LineError::Io(_)) => Err(ActuatorError::NoReply),
        Err(LineError::Overflow) => Err(ActuatorError::NotAcknowledged),
    }
}

impl PumpPort for PumpActuator {
    fn irrigate(&mut self, amount_mm: f64) -> Actuation {
        PumpActuator::irrigate(self, amount_mm)
    }
}
