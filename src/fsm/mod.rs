//! Function-pointer finite state machine engine for one decision cycle.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  StateTable                                                   │
//! │  ┌──────────────────┬──────────┬──────────┬────────────────┐  │
//! │  │ StateId          │ on_enter │ on_exit  │ on_update      │  │
//! │  ├──────────────────┼──────────┼──────────┼────────────────┤  │
//! │  │ FetchWeather     │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Opt<> │  │
//! │  │ ComputeEto       │   ...    │   ...    │      ...       │  │
//! │  │ ...              │          │          │                │  │
//! │  │ Done             │          │          │ None (terminal)│  │
//! │  └──────────────────┴──────────┴──────────┴────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.  The
//! pipeline stages do their work there and return `Some(next)`; the engine
//! runs `on_exit`, moves the pointer, records the new state in the cycle
//! trace and runs `on_enter`.  [`Fsm::run`] ticks until `Done`.

pub mod context;
pub mod states;

use context::CycleContext;
use log::{error, info};

use crate::app::events::CycleEvent;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Stages of one decision cycle.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    FetchWeather = 0,
    ComputeEto = 1,
    ReadSoil = 2,
    ForecastMoisture = 3,
    ComputeStress = 4,
    Classify = 5,
    Irrigate = 6,
    Skip = 7,
    Publish = 8,
    Done = 9,
}

impl StateId {
    pub const COUNT: usize = 10;

    /// Convert an index back to `StateId`.  Out-of-range maps to `Done`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::FetchWeather,
            1 => Self::ComputeEto,
            2 => Self::ReadSoil,
            3 => Self::ForecastMoisture,
            4 => Self::ComputeStress,
            5 => Self::Classify,
            6 => Self::Irrigate,
            7 => Self::Skip,
            8 => Self::Publish,
            _ => {
                debug_assert!(idx == 9, "invalid state index: {idx}");
                Self::Done
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` action.
pub type StateActionFn = fn(&mut CycleContext<'_>);

/// Per-tick handler.  `Some(next)` triggers a transition.
pub type StateUpdateFn = fn(&mut CycleContext<'_>) -> Option<StateId>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    tick_count: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
        }
    }

    /// Enter the initial state.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut CycleContext<'_>) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.trace.push(self.current_state());
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Run the current state's `on_update` once and follow its transition.
    pub fn tick(&mut self, ctx: &mut CycleContext<'_>) {
        self.tick_count += 1;
        let next = (self.table[self.current].on_update)(ctx);
        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Start, then tick until `Done`.
    ///
    /// Every stage transitions on its first tick, so a cycle needs at most
    /// one tick per state.  If that bound is ever exceeded the engine forces
    /// `Done` so the cycle still terminates exactly once.
    pub fn run(&mut self, ctx: &mut CycleContext<'_>) {
        self.start(ctx);
        while !self.is_done() {
            if self.tick_count >= StateId::COUNT as u64 {
                error!(
                    "FSM stuck in {} after {} ticks, forcing Done",
                    self.table[self.current].name, self.tick_count
                );
                self.force_transition(StateId::Done, ctx);
                break;
            }
            self.tick(ctx);
        }
    }

    /// Jump to `next` regardless of what `on_update` would return.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut CycleContext<'_>) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn is_done(&self) -> bool {
        self.current_state() == StateId::Done
    }

    pub fn ticks(&self) -> u64 {
        self.tick_count
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut CycleContext<'_>) {
        let from = self.current_state();
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.trace.push(next_id);
        ctx.ports.events.emit(&CycleEvent::StateChanged { from, to: next_id });

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
