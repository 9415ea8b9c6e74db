//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern, driven by inputs instead of ticks:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌──────────────┬───────────┬──────────┬──────────────────┐  │
//! │  │ StateId      │ on_enter  │ on_exit  │ on_input         │  │
//! │  ├──────────────┼───────────┼──────────┼──────────────────┤  │
//! │  │ Idle         │ fn(ctx)   │    -     │ fn(ctx,in)->Opt  │  │
//! │  │ TryingStored │ fn(ctx)   │ fn(ctx)  │ fn(ctx,in)->Opt  │  │
//! │  │ Provisioning │ fn(ctx)   │ fn(ctx)  │ fn(ctx,in)->Opt  │  │
//! │  │ Connected    │ fn(ctx)   │ fn(ctx)  │ fn(ctx,in)->Opt  │  │
//! │  └──────────────┴───────────┴──────────┴──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! For every [`Input`] the engine calls `on_input` for the **current**
//! state.  If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the current
//! pointer.  Handlers never perform I/O: they append [`Action`]s to
//! [`FsmContext::actions`], which the orchestrator executes afterwards.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;

use crate::app::ports::MAX_SCANNED_AP;
use crate::credentials::Ssid;
use crate::events::NetEvent;

pub use context::{Action, ConnectionAttempt, ScanCandidate};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all orchestrator states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    TryingStored = 1,
    Provisioning = 2,
    Connected = 3,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 4;

    /// Convert an index back to `StateId`.  Out-of-range falls back to `Idle`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::TryingStored,
            2 => Self::Provisioning,
            3 => Self::Connected,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Everything that can move the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Asynchronous signal from the event bus.
    Net(NetEvent),
    /// Result of a `Scan` action, annotated with stored passphrases.
    ScanCompleted(heapless::Vec<ScanCandidate, MAX_SCANNED_AP>),
    /// A `Connect` action was refused synchronously by the radio.
    ConnectFailed,
    /// Credentials were removed from the store by a management command.
    /// `None` means every credential.
    Forgotten(Option<Ssid>),
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the input handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateInputFn = fn(&mut FsmContext, &Input) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_input: StateInputFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "state table rows out of order"
        );
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `handle()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Feed one input.  Returns `true` if a transition happened.
    pub fn handle(&mut self, input: &Input, ctx: &mut FsmContext) -> bool {
        match (self.table[self.current].on_input)(ctx, input) {
            Some(next_id) => {
                self.transition(next_id, ctx);
                true
            }
            None => false,
        }
    }

    /// Force an immediate transition regardless of the current handler.
    /// No-op when already in `next`.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// Leave and re-enter `next`, even if it is the current state.
    pub fn reenter(&mut self, next: StateId, ctx: &mut FsmContext) {
        self.transition(next, ctx);
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// Human-readable name of the current state.
    pub fn current_name(&self) -> &'static str {
        self.table[self.current].name
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
