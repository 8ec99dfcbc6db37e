//! The simulation lifecycle state machine.
//!
//! A single tag enum plus a pure transition function: given the
//! current state and a requested operation, [`transition`] either
//! returns the next state together with the side effect the server
//! must run, or rejects the operation with the state unchanged. All
//! effects (starting the run loop, arming timers, resetting the
//! engine) live in the server — nothing here holds references to
//! anything.

use chiasm_core::{Operation, TransitionError};

/// The lifecycle states of a simulation.
///
/// `Stopped` is terminal: no operation leaves it. The string
/// identifiers are the stable names reported to remote callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimulationState {
    /// Created and initialized, never started.
    Initial,
    /// The run loop is stepping.
    Running,
    /// Stepping suspended; the clock keeps its value.
    Paused,
    /// Terminated. Terminal.
    Stopped,
}

impl SimulationState {
    /// Stable string identifier for external reporting.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "Initialized",
            Self::Running => "Started",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
        }
    }

    /// True only for [`Stopped`](SimulationState::Stopped).
    pub fn is_final_state(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// All states, for exhaustive table tests.
    pub const ALL: [SimulationState; 4] = [
        SimulationState::Initial,
        SimulationState::Running,
        SimulationState::Paused,
        SimulationState::Stopped,
    ];
}

impl std::fmt::Display for SimulationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The side effect the server must run to honor a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEffect {
    /// (Re)start the run loop and (re)arm the timeout supervisor.
    /// Initializes the engine first when coming from `Initial`.
    StartLoop,
    /// Stop the run loop, keep the clock, disarm the supervisor.
    PauseLoop,
    /// Stop the run loop, disarm the supervisor, publish the one-time
    /// shutdown notification.
    StopSimulation,
    /// Full reset: engine, clock, and accumulated task/fault state.
    ResetSimulation,
}

/// A legal transition: the next state and its side effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// State after the operation.
    pub next: SimulationState,
    /// What the server must do.
    pub effect: LifecycleEffect,
}

/// Decide whether `op` is legal in `state`.
///
/// Pure: no side effects, no references. Illegal pairs return a
/// [`TransitionError`] naming the operation and state; the caller's
/// state is untouched.
pub fn transition(state: SimulationState, op: Operation) -> Result<Transition, TransitionError> {
    use LifecycleEffect::*;
    use Operation::*;
    use SimulationState::*;

    let (next, effect) = match (state, op) {
        (Initial, Start) => (Running, StartLoop),
        (Running, Pause) => (Paused, PauseLoop),
        (Running, Stop) => (Stopped, StopSimulation),
        (Paused, Start) => (Running, StartLoop),
        (Paused, Stop) => (Stopped, StopSimulation),
        (Paused, Reset) => (Initial, ResetSimulation),
        _ => {
            return Err(TransitionError {
                operation: op,
                state: state.as_str(),
            })
        }
    };
    Ok(Transition { next, effect })
}
