//! Error types shared across the Chiasm workspace.
//!
//! Organized by subsystem: collaborator adapters and the lifecycle
//! state machine. Tick-level errors live in the engine crate, which
//! wraps these.

use std::error::Error;
use std::fmt;

/// Errors from a collaborator adapter call.
///
/// Collaborators are external subsystems (physics engine, neural
/// simulator, transfer-function runtime); their failures reach the
/// engine only through this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdapterError {
    /// Initialization of the collaborator failed.
    InitializationFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A step or translation pass failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The collaborator could not be returned to its initial state.
    ResetFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed { reason } => {
                write!(f, "initialization failed: {reason}")
            }
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::ResetFailed { reason } => write!(f, "reset failed: {reason}"),
        }
    }
}

impl Error for AdapterError {}

/// A lifecycle operation requested by the control surface.
///
/// Each maps 1:1 to a remote control request; `transition()` in the
/// engine crate decides whether it is legal in the current state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Begin or resume stepping.
    Start,
    /// Suspend stepping without losing the clock.
    Pause,
    /// Terminate the simulation. Terminal.
    Stop,
    /// Return to the initial state, clock at zero.
    Reset,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Reset => "reset",
        };
        write!(f, "{name}")
    }
}

/// A lifecycle operation was requested in a state that does not permit it.
///
/// Raised synchronously to the caller and never retried; the state is
/// left unchanged. The `Display` form is what failure receipts carry
/// back to the remote caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionError {
    /// The rejected operation.
    pub operation: Operation,
    /// String identifier of the state the machine was in.
    pub state: &'static str,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation '{}' is not permitted in state '{}'",
            self.operation, self.state
        )
    }
}

impl Error for TransitionError {}
