//! Control command and receipt types for the remote control surface.
//!
//! The wire transport (ROS, gRPC, whatever the deployment uses) is out
//! of scope; these types define the five operations it must map onto
//! the lifecycle machine and the shape of the answer it gets back.

use crate::error::Operation;

/// A control request submitted to a running simulation server.
///
/// # Examples
///
/// ```
/// use chiasm_core::ControlCommand;
///
/// let cmd = ControlCommand::Start;
/// assert_eq!(cmd.operation(), Some(chiasm_core::Operation::Start));
/// assert_eq!(ControlCommand::QueryState.operation(), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    /// Begin or resume stepping.
    Start,
    /// Suspend stepping, keeping the clock.
    Pause,
    /// Terminate the simulation.
    Stop,
    /// Return to the initial state.
    Reset,
    /// Report the current lifecycle state without changing it.
    QueryState,
}

impl ControlCommand {
    /// The lifecycle operation this command maps to, if any.
    ///
    /// `QueryState` is a pure read and has no operation.
    pub fn operation(self) -> Option<Operation> {
        match self {
            Self::Start => Some(Operation::Start),
            Self::Pause => Some(Operation::Pause),
            Self::Stop => Some(Operation::Stop),
            Self::Reset => Some(Operation::Reset),
            Self::QueryState => None,
        }
    }
}

/// The answer to a [`ControlCommand`].
///
/// Every command produces a receipt: success or failure, the lifecycle
/// state after the command was handled, and on failure a human-readable
/// reason (the stringified invalid-operation error).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlReceipt {
    /// Whether the command was accepted and applied.
    pub success: bool,
    /// String identifier of the state after handling the command.
    pub state: &'static str,
    /// Why the command was rejected, if it was.
    pub reason: Option<String>,
}

impl ControlReceipt {
    /// A successful receipt reporting `state`.
    pub fn ok(state: &'static str) -> Self {
        Self {
            success: true,
            state,
            reason: None,
        }
    }

    /// A failure receipt with the given reason, state unchanged.
    pub fn rejected(state: &'static str, reason: String) -> Self {
        Self {
            success: false,
            state,
            reason: Some(reason),
        }
    }
}
