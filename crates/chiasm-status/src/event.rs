//! Structured status events and their wire encoding.
//!
//! Events are serialized as externally-tagged JSON objects, so a
//! progress event encodes as `{"progress": {...}}` — the shape the
//! frontend's status subscriber expects.

use serde::Serialize;

/// A single event on the simulation status channel.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEvent {
    /// Progress of the active long-running task.
    Progress(ProgressEvent),
    /// A non-fatal condition worth surfacing (missing-task operations,
    /// soft timeout warnings).
    Warning {
        /// Human-readable warning text.
        message: String,
    },
    /// A runtime error from a collaborator, most commonly a transfer
    /// function raising during a tick.
    Error(ErrorEvent),
    /// A lifecycle notification, published when the simulation enters
    /// its terminal state.
    State {
        /// String identifier of the lifecycle state.
        state: &'static str,
    },
}

impl StatusEvent {
    /// Encode the event as a JSON string for the wire.
    ///
    /// Serialization of these fixed shapes cannot fail; an encoding
    /// error would be a programming bug, so it surfaces as the
    /// `serde_json` error rather than being masked.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Progress of the active (task, subtask) pair.
///
/// Field names follow the frontend's status message schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Name of the task.
    pub task: String,
    /// Name of the current subtask.
    pub subtask: String,
    /// Total number of subtasks in the task.
    pub number_of_subtasks: usize,
    /// Zero-based index of the current subtask.
    pub subtask_index: usize,
    /// Whether the frontend should block user interaction while the
    /// task runs.
    pub block_ui: bool,
}

/// Which collaborator an [`ErrorEvent`] originates from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorComponent {
    /// A transfer function raised during a tick.
    #[serde(rename = "Transfer Function")]
    TransferFunction,
    /// The neural simulator raised during a tick.
    #[serde(rename = "Brain")]
    Brain,
    /// The robot simulation raised outside the liveness protocol.
    #[serde(rename = "Robot")]
    Robot,
}

/// How an [`ErrorEvent`] was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    /// Raised while executing a step or translation pass.
    #[serde(rename = "RunTime")]
    Runtime,
    /// Raised while loading or reloading collaborator source.
    #[serde(rename = "Loading")]
    Loading,
}

/// A structured runtime error report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    /// The collaborator that failed.
    pub component: ErrorComponent,
    /// The failure category.
    pub category: ErrorCategory,
    /// Human-readable error text.
    pub message: String,
    /// Name of the failing transfer function, when the component is a
    /// transfer function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_function_name: Option<String>,
}
