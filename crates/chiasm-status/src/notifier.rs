//! Tracking and reporting of the single active long-running task.
//!
//! Lifecycle operations that take noticeable wall-clock time
//! (initialization, reset) report their progress to the frontend as a
//! (task, subtask) pair. At most one task is active at a time; update
//! and finish calls against a missing task are warnings, not errors.

use std::sync::Arc;

use crate::event::{ProgressEvent, StatusEvent};
use crate::publisher::StatusPublisher;

/// The currently running (task, subtask) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveTask {
    /// Name of the task.
    pub name: String,
    /// Name of the current subtask.
    pub subtask_name: String,
    /// Zero-based index of the current subtask.
    pub subtask_index: usize,
    /// Total number of subtasks.
    pub subtask_count: usize,
    /// Whether the frontend should block user interaction.
    pub block_ui: bool,
}

/// Tracks the active task and emits progress events for it.
pub struct TaskProgressNotifier {
    publisher: Arc<dyn StatusPublisher>,
    current: Option<ActiveTask>,
}

impl TaskProgressNotifier {
    /// Create a notifier with no active task.
    pub fn new(publisher: Arc<dyn StatusPublisher>) -> Self {
        Self {
            publisher,
            current: None,
        }
    }

    /// The active task, if any.
    pub fn active_task(&self) -> Option<&ActiveTask> {
        self.current.as_ref()
    }

    /// Begin a new task, replacing any existing one.
    ///
    /// The new task starts at subtask index 0 and a progress event is
    /// published immediately.
    pub fn start_task(
        &mut self,
        name: &str,
        subtask_name: &str,
        subtask_count: usize,
        block_ui: bool,
    ) {
        if let Some(old) = &self.current {
            log::warn!(
                "task '{}' replaced by '{}' before it finished",
                old.name,
                name
            );
        }
        let task = ActiveTask {
            name: name.to_string(),
            subtask_name: subtask_name.to_string(),
            subtask_index: 0,
            subtask_count,
            block_ui,
        };
        self.publish_progress(&task);
        self.current = Some(task);
    }

    /// Update the current subtask, optionally advancing the index.
    ///
    /// With no active task this publishes a warning and is otherwise a
    /// no-op.
    pub fn update_task(&mut self, new_subtask_name: &str, advance: bool, block_ui: bool) {
        let Some(task) = self.current.as_mut() else {
            self.warn("Can't update a non existing task.");
            return;
        };
        task.subtask_name = new_subtask_name.to_string();
        if advance {
            task.subtask_index += 1;
        }
        task.block_ui = block_ui;
        let snapshot = task.clone();
        self.publish_progress(&snapshot);
    }

    /// Finish the current task.
    ///
    /// Publishes a completion progress event and clears the task. With
    /// no active task this publishes a warning and is otherwise a no-op.
    pub fn finish_task(&mut self) {
        let Some(task) = self.current.take() else {
            self.warn("Can't finish a non existing task.");
            return;
        };
        self.publish_progress(&task);
    }

    /// Drop any active task without emitting events.
    ///
    /// Used by the lifecycle reset path, which clears all accumulated
    /// task state.
    pub fn clear(&mut self) {
        self.current = None;
    }

    fn publish_progress(&self, task: &ActiveTask) {
        self.publisher.publish(StatusEvent::Progress(ProgressEvent {
            task: task.name.clone(),
            subtask: task.subtask_name.clone(),
            number_of_subtasks: task.subtask_count,
            subtask_index: task.subtask_index,
            block_ui: task.block_ui,
        }));
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
        self.publisher.publish(StatusEvent::Warning {
            message: message.to_string(),
        });
    }
}
