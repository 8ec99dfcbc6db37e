//! Deduplicated reporting of transfer-function runtime faults.
//!
//! A faulty transfer function typically fails identically on every
//! tick. Reporting each occurrence would flood the status channel, so
//! each function carries an "updated since last error" flag: the first
//! failure after (re)load is published, subsequent identical failures
//! are suppressed until the function's source is reloaded.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::event::{ErrorCategory, ErrorComponent, ErrorEvent, StatusEvent};
use crate::publisher::StatusPublisher;

/// Per-transfer-function error deduplication.
///
/// Functions are keyed by name; iteration order is insertion order so
/// diagnostic dumps stay stable across runs.
pub struct FaultTracker {
    publisher: Arc<dyn StatusPublisher>,
    /// `true` = the function was (re)loaded since its last reported
    /// error and the next fault should be published.
    updated: IndexMap<String, bool>,
}

impl FaultTracker {
    /// Create a tracker publishing through `publisher`.
    pub fn new(publisher: Arc<dyn StatusPublisher>) -> Self {
        Self {
            publisher,
            updated: IndexMap::new(),
        }
    }

    /// Report a runtime fault in `function`.
    ///
    /// Publishes a structured error event unless the function already
    /// reported since it was last reloaded. Returns whether an event
    /// was published.
    pub fn report(&mut self, function: &str, message: &str) -> bool {
        let flag = self.updated.entry(function.to_string()).or_insert(true);
        if !*flag {
            log::debug!("suppressing repeated fault in '{function}': {message}");
            return false;
        }
        *flag = false;
        self.publisher.publish(StatusEvent::Error(ErrorEvent {
            component: ErrorComponent::TransferFunction,
            category: ErrorCategory::Runtime,
            message: message.to_string(),
            transfer_function_name: Some(function.to_string()),
        }));
        true
    }

    /// Re-arm reporting for `function` after its source was reloaded.
    pub fn mark_reloaded(&mut self, function: &str) {
        self.updated.insert(function.to_string(), true);
    }

    /// Forget all flags (lifecycle reset path).
    pub fn clear(&mut self) {
        self.updated.clear();
    }
}
