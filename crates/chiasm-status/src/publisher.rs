//! The seam between event producers and the status transport.
//!
//! The engine and notifier publish through `&dyn StatusPublisher`; the
//! deployment decides where events go. The in-tree implementation
//! forwards over a crossbeam channel so a transport thread (or a test)
//! can drain them at its own pace.

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::event::StatusEvent;

/// Sink for simulation status events.
///
/// Publishing must never block the simulation: implementations drop or
/// buffer rather than stall the tick loop.
pub trait StatusPublisher: Send + Sync {
    /// Publish one event.
    fn publish(&self, event: StatusEvent);
}

/// Channel-backed [`StatusPublisher`].
///
/// Events go over a bounded crossbeam channel; when the consumer falls
/// behind and the channel fills, events are dropped with a log warning
/// rather than blocking the publishing thread.
pub struct ChannelPublisher {
    tx: Sender<StatusEvent>,
}

impl ChannelPublisher {
    /// Create a publisher with room for `capacity` undrained events,
    /// returning the receiving end for the transport.
    pub fn new(capacity: usize) -> (Self, Receiver<StatusEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl StatusPublisher for ChannelPublisher {
    fn publish(&self, event: StatusEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => {
                log::warn!("status channel full, dropping event: {ev:?}");
            }
            Err(TrySendError::Disconnected(_)) => {
                // Transport is gone; the simulation keeps running.
            }
        }
    }
}
