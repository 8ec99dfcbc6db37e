//! The background execution context for the robot-side step.
//!
//! The robot step is the slow half of each tick, so it runs on its own
//! thread while the scheduler drives the brain and transfer functions
//! inline. The worker owns nothing but a shared reference to the robot
//! adapter and a pair of single-slot channels forming a rendezvous:
//! a request wakes the worker with a step size, a completion wakes the
//! scheduler. The worker never initiates work and never terminates on
//! its own — it exits when the request channel disconnects, which
//! happens when the owning scheduler is dropped.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use chiasm_core::RobotAdapter;

/// Handle to the robot-step worker thread.
///
/// At most one step request may be outstanding at a time. The
/// scheduler's tick sequencing guarantees this: every
/// [`request_step`](StepWorker::request_step) is paired with a
/// [`wait_for_completion`](StepWorker::wait_for_completion) before the
/// next request is issued.
pub struct StepWorker {
    request_tx: Option<Sender<f64>>,
    completion_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl StepWorker {
    /// Spawn the worker thread for `robot`.
    pub fn spawn(robot: Arc<dyn RobotAdapter>) -> Self {
        let (request_tx, request_rx) = crossbeam_channel::bounded::<f64>(1);
        let (completion_tx, completion_rx) = crossbeam_channel::bounded::<()>(1);

        let thread = thread::Builder::new()
            .name("chiasm-step".into())
            .spawn(move || worker_loop(&*robot, &request_rx, &completion_tx))
            .expect("failed to spawn step worker thread");

        Self {
            request_tx: Some(request_tx),
            completion_rx,
            thread: Some(thread),
        }
    }

    /// Hand a step of `dt` seconds to the worker and return immediately.
    ///
    /// Never blocks: the request slot is empty whenever the sequencing
    /// invariant holds.
    pub fn request_step(&self, dt: f64) {
        if let Some(tx) = &self.request_tx {
            // A send error means the worker thread is gone (the robot
            // adapter panicked mid-step). The next liveness check is
            // where that surfaces.
            let _ = tx.send(dt);
        }
    }

    /// Block until the most recently requested step has finished.
    ///
    /// Returns `true` if the completion signal arrived, `false` if the
    /// worker thread is gone.
    pub fn wait_for_completion(&self) -> bool {
        self.completion_rx.recv().is_ok()
    }
}

impl Drop for StepWorker {
    fn drop(&mut self) {
        // Disconnect the request channel so the worker loop exits, then
        // reap the thread.
        self.request_tx.take();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Worker body: block for a request, execute exactly one step, signal
/// completion, loop.
///
/// The robot adapter's own simulation time return is discarded here;
/// robot health is observed through `is_alive`, never through the
/// handshake.
fn worker_loop(robot: &dyn RobotAdapter, request_rx: &Receiver<f64>, completion_tx: &Sender<()>) {
    while let Ok(dt) = request_rx.recv() {
        let _ = robot.run_step(dt);
        if completion_tx.send(()).is_err() {
            break;
        }
    }
}
