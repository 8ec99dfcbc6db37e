//! Test utilities and mock collaborators for Chiasm development.
//!
//! Provides scriptable mock implementations of the collaborator traits
//! ([`RobotAdapter`], [`BrainAdapter`], [`TransferFunctionManager`])
//! and a [`CollectingPublisher`] that records status events for
//! assertion. The brain and transfer-function mocks are `Clone` with a
//! shared interior, so a test can keep a handle while the engine owns
//! the boxed half.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chiasm_core::{AdapterError, BrainAdapter, RobotAdapter, SimTime, TransferFunctionManager};
use chiasm_status::{FaultTracker, StatusEvent, StatusPublisher};

// ── MockRobotAdapter ─────────────────────────────────────────────

#[derive(Default)]
struct RobotCounters {
    steps: Vec<f64>,
    time: f64,
    initializations: u32,
    shutdowns: u32,
    resets: u32,
}

/// Mock physics/robot collaborator.
///
/// Shared across threads like the real thing (`&self` methods, interior
/// mutability). Liveness is scriptable, either directly via
/// [`set_alive`](MockRobotAdapter::set_alive) or by arming
/// [`die_after_steps`](MockRobotAdapter::die_after_steps) so the
/// adapter goes dead from inside a running loop.
pub struct MockRobotAdapter {
    counters: Mutex<RobotCounters>,
    alive: AtomicBool,
    /// Remaining steps before liveness flips false. `u64::MAX` = never.
    steps_until_death: AtomicU64,
    /// Per-step sleep, to pace loops in timing-sensitive tests.
    step_delay_us: AtomicU64,
}

impl MockRobotAdapter {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(RobotCounters::default()),
            alive: AtomicBool::new(true),
            steps_until_death: AtomicU64::new(u64::MAX),
            step_delay_us: AtomicU64::new(0),
        }
    }

    /// Force liveness to `alive`.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Flip liveness to false after `n` further steps have executed.
    pub fn die_after_steps(&self, n: u64) {
        self.steps_until_death.store(n, Ordering::SeqCst);
    }

    /// Make every step take at least `delay`.
    pub fn set_step_delay(&self, delay: Duration) {
        self.step_delay_us
            .store(delay.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn step_count(&self) -> usize {
        self.counters.lock().unwrap().steps.len()
    }

    /// All step sizes seen, in order.
    pub fn recorded_steps(&self) -> Vec<f64> {
        self.counters.lock().unwrap().steps.clone()
    }

    pub fn initialization_count(&self) -> u32 {
        self.counters.lock().unwrap().initializations
    }

    pub fn shutdown_count(&self) -> u32 {
        self.counters.lock().unwrap().shutdowns
    }

    pub fn reset_count(&self) -> u32 {
        self.counters.lock().unwrap().resets
    }
}

impl Default for MockRobotAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotAdapter for MockRobotAdapter {
    fn initialize(&self) -> Result<(), AdapterError> {
        let mut c = self.counters.lock().unwrap();
        c.initializations += 1;
        c.time = 0.0;
        Ok(())
    }

    fn run_step(&self, dt: f64) -> f64 {
        let delay = self.step_delay_us.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_micros(delay));
        }
        let mut c = self.counters.lock().unwrap();
        c.steps.push(dt);
        c.time += dt;
        let remaining = self.steps_until_death.load(Ordering::SeqCst);
        if remaining != u64::MAX {
            if remaining <= 1 {
                self.alive.store(false, Ordering::SeqCst);
            }
            self.steps_until_death
                .store(remaining.saturating_sub(1), Ordering::SeqCst);
        }
        c.time
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        self.counters.lock().unwrap().shutdowns += 1;
    }

    fn reset(&self) -> Result<(), AdapterError> {
        let mut c = self.counters.lock().unwrap();
        c.resets += 1;
        c.time = 0.0;
        Ok(())
    }
}

// ── MockBrainAdapter ─────────────────────────────────────────────

#[derive(Default)]
struct BrainInner {
    steps_ms: Vec<f64>,
    initializations: u32,
    shutdowns: u32,
    resets: u32,
    /// 1-based step number that returns an error, if any.
    fail_on_step: Option<usize>,
}

/// Mock neural-simulator collaborator.
///
/// Records every step in milliseconds and can be scripted to fail on a
/// given step to exercise hard-fault propagation. Cloning shares the
/// interior, so a test can keep one handle and box the other into the
/// engine.
#[derive(Clone, Default)]
pub struct MockBrainAdapter {
    inner: Arc<Mutex<BrainInner>>,
}

impl MockBrainAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th call to `run_step` (1-based).
    pub fn fail_on_step(self, n: usize) -> Self {
        self.inner.lock().unwrap().fail_on_step = Some(n);
        self
    }

    /// All step sizes seen so far, in milliseconds.
    pub fn recorded_steps_ms(&self) -> Vec<f64> {
        self.inner.lock().unwrap().steps_ms.clone()
    }

    pub fn initialization_count(&self) -> u32 {
        self.inner.lock().unwrap().initializations
    }

    pub fn shutdown_count(&self) -> u32 {
        self.inner.lock().unwrap().shutdowns
    }

    pub fn reset_count(&self) -> u32 {
        self.inner.lock().unwrap().resets
    }
}

impl BrainAdapter for MockBrainAdapter {
    fn initialize(&mut self) -> Result<(), AdapterError> {
        self.inner.lock().unwrap().initializations += 1;
        Ok(())
    }

    fn run_step(&mut self, dt_ms: f64) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock().unwrap();
        inner.steps_ms.push(dt_ms);
        if inner.fail_on_step == Some(inner.steps_ms.len()) {
            return Err(AdapterError::ExecutionFailed {
                reason: "injected brain fault".to_string(),
            });
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.inner.lock().unwrap().shutdowns += 1;
    }

    fn reset(&mut self) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock().unwrap();
        inner.resets += 1;
        inner.steps_ms.clear();
        Ok(())
    }
}

// ── MockTransferFunctionManager ──────────────────────────────────

#[derive(Default)]
struct TfmInner {
    node: Option<String>,
    neuron_to_robot: Vec<SimTime>,
    robot_to_neuron: Vec<SimTime>,
    resets: u32,
    faulty: Option<(String, String, FaultTracker)>,
}

/// Mock transfer-function collaborator.
///
/// Records the clock stamp of every pass. An optional faulty function
/// exercises the absorbed-fault path: its error is reported through a
/// [`FaultTracker`] on every neuron→robot pass while the pass itself
/// still succeeds, exactly like a manager skipping a broken function.
/// Cloning shares the interior.
#[derive(Clone, Default)]
pub struct MockTransferFunctionManager {
    inner: Arc<Mutex<TfmInner>>,
}

impl MockTransferFunctionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function that faults on every neuron→robot pass,
    /// reporting through `tracker`.
    pub fn with_faulty_function(self, name: &str, message: &str, tracker: FaultTracker) -> Self {
        self.inner.lock().unwrap().faulty = Some((name.to_string(), message.to_string(), tracker));
        self
    }

    pub fn node(&self) -> Option<String> {
        self.inner.lock().unwrap().node.clone()
    }

    /// Clock stamps of the neuron→robot passes, in order.
    pub fn neuron_to_robot_stamps(&self) -> Vec<SimTime> {
        self.inner.lock().unwrap().neuron_to_robot.clone()
    }

    /// Clock stamps of the robot→neuron passes, in order.
    pub fn robot_to_neuron_stamps(&self) -> Vec<SimTime> {
        self.inner.lock().unwrap().robot_to_neuron.clone()
    }

    pub fn reset_count(&self) -> u32 {
        self.inner.lock().unwrap().resets
    }
}

impl TransferFunctionManager for MockTransferFunctionManager {
    fn initialize(&mut self, node: &str) -> Result<(), AdapterError> {
        self.inner.lock().unwrap().node = Some(node.to_string());
        Ok(())
    }

    fn run_neuron_to_robot(&mut self, t: SimTime) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock().unwrap();
        inner.neuron_to_robot.push(t);
        if let Some((name, message, tracker)) = &mut inner.faulty {
            let name = name.clone();
            let message = message.clone();
            tracker.report(&name, &message);
        }
        Ok(())
    }

    fn run_robot_to_neuron(&mut self, t: SimTime) -> Result<(), AdapterError> {
        self.inner.lock().unwrap().robot_to_neuron.push(t);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock().unwrap();
        inner.resets += 1;
        inner.neuron_to_robot.clear();
        inner.robot_to_neuron.clear();
        if let Some((_, _, tracker)) = &mut inner.faulty {
            tracker.clear();
        }
        Ok(())
    }
}

// ── CollectingPublisher ──────────────────────────────────────────

/// Status publisher that stores every event for later assertion.
#[derive(Default)]
pub struct CollectingPublisher {
    events: Mutex<Vec<StatusEvent>>,
}

impl CollectingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything published so far, in order.
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress_count(&self) -> usize {
        self.count(|e| matches!(e, StatusEvent::Progress(_)))
    }

    pub fn error_count(&self) -> usize {
        self.count(|e| matches!(e, StatusEvent::Error(_)))
    }

    /// Warning messages, in publication order.
    pub fn warnings(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Warning { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Lifecycle state notifications, in publication order.
    pub fn state_notifications(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                StatusEvent::State { state } => Some(*state),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&StatusEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl StatusPublisher for CollectingPublisher {
    fn publish(&self, event: StatusEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// Keep the mock threading contract honest: the robot mock must be
// shareable across the scheduler and worker threads.
const _: () = {
    #[allow(dead_code)]
    fn assert_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_sync::<MockRobotAdapter>();
        assert_sync::<CollectingPublisher>();
    }
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_records_steps_and_time() {
        let robot = MockRobotAdapter::new();
        robot.run_step(0.1);
        robot.run_step(0.2);
        assert_eq!(robot.recorded_steps(), vec![0.1, 0.2]);
        assert_eq!(robot.step_count(), 2);
    }

    #[test]
    fn robot_dies_after_configured_steps() {
        let robot = MockRobotAdapter::new();
        robot.die_after_steps(2);
        robot.run_step(0.1);
        assert!(robot.is_alive());
        robot.run_step(0.1);
        assert!(!robot.is_alive());
    }

    #[test]
    fn brain_clone_shares_recordings() {
        let brain = MockBrainAdapter::new();
        let mut boxed: Box<dyn BrainAdapter> = Box::new(brain.clone());
        boxed.run_step(20.0).unwrap();
        assert_eq!(brain.recorded_steps_ms(), vec![20.0]);
    }

    #[test]
    fn brain_fails_on_requested_step() {
        let handle = MockBrainAdapter::new().fail_on_step(2);
        let mut brain = handle.clone();
        assert!(brain.run_step(20.0).is_ok());
        assert!(brain.run_step(20.0).is_err());
        assert!(brain.run_step(20.0).is_ok());
    }

    #[test]
    fn tfm_records_node_and_stamps() {
        let handle = MockTransferFunctionManager::new();
        let mut tfm = handle.clone();
        tfm.initialize("tfnode").unwrap();
        tfm.run_neuron_to_robot(SimTime(0.0)).unwrap();
        tfm.run_robot_to_neuron(SimTime(0.0)).unwrap();
        assert_eq!(handle.node().as_deref(), Some("tfnode"));
        assert_eq!(handle.neuron_to_robot_stamps(), vec![SimTime(0.0)]);
        assert_eq!(handle.robot_to_neuron_stamps(), vec![SimTime(0.0)]);
    }

    #[test]
    fn faulty_function_reports_through_tracker_once() {
        let sink = CollectingPublisher::new();
        let tracker = FaultTracker::new(sink.clone());
        let mut tfm =
            MockTransferFunctionManager::new().with_faulty_function("broken_tf", "boom", tracker);
        tfm.run_neuron_to_robot(SimTime(0.0)).unwrap();
        tfm.run_neuron_to_robot(SimTime(0.1)).unwrap();
        assert_eq!(sink.error_count(), 1);
    }
}
