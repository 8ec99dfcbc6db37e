//! The simulation server: lifecycle control wrapped around the engine.
//!
//! [`Simulation`] owns the [`ClosedLoopEngine`] and runs the outer
//! lifecycle loop on the thread that calls [`main()`](Simulation::main):
//! parked while Initial or Paused, stepping while Running, done when
//! Stopped. Control arrives from other threads through a cloneable
//! [`SimulationHandle`] — the remote-procedure layer and the timeout
//! supervisor both drive the same transition table, so a timeout-forced
//! stop is indistinguishable from a requested one.
//!
//! # Thread roles
//!
//! The `main()` caller and the step worker are the only long-lived
//! stepping threads. Handle methods run on their caller's thread and
//! touch only the state cell, the engine stop flag, and (for reset)
//! the parked engine. The timer thread sleeps on its control channel.

use std::sync::{Arc, Condvar, Mutex, Weak};

use chiasm_core::{ControlCommand, ControlReceipt, Operation, SimTime, TransitionError};
use chiasm_status::{
    ErrorCategory, ErrorComponent, ErrorEvent, StatusEvent, StatusPublisher, TaskProgressNotifier,
};

use crate::config::TimeoutConfig;
use crate::engine::{ClosedLoopEngine, EngineController, EngineError, LoopExit};
use crate::lifecycle::{transition, LifecycleEffect, SimulationState};
use crate::timeout::TimeoutSupervisor;

// ── ControlError ─────────────────────────────────────────────────

/// Errors surfaced by the control operations.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlError {
    /// The operation is not permitted in the current lifecycle state.
    Rejected(TransitionError),
    /// A collaborator failed while applying the operation's effects
    /// (initialization or reset).
    Engine(EngineError),
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(e) => write!(f, "{e}"),
            Self::Engine(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rejected(e) => Some(e),
            Self::Engine(e) => Some(e),
        }
    }
}

impl From<TransitionError> for ControlError {
    fn from(e: TransitionError) -> Self {
        Self::Rejected(e)
    }
}

impl From<EngineError> for ControlError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

// ── Shared control structure ─────────────────────────────────────

struct Shared {
    state: Mutex<SimulationState>,
    /// Wakes `main()` when the state leaves Initial/Paused.
    wake: Condvar,
    engine: Mutex<ClosedLoopEngine>,
    controller: EngineController,
    publisher: Arc<dyn StatusPublisher>,
    notifier: Mutex<TaskProgressNotifier>,
    supervisor: TimeoutSupervisor,
}

impl Shared {
    /// Apply `op` through the transition table, running its side
    /// effects before committing the new state.
    fn apply(&self, op: Operation) -> Result<SimulationState, ControlError> {
        let mut state = self.state.lock().unwrap();
        let tr = transition(*state, op)?;

        match tr.effect {
            LifecycleEffect::StartLoop => {
                {
                    let mut engine = self.engine.lock().unwrap();
                    if !engine.is_initialized() {
                        engine.initialize()?;
                    }
                }
                // Clearing under the state lock orders the resume
                // against any pause/stop that set the flag: a stop
                // requested after this point sticks.
                self.controller.clear_stop();
                // Counting restarts from zero on every (re)entry into
                // Running.
                self.supervisor.arm();
            }
            LifecycleEffect::PauseLoop => {
                self.controller.stop();
                self.supervisor.disarm();
            }
            LifecycleEffect::StopSimulation => {
                self.stop_effects();
            }
            LifecycleEffect::ResetSimulation => {
                {
                    let mut notifier = self.notifier.lock().unwrap();
                    notifier.start_task(
                        "Resetting the simulation",
                        "Restoring the initial state",
                        1,
                        false,
                    );
                }
                let result = self.engine.lock().unwrap().reset();
                {
                    let mut notifier = self.notifier.lock().unwrap();
                    notifier.finish_task();
                    notifier.clear();
                }
                result?;
                self.supervisor.disarm();
            }
        }

        log::debug!("simulation {} -> {} ({op})", *state, tr.next);
        *state = tr.next;
        self.wake.notify_all();
        Ok(tr.next)
    }

    /// The stop path shared by requested stops, the timeout
    /// supervisor, and fatal run-loop exits.
    ///
    /// Returns `false` when stop is not legal from the current state
    /// (already stopped, or never started) — which is what makes the
    /// forced stop fire at most once.
    fn force_stop(&self, reason: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        match transition(*state, Operation::Stop) {
            Ok(tr) => {
                log::warn!("forcing simulation stop: {reason}");
                self.stop_effects();
                *state = tr.next;
                self.wake.notify_all();
                true
            }
            Err(_) => false,
        }
    }

    /// Effects of entering Stopped. The state notification is the
    /// one-time shutdown message — Stopped being terminal makes the
    /// once-guard structural.
    fn stop_effects(&self) {
        self.controller.stop();
        self.supervisor.disarm();
        self.publisher.publish(StatusEvent::State {
            state: SimulationState::Stopped.as_str(),
        });
    }

    fn dispatch(&self, cmd: ControlCommand) -> ControlReceipt {
        match cmd.operation() {
            None => ControlReceipt::ok(self.state_str()),
            Some(op) => match self.apply(op) {
                Ok(next) => ControlReceipt::ok(next.as_str()),
                Err(e) => ControlReceipt::rejected(self.state_str(), e.to_string()),
            },
        }
    }

    fn state_str(&self) -> &'static str {
        self.state.lock().unwrap().as_str()
    }

    fn publish_engine_fault(&self, error: &EngineError) {
        let component = match error {
            EngineError::TransferFunction { .. } => ErrorComponent::TransferFunction,
            EngineError::BrainStep { .. } => ErrorComponent::Brain,
            EngineError::InitializationFailed { component, .. }
            | EngineError::ResetFailed { component, .. } => match *component {
                "robot" => ErrorComponent::Robot,
                "brain" => ErrorComponent::Brain,
                _ => ErrorComponent::TransferFunction,
            },
        };
        self.publisher.publish(StatusEvent::Error(ErrorEvent {
            component,
            category: ErrorCategory::Runtime,
            message: error.to_string(),
            transfer_function_name: None,
        }));
    }
}

// ── Simulation ───────────────────────────────────────────────────

/// A remotely controllable closed-loop simulation.
pub struct Simulation {
    shared: Arc<Shared>,
}

impl Simulation {
    /// Wrap `engine` in lifecycle control.
    ///
    /// Spawns the timeout supervisor immediately (disarmed); the
    /// engine is untouched until the first start.
    pub fn new(
        engine: ClosedLoopEngine,
        publisher: Arc<dyn StatusPublisher>,
        timeout: TimeoutConfig,
    ) -> Self {
        let controller = engine.controller();
        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let soft_publisher = Arc::clone(&publisher);
            let hard_shared = weak.clone();
            let supervisor = TimeoutSupervisor::spawn(
                timeout,
                Box::new(move || {
                    log::warn!("simulation is approaching its run-time limit");
                    soft_publisher.publish(StatusEvent::Warning {
                        message: "Simulation is approaching its run-time limit.".to_string(),
                    });
                }),
                Box::new(move || {
                    if let Some(shared) = hard_shared.upgrade() {
                        shared.force_stop("run-time limit exceeded");
                    }
                }),
            );
            Shared {
                state: Mutex::new(SimulationState::Initial),
                wake: Condvar::new(),
                engine: Mutex::new(engine),
                controller,
                notifier: Mutex::new(TaskProgressNotifier::new(Arc::clone(&publisher))),
                publisher,
                supervisor,
            }
        });
        Self { shared }
    }

    /// A cloneable control handle for other threads.
    pub fn handle(&self) -> SimulationHandle {
        SimulationHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SimulationState {
        *self.shared.state.lock().unwrap()
    }

    /// Run the lifecycle loop until the simulation stops.
    ///
    /// Parks while Initial or Paused, steps the engine while Running,
    /// returns after entering Stopped and shutting the collaborators
    /// down. Fatal in-loop conditions (dead robot, hard collaborator
    /// fault) are published on the status channel and folded into the
    /// stop path — they never unwind out of here.
    pub fn main(&self) {
        loop {
            let state = {
                let mut state = self.shared.state.lock().unwrap();
                while !matches!(
                    *state,
                    SimulationState::Running | SimulationState::Stopped
                ) {
                    state = self.shared.wake.wait(state).unwrap();
                }
                *state
            };
            if state == SimulationState::Stopped {
                break;
            }

            let outcome = self.shared.engine.lock().unwrap().start();
            match outcome {
                Ok(LoopExit::StopRequested) => {
                    // Pause or stop already committed by the handle
                    // that requested it; loop around and re-read.
                }
                Ok(LoopExit::RobotDied) => {
                    self.shared.force_stop("robot collaborator is no longer alive");
                }
                Err(e) => {
                    self.shared.publish_engine_fault(&e);
                    self.shared.force_stop("hard fault in the closed loop");
                }
            }
        }
        self.shared.engine.lock().unwrap().shutdown();
    }
}

// ── SimulationHandle ─────────────────────────────────────────────

/// Cloneable cross-thread control surface for a [`Simulation`].
///
/// The five remote operations map 1:1 onto handle methods; each
/// returns synchronously. Progress notifications for long-running
/// frontend tasks go through the same handle.
#[derive(Clone)]
pub struct SimulationHandle {
    shared: Arc<Shared>,
}

impl SimulationHandle {
    /// Begin or resume stepping.
    pub fn start(&self) -> Result<(), ControlError> {
        self.shared.apply(Operation::Start).map(|_| ())
    }

    /// Suspend stepping, keeping the clock.
    pub fn pause(&self) -> Result<(), ControlError> {
        self.shared.apply(Operation::Pause).map(|_| ())
    }

    /// Terminate the simulation. Does not block for the run loop to
    /// exit; use [`wait_step`](SimulationHandle::wait_step) for that.
    pub fn stop(&self) -> Result<(), ControlError> {
        self.shared.apply(Operation::Stop).map(|_| ())
    }

    /// Return a paused simulation to its initial state.
    pub fn reset(&self) -> Result<(), ControlError> {
        self.shared.apply(Operation::Reset).map(|_| ())
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SimulationState {
        *self.shared.state.lock().unwrap()
    }

    /// Handle one control command, producing a receipt for the remote
    /// caller.
    pub fn dispatch(&self, cmd: ControlCommand) -> ControlReceipt {
        self.shared.dispatch(cmd)
    }

    /// The simulation clock, readable without blocking the loop.
    pub fn time(&self) -> SimTime {
        self.shared.controller.time()
    }

    /// Block until the tick currently in flight (if any) completes.
    pub fn wait_step(&self) {
        self.shared.controller.wait_step();
    }

    /// Begin a frontend progress task, replacing any active one.
    pub fn notify_start_task(
        &self,
        name: &str,
        subtask_name: &str,
        subtask_count: usize,
        block_ui: bool,
    ) {
        self.shared
            .notifier
            .lock()
            .unwrap()
            .start_task(name, subtask_name, subtask_count, block_ui);
    }

    /// Update the active task's subtask.
    pub fn notify_current_task(&self, new_subtask_name: &str, advance: bool, block_ui: bool) {
        self.shared
            .notifier
            .lock()
            .unwrap()
            .update_task(new_subtask_name, advance, block_ui);
    }

    /// Finish the active task.
    pub fn notify_finish_task(&self) {
        self.shared.notifier.lock().unwrap().finish_task();
    }
}

// main() runs on whatever thread the deployment dedicates to it.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Simulation>();
        assert_send::<SimulationHandle>();
    }
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use chiasm_test_utils::{
        CollectingPublisher, MockBrainAdapter, MockRobotAdapter, MockTransferFunctionManager,
    };
    use std::time::Duration;

    fn idle_simulation() -> (Simulation, Arc<CollectingPublisher>) {
        let publisher = CollectingPublisher::new();
        let engine = ClosedLoopEngine::new(
            Arc::new(MockRobotAdapter::new()),
            Box::new(MockBrainAdapter::new()),
            Box::new(MockTransferFunctionManager::new()),
            &SimulationConfig::default(),
        );
        let sim = Simulation::new(
            engine,
            publisher.clone(),
            TimeoutConfig {
                soft_limit: Duration::from_secs(60),
                hard_limit: Duration::from_secs(120),
            },
        );
        (sim, publisher)
    }

    #[test]
    fn new_simulation_reports_initialized() {
        let (sim, _) = idle_simulation();
        assert_eq!(sim.state(), SimulationState::Initial);
        assert_eq!(
            sim.handle().dispatch(ControlCommand::QueryState),
            ControlReceipt::ok("Initialized")
        );
    }

    #[test]
    fn pause_before_start_is_rejected_with_reason() {
        let (sim, _) = idle_simulation();
        let receipt = sim.handle().dispatch(ControlCommand::Pause);
        assert!(!receipt.success);
        assert_eq!(receipt.state, "Initialized");
        let reason = receipt.reason.unwrap();
        assert!(reason.contains("pause"));
        assert!(reason.contains("Initialized"));
    }

    #[test]
    fn start_initializes_the_engine_once() {
        let publisher = CollectingPublisher::new();
        let robot = Arc::new(MockRobotAdapter::new());
        let engine = ClosedLoopEngine::new(
            robot.clone(),
            Box::new(MockBrainAdapter::new()),
            Box::new(MockTransferFunctionManager::new()),
            &SimulationConfig::default(),
        );
        let sim = Simulation::new(engine, publisher, TimeoutConfig::default());
        let handle = sim.handle();
        handle.start().unwrap();
        assert_eq!(robot.initialization_count(), 1);
        // Resume after pause must not re-initialize.
        handle.pause().unwrap();
        handle.start().unwrap();
        assert_eq!(robot.initialization_count(), 1);
    }

    #[test]
    fn stop_is_terminal_and_publishes_once() {
        let (sim, publisher) = idle_simulation();
        let handle = sim.handle();
        handle.start().unwrap();
        handle.stop().unwrap();
        assert_eq!(sim.state(), SimulationState::Stopped);
        assert!(matches!(
            handle.stop(),
            Err(ControlError::Rejected(_))
        ));
        assert_eq!(publisher.state_notifications(), vec!["Stopped"]);
    }

    #[test]
    fn reset_requires_paused() {
        let (sim, _) = idle_simulation();
        let handle = sim.handle();
        assert!(handle.reset().is_err());
        handle.start().unwrap();
        assert!(handle.reset().is_err());
        handle.pause().unwrap();
        handle.reset().unwrap();
        assert_eq!(sim.state(), SimulationState::Initial);
        assert_eq!(handle.time(), SimTime::ZERO);
    }

    #[test]
    fn task_notifications_flow_through_the_handle() {
        let (sim, publisher) = idle_simulation();
        let handle = sim.handle();
        handle.notify_start_task("task", "sub", 1, false);
        handle.notify_current_task("sub2", true, true);
        handle.notify_finish_task();
        assert_eq!(publisher.progress_count(), 3);
        assert!(publisher.warnings().is_empty());
    }

    #[test]
    fn receipt_state_tracks_transitions() {
        let (sim, _) = idle_simulation();
        let handle = sim.handle();
        assert_eq!(
            handle.dispatch(ControlCommand::Start),
            ControlReceipt::ok("Started")
        );
        assert_eq!(
            handle.dispatch(ControlCommand::Pause),
            ControlReceipt::ok("Paused")
        );
        assert_eq!(
            handle.dispatch(ControlCommand::Stop),
            ControlReceipt::ok("Stopped")
        );
    }
}
