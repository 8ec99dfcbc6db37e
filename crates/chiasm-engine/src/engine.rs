//! The closed-loop step scheduler.
//!
//! [`ClosedLoopEngine`] orchestrates one logical tick across its three
//! collaborators: the robot step is dispatched asynchronously to the
//! [`StepWorker`](crate::worker::StepWorker), then the brain step and
//! both transfer-function passes run inline on the calling thread,
//! overlapping the in-flight robot step. The transfer functions are
//! stamped with the pre-tick clock, trading one tick of staleness for
//! throughput; only the *next* tick's reads of robot state are
//! guaranteed consistent.
//!
//! # Ownership
//!
//! The engine is `Send` but not `Sync`: exactly one thread steps it.
//! Cross-thread control goes through [`EngineController`] (stop
//! request, in-flight wait, lock-free clock reads), never through the
//! engine itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use chiasm_core::{AdapterError, BrainAdapter, RobotAdapter, SimTime, TransferFunctionManager};

use crate::config::SimulationConfig;
use crate::metrics::StepMetrics;
use crate::worker::StepWorker;

/// Sentinel returned by [`ClosedLoopEngine::run_step`] when the robot
/// collaborator is no longer alive.
///
/// Out-of-band by construction: a successful tick always returns the
/// new clock value, which is non-negative. A dead robot is not an
/// error — calling code decides whether it is fatal (the lifecycle
/// machine forces a stop).
pub const STEP_ABORTED: f64 = -1.0;

// ── Errors ───────────────────────────────────────────────────────

/// Errors from the closed-loop engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// A collaborator failed to initialize.
    InitializationFailed {
        /// Which collaborator: `"robot"`, `"brain"`, or
        /// `"transfer functions"`.
        component: &'static str,
        /// The underlying adapter error.
        source: AdapterError,
    },
    /// A collaborator failed to reset.
    ResetFailed {
        /// Which collaborator failed.
        component: &'static str,
        /// The underlying adapter error.
        source: AdapterError,
    },
    /// The synchronous brain step raised during a tick.
    BrainStep {
        /// The underlying adapter error.
        source: AdapterError,
    },
    /// A transfer-function pass raised a manager-level fault during a
    /// tick. Per-function faults are absorbed inside the manager and
    /// never surface here.
    TransferFunction {
        /// The underlying adapter error.
        source: AdapterError,
    },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitializationFailed { component, source } => {
                write!(f, "{component} initialization failed: {source}")
            }
            Self::ResetFailed { component, source } => {
                write!(f, "{component} reset failed: {source}")
            }
            Self::BrainStep { source } => write!(f, "brain step failed: {source}"),
            Self::TransferFunction { source } => {
                write!(f, "transfer function pass failed: {source}")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InitializationFailed { source, .. }
            | Self::ResetFailed { source, .. }
            | Self::BrainStep { source }
            | Self::TransferFunction { source } => Some(source),
        }
    }
}

// ── LoopExit ─────────────────────────────────────────────────────

/// Why [`ClosedLoopEngine::start`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// [`stop()`](ClosedLoopEngine::stop) was requested from another
    /// thread; the tick in flight ran to completion first.
    StopRequested,
    /// A tick reported the dead-robot sentinel. The lifecycle machine
    /// treats this as fatal.
    RobotDied,
}

// ── StepGate ─────────────────────────────────────────────────────

/// Tick-in-flight gate.
///
/// Raised at the top of `run_step`, lowered when the tick (or its
/// abort) is done. `wait()` blocks callers until no tick is in flight.
#[derive(Clone)]
struct StepGate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StepGate {
    fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    fn begin(&self) {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap() = true;
    }

    fn finish(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap() = false;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (flag, cvar) = &*self.inner;
        let mut in_flight = flag.lock().unwrap();
        while *in_flight {
            in_flight = cvar.wait(in_flight).unwrap();
        }
    }
}

// ── ClockCell ────────────────────────────────────────────────────

/// Lock-free mirror of the simulation clock for cross-thread reads.
///
/// The engine thread is the single writer; it stores after each
/// advance, so readers between ticks observe a stable value.
struct ClockCell(AtomicU64);

impl ClockCell {
    fn new() -> Self {
        ClockCell(AtomicU64::new(0.0f64.to_bits()))
    }

    fn store(&self, t: SimTime) {
        self.0.store(t.as_secs().to_bits(), Ordering::Release);
    }

    fn load(&self) -> SimTime {
        SimTime(f64::from_bits(self.0.load(Ordering::Acquire)))
    }
}

// ── EngineController ─────────────────────────────────────────────

/// Cross-thread control handle for a [`ClosedLoopEngine`].
///
/// `stop()` only requests termination of the run loop; a tick already
/// in progress always completes. Callers that need to know the loop
/// has drained use [`wait_step`](EngineController::wait_step).
#[derive(Clone)]
pub struct EngineController {
    stop_flag: Arc<AtomicBool>,
    gate: StepGate,
    clock: Arc<ClockCell>,
}

impl EngineController {
    /// Request that the run loop exit at the next iteration boundary.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    /// Withdraw a pending stop request before restarting the loop.
    ///
    /// [`ClosedLoopEngine::start`] honors a stop requested before it
    /// was called, so a controller that pauses and resumes must clear
    /// the flag itself — ordered with its own state bookkeeping — or
    /// the resumed loop would exit immediately. Clearing here rather
    /// than inside `start()` closes the window where a stop requested
    /// between the resume decision and the loop entry would be lost.
    pub fn clear_stop(&self) {
        self.stop_flag.store(false, Ordering::Release);
    }

    /// Whether a stop has been requested and not yet cleared.
    pub fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    /// Block until the tick currently in flight (if any) completes.
    pub fn wait_step(&self) {
        self.gate.wait();
    }

    /// The simulation clock, readable from any thread without locking.
    pub fn time(&self) -> SimTime {
        self.clock.load()
    }
}

// ── ClosedLoopEngine ─────────────────────────────────────────────

/// Orchestrates robot, brain, and transfer functions through lockstep
/// ticks of a fixed logical step size.
pub struct ClosedLoopEngine {
    robot: Arc<dyn RobotAdapter>,
    brain: Box<dyn BrainAdapter>,
    tfm: Box<dyn TransferFunctionManager>,
    worker: StepWorker,
    timestep: f64,
    tf_node: String,
    clock: SimTime,
    clock_cell: Arc<ClockCell>,
    initialized: bool,
    stop_flag: Arc<AtomicBool>,
    gate: StepGate,
    metrics: StepMetrics,
}

impl ClosedLoopEngine {
    /// Create an engine around the three collaborators.
    ///
    /// Spawns the step worker immediately; the collaborators are not
    /// touched until [`initialize`](ClosedLoopEngine::initialize).
    pub fn new(
        robot: Arc<dyn RobotAdapter>,
        brain: Box<dyn BrainAdapter>,
        tfm: Box<dyn TransferFunctionManager>,
        config: &SimulationConfig,
    ) -> Self {
        let worker = StepWorker::spawn(Arc::clone(&robot));
        Self {
            robot,
            brain,
            tfm,
            worker,
            timestep: config.timestep,
            tf_node: config.tf_node.clone(),
            clock: SimTime::ZERO,
            clock_cell: Arc::new(ClockCell::new()),
            initialized: false,
            stop_flag: Arc::new(AtomicBool::new(false)),
            gate: StepGate::new(),
            metrics: StepMetrics::default(),
        }
    }

    /// A control handle usable from other threads.
    pub fn controller(&self) -> EngineController {
        EngineController {
            stop_flag: Arc::clone(&self.stop_flag),
            gate: self.gate.clone(),
            clock: Arc::clone(&self.clock_cell),
        }
    }

    /// Initialize all three collaborators and zero the clock.
    ///
    /// A second call is permitted and re-runs all three
    /// initializations; callers are expected to call it once.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        self.robot
            .initialize()
            .map_err(|source| EngineError::InitializationFailed {
                component: "robot",
                source,
            })?;
        self.brain
            .initialize()
            .map_err(|source| EngineError::InitializationFailed {
                component: "brain",
                source,
            })?;
        self.tfm
            .initialize(&self.tf_node)
            .map_err(|source| EngineError::InitializationFailed {
                component: "transfer functions",
                source,
            })?;
        self.set_clock(SimTime::ZERO);
        self.initialized = true;
        Ok(())
    }

    /// Whether [`initialize`](ClosedLoopEngine::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The current simulation time.
    pub fn time(&self) -> SimTime {
        self.clock
    }

    /// The configured per-tick step size, in seconds.
    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    /// Timing data for the most recent successful tick.
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.metrics
    }

    /// Execute exactly one tick of `dt` seconds.
    ///
    /// Returns the new clock value in seconds, or [`STEP_ABORTED`] if
    /// the robot collaborator is not alive — in which case the clock
    /// is untouched and no brain or transfer-function work ran.
    ///
    /// A hard fault from the brain or the transfer-function manager
    /// propagates, but only after the in-flight robot step completed,
    /// so the request/completion handshake stays paired and the clock
    /// is not advanced for the failed tick.
    pub fn run_step(&mut self, dt: f64) -> Result<f64, EngineError> {
        let tick_start = Instant::now();
        self.gate.begin();

        if !self.robot.is_alive() {
            self.metrics.aborted_ticks += 1;
            self.gate.finish();
            return Ok(STEP_ABORTED);
        }

        // Robot step runs concurrently with everything below.
        self.worker.request_step(dt);

        let mut brain_us = 0u64;
        let mut tf_us = 0u64;
        let inline: Result<(), EngineError> = (|| {
            let brain_start = Instant::now();
            self.brain
                .run_step(dt * 1000.0)
                .map_err(|source| EngineError::BrainStep { source })?;
            brain_us = brain_start.elapsed().as_micros() as u64;

            // Transfer functions observe last tick's clock; the robot
            // step for this tick is still in flight.
            let stamp = self.clock;
            let tf_start = Instant::now();
            self.tfm
                .run_neuron_to_robot(stamp)
                .map_err(|source| EngineError::TransferFunction { source })?;
            self.tfm
                .run_robot_to_neuron(stamp)
                .map_err(|source| EngineError::TransferFunction { source })?;
            tf_us = tf_start.elapsed().as_micros() as u64;
            Ok(())
        })();

        match inline {
            Ok(()) => {
                self.set_clock(self.clock.advanced_by(dt));
                let wait_start = Instant::now();
                self.worker.wait_for_completion();
                self.metrics = StepMetrics {
                    total_us: tick_start.elapsed().as_micros() as u64,
                    brain_us,
                    transfer_functions_us: tf_us,
                    robot_wait_us: wait_start.elapsed().as_micros() as u64,
                    aborted_ticks: self.metrics.aborted_ticks,
                };
                self.gate.finish();
                Ok(self.clock.as_secs())
            }
            Err(e) => {
                // Drain the handshake before propagating so the next
                // tick cannot double-request.
                self.worker.wait_for_completion();
                self.gate.finish();
                Err(e)
            }
        }
    }

    /// Run ticks of the configured timestep until a stop is requested
    /// or the robot dies.
    ///
    /// Blocks the calling thread; [`stop`](ClosedLoopEngine::stop)
    /// must come from another thread. A stop requested *before* the
    /// call makes the loop return immediately — restart paths clear it
    /// first via [`EngineController::clear_stop`].
    pub fn start(&mut self) -> Result<LoopExit, EngineError> {
        while !self.stop_flag.load(Ordering::Acquire) {
            if self.run_step(self.timestep)? == STEP_ABORTED {
                return Ok(LoopExit::RobotDied);
            }
        }
        Ok(LoopExit::StopRequested)
    }

    /// Request that [`start`](ClosedLoopEngine::start) exit. Never
    /// blocks; the tick in flight completes first.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    /// Block until the tick currently in flight (if any) completes.
    pub fn wait_step(&self) {
        self.gate.wait();
    }

    /// Shut the robot and brain collaborators down. The clock is left
    /// as-is.
    pub fn shutdown(&mut self) {
        self.robot.shutdown();
        self.brain.shutdown();
    }

    /// Stop, drain the in-flight tick, reset all three collaborators,
    /// and zero the clock.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.stop();
        self.wait_step();
        self.robot
            .reset()
            .map_err(|source| EngineError::ResetFailed {
                component: "robot",
                source,
            })?;
        self.brain
            .reset()
            .map_err(|source| EngineError::ResetFailed {
                component: "brain",
                source,
            })?;
        self.tfm
            .reset()
            .map_err(|source| EngineError::ResetFailed {
                component: "transfer functions",
                source,
            })?;
        self.set_clock(SimTime::ZERO);
        Ok(())
    }

    fn set_clock(&mut self, t: SimTime) {
        self.clock = t;
        self.clock_cell.store(t);
    }
}

// The engine moves between threads (the lifecycle run loop) but is
// stepped by exactly one at a time.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<ClosedLoopEngine>();
    }
};
