//! Contracts through which the simulation collaborators are consumed.
//!
//! The closed-loop engine never implements robot motion, spiking
//! dynamics, or transfer-function evaluation itself — it sequences
//! them. Each collaborator is consumed through one of the narrow traits
//! below, injected at engine construction. There is no global registry
//! or ambient singleton: whoever builds the engine decides which
//! implementations it drives.

use crate::error::AdapterError;
use crate::time::SimTime;

/// The physics/robot side of the closed loop.
///
/// The robot adapter is shared between the scheduler thread (liveness
/// queries, initialization, shutdown, reset) and the step worker thread
/// (step execution), so all methods take `&self` and implementations
/// provide their own interior mutability. During a dispatched step the
/// worker thread has exclusive use of the adapter by convention; the
/// scheduler does not call into it until the completion handshake fires.
pub trait RobotAdapter: Send + Sync {
    /// Prepare the robot simulation for stepping.
    fn initialize(&self) -> Result<(), AdapterError>;

    /// Advance the robot simulation by `dt` seconds.
    ///
    /// Returns the robot's own simulation time. The step worker discards
    /// the value — success or failure of the robot side is observed via
    /// [`is_alive`](RobotAdapter::is_alive), never through the step
    /// handshake.
    fn run_step(&self, dt: f64) -> f64;

    /// Whether the underlying robot simulation is still responsive.
    ///
    /// Checked at the top of every tick; a dead robot aborts the tick
    /// before any brain or transfer-function work runs.
    fn is_alive(&self) -> bool;

    /// Tear the robot simulation down.
    fn shutdown(&self);

    /// Return the robot simulation to its initial state.
    fn reset(&self) -> Result<(), AdapterError>;
}

/// The neural-simulator side of the closed loop.
///
/// Exclusively owned by the scheduler thread; stepped synchronously
/// inside each tick. The brain's native time unit is milliseconds.
pub trait BrainAdapter: Send {
    /// Prepare the neural simulation for stepping.
    fn initialize(&mut self) -> Result<(), AdapterError>;

    /// Advance the neural simulation by `dt_ms` milliseconds.
    ///
    /// An error here is a hard fault: it propagates out of the tick
    /// (after the in-flight robot step completes) rather than being
    /// absorbed.
    fn run_step(&mut self, dt_ms: f64) -> Result<(), AdapterError>;

    /// Tear the neural simulation down.
    fn shutdown(&mut self);

    /// Return the neural simulation to its initial state.
    fn reset(&mut self) -> Result<(), AdapterError>;
}

/// The translation layer between neural and robot state.
///
/// Exclusively owned by the scheduler thread. Both passes are stamped
/// with the clock value from *before* the current tick's advance: the
/// robot step for the tick is still in flight when they run, so they
/// deliberately observe last tick's robot state.
///
/// Implementations absorb per-function runtime faults internally
/// (reporting them through the status channel) — an `Err` from either
/// pass is a manager-level hard fault and propagates.
pub trait TransferFunctionManager: Send {
    /// Prepare the transfer functions, binding them to `node`.
    fn initialize(&mut self, node: &str) -> Result<(), AdapterError>;

    /// Run the neuron → robot translation pass at simulation time `t`.
    fn run_neuron_to_robot(&mut self, t: SimTime) -> Result<(), AdapterError>;

    /// Run the robot → neuron translation pass at simulation time `t`.
    fn run_robot_to_neuron(&mut self, t: SimTime) -> Result<(), AdapterError>;

    /// Return all transfer functions to their initial state.
    fn reset(&mut self) -> Result<(), AdapterError>;
}
