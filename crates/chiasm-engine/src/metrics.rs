//! Per-tick performance metrics for the closed-loop engine.
//!
//! [`StepMetrics`] captures where a tick spent its wall-clock time.
//! Because the brain and transfer-function work overlap the in-flight
//! robot step, `robot_wait_us` is the residual wait after the inline
//! work finished — a persistently large value means the robot side is
//! the bottleneck.

/// Timing data for the most recent tick.
///
/// All durations are in microseconds. The engine overwrites these
/// fields after each successful `run_step()`; `aborted_ticks` is
/// cumulative across the engine's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepMetrics {
    /// Wall-clock time for the entire tick.
    pub total_us: u64,
    /// Time spent in the synchronous brain step.
    pub brain_us: u64,
    /// Time spent in the two transfer-function passes.
    pub transfer_functions_us: u64,
    /// Residual wait for the robot-step completion handshake.
    pub robot_wait_us: u64,
    /// Cumulative number of ticks aborted because the robot was dead.
    pub aborted_ticks: u64,
}
