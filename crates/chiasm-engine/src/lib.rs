//! Closed-loop step scheduler, lifecycle control, and timeout
//! supervision for Chiasm simulations.
//!
//! The engine advances a simulated robot, a simulated brain, and the
//! transfer functions between them by the same logical time step, in a
//! fixed order, once per tick. A lifecycle state machine gates the
//! remote start/pause/stop/reset surface, and a two-stage timeout
//! supervisor terminates simulations left running unattended.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod metrics;
pub mod server;
pub mod timeout;
pub mod worker;

pub use config::{ConfigError, SimulationConfig, TimeoutConfig};
pub use engine::{ClosedLoopEngine, EngineController, EngineError, LoopExit, STEP_ABORTED};
pub use lifecycle::{transition, LifecycleEffect, SimulationState, Transition};
pub use metrics::StepMetrics;
pub use server::{ControlError, Simulation, SimulationHandle};
pub use timeout::TimeoutSupervisor;
pub use worker::StepWorker;
