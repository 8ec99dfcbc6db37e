//! Chiasm: a closed-loop simulation framework coupling a robot
//! simulation and a neural simulation in lockstep.
//!
//! This is the top-level facade crate that re-exports the public API
//! from the Chiasm sub-crates. For most users, adding `chiasm` as a
//! single dependency is sufficient.
//!
//! Each tick advances three collaborators by the same logical time
//! step: the robot step runs on a background worker while the brain
//! step and the two transfer-function passes run inline, overlapping
//! it. A lifecycle state machine gates the remote
//! start/pause/stop/reset surface, and a two-stage timeout supervisor
//! terminates simulations left running unattended.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! use chiasm::prelude::*;
//! use chiasm::types::AdapterError;
//!
//! // A robot adapter that just counts its steps.
//! #[derive(Default)]
//! struct CountingRobot {
//!     steps: AtomicU32,
//! }
//! impl RobotAdapter for CountingRobot {
//!     fn initialize(&self) -> Result<(), AdapterError> { Ok(()) }
//!     fn run_step(&self, dt: f64) -> f64 {
//!         let n = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
//!         n as f64 * dt
//!     }
//!     fn is_alive(&self) -> bool { true }
//!     fn shutdown(&self) {}
//!     fn reset(&self) -> Result<(), AdapterError> { Ok(()) }
//! }
//!
//! // Brain and transfer functions that do nothing.
//! struct IdleBrain;
//! impl BrainAdapter for IdleBrain {
//!     fn initialize(&mut self) -> Result<(), AdapterError> { Ok(()) }
//!     fn run_step(&mut self, _dt_ms: f64) -> Result<(), AdapterError> { Ok(()) }
//!     fn shutdown(&mut self) {}
//!     fn reset(&mut self) -> Result<(), AdapterError> { Ok(()) }
//! }
//! struct IdleTransferFunctions;
//! impl TransferFunctionManager for IdleTransferFunctions {
//!     fn initialize(&mut self, _node: &str) -> Result<(), AdapterError> { Ok(()) }
//!     fn run_neuron_to_robot(&mut self, _t: SimTime) -> Result<(), AdapterError> { Ok(()) }
//!     fn run_robot_to_neuron(&mut self, _t: SimTime) -> Result<(), AdapterError> { Ok(()) }
//!     fn reset(&mut self) -> Result<(), AdapterError> { Ok(()) }
//! }
//!
//! let config = SimulationConfig::default();
//! config.validate().unwrap();
//!
//! let mut engine = ClosedLoopEngine::new(
//!     Arc::new(CountingRobot::default()),
//!     Box::new(IdleBrain),
//!     Box::new(IdleTransferFunctions),
//!     &config,
//! );
//! engine.initialize().unwrap();
//! for _ in 0..4 {
//!     engine.run_step(0.125).unwrap();
//! }
//! assert_eq!(engine.time(), SimTime(0.5));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `chiasm-core` | Clock, adapter traits, commands, errors |
//! | [`status`] | `chiasm-status` | Status events, progress notifier, fault tracking |
//! | [`engine`] | `chiasm-engine` | Step scheduler, lifecycle server, timeout supervisor |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, adapter contracts, and errors (`chiasm-core`).
pub use chiasm_core as types;

/// Status and telemetry events (`chiasm-status`).
pub use chiasm_status as status;

/// Step scheduler, lifecycle control, and timeout supervision
/// (`chiasm-engine`).
pub use chiasm_engine as engine;

/// The most commonly used types, re-exported flat.
pub mod prelude {
    pub use chiasm_core::{
        BrainAdapter, ControlCommand, ControlReceipt, RobotAdapter, SimTime,
        TransferFunctionManager,
    };
    pub use chiasm_engine::{
        ClosedLoopEngine, Simulation, SimulationConfig, SimulationHandle, SimulationState,
        TimeoutConfig, STEP_ABORTED,
    };
    pub use chiasm_status::{StatusEvent, StatusPublisher, TaskProgressNotifier};
}
