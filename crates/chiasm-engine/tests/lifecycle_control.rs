//! Integration test: remote lifecycle control of a running simulation.
//!
//! Runs the lifecycle loop on its own thread (the deployment shape)
//! and drives it through a [`SimulationHandle`], checking every
//! transition of the walk Initial → Running → Paused → Running →
//! Stopped plus the fail-fast behavior of illegal operations.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chiasm_core::{ControlCommand, SimTime};
use chiasm_engine::config::{SimulationConfig, TimeoutConfig};
use chiasm_engine::engine::ClosedLoopEngine;
use chiasm_engine::lifecycle::SimulationState;
use chiasm_engine::server::{Simulation, SimulationHandle};
use chiasm_test_utils::{
    CollectingPublisher, MockBrainAdapter, MockRobotAdapter, MockTransferFunctionManager,
};

struct Fixture {
    handle: SimulationHandle,
    robot: Arc<MockRobotAdapter>,
    publisher: Arc<CollectingPublisher>,
    main_thread: thread::JoinHandle<()>,
}

fn launch(timestep: f64) -> Fixture {
    let publisher = CollectingPublisher::new();
    let robot = Arc::new(MockRobotAdapter::new());
    // Pace the loop so control operations interleave with real ticks.
    robot.set_step_delay(Duration::from_millis(1));
    let config = SimulationConfig {
        timestep,
        ..SimulationConfig::default()
    };
    let engine = ClosedLoopEngine::new(
        robot.clone(),
        Box::new(MockBrainAdapter::new()),
        Box::new(MockTransferFunctionManager::new()),
        &config,
    );
    let sim = Simulation::new(
        engine,
        publisher.clone(),
        TimeoutConfig {
            soft_limit: Duration::from_secs(60),
            hard_limit: Duration::from_secs(120),
        },
    );
    let handle = sim.handle();
    let main_thread = thread::spawn(move || sim.main());
    Fixture {
        handle,
        robot,
        publisher,
        main_thread,
    }
}

fn wait_until(deadline: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if pred() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    pred()
}

#[test]
fn start_pause_resume_stop_walk() {
    let fx = launch(0.01);

    fx.handle.start().unwrap();
    assert_eq!(fx.handle.state(), SimulationState::Running);
    assert!(wait_until(Duration::from_secs(5), || fx.robot.step_count() > 3));

    fx.handle.pause().unwrap();
    assert_eq!(fx.handle.state(), SimulationState::Paused);
    fx.handle.wait_step();
    assert!(fx.handle.time() > SimTime::ZERO);

    // Paused means paused: once the tick in flight drains, the step
    // count and the clock are frozen.
    thread::sleep(Duration::from_millis(50));
    let settled_steps = fx.robot.step_count();
    let settled_clock = fx.handle.time();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(fx.robot.step_count(), settled_steps);
    assert_eq!(fx.handle.time(), settled_clock);

    fx.handle.start().unwrap();
    assert_eq!(fx.handle.state(), SimulationState::Running);
    assert!(wait_until(Duration::from_secs(5), || {
        fx.handle.time() > settled_clock
    }));

    fx.handle.stop().unwrap();
    assert_eq!(fx.handle.state(), SimulationState::Stopped);

    // Pause after stop must fail fast and leave the state alone.
    let receipt = fx.handle.dispatch(ControlCommand::Pause);
    assert!(!receipt.success);
    assert_eq!(receipt.state, "Stopped");
    assert!(receipt.reason.unwrap().contains("Stopped"));

    fx.main_thread.join().unwrap();
    // The lifecycle loop shut the collaborators down on exit.
    assert_eq!(fx.robot.shutdown_count(), 1);
    assert_eq!(fx.publisher.state_notifications(), vec!["Stopped"]);
}

#[test]
fn reset_from_paused_returns_to_initial_with_zero_clock() {
    let fx = launch(0.01);

    fx.handle.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || fx.robot.step_count() > 2));
    fx.handle.pause().unwrap();
    fx.handle.wait_step();
    assert!(fx.handle.time() > SimTime::ZERO);

    fx.handle.reset().unwrap();
    assert_eq!(fx.handle.state(), SimulationState::Initial);
    assert_eq!(fx.handle.time(), SimTime::ZERO);
    assert_eq!(fx.robot.reset_count(), 1);
    assert_eq!(
        fx.handle.dispatch(ControlCommand::QueryState).state,
        "Initialized"
    );

    // The walk is repeatable after a reset.
    fx.handle.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        fx.handle.time() > SimTime::ZERO
    }));
    fx.handle.stop().unwrap();
    fx.main_thread.join().unwrap();
}

#[test]
fn query_state_never_mutates() {
    let fx = launch(0.01);

    for _ in 0..3 {
        let receipt = fx.handle.dispatch(ControlCommand::QueryState);
        assert!(receipt.success);
        assert_eq!(receipt.state, "Initialized");
    }
    assert_eq!(fx.handle.state(), SimulationState::Initial);

    fx.handle.start().unwrap();
    fx.handle.stop().unwrap();
    fx.main_thread.join().unwrap();
}
