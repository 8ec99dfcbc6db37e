//! Integration test: a dying robot collaborator forces a stop.
//!
//! The liveness check at the top of each tick returns the abort
//! sentinel when the robot has gone away; the lifecycle loop must
//! translate that into exactly one transition to Stopped, with the
//! clock frozen at the last completed tick.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chiasm_engine::config::{SimulationConfig, TimeoutConfig};
use chiasm_engine::engine::ClosedLoopEngine;
use chiasm_engine::lifecycle::SimulationState;
use chiasm_engine::server::Simulation;
use chiasm_test_utils::{
    CollectingPublisher, MockBrainAdapter, MockRobotAdapter, MockTransferFunctionManager,
};

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
fn robot_death_stops_the_simulation_with_frozen_clock() {
    let publisher = CollectingPublisher::new();
    let robot = Arc::new(MockRobotAdapter::new());
    robot.die_after_steps(4);
    let config = SimulationConfig {
        timestep: 0.05,
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

    handle.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        handle.state() == SimulationState::Stopped
    }));
    main_thread.join().unwrap();

    // Four ticks completed before the fifth found the robot dead.
    assert_eq!(robot.step_count(), 4);
    assert!((handle.time().as_secs() - 0.2).abs() < 1e-9);

    // Exactly one stop, despite the abort sentinel being fatal.
    assert_eq!(publisher.state_notifications(), vec!["Stopped"]);
    assert_eq!(robot.shutdown_count(), 1);
}

#[test]
fn brain_hard_fault_is_published_and_stops_the_simulation() {
    let publisher = CollectingPublisher::new();
    let robot = Arc::new(MockRobotAdapter::new());
    let brain = MockBrainAdapter::new().fail_on_step(3);
    let config = SimulationConfig {
        timestep: 0.05,
        ..SimulationConfig::default()
    };
    let engine = ClosedLoopEngine::new(
        robot.clone(),
        Box::new(brain.clone()),
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

    handle.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        handle.state() == SimulationState::Stopped
    }));
    main_thread.join().unwrap();

    // The fault surfaced on the telemetry channel, not as a panic.
    assert_eq!(publisher.error_count(), 1);
    assert_eq!(publisher.state_notifications(), vec!["Stopped"]);
    // Two ticks completed; the third aborted before its clock advance.
    assert!((handle.time().as_secs() - 0.1).abs() < 1e-9);
    assert_eq!(brain.recorded_steps_ms().len(), 3);
}
