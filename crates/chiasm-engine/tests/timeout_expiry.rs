//! Integration test: the unattended-simulation watchdog.
//!
//! A simulation started and then left alone must warn once at the soft
//! limit and stop exactly once at the hard limit. Pausing disarms the
//! watchdog; resuming restarts the count from zero.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chiasm_engine::config::{SimulationConfig, TimeoutConfig};
use chiasm_engine::engine::ClosedLoopEngine;
use chiasm_engine::lifecycle::SimulationState;
use chiasm_engine::server::{Simulation, SimulationHandle};
use chiasm_test_utils::{
    CollectingPublisher, MockBrainAdapter, MockRobotAdapter, MockTransferFunctionManager,
};

fn launch(timeout: TimeoutConfig) -> (SimulationHandle, Arc<CollectingPublisher>, thread::JoinHandle<()>) {
    let publisher = CollectingPublisher::new();
    let robot = Arc::new(MockRobotAdapter::new());
    // Keep the tick loop from spinning flat out while we watch timers.
    robot.set_step_delay(Duration::from_millis(1));
    let engine = ClosedLoopEngine::new(
        robot,
        Box::new(MockBrainAdapter::new()),
        Box::new(MockTransferFunctionManager::new()),
        &SimulationConfig::default(),
    );
    let sim = Simulation::new(engine, publisher.clone(), timeout);
    let handle = sim.handle();
    let main_thread = thread::spawn(move || sim.main());
    (handle, publisher, main_thread)
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
fn unattended_simulation_stops_exactly_once() {
    let (handle, publisher, main_thread) = launch(TimeoutConfig {
        soft_limit: Duration::from_millis(60),
        hard_limit: Duration::from_millis(150),
    });

    handle.start().unwrap();
    let armed_at = Instant::now();

    assert!(wait_until(Duration::from_secs(5), || {
        handle.state() == SimulationState::Stopped
    }));
    // Not before the hard limit (small slack for the arm-to-clock gap).
    assert!(armed_at.elapsed() >= Duration::from_millis(140));
    main_thread.join().unwrap();

    // Let several more hard-limit multiples pass: still one stop.
    thread::sleep(Duration::from_millis(400));
    assert_eq!(publisher.state_notifications(), vec!["Stopped"]);

    // The soft warning fired once on the way.
    let warnings = publisher.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("run-time limit"));
}

#[test]
fn pausing_disarms_the_watchdog() {
    let (handle, publisher, main_thread) = launch(TimeoutConfig {
        soft_limit: Duration::from_millis(80),
        hard_limit: Duration::from_millis(160),
    });

    handle.start().unwrap();
    thread::sleep(Duration::from_millis(20));
    handle.pause().unwrap();

    // Sleep far past both limits: nothing fires while paused.
    thread::sleep(Duration::from_millis(400));
    assert_eq!(handle.state(), SimulationState::Paused);
    assert!(publisher.warnings().is_empty());
    assert!(publisher.state_notifications().is_empty());

    handle.stop().unwrap();
    main_thread.join().unwrap();
}

#[test]
fn resume_restarts_the_count_from_zero() {
    let (handle, _publisher, main_thread) = launch(TimeoutConfig {
        soft_limit: Duration::from_millis(120),
        hard_limit: Duration::from_millis(240),
    });

    handle.start().unwrap();
    // Pause/resume twice within the hard limit; each resume restarts
    // the counter, so no stop happens during this churn.
    for _ in 0..2 {
        thread::sleep(Duration::from_millis(60));
        handle.pause().unwrap();
        handle.start().unwrap();
    }
    assert_eq!(handle.state(), SimulationState::Running);

    // Left alone after the last resume, it does eventually stop.
    assert!(wait_until(Duration::from_secs(5), || {
        handle.state() == SimulationState::Stopped
    }));
    main_thread.join().unwrap();
}

#[test]
fn manual_stop_beats_the_watchdog() {
    let (handle, publisher, main_thread) = launch(TimeoutConfig {
        soft_limit: Duration::from_millis(100),
        hard_limit: Duration::from_millis(200),
    });

    handle.start().unwrap();
    thread::sleep(Duration::from_millis(20));
    handle.stop().unwrap();
    main_thread.join().unwrap();

    // The disarmed timer never produces a second stop.
    thread::sleep(Duration::from_millis(400));
    assert_eq!(publisher.state_notifications(), vec!["Stopped"]);
}
