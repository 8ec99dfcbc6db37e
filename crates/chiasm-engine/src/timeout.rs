//! The unattended-simulation timeout supervisor.
//!
//! A simulation that was started but never driven to completion must
//! not run forever. The supervisor counts elapsed time on a dedicated
//! timer thread: a soft callback fires once at `soft_limit` (warning
//! telemetry), a hard callback fires once at `hard_limit` and is
//! expected to invoke the lifecycle stop path. Arming restarts the
//! count from zero and replaces any previous arming; disarming cancels
//! both callbacks.
//!
//! The timer thread spends its life blocked on the control channel —
//! it never touches the stepping hot path.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::config::TimeoutConfig;

/// Callback invoked by the timer thread.
pub type TimeoutCallback = Box<dyn Fn() + Send>;

enum TimerCommand {
    Arm,
    Disarm,
    Shutdown,
}

/// Two-stage elapsed-time watchdog.
///
/// At most one arming is active at a time; per arming, each callback
/// fires at most once.
pub struct TimeoutSupervisor {
    tx: Sender<TimerCommand>,
    thread: Option<JoinHandle<()>>,
}

impl TimeoutSupervisor {
    /// Spawn the timer thread.
    ///
    /// `on_soft` runs when `soft_limit` elapses without a disarm;
    /// `on_hard` runs when `hard_limit` elapses. Both run on the timer
    /// thread and must not block for long.
    pub fn spawn(config: TimeoutConfig, on_soft: TimeoutCallback, on_hard: TimeoutCallback) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name("chiasm-timeout".into())
            .spawn(move || timer_loop(&rx, config, &on_soft, &on_hard))
            .expect("failed to spawn timeout supervisor thread");
        Self {
            tx,
            thread: Some(thread),
        }
    }

    /// Start (or restart) counting from zero.
    pub fn arm(&self) {
        let _ = self.tx.send(TimerCommand::Arm);
    }

    /// Cancel the current arming, if any.
    pub fn disarm(&self) {
        let _ = self.tx.send(TimerCommand::Disarm);
    }
}

impl Drop for TimeoutSupervisor {
    fn drop(&mut self) {
        let _ = self.tx.send(TimerCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Timer thread body.
///
/// Disarmed: block on the channel. Armed: run the two-phase countdown,
/// where any `Arm` restarts it and any `Disarm` abandons it. The
/// countdown itself is two `recv_timeout` waits, so commands interrupt
/// it immediately.
fn timer_loop(
    rx: &Receiver<TimerCommand>,
    config: TimeoutConfig,
    on_soft: &TimeoutCallback,
    on_hard: &TimeoutCallback,
) {
    'disarmed: loop {
        match rx.recv() {
            Ok(TimerCommand::Arm) => {}
            Ok(TimerCommand::Disarm) => continue 'disarmed,
            Ok(TimerCommand::Shutdown) | Err(_) => return,
        }

        'armed: loop {
            match wait_phase(rx, config.soft_limit) {
                Phase::Elapsed => {}
                Phase::Rearmed => continue 'armed,
                Phase::Disarmed => continue 'disarmed,
                Phase::Shutdown => return,
            }
            on_soft();

            let remaining = config.hard_limit.saturating_sub(config.soft_limit);
            match wait_phase(rx, remaining) {
                Phase::Elapsed => {}
                Phase::Rearmed => continue 'armed,
                Phase::Disarmed => continue 'disarmed,
                Phase::Shutdown => return,
            }
            on_hard();
            // One forced stop per arming: go idle until re-armed.
            continue 'disarmed;
        }
    }
}

enum Phase {
    Elapsed,
    Rearmed,
    Disarmed,
    Shutdown,
}

fn wait_phase(rx: &Receiver<TimerCommand>, limit: Duration) -> Phase {
    match rx.recv_timeout(limit) {
        Err(RecvTimeoutError::Timeout) => Phase::Elapsed,
        Ok(TimerCommand::Arm) => Phase::Rearmed,
        Ok(TimerCommand::Disarm) => Phase::Disarmed,
        Ok(TimerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => Phase::Shutdown,
    }
}
