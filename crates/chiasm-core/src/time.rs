//! The simulation clock value type.

use std::fmt;
use std::ops::AddAssign;

/// A point on the simulation clock, in seconds.
///
/// The clock is non-negative and monotonically non-decreasing: it is
/// advanced by exactly the requested step size after each successful
/// tick and returns to zero only through an explicit reset. It has a
/// single writer — the scheduler thread that owns it — and is advanced
/// only after the tick's cross-thread handshake has completed, so any
/// value read between ticks is stable.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct SimTime(pub f64);

impl SimTime {
    /// The clock origin.
    pub const ZERO: SimTime = SimTime(0.0);

    /// The clock value in seconds.
    pub fn as_secs(self) -> f64 {
        self.0
    }

    /// The clock value in milliseconds.
    ///
    /// The brain collaborator's native step unit is milliseconds; this
    /// is the conversion used when stamping brain-side work.
    pub fn as_millis(self) -> f64 {
        self.0 * 1000.0
    }

    /// The clock advanced by `dt` seconds.
    pub fn advanced_by(self, dt: f64) -> SimTime {
        SimTime(self.0 + dt)
    }
}

impl AddAssign<f64> for SimTime {
    fn add_assign(&mut self, dt: f64) {
        self.0 += dt;
    }
}

impl From<f64> for SimTime {
    fn from(secs: f64) -> Self {
        SimTime(secs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
