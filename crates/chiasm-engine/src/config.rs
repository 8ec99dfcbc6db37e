//! Simulation configuration, validation, and error types.
//!
//! [`SimulationConfig`] is the construction input for
//! [`ClosedLoopEngine`](crate::engine::ClosedLoopEngine) and
//! [`Simulation`](crate::server::Simulation). `validate()` checks the
//! structural invariants once at startup so the stepping hot path can
//! assume a sane timestep and timeout shape.

use std::error::Error;
use std::fmt;
use std::time::Duration;

// ── TimeoutConfig ──────────────────────────────────────────────────

/// Limits for the unattended-simulation supervisor.
///
/// The soft limit fires a warning once; the hard limit forces the stop
/// path. Both are measured from the most recent (re)arming.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Elapsed time after which a warning is published. Default: 4 min.
    pub soft_limit: Duration,
    /// Elapsed time after which the simulation is force-stopped.
    /// Default: 5 min.
    pub hard_limit: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            soft_limit: Duration::from_secs(240),
            hard_limit: Duration::from_secs(300),
        }
    }
}

// ── SimulationConfig ───────────────────────────────────────────────

/// Complete configuration for a closed-loop simulation.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Logical step size per tick, in seconds. Default: 0.02.
    pub timestep: f64,
    /// Node name handed to the transfer-function manager at
    /// initialization. Default: `"tfnode"`.
    pub tf_node: String,
    /// Unattended-simulation limits.
    pub timeout: TimeoutConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 0.02,
            tf_node: "tfnode".to_string(),
            timeout: TimeoutConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Timestep must be finite and positive, and its millisecond
        //    form must also be finite (the brain steps in ms).
        if !self.timestep.is_finite()
            || self.timestep <= 0.0
            || !(self.timestep * 1000.0).is_finite()
        {
            return Err(ConfigError::InvalidTimestep {
                value: self.timestep,
            });
        }
        // 2. Transfer functions need a node to bind to.
        if self.tf_node.is_empty() {
            return Err(ConfigError::EmptyNodeName);
        }
        // 3. Timeout limits: both non-zero, soft strictly before hard.
        if self.timeout.hard_limit.is_zero() || self.timeout.soft_limit.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                reason: "timeout limits must be non-zero".to_string(),
            });
        }
        if self.timeout.soft_limit >= self.timeout.hard_limit {
            return Err(ConfigError::InvalidTimeout {
                reason: format!(
                    "soft_limit ({:?}) must be below hard_limit ({:?})",
                    self.timeout.soft_limit, self.timeout.hard_limit,
                ),
            });
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`SimulationConfig::validate()`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Timestep is NaN, infinite, zero, negative, or overflows in ms.
    InvalidTimestep {
        /// The invalid value.
        value: f64,
    },
    /// Transfer-function node name is empty.
    EmptyNodeName,
    /// Timeout limits violate an invariant.
    InvalidTimeout {
        /// Description of which invariant was violated.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimestep { value } => {
                write!(f, "timestep must be finite and positive, got {value}")
            }
            Self::EmptyNodeName => write!(f, "transfer-function node name is empty"),
            Self::InvalidTimeout { reason } => write!(f, "invalid timeout config: {reason}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_nan_timestep_fails() {
        let cfg = SimulationConfig {
            timestep: f64::NAN,
            ..SimulationConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::InvalidTimestep { .. }) => {}
            other => panic!("expected InvalidTimestep, got {other:?}"),
        }
    }

    #[test]
    fn validate_zero_timestep_fails() {
        let cfg = SimulationConfig {
            timestep: 0.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidTimestep { .. })
        ));
    }

    #[test]
    fn validate_negative_timestep_fails() {
        let cfg = SimulationConfig {
            timestep: -0.05,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidTimestep { .. })
        ));
    }

    /// A timestep so large that the millisecond conversion overflows to
    /// infinity must be rejected before it reaches the brain adapter.
    #[test]
    fn validate_ms_overflow_timestep_fails() {
        let cfg = SimulationConfig {
            timestep: f64::MAX,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidTimestep { .. })
        ));
    }

    #[test]
    fn validate_empty_node_name_fails() {
        let cfg = SimulationConfig {
            tf_node: String::new(),
            ..SimulationConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyNodeName));
    }

    #[test]
    fn validate_soft_at_or_above_hard_fails() {
        let cfg = SimulationConfig {
            timeout: TimeoutConfig {
                soft_limit: Duration::from_secs(300),
                hard_limit: Duration::from_secs(300),
            },
            ..SimulationConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn validate_zero_limits_fail() {
        let cfg = SimulationConfig {
            timeout: TimeoutConfig {
                soft_limit: Duration::ZERO,
                hard_limit: Duration::from_secs(10),
            },
            ..SimulationConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }
}
