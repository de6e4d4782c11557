//! Error types for simulation inputs.

use thiserror::Error;

/// Errors raised by invalid configuration or body data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Timestep was not positive and finite.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },
}

impl SimError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Return `dt` unchanged when it is positive and finite.
    pub fn check_timestep(dt: f64) -> Result<f64, Self> {
        if dt > 0.0 && dt.is_finite() {
            Ok(dt)
        } else {
            Err(Self::InvalidTimestep(dt))
        }
    }

    /// Whether this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}
