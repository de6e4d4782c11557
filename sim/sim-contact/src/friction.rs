//! Coulomb friction bound for tangential impulse rows.
//!
//! A friction row is coupled to one contact row. Its accumulated impulse
//! `λₜ` is kept inside the interval the normal impulse `λₙ` allows:
//!
//! ```text
//! -μ λₙ ≤ λₜ ≤ μ λₙ
//! ```
//!
//! A separating contact (`λₙ ≤ 0`) transmits no friction.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Coulomb bound on the tangential impulse of a friction row.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrictionCone {
    /// Coulomb friction coefficient, non-negative.
    pub mu: f64,
}

impl Default for FrictionCone {
    fn default() -> Self {
        Self::frictionless()
    }
}

impl FrictionCone {
    /// Bound with coefficient `mu`; negative values clamp to zero.
    #[must_use]
    pub fn new(mu: f64) -> Self {
        Self { mu: mu.max(0.0) }
    }

    /// No friction.
    #[must_use]
    pub fn frictionless() -> Self {
        Self { mu: 0.0 }
    }

    /// Largest tangential impulse magnitude for `normal_impulse`.
    #[must_use]
    pub fn max_friction(&self, normal_impulse: f64) -> f64 {
        self.mu * normal_impulse.max(0.0)
    }

    /// Clamp a tangential impulse into `[-μ λₙ, μ λₙ]`.
    #[must_use]
    pub fn clamp_impulse(&self, tangent_impulse: f64, normal_impulse: f64) -> f64 {
        let bound = self.max_friction(normal_impulse);
        tangent_impulse.clamp(-bound, bound)
    }
}
