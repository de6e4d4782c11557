//! Needle collision state machine.
//!
//! ```text
//!            contact               inward force > threshold
//! REMOVED ───────────▶ TOUCHING ─────────────────────────▶ INSERTED
//!    ▲                    │                                    │
//!    └────────────────────┘                                    │
//!    │   contact lost                                          │
//!    └─────────────────────────────────────────────────────────┘
//!        no embedded faces left (or no contact, rigid-only)
//! ```
//!
//! [`decide_transition`] is pure: constraint emission reacts to its result.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Contact state of a needle against one tissue object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollisionState {
    /// No contact.
    #[default]
    Removed,
    /// Surface contact, not yet punctured.
    Touching,
    /// Shaft embedded in the tissue.
    Inserted,
}

/// Per-step inputs to [`decide_transition`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionInput {
    /// Whether the detector reported any collision element this step.
    pub has_contact: bool,
    /// `max(axis · force, 0)` from the previous step's resolved force.
    pub inward_force: f64,
    /// Active face constraints, when the embedding manager is in charge of
    /// leaving the inserted state. `None` defers to `has_contact`.
    pub embedded_faces: Option<usize>,
}

/// Next collision state.
///
/// - `Removed` → `Touching` on contact. Never directly to `Inserted`: a
///   puncture needs a prior touching step with fresh force data.
/// - `Touching` → `Removed` when contact is lost, else `Inserted` once the
///   inward force strictly exceeds `force_threshold`.
/// - `Inserted` → `Removed` when no face constraint remains, or when there
///   is no contact and no embedding manager is counting faces.
#[must_use]
pub fn decide_transition(
    state: CollisionState,
    input: &TransitionInput,
    force_threshold: f64,
) -> CollisionState {
    match state {
        CollisionState::Removed => {
            if input.has_contact {
                CollisionState::Touching
            } else {
                CollisionState::Removed
            }
        }
        CollisionState::Touching => {
            if !input.has_contact {
                CollisionState::Removed
            } else if input.inward_force > force_threshold {
                CollisionState::Inserted
            } else {
                CollisionState::Touching
            }
        }
        CollisionState::Inserted => match input.embedded_faces {
            Some(0) => CollisionState::Removed,
            Some(_) => CollisionState::Inserted,
            None if input.has_contact => CollisionState::Inserted,
            None => CollisionState::Removed,
        },
    }
}

/// Component of `force` along the tip-to-tail `axis`, clamped to be
/// non-negative. Non-finite values count as no force.
#[must_use]
pub fn inward_force(axis: &Vector3<f64>, force: &Vector3<f64>) -> f64 {
    let f = axis.dot(force);
    if f.is_finite() {
        f.max(0.0)
    } else {
        0.0
    }
}
