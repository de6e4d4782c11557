//! Needle interaction configuration.

use sim_types::SimError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What the needle does once it has punctured a tissue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InsertedBehavior {
    /// Face embedding constraints tie the shaft to every pierced face.
    #[default]
    FaceEmbedding,
    /// No constraints while inserted; the needle leaves the tissue when the
    /// detector stops reporting contact.
    RigidOnly,
    /// Face embedding plus rows locking the needle's lateral position and
    /// orientation at the puncture point.
    AxisLock,
}

impl InsertedBehavior {
    /// Whether the embedding manager runs while inserted.
    #[must_use]
    pub fn uses_embedding(self) -> bool {
        matches!(self, Self::FaceEmbedding | Self::AxisLock)
    }
}

/// Configuration for needle-tissue interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeedleInteractionConfig {
    /// Inward force (N) a touching needle must exceed to puncture.
    pub force_threshold: f64,

    /// Share of the embedding correction taken by the tissue, in (0, 1].
    ///
    /// The needle takes the remaining `1 - compliance`.
    pub compliance: f64,

    /// Fraction in [0, 1] of the needle-axial component removed from the
    /// embedding difference. 0 uses the full difference vector.
    pub normal_friction: f64,

    /// Baumgarte factor for contact and embedding bias velocities.
    pub beta: f64,

    /// Whether contact rows get a companion friction row.
    pub use_friction: bool,

    /// Coulomb coefficient of the friction rows.
    pub friction_coefficient: f64,

    /// XPBD compliance of the tissue-side contact constraints.
    pub contact_compliance: f64,

    /// Multiplier on the squared bounding-sphere radius of a tetrahedron
    /// when culling embedding candidates.
    pub sphere_safety_factor: f64,

    /// Behavior after puncture.
    pub inserted_behavior: InsertedBehavior,
}

impl Default for NeedleInteractionConfig {
    fn default() -> Self {
        Self {
            force_threshold: 10.0,
            compliance: 0.5,
            normal_friction: 0.0,
            beta: 0.05,
            use_friction: false,
            friction_coefficient: 0.1,
            contact_compliance: 0.0,
            sphere_safety_factor: 2.0,
            inserted_behavior: InsertedBehavior::FaceEmbedding,
        }
    }
}

impl NeedleInteractionConfig {
    /// Rigid-only insertion: no embedding, free sliding once inserted.
    #[must_use]
    pub fn rigid_only() -> Self {
        Self {
            force_threshold: 250.0,
            use_friction: true,
            inserted_behavior: InsertedBehavior::RigidOnly,
            ..Self::default()
        }
    }

    /// Axis-locked insertion with a stiff, needle-dominant embedding.
    #[must_use]
    pub fn axis_locked() -> Self {
        Self {
            force_threshold: 50.0,
            compliance: 1e-6,
            inserted_behavior: InsertedBehavior::AxisLock,
            ..Self::default()
        }
    }

    /// Set the puncture force threshold.
    #[must_use]
    pub fn with_force_threshold(mut self, threshold: f64) -> Self {
        self.force_threshold = threshold;
        self
    }

    /// Set the embedding compliance.
    #[must_use]
    pub fn with_compliance(mut self, compliance: f64) -> Self {
        self.compliance = compliance;
        self
    }

    /// Set the axial friction fraction.
    #[must_use]
    pub fn with_normal_friction(mut self, normal_friction: f64) -> Self {
        self.normal_friction = normal_friction;
        self
    }

    /// Enable contact friction with the given coefficient.
    #[must_use]
    pub fn with_friction(mut self, coefficient: f64) -> Self {
        self.use_friction = true;
        self.friction_coefficient = coefficient;
        self
    }

    /// Set the behavior after puncture.
    #[must_use]
    pub fn with_inserted_behavior(mut self, behavior: InsertedBehavior) -> Self {
        self.inserted_behavior = behavior;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> sim_types::Result<()> {
        if !self.force_threshold.is_finite() || self.force_threshold < 0.0 {
            return Err(SimError::invalid_config(
                "force_threshold must be finite and non-negative",
            ));
        }
        if !(self.compliance > 0.0 && self.compliance <= 1.0) {
            return Err(SimError::invalid_config("compliance must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.normal_friction) {
            return Err(SimError::invalid_config("normal_friction must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(SimError::invalid_config("beta must be in [0, 1]"));
        }
        if !self.friction_coefficient.is_finite() || self.friction_coefficient < 0.0 {
            return Err(SimError::invalid_config(
                "friction_coefficient must be finite and non-negative",
            ));
        }
        if !self.contact_compliance.is_finite() || self.contact_compliance < 0.0 {
            return Err(SimError::invalid_config(
                "contact_compliance must be finite and non-negative",
            ));
        }
        if !self.sphere_safety_factor.is_finite() || self.sphere_safety_factor < 1.0 {
            return Err(SimError::invalid_config(
                "sphere_safety_factor must be at least 1",
            ));
        }
        Ok(())
    }
}
