//! Contact points produced by narrow-phase conversion.

use nalgebra::{Point3, Vector3};
use sim_types::BodyId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single point of contact between two bodies.
///
/// The normal points in the direction `body_a` must move to separate from
/// `body_b`; `penetration` is positive while the bodies overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactPoint {
    /// Contact position (world frame).
    pub position: Point3<f64>,
    /// Unit separation direction for `body_a`.
    pub normal: Vector3<f64>,
    /// Overlap depth (m).
    pub penetration: f64,
    /// The rigid body being constrained.
    pub body_a: BodyId,
    /// The other object in contact.
    pub body_b: BodyId,
}

impl ContactPoint {
    /// Create a contact point, normalizing `normal`.
    ///
    /// Returns `None` if the normal is degenerate.
    #[must_use]
    pub fn new(
        position: Point3<f64>,
        normal: Vector3<f64>,
        penetration: f64,
        body_a: BodyId,
        body_b: BodyId,
    ) -> Option<Self> {
        let normal = normal.try_normalize(1e-10)?;
        Some(Self {
            position,
            normal,
            penetration,
            body_a,
            body_b,
        })
    }

    /// The same contact seen from `body_b`.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            position: self.position,
            normal: -self.normal,
            penetration: self.penetration,
            body_a: self.body_b,
            body_b: self.body_a,
        }
    }

    /// Whether the bodies overlap.
    #[must_use]
    pub fn is_penetrating(&self) -> bool {
        self.penetration > 0.0
    }
}
