//! Position based constraints on tissue vertices.
//!
//! Every constraint implements [`PbdConstraint`]: it reports its value and
//! per-vertex gradient, and the provided [`PbdConstraint::solve`] applies the
//! XPBD update:
//!
//! ```text
//! Δλ = (-C - α̃ λ) / (Σ wᵢ |∇ᵢC|² + α̃)
//! Δxᵢ = wᵢ ∇ᵢC Δλ
//! ```
//!
//! Where:
//! - `C` is the constraint function
//! - `α̃ = α / h²` is the time-scaled compliance
//! - `λ` is the Lagrange multiplier
//! - `w` are inverse masses
//! - `∇C` is the constraint gradient
//!
//! Constraints address vertices by index, so they survive buffer
//! reallocation and never hold references into the mesh.

use nalgebra::{Point3, Unit, Vector3};
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Norm below which a direction is treated as degenerate.
pub const NORM_EPSILON: f64 = 1e-10;

/// Type of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintType {
    /// Tissue edge held at its rest length.
    EdgeLength,
    /// Needle point against a tissue triangle.
    VertexTriangle,
    /// Needle edge against a tissue edge.
    EdgeEdge,
    /// Needle point against a tissue edge.
    PointEdge,
    /// Needle point against a tissue vertex.
    PointPoint,
    /// Needle shaft embedded through a tissue face.
    Embedding,
}

/// Value and gradient of a constraint at the current positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintEval {
    /// Constraint value `C`.
    pub value: f64,
    /// `∂C/∂xᵢ`, one entry per vertex in [`PbdConstraint::vertices`] order.
    pub gradients: SmallVec<[Vector3<f64>; 4]>,
}

/// A constraint the position based solver can project.
pub trait PbdConstraint: std::fmt::Debug + Send {
    /// Kind of constraint.
    fn constraint_type(&self) -> ConstraintType;

    /// Tissue vertex indices this constraint moves.
    fn vertices(&self) -> SmallVec<[usize; 4]>;

    /// Value and gradient, or `None` when satisfied or degenerate.
    fn evaluate(&self, positions: &[Point3<f64>]) -> Option<ConstraintEval>;

    /// XPBD compliance (0 = rigid).
    fn compliance(&self) -> f64 {
        0.0
    }

    /// Accumulated Lagrange multiplier.
    fn lambda(&self) -> f64;

    /// Overwrite the Lagrange multiplier.
    fn set_lambda(&mut self, lambda: f64);

    /// Reset the Lagrange multiplier (call at start of time step).
    fn reset(&mut self) {
        self.set_lambda(0.0);
    }

    /// Project this constraint once.
    ///
    /// Returns the constraint error magnitude before the projection.
    fn solve(&mut self, positions: &mut [Point3<f64>], inv_masses: &[f64], dt: f64) -> f64 {
        let Some(eval) = self.evaluate(positions) else {
            return 0.0;
        };
        let vertices = self.vertices();

        let w_sum: f64 = vertices
            .iter()
            .zip(&eval.gradients)
            .map(|(&v, g)| inv_masses.get(v).copied().unwrap_or(0.0) * g.norm_squared())
            .sum();
        if w_sum < NORM_EPSILON {
            return 0.0;
        }

        let alpha_tilde = time_scaled_compliance(self.compliance(), dt);
        let delta_lambda = alpha_tilde.mul_add(-self.lambda(), -eval.value) / (w_sum + alpha_tilde);

        for (&v, g) in vertices.iter().zip(&eval.gradients) {
            let w = inv_masses.get(v).copied().unwrap_or(0.0);
            if let Some(p) = positions.get_mut(v) {
                *p += g * (w * delta_lambda);
            }
        }
        self.set_lambda(self.lambda() + delta_lambda);

        eval.value.abs()
    }
}

/// `α̃ = α / h²`, zero for rigid constraints or a non-positive step.
#[must_use]
pub fn time_scaled_compliance(compliance: f64, dt: f64) -> f64 {
    if compliance > 0.0 && dt > 0.0 {
        compliance / (dt * dt)
    } else {
        0.0
    }
}

/// Tissue edge held at its rest length.
///
/// One per mesh edge gives the tissue its structural stiffness in the
/// reference projection; the compliance sets how far an embedded needle
/// can drag a face before the surrounding edges resist.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeLengthConstraint {
    /// Edge vertex indices.
    pub edge: [usize; 2],
    /// Rest length.
    pub rest_length: f64,
    /// XPBD compliance (inverse stiffness).
    pub compliance: f64,
    lambda: f64,
}

impl EdgeLengthConstraint {
    /// Edge `edge` with an explicit rest length.
    #[must_use]
    pub const fn new(edge: [usize; 2], rest_length: f64, compliance: f64) -> Self {
        Self {
            edge,
            rest_length,
            compliance,
            lambda: 0.0,
        }
    }

    /// Edge `edge` at its current length in `positions`.
    ///
    /// Returns `None` if either vertex is missing.
    #[must_use]
    pub fn at_rest(edge: [usize; 2], positions: &[Point3<f64>], compliance: f64) -> Option<Self> {
        let [a, b] = edge;
        let rest_length = (positions.get(b)? - positions.get(a)?).norm();
        Some(Self::new(edge, rest_length, compliance))
    }
}

impl PbdConstraint for EdgeLengthConstraint {
    fn constraint_type(&self) -> ConstraintType {
        ConstraintType::EdgeLength
    }

    fn vertices(&self) -> SmallVec<[usize; 4]> {
        SmallVec::from_slice(&self.edge)
    }

    fn evaluate(&self, positions: &[Point3<f64>]) -> Option<ConstraintEval> {
        let [a, b] = self.edge;
        let diff = positions.get(b)? - positions.get(a)?;
        let (n, length) = Unit::try_new_and_get(diff, NORM_EPSILON)?;
        Some(ConstraintEval {
            value: length - self.rest_length,
            gradients: smallvec![-n.into_inner(), n.into_inner()],
        })
    }

    fn compliance(&self) -> f64 {
        self.compliance
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }

    fn set_lambda(&mut self, lambda: f64) {
        self.lambda = lambda;
    }
}
