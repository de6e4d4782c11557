//! Velocity-level constraint rows for the rigid body solver.
//!
//! Each row is a 3×4 Jacobian block whose columns are
//!
//! ```text
//! [ linear_a | angular_a | linear_b | angular_b ]
//! ```
//!
//! so that the constrained velocity is `J · [v_a, ω_a, v_b, ω_b]` summed over
//! components. The solver drives that velocity towards the bias `vu` while
//! keeping the accumulated impulse inside the row's range.
//!
//! # Baumgarte Stabilization
//!
//! Position error is fed back as a target velocity:
//!
//! ```text
//! vu = depth * β / dt
//! ```
//!
//! so only a fraction `β` of the error is removed per step.

use nalgebra::{Matrix3x4, Point3, Vector3};
use sim_types::{BodyId, RigidBody};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::contact::ContactPoint;
use crate::friction::FrictionCone;

/// Norm below which a direction is treated as degenerate.
pub const NORM_EPSILON: f64 = 1e-10;

/// Kind of rigid body constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RbdConstraintKind {
    /// Non-penetration along a contact normal.
    Contact,
    /// Tangential friction at a contact.
    Friction,
    /// Keeps a world point on the body's axis line.
    LineLock,
    /// Keeps the body's axis aligned with a fixed direction.
    AngularLock,
    /// Needle shaft embedded through a tissue face.
    Embedding,
}

/// Accumulated impulse bounds of a row.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImpulseRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl ImpulseRange {
    /// Push-only row: `[0, ∞)`.
    pub const UNILATERAL: Self = Self {
        min: 0.0,
        max: f64::INFINITY,
    };

    /// Unbounded row.
    pub const BILATERAL: Self = Self {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    /// Symmetric interval `[-bound, bound]`.
    #[must_use]
    pub fn symmetric(bound: f64) -> Self {
        let bound = bound.abs();
        Self {
            min: -bound,
            max: bound,
        }
    }

    /// Clamp an impulse into the range.
    #[must_use]
    pub fn clamp(&self, impulse: f64) -> f64 {
        impulse.max(self.min).min(self.max)
    }
}

/// A constraint the rigid body solver can consume.
pub trait RbdConstraint: std::fmt::Debug + Send {
    /// Kind of row.
    fn kind(&self) -> RbdConstraintKind;

    /// The constrained rigid body.
    fn body(&self) -> BodyId;

    /// Build the Jacobian and bias for this step.
    fn compute(&mut self, dt: f64);

    /// Jacobian block from the last [`compute`](Self::compute).
    fn jacobian(&self) -> &Matrix3x4<f64>;

    /// Bias velocity `vu` from the last [`compute`](Self::compute).
    fn bias(&self) -> f64;

    /// Impulse bounds, given the accumulated impulse of the row this one is
    /// coupled to (a friction row's normal row), or 0 if uncoupled.
    fn impulse_range(&self, coupled_impulse: f64) -> ImpulseRange;
}

/// Jacobian acting on body A only.
#[must_use]
pub fn single_body_jacobian(linear: Vector3<f64>, angular: Vector3<f64>) -> Matrix3x4<f64> {
    Matrix3x4::from_columns(&[linear, angular, Vector3::zeros(), Vector3::zeros()])
}

/// `β / dt`, zero for a non-positive step.
#[must_use]
pub fn baumgarte_rate(beta: f64, dt: f64) -> f64 {
    if dt > 0.0 {
        beta / dt
    } else {
        0.0
    }
}

/// Non-penetration row at a contact point.
#[derive(Debug, Clone)]
pub struct RbdContactConstraint {
    body: BodyId,
    /// Body origin at emission.
    center: Point3<f64>,
    /// Contact point, normal and depth.
    pub contact: ContactPoint,
    /// Baumgarte factor.
    pub beta: f64,
    jacobian: Matrix3x4<f64>,
    bias: f64,
}

impl RbdContactConstraint {
    /// Create a contact row for `body` (must be `contact.body_a`).
    #[must_use]
    pub fn new(body: &RigidBody, contact: ContactPoint, beta: f64) -> Self {
        Self {
            body: body.id,
            center: body.position(),
            contact,
            beta,
            jacobian: Matrix3x4::zeros(),
            bias: 0.0,
        }
    }
}

impl RbdConstraint for RbdContactConstraint {
    fn kind(&self) -> RbdConstraintKind {
        RbdConstraintKind::Contact
    }

    fn body(&self) -> BodyId {
        self.body
    }

    fn compute(&mut self, dt: f64) {
        let n = self.contact.normal;
        let r = self.contact.position - self.center;
        self.jacobian = single_body_jacobian(n, r.cross(&n));
        self.bias = self.contact.penetration.max(0.0) * baumgarte_rate(self.beta, dt);
    }

    fn jacobian(&self) -> &Matrix3x4<f64> {
        &self.jacobian
    }

    fn bias(&self) -> f64 {
        self.bias
    }

    fn impulse_range(&self, _coupled_impulse: f64) -> ImpulseRange {
        ImpulseRange::UNILATERAL
    }
}

/// Tangential friction row at a contact point.
///
/// The tangent is the direction of the body's sliding velocity at the
/// contact; the row removes that velocity within the friction cone.
#[derive(Debug, Clone)]
pub struct RbdFrictionConstraint {
    body: BodyId,
    center: Point3<f64>,
    point: Point3<f64>,
    /// Unit sliding direction.
    pub tangent: Vector3<f64>,
    /// Friction cone bounding the row.
    pub cone: FrictionCone,
    jacobian: Matrix3x4<f64>,
}

impl RbdFrictionConstraint {
    /// Friction row opposing the body's tangential velocity at the contact.
    ///
    /// Returns `None` when the contact point is not sliding.
    #[must_use]
    pub fn from_velocity(body: &RigidBody, contact: &ContactPoint, mu: f64) -> Option<Self> {
        let v = body.velocity_at(&contact.position);
        let n = contact.normal;
        let tangential = v - n * v.dot(&n);
        let tangent = tangential.try_normalize(NORM_EPSILON)?;
        Some(Self {
            body: body.id,
            center: body.position(),
            point: contact.position,
            tangent,
            cone: FrictionCone::new(mu),
            jacobian: Matrix3x4::zeros(),
        })
    }
}

impl RbdConstraint for RbdFrictionConstraint {
    fn kind(&self) -> RbdConstraintKind {
        RbdConstraintKind::Friction
    }

    fn body(&self) -> BodyId {
        self.body
    }

    fn compute(&mut self, _dt: f64) {
        let r = self.point - self.center;
        self.jacobian = single_body_jacobian(self.tangent, r.cross(&self.tangent));
    }

    fn jacobian(&self) -> &Matrix3x4<f64> {
        &self.jacobian
    }

    fn bias(&self) -> f64 {
        0.0
    }

    fn impulse_range(&self, coupled_impulse: f64) -> ImpulseRange {
        ImpulseRange::symmetric(self.cone.max_friction(coupled_impulse))
    }
}
