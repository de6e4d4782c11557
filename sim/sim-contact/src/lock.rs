//! Locking rows that pin a slender body at a fixed world point.
//!
//! After a needle punctures tissue in the axis-locked mode, two pairs of
//! rows hold it in place:
//!
//! - [`RbdLineLockConstraint`] keeps the puncture point on the needle's
//!   axis line (two lateral directions, the needle may still slide along
//!   its axis)
//! - [`RbdAngularLockConstraint`] keeps the axis aligned with the axis at
//!   puncture (two rotational directions, roll about the axis is free)

use nalgebra::{Matrix3x4, Point3, UnitQuaternion, Vector3};
use sim_types::{BodyId, RigidBody};

use crate::constraint::{
    baumgarte_rate, single_body_jacobian, ImpulseRange, RbdConstraint, RbdConstraintKind,
    NORM_EPSILON,
};

/// Two unit vectors orthogonal to `axis` and to each other.
#[must_use]
pub fn orthonormal_pair(axis: &Vector3<f64>) -> [Vector3<f64>; 2] {
    let seed = if axis.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = axis.cross(&seed).normalize();
    let v = axis.cross(&u).normalize();
    [u, v]
}

/// Lateral lock: one direction of the puncture point's offset from the line.
#[derive(Debug, Clone)]
pub struct RbdLineLockConstraint {
    body: BodyId,
    center: Point3<f64>,
    /// Closest point on the needle line to the locked point.
    line_point: Point3<f64>,
    /// Lateral unit direction of this row.
    pub direction: Vector3<f64>,
    /// Signed lateral error along `direction`.
    pub error: f64,
    /// Baumgarte factor.
    pub beta: f64,
    jacobian: Matrix3x4<f64>,
    bias: f64,
}

impl RbdLineLockConstraint {
    /// Rows keeping `locked_point` on the line through `line_origin` along
    /// `axis`. Returns `None` for a degenerate axis.
    #[must_use]
    pub fn pair(
        body: &RigidBody,
        line_origin: &Point3<f64>,
        axis: &Vector3<f64>,
        locked_point: &Point3<f64>,
        beta: f64,
    ) -> Option<[Self; 2]> {
        let axis = axis.try_normalize(NORM_EPSILON)?;
        let line_point = line_origin + axis * (locked_point - line_origin).dot(&axis);
        let offset = locked_point - line_point;
        let row = |direction: Vector3<f64>| Self {
            body: body.id,
            center: body.position(),
            line_point,
            direction,
            error: offset.dot(&direction),
            beta,
            jacobian: Matrix3x4::zeros(),
            bias: 0.0,
        };
        let [u, v] = orthonormal_pair(&axis);
        Some([row(u), row(v)])
    }
}

impl RbdConstraint for RbdLineLockConstraint {
    fn kind(&self) -> RbdConstraintKind {
        RbdConstraintKind::LineLock
    }

    fn body(&self) -> BodyId {
        self.body
    }

    fn compute(&mut self, dt: f64) {
        let r = self.line_point - self.center;
        self.jacobian = single_body_jacobian(self.direction, r.cross(&self.direction));
        self.bias = self.error * baumgarte_rate(self.beta, dt);
    }

    fn jacobian(&self) -> &Matrix3x4<f64> {
        &self.jacobian
    }

    fn bias(&self) -> f64 {
        self.bias
    }

    fn impulse_range(&self, _coupled_impulse: f64) -> ImpulseRange {
        ImpulseRange::BILATERAL
    }
}

/// Orientation lock: one rotational direction perpendicular to the axis.
#[derive(Debug, Clone)]
pub struct RbdAngularLockConstraint {
    body: BodyId,
    /// Unit rotation direction of this row.
    pub direction: Vector3<f64>,
    /// Signed angle (rad) still needed about `direction`.
    pub error: f64,
    /// Baumgarte factor.
    pub beta: f64,
    jacobian: Matrix3x4<f64>,
    bias: f64,
}

impl RbdAngularLockConstraint {
    /// Rows rotating `current_axis` back onto `locked_axis`.
    ///
    /// Returns `None` if either axis is degenerate.
    #[must_use]
    pub fn pair(
        body: &RigidBody,
        current_axis: &Vector3<f64>,
        locked_axis: &Vector3<f64>,
        beta: f64,
    ) -> Option<[Self; 2]> {
        let current = current_axis.try_normalize(NORM_EPSILON)?;
        let locked = locked_axis.try_normalize(NORM_EPSILON)?;
        let [u, v] = orthonormal_pair(&current);
        // Antiparallel axes have no unique rotation: turn by π about `u`.
        let correction = match UnitQuaternion::rotation_between(&current, &locked) {
            Some(q) => q
                .axis_angle()
                .map_or_else(Vector3::zeros, |(axis, angle)| axis.into_inner() * angle),
            None => u * std::f64::consts::PI,
        };

        let row = |direction: Vector3<f64>| Self {
            body: body.id,
            direction,
            error: correction.dot(&direction),
            beta,
            jacobian: Matrix3x4::zeros(),
            bias: 0.0,
        };
        Some([row(u), row(v)])
    }
}

impl RbdConstraint for RbdAngularLockConstraint {
    fn kind(&self) -> RbdConstraintKind {
        RbdConstraintKind::AngularLock
    }

    fn body(&self) -> BodyId {
        self.body
    }

    fn compute(&mut self, dt: f64) {
        self.jacobian = single_body_jacobian(Vector3::zeros(), self.direction);
        self.bias = self.error * baumgarte_rate(self.beta, dt);
    }

    fn jacobian(&self) -> &Matrix3x4<f64> {
        &self.jacobian
    }

    fn bias(&self) -> f64 {
        self.bias
    }

    fn impulse_range(&self, _coupled_impulse: f64) -> ImpulseRange {
        ImpulseRange::BILATERAL
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_types::{MassProperties, Pose, RigidBodyState};

    fn body() -> RigidBody {
        RigidBody::new(
            BodyId::new(5),
            RigidBodyState::at_rest(Pose::identity()),
            MassProperties::isotropic(1.0, 0.1),
        )
    }

    #[test]
    fn test_orthonormal_pair() {
        for axis in [Vector3::x(), Vector3::y(), Vector3::new(1.0, 2.0, 3.0).normalize()] {
            let [u, v] = orthonormal_pair(&axis);
            assert_relative_eq!(u.dot(&axis), 0.0, epsilon = 1e-12);
            assert_relative_eq!(v.dot(&axis), 0.0, epsilon = 1e-12);
            assert_relative_eq!(u.dot(&v), 0.0, epsilon = 1e-12);
            assert_relative_eq!(u.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_line_lock_error_is_lateral_offset() {
        let rows = RbdLineLockConstraint::pair(
            &body(),
            &Point3::origin(),
            &Vector3::z(),
            &Point3::new(0.3, -0.4, 2.0),
            0.05,
        )
        .unwrap();
        let lateral: Vector3<f64> = rows.iter().map(|r| r.direction * r.error).sum();
        assert_relative_eq!(lateral, Vector3::new(0.3, -0.4, 0.0), epsilon = 1e-12);
        assert!(rows.iter().all(|r| r.direction.z.abs() < 1e-12));
    }

    #[test]
    fn test_line_lock_on_line_has_no_bias() {
        let mut rows = RbdLineLockConstraint::pair(
            &body(),
            &Point3::origin(),
            &Vector3::z(),
            &Point3::new(0.0, 0.0, -1.0),
            0.05,
        )
        .unwrap();
        for row in &mut rows {
            row.compute(0.01);
            assert_relative_eq!(row.bias(), 0.0, epsilon = 1e-12);
            assert_eq!(row.impulse_range(0.0), ImpulseRange::BILATERAL);
        }
    }

    #[test]
    fn test_angular_lock_rotation_error() {
        let angle = 0.1_f64;
        let current = Vector3::new(angle.sin(), 0.0, angle.cos());
        let mut rows =
            RbdAngularLockConstraint::pair(&body(), &current, &Vector3::z(), 0.5).unwrap();

        // Rotation from current back to z is -angle about y.
        let correction: Vector3<f64> = rows.iter().map(|r| r.direction * r.error).sum();
        assert_relative_eq!(correction, Vector3::new(0.0, -angle, 0.0), epsilon = 1e-9);

        rows[0].compute(0.01);
        assert_eq!(rows[0].jacobian().column(0).into_owned(), Vector3::zeros());
        assert_eq!(rows[0].kind(), RbdConstraintKind::AngularLock);
    }

    #[test]
    fn test_angular_lock_aligned() {
        let rows = RbdAngularLockConstraint::pair(&body(), &Vector3::z(), &Vector3::z(), 0.5)
            .unwrap();
        assert!(rows.iter().all(|r| r.error.abs() < 1e-12));
    }

    #[test]
    fn test_angular_lock_flipped_axis() {
        let mut rows =
            RbdAngularLockConstraint::pair(&body(), &-Vector3::z(), &Vector3::z(), 0.5).unwrap();
        let correction: Vector3<f64> = rows.iter().map(|r| r.direction * r.error).sum();
        assert_relative_eq!(correction.norm(), std::f64::consts::PI, epsilon = 1e-12);
        assert_relative_eq!(correction.z, 0.0, epsilon = 1e-12);

        rows[0].compute(0.01);
        assert_relative_eq!(rows[0].bias().abs(), std::f64::consts::PI * 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_axis() {
        assert!(RbdLineLockConstraint::pair(
            &body(),
            &Point3::origin(),
            &Vector3::zeros(),
            &Point3::origin(),
            0.05
        )
        .is_none());
    }
}
