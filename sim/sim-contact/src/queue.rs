//! The per-step list of rows handed to the rigid body solver.
//!
//! The queue also carries a small sequential-impulse pass over a single
//! body. Full multi-body assembly belongs to the external solver; this pass
//! is what the interaction tests and headless tools use to see the rows act.

use nalgebra::Vector3;
use sim_types::RigidBody;

use crate::constraint::{RbdConstraint, RbdConstraintKind, NORM_EPSILON};

#[derive(Debug)]
struct QueuedRow {
    constraint: Box<dyn RbdConstraint>,
    coupled_to: Option<usize>,
}

/// Solver-owned list of rigid body constraint rows.
#[derive(Debug, Default)]
pub struct RbdConstraintQueue {
    rows: Vec<QueuedRow>,
}

/// Impulse applied by [`RbdConstraintQueue::solve_velocities`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedImpulse {
    /// Linear impulse (N·s).
    pub linear: Vector3<f64>,
    /// Angular impulse about the body origin (N·m·s).
    pub angular: Vector3<f64>,
}

impl RbdConstraintQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; returns its index.
    pub fn push(&mut self, constraint: Box<dyn RbdConstraint>) -> usize {
        self.rows.push(QueuedRow {
            constraint,
            coupled_to: None,
        });
        self.rows.len() - 1
    }

    /// Append a row whose impulse range depends on row `coupled_to`
    /// (a friction row bounded by its normal row).
    pub fn push_coupled(&mut self, constraint: Box<dyn RbdConstraint>, coupled_to: usize) -> usize {
        self.rows.push(QueuedRow {
            constraint,
            coupled_to: Some(coupled_to),
        });
        self.rows.len() - 1
    }

    /// Number of queued rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of queued rows of one kind.
    #[must_use]
    pub fn count_of(&self, kind: RbdConstraintKind) -> usize {
        self.rows
            .iter()
            .filter(|r| r.constraint.kind() == kind)
            .count()
    }

    /// Iterate over queued rows.
    pub fn iter(&self) -> impl Iterator<Item = &dyn RbdConstraint> {
        self.rows.iter().map(|r| r.constraint.as_ref())
    }

    /// Drop every queued row.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Rebuild every row's Jacobian and bias.
    pub fn compute_all(&mut self, dt: f64) {
        for row in &mut self.rows {
            row.constraint.compute(dt);
        }
    }

    /// Sequential-impulse velocity solve of the rows acting on `body`.
    ///
    /// Only the body-A columns are used. Rows for other bodies are skipped.
    /// The body's twist is updated in place.
    pub fn solve_velocities(
        &mut self,
        body: &mut RigidBody,
        dt: f64,
        iterations: usize,
    ) -> AppliedImpulse {
        self.compute_all(dt);

        let inv_mass = body.mass.inverse_mass();
        let inv_inertia = body.world_inverse_inertia();
        let mut accumulated = vec![0.0; self.rows.len()];
        let mut applied = AppliedImpulse {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        };

        for _ in 0..iterations {
            for i in 0..self.rows.len() {
                let row = &self.rows[i];
                if row.constraint.body() != body.id {
                    continue;
                }
                let j = row.constraint.jacobian();
                let lin: Vector3<f64> = j.column(0).into_owned();
                let ang: Vector3<f64> = j.column(1).into_owned();

                let k = inv_mass * lin.norm_squared() + ang.dot(&(inv_inertia * ang));
                if k < NORM_EPSILON {
                    continue;
                }

                let twist = &body.state.twist;
                let jv = lin.dot(&twist.linear) + ang.dot(&twist.angular);
                let coupled = row
                    .coupled_to
                    .and_then(|c| accumulated.get(c).copied())
                    .unwrap_or(0.0);
                let range = row.constraint.impulse_range(coupled);

                let old = accumulated[i];
                let new = range.clamp(old + (row.constraint.bias() - jv) / k);
                let delta = new - old;
                accumulated[i] = new;

                body.state.twist.linear += lin * (inv_mass * delta);
                body.state.twist.angular += inv_inertia * ang * delta;
                applied.linear += lin * delta;
                applied.angular += ang * delta;
            }
        }
        applied
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::constraint::{RbdContactConstraint, RbdFrictionConstraint};
    use crate::contact::ContactPoint;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_types::{BodyId, MassProperties, Pose, RigidBodyState, Twist};

    const DT: f64 = 0.01;

    fn falling_body(velocity: Vector3<f64>) -> RigidBody {
        RigidBody::new(
            BodyId::new(1),
            RigidBodyState::new(Pose::identity(), Twist::linear(velocity)),
            MassProperties::isotropic(2.0, 1.0),
        )
    }

    fn floor_contact(depth: f64) -> ContactPoint {
        ContactPoint::new(
            Point3::origin(),
            Vector3::z(),
            depth,
            BodyId::new(1),
            BodyId::new(2),
        )
        .unwrap()
    }

    #[test]
    fn test_contact_stops_approach_and_adds_bias() {
        let mut body = falling_body(Vector3::new(0.0, 0.0, -1.0));
        let mut queue = RbdConstraintQueue::new();
        queue.push(Box::new(RbdContactConstraint::new(&body, floor_contact(0.02), 0.05)));

        let applied = queue.solve_velocities(&mut body, DT, 4);

        // Target normal velocity is depth * beta / dt = 0.1.
        assert_relative_eq!(body.state.twist.linear.z, 0.1, epsilon = 1e-9);
        assert!(applied.linear.z > 0.0);
    }

    #[test]
    fn test_contact_never_pulls() {
        let mut body = falling_body(Vector3::new(0.0, 0.0, 3.0));
        let mut queue = RbdConstraintQueue::new();
        queue.push(Box::new(RbdContactConstraint::new(&body, floor_contact(0.0), 0.05)));

        queue.solve_velocities(&mut body, DT, 4);
        assert_relative_eq!(body.state.twist.linear.z, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_friction_bounded_by_normal_impulse() {
        let mut body = falling_body(Vector3::new(5.0, 0.0, -1.0));
        let contact = floor_contact(0.0);
        let mut queue = RbdConstraintQueue::new();
        let normal = queue.push(Box::new(RbdContactConstraint::new(&body, contact, 0.05)));
        let friction = RbdFrictionConstraint::from_velocity(&body, &contact, 0.1).unwrap();
        queue.push_coupled(Box::new(friction), normal);

        assert_eq!(queue.count_of(RbdConstraintKind::Friction), 1);
        let applied = queue.solve_velocities(&mut body, DT, 8);

        // Normal impulse m * 1 = 2, friction at most 0.1 * 2.
        assert_relative_eq!(applied.linear.z, 2.0, epsilon = 1e-9);
        assert_relative_eq!(applied.linear.x, -0.2, epsilon = 1e-9);
        assert_relative_eq!(body.state.twist.linear.x, 4.9, epsilon = 1e-9);
    }

    #[test]
    fn test_rows_for_other_bodies_skipped() {
        let mut body = falling_body(Vector3::new(0.0, 0.0, -1.0));
        let other = RigidBody::new(
            BodyId::new(9),
            RigidBodyState::default(),
            MassProperties::isotropic(1.0, 1.0),
        );
        let mut queue = RbdConstraintQueue::new();
        queue.push(Box::new(RbdContactConstraint::new(&other, floor_contact(0.1), 0.05)));

        queue.solve_velocities(&mut body, DT, 2);
        assert_relative_eq!(body.state.twist.linear.z, -1.0);
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert!(queue.is_empty());
    }
}
