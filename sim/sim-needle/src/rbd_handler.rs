//! Rigid-side collision handling for the needle.

use hashbrown::HashMap;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_contact::{
    ContactPoint, RbdAngularLockConstraint, RbdConstraintQueue, RbdContactConstraint,
    RbdFrictionConstraint, RbdLineLockConstraint,
};
use sim_types::BodyId;

use crate::collision_data::ResolvedContact;
use crate::config::NeedleInteractionConfig;
use crate::needle::StraightNeedle;

/// Needle pose captured at puncture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PunctureRecord {
    /// Unit tip-to-tail axis.
    pub axis: Vector3<f64>,
    /// Body orientation.
    pub orientation: UnitQuaternion<f64>,
    /// Tip position.
    pub point: Point3<f64>,
}

/// Emits needle rows into the rigid body solver's queue.
///
/// Contact rows are only emitted while touching; the interaction decides
/// when to call [`emit_contacts`](Self::emit_contacts).
#[derive(Debug, Clone)]
pub struct NeedleRbdHandler {
    /// Baumgarte factor.
    pub beta: f64,
    /// Whether each contact row gets a friction row.
    pub use_friction: bool,
    /// Coulomb coefficient of friction rows.
    pub friction_coefficient: f64,
    punctures: HashMap<BodyId, PunctureRecord>,
}

impl NeedleRbdHandler {
    /// Create a handler from the interaction config.
    #[must_use]
    pub fn new(config: &NeedleInteractionConfig) -> Self {
        Self {
            beta: config.beta,
            use_friction: config.use_friction,
            friction_coefficient: config.friction_coefficient,
            punctures: HashMap::new(),
        }
    }

    /// One contact row per contact, each followed by a coupled friction row
    /// when friction is enabled and the needle is sliding.
    ///
    /// Returns the number of rows pushed.
    pub fn emit_contacts(
        &self,
        needle: &StraightNeedle,
        tissue: BodyId,
        contacts: &[ResolvedContact],
        queue: &mut RbdConstraintQueue,
    ) -> usize {
        let before = queue.len();
        for c in contacts {
            let Some(point) =
                ContactPoint::new(c.needle_point, c.normal, c.depth, needle.id(), tissue)
            else {
                continue;
            };
            let normal_row = queue.push(Box::new(RbdContactConstraint::new(
                &needle.body,
                point,
                self.beta,
            )));
            if self.use_friction {
                if let Some(friction) = RbdFrictionConstraint::from_velocity(
                    &needle.body,
                    &point,
                    self.friction_coefficient,
                ) {
                    queue.push_coupled(Box::new(friction), normal_row);
                }
            }
        }
        queue.len() - before
    }

    /// Capture the needle pose at puncture into `tissue`.
    pub fn record_puncture(&mut self, tissue: BodyId, needle: &StraightNeedle) {
        self.punctures.insert(
            tissue,
            PunctureRecord {
                axis: needle.axis(),
                orientation: needle.body.orientation(),
                point: needle.tip(),
            },
        );
    }

    /// Drop the puncture record for `tissue`.
    pub fn forget_puncture(&mut self, tissue: BodyId) -> Option<PunctureRecord> {
        self.punctures.remove(&tissue)
    }

    /// Puncture record for `tissue`.
    #[must_use]
    pub fn puncture(&self, tissue: BodyId) -> Option<&PunctureRecord> {
        self.punctures.get(&tissue)
    }

    /// Lateral and angular lock rows holding the needle at its puncture
    /// into `tissue`. Returns the number of rows pushed.
    pub fn emit_locks(
        &self,
        needle: &StraightNeedle,
        tissue: BodyId,
        queue: &mut RbdConstraintQueue,
    ) -> usize {
        let Some(record) = self.punctures.get(&tissue) else {
            return 0;
        };
        let before = queue.len();
        let axis = needle.axis();
        if let Some(rows) =
            RbdLineLockConstraint::pair(&needle.body, &needle.tip(), &axis, &record.point, self.beta)
        {
            for row in rows {
                queue.push(Box::new(row));
            }
        }
        if let Some(rows) =
            RbdAngularLockConstraint::pair(&needle.body, &axis, &record.axis, self.beta)
        {
            for row in rows {
                queue.push(Box::new(row));
            }
        }
        queue.len() - before
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_contact::RbdConstraintKind;
    use sim_types::{MassProperties, Pose, RigidBody, RigidBodyState, Twist};

    const TISSUE: BodyId = BodyId::new(1);

    fn needle(twist: Twist) -> StraightNeedle {
        let body = RigidBody::new(
            BodyId::new(2),
            RigidBodyState::new(Pose::from_position(Point3::new(0.0, 0.0, 0.5)), twist),
            MassProperties::isotropic(0.01, 1e-4),
        );
        StraightNeedle::new(
            body,
            Point3::new(0.0, 0.0, -0.5),
            Point3::new(0.0, 0.0, 0.5),
        )
        .unwrap()
    }

    fn contact() -> ResolvedContact {
        ResolvedContact {
            needle_point: Point3::origin(),
            normal: Vector3::z(),
            depth: 0.01,
            pbd: None,
        }
    }

    #[test]
    fn test_contact_rows() {
        let handler = NeedleRbdHandler::new(&NeedleInteractionConfig::default());
        let mut queue = RbdConstraintQueue::new();
        let n = handler.emit_contacts(
            &needle(Twist::zero()),
            TISSUE,
            &[contact(), contact()],
            &mut queue,
        );
        assert_eq!(n, 2);
        assert_eq!(queue.count_of(RbdConstraintKind::Contact), 2);
        assert_eq!(queue.count_of(RbdConstraintKind::Friction), 0);
    }

    #[test]
    fn test_friction_rows_only_when_sliding() {
        let config = NeedleInteractionConfig::default().with_friction(0.3);
        let handler = NeedleRbdHandler::new(&config);

        let mut queue = RbdConstraintQueue::new();
        handler.emit_contacts(&needle(Twist::zero()), TISSUE, &[contact()], &mut queue);
        assert_eq!(queue.count_of(RbdConstraintKind::Friction), 0);

        let sliding = needle(Twist::linear(Vector3::new(0.1, 0.0, -0.1)));
        let mut queue = RbdConstraintQueue::new();
        handler.emit_contacts(&sliding, TISSUE, &[contact()], &mut queue);
        assert_eq!(queue.count_of(RbdConstraintKind::Friction), 1);
    }

    #[test]
    fn test_contact_row_stops_approach() {
        let handler = NeedleRbdHandler::new(&NeedleInteractionConfig::default());
        let mut n = needle(Twist::linear(Vector3::new(0.0, 0.0, -1.0)));
        let mut queue = RbdConstraintQueue::new();
        handler.emit_contacts(&n, TISSUE, &[contact()], &mut queue);
        queue.solve_velocities(&mut n.body, 0.01, 8);
        assert!(n.body.state.twist.linear.z >= -1e-9);
    }

    #[test]
    fn test_puncture_record_and_locks() {
        let mut handler = NeedleRbdHandler::new(&NeedleInteractionConfig::axis_locked());
        let mut n = needle(Twist::zero());
        let mut queue = RbdConstraintQueue::new();

        assert_eq!(handler.emit_locks(&n, TISSUE, &mut queue), 0);

        handler.record_puncture(TISSUE, &n);
        let record = *handler.puncture(TISSUE).unwrap();
        assert_relative_eq!(record.point, Point3::origin(), epsilon = 1e-12);
        assert_relative_eq!(record.axis, Vector3::z(), epsilon = 1e-12);

        // Needle drifted sideways: line-lock rows pull it back.
        n.body.state.pose.position.x += 0.01;
        assert_eq!(handler.emit_locks(&n, TISSUE, &mut queue), 4);
        assert_eq!(queue.count_of(RbdConstraintKind::LineLock), 2);
        assert_eq!(queue.count_of(RbdConstraintKind::AngularLock), 2);

        queue.solve_velocities(&mut n.body, 0.01, 8);
        assert!(n.body.state.twist.linear.x < 0.0);

        assert!(handler.forget_puncture(TISSUE).is_some());
        assert!(handler.puncture(TISSUE).is_none());
    }
}
