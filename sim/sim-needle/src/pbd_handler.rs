//! Tissue-side collision handling for the needle.

use sim_deformable::{PbdConstraintQueue, PbdContactConstraint};

use crate::collision_data::ResolvedContact;
use crate::config::NeedleInteractionConfig;

/// Emits tissue contact constraints into the position solver's queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeedlePbdHandler {
    /// XPBD compliance of emitted constraints.
    pub contact_compliance: f64,
}

impl NeedlePbdHandler {
    /// Create a handler from the interaction config.
    #[must_use]
    pub fn new(config: &NeedleInteractionConfig) -> Self {
        Self {
            contact_compliance: config.contact_compliance,
        }
    }

    /// One constraint per contact that names tissue cells. The tissue is
    /// pushed opposite to the needle's separation direction.
    ///
    /// Returns the number of constraints pushed.
    pub fn emit(&self, contacts: &[ResolvedContact], queue: &mut PbdConstraintQueue) -> usize {
        let mut pushed = 0;
        for c in contacts {
            let Some(geometry) = c.pbd.clone() else {
                continue;
            };
            if let Some(constraint) =
                PbdContactConstraint::new(geometry, -c.normal, self.contact_compliance)
            {
                queue.push(Box::new(constraint));
                pushed += 1;
            }
        }
        pushed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use sim_deformable::{ConstraintType, ContactGeometry, TetrahedralMesh};

    fn tip_in_face() -> ResolvedContact {
        ResolvedContact {
            needle_point: Point3::new(0.2, 0.2, -0.05),
            normal: Vector3::z(),
            depth: 0.05,
            pbd: Some(ContactGeometry::VertexTriangle {
                triangle: [0, 1, 2],
                point: Point3::new(0.2, 0.2, -0.05),
            }),
        }
    }

    #[test]
    fn test_emits_only_cell_contacts() {
        let handler = NeedlePbdHandler::new(&NeedleInteractionConfig::default());
        let mut queue = PbdConstraintQueue::new();
        let resolved_only = ResolvedContact {
            pbd: None,
            ..tip_in_face()
        };
        assert_eq!(handler.emit(&[tip_in_face(), resolved_only], &mut queue), 1);
        assert_eq!(queue.count_of(ConstraintType::VertexTriangle), 1);
    }

    #[test]
    fn test_projection_pushes_surface_past_tip() {
        let mut mesh = TetrahedralMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, -1.0),
            ],
            vec![[0, 1, 2, 3]],
        )
        .unwrap();
        mesh.pin_vertex(3).unwrap();

        let handler = NeedlePbdHandler::new(&NeedleInteractionConfig::default());
        let mut queue = PbdConstraintQueue::new();
        handler.emit(&[tip_in_face()], &mut queue);
        queue.project(&mut mesh, 0.01, 10);

        for v in 0..3 {
            assert!(mesh.positions[v].z < 0.0);
        }
        assert!(mesh.velocities[0].z < 0.0);
    }
}
