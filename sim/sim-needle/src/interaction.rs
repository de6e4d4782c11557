//! Per-step orchestration of needle-tissue interaction.
//!
//! [`NeedleInteraction::step`] runs once per needle/tissue pair per step,
//! after collision detection and before either solver:
//!
//! 1. Decide the collision state from the detector output and the needle's
//!    accumulated force.
//! 2. Emit surface contact constraints while touching, or embedding
//!    constraints while inserted.
//! 3. Snapshot positions for the next step's entry tests.
//!
//! Nothing here writes tissue or needle state other than the needle's
//! collision state map; constraints are appended to the solver queues.

use hashbrown::HashMap;
use sim_contact::RbdConstraintQueue;
use sim_deformable::{PbdConstraintQueue, TissueObject};
use sim_types::{BodyId, SimError};
use tracing::{debug, info};

use crate::collision_data::CollisionData;
use crate::config::{InsertedBehavior, NeedleInteractionConfig};
use crate::embedder::NeedleEmbedder;
use crate::error::{NeedleError, Result};
use crate::needle::StraightNeedle;
use crate::pbd_handler::NeedlePbdHandler;
use crate::rbd_handler::NeedleRbdHandler;
use crate::state::{decide_transition, CollisionState, TransitionInput};

/// Outcome of one [`NeedleInteraction::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Tissue the step ran against.
    pub tissue: BodyId,
    /// State before the step.
    pub previous: CollisionState,
    /// State after the step.
    pub state: CollisionState,
    /// Rows appended to the rigid body queue.
    pub rbd_rows: usize,
    /// Constraints appended to the position queue.
    pub pbd_constraints: usize,
    /// Faces embedded after the step.
    pub embedded_faces: usize,
    /// Faces entered this step.
    pub faces_added: usize,
    /// Faces exited this step.
    pub faces_removed: usize,
}

impl StepReport {
    /// Whether the step punctured the tissue.
    #[must_use]
    pub fn punctured(&self) -> bool {
        self.previous != CollisionState::Inserted && self.state == CollisionState::Inserted
    }

    /// Whether the needle left an inserted tissue this step.
    #[must_use]
    pub fn unpunctured(&self) -> bool {
        self.previous == CollisionState::Inserted && self.state != CollisionState::Inserted
    }
}

/// Needle-tissue interaction for one needle against any number of tissues.
#[derive(Debug, Clone)]
pub struct NeedleInteraction {
    config: NeedleInteractionConfig,
    rbd_handler: NeedleRbdHandler,
    pbd_handler: NeedlePbdHandler,
    embedders: HashMap<BodyId, NeedleEmbedder>,
}

impl NeedleInteraction {
    /// Create an interaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: NeedleInteractionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rbd_handler: NeedleRbdHandler::new(&config),
            pbd_handler: NeedlePbdHandler::new(&config),
            embedders: HashMap::new(),
            config,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &NeedleInteractionConfig {
        &self.config
    }

    /// Rigid-side handler.
    #[must_use]
    pub fn rbd_handler(&self) -> &NeedleRbdHandler {
        &self.rbd_handler
    }

    /// Embedding manager for `tissue`, once the needle has met it.
    #[must_use]
    pub fn embedder(&self, tissue: BodyId) -> Option<&NeedleEmbedder> {
        self.embedders.get(&tissue)
    }

    /// Run one step of the interaction between `needle` and `tissue`.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-positive or non-finite `dt`, or when
    /// `data` was produced for a different tissue.
    pub fn step(
        &mut self,
        needle: &mut StraightNeedle,
        tissue: &TissueObject,
        data: &CollisionData,
        pbd: &mut PbdConstraintQueue,
        rbd: &mut RbdConstraintQueue,
        dt: f64,
    ) -> Result<StepReport> {
        SimError::check_timestep(dt)?;
        if data.tissue != tissue.id {
            return Err(NeedleError::TissueMismatch {
                data: data.tissue,
                tissue: tissue.id,
            });
        }

        let config = self.config;
        let embedding = config.inserted_behavior.uses_embedding();
        let embedder = self
            .embedders
            .entry(tissue.id)
            .or_insert_with(|| NeedleEmbedder::new(tissue.id, needle.id(), &config));

        let previous = needle.collision_state(tissue.id);
        // Force from before the first touching step is stale.
        let inward_force = if previous == CollisionState::Removed {
            0.0
        } else {
            needle.inward_force()
        };
        let input = TransitionInput {
            has_contact: !data.is_empty(),
            inward_force,
            embedded_faces: embedding.then(|| embedder.len()),
        };
        let mut state = decide_transition(previous, &input, config.force_threshold);
        apply_transition(
            &mut self.rbd_handler,
            embedder,
            tissue.id,
            needle,
            previous,
            state,
        );

        let line = needle.line();
        let mut report = StepReport {
            tissue: tissue.id,
            previous,
            state,
            rbd_rows: 0,
            pbd_constraints: 0,
            embedded_faces: 0,
            faces_added: 0,
            faces_removed: 0,
        };
        let rbd_before = rbd.len();

        match state {
            CollisionState::Removed => {}
            CollisionState::Touching => {
                let contacts = data.resolve(&line, &tissue.mesh);
                self.rbd_handler
                    .emit_contacts(needle, tissue.id, &contacts, rbd);
                report.pbd_constraints = self.pbd_handler.emit(&contacts, pbd);
            }
            CollisionState::Inserted if embedding => {
                let update = embedder.update(&tissue.mesh, &line);
                report.faces_added = update.added;
                report.faces_removed = update.removed;

                let after = TransitionInput {
                    embedded_faces: Some(update.active),
                    ..input
                };
                let next = decide_transition(state, &after, config.force_threshold);
                apply_transition(
                    &mut self.rbd_handler,
                    embedder,
                    tissue.id,
                    needle,
                    state,
                    next,
                );
                state = next;

                if state == CollisionState::Inserted {
                    report.pbd_constraints =
                        embedder.emit(&needle.body, &line, &tissue.mesh, pbd, rbd, config.beta);
                    if config.inserted_behavior == InsertedBehavior::AxisLock {
                        self.rbd_handler.emit_locks(needle, tissue.id, rbd);
                    }
                }
            }
            CollisionState::Inserted => {}
        }

        needle.set_collision_state(tissue.id, state);
        embedder.snapshot(&tissue.mesh, &line);

        report.state = state;
        report.rbd_rows = rbd.len() - rbd_before;
        report.embedded_faces = embedder.len();
        Ok(report)
    }
}

/// Side effects of a state change.
fn apply_transition(
    rbd_handler: &mut NeedleRbdHandler,
    embedder: &mut NeedleEmbedder,
    tissue: BodyId,
    needle: &StraightNeedle,
    from: CollisionState,
    to: CollisionState,
) {
    match (from, to) {
        (CollisionState::Removed, CollisionState::Touching) => {
            debug!(needle = %needle.id(), tissue = %tissue, "Needle touching tissue");
        }
        (CollisionState::Touching, CollisionState::Removed) => {
            debug!(needle = %needle.id(), tissue = %tissue, "Needle contact lost");
        }
        (CollisionState::Touching, CollisionState::Inserted) => {
            info!(
                needle = %needle.id(),
                tissue = %tissue,
                force = needle.inward_force(),
                "Puncture"
            );
            rbd_handler.record_puncture(tissue, needle);
            embedder.clear();
        }
        (CollisionState::Inserted, CollisionState::Removed) => {
            info!(needle = %needle.id(), tissue = %tissue, "Unpunctured");
            embedder.clear();
            rbd_handler.forget_puncture(tissue);
        }
        _ => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use sim_contact::RbdConstraintKind;
    use sim_deformable::{ConstraintType, TetrahedralMesh};
    use sim_types::{MassProperties, Pose, RigidBody, RigidBodyState};

    use crate::collision_data::{CollisionElement, NeedleCell, TissueCell};
    use crate::needle::NeedleEnd;

    const DT: f64 = 0.01;
    const TISSUE: BodyId = BodyId::new(1);

    fn tissue() -> TissueObject {
        let mesh = TetrahedralMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, -1.0),
            ],
            vec![[0, 1, 2, 3]],
        )
        .unwrap();
        TissueObject::new(TISSUE, "slab", mesh)
    }

    /// Vertical needle with its tip at `tip_z` over (0.2, 0.2).
    fn needle(tip_z: f64) -> StraightNeedle {
        let body = RigidBody::new(
            BodyId::new(9),
            RigidBodyState::at_rest(Pose::from_position(Point3::new(0.2, 0.2, tip_z + 0.5))),
            MassProperties::cylinder(0.01, 0.001, 0.5),
        );
        StraightNeedle::new(
            body,
            Point3::new(0.0, 0.0, -0.5),
            Point3::new(0.0, 0.0, 0.5),
        )
        .unwrap()
    }

    fn tip_contact() -> CollisionData {
        CollisionData::new(TISSUE).with_element(CollisionElement::CellPair {
            needle: NeedleCell::Vertex(NeedleEnd::Tip),
            tissue: TissueCell::Triangle([0, 1, 2]),
        })
    }

    struct Queues {
        pbd: PbdConstraintQueue,
        rbd: RbdConstraintQueue,
    }

    impl Queues {
        fn new() -> Self {
            Self {
                pbd: PbdConstraintQueue::new(),
                rbd: RbdConstraintQueue::new(),
            }
        }
    }

    fn step(
        interaction: &mut NeedleInteraction,
        needle: &mut StraightNeedle,
        tissue: &TissueObject,
        data: &CollisionData,
    ) -> StepReport {
        let mut q = Queues::new();
        interaction
            .step(needle, tissue, data, &mut q.pbd, &mut q.rbd, DT)
            .unwrap()
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let mut interaction = NeedleInteraction::new(NeedleInteractionConfig::default()).unwrap();
        let mut n = needle(0.1);
        let t = tissue();
        let mut q = Queues::new();

        let err = interaction
            .step(&mut n, &t, &tip_contact(), &mut q.pbd, &mut q.rbd, 0.0)
            .unwrap_err();
        assert!(matches!(err, NeedleError::Sim(SimError::InvalidTimestep(_))));

        let other = CollisionData::new(BodyId::new(77));
        let err = interaction
            .step(&mut n, &t, &other, &mut q.pbd, &mut q.rbd, DT)
            .unwrap_err();
        assert!(matches!(err, NeedleError::TissueMismatch { .. }));

        assert!(NeedleInteraction::new(NeedleInteractionConfig::default().with_compliance(0.0))
            .is_err());
    }

    #[test]
    fn test_touching_emits_contacts() {
        let mut interaction = NeedleInteraction::new(NeedleInteractionConfig::default()).unwrap();
        let mut n = needle(-0.01);
        let t = tissue();
        let mut q = Queues::new();

        let report = interaction
            .step(&mut n, &t, &tip_contact(), &mut q.pbd, &mut q.rbd, DT)
            .unwrap();
        assert_eq!(report.previous, CollisionState::Removed);
        assert_eq!(report.state, CollisionState::Touching);
        assert_eq!(report.rbd_rows, 1);
        assert_eq!(report.pbd_constraints, 1);
        assert_eq!(q.rbd.count_of(RbdConstraintKind::Contact), 1);
        assert_eq!(q.pbd.count_of(ConstraintType::VertexTriangle), 1);
        assert_eq!(n.peek_state(TISSUE), CollisionState::Touching);
    }

    #[test]
    fn test_first_contact_ignores_large_force() {
        let mut interaction = NeedleInteraction::new(NeedleInteractionConfig::default()).unwrap();
        let mut n = needle(-0.05);
        n.body.force = Vector3::new(0.0, 0.0, 1e4);
        let report = step(&mut interaction, &mut n, &tissue(), &tip_contact());
        assert_eq!(report.state, CollisionState::Touching);
    }

    #[test]
    fn test_puncture_switches_to_embedding() {
        let mut interaction = NeedleInteraction::new(NeedleInteractionConfig::default()).unwrap();
        let mut n = needle(-0.05);
        let t = tissue();
        step(&mut interaction, &mut n, &t, &tip_contact());

        n.body.force = Vector3::new(0.0, 0.0, 20.0);
        let mut q = Queues::new();
        let report = interaction
            .step(&mut n, &t, &tip_contact(), &mut q.pbd, &mut q.rbd, DT)
            .unwrap();
        assert!(report.punctured());
        assert_eq!(report.faces_added, 1);
        assert_eq!(report.embedded_faces, 1);
        assert_eq!(q.pbd.count_of(ConstraintType::Embedding), 1);
        assert_eq!(q.pbd.count_of(ConstraintType::VertexTriangle), 0);
        assert_eq!(q.rbd.count_of(RbdConstraintKind::Contact), 0);
        assert!(n.is_inserted());
        assert!(interaction.rbd_handler().puncture(TISSUE).is_some());
    }

    #[test]
    fn test_withdrawal_unpunctures() {
        let mut interaction = NeedleInteraction::new(NeedleInteractionConfig::default()).unwrap();
        let mut n = needle(-0.05);
        let t = tissue();
        step(&mut interaction, &mut n, &t, &tip_contact());
        n.body.force = Vector3::new(0.0, 0.0, 20.0);
        step(&mut interaction, &mut n, &t, &tip_contact());
        assert_eq!(n.peek_state(TISSUE), CollisionState::Inserted);

        // Pulled out above the surface.
        n.body.force = Vector3::zeros();
        n.body.state.pose.position.z += 0.1;
        let report = step(&mut interaction, &mut n, &t, &CollisionData::new(TISSUE));
        assert!(report.unpunctured());
        assert_eq!(report.faces_removed, 1);
        assert_eq!(report.rbd_rows, 0);
        assert!(interaction.embedder(TISSUE).unwrap().is_empty());
        assert!(interaction.rbd_handler().puncture(TISSUE).is_none());
    }

    #[test]
    fn test_config_threshold_gates_puncture() {
        let config = NeedleInteractionConfig::default().with_force_threshold(1000.0);
        let mut interaction = NeedleInteraction::new(config).unwrap();
        let mut n = needle(-0.05);
        let t = tissue();
        step(&mut interaction, &mut n, &t, &tip_contact());

        n.body.force = Vector3::new(0.0, 0.0, 20.0);
        let report = step(&mut interaction, &mut n, &t, &tip_contact());
        assert_eq!(report.state, CollisionState::Touching);

        n.body.force = Vector3::new(0.0, 0.0, 1000.5);
        let report = step(&mut interaction, &mut n, &t, &tip_contact());
        assert!(report.punctured());
    }

    #[test]
    fn test_preset_thresholds_apply() {
        for (config, below, above) in [
            (NeedleInteractionConfig::rigid_only(), 200.0, 300.0),
            (NeedleInteractionConfig::axis_locked(), 40.0, 60.0),
        ] {
            let mut interaction = NeedleInteraction::new(config).unwrap();
            let mut n = needle(-0.05);
            let t = tissue();
            step(&mut interaction, &mut n, &t, &tip_contact());

            n.body.force = Vector3::new(0.0, 0.0, below);
            let report = step(&mut interaction, &mut n, &t, &tip_contact());
            assert_eq!(report.state, CollisionState::Touching);

            n.body.force = Vector3::new(0.0, 0.0, above);
            let report = step(&mut interaction, &mut n, &t, &tip_contact());
            assert_eq!(report.state, CollisionState::Inserted);
        }
    }

    #[test]
    fn test_rigid_only_exits_on_empty_detection() {
        let mut interaction = NeedleInteraction::new(NeedleInteractionConfig::rigid_only()).unwrap();
        let mut n = needle(-0.05);
        let t = tissue();
        step(&mut interaction, &mut n, &t, &tip_contact());
        n.body.force = Vector3::new(0.0, 0.0, 300.0);

        let report = step(&mut interaction, &mut n, &t, &tip_contact());
        assert_eq!(report.state, CollisionState::Inserted);
        assert_eq!(report.rbd_rows, 0);
        assert_eq!(report.pbd_constraints, 0);

        let report = step(&mut interaction, &mut n, &t, &tip_contact());
        assert_eq!(report.state, CollisionState::Inserted);

        let report = step(&mut interaction, &mut n, &t, &CollisionData::new(TISSUE));
        assert_eq!(report.state, CollisionState::Removed);
    }

    #[test]
    fn test_axis_lock_adds_lock_rows() {
        let config = NeedleInteractionConfig::axis_locked();
        let mut interaction = NeedleInteraction::new(config).unwrap();
        let mut n = needle(-0.05);
        let t = tissue();
        step(&mut interaction, &mut n, &t, &tip_contact());
        n.body.force = Vector3::new(0.0, 0.0, 60.0);

        let mut q = Queues::new();
        interaction
            .step(&mut n, &t, &tip_contact(), &mut q.pbd, &mut q.rbd, DT)
            .unwrap();
        assert_eq!(q.rbd.count_of(RbdConstraintKind::LineLock), 2);
        assert_eq!(q.rbd.count_of(RbdConstraintKind::AngularLock), 2);
    }
}
