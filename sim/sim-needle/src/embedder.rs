//! Per-tissue embedding manager.
//!
//! Tracks which tetrahedron faces the needle shaft currently pierces, one
//! [`EmbeddingConstraint`] per face keyed by [`TriCell`].
//!
//! Each inserted step runs two passes over the same face map and applies
//! their results afterwards:
//!
//! 1. **Entry**: a face not yet tracked is added when the current segment
//!    crosses its plane inside the triangle, and the previous frame's line
//!    also met the plane inside the triangle.
//! 2. **Exit**: a tracked face is dropped once the current segment no longer
//!    straddles its plane.
//!
//! [`NeedleEmbedder::snapshot`] must be the last call of the step: the next
//! entry pass reads the positions it stores.

use std::sync::Arc;

use hashbrown::HashMap;
use nalgebra::Point3;
use sim_contact::RbdConstraintQueue;
use sim_deformable::{PbdConstraintQueue, TetrahedralMesh};
use sim_types::{BodyId, RigidBody};
use tracing::debug;

use crate::config::NeedleInteractionConfig;
use crate::embedding::{EmbeddingConstraint, EmbeddingPbdConstraint, EmbeddingRbdConstraint};
use crate::geometry::{intersect_segment_triangle, segment_near_sphere};
use crate::needle::NeedleLine;
use crate::tri_cell::TriCell;

/// Distance under which two entry points are the same crossing.
///
/// A shaft passing exactly through a shared edge or vertex hits every face
/// around it at one point; only the first face found is embedded.
pub const COINCIDENT_ENTRY_DISTANCE: f64 = 1e-9;

/// Face map changes from one [`NeedleEmbedder::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmbedderUpdate {
    /// Faces entered this step.
    pub added: usize,
    /// Faces exited this step.
    pub removed: usize,
    /// Faces tracked after the update.
    pub active: usize,
}

/// Embedding manager for one needle against one tissue.
#[derive(Debug, Clone)]
pub struct NeedleEmbedder {
    tissue: BodyId,
    needle: BodyId,
    faces: HashMap<TriCell, Arc<EmbeddingConstraint>>,
    prev_positions: Vec<Point3<f64>>,
    prev_line: Option<NeedleLine>,
    debug_points: Vec<Point3<f64>>,
    debug_triangles: Vec<[usize; 3]>,
    next_id: u64,
    /// Tissue share of embedding corrections.
    pub compliance: f64,
    /// Axial friction fraction of new constraints.
    pub normal_friction: f64,
    /// Multiplier on the squared tet bounding radius when culling.
    pub sphere_safety_factor: f64,
}

impl NeedleEmbedder {
    /// Create an empty embedder for the `needle` / `tissue` pair.
    #[must_use]
    pub fn new(tissue: BodyId, needle: BodyId, config: &NeedleInteractionConfig) -> Self {
        Self {
            tissue,
            needle,
            faces: HashMap::new(),
            prev_positions: Vec::new(),
            prev_line: None,
            debug_points: Vec::new(),
            debug_triangles: Vec::new(),
            next_id: 0,
            compliance: config.compliance,
            normal_friction: config.normal_friction,
            sphere_safety_factor: config.sphere_safety_factor,
        }
    }

    /// Tissue body.
    #[must_use]
    pub fn tissue(&self) -> BodyId {
        self.tissue
    }

    /// Number of tracked faces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Whether no face is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Whether `cell` is tracked.
    #[must_use]
    pub fn contains(&self, cell: &TriCell) -> bool {
        self.faces.contains_key(cell)
    }

    /// Constraint tracked for `cell`.
    #[must_use]
    pub fn constraint(&self, cell: &TriCell) -> Option<&EmbeddingConstraint> {
        self.faces.get(cell).map(Arc::as_ref)
    }

    /// Tracked constraints in creation order.
    #[must_use]
    pub fn constraints(&self) -> Vec<&EmbeddingConstraint> {
        let mut all: Vec<&EmbeddingConstraint> = self.faces.values().map(Arc::as_ref).collect();
        all.sort_by_key(|c| c.id());
        all
    }

    /// Constraints created over the embedder's lifetime.
    #[must_use]
    pub fn created_total(&self) -> u64 {
        self.next_id
    }

    /// Current tissue material point of every tracked face.
    #[must_use]
    pub fn debug_points(&self) -> &[Point3<f64>] {
        &self.debug_points
    }

    /// Vertex triples of every tracked face.
    #[must_use]
    pub fn debug_triangles(&self) -> &[[usize; 3]] {
        &self.debug_triangles
    }

    /// Drop every tracked face.
    pub fn clear(&mut self) {
        self.faces.clear();
        self.debug_points.clear();
        self.debug_triangles.clear();
    }

    /// Run the entry and exit passes against the current tissue and needle.
    pub fn update(&mut self, mesh: &TetrahedralMesh, line: &NeedleLine) -> EmbedderUpdate {
        let staged = self.entry_pass(mesh, line);
        let removals = self.exit_pass(mesh, line);

        for cell in &removals {
            if let Some(c) = self.faces.remove(cell) {
                debug!(face = %cell, id = c.id(), tissue = %self.tissue, "Needle exited face");
            }
        }
        let added = staged.len();
        for c in staged {
            debug!(face = %c.cell(), id = c.id(), tissue = %self.tissue, "Needle entered face");
            self.faces.insert(c.cell(), Arc::new(c));
        }

        self.refresh_debug(mesh);
        EmbedderUpdate {
            added,
            removed: removals.len(),
            active: self.faces.len(),
        }
    }

    fn entry_pass(
        &mut self,
        mesh: &TetrahedralMesh,
        line: &NeedleLine,
    ) -> Vec<EmbeddingConstraint> {
        let prev_positions: &[Point3<f64>] =
            if self.prev_positions.len() == mesh.num_vertices() {
                &self.prev_positions
            } else {
                &mesh.positions
            };
        let prev_line = self.prev_line.unwrap_or(*line);
        let mut next_id = self.next_id;
        let mut staged: Vec<EmbeddingConstraint> = Vec::new();

        for tet in 0..mesh.num_tetrahedra() {
            let Some(sphere) = mesh.tet_bounding_sphere(tet) else {
                continue;
            };
            if !segment_near_sphere(&line.tip, &line.tail, &sphere, self.sphere_safety_factor) {
                continue;
            }
            let Some(faces) = mesh.tet_faces(tet) else {
                continue;
            };

            for face in faces {
                let cell = TriCell::from(face);
                if self.faces.contains_key(&cell) || staged.iter().any(|c| c.cell() == cell) {
                    continue;
                }
                let Some(tri) = mesh.triangle_positions(&face) else {
                    continue;
                };
                let Some(hit) =
                    intersect_segment_triangle(&line.tip, &line.tail, &tri[0], &tri[1], &tri[2])
                else {
                    continue;
                };
                if !hit.is_hit() || !previous_inside(prev_positions, &prev_line, &face) {
                    continue;
                }

                let coincident = staged
                    .iter()
                    .map(EmbeddingConstraint::intersection)
                    .chain(
                        self.faces
                            .values()
                            .filter_map(|c| c.triangle_point(&mesh.positions)),
                    )
                    .any(|p| (p - hit.point).norm() < COINCIDENT_ENTRY_DISTANCE);
                if coincident {
                    continue;
                }

                if let Some(c) = EmbeddingConstraint::init(
                    next_id,
                    self.tissue,
                    self.needle,
                    face,
                    &tri,
                    line,
                    self.compliance,
                    self.normal_friction,
                ) {
                    next_id += 1;
                    staged.push(c);
                }
            }
        }

        self.next_id = next_id;
        staged
    }

    fn exit_pass(&self, mesh: &TetrahedralMesh, line: &NeedleLine) -> Vec<TriCell> {
        self.faces
            .iter()
            .filter(|(_, c)| {
                !mesh
                    .triangle_positions(&c.vertices())
                    .and_then(|t| {
                        intersect_segment_triangle(&line.tip, &line.tail, &t[0], &t[1], &t[2])
                    })
                    .is_some_and(|hit| hit.crosses_plane())
            })
            .map(|(cell, _)| *cell)
            .collect()
    }

    fn refresh_debug(&mut self, mesh: &TetrahedralMesh) {
        let mut tracked: Vec<_> = self.faces.values().collect();
        tracked.sort_by_key(|c| c.id());
        self.debug_points = tracked
            .iter()
            .filter_map(|c| c.triangle_point(&mesh.positions))
            .collect();
        self.debug_triangles = tracked.iter().map(|c| c.vertices()).collect();
    }

    /// Push both solver views of every tracked face.
    ///
    /// Returns the number of PBD constraints pushed. RBD rows whose material
    /// points already coincide are skipped.
    pub fn emit(
        &self,
        needle: &RigidBody,
        line: &NeedleLine,
        mesh: &TetrahedralMesh,
        pbd: &mut PbdConstraintQueue,
        rbd: &mut RbdConstraintQueue,
        beta: f64,
    ) -> usize {
        let mut tracked: Vec<_> = self.faces.values().collect();
        tracked.sort_by_key(|c| c.id());
        for core in &tracked {
            pbd.push(Box::new(EmbeddingPbdConstraint::new(
                Arc::clone(core),
                *line,
                &mesh.positions,
            )));
            if let Some(row) =
                EmbeddingRbdConstraint::new(Arc::clone(core), needle, line, &mesh.positions, beta)
            {
                rbd.push(Box::new(row));
            }
        }
        tracked.len()
    }

    /// Store current tissue and needle positions for the next entry pass.
    pub fn snapshot(&mut self, mesh: &TetrahedralMesh, line: &NeedleLine) {
        self.prev_positions.clear();
        self.prev_positions.extend_from_slice(&mesh.positions);
        self.prev_line = Some(*line);
    }
}

/// Whether the previous line met the plane of `face` inside the triangle.
fn previous_inside(positions: &[Point3<f64>], line: &NeedleLine, face: &[usize; 3]) -> bool {
    let (Some(a), Some(b), Some(c)) = (
        positions.get(face[0]),
        positions.get(face[1]),
        positions.get(face[2]),
    ) else {
        return false;
    };
    intersect_segment_triangle(&line.tip, &line.tail, a, b, c).is_some_and(|h| h.inside_triangle())
}
