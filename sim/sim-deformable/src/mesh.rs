//! Tetrahedral tissue meshes.
//!
//! A [`TetrahedralMesh`] owns the per-vertex buffers the position based
//! solver integrates: positions, velocities and inverse masses, plus the
//! tetrahedron index buffer. Collision handling only reads these buffers.

use nalgebra::{Point3, Vector3};
use sim_types::BodyId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constraints::EdgeLengthConstraint;
use crate::error::{DeformableError, Result};

/// Vertex triples of the four faces of a tetrahedron `[v0, v1, v2, v3]`,
/// as local indices.
pub const TET_FACES: [[usize; 3]; 4] = [[0, 1, 2], [1, 2, 3], [0, 2, 3], [0, 1, 3]];

/// A sphere enclosing a tetrahedron.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Centroid of the four vertices.
    pub center: Point3<f64>,
    /// Largest squared distance from the centroid to a vertex.
    pub radius_squared: f64,
}

impl BoundingSphere {
    /// Bounding sphere of four points, centred on their centroid.
    #[must_use]
    pub fn of_points(points: &[Point3<f64>; 4]) -> Self {
        let center = Point3::from(
            (points[0].coords + points[1].coords + points[2].coords + points[3].coords) / 4.0,
        );
        let radius_squared = points
            .iter()
            .map(|p| (p - center).norm_squared())
            .fold(0.0, f64::max);
        Self {
            center,
            radius_squared,
        }
    }
}

/// Volumetric tissue mesh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TetrahedralMesh {
    /// Vertex positions (world frame).
    pub positions: Vec<Point3<f64>>,
    /// Vertex velocities.
    pub velocities: Vec<Vector3<f64>>,
    /// Per-vertex inverse mass; 0 pins the vertex.
    pub inv_masses: Vec<f64>,
    /// Four vertex indices per tetrahedron.
    pub tetrahedra: Vec<[usize; 4]>,
}

impl TetrahedralMesh {
    /// Create a mesh with unit inverse masses and zero velocities.
    ///
    /// # Errors
    ///
    /// Returns an error if a tetrahedron references a missing vertex or
    /// repeats a vertex.
    pub fn new(positions: Vec<Point3<f64>>, tetrahedra: Vec<[usize; 4]>) -> Result<Self> {
        let n = positions.len();
        let mesh = Self {
            positions,
            velocities: vec![Vector3::zeros(); n],
            inv_masses: vec![1.0; n],
            tetrahedra,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Replace the inverse masses.
    ///
    /// # Errors
    ///
    /// Returns an error on a length mismatch or a negative/non-finite value.
    pub fn with_inverse_masses(mut self, inv_masses: Vec<f64>) -> Result<Self> {
        let count = self.positions.len();
        if inv_masses.len() != count {
            return Err(DeformableError::BufferLength {
                buffer: "inverse masses",
                len: inv_masses.len(),
                count,
            });
        }
        if let Some(vertex) = inv_masses.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(DeformableError::InvalidInverseMass { vertex });
        }
        self.inv_masses = inv_masses;
        Ok(self)
    }

    /// Check buffer lengths and tetrahedron indices.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        let count = self.positions.len();
        for (buffer, len) in [
            ("velocities", self.velocities.len()),
            ("inverse masses", self.inv_masses.len()),
        ] {
            if len != count {
                return Err(DeformableError::BufferLength { buffer, len, count });
            }
        }
        for (tet, vertices) in self.tetrahedra.iter().enumerate() {
            if let Some(&vertex) = vertices.iter().find(|&&v| v >= count) {
                return Err(DeformableError::MissingVertex { tet, vertex, count });
            }
            for a in 0..4 {
                if vertices[a + 1..].contains(&vertices[a]) {
                    return Err(DeformableError::RepeatedVertex {
                        tet,
                        vertex: vertices[a],
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of vertices.
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of tetrahedra.
    #[must_use]
    pub fn num_tetrahedra(&self) -> usize {
        self.tetrahedra.len()
    }

    /// Vertex indices of tetrahedron `index`.
    #[must_use]
    pub fn tetrahedron(&self, index: usize) -> Option<[usize; 4]> {
        self.tetrahedra.get(index).copied()
    }

    /// The four faces of tetrahedron `index` as global vertex triples.
    #[must_use]
    pub fn tet_faces(&self, index: usize) -> Option<[[usize; 3]; 4]> {
        let tet = self.tetrahedron(index)?;
        Some(TET_FACES.map(|f| [tet[f[0]], tet[f[1]], tet[f[2]]]))
    }

    /// Current vertex positions of tetrahedron `index`.
    #[must_use]
    pub fn tet_positions(&self, index: usize) -> Option<[Point3<f64>; 4]> {
        let tet = self.tetrahedron(index)?;
        Some([
            *self.positions.get(tet[0])?,
            *self.positions.get(tet[1])?,
            *self.positions.get(tet[2])?,
            *self.positions.get(tet[3])?,
        ])
    }

    /// Bounding sphere of tetrahedron `index`.
    #[must_use]
    pub fn tet_bounding_sphere(&self, index: usize) -> Option<BoundingSphere> {
        self.tet_positions(index).map(|p| BoundingSphere::of_points(&p))
    }

    /// Positions of three vertices, or `None` if any is out of range.
    #[must_use]
    pub fn triangle_positions(&self, vertices: &[usize; 3]) -> Option<[Point3<f64>; 3]> {
        Some([
            *self.positions.get(vertices[0])?,
            *self.positions.get(vertices[1])?,
            *self.positions.get(vertices[2])?,
        ])
    }

    /// Whether every index is a valid vertex.
    #[must_use]
    pub fn contains_vertices(&self, vertices: &[usize]) -> bool {
        vertices.iter().all(|&v| v < self.positions.len())
    }

    /// Unique undirected edges of all tetrahedra, sorted.
    #[must_use]
    pub fn edges(&self) -> Vec<[usize; 2]> {
        let mut edges: Vec<[usize; 2]> = self
            .tetrahedra
            .iter()
            .flat_map(|t| {
                [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]
                    .map(|(a, b)| [t[a].min(t[b]), t[a].max(t[b])])
            })
            .collect();
        edges.sort_unstable();
        edges.dedup();
        edges
    }

    /// Pin a vertex (zero inverse mass).
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex does not exist.
    pub fn pin_vertex(&mut self, index: usize) -> Result<()> {
        let count = self.positions.len();
        let w = self
            .inv_masses
            .get_mut(index)
            .ok_or(DeformableError::VertexOutOfRange {
                vertex: index,
                count,
            })?;
        *w = 0.0;
        Ok(())
    }

    /// Rigidly translate every vertex.
    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for p in &mut self.positions {
            *p += offset;
        }
    }
}

/// A deformable tissue body: a mesh plus its identity in the scene.
#[derive(Debug, Clone)]
pub struct TissueObject {
    /// Scene identifier; used as the key of the needle's state map.
    pub id: BodyId,
    /// Name for diagnostics.
    pub name: String,
    /// Simulated mesh.
    pub mesh: TetrahedralMesh,
}

impl TissueObject {
    /// Wrap a mesh.
    #[must_use]
    pub fn new(id: BodyId, name: impl Into<String>, mesh: TetrahedralMesh) -> Self {
        Self {
            id,
            name: name.into(),
            mesh,
        }
    }

    /// One edge-length constraint per mesh edge at its current length.
    #[must_use]
    pub fn edge_constraints(&self, compliance: f64) -> Vec<EdgeLengthConstraint> {
        self.mesh
            .edges()
            .into_iter()
            .filter_map(|edge| EdgeLengthConstraint::at_rest(edge, &self.mesh.positions, compliance))
            .collect()
    }
}
