//! Collision detector output for one needle / tissue pair.
//!
//! Elements arrive either already resolved (point, normal, depth) or as a
//! pair of cells, needle side first. [`CollisionData::resolve`] turns both
//! into contacts the handlers can emit.
//!
//! For cell pairs the detector reports overlap, so the vector from the
//! needle point to the tissue point is the direction the needle must move to
//! leave the tissue and its length is the depth.

use nalgebra::{Point3, Vector3};
use sim_deformable::geometry::{closest_point_on_segment, segment_segment_params};
use sim_deformable::{ContactGeometry, TetrahedralMesh};
use sim_types::BodyId;
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NeedleError, Result};
use crate::geometry::triangle_normal;
use crate::needle::{NeedleEnd, NeedleLine};

/// Norm below which a contact direction is degenerate.
const DIRECTION_EPSILON: f64 = 1e-10;

/// A cell of the needle's line mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeedleCell {
    /// Tip or tail.
    Vertex(NeedleEnd),
    /// Shaft segment. A straight needle has the single edge `0`.
    Edge(usize),
}

/// A cell of the tissue mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TissueCell {
    /// Mesh vertex.
    Vertex(usize),
    /// Mesh edge.
    Edge([usize; 2]),
    /// Surface triangle.
    Triangle([usize; 3]),
    /// Tetrahedron index.
    Tetrahedron(usize),
}

/// One collision element.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollisionElement {
    /// Pre-resolved contact on the needle.
    PointDirection {
        /// Contact point on the needle.
        point: Point3<f64>,
        /// Direction the needle must move to separate.
        normal: Vector3<f64>,
        /// Penetration depth.
        depth: f64,
    },
    /// Overlapping cells.
    CellPair {
        /// Needle cell.
        needle: NeedleCell,
        /// Tissue cell.
        tissue: TissueCell,
    },
}

/// A contact ready for constraint emission.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContact {
    /// Contact point on the needle.
    pub needle_point: Point3<f64>,
    /// Unit direction the needle must move to separate.
    pub normal: Vector3<f64>,
    /// Penetration depth.
    pub depth: f64,
    /// Tissue-side geometry, when the element names tissue cells.
    pub pbd: Option<ContactGeometry>,
}

/// All collision elements between a needle and one tissue for one step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionData {
    /// Tissue the elements refer to.
    pub tissue: BodyId,
    /// Elements in detector order.
    pub elements: Vec<CollisionElement>,
}

impl CollisionData {
    /// Empty data for `tissue`: the "no contact" signal.
    #[must_use]
    pub fn new(tissue: BodyId) -> Self {
        Self {
            tissue,
            elements: Vec::new(),
        }
    }

    /// Build tetrahedron / needle-edge pairs from the detector's two
    /// parallel index lists.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::MismatchedElementLists`] if the lists differ
    /// in length.
    pub fn from_index_lists(tissue: BodyId, tets: &[usize], edges: &[usize]) -> Result<Self> {
        if tets.len() != edges.len() {
            return Err(NeedleError::MismatchedElementLists {
                tissue: tets.len(),
                needle: edges.len(),
            });
        }
        let elements = tets
            .iter()
            .zip(edges)
            .map(|(&tet, &edge)| CollisionElement::CellPair {
                needle: NeedleCell::Edge(edge),
                tissue: TissueCell::Tetrahedron(tet),
            })
            .collect();
        Ok(Self { tissue, elements })
    }

    /// Append an element.
    pub fn push(&mut self, element: CollisionElement) {
        self.elements.push(element);
    }

    /// Builder form of [`push`](Self::push).
    #[must_use]
    pub fn with_element(mut self, element: CollisionElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the detector reported nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Resolve every element against the current needle and tissue.
    ///
    /// Tetrahedron pairs and degenerate elements resolve to nothing.
    /// Elements naming cells outside the mesh are logged and skipped.
    #[must_use]
    pub fn resolve(&self, line: &NeedleLine, mesh: &TetrahedralMesh) -> Vec<ResolvedContact> {
        self.elements
            .iter()
            .filter_map(|element| match *element {
                CollisionElement::PointDirection {
                    point,
                    normal,
                    depth,
                } => Some(ResolvedContact {
                    needle_point: point,
                    normal: normal.try_normalize(DIRECTION_EPSILON)?,
                    depth,
                    pbd: None,
                }),
                CollisionElement::CellPair { needle, tissue } => {
                    resolve_pair(needle, tissue, line, mesh, self.tissue)
                }
            })
            .collect()
    }
}

fn resolve_pair(
    needle: NeedleCell,
    tissue: TissueCell,
    line: &NeedleLine,
    mesh: &TetrahedralMesh,
    tissue_id: BodyId,
) -> Option<ResolvedContact> {
    if let NeedleCell::Edge(edge) = needle {
        if edge != 0 {
            warn!(edge, tissue = %tissue_id, "Collision element names a missing needle edge");
            return None;
        }
    }
    let vertex = |v: usize| {
        let p = mesh.positions.get(v).copied();
        if p.is_none() {
            warn!(vertex = v, tissue = %tissue_id, "Collision element names a missing tissue vertex");
        }
        p
    };

    let (needle_point, tissue_point, geometry) = match (needle, tissue) {
        (_, TissueCell::Tetrahedron(_)) => return None,
        (NeedleCell::Vertex(end), TissueCell::Triangle(tri)) => {
            let p = line.end(end);
            let (a, b, c) = (vertex(tri[0])?, vertex(tri[1])?, vertex(tri[2])?);
            let n = triangle_normal(&a, &b, &c)?;
            let projected = p - n * (p - a).dot(&n);
            (
                p,
                projected,
                ContactGeometry::VertexTriangle {
                    triangle: tri,
                    point: p,
                },
            )
        }
        (NeedleCell::Edge(_), TissueCell::Edge(edge)) => {
            let (a, b) = (vertex(edge[0])?, vertex(edge[1])?);
            let (s, t) = segment_segment_params(&line.tip, &line.tail, &a, &b);
            (
                line.point_at(s),
                a + (b - a) * t,
                ContactGeometry::EdgeEdge {
                    edge,
                    tool_edge: [line.tip, line.tail],
                },
            )
        }
        (NeedleCell::Edge(_), TissueCell::Vertex(v)) => {
            let x = vertex(v)?;
            let p = closest_point_on_segment(&x, &line.tip, &line.tail);
            (p, x, ContactGeometry::PointPoint { vertex: v, point: p })
        }
        (NeedleCell::Vertex(end), TissueCell::Edge(edge)) => {
            let p = line.end(end);
            let (a, b) = (vertex(edge[0])?, vertex(edge[1])?);
            (
                p,
                closest_point_on_segment(&p, &a, &b),
                ContactGeometry::PointEdge { edge, point: p },
            )
        }
        (NeedleCell::Vertex(end), TissueCell::Vertex(v)) => {
            let p = line.end(end);
            (p, vertex(v)?, ContactGeometry::PointPoint { vertex: v, point: p })
        }
        (NeedleCell::Edge(_), TissueCell::Triangle(_)) => {
            debug!(tissue = %tissue_id, "Skipping unsupported edge-triangle element");
            return None;
        }
    };

    let diff = tissue_point - needle_point;
    let depth = diff.norm();
    if depth < DIRECTION_EPSILON {
        return None;
    }
    Some(ResolvedContact {
        needle_point,
        normal: diff / depth,
        depth,
        pbd: Some(geometry),
    })
}
