//! Unilateral contact constraints between a rigid tool and tissue.
//!
//! The tool side is a fixed world-space point or edge (the rigid body does
//! not move during the position solve); the tissue side is a vertex, an
//! edge or a triangle addressed by index. The constraint keeps the tissue
//! point on the `+direction` side of the tool point:
//!
//! ```text
//! C = (x_tissue - x_tool) · d ≥ 0
//! ```
//!
//! and is only active while `C < 0`. Interpolation weights on the tissue
//! side are recomputed from the current positions at every evaluation.

use nalgebra::{Point3, Vector3};
use smallvec::{smallvec, SmallVec};

use crate::constraints::{ConstraintEval, ConstraintType, PbdConstraint, NORM_EPSILON};
use crate::geometry::{barycentric, closest_segment_param, interpolate, segment_segment_params};

/// Tissue-side element and tool-side geometry of a contact.
#[derive(Debug, Clone, PartialEq)]
pub enum ContactGeometry {
    /// Tool point against a tissue triangle.
    VertexTriangle {
        /// Tissue triangle vertices.
        triangle: [usize; 3],
        /// Tool point.
        point: Point3<f64>,
    },
    /// Tool edge against a tissue edge.
    EdgeEdge {
        /// Tissue edge vertices.
        edge: [usize; 2],
        /// Tool edge endpoints.
        tool_edge: [Point3<f64>; 2],
    },
    /// Tool point against a tissue edge.
    PointEdge {
        /// Tissue edge vertices.
        edge: [usize; 2],
        /// Tool point.
        point: Point3<f64>,
    },
    /// Tool point against a tissue vertex.
    PointPoint {
        /// Tissue vertex.
        vertex: usize,
        /// Tool point.
        point: Point3<f64>,
    },
}

impl ContactGeometry {
    /// Tissue point, interpolation weights, and the matching tool point.
    fn resolve(
        &self,
        positions: &[Point3<f64>],
    ) -> Option<(Point3<f64>, SmallVec<[f64; 4]>, Point3<f64>)> {
        match self {
            Self::VertexTriangle { triangle, point } => {
                let a = positions.get(triangle[0])?;
                let b = positions.get(triangle[1])?;
                let c = positions.get(triangle[2])?;
                let uvw = barycentric(point, a, b, c)?;
                Some((
                    interpolate(&uvw, a, b, c),
                    smallvec![uvw.x, uvw.y, uvw.z],
                    *point,
                ))
            }
            Self::EdgeEdge { edge, tool_edge } => {
                let a = positions.get(edge[0])?;
                let b = positions.get(edge[1])?;
                let (s, t) = segment_segment_params(a, b, &tool_edge[0], &tool_edge[1]);
                let tool = tool_edge[0] + (tool_edge[1] - tool_edge[0]) * t;
                Some((a + (b - a) * s, smallvec![1.0 - s, s], tool))
            }
            Self::PointEdge { edge, point } => {
                let a = positions.get(edge[0])?;
                let b = positions.get(edge[1])?;
                let s = closest_segment_param(point, a, b);
                Some((a + (b - a) * s, smallvec![1.0 - s, s], *point))
            }
            Self::PointPoint { vertex, point } => {
                Some((*positions.get(*vertex)?, smallvec![1.0], *point))
            }
        }
    }
}

/// A position based contact constraint against a rigid tool.
#[derive(Debug, Clone)]
pub struct PbdContactConstraint {
    /// Contact elements.
    pub geometry: ContactGeometry,
    /// Unit direction the tissue is pushed along.
    pub direction: Vector3<f64>,
    /// XPBD compliance.
    pub compliance: f64,
    lambda: f64,
}

impl PbdContactConstraint {
    /// Create a contact constraint; `None` if `direction` is degenerate.
    #[must_use]
    pub fn new(
        geometry: ContactGeometry,
        direction: Vector3<f64>,
        compliance: f64,
    ) -> Option<Self> {
        let direction = direction.try_normalize(NORM_EPSILON)?;
        Some(Self {
            geometry,
            direction,
            compliance,
            lambda: 0.0,
        })
    }

    /// Tool point against tissue triangle.
    #[must_use]
    pub fn vertex_triangle(
        triangle: [usize; 3],
        point: Point3<f64>,
        direction: Vector3<f64>,
        compliance: f64,
    ) -> Option<Self> {
        Self::new(
            ContactGeometry::VertexTriangle { triangle, point },
            direction,
            compliance,
        )
    }

    /// Tool edge against tissue edge.
    #[must_use]
    pub fn edge_edge(
        edge: [usize; 2],
        tool_edge: [Point3<f64>; 2],
        direction: Vector3<f64>,
        compliance: f64,
    ) -> Option<Self> {
        Self::new(ContactGeometry::EdgeEdge { edge, tool_edge }, direction, compliance)
    }

    /// Tool point against tissue edge.
    #[must_use]
    pub fn point_edge(
        edge: [usize; 2],
        point: Point3<f64>,
        direction: Vector3<f64>,
        compliance: f64,
    ) -> Option<Self> {
        Self::new(ContactGeometry::PointEdge { edge, point }, direction, compliance)
    }

    /// Tool point against tissue vertex.
    #[must_use]
    pub fn point_point(
        vertex: usize,
        point: Point3<f64>,
        direction: Vector3<f64>,
        compliance: f64,
    ) -> Option<Self> {
        Self::new(ContactGeometry::PointPoint { vertex, point }, direction, compliance)
    }
}

impl PbdConstraint for PbdContactConstraint {
    fn constraint_type(&self) -> ConstraintType {
        match self.geometry {
            ContactGeometry::VertexTriangle { .. } => ConstraintType::VertexTriangle,
            ContactGeometry::EdgeEdge { .. } => ConstraintType::EdgeEdge,
            ContactGeometry::PointEdge { .. } => ConstraintType::PointEdge,
            ContactGeometry::PointPoint { .. } => ConstraintType::PointPoint,
        }
    }

    fn vertices(&self) -> SmallVec<[usize; 4]> {
        match &self.geometry {
            ContactGeometry::VertexTriangle { triangle, .. } => SmallVec::from_slice(triangle),
            ContactGeometry::EdgeEdge { edge, .. } | ContactGeometry::PointEdge { edge, .. } => {
                SmallVec::from_slice(edge)
            }
            ContactGeometry::PointPoint { vertex, .. } => smallvec![*vertex],
        }
    }

    fn evaluate(&self, positions: &[Point3<f64>]) -> Option<ConstraintEval> {
        let (tissue, weights, tool) = self.geometry.resolve(positions)?;
        let value = (tissue - tool).dot(&self.direction);
        if value >= 0.0 {
            return None;
        }
        Some(ConstraintEval {
            value,
            gradients: weights.iter().map(|w| self.direction * *w).collect(),
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

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f64 = 0.01;

    fn floor() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_vertex_triangle_pushes_tissue_below_tool() {
        let mut positions = floor();
        // Tool point 0.1 below the surface, surface pushed down.
        let point = Point3::new(0.25, 0.25, -0.1);
        let mut c =
            PbdContactConstraint::vertex_triangle([0, 1, 2], point, -Vector3::z(), 0.0).unwrap();
        assert_eq!(c.constraint_type(), ConstraintType::VertexTriangle);

        let eval = c.evaluate(&positions).unwrap();
        assert_relative_eq!(eval.value, -0.1, epsilon = 1e-12);

        for _ in 0..5 {
            c.solve(&mut positions, &[1.0, 1.0, 1.0], DT);
        }
        let uvw = barycentric(&point, &positions[0], &positions[1], &positions[2]).unwrap();
        let surface = interpolate(&uvw, &positions[0], &positions[1], &positions[2]);
        assert!(surface.z <= point.z + 1e-9);
        assert!(c.evaluate(&positions).map_or(true, |e| e.value > -1e-9));
    }

    #[test]
    fn test_separated_contact_is_inactive() {
        let positions = floor();
        let c = PbdContactConstraint::vertex_triangle(
            [0, 1, 2],
            Point3::new(0.25, 0.25, 0.2),
            -Vector3::z(),
            0.0,
        )
        .unwrap();
        assert!(c.evaluate(&positions).is_none());
    }

    #[test]
    fn test_point_edge_weights() {
        let positions = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let c = PbdContactConstraint::point_edge(
            [0, 1],
            Point3::new(0.25, 0.05, 0.0),
            Vector3::y(),
            0.0,
        )
        .unwrap();
        let eval = c.evaluate(&positions).unwrap();
        assert_relative_eq!(eval.value, -0.05, epsilon = 1e-12);
        assert_relative_eq!(eval.gradients[0].y, 0.75, epsilon = 1e-12);
        assert_relative_eq!(eval.gradients[1].y, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_edge_edge_and_point_point() {
        let mut positions = vec![Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let mut ee = PbdContactConstraint::edge_edge(
            [0, 1],
            [Point3::new(0.0, -1.0, -0.1), Point3::new(0.0, 1.0, -0.1)],
            -Vector3::z(),
            0.0,
        )
        .unwrap();
        assert_eq!(ee.vertices().as_slice(), &[0, 1]);
        ee.solve(&mut positions, &[1.0, 1.0], DT);
        assert_relative_eq!(positions[0].z, -0.1, epsilon = 1e-12);

        let mut pp =
            PbdContactConstraint::point_point(1, Point3::new(1.0, 0.0, 0.0), Vector3::x(), 0.0)
                .unwrap();
        positions[1] = Point3::new(0.9, 0.0, 0.0);
        pp.solve(&mut positions, &[1.0, 1.0], DT);
        assert_relative_eq!(positions[1].x, 1.0, epsilon = 1e-12);
        assert_eq!(pp.constraint_type(), ConstraintType::PointPoint);
    }

    #[test]
    fn test_degenerate_direction_rejected() {
        assert!(
            PbdContactConstraint::point_point(0, Point3::origin(), Vector3::zeros(), 0.0).is_none()
        );
    }

    #[test]
    fn test_out_of_range_vertex_is_skipped() {
        let c = PbdContactConstraint::point_point(9, Point3::origin(), Vector3::x(), 0.0).unwrap();
        assert!(c.evaluate(&floor()).is_none());
    }
}
