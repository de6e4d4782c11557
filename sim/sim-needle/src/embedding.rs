//! Embedding constraint: ties a material point on the needle shaft to a
//! material point on a pierced tissue face.
//!
//! At creation the segment/triangle intersection is stored twice, as fixed
//! barycentric weights `(u, v, w)` on the triangle and as a fixed line
//! parameter `t` on the needle. Each step both material points are
//! re-evaluated from current positions:
//!
//! ```text
//! x_tri  = u a + v b + w c
//! x_line = tip + t (tail - tip)
//! d      = x_tri - x_line
//! d'     = d - f (d · axis) axis
//! ```
//!
//! Where `f` is the normal friction fraction. The constraint drives `|d'|`
//! to zero; `compliance` is the share of the correction taken by the tissue,
//! the needle takes `1 - compliance`.
//!
//! One [`EmbeddingConstraint`] is shared by two solver views:
//! [`EmbeddingPbdConstraint`] for the tissue vertices and
//! [`EmbeddingRbdConstraint`] for the needle body.

use std::sync::Arc;

use nalgebra::{Matrix3x4, Point3, Vector3};
use sim_contact::{
    baumgarte_rate, single_body_jacobian, ImpulseRange, RbdConstraint, RbdConstraintKind,
};
use sim_deformable::geometry::interpolate;
use sim_deformable::{ConstraintEval, ConstraintType, PbdConstraint};
use sim_types::{BodyId, RigidBody};
use smallvec::SmallVec;

use crate::geometry::intersect_segment_triangle;
use crate::needle::NeedleLine;
use crate::tri_cell::TriCell;

/// Difference norm below which the two material points coincide.
pub const COINCIDENCE_EPSILON: f64 = 1e-10;

/// Shared data of one embedding constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConstraint {
    id: u64,
    tissue: BodyId,
    needle: BodyId,
    vertices: [usize; 3],
    uvw: Vector3<f64>,
    t: f64,
    intersection: Point3<f64>,
    /// Tissue share of the correction, in (0, 1].
    pub compliance: f64,
    /// Fraction of the axial component removed from the difference.
    pub normal_friction: f64,
}

impl EmbeddingConstraint {
    /// Anchor a new constraint at the intersection of `line` with the
    /// triangle `vertices` at `triangle` positions.
    ///
    /// Returns `None` if the line is parallel to the face or the face is
    /// degenerate.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn init(
        id: u64,
        tissue: BodyId,
        needle: BodyId,
        vertices: [usize; 3],
        triangle: &[Point3<f64>; 3],
        line: &NeedleLine,
        compliance: f64,
        normal_friction: f64,
    ) -> Option<Self> {
        let hit = intersect_segment_triangle(
            &line.tip,
            &line.tail,
            &triangle[0],
            &triangle[1],
            &triangle[2],
        )?;
        Some(Self {
            id,
            tissue,
            needle,
            vertices,
            uvw: hit.uvw,
            t: hit.t,
            intersection: hit.point,
            compliance,
            normal_friction,
        })
    }

    /// Creation serial, unique per embedder.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Tissue body.
    #[must_use]
    pub fn tissue(&self) -> BodyId {
        self.tissue
    }

    /// Needle body.
    #[must_use]
    pub fn needle(&self) -> BodyId {
        self.needle
    }

    /// Tracked face vertices, in creation order.
    #[must_use]
    pub fn vertices(&self) -> [usize; 3] {
        self.vertices
    }

    /// Order-independent face key.
    #[must_use]
    pub fn cell(&self) -> TriCell {
        TriCell::from(self.vertices)
    }

    /// Fixed barycentric weights on the face.
    #[must_use]
    pub fn uvw(&self) -> Vector3<f64> {
        self.uvw
    }

    /// Fixed tip-to-tail line parameter.
    #[must_use]
    pub fn line_parameter(&self) -> f64 {
        self.t
    }

    /// World intersection point at creation.
    #[must_use]
    pub fn intersection(&self) -> Point3<f64> {
        self.intersection
    }

    /// Current tissue material point.
    #[must_use]
    pub fn triangle_point(&self, positions: &[Point3<f64>]) -> Option<Point3<f64>> {
        let a = positions.get(self.vertices[0])?;
        let b = positions.get(self.vertices[1])?;
        let c = positions.get(self.vertices[2])?;
        Some(interpolate(&self.uvw, a, b, c))
    }

    /// Current needle material point.
    #[must_use]
    pub fn line_point(&self, line: &NeedleLine) -> Point3<f64> {
        line.point_at(self.t)
    }

    /// Tissue point minus needle point, with `normal_friction` of the
    /// needle-axial component removed.
    #[must_use]
    pub fn interpolant_difference(
        &self,
        positions: &[Point3<f64>],
        line: &NeedleLine,
    ) -> Option<Vector3<f64>> {
        let diff = self.triangle_point(positions)? - self.line_point(line);
        match line.axis() {
            Some(axis) if self.normal_friction > 0.0 => {
                Some(diff - axis * (self.normal_friction * diff.dot(&axis)))
            }
            _ => Some(diff),
        }
    }

    /// Distance and unit direction (needle point towards tissue point), or
    /// `None` when the points coincide.
    #[must_use]
    pub fn evaluate(
        &self,
        positions: &[Point3<f64>],
        line: &NeedleLine,
    ) -> Option<(f64, Vector3<f64>)> {
        let diff = self.interpolant_difference(positions, line)?;
        let len = diff.norm();
        if len < COINCIDENCE_EPSILON {
            return None;
        }
        Some((len, diff / len))
    }
}

/// Tissue-side view of an [`EmbeddingConstraint`].
///
/// The needle line is frozen at emission: the rigid body does not move
/// during the position solve. Over a whole projection the face closes
/// `compliance` of the error measured at emission, however many sweeps run;
/// the needle's row covers the rest.
#[derive(Debug, Clone)]
pub struct EmbeddingPbdConstraint {
    core: Arc<EmbeddingConstraint>,
    line: NeedleLine,
    residual: f64,
    lambda: f64,
}

impl EmbeddingPbdConstraint {
    /// View `core` against the needle at `line`, with tissue `positions`
    /// at emission.
    #[must_use]
    pub fn new(core: Arc<EmbeddingConstraint>, line: NeedleLine, positions: &[Point3<f64>]) -> Self {
        let error = core.evaluate(positions, &line).map_or(0.0, |(e, _)| e);
        let residual = (1.0 - core.compliance) * error;
        Self {
            core,
            line,
            residual,
            lambda: 0.0,
        }
    }

    /// Shared constraint data.
    #[must_use]
    pub fn core(&self) -> &EmbeddingConstraint {
        &self.core
    }

    /// Error the projection leaves for the needle to close.
    #[must_use]
    pub fn residual(&self) -> f64 {
        self.residual
    }
}

impl PbdConstraint for EmbeddingPbdConstraint {
    fn constraint_type(&self) -> ConstraintType {
        ConstraintType::Embedding
    }

    fn vertices(&self) -> SmallVec<[usize; 4]> {
        SmallVec::from_slice(&self.core.vertices)
    }

    fn evaluate(&self, positions: &[Point3<f64>]) -> Option<ConstraintEval> {
        let (value, n) = self.core.evaluate(positions, &self.line)?;
        let uvw = self.core.uvw;
        Some(ConstraintEval {
            value,
            gradients: SmallVec::from_slice(&[n * uvw.x, n * uvw.y, n * uvw.z]),
        })
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }

    fn set_lambda(&mut self, lambda: f64) {
        self.lambda = lambda;
    }

    /// Move the face towards the needle until only the needle's share of
    /// the emission error remains. Returns the excess over that share.
    fn solve(&mut self, positions: &mut [Point3<f64>], inv_masses: &[f64], _dt: f64) -> f64 {
        let Some((value, n)) = self.core.evaluate(positions, &self.line) else {
            return 0.0;
        };
        let excess = value - self.residual;
        if excess <= 0.0 {
            return 0.0;
        }
        let uvw = [self.core.uvw.x, self.core.uvw.y, self.core.uvw.z];
        let w_sum: f64 = self
            .core
            .vertices
            .iter()
            .zip(&uvw)
            .map(|(&v, b)| inv_masses.get(v).copied().unwrap_or(0.0) * b * b)
            .sum();
        if w_sum < COINCIDENCE_EPSILON {
            return 0.0;
        }

        let delta_lambda = -excess / w_sum;
        for (&v, b) in self.core.vertices.iter().zip(&uvw) {
            let w = inv_masses.get(v).copied().unwrap_or(0.0);
            if let Some(p) = positions.get_mut(v) {
                *p += n * (w * b * delta_lambda);
            }
        }
        self.lambda += delta_lambda;
        excess
    }
}

/// Needle-side view of an [`EmbeddingConstraint`].
///
/// Built once per step from the needle pose and tissue positions at
/// emission. The row drives the needle material point towards the tissue
/// material point with bias `(1 - compliance) |d'| β / dt`.
#[derive(Debug, Clone)]
pub struct EmbeddingRbdConstraint {
    core: Arc<EmbeddingConstraint>,
    body: BodyId,
    center: Point3<f64>,
    line_point: Point3<f64>,
    direction: Vector3<f64>,
    error: f64,
    /// Baumgarte factor.
    pub beta: f64,
    jacobian: Matrix3x4<f64>,
    bias: f64,
}

impl EmbeddingRbdConstraint {
    /// Build the row for `needle`; `None` when the points coincide.
    #[must_use]
    pub fn new(
        core: Arc<EmbeddingConstraint>,
        needle: &RigidBody,
        line: &NeedleLine,
        positions: &[Point3<f64>],
        beta: f64,
    ) -> Option<Self> {
        let (error, direction) = core.evaluate(positions, line)?;
        let line_point = core.line_point(line);
        Some(Self {
            core,
            body: needle.id,
            center: needle.position(),
            line_point,
            direction,
            error,
            beta,
            jacobian: Matrix3x4::zeros(),
            bias: 0.0,
        })
    }

    /// Shared constraint data.
    #[must_use]
    pub fn core(&self) -> &EmbeddingConstraint {
        &self.core
    }

    /// Unit direction from the needle point to the tissue point.
    #[must_use]
    pub fn direction(&self) -> Vector3<f64> {
        self.direction
    }

    /// Constraint error at emission.
    #[must_use]
    pub fn error(&self) -> f64 {
        self.error
    }
}

impl RbdConstraint for EmbeddingRbdConstraint {
    fn kind(&self) -> RbdConstraintKind {
        RbdConstraintKind::Embedding
    }

    fn body(&self) -> BodyId {
        self.body
    }

    fn compute(&mut self, dt: f64) {
        let n = self.direction;
        let r = self.line_point - self.center;
        self.jacobian = single_body_jacobian(n, r.cross(&n));
        self.bias = (1.0 - self.core.compliance) * self.error * baumgarte_rate(self.beta, dt);
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

    const DT: f64 = 0.01;

    fn face() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    fn vertical_line(x: f64, y: f64) -> NeedleLine {
        NeedleLine::new(Point3::new(x, y, -0.5), Point3::new(x, y, 0.5))
    }

    fn constraint(normal_friction: f64) -> EmbeddingConstraint {
        let p = face();
        EmbeddingConstraint::init(
            7,
            BodyId::new(1),
            BodyId::new(2),
            [0, 1, 2],
            &[p[0], p[1], p[2]],
            &vertical_line(0.2, 0.3),
            0.5,
            normal_friction,
        )
        .unwrap()
    }

    #[test]
    fn test_init_anchors_material_points() {
        let c = constraint(0.0);
        assert_relative_eq!(c.uvw(), Vector3::new(0.5, 0.2, 0.3), epsilon = 1e-12);
        assert_relative_eq!(c.line_parameter(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(c.intersection(), Point3::new(0.2, 0.3, 0.0), epsilon = 1e-12);
        assert_eq!(c.cell(), TriCell::new(2, 0, 1));
        assert!(c.evaluate(&face(), &vertical_line(0.2, 0.3)).is_none());
    }

    #[test]
    fn test_parallel_line_rejected() {
        let p = face();
        let line = NeedleLine::new(Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0));
        assert!(EmbeddingConstraint::init(
            0,
            BodyId::new(1),
            BodyId::new(2),
            [0, 1, 2],
            &[p[0], p[1], p[2]],
            &line,
            0.5,
            0.0
        )
        .is_none());
    }

    #[test]
    fn test_rigid_co_motion_keeps_difference_zero() {
        let c = constraint(0.0);
        let offset = Vector3::new(0.3, -1.2, 4.0);
        let moved: Vec<_> = face().iter().map(|p| p + offset).collect();
        let line = vertical_line(0.2, 0.3).translated(&offset);
        assert_relative_eq!(
            c.interpolant_difference(&moved, &line).unwrap(),
            Vector3::zeros(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_normal_friction_projection() {
        // Needle slid along its axis and sideways.
        let line = vertical_line(0.2, 0.3).translated(&Vector3::new(0.1, 0.0, 0.2));

        let full = constraint(0.0).interpolant_difference(&face(), &line).unwrap();
        assert_relative_eq!(full, Vector3::new(-0.1, 0.0, -0.2), epsilon = 1e-12);

        let locked = constraint(1.0).interpolant_difference(&face(), &line).unwrap();
        assert_relative_eq!(locked.dot(&Vector3::z()), 0.0, epsilon = 1e-12);
        assert_relative_eq!(locked.x, -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_pbd_view_moves_face_by_compliance_share() {
        let core = Arc::new(constraint(0.0));
        let line = vertical_line(0.3, 0.3);
        let mut positions = face();
        let mut view = EmbeddingPbdConstraint::new(core, line, &positions);
        assert_eq!(view.constraint_type(), ConstraintType::Embedding);
        assert_relative_eq!(view.residual(), 0.05, epsilon = 1e-12);

        let before = view.core().triangle_point(&positions).unwrap();
        let err = view.solve(&mut positions, &[1.0, 1.0, 1.0], DT);
        assert_relative_eq!(err, 0.05, epsilon = 1e-12);

        let after = view.core().triangle_point(&positions).unwrap();
        assert_relative_eq!(after.x - before.x, 0.05, epsilon = 1e-12);
        assert!(view.lambda() < 0.0);
    }

    #[test]
    fn test_pbd_view_share_holds_over_iterations() {
        let core = Arc::new(constraint(0.0));
        let line = vertical_line(0.3, 0.3);
        let mut positions = face();
        let mut view = EmbeddingPbdConstraint::new(core, line, &positions);
        for _ in 0..20 {
            view.solve(&mut positions, &[1.0, 1.0, 1.0], DT);
        }
        let (remaining, _) = view.core().evaluate(&positions, &line).unwrap();
        assert_relative_eq!(remaining, 0.05, epsilon = 1e-12);
        assert_eq!(view.solve(&mut positions, &[1.0, 1.0, 1.0], DT), 0.0);
    }

    #[test]
    fn test_pbd_view_gradient_weights() {
        let core = Arc::new(constraint(0.0));
        let view = EmbeddingPbdConstraint::new(core, vertical_line(0.3, 0.3), &face());
        let eval = view.evaluate(&face()).unwrap();
        assert_eq!(eval.gradients.len(), 3);
        assert_relative_eq!(eval.gradients[0], Vector3::new(-0.5, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(eval.gradients[1], Vector3::new(-0.2, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rbd_view_row() {
        let core = Arc::new(constraint(0.0));
        let body = RigidBody::new(
            BodyId::new(2),
            RigidBodyState::at_rest(Pose::from_position(Point3::new(0.3, 0.3, 0.0))),
            MassProperties::isotropic(0.01, 1e-5),
        );
        let line = vertical_line(0.3, 0.3);
        let mut row = EmbeddingRbdConstraint::new(core, &body, &line, &face(), 0.05).unwrap();
        row.compute(DT);

        assert_eq!(row.kind(), RbdConstraintKind::Embedding);
        assert_eq!(row.body(), BodyId::new(2));
        assert_relative_eq!(row.direction(), -Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(row.bias(), 0.5 * 0.1 * 0.05 / DT, epsilon = 1e-12);
        assert_relative_eq!(
            row.jacobian().column(0).into_owned(),
            -Vector3::x(),
            epsilon = 1e-12
        );
        assert_eq!(row.impulse_range(0.0), ImpulseRange::BILATERAL);
    }

    #[test]
    fn test_rbd_view_skipped_when_satisfied() {
        let core = Arc::new(constraint(0.0));
        let body = RigidBody::new(
            BodyId::new(2),
            RigidBodyState::at_rest(Pose::identity()),
            MassProperties::isotropic(0.01, 1e-5),
        );
        assert!(
            EmbeddingRbdConstraint::new(core, &body, &vertical_line(0.2, 0.3), &face(), 0.05)
                .is_none()
        );
    }
}
