//! Segment-versus-face tests used by the embedding manager.
//!
//! Unlike a plain segment/triangle test, [`intersect_segment_triangle`]
//! reports the barycentric coordinates of the line/plane intersection even
//! when it falls outside the triangle or beyond the segment's ends. Entry
//! and exit detection need both facts separately.

use nalgebra::{Point3, Vector3};
use sim_deformable::geometry::{barycentric, closest_point_on_segment, DENOM_EPSILON};
use sim_deformable::BoundingSphere;

/// Intersection of a segment's supporting line with a triangle's plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentTriangleHit {
    /// Barycentric coordinates of `point` on the triangle plane.
    pub uvw: Vector3<f64>,
    /// Line parameter of `point`: 0 at `p`, 1 at `q`.
    pub t: f64,
    /// Intersection point.
    pub point: Point3<f64>,
}

impl SegmentTriangleHit {
    /// Whether the segment straddles the plane (`0 < t < 1`).
    #[must_use]
    pub fn crosses_plane(&self) -> bool {
        self.t > 0.0 && self.t < 1.0
    }

    /// Whether the plane point lies within the triangle (all weights ≥ 0).
    #[must_use]
    pub fn inside_triangle(&self) -> bool {
        self.uvw.x >= 0.0 && self.uvw.y >= 0.0 && self.uvw.z >= 0.0
    }

    /// Both of the above.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.crosses_plane() && self.inside_triangle()
    }
}

/// Unit normal of triangle `abc`, `None` if it has no area.
#[must_use]
pub fn triangle_normal(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<Vector3<f64>> {
    let (e1, e2) = (b - a, c - a);
    let cross = e1.cross(&e2);
    let area = cross.norm();
    if area <= DENOM_EPSILON * e1.norm() * e2.norm() {
        return None;
    }
    Some(cross / area)
}

/// Intersect the line through `p`, `q` with the plane of triangle `abc`.
///
/// Returns `None` when the line is parallel to the plane or the triangle
/// is degenerate.
#[must_use]
pub fn intersect_segment_triangle(
    p: &Point3<f64>,
    q: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Option<SegmentTriangleHit> {
    let n = triangle_normal(a, b, c)?;
    let dir = q - p;
    let denom = dir.dot(&n);
    if denom.abs() <= DENOM_EPSILON * dir.norm() {
        return None;
    }
    let t = (a - p).dot(&n) / denom;
    let point = p + dir * t;
    let uvw = barycentric(&point, a, b, c)?;
    Some(SegmentTriangleHit { uvw, t, point })
}

/// Whether segment `pq` passes within the bounding sphere, with the squared
/// radius scaled by `safety_factor`.
#[must_use]
pub fn segment_near_sphere(
    p: &Point3<f64>,
    q: &Point3<f64>,
    sphere: &BoundingSphere,
    safety_factor: f64,
) -> bool {
    let closest = closest_point_on_segment(&sphere.center, p, q);
    (closest - sphere.center).norm_squared() <= sphere.radius_squared * safety_factor
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tri() -> [Point3<f64>; 3] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_crossing_hit() {
        let [a, b, c] = tri();
        let hit = intersect_segment_triangle(
            &Point3::new(0.25, 0.25, 1.0),
            &Point3::new(0.25, 0.25, -1.0),
            &a,
            &b,
            &c,
        )
        .unwrap();
        assert_relative_eq!(hit.t, 0.5, epsilon = 1e-12);
        assert_relative_eq!(hit.point, Point3::new(0.25, 0.25, 0.0), epsilon = 1e-12);
        assert_relative_eq!(hit.uvw, Vector3::new(0.5, 0.25, 0.25), epsilon = 1e-12);
        assert!(hit.is_hit());
    }

    #[test]
    fn test_plane_hit_outside_triangle_still_reported() {
        let [a, b, c] = tri();
        let hit = intersect_segment_triangle(
            &Point3::new(2.0, 2.0, 1.0),
            &Point3::new(2.0, 2.0, -1.0),
            &a,
            &b,
            &c,
        )
        .unwrap();
        assert!(hit.crosses_plane());
        assert!(!hit.inside_triangle());
    }

    #[test]
    fn test_segment_short_of_plane() {
        let [a, b, c] = tri();
        let hit = intersect_segment_triangle(
            &Point3::new(0.2, 0.2, 2.0),
            &Point3::new(0.2, 0.2, 1.0),
            &a,
            &b,
            &c,
        )
        .unwrap();
        assert!(hit.inside_triangle());
        assert!(!hit.crosses_plane());
        assert_relative_eq!(hit.t, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_and_degenerate_skipped() {
        let [a, b, c] = tri();
        assert!(intersect_segment_triangle(
            &Point3::new(0.0, 0.0, 1.0),
            &Point3::new(1.0, 0.0, 1.0),
            &a,
            &b,
            &c
        )
        .is_none());
        assert!(intersect_segment_triangle(
            &Point3::new(0.0, 0.0, 1.0),
            &Point3::new(0.0, 0.0, -1.0),
            &a,
            &a,
            &c
        )
        .is_none());
    }

    #[test]
    fn test_sphere_cull() {
        let sphere = BoundingSphere {
            center: Point3::origin(),
            radius_squared: 1.0,
        };
        let p = Point3::new(-5.0, 1.2, 0.0);
        let q = Point3::new(5.0, 1.2, 0.0);
        assert!(!segment_near_sphere(&p, &q, &sphere, 1.0));
        assert!(segment_near_sphere(&p, &q, &sphere, 2.0));
        // Segment ends before reaching the sphere.
        assert!(!segment_near_sphere(
            &Point3::new(-5.0, 0.0, 0.0),
            &Point3::new(-3.0, 0.0, 0.0),
            &sphere,
            2.0
        ));
    }
}
