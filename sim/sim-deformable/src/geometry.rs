//! Closest-point and barycentric helpers shared by the contact constraints.
//!
//! All functions are total: degenerate inputs (zero-area triangles,
//! zero-length segments) are reported through `Option` or clamped, never
//! through a panic.

use nalgebra::{Point3, Vector3};

/// Relative denominator guard used for every division in this module.
///
/// Each test compares against the product of the lengths involved, so the
/// helpers behave the same on millimetre and metre scale meshes.
pub const DENOM_EPSILON: f64 = 1e-12;

/// Barycentric coordinates `(u, v, w)` of `p` with respect to triangle `abc`.
///
/// `p` is assumed to lie in (or be projected onto) the triangle's plane; the
/// out-of-plane component is ignored. Returns `None` for a degenerate
/// triangle.
///
/// ```
/// use sim_deformable::geometry::barycentric;
/// use nalgebra::Point3;
///
/// let uvw = barycentric(
///     &Point3::new(0.25, 0.25, 0.0),
///     &Point3::origin(),
///     &Point3::new(1.0, 0.0, 0.0),
///     &Point3::new(0.0, 1.0, 0.0),
/// )
/// .unwrap();
/// assert!((uvw.x - 0.5).abs() < 1e-12);
/// ```
#[must_use]
pub fn barycentric(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Option<Vector3<f64>> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;

    let d00 = v0.dot(&v0);
    let d01 = v0.dot(&v1);
    let d11 = v1.dot(&v1);
    let d20 = v2.dot(&v0);
    let d21 = v2.dot(&v1);

    // denom / (d00 * d11) is the squared sine of the corner angle at `a`.
    let denom = d00.mul_add(d11, -(d01 * d01));
    if denom.abs() <= DENOM_EPSILON * d00 * d11 {
        return None;
    }

    let v = d11.mul_add(d20, -(d01 * d21)) / denom;
    let w = d00.mul_add(d21, -(d01 * d20)) / denom;
    Some(Vector3::new(1.0 - v - w, v, w))
}

/// Interpolate three points with barycentric weights.
#[must_use]
pub fn interpolate(
    uvw: &Vector3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Point3<f64> {
    Point3::from(a.coords * uvw.x + b.coords * uvw.y + c.coords * uvw.z)
}

/// Parameter in `[0, 1]` of the point on segment `ab` closest to `p`.
#[must_use]
pub fn closest_segment_param(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < f64::MIN_POSITIVE {
        return 0.0;
    }
    ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0)
}

/// Closest point on segment `ab` to `p`.
#[must_use]
pub fn closest_point_on_segment(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> Point3<f64> {
    a + (b - a) * closest_segment_param(p, a, b)
}

/// Parameters `(s, t)` of the closest points between segments `p0p1` and
/// `q0q1`, both clamped to `[0, 1]`.
///
/// Parallel segments resolve to `s = 0` and the matching clamped `t`.
#[must_use]
pub fn segment_segment_params(
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    q0: &Point3<f64>,
    q1: &Point3<f64>,
) -> (f64, f64) {
    let d1 = p1 - p0;
    let d2 = q1 - q0;
    let r = p0 - q0;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    let scale = a.max(e);
    if scale < f64::MIN_POSITIVE {
        return (0.0, 0.0);
    }
    if a <= DENOM_EPSILON * scale {
        return (0.0, (f / e).clamp(0.0, 1.0));
    }

    let c = d1.dot(&r);
    if e <= DENOM_EPSILON * scale {
        return ((-c / a).clamp(0.0, 1.0), 0.0);
    }

    let b = d1.dot(&d2);
    let denom = a.mul_add(e, -(b * b));
    let mut s = if denom.abs() > DENOM_EPSILON * a * e {
        (b.mul_add(f, -(c * e)) / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let mut t = b.mul_add(s, f) / e;
    if t < 0.0 {
        t = 0.0;
        s = (-c / a).clamp(0.0, 1.0);
    } else if t > 1.0 {
        t = 1.0;
        s = ((b - c) / a).clamp(0.0, 1.0);
    }
    (s, t)
}
