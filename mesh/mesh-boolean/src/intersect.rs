//! Geometric predicates used by the boolean engine.
//!
//! Everything here works on plain points and takes an absolute tolerance;
//! callers scale their relative tolerance by the size of the scene.

use mesh_types::{Point3, Vector3};

/// Ray-triangle intersection using the Möller-Trumbore algorithm.
///
/// # Arguments
///
/// * `origin` - Ray origin
/// * `direction` - Ray direction (does not need to be normalized)
/// * `v0`, `v1`, `v2` - Triangle vertices
/// * `epsilon` - Tolerance for parallel ray detection and self hits
///
/// # Returns
///
/// `Some(t)` where t is the ray parameter at intersection, or `None` if no intersection.
/// The intersection point is `origin + t * direction`.
#[must_use]
pub fn ray_triangle_intersect(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
    epsilon: f64,
) -> Option<f64> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);

    // Ray is parallel to triangle
    if a.abs() < f64::EPSILON * edge1.norm() * edge2.norm() * direction.norm() {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);
    (t > epsilon).then_some(t)
}

/// Unit normal of a triangle, or `None` if it has no area.
#[must_use]
pub fn triangle_unit_normal(
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> Option<Vector3<f64>> {
    (v1 - v0).cross(&(v2 - v0)).try_normalize(0.0)
}

/// Compute the centroid of a triangle.
#[inline]
#[must_use]
pub fn triangle_centroid(v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> Point3<f64> {
    Point3::from((v0.coords + v1.coords + v2.coords) / 3.0)
}

/// Whether `point`, assumed to lie in the triangle's plane, is inside the
/// triangle or within `epsilon` of its boundary.
#[must_use]
pub fn point_in_triangle(
    point: &Point3<f64>,
    tri: &[Point3<f64>; 3],
    normal: &Vector3<f64>,
    epsilon: f64,
) -> bool {
    (0..3).all(|k| {
        let a = tri[k];
        let b = tri[(k + 1) % 3];
        let edge = b - a;
        let len = edge.norm();
        // Signed distance from the edge line, positive on the inner side
        len > 0.0 && edge.cross(&(point - a)).dot(normal) / len >= -epsilon
    })
}

/// Where segment `p-q` crosses the plane given by signed distances `dp`
/// and `dq` of its endpoints.
///
/// The endpoints must be on strictly opposite sides. Interpolating from `p`
/// always, callers get bitwise identical points for the same ordered edge.
#[inline]
#[must_use]
pub fn plane_crossing(p: &Point3<f64>, q: &Point3<f64>, dp: f64, dq: f64) -> Point3<f64> {
    let t = dp / (dp - dq);
    p + (q - p) * t
}

/// 2D cross product of `b - a` and `c - a`; positive for a left turn.
#[inline]
#[must_use]
pub fn orient2d(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Whether the open segments `a-b` and `c-d` cross at a single interior point.
#[must_use]
pub fn segments_cross_2d(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2], epsilon: f64) -> bool {
    let d1 = orient2d(c, d, a);
    let d2 = orient2d(c, d, b);
    let d3 = orient2d(a, b, c);
    let d4 = orient2d(a, b, d);
    ((d1 > epsilon && d2 < -epsilon) || (d1 < -epsilon && d2 > epsilon))
        && ((d3 > epsilon && d4 < -epsilon) || (d3 < -epsilon && d4 > epsilon))
}
