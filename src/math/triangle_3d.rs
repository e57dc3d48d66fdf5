use super::{Point3, Vector3, TOLERANCE};

/// Unit normal of the triangle `(a, b, c)` following right-hand winding.
///
/// Returns `None` if the triangle is degenerate (collinear or coincident
/// corners).
#[must_use]
pub fn triangle_normal(a: &Point3, b: &Point3, c: &Point3) -> Option<Vector3> {
    let cross = (b - a).cross(&(c - a));
    let len = cross.norm();
    if len < TOLERANCE {
        None
    } else {
        Some(cross / len)
    }
}

/// Area of the triangle `(a, b, c)`.
#[must_use]
pub fn triangle_area(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    (b - a).cross(&(c - a)).norm() / 2.0
}

/// Centroid of the triangle `(a, b, c)`.
#[must_use]
pub fn triangle_centroid(a: &Point3, b: &Point3, c: &Point3) -> Point3 {
    Point3::from((a.coords + b.coords + c.coords) / 3.0)
}

/// Smallest interior angle of the triangle `(a, b, c)`, in radians.
///
/// Degenerate triangles report an angle of zero.
#[must_use]
pub fn triangle_smallest_angle(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    let angles = [
        corner_angle(a, b, c),
        corner_angle(b, c, a),
        corner_angle(c, a, b),
    ];
    angles.into_iter().fold(f64::MAX, f64::min)
}

/// Interior angle at `corner` spanned by the directions toward `p` and `q`.
fn corner_angle(corner: &Point3, p: &Point3, q: &Point3) -> f64 {
    super::angle_between(&(p - corner), &(q - corner))
}
