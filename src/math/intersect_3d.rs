use super::{Point3, Vector3};

/// Distance snapping tolerance for the plane-side classification.
///
/// Looser than the global [`TOLERANCE`](super::TOLERANCE): triangle pairs are
/// classified on coordinates of voxel-spacing magnitude, and near-touching
/// configurations should count as coplanar rather than flip between branches.
const PLANE_EPS: f64 = 1e-9;

/// Tests whether two triangles intersect (Moller's interval method).
///
/// Returns `true` when the triangles' interiors or boundaries overlap.
/// Callers are expected to filter out triangle pairs that share a vertex;
/// such pairs always touch and are not meaningful self-intersections.
#[must_use]
pub fn triangles_intersect(t0: &[Point3; 3], t1: &[Point3; 3]) -> bool {
    // Plane of t1 and signed distances of t0's corners.
    let n1 = (t1[1] - t1[0]).cross(&(t1[2] - t1[0]));
    let du = plane_distances(t0, &n1, &t1[0]);
    if same_side(&du) {
        return false;
    }

    // Plane of t0 and signed distances of t1's corners.
    let n0 = (t0[1] - t0[0]).cross(&(t0[2] - t0[0]));
    let dv = plane_distances(t1, &n0, &t0[0]);
    if same_side(&dv) {
        return false;
    }

    if du.iter().all(|d| d.abs() < PLANE_EPS) {
        return coplanar_triangles_intersect(t0, t1, &n0);
    }

    // Direction of the intersection line of the two planes; project onto
    // the dominant axis so the interval arithmetic stays 1D.
    let dir = n0.cross(&n1);
    let axis = dominant_axis(&dir);

    let p0 = [t0[0][axis], t0[1][axis], t0[2][axis]];
    let p1 = [t1[0][axis], t1[1][axis], t1[2][axis]];

    let Some((a0, b0)) = interval_on_line(&p0, &du) else {
        return coplanar_triangles_intersect(t0, t1, &n0);
    };
    let Some((a1, b1)) = interval_on_line(&p1, &dv) else {
        return coplanar_triangles_intersect(t0, t1, &n0);
    };

    a0.max(a1) <= b0.min(b1)
}

/// Moller-Trumbore ray/triangle intersection.
///
/// Returns the ray parameter `t > 0` of the hit, or `None` for a miss or a
/// ray parallel to the triangle plane.
#[must_use]
pub fn ray_triangle_intersect(origin: &Point3, dir: &Vector3, tri: &[Point3; 3]) -> Option<f64> {
    let e1 = tri[1] - tri[0];
    let e2 = tri[2] - tri[0];

    let pvec = dir.cross(&e2);
    let det = e1.dot(&pvec);
    if det.abs() < PLANE_EPS {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = origin - tri[0];
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(&e1);
    let v = dir.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(&qvec) * inv_det;
    if t > PLANE_EPS {
        Some(t)
    } else {
        None
    }
}

fn plane_distances(tri: &[Point3; 3], normal: &Vector3, on_plane: &Point3) -> [f64; 3] {
    let mut d = [0.0; 3];
    for i in 0..3 {
        let dist = normal.dot(&(tri[i] - on_plane));
        d[i] = if dist.abs() < PLANE_EPS { 0.0 } else { dist };
    }
    d
}

fn same_side(d: &[f64; 3]) -> bool {
    (d[0] > 0.0 && d[1] > 0.0 && d[2] > 0.0) || (d[0] < 0.0 && d[1] < 0.0 && d[2] < 0.0)
}

fn dominant_axis(v: &Vector3) -> usize {
    let abs = [v.x.abs(), v.y.abs(), v.z.abs()];
    if abs[0] >= abs[1] && abs[0] >= abs[2] {
        0
    } else if abs[1] >= abs[2] {
        1
    } else {
        2
    }
}

/// Interval of the triangle on the plane-intersection line.
///
/// `proj` are the corner projections on the line axis, `dist` the signed
/// plane distances. Returns `None` when the distances do not straddle the
/// plane (degenerate, handled as coplanar by the caller).
fn interval_on_line(proj: &[f64; 3], dist: &[f64; 3]) -> Option<(f64, f64)> {
    // Find the corner that is alone on its side of the plane.
    let lone = (0..3).find(|&i| {
        let (j, k) = ((i + 1) % 3, (i + 2) % 3);
        (dist[i] > 0.0 && dist[j] <= 0.0 && dist[k] <= 0.0)
            || (dist[i] < 0.0 && dist[j] >= 0.0 && dist[k] >= 0.0)
    })?;

    let (j, k) = ((lone + 1) % 3, (lone + 2) % 3);
    let mut ends = [0.0; 2];
    for (slot, other) in [(0, j), (1, k)] {
        let denom = dist[lone] - dist[other];
        let t = if denom.abs() < PLANE_EPS {
            0.0
        } else {
            dist[lone] / denom
        };
        ends[slot] = proj[lone] + (proj[other] - proj[lone]) * t;
    }

    if ends[0] <= ends[1] {
        Some((ends[0], ends[1]))
    } else {
        Some((ends[1], ends[0]))
    }
}

/// Overlap test for coplanar triangles, projected to 2D.
fn coplanar_triangles_intersect(t0: &[Point3; 3], t1: &[Point3; 3], normal: &Vector3) -> bool {
    let drop = dominant_axis(normal);
    let (x, y) = match drop {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };

    let a: Vec<(f64, f64)> = t0.iter().map(|p| (p[x], p[y])).collect();
    let b: Vec<(f64, f64)> = t1.iter().map(|p| (p[x], p[y])).collect();

    // Any edge pair crossing, or one triangle fully inside the other.
    for i in 0..3 {
        for j in 0..3 {
            if segments_intersect_2d(a[i], a[(i + 1) % 3], b[j], b[(j + 1) % 3]) {
                return true;
            }
        }
    }
    point_in_triangle_2d(a[0], &b) || point_in_triangle_2d(b[0], &a)
}

fn segments_intersect_2d(p1: (f64, f64), p2: (f64, f64), q1: (f64, f64), q2: (f64, f64)) -> bool {
    let d1 = cross_2d(q1, q2, p1);
    let d2 = cross_2d(q1, q2, p2);
    let d3 = cross_2d(p1, p2, q1);
    let d4 = cross_2d(p1, p2, q2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

fn cross_2d(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn point_in_triangle_2d(p: (f64, f64), tri: &[(f64, f64)]) -> bool {
    let d1 = cross_2d(tri[0], tri[1], p);
    let d2 = cross_2d(tri[1], tri[2], p);
    let d3 = cross_2d(tri[2], tri[0], p);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn crossing_triangles_intersect() {
        // One triangle in the XY plane, one piercing it vertically.
        let t0 = [p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(0.0, 2.0, 0.0)];
        let t1 = [p(0.5, 0.5, -1.0), p(0.5, 0.5, 1.0), p(1.5, 0.5, 0.5)];
        assert!(triangles_intersect(&t0, &t1));
        assert!(triangles_intersect(&t1, &t0));
    }

    #[test]
    fn separated_triangles_do_not_intersect() {
        let t0 = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)];
        let t1 = [p(0.0, 0.0, 2.0), p(1.0, 0.0, 2.0), p(0.0, 1.0, 2.0)];
        assert!(!triangles_intersect(&t0, &t1));
    }

    #[test]
    fn parallel_close_triangles_do_not_intersect() {
        let t0 = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)];
        let t1 = [p(0.0, 0.0, 0.01), p(1.0, 0.0, 0.01), p(0.0, 1.0, 0.01)];
        assert!(!triangles_intersect(&t0, &t1));
    }

    #[test]
    fn coplanar_overlapping_triangles_intersect() {
        let t0 = [p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(0.0, 2.0, 0.0)];
        let t1 = [p(0.5, 0.5, 0.0), p(2.5, 0.5, 0.0), p(0.5, 2.5, 0.0)];
        assert!(triangles_intersect(&t0, &t1));
    }

    #[test]
    fn coplanar_disjoint_triangles_do_not_intersect() {
        let t0 = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)];
        let t1 = [p(5.0, 5.0, 0.0), p(6.0, 5.0, 0.0), p(5.0, 6.0, 0.0)];
        assert!(!triangles_intersect(&t0, &t1));
    }

    #[test]
    fn ray_hits_triangle() {
        let tri = [p(0.0, 0.0, 1.0), p(2.0, 0.0, 1.0), p(0.0, 2.0, 1.0)];
        let t = ray_triangle_intersect(
            &p(0.5, 0.5, 0.0),
            &Vector3::new(0.0, 0.0, 1.0),
            &tri,
        );
        assert!((t.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ray_misses_triangle() {
        let tri = [p(0.0, 0.0, 1.0), p(2.0, 0.0, 1.0), p(0.0, 2.0, 1.0)];
        let t = ray_triangle_intersect(
            &p(5.0, 5.0, 0.0),
            &Vector3::new(0.0, 0.0, 1.0),
            &tri,
        );
        assert!(t.is_none());
    }

    #[test]
    fn ray_behind_origin_is_no_hit() {
        let tri = [p(0.0, 0.0, -1.0), p(2.0, 0.0, -1.0), p(0.0, 2.0, -1.0)];
        let t = ray_triangle_intersect(
            &p(0.5, 0.5, 0.0),
            &Vector3::new(0.0, 0.0, 1.0),
            &tri,
        );
        assert!(t.is_none());
    }
}
