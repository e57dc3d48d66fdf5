use tracing::{debug, info, warn};

use crate::error::Result;
use crate::math::{intersect_3d, Point3};
use crate::mesh::{MeshStore, TriangleId, VertexId};

/// Smallest displacement fraction tried before giving up on a pair.
const MIN_FRACTION: f64 = 1.0 / 256.0;

/// Best-effort removal of self-intersections introduced by smoothing.
///
/// Scans all triangle pairs (axis-aligned box prefilter, pairs sharing a
/// vertex skipped) and, for each intersecting pair, walks the six involved
/// vertices back along their smoothing displacement by repeated halving
/// until the pair separates. Vertices that never moved are left alone. A
/// pair that stays intersecting even at the original coordinates is logged
/// as a residual defect.
pub struct ResolveIntersections;

impl ResolveIntersections {
    /// Runs the scan, returning the number of pairs that were adjusted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store references a missing entity.
    pub fn execute(&self, store: &mut MeshStore) -> Result<usize> {
        info!("resolving self-intersections");
        let ids = store.triangle_ids();
        let mut boxes: Vec<(Point3, Point3)> = Vec::with_capacity(ids.len());
        for &t in &ids {
            boxes.push(bounds(&store.triangle_points(t)?));
        }

        let mut adjusted = 0;
        let mut residual = 0;
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                if !boxes_touch(&boxes[i], &boxes[j]) {
                    continue;
                }
                if shares_vertex(store, ids[i], ids[j])? {
                    continue;
                }
                if !intersecting(store, ids[i], ids[j])? {
                    continue;
                }
                if pull_back_pair(store, ids[i], ids[j])? {
                    adjusted += 1;
                    // The involved triangles moved; refresh their boxes.
                    boxes[i] = bounds(&store.triangle_points(ids[i])?);
                    boxes[j] = bounds(&store.triangle_points(ids[j])?);
                } else {
                    residual += 1;
                }
            }
        }
        if residual > 0 {
            warn!(residual, "self-intersections could not be resolved");
        }
        info!(adjusted, "intersection resolution finished");
        Ok(adjusted)
    }
}

fn intersecting(store: &MeshStore, a: TriangleId, b: TriangleId) -> Result<bool> {
    let pa = store.triangle_points(a)?;
    let pb = store.triangle_points(b)?;
    Ok(intersect_3d::triangles_intersect(&pa, &pb))
}

/// Halves the smoothing displacement of every moved vertex of the pair
/// until the triangles separate. Returns `false` if they still intersect
/// with all displacements fully undone.
fn pull_back_pair(store: &mut MeshStore, a: TriangleId, b: TriangleId) -> Result<bool> {
    let mut movable: Vec<(VertexId, Point3)> = Vec::new();
    for t in [a, b] {
        for v in store.triangle(t)?.vertices {
            let data = store.vertex(v)?;
            if (data.position - data.original).norm() > 0.0 {
                movable.push((v, data.position));
            }
        }
    }
    if movable.is_empty() {
        return Ok(false);
    }

    let mut fraction = 1.0;
    while fraction >= MIN_FRACTION {
        fraction /= 2.0;
        for &(v, start) in &movable {
            let original = store.vertex(v)?.original;
            store.vertex_mut(v)?.position = original + (start - original) * fraction;
        }
        if !intersecting(store, a, b)? {
            debug!(?a, ?b, fraction, "pair separated");
            return Ok(true);
        }
    }

    for &(v, _) in &movable {
        let original = store.vertex(v)?.original;
        store.vertex_mut(v)?.position = original;
    }
    if intersecting(store, a, b)? {
        return Ok(false);
    }
    Ok(true)
}

fn shares_vertex(store: &MeshStore, a: TriangleId, b: TriangleId) -> Result<bool> {
    let va = store.triangle(a)?.vertices;
    let vb = store.triangle(b)?.vertices;
    Ok(va.iter().any(|v| vb.contains(v)))
}

fn bounds(points: &[Point3; 3]) -> (Point3, Point3) {
    let mut lo = points[0];
    let mut hi = points[0];
    for p in &points[1..] {
        for a in 0..3 {
            lo[a] = lo[a].min(p[a]);
            hi[a] = hi[a].max(p[a]);
        }
    }
    (lo, hi)
}

fn boxes_touch(x: &(Point3, Point3), y: &(Point3, Point3)) -> bool {
    (0..3).all(|a| x.0[a] <= y.1[a] && y.0[a] <= x.1[a])
}
