use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::math::{angle_between, triangle_3d, Point3, Vector3};
use crate::mesh::{EdgeId, MeshStore, VertexId};

/// Resolved tolerances of the flip gates.
#[derive(Debug, Clone, Copy)]
pub struct FlipGates {
    /// Maximum allowed change of the pair's total area.
    pub max_area_change: f64,
    /// Minimum area of each post-flip triangle.
    pub smallest_area: f64,
    /// Maximum rotation between any pre- and post-flip normal.
    pub max_normal_change: f64,
    /// Maximum pre-flip angle between the two triangle normals.
    pub max_normal_difference: f64,
}

impl FlipGates {
    /// Resolves the gates from the configuration for a grid spacing.
    #[must_use]
    pub fn resolve(config: &Config, spacing: &Vector3) -> Self {
        Self {
            max_area_change: config.flip_max_area_change(spacing),
            smallest_area: config.tol_flip_smallest_area,
            max_normal_change: config.tol_flip_max_normal_change,
            max_normal_difference: config.tol_flip_max_normal_difference,
        }
    }
}

/// Pure accept/reject verdict for replacing the pair `old` with `new`.
///
/// Beyond the tolerance gates, the flip must strictly raise the smallest
/// corner angle of the pair; this makes sweeps terminate, since a flip and
/// its own inverse can never both qualify. Degenerate triangles on either
/// side fail the verdict, since their normals are undefined.
#[must_use]
pub fn evaluate_flip(old: &[[Point3; 3]; 2], new: &[[Point3; 3]; 2], gates: &FlipGates) -> bool {
    let normals = |pair: &[[Point3; 3]; 2]| {
        let a = triangle_3d::triangle_normal(&pair[0][0], &pair[0][1], &pair[0][2])?;
        let b = triangle_3d::triangle_normal(&pair[1][0], &pair[1][1], &pair[1][2])?;
        Some([a, b])
    };
    let Some(old_normals) = normals(old) else {
        return false;
    };
    let Some(new_normals) = normals(new) else {
        return false;
    };

    if angle_between(&old_normals[0], &old_normals[1]) > gates.max_normal_difference {
        return false;
    }

    let area = |t: &[Point3; 3]| triangle_3d::triangle_area(&t[0], &t[1], &t[2]);
    let new_areas = [area(&new[0]), area(&new[1])];
    if new_areas[0] < gates.smallest_area || new_areas[1] < gates.smallest_area {
        return false;
    }

    let old_total = area(&old[0]) + area(&old[1]);
    if (new_areas[0] + new_areas[1] - old_total).abs() > gates.max_area_change {
        return false;
    }

    for o in &old_normals {
        for n in &new_normals {
            if angle_between(o, n) > gates.max_normal_change {
                return false;
            }
        }
    }

    let smallest = |pair: &[[Point3; 3]; 2]| {
        let a = triangle_3d::triangle_smallest_angle(&pair[0][0], &pair[0][1], &pair[0][2]);
        let b = triangle_3d::triangle_smallest_angle(&pair[1][0], &pair[1][1], &pair[1][2]);
        a.min(b)
    };
    smallest(new) > smallest(old)
}

/// Sweeps every edge shared by two triangles of one surface and flips the
/// local quad diagonal where the gates allow it. Sweeps repeat until a
/// full pass accepts nothing.
pub struct FlipAll<'a> {
    config: &'a Config,
    spacing: Vector3,
}

impl<'a> FlipAll<'a> {
    /// Creates a flip sweep for a grid spacing.
    #[must_use]
    pub fn new(config: &'a Config, spacing: Vector3) -> Self {
        Self { config, spacing }
    }

    /// Runs sweeps to a fixed point, returning the number of flips applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the store references a missing entity.
    pub fn execute(&self, store: &mut MeshStore) -> Result<usize> {
        let gates = FlipGates::resolve(self.config, &self.spacing);
        let mut total = 0;
        loop {
            let mut accepted = 0;
            for e in store.edge_ids() {
                if !store.has_edge(e) {
                    continue;
                }
                if try_flip(store, e, &gates)? {
                    accepted += 1;
                }
            }
            total += accepted;
            if accepted == 0 {
                break;
            }
        }
        info!(flips = total, "edge flipping finished");
        Ok(total)
    }
}

fn try_flip(store: &mut MeshStore, e: EdgeId, gates: &FlipGates) -> Result<bool> {
    let incident = store.edge_triangles(e)?;
    if incident.len() != 2 {
        return Ok(false);
    }
    let t0 = store.triangle(incident[0])?.clone();
    let t1 = store.triangle(incident[1])?.clone();
    if t0.surface != t1.surface {
        return Ok(false);
    }

    let [mut a, mut b] = store.edge(e)?.vertices;
    let Some(c) = opposite_vertex(&t0.vertices, a, b) else {
        return Ok(false);
    };
    let Some(d) = opposite_vertex(&t1.vertices, a, b) else {
        return Ok(false);
    };
    if c == d || store.find_edge(c, d).is_some() {
        return Ok(false);
    }

    // Orient the shared edge with t0's winding, so (a, d, c) and
    // (b, c, d) keep the surface orientation.
    if !winding_has(&t0.vertices, a, b) {
        std::mem::swap(&mut a, &mut b);
    }

    let point = |v: VertexId| -> Result<Point3> { Ok(store.vertex(v)?.position) };
    let (pa, pb, pc, pd) = (point(a)?, point(b)?, point(c)?, point(d)?);
    let old = [[pa, pb, pc], [pb, pa, pd]];
    let new = [[pa, pd, pc], [pb, pc, pd]];
    if !evaluate_flip(&old, &new, gates) {
        return Ok(false);
    }

    let transverse = store.edge(e)?.transverse;
    store.remove_triangle(incident[0])?;
    store.remove_triangle(incident[1])?;
    store.add_triangle([a, d, c], t0.surface, t0.pos_phase, t0.neg_phase)?;
    store.add_triangle([b, c, d], t0.surface, t0.pos_phase, t0.neg_phase)?;

    // The replacement diagonal inherits the artifact marker.
    if transverse {
        if let Some(diagonal) = store.find_edge(c, d) {
            store.edge_mut(diagonal)?.transverse = true;
        }
    }
    debug!(?a, ?b, ?c, ?d, "flipped edge");
    Ok(true)
}

fn opposite_vertex(triangle: &[VertexId; 3], a: VertexId, b: VertexId) -> Option<VertexId> {
    triangle.iter().copied().find(|&v| v != a && v != b)
}

/// `true` if the cyclic corner order contains `a` directly followed by `b`.
fn winding_has(triangle: &[VertexId; 3], a: VertexId, b: VertexId) -> bool {
    (0..3).any(|i| triangle[i] == a && triangle[(i + 1) % 3] == b)
}
