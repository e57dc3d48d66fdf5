use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::math::{angle_between, triangle_3d, Point3, Vector3};
use crate::mesh::{EdgeId, MeshStore, TriangleData, TriangleId, VertexId};

/// Resolved tolerances of the collapse gates.
#[derive(Debug, Clone, Copy)]
pub struct CollapseGates {
    /// Minimum area of each surviving triangle.
    pub smallest_area: f64,
    /// Minimum interior angle of each surviving triangle.
    pub min_angle: f64,
    /// Maximum rotation of a surviving triangle's normal.
    pub max_normal_change: f64,
    /// Maximum direction change of a re-anchored edge chord.
    pub chord_max_normal_change: f64,
    /// Maximum change of the enclosed volume.
    pub max_volume_change: f64,
    /// Maximum accumulated positional error on the kept vertex.
    pub max_error_accumulated: f64,
}

impl CollapseGates {
    /// Resolves the gates from the configuration for a grid spacing.
    #[must_use]
    pub fn resolve(config: &Config, spacing: &Vector3) -> Self {
        Self {
            smallest_area: config.tol_col_smallest_area,
            min_angle: config.tol_col_min_angle,
            max_normal_change: config.tol_col_max_normal_change,
            chord_max_normal_change: config.tol_col_chord_max_normal_change,
            max_volume_change: config.col_max_volume_change(spacing),
            max_error_accumulated: config.col_max_error_accumulated(spacing),
        }
    }
}

/// Tolerance-gated edge collapse, shortest edges first.
///
/// Each pass snapshots all edges ordered by ascending length, tries to
/// merge one endpoint into the other (both directions), and applies the
/// collapse only when every gate holds. A candidate rejected in a pass is
/// not retried within that pass; passes repeat until one accepts nothing.
pub struct Coarsen<'a> {
    config: &'a Config,
    spacing: Vector3,
}

impl<'a> Coarsen<'a> {
    /// Creates a coarsening operation for a grid spacing.
    #[must_use]
    pub fn new(config: &'a Config, spacing: Vector3) -> Self {
        Self { config, spacing }
    }

    /// Runs passes to a fixed point, returning the number of collapses.
    ///
    /// # Errors
    ///
    /// Returns an error if the store references a missing entity.
    pub fn execute(&self, store: &mut MeshStore) -> Result<usize> {
        let gates = CollapseGates::resolve(self.config, &self.spacing);
        let mut total = 0;
        loop {
            let accepted = run_pass(store, &gates)?;
            total += accepted;
            if accepted == 0 {
                break;
            }
        }
        info!(collapses = total, "coarsening finished");
        Ok(total)
    }
}

fn run_pass(store: &mut MeshStore, gates: &CollapseGates) -> Result<usize> {
    let mut candidates: Vec<(f64, EdgeId)> = Vec::new();
    for e in store.edge_ids() {
        candidates.push((store.edge_length(e)?, e));
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut accepted = 0;
    for (_, e) in candidates {
        if !store.has_edge(e) {
            continue;
        }
        let [a, b] = store.edge(e)?.vertices;
        for (remove, keep) in [(a, b), (b, a)] {
            if !is_removable(store, remove)? {
                continue;
            }
            if try_collapse(store, remove, keep, gates)? {
                accepted += 1;
                break;
            }
        }
    }
    Ok(accepted)
}

/// A vertex may only be merged away if nothing constrains its position.
fn is_removable(store: &MeshStore, v: VertexId) -> Result<bool> {
    let data = store.vertex(v)?;
    Ok(data.fixed == [false; 3] && data.phase_edges.is_empty())
}

fn try_collapse(
    store: &mut MeshStore,
    remove: VertexId,
    keep: VertexId,
    gates: &CollapseGates,
) -> Result<bool> {
    let remove_data = store.vertex(remove)?.clone();
    let keep_data = store.vertex(keep)?.clone();

    let merge_error = (remove_data.position - keep_data.position).norm();
    if keep_data.collapse_error + remove_data.collapse_error + merge_error
        > gates.max_error_accumulated
    {
        return Ok(false);
    }

    let mut dying: Vec<TriangleId> = Vec::new();
    let mut surviving: Vec<(TriangleId, TriangleData)> = Vec::new();
    for &t in &remove_data.triangles {
        let data = store.triangle(t)?.clone();
        if data.has_vertex(keep) {
            dying.push(t);
        } else {
            let vertices = data.substituted(remove, keep);
            surviving.push((t, TriangleData { vertices, ..data }));
        }
    }

    // A common neighbor outside the dying triangles would collapse onto an
    // already existing triangle, producing a duplicate. The full one-ring
    // matters here; a neighbor reached only through a quad diagonal can
    // still carry the offending edge.
    let opposite: Vec<VertexId> = dying
        .iter()
        .filter_map(|&t| {
            store
                .triangle(t)
                .ok()
                .and_then(|d| d.vertices.iter().copied().find(|&v| v != remove && v != keep))
        })
        .collect();
    for &n in store.edge_neighbors(remove)?.iter() {
        if n == keep || opposite.contains(&n) {
            continue;
        }
        if store.find_edge(n, keep).is_some() {
            return Ok(false);
        }
    }

    let mut volume_before = 0.0;
    let mut volume_after = 0.0;
    for &t in &dying {
        volume_before += store.triangle_signed_volume(t)?;
    }
    for (old_id, new_data) in &surviving {
        let old_points = store.triangle_points(*old_id)?;
        let new_points = [
            store.vertex(new_data.vertices[0])?.position,
            store.vertex(new_data.vertices[1])?.position,
            store.vertex(new_data.vertices[2])?.position,
        ];

        let area = triangle_3d::triangle_area(&new_points[0], &new_points[1], &new_points[2]);
        if area < gates.smallest_area {
            return Ok(false);
        }
        let angle =
            triangle_3d::triangle_smallest_angle(&new_points[0], &new_points[1], &new_points[2]);
        if angle < gates.min_angle {
            return Ok(false);
        }

        let old_normal =
            triangle_3d::triangle_normal(&old_points[0], &old_points[1], &old_points[2]);
        let new_normal =
            triangle_3d::triangle_normal(&new_points[0], &new_points[1], &new_points[2]);
        match (old_normal, new_normal) {
            (Some(o), Some(n)) => {
                if angle_between(&o, &n) > gates.max_normal_change {
                    return Ok(false);
                }
            }
            _ => return Ok(false),
        }

        volume_before += signed_volume(&old_points);
        volume_after += signed_volume(&new_points);
    }
    if (volume_after - volume_before).abs() > gates.max_volume_change {
        return Ok(false);
    }

    // Re-anchored chords may not swing too far.
    for &n in store.edge_neighbors(remove)?.iter() {
        if n == keep {
            continue;
        }
        let anchor = store.vertex(n)?.position;
        let old_chord = remove_data.position - anchor;
        let new_chord = keep_data.position - anchor;
        if angle_between(&old_chord, &new_chord) > gates.chord_max_normal_change {
            return Ok(false);
        }
    }

    // All gates hold; rewrite the fan.
    for &t in &dying {
        store.remove_triangle(t)?;
    }
    for (old_id, new_data) in surviving {
        store.remove_triangle(old_id)?;
        store.add_triangle(
            new_data.vertices,
            new_data.surface,
            new_data.pos_phase,
            new_data.neg_phase,
        )?;
    }
    store.vertex_mut(keep)?.collapse_error += remove_data.collapse_error + merge_error;
    store.purge_vertex(remove)?;
    debug!(?remove, ?keep, "collapsed edge");
    Ok(true)
}

fn signed_volume(points: &[Point3; 3]) -> f64 {
    points[0]
        .coords
        .dot(&points[1].coords.cross(&points[2].coords))
        / 6.0
}
