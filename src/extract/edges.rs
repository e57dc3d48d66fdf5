use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::error::Result;
use crate::math::{Point3, Vector3};
use crate::mesh::{MeshStore, PhaseEdgeData, VertexId};
use crate::voxel::{is_outside, VoxelSource};

use super::CROSS_AXES;

/// Finds the polylines where three or more phases meet and records them as
/// phase edges.
///
/// One vertex can be shared by several surfaces without lying on a phase
/// edge, so candidates are first gathered from pairwise surface
/// intersections and then confirmed by probing the four voxel quadrants
/// around each lattice segment. Raw segment soups are repaired into
/// connected chains and split wherever chains meet.
pub struct TraceEdges<'a, S> {
    source: &'a S,
}

impl<'a, S: VoxelSource> TraceEdges<'a, S> {
    /// Creates a new tracing operation.
    #[must_use]
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Executes the trace.
    ///
    /// # Errors
    ///
    /// Returns an error if the store references a missing entity.
    pub fn execute(&self, store: &mut MeshStore) -> Result<()> {
        info!("tracing phase edges");
        for s in store.surface_ids() {
            store.surface_mut(s)?.normalize_vertices();
        }

        let edge_vertices = collect_shared_vertices(store)?;
        // Shared vertices stay put through surface smoothing; the edge
        // smoother decides their freedom on its own terms.
        for &v in &edge_vertices {
            store.vertex_mut(v)?.fix_all();
        }

        let chains = self.trace_chains(store, &edge_vertices)?;
        let chains = split_at_junctions(chains, &edge_vertices);

        for data in chains {
            let phases = data.phases.clone();
            let vertices = data.flat_vertices();
            let id = store.add_phase_edge(data);
            for &v in &vertices {
                store.vertex_mut(v)?.phase_edges.push(id);
            }
            for s in store.surface_ids() {
                // A chain bounds a surface only when the surface's phase
                // pair occurs in the chain's phase set AND the chain
                // actually runs along the surface; a same-pair interface
                // elsewhere in the grid shares no vertex with it.
                let surface = store.surface(s)?;
                let bounded = surface.phases.iter().all(|p| phases.contains(p))
                    && vertices.iter().all(|&v| surface.contains_vertex(v));
                if bounded {
                    store.surface_mut(s)?.phase_edges.push(id);
                }
            }
        }

        info!(
            phase_edges = store.phase_edges().count(),
            candidates = edge_vertices.len(),
            "tracing finished"
        );
        Ok(())
    }

    /// Walks candidate vertices along the grid axes and gathers confirmed
    /// segments into repaired chains, grouped by phase set.
    fn trace_chains(
        &self,
        store: &MeshStore,
        edge_vertices: &BTreeSet<VertexId>,
    ) -> Result<Vec<PhaseEdgeData>> {
        let spacing = self.source.spacing();
        let mut soups: BTreeMap<Vec<i32>, Vec<[VertexId; 2]>> = BTreeMap::new();

        for &v in edge_vertices {
            let position = store.vertex(v)?.position;
            for axis in 0..3 {
                let mut coordinate = position;
                coordinate[axis] += spacing[axis];
                let Some(neighbor) = store.find_vertex(&coordinate) else {
                    continue;
                };
                if !edge_vertices.contains(&neighbor) {
                    continue;
                }

                let mut midpoint = position;
                midpoint[axis] += spacing[axis] / 2.0;
                let phases = self.quadrant_phases(&midpoint, axis, &spacing);
                if phases.len() >= 3 {
                    debug!(?phases, "phase edge segment");
                    soups.entry(phases).or_default().push([v, neighbor]);
                }
            }
        }

        let mut chains = Vec::new();
        for (phases, segments) in soups {
            let mut soup = PhaseEdgeData::new(phases);
            soup.segments = segments;
            chains.extend(soup.sort_and_fix());
        }
        Ok(chains)
    }

    /// Distinct phases in the four voxel quadrants around a segment
    /// midpoint. Samples beyond the domain are dropped rather than counted
    /// as a phase of their own.
    fn quadrant_phases(&self, midpoint: &Point3, axis: usize, spacing: &Vector3) -> Vec<i32> {
        let [c1, c2] = CROSS_AXES[axis];
        let mut phases = BTreeSet::new();
        for s1 in [1.0, -1.0] {
            for s2 in [1.0, -1.0] {
                let mut probe = *midpoint;
                probe[c1] += s1 * spacing[c1] / 2.0;
                probe[c2] += s2 * spacing[c2] / 2.0;
                let material = self.source.material_by_coordinate(&probe);
                if !is_outside(material) {
                    phases.insert(material);
                }
            }
        }
        phases.into_iter().collect()
    }
}

/// Vertices lying on the intersection of two surfaces that share a phase.
///
/// Each surface records its own share of those in `fixed_vertices`.
fn collect_shared_vertices(store: &mut MeshStore) -> Result<BTreeSet<VertexId>> {
    let surface_ids = store.surface_ids();
    let mut all: BTreeSet<VertexId> = BTreeSet::new();

    for &s1 in &surface_ids {
        let mut shared: BTreeSet<VertexId> = BTreeSet::new();
        for &s2 in &surface_ids {
            if s1 == s2 {
                continue;
            }
            let first = store.surface(s1)?;
            let second = store.surface(s2)?;
            if first.shared_phase(second).is_none() {
                continue;
            }
            for &v in &first.vertices {
                if second.contains_vertex(v) {
                    shared.insert(v);
                }
            }
        }
        all.extend(shared.iter().copied());
        store.surface_mut(s1)?.fixed_vertices = shared.into_iter().collect();
    }
    Ok(all)
}

/// Splits chains so that a vertex appearing in more than one chain only
/// survives as a chain endpoint.
fn split_at_junctions(
    mut chains: Vec<PhaseEdgeData>,
    edge_vertices: &BTreeSet<VertexId>,
) -> Vec<PhaseEdgeData> {
    for &v in edge_vertices {
        let (hit, miss): (Vec<_>, Vec<_>) =
            chains.into_iter().partition(|pe| pe.contains_vertex(v));
        chains = miss;
        if hit.len() > 1 {
            for pe in hit {
                chains.extend(pe.split_at_vertex(v));
            }
        } else {
            chains.extend(hit);
        }
    }
    chains
}
