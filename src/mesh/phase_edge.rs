use std::collections::{BTreeMap, BTreeSet};

use super::VertexId;

slotmap::new_key_type! {
    /// Unique identifier for a phase edge in the mesh store.
    pub struct PhaseEdgeId;
}

/// A polyline where three or more phases meet.
///
/// Segments are vertex pairs along grid axes. Directly after tracing the
/// segment soup may be disconnected or forked; [`sort_and_fix`] splits it
/// into chains where every interior vertex has exactly two neighbors and at
/// most two vertices are endpoints. A repaired chain stores its segments in
/// walking order, so the vertex sequence can be read off directly.
///
/// [`sort_and_fix`]: PhaseEdgeData::sort_and_fix
#[derive(Debug, Clone)]
pub struct PhaseEdgeData {
    /// The phases meeting at this edge; sorted and deduplicated, len >= 3.
    pub phases: Vec<i32>,
    /// Chain segments. Ordered along the chain once repaired.
    pub segments: Vec<[VertexId; 2]>,
}

impl PhaseEdgeData {
    /// Creates an empty phase edge for a phase set.
    ///
    /// The phase list is sorted and deduplicated.
    #[must_use]
    pub fn new(mut phases: Vec<i32>) -> Self {
        phases.sort_unstable();
        phases.dedup();
        Self {
            phases,
            segments: Vec::new(),
        }
    }

    /// `true` if `phases` (sorted, deduplicated) equals this edge's phase set.
    #[must_use]
    pub fn same_phases(&self, phases: &[i32]) -> bool {
        self.phases == phases
    }

    /// `true` if any segment runs through `v`.
    #[must_use]
    pub fn contains_vertex(&self, v: VertexId) -> bool {
        self.segments.iter().any(|s| s.contains(&v))
    }

    /// All distinct vertices of the chain, sorted by id.
    #[must_use]
    pub fn flat_vertices(&self) -> Vec<VertexId> {
        let mut vertices: Vec<VertexId> =
            self.segments.iter().flat_map(|s| s.iter().copied()).collect();
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }

    /// The vertex sequence of a repaired chain.
    ///
    /// For a closed chain the first vertex is repeated at the end. Only
    /// meaningful after [`sort_and_fix`](Self::sort_and_fix).
    #[must_use]
    pub fn ordered_vertices(&self) -> Vec<VertexId> {
        let Some(first) = self.segments.first() else {
            return Vec::new();
        };
        let mut vertices = vec![first[0]];
        for segment in &self.segments {
            vertices.push(segment[1]);
        }
        vertices
    }

    /// `true` if the repaired chain closes on itself.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        let vertices = self.ordered_vertices();
        vertices.len() > 2 && vertices.first() == vertices.last()
    }

    /// Splits the raw segment soup into internally connected chains.
    ///
    /// Every vertex with a segment degree other than two becomes a chain
    /// endpoint; pure cycles survive as single closed chains. The result
    /// replaces `self`.
    #[must_use]
    pub fn sort_and_fix(&self) -> Vec<PhaseEdgeData> {
        let mut adjacency: BTreeMap<VertexId, Vec<VertexId>> = BTreeMap::new();
        for segment in &self.segments {
            adjacency.entry(segment[0]).or_default().push(segment[1]);
            adjacency.entry(segment[1]).or_default().push(segment[0]);
        }
        for neighbors in adjacency.values_mut() {
            neighbors.sort_unstable();
            neighbors.dedup();
        }

        let mut used: BTreeSet<(VertexId, VertexId)> = BTreeSet::new();
        let mut chains: Vec<Vec<VertexId>> = Vec::new();

        // Chains between break vertices (degree != 2).
        let break_vertices: Vec<VertexId> = adjacency
            .iter()
            .filter(|(_, n)| n.len() != 2)
            .map(|(v, _)| *v)
            .collect();
        for &start in &break_vertices {
            for next in adjacency[&start].clone() {
                if let Some(chain) = walk_chain(&adjacency, &mut used, start, next) {
                    chains.push(chain);
                }
            }
        }

        // Whatever remains consists of closed degree-2 loops.
        for (&start, neighbors) in &adjacency {
            for &next in neighbors {
                if let Some(chain) = walk_chain(&adjacency, &mut used, start, next) {
                    chains.push(chain);
                }
            }
        }

        chains
            .into_iter()
            .map(|chain| PhaseEdgeData {
                phases: self.phases.clone(),
                segments: chain.windows(2).map(|w| [w[0], w[1]]).collect(),
            })
            .collect()
    }

    /// Splits a repaired chain so that `v` survives only as an endpoint.
    ///
    /// An open chain is cut into two at an interior `v`; a closed chain is
    /// reopened at `v`. If `v` is already an endpoint (or absent), the chain
    /// is returned unchanged.
    #[must_use]
    pub fn split_at_vertex(&self, v: VertexId) -> Vec<PhaseEdgeData> {
        let vertices = self.ordered_vertices();
        if vertices.len() < 3 {
            return vec![self.clone()];
        }

        let closed = vertices.first() == vertices.last();
        let Some(pos) = vertices.iter().position(|&x| x == v) else {
            return vec![self.clone()];
        };

        if closed {
            if pos == 0 {
                return vec![self.clone()];
            }
            // Rotate the loop so v sits at both ends.
            let mut rotated: Vec<VertexId> = vertices[pos..vertices.len() - 1].to_vec();
            rotated.extend_from_slice(&vertices[..=pos]);
            return vec![self.from_ordered(&rotated)];
        }

        if pos == 0 || pos == vertices.len() - 1 {
            return vec![self.clone()];
        }
        vec![
            self.from_ordered(&vertices[..=pos]),
            self.from_ordered(&vertices[pos..]),
        ]
    }

    fn from_ordered(&self, vertices: &[VertexId]) -> PhaseEdgeData {
        PhaseEdgeData {
            phases: self.phases.clone(),
            segments: vertices.windows(2).map(|w| [w[0], w[1]]).collect(),
        }
    }
}

/// Walks from `start` toward `next` until a break vertex, a used segment,
/// or loop closure. Returns `None` when the first segment is already used.
fn walk_chain(
    adjacency: &BTreeMap<VertexId, Vec<VertexId>>,
    used: &mut BTreeSet<(VertexId, VertexId)>,
    start: VertexId,
    next: VertexId,
) -> Option<Vec<VertexId>> {
    if !used.insert(segment_key(start, next)) {
        return None;
    }
    let mut chain = vec![start, next];
    loop {
        let last = chain[chain.len() - 1];
        let prev = chain[chain.len() - 2];
        let neighbors = &adjacency[&last];
        if neighbors.len() != 2 {
            break;
        }
        let follow = if neighbors[0] == prev {
            neighbors[1]
        } else {
            neighbors[0]
        };
        if !used.insert(segment_key(last, follow)) {
            break;
        }
        chain.push(follow);
    }
    Some(chain)
}

fn segment_key(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
