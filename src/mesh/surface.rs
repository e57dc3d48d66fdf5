use super::{PhaseEdgeId, TriangleId, VertexId};

slotmap::new_key_type! {
    /// Unique identifier for a surface in the mesh store.
    pub struct SurfaceId;
}

/// A triangulated boundary between exactly two phases.
///
/// The vertex list is kept sorted and deduplicated by the edge tracer;
/// during extraction it may temporarily hold duplicates.
#[derive(Debug, Clone)]
pub struct SurfaceData {
    /// The two phases this surface separates, in no particular order.
    pub phases: [i32; 2],
    /// Member triangles.
    pub triangles: Vec<TriangleId>,
    /// Member vertices.
    pub vertices: Vec<VertexId>,
    /// Phase edges bounding this surface.
    pub phase_edges: Vec<PhaseEdgeId>,
    /// Vertices shared with another surface; frozen during surface smoothing.
    pub fixed_vertices: Vec<VertexId>,
}

impl SurfaceData {
    /// Creates an empty surface separating `a` and `b`.
    #[must_use]
    pub fn new(a: i32, b: i32) -> Self {
        Self {
            phases: [a, b],
            triangles: Vec::new(),
            vertices: Vec::new(),
            phase_edges: Vec::new(),
            fixed_vertices: Vec::new(),
        }
    }

    /// `true` if this surface separates exactly the unordered pair `(a, b)`.
    #[must_use]
    pub fn separates(&self, a: i32, b: i32) -> bool {
        (self.phases[0] == a && self.phases[1] == b)
            || (self.phases[0] == b && self.phases[1] == a)
    }

    /// `true` if one of the separated phases is `phase`.
    #[must_use]
    pub fn has_phase(&self, phase: i32) -> bool {
        self.phases.contains(&phase)
    }

    /// The phase shared with `other`, if any.
    #[must_use]
    pub fn shared_phase(&self, other: &SurfaceData) -> Option<i32> {
        self.phases
            .iter()
            .copied()
            .find(|p| other.phases.contains(p))
    }

    /// Sorts and deduplicates the vertex list.
    pub fn normalize_vertices(&mut self) {
        self.vertices.sort_unstable();
        self.vertices.dedup();
    }

    /// Binary search over the normalized vertex list.
    #[must_use]
    pub fn contains_vertex(&self, v: VertexId) -> bool {
        self.vertices.binary_search(&v).is_ok()
    }
}
