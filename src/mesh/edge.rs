use super::VertexId;

slotmap::new_key_type! {
    /// Unique identifier for an edge in the mesh store.
    pub struct EdgeId;
}

/// Data associated with a mesh edge.
///
/// The vertex pair is unordered. A transverse edge is the diagonal of an
/// extraction quad: an artifact of splitting a voxel face into two
/// triangles, excluded from smoothing stiffness.
#[derive(Debug, Clone)]
pub struct EdgeData {
    /// The two endpoints, in no particular order.
    pub vertices: [VertexId; 2],
    /// `true` for extraction-quad diagonals.
    pub transverse: bool,
}

impl EdgeData {
    /// Creates a non-transverse edge between two vertices.
    #[must_use]
    pub fn new(a: VertexId, b: VertexId) -> Self {
        Self {
            vertices: [a, b],
            transverse: false,
        }
    }

    /// `true` if `v` is one of the endpoints.
    #[must_use]
    pub fn touches(&self, v: VertexId) -> bool {
        self.vertices[0] == v || self.vertices[1] == v
    }

    /// The endpoint opposite `v`, or `None` if `v` is not on this edge.
    #[must_use]
    pub fn other_vertex(&self, v: VertexId) -> Option<VertexId> {
        if self.vertices[0] == v {
            Some(self.vertices[1])
        } else if self.vertices[1] == v {
            Some(self.vertices[0])
        } else {
            None
        }
    }
}
