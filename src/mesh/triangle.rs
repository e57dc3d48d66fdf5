use super::{SurfaceId, VertexId};

slotmap::new_key_type! {
    /// Unique identifier for a triangle in the mesh store.
    pub struct TriangleId;
}

/// Data associated with a mesh triangle.
///
/// The vertex order defines the winding and thereby the outward unit
/// normal. `pos_phase` is the material found on the positive-normal side,
/// `neg_phase` the one on the other side; together they equal the owning
/// surface's phase pair. Local edits (flip, collapse) destroy and recreate
/// triangles rather than mutating them in place.
#[derive(Debug, Clone)]
pub struct TriangleData {
    /// Corner vertices in winding order.
    pub vertices: [VertexId; 3],
    /// The surface this triangle belongs to.
    pub surface: SurfaceId,
    /// Material id on the positive-normal side.
    pub pos_phase: i32,
    /// Material id on the negative-normal side.
    pub neg_phase: i32,
}

impl TriangleData {
    /// `true` if `v` is a corner of this triangle.
    #[must_use]
    pub fn has_vertex(&self, v: VertexId) -> bool {
        self.vertices.contains(&v)
    }

    /// Corner vertices with `from` substituted by `to`.
    #[must_use]
    pub fn substituted(&self, from: VertexId, to: VertexId) -> [VertexId; 3] {
        let mut vertices = self.vertices;
        for v in &mut vertices {
            if *v == from {
                *v = to;
            }
        }
        vertices
    }
}
