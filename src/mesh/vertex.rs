use crate::math::Point3;

use super::{EdgeId, PhaseEdgeId, TriangleId};

slotmap::new_key_type! {
    /// Unique identifier for a vertex in the mesh store.
    pub struct VertexId;
}

/// Data associated with a mesh vertex.
///
/// The current position moves during smoothing; `original` keeps the
/// voxel-derived coordinate and anchors the smoothing springs. Incidence
/// lists are ids into the store, never references.
#[derive(Debug, Clone)]
pub struct VertexData {
    /// Current position.
    pub position: Point3,
    /// Voxel-derived position; immutable smoothing anchor.
    pub original: Point3,
    /// Per-axis constraint: `true` freezes the coordinate on that axis.
    pub fixed: [bool; 3],
    /// Triangles incident to this vertex.
    pub triangles: Vec<TriangleId>,
    /// Edges incident to this vertex.
    pub edges: Vec<EdgeId>,
    /// Phase edges whose chains run through this vertex.
    pub phase_edges: Vec<PhaseEdgeId>,
    /// Positional deviation accumulated by collapses merged into this vertex.
    pub collapse_error: f64,
}

impl VertexData {
    /// Creates a free vertex at `point`.
    #[must_use]
    pub fn new(point: Point3) -> Self {
        Self {
            position: point,
            original: point,
            fixed: [false; 3],
            triangles: Vec::new(),
            edges: Vec::new(),
            phase_edges: Vec::new(),
            collapse_error: 0.0,
        }
    }

    /// Freezes the vertex on all three axes.
    pub fn fix_all(&mut self) {
        self.fixed = [true; 3];
    }

    /// `true` if the vertex cannot move on any axis.
    #[must_use]
    pub fn is_fully_fixed(&self) -> bool {
        self.fixed.iter().all(|f| *f)
    }

    /// `true` if at least one axis is constrained.
    #[must_use]
    pub fn is_constrained(&self) -> bool {
        self.fixed.iter().any(|f| *f)
    }
}
