pub mod edge;
pub mod index;
pub mod phase_edge;
pub mod surface;
pub mod triangle;
pub mod vertex;
pub mod volume;

pub use edge::{EdgeData, EdgeId};
pub use index::VertexIndex;
pub use phase_edge::{PhaseEdgeData, PhaseEdgeId};
pub use surface::{SurfaceData, SurfaceId};
pub use triangle::{TriangleData, TriangleId};
pub use vertex::{VertexData, VertexId};
pub use volume::{VolumeData, VolumeId};

use slotmap::SlotMap;

use crate::error::{Result, TopologyError};
use crate::math::{triangle_3d, Point3, Vector3};
use crate::voxel::BoundingBox;

/// Central arena that owns all mesh entities.
///
/// Entities reference each other via typed ids (generational indices),
/// avoiding self-referential structures and enabling safe mutation during
/// flip and collapse rewrites. The store also owns the spatial vertex
/// index, which keeps vertex insertion idempotent during extraction.
#[derive(Debug)]
pub struct MeshStore {
    vertices: SlotMap<VertexId, VertexData>,
    edges: SlotMap<EdgeId, EdgeData>,
    triangles: SlotMap<TriangleId, TriangleData>,
    surfaces: SlotMap<SurfaceId, SurfaceData>,
    phase_edges: SlotMap<PhaseEdgeId, PhaseEdgeData>,
    volumes: SlotMap<VolumeId, VolumeData>,
    index: VertexIndex,
    domain: BoundingBox,
}

impl MeshStore {
    /// Creates an empty store for a voxel domain.
    ///
    /// The spatial index covers `domain` grown by `margin` on every side,
    /// so smoothed coordinates near the hull stay indexable.
    #[must_use]
    pub fn new(domain: BoundingBox, margin: Vector3, index_tolerance: f64) -> Self {
        Self {
            vertices: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            triangles: SlotMap::with_key(),
            surfaces: SlotMap::with_key(),
            phase_edges: SlotMap::with_key(),
            volumes: SlotMap::with_key(),
            index: VertexIndex::new(domain.expanded(&margin), index_tolerance),
            domain,
        }
    }

    /// Tight physical bounds of the voxel domain.
    #[must_use]
    pub fn domain(&self) -> &BoundingBox {
        &self.domain
    }

    // --- Vertex operations ---

    /// Returns the vertex at `point`, creating it if none is registered
    /// within the index tolerance. Inserts are idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if `point` lies outside the index bounds.
    pub fn add_unique_vertex(&mut self, point: Point3) -> Result<VertexId> {
        if let Some(id) = self.index.find(&point) {
            return Ok(id);
        }
        let id = self.vertices.insert(VertexData::new(point));
        self.index.insert(point, id)?;
        Ok(id)
    }

    /// The vertex registered within tolerance of `point`, if any.
    #[must_use]
    pub fn find_vertex(&self, point: &Point3) -> Option<VertexId> {
        self.index.find(point)
    }

    /// Returns a reference to the vertex data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn vertex(&self, id: VertexId) -> Result<&VertexData> {
        Ok(self
            .vertices
            .get(id)
            .ok_or(TopologyError::EntityNotFound("vertex"))?)
    }

    /// Returns a mutable reference to the vertex data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn vertex_mut(&mut self, id: VertexId) -> Result<&mut VertexData> {
        Ok(self
            .vertices
            .get_mut(id)
            .ok_or(TopologyError::EntityNotFound("vertex"))?)
    }

    /// Removes a vertex that no longer belongs to any triangle or edge.
    ///
    /// Also drops it from the spatial index and from every surface's
    /// membership lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex does not exist or still has incident
    /// triangles or edges.
    pub fn purge_vertex(&mut self, id: VertexId) -> Result<()> {
        let data = self.vertex(id)?;
        if !data.triangles.is_empty() || !data.edges.is_empty() {
            return Err(TopologyError::InvalidTopology(
                "cannot purge a vertex with incident entities".into(),
            )
            .into());
        }
        let original = data.original;
        self.index.remove(&original);
        self.vertices.remove(id);
        for surface in self.surfaces.values_mut() {
            surface.vertices.retain(|&v| v != id);
            surface.fixed_vertices.retain(|&v| v != id);
        }
        Ok(())
    }

    // --- Edge operations ---

    /// Returns a reference to the edge data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn edge(&self, id: EdgeId) -> Result<&EdgeData> {
        Ok(self
            .edges
            .get(id)
            .ok_or(TopologyError::EntityNotFound("edge"))?)
    }

    /// Returns a mutable reference to the edge data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn edge_mut(&mut self, id: EdgeId) -> Result<&mut EdgeData> {
        Ok(self
            .edges
            .get_mut(id)
            .ok_or(TopologyError::EntityNotFound("edge"))?)
    }

    /// `true` if the edge still exists. Sweeps over snapshotted id lists
    /// use this to skip edges consumed by an earlier rewrite.
    #[must_use]
    pub fn has_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(id)
    }

    /// The edge between `a` and `b`, if one exists.
    #[must_use]
    pub fn find_edge(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        let data = self.vertices.get(a)?;
        data.edges
            .iter()
            .copied()
            .find(|&e| self.edges.get(e).is_some_and(|edge| edge.touches(b)))
    }

    /// Current length of an edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge or one of its endpoints is missing.
    pub fn edge_length(&self, id: EdgeId) -> Result<f64> {
        let [a, b] = self.edge(id)?.vertices;
        Ok((self.vertex(a)?.position - self.vertex(b)?.position).norm())
    }

    /// Triangles incident to an edge (sharing both endpoints), sorted by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge or one of its endpoints is missing.
    pub fn edge_triangles(&self, id: EdgeId) -> Result<Vec<TriangleId>> {
        let [a, b] = self.edge(id)?.vertices;
        let other = &self.vertex(b)?.triangles;
        let mut shared: Vec<TriangleId> = self
            .vertex(a)?
            .triangles
            .iter()
            .copied()
            .filter(|t| other.contains(t))
            .collect();
        shared.sort_unstable();
        Ok(shared)
    }

    // --- Triangle operations ---

    /// Returns a reference to the triangle data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn triangle(&self, id: TriangleId) -> Result<&TriangleData> {
        Ok(self
            .triangles
            .get(id)
            .ok_or(TopologyError::EntityNotFound("triangle"))?)
    }

    /// `true` if the triangle still exists.
    #[must_use]
    pub fn has_triangle(&self, id: TriangleId) -> bool {
        self.triangles.contains_key(id)
    }

    /// Creates a triangle, wiring up edges and incidence lists.
    ///
    /// Edges between the corner pairs are created on demand; existing edges
    /// (including transverse ones) are reused.
    ///
    /// # Errors
    ///
    /// Returns an error if a corner vertex or the surface is missing.
    pub fn add_triangle(
        &mut self,
        vertices: [VertexId; 3],
        surface: SurfaceId,
        pos_phase: i32,
        neg_phase: i32,
    ) -> Result<TriangleId> {
        for v in vertices {
            self.vertex(v)?;
        }
        let id = self.triangles.insert(TriangleData {
            vertices,
            surface,
            pos_phase,
            neg_phase,
        });
        for v in vertices {
            self.vertex_mut(v)?.triangles.push(id);
        }
        for (a, b) in [
            (vertices[0], vertices[1]),
            (vertices[1], vertices[2]),
            (vertices[2], vertices[0]),
        ] {
            if self.find_edge(a, b).is_none() {
                let edge = self.edges.insert(EdgeData::new(a, b));
                self.vertex_mut(a)?.edges.push(edge);
                self.vertex_mut(b)?.edges.push(edge);
            }
        }
        self.surface_mut(surface)?.triangles.push(id);
        Ok(id)
    }

    /// Removes a triangle, detaching incidence lists and dropping edges
    /// that lose their last triangle.
    ///
    /// # Errors
    ///
    /// Returns an error if the triangle is missing.
    pub fn remove_triangle(&mut self, id: TriangleId) -> Result<TriangleData> {
        let data = self.triangle(id)?.clone();
        for v in data.vertices {
            self.vertex_mut(v)?.triangles.retain(|&t| t != id);
        }
        self.surface_mut(data.surface)?.triangles.retain(|&t| t != id);
        self.triangles.remove(id);

        for (a, b) in [
            (data.vertices[0], data.vertices[1]),
            (data.vertices[1], data.vertices[2]),
            (data.vertices[2], data.vertices[0]),
        ] {
            if let Some(edge) = self.find_edge(a, b) {
                if self.edge_triangles(edge)?.is_empty() {
                    self.vertex_mut(a)?.edges.retain(|&e| e != edge);
                    self.vertex_mut(b)?.edges.retain(|&e| e != edge);
                    self.edges.remove(edge);
                }
            }
        }
        Ok(data)
    }

    /// Current corner positions of a triangle.
    ///
    /// # Errors
    ///
    /// Returns an error if the triangle or a corner vertex is missing.
    pub fn triangle_points(&self, id: TriangleId) -> Result<[Point3; 3]> {
        let vertices = self.triangle(id)?.vertices;
        Ok([
            self.vertex(vertices[0])?.position,
            self.vertex(vertices[1])?.position,
            self.vertex(vertices[2])?.position,
        ])
    }

    /// Unit normal of a triangle following its winding, or `None` when
    /// degenerate.
    ///
    /// # Errors
    ///
    /// Returns an error if the triangle or a corner vertex is missing.
    pub fn triangle_normal(&self, id: TriangleId) -> Result<Option<Vector3>> {
        let [a, b, c] = self.triangle_points(id)?;
        Ok(triangle_3d::triangle_normal(&a, &b, &c))
    }

    /// Current area of a triangle.
    ///
    /// # Errors
    ///
    /// Returns an error if the triangle or a corner vertex is missing.
    pub fn triangle_area(&self, id: TriangleId) -> Result<f64> {
        let [a, b, c] = self.triangle_points(id)?;
        Ok(triangle_3d::triangle_area(&a, &b, &c))
    }

    /// Signed volume of the tetrahedron spanned by the triangle and the
    /// coordinate origin, following the triangle's winding.
    ///
    /// # Errors
    ///
    /// Returns an error if the triangle or a corner vertex is missing.
    pub fn triangle_signed_volume(&self, id: TriangleId) -> Result<f64> {
        let [a, b, c] = self.triangle_points(id)?;
        Ok(a.coords.dot(&b.coords.cross(&c.coords)) / 6.0)
    }

    // --- Surface operations ---

    /// Inserts a surface and returns its id.
    pub fn add_surface(&mut self, data: SurfaceData) -> SurfaceId {
        self.surfaces.insert(data)
    }

    /// Returns a reference to the surface data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn surface(&self, id: SurfaceId) -> Result<&SurfaceData> {
        Ok(self
            .surfaces
            .get(id)
            .ok_or(TopologyError::EntityNotFound("surface"))?)
    }

    /// Returns a mutable reference to the surface data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn surface_mut(&mut self, id: SurfaceId) -> Result<&mut SurfaceData> {
        Ok(self
            .surfaces
            .get_mut(id)
            .ok_or(TopologyError::EntityNotFound("surface"))?)
    }

    /// The surface separating the unordered pair `(a, b)`, if it exists.
    #[must_use]
    pub fn find_surface(&self, a: i32, b: i32) -> Option<SurfaceId> {
        self.surfaces
            .iter()
            .find(|(_, s)| s.separates(a, b))
            .map(|(id, _)| id)
    }

    // --- Phase edge operations ---

    /// Inserts a phase edge and returns its id.
    pub fn add_phase_edge(&mut self, data: PhaseEdgeData) -> PhaseEdgeId {
        self.phase_edges.insert(data)
    }

    /// Returns a reference to the phase edge data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn phase_edge(&self, id: PhaseEdgeId) -> Result<&PhaseEdgeData> {
        Ok(self
            .phase_edges
            .get(id)
            .ok_or(TopologyError::EntityNotFound("phase edge"))?)
    }

    /// Returns a mutable reference to the phase edge data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn phase_edge_mut(&mut self, id: PhaseEdgeId) -> Result<&mut PhaseEdgeData> {
        Ok(self
            .phase_edges
            .get_mut(id)
            .ok_or(TopologyError::EntityNotFound("phase edge"))?)
    }

    /// Removes a phase edge, returning its data.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn remove_phase_edge(&mut self, id: PhaseEdgeId) -> Result<PhaseEdgeData> {
        Ok(self
            .phase_edges
            .remove(id)
            .ok_or(TopologyError::EntityNotFound("phase edge"))?)
    }

    // --- Volume operations ---

    /// Inserts a volume and returns its id.
    pub fn add_volume(&mut self, data: VolumeData) -> VolumeId {
        self.volumes.insert(data)
    }

    /// Returns a reference to the volume data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn volume(&self, id: VolumeId) -> Result<&VolumeData> {
        Ok(self
            .volumes
            .get(id)
            .ok_or(TopologyError::EntityNotFound("volume"))?)
    }

    // --- Iteration ---

    /// Iterates over all vertices.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &VertexData)> {
        self.vertices.iter()
    }

    /// Iterates over all edges.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &EdgeData)> {
        self.edges.iter()
    }

    /// Iterates over all triangles.
    pub fn triangles(&self) -> impl Iterator<Item = (TriangleId, &TriangleData)> {
        self.triangles.iter()
    }

    /// Iterates over all surfaces.
    pub fn surfaces(&self) -> impl Iterator<Item = (SurfaceId, &SurfaceData)> {
        self.surfaces.iter()
    }

    /// Iterates over all phase edges.
    pub fn phase_edges(&self) -> impl Iterator<Item = (PhaseEdgeId, &PhaseEdgeData)> {
        self.phase_edges.iter()
    }

    /// Iterates over all volumes.
    pub fn volumes(&self) -> impl Iterator<Item = (VolumeId, &VolumeData)> {
        self.volumes.iter()
    }

    /// All vertex ids, sorted. Passes iterate this for reproducibility.
    #[must_use]
    pub fn vertex_ids(&self) -> Vec<VertexId> {
        let mut ids: Vec<_> = self.vertices.keys().collect();
        ids.sort_unstable();
        ids
    }

    /// All edge ids, sorted.
    #[must_use]
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        let mut ids: Vec<_> = self.edges.keys().collect();
        ids.sort_unstable();
        ids
    }

    /// All triangle ids, sorted.
    #[must_use]
    pub fn triangle_ids(&self) -> Vec<TriangleId> {
        let mut ids: Vec<_> = self.triangles.keys().collect();
        ids.sort_unstable();
        ids
    }

    /// All surface ids, sorted.
    #[must_use]
    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<_> = self.surfaces.keys().collect();
        ids.sort_unstable();
        ids
    }

    /// All phase edge ids, sorted.
    #[must_use]
    pub fn phase_edge_ids(&self) -> Vec<PhaseEdgeId> {
        let mut ids: Vec<_> = self.phase_edges.keys().collect();
        ids.sort_unstable();
        ids
    }

    /// All volume ids, sorted.
    #[must_use]
    pub fn volume_ids(&self) -> Vec<VolumeId> {
        let mut ids: Vec<_> = self.volumes.keys().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of live triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    // --- Adjacency ---

    /// Topological neighbors of `v` through all incident edges, sorted.
    ///
    /// Includes neighbors reached only through transverse edges, so
    /// connectivity checks see the full one-ring.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex or an incident edge is missing.
    pub fn edge_neighbors(&self, v: VertexId) -> Result<Vec<VertexId>> {
        let mut neighbors = Vec::new();
        for &e in &self.vertex(v)?.edges {
            if let Some(other) = self.edge(e)?.other_vertex(v) {
                neighbors.push(other);
            }
        }
        neighbors.sort_unstable();
        neighbors.dedup();
        Ok(neighbors)
    }

    /// Topological neighbors of `v` through non-transverse edges, sorted.
    ///
    /// Transverse edges are extraction artifacts and carry no spring
    /// stiffness.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex or an incident edge is missing.
    pub fn spring_neighbors(&self, v: VertexId) -> Result<Vec<VertexId>> {
        let mut neighbors = Vec::new();
        for &e in &self.vertex(v)?.edges {
            let edge = self.edge(e)?;
            if edge.transverse {
                continue;
            }
            if let Some(other) = edge.other_vertex(v) {
                neighbors.push(other);
            }
        }
        neighbors.sort_unstable();
        neighbors.dedup();
        Ok(neighbors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn test_store() -> MeshStore {
        let domain = BoundingBox::new(p(0.0, 0.0, 0.0), p(10.0, 10.0, 10.0));
        MeshStore::new(domain, Vector3::new(1.0, 1.0, 1.0), 1e-7)
    }

    #[test]
    fn unique_vertex_insert_is_idempotent() {
        let mut store = test_store();
        let a = store.add_unique_vertex(p(1.0, 2.0, 3.0)).unwrap();
        let b = store.add_unique_vertex(p(1.0, 2.0, 3.0)).unwrap();
        let c = store.add_unique_vertex(p(1.0, 2.0, 3.5)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.vertex_count(), 2);
    }

    #[test]
    fn add_triangle_wires_edges_and_incidence() {
        let mut store = test_store();
        let a = store.add_unique_vertex(p(0.0, 0.0, 0.0)).unwrap();
        let b = store.add_unique_vertex(p(1.0, 0.0, 0.0)).unwrap();
        let c = store.add_unique_vertex(p(0.0, 1.0, 0.0)).unwrap();
        let surface = store.add_surface(SurfaceData::new(1, 2));

        let t = store.add_triangle([a, b, c], surface, 1, 2).unwrap();

        assert_eq!(store.vertex(a).unwrap().triangles, vec![t]);
        assert_eq!(store.vertex(a).unwrap().edges.len(), 2);
        assert!(store.find_edge(a, b).is_some());
        assert!(store.find_edge(b, c).is_some());
        assert!(store.find_edge(c, a).is_some());
        assert_eq!(store.surface(surface).unwrap().triangles, vec![t]);
    }

    #[test]
    fn shared_edge_is_reused_between_triangles() {
        let mut store = test_store();
        let a = store.add_unique_vertex(p(0.0, 0.0, 0.0)).unwrap();
        let b = store.add_unique_vertex(p(1.0, 0.0, 0.0)).unwrap();
        let c = store.add_unique_vertex(p(0.0, 1.0, 0.0)).unwrap();
        let d = store.add_unique_vertex(p(1.0, 1.0, 0.0)).unwrap();
        let surface = store.add_surface(SurfaceData::new(1, 2));

        let t0 = store.add_triangle([a, b, c], surface, 1, 2).unwrap();
        let t1 = store.add_triangle([b, d, c], surface, 1, 2).unwrap();

        let diagonal = store.find_edge(b, c).unwrap();
        assert_eq!(store.edge_triangles(diagonal).unwrap(), vec![t0, t1]);
        // 4 vertices, 5 edges for two triangles sharing one edge.
        assert_eq!(store.edges().count(), 5);
    }

    #[test]
    fn remove_triangle_cleans_up_orphan_edges() {
        let mut store = test_store();
        let a = store.add_unique_vertex(p(0.0, 0.0, 0.0)).unwrap();
        let b = store.add_unique_vertex(p(1.0, 0.0, 0.0)).unwrap();
        let c = store.add_unique_vertex(p(0.0, 1.0, 0.0)).unwrap();
        let d = store.add_unique_vertex(p(1.0, 1.0, 0.0)).unwrap();
        let surface = store.add_surface(SurfaceData::new(1, 2));

        let t0 = store.add_triangle([a, b, c], surface, 1, 2).unwrap();
        let t1 = store.add_triangle([b, d, c], surface, 1, 2).unwrap();

        store.remove_triangle(t1).unwrap();

        // Shared edge survives, t1's private edges are gone.
        assert!(store.find_edge(b, c).is_some());
        assert!(store.find_edge(b, d).is_none());
        assert!(store.find_edge(d, c).is_none());
        assert_eq!(store.surface(surface).unwrap().triangles, vec![t0]);
        assert!(store.vertex(d).unwrap().edges.is_empty());
    }

    #[test]
    fn purge_vertex_requires_detached_vertex() {
        let mut store = test_store();
        let a = store.add_unique_vertex(p(0.0, 0.0, 0.0)).unwrap();
        let b = store.add_unique_vertex(p(1.0, 0.0, 0.0)).unwrap();
        let c = store.add_unique_vertex(p(0.0, 1.0, 0.0)).unwrap();
        let surface = store.add_surface(SurfaceData::new(1, 2));
        let t = store.add_triangle([a, b, c], surface, 1, 2).unwrap();

        assert!(store.purge_vertex(a).is_err());

        store.remove_triangle(t).unwrap();
        store.purge_vertex(a).unwrap();
        assert_eq!(store.vertex_count(), 2);
        assert!(store.find_vertex(&p(0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn spring_neighbors_skip_transverse_edges() {
        let mut store = test_store();
        let a = store.add_unique_vertex(p(0.0, 0.0, 0.0)).unwrap();
        let b = store.add_unique_vertex(p(1.0, 0.0, 0.0)).unwrap();
        let c = store.add_unique_vertex(p(0.0, 1.0, 0.0)).unwrap();
        let surface = store.add_surface(SurfaceData::new(1, 2));
        store.add_triangle([a, b, c], surface, 1, 2).unwrap();

        let diagonal = store.find_edge(b, c).unwrap();
        store.edge_mut(diagonal).unwrap().transverse = true;

        let neighbors = store.spring_neighbors(b).unwrap();
        assert_eq!(neighbors, vec![a]);
    }
}
