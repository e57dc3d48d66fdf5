use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::math::Vector3;
use crate::mesh::{MeshStore, VertexId};

use super::{boundary_flags, relax, Smoother, SpringNetwork, SpringParams};

/// Staged spring smoothing: phase-edge chains first, then each surface.
///
/// Chains are relaxed as one-dimensional networks with their endpoints
/// pinned, so the junction layout survives. Surfaces are relaxed afterwards
/// with every chain vertex frozen, which keeps the already-smoothed
/// boundaries authoritative.
pub struct SpringSmoother<'a> {
    config: &'a Config,
    spacing: Vector3,
}

impl<'a> SpringSmoother<'a> {
    /// Creates a staged smoother for a grid spacing.
    #[must_use]
    pub fn new(config: &'a Config, spacing: Vector3) -> Self {
        Self { config, spacing }
    }

    fn smooth_edges(&self, store: &mut MeshStore) -> Result<()> {
        info!("smoothing phase edges");
        let params = SpringParams {
            stiffness: self.config.edge_stiffness(&self.spacing),
            alpha: self.config.edge_spring_alpha,
        };

        for id in store.phase_edge_ids() {
            let chain = store.phase_edge(id)?.ordered_vertices();
            if chain.len() < 3 {
                continue;
            }
            let closed = chain.first() == chain.last();

            let vertices: Vec<VertexId> = if closed {
                chain[..chain.len() - 1].to_vec()
            } else {
                chain.clone()
            };
            let n = vertices.len();

            let mut fixed = Vec::with_capacity(n);
            let mut connections = Vec::with_capacity(n);
            for (i, &v) in vertices.iter().enumerate() {
                let position = store.vertex(v)?.position;
                if closed {
                    fixed.push(boundary_flags(store, &position));
                    connections.push(vec![vertices[(i + n - 1) % n], vertices[(i + 1) % n]]);
                } else if i == 0 || i == n - 1 {
                    // Chain endpoints are junctions or loose ends; both stay.
                    fixed.push([true; 3]);
                    connections.push(Vec::new());
                } else {
                    fixed.push(boundary_flags(store, &position));
                    connections.push(vec![vertices[i - 1], vertices[i + 1]]);
                }
            }

            relax(
                store,
                &SpringNetwork {
                    vertices,
                    fixed,
                    params: vec![params; n],
                    connections,
                },
            )?;
        }
        Ok(())
    }

    fn smooth_surfaces(&self, store: &mut MeshStore) -> Result<()> {
        info!("smoothing surfaces");
        let params = SpringParams {
            stiffness: self.config.surface_stiffness(&self.spacing),
            alpha: self.config.spring_alpha,
        };

        for id in store.surface_ids() {
            let surface = store.surface(id)?.clone();
            let n = surface.vertices.len();

            let mut fixed = Vec::with_capacity(n);
            let mut connections = Vec::with_capacity(n);
            for &v in &surface.vertices {
                let data = store.vertex(v)?;
                let pinned = !data.phase_edges.is_empty()
                    || surface.fixed_vertices.binary_search(&v).is_ok();
                fixed.push(if pinned { [true; 3] } else { data.fixed });
                connections.push(
                    store
                        .spring_neighbors(v)?
                        .into_iter()
                        .filter(|&w| surface.contains_vertex(w))
                        .collect(),
                );
            }

            relax(
                store,
                &SpringNetwork {
                    vertices: surface.vertices,
                    fixed,
                    params: vec![params; n],
                    connections,
                },
            )?;
        }
        Ok(())
    }
}

impl Smoother for SpringSmoother<'_> {
    fn execute(&self, store: &mut MeshStore) -> Result<()> {
        self.smooth_edges(store)?;
        self.smooth_surfaces(store)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::extract::{ExtractSurfaces, TraceEdges};
    use crate::math::Point3;
    use crate::voxel::{ArrayVoxelSource, VoxelSource};

    use super::*;

    fn prepared_store(source: &ArrayVoxelSource, config: &Config) -> MeshStore {
        let mut store = MeshStore::new(
            source.bounding_box(),
            source.spacing(),
            source.spacing().min() * 1e-7,
        );
        ExtractSurfaces::new(source, config)
            .execute(&mut store)
            .unwrap();
        TraceEdges::new(source).execute(&mut store).unwrap();
        store
    }

    fn embedded_voxel() -> ArrayVoxelSource {
        ArrayVoxelSource::from_fn(
            [3, 3, 3],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            |i, j, k| if (i, j, k) == (1, 1, 1) { 2 } else { 1 },
        )
        .unwrap()
    }

    #[test]
    fn embedded_voxel_shrinks_but_survives() {
        let source = embedded_voxel();
        let config = Config::default();
        let mut store = prepared_store(&source, &config);

        let volume = store
            .volume_ids()
            .into_iter()
            .find(|&v| store.volume(v).unwrap().phase == 2)
            .unwrap();
        let before = store.enclosed_volume(volume).unwrap();

        SpringSmoother::new(&config, source.spacing())
            .execute(&mut store)
            .unwrap();

        let after = store.enclosed_volume(volume).unwrap();
        assert!(after < before);
        assert!(after > 0.0);

        // The cube corner moved inward along the diagonal.
        let corner = store.find_vertex(&Point3::new(1.0, 1.0, 1.0)).unwrap();
        let moved = store.vertex(corner).unwrap().position;
        assert!(moved.x > 1.0 && moved.y > 1.0 && moved.z > 1.0);
        assert!(moved.x < 1.5);
    }

    #[test]
    fn symmetric_slab_is_a_fixed_point() {
        let source = ArrayVoxelSource::from_fn(
            [2, 2, 2],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            |i, _, _| if i == 0 { 1 } else { 2 },
        )
        .unwrap();
        let config = Config::default();
        let mut store = prepared_store(&source, &config);

        let before: Vec<_> = store
            .vertex_ids()
            .into_iter()
            .map(|v| store.vertex(v).unwrap().position)
            .collect();

        SpringSmoother::new(&config, source.spacing())
            .execute(&mut store)
            .unwrap();

        for (v, old) in store.vertex_ids().into_iter().zip(before) {
            let new = store.vertex(v).unwrap().position;
            assert!((new - old).norm() < 1e-6, "vertex drifted: {old} -> {new}");
        }
    }

    #[test]
    fn hull_constraints_survive_smoothing() {
        let source = embedded_voxel();
        let config = Config::default();
        let mut store = prepared_store(&source, &config);

        SpringSmoother::new(&config, source.spacing())
            .execute(&mut store)
            .unwrap();

        let domain = *store.domain();
        for v in store.vertex_ids() {
            let data = store.vertex(v).unwrap();
            for a in 0..3 {
                if data.fixed[a] {
                    let c = data.position[a];
                    assert!(
                        (c - domain.min[a]).abs() < 1e-9 || (c - domain.max[a]).abs() < 1e-9
                    );
                }
            }
        }
    }
}
