use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::math::Vector3;
use crate::mesh::MeshStore;

use super::{boundary_flags, relax, Smoother, SpringNetwork, SpringParams};

/// Simultaneous smoothing of edges and surfaces in one relaxation.
///
/// Instead of freezing chain and shared vertices while the surfaces relax,
/// every vertex participates at once; constrained vertices are anchored by
/// a much stiffer pull-back spring, so they concede almost nothing while
/// still letting their neighborhoods equilibrate against them. Hull-axis
/// constraints remain hard.
pub struct PenaltySmoother<'a> {
    config: &'a Config,
    spacing: Vector3,
}

impl<'a> PenaltySmoother<'a> {
    /// Creates a simultaneous smoother for a grid spacing.
    #[must_use]
    pub fn new(config: &'a Config, spacing: Vector3) -> Self {
        Self { config, spacing }
    }
}

impl Smoother for PenaltySmoother<'_> {
    fn execute(&self, store: &mut MeshStore) -> Result<()> {
        info!("smoothing with penalty anchors");
        let surface_params = SpringParams {
            stiffness: self.config.surface_stiffness(&self.spacing),
            alpha: self.config.spring_alpha,
        };
        let edge_params = SpringParams {
            stiffness: self.config.edge_stiffness(&self.spacing),
            alpha: self.config.edge_spring_alpha,
        };

        let vertices = store.vertex_ids();
        let n = vertices.len();
        let mut fixed = Vec::with_capacity(n);
        let mut params = Vec::with_capacity(n);
        let mut connections = Vec::with_capacity(n);

        for &v in &vertices {
            let data = store.vertex(v)?;
            let on_edge = !data.phase_edges.is_empty();
            let base = if on_edge { edge_params } else { surface_params };

            if on_edge || data.is_fully_fixed() {
                // Penalty anchor: a spring this stiff admits only a
                // vanishing displacement, replacing the hard freeze.
                fixed.push(boundary_flags(store, &data.position));
                params.push(SpringParams {
                    stiffness: base.stiffness / self.config.penalty_stiffness_factor,
                    alpha: base.alpha,
                });
            } else {
                fixed.push(data.fixed);
                params.push(base);
            }
            connections.push(store.spring_neighbors(v)?);
        }

        relax(
            store,
            &SpringNetwork {
                vertices,
                fixed,
                params,
                connections,
            },
        )
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

    #[test]
    fn anchored_vertices_barely_move() {
        let source = ArrayVoxelSource::from_fn(
            [2, 2, 2],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            |i, _, _| if i == 0 { 1 } else { 2 },
        )
        .unwrap();
        let config = Config::default();
        let mut store = prepared_store(&source, &config);

        // A shared vertex on the interface ring.
        let ring = store.find_vertex(&Point3::new(1.0, 0.0, 1.0)).unwrap();
        assert!(store.vertex(ring).unwrap().is_fully_fixed());
        let before = store.vertex(ring).unwrap().position;

        PenaltySmoother::new(&config, source.spacing())
            .execute(&mut store)
            .unwrap();

        let after = store.vertex(ring).unwrap().position;
        assert!((after - before).norm() < 1e-3);
        // The hull axis stays exact.
        assert!((after.y - 0.0).abs() < 1e-12);
    }

    #[test]
    fn free_vertices_still_relax() {
        let source = ArrayVoxelSource::from_fn(
            [3, 3, 3],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            |i, j, k| if (i, j, k) == (1, 1, 1) { 2 } else { 1 },
        )
        .unwrap();
        let config = Config {
            smooth_penalty: true,
            ..Config::default()
        };
        let mut store = prepared_store(&source, &config);

        PenaltySmoother::new(&config, source.spacing())
            .execute(&mut store)
            .unwrap();

        let corner = store.find_vertex(&Point3::new(1.0, 1.0, 1.0)).unwrap();
        let moved = store.vertex(corner).unwrap().position;
        assert!(moved.x > 1.0 && moved.y > 1.0 && moved.z > 1.0);
    }
}
