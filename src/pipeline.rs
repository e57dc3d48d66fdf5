use tracing::info;

use crate::config::Config;
use crate::error::{Result, VoxelError};
use crate::extract::{ExtractSurfaces, TraceEdges};
use crate::mesh::MeshStore;
use crate::quality::{Coarsen, FlipAll, ResolveIntersections};
use crate::smooth::{PenaltySmoother, Smoother, SpringSmoother};
use crate::voxel::VoxelSource;

/// The full voxel-to-surface-mesh pipeline.
///
/// Stages run strictly in sequence over one exclusively owned mesh store:
/// surface extraction, phase-edge tracing, smoothing, edge flipping,
/// coarsening interleaved with further flips, and intersection resolution.
/// Given the same source and configuration the result is reproducible;
/// every stage iterates its candidates in a fixed order.
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Creates a pipeline with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Converts a voxel source into a smoothed, coarsened surface mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the source reports an empty grid or a
    /// non-positive spacing, or if an internal store lookup fails.
    pub fn run<S: VoxelSource>(&self, source: &S) -> Result<MeshStore> {
        let dimensions = source.dimensions();
        if dimensions.contains(&0) {
            return Err(
                VoxelError::EmptyGrid(dimensions[0], dimensions[1], dimensions[2]).into(),
            );
        }
        let spacing = source.spacing();
        if spacing.min() <= 0.0 {
            return Err(VoxelError::InvalidSpacing.into());
        }
        info!(?dimensions, "pipeline started");

        let mut store = MeshStore::new(
            source.bounding_box(),
            spacing,
            spacing.min() * 1e-6,
        );

        ExtractSurfaces::new(source, &self.config).execute(&mut store)?;
        TraceEdges::new(source).execute(&mut store)?;

        if self.config.smooth_penalty {
            PenaltySmoother::new(&self.config, spacing).execute(&mut store)?;
        } else {
            SpringSmoother::new(&self.config, spacing).execute(&mut store)?;
        }

        let flip = FlipAll::new(&self.config, spacing);
        flip.execute(&mut store)?;
        if !self.config.no_coarsening {
            let coarsen = Coarsen::new(&self.config, spacing);
            loop {
                if coarsen.execute(&mut store)? == 0 {
                    break;
                }
                flip.execute(&mut store)?;
            }
        }

        ResolveIntersections.execute(&mut store)?;

        info!(
            vertices = store.vertex_count(),
            triangles = store.triangle_count(),
            "pipeline finished"
        );
        Ok(store)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::math::{Point3, Vector3};
    use crate::mesh::VolumeId;
    use crate::voxel::ArrayVoxelSource;

    use super::*;

    /// Routes stage logs through the test harness. Override the level with
    /// `RUST_LOG` (e.g. `RUST_LOG=voxtet=debug cargo test`).
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn unit_spacing() -> Vector3 {
        Vector3::new(1.0, 1.0, 1.0)
    }

    fn volume_of_phase(store: &MeshStore, phase: i32) -> VolumeId {
        store
            .volume_ids()
            .into_iter()
            .find(|&v| store.volume(v).unwrap().phase == phase)
            .unwrap()
    }

    #[test]
    fn two_phase_slab_end_to_end() {
        init_tracing();
        let source = ArrayVoxelSource::from_fn(
            [2, 2, 2],
            unit_spacing(),
            Point3::origin(),
            |i, _, _| if i == 0 { 1 } else { 2 },
        )
        .unwrap();

        let store = Pipeline::new(Config::default()).run(&source).unwrap();

        // One interior surface with two triangles per separating face, and
        // no three-phase junction anywhere.
        let interior = store.find_surface(1, 2).unwrap();
        assert_eq!(store.surface(interior).unwrap().triangles.len(), 8);
        assert_eq!(store.phase_edges().count(), 0);

        // The symmetric slab is a smoothing fixed point and too coarse to
        // simplify further; the phase volumes stay exact.
        let v1 = store
            .enclosed_volume(volume_of_phase(&store, 1))
            .unwrap();
        let v2 = store
            .enclosed_volume(volume_of_phase(&store, 2))
            .unwrap();
        assert!((v1 - 4.0).abs() < 1e-9, "phase 1 volume {v1}");
        assert!((v2 - 4.0).abs() < 1e-9, "phase 2 volume {v2}");
    }

    #[test]
    fn embedded_voxel_survives_the_pipeline() {
        let source = ArrayVoxelSource::from_fn(
            [3, 3, 3],
            unit_spacing(),
            Point3::origin(),
            |i, j, k| if (i, j, k) == (1, 1, 1) { 2 } else { 1 },
        )
        .unwrap();

        let store = Pipeline::new(Config::default()).run(&source).unwrap();

        let interior = store.find_surface(1, 2).unwrap();
        assert!(!store.surface(interior).unwrap().triangles.is_empty());

        // Smoothing shrinks an isolated voxel but never eliminates it.
        let v2 = store
            .enclosed_volume(volume_of_phase(&store, 2))
            .unwrap();
        assert!(v2 > 0.0 && v2 < 1.0, "phase 2 volume {v2}");
    }

    #[test]
    fn interface_volume_exchange_is_conservative() {
        init_tracing();
        // A 2x2x2 block of phase 2 centered in a 4x4x4 box of phase 1.
        // Smoothing moves the interface, trading volume between the two
        // phases; the total stays the volume of the box.
        let source = ArrayVoxelSource::from_fn(
            [4, 4, 4],
            unit_spacing(),
            Point3::origin(),
            |i, j, k| {
                if (1..=2).contains(&i) && (1..=2).contains(&j) && (1..=2).contains(&k) {
                    2
                } else {
                    1
                }
            },
        )
        .unwrap();

        let store = Pipeline::new(Config::default()).run(&source).unwrap();

        let v1 = store
            .enclosed_volume(volume_of_phase(&store, 1))
            .unwrap();
        let v2 = store
            .enclosed_volume(volume_of_phase(&store, 2))
            .unwrap();
        assert!(v2 > 0.0 && v2 < 8.0, "block volume {v2}");
        assert!((v1 + v2 - 64.0).abs() < 1e-6, "total volume {}", v1 + v2);
    }

    #[test]
    fn runs_are_reproducible() {
        let source = ArrayVoxelSource::from_fn(
            [4, 4, 4],
            unit_spacing(),
            Point3::origin(),
            |i, j, k| {
                if (1..=2).contains(&i) && (1..=2).contains(&j) && (1..=2).contains(&k) {
                    2
                } else {
                    1
                }
            },
        )
        .unwrap();

        let positions = |store: &MeshStore| {
            let mut all: Vec<(f64, f64, f64)> = store
                .vertices()
                .map(|(_, v)| (v.position.x, v.position.y, v.position.z))
                .collect();
            all.sort_by(|a, b| {
                a.0.total_cmp(&b.0)
                    .then(a.1.total_cmp(&b.1))
                    .then(a.2.total_cmp(&b.2))
            });
            all
        };

        let first = Pipeline::new(Config::default()).run(&source).unwrap();
        let second = Pipeline::new(Config::default()).run(&source).unwrap();
        assert_eq!(first.triangle_count(), second.triangle_count());
        assert_eq!(positions(&first), positions(&second));
    }

    #[test]
    fn empty_grid_is_rejected() {
        struct EmptySource;
        impl VoxelSource for EmptySource {
            fn material_by_index(&self, _: i64, _: i64, _: i64) -> i32 {
                0
            }
            fn material_by_coordinate(&self, _: &Point3) -> i32 {
                0
            }
            fn dimensions(&self) -> [usize; 3] {
                [0, 4, 4]
            }
            fn spacing(&self) -> Vector3 {
                Vector3::new(1.0, 1.0, 1.0)
            }
            fn origin(&self) -> Point3 {
                Point3::origin()
            }
        }

        assert!(Pipeline::new(Config::default()).run(&EmptySource).is_err());
    }
}
