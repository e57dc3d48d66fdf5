pub mod edges;

pub use edges::TraceEdges;

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::math::{triangle_3d, Point3};
use crate::mesh::{MeshStore, SurfaceData, SurfaceId, VolumeData};
use crate::voxel::VoxelSource;

/// Probe directions per axis; negative directions are added on the lower
/// domain boundary (the positive probe covers the upper one).
const AXIS_DIR: [[i64; 3]; 3] = [[1, 0, 0], [0, 1, 0], [0, 0, 1]];

/// The two cross axes spanning the face quad for each probe axis.
const CROSS_AXES: [[usize; 2]; 3] = [[1, 2], [0, 2], [0, 1]];

/// Scans the voxel grid and emits a quad wherever two adjacent cells (or a
/// cell and the domain exterior) differ in phase.
///
/// Quads are split into two triangles; the diagonal is marked transverse.
/// Corner vertices are deduplicated through the spatial index. Triangles
/// are grouped into surfaces keyed by the unordered phase pair, and phases
/// are aggregated into volumes at the end of the scan.
pub struct ExtractSurfaces<'a, S> {
    source: &'a S,
    config: &'a Config,
}

impl<'a, S: VoxelSource> ExtractSurfaces<'a, S> {
    /// Creates a new extraction operation.
    #[must_use]
    pub fn new(source: &'a S, config: &'a Config) -> Self {
        Self { source, config }
    }

    /// Executes the extraction.
    ///
    /// # Errors
    ///
    /// Returns an error if a quad corner falls outside the spatial index
    /// bounds, which indicates an inconsistent voxel source.
    #[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
    pub fn execute(&self, store: &mut MeshStore) -> Result<()> {
        info!("extracting phase boundary surfaces");
        let [nx, ny, nz] = self.source.dimensions();
        let mut interior_phases: BTreeSet<i32> = BTreeSet::new();

        for i in 0..nx as i64 {
            for j in 0..ny as i64 {
                for k in 0..nz as i64 {
                    let this_phase = self.source.material_by_index(i, j, k);
                    interior_phases.insert(this_phase);

                    // Positive probes everywhere; negative ones only on the
                    // lower boundary, where no neighbor scans toward us.
                    let mut probes: Vec<(usize, i64)> = vec![(0, 1), (1, 1), (2, 1)];
                    if i == 0 {
                        probes.push((0, -1));
                    }
                    if j == 0 {
                        probes.push((1, -1));
                    }
                    if k == 0 {
                        probes.push((2, -1));
                    }

                    for (axis, sign) in probes {
                        let dir = [
                            AXIS_DIR[axis][0] * sign,
                            AXIS_DIR[axis][1] * sign,
                            AXIS_DIR[axis][2] * sign,
                        ];
                        let neighbor = self.source.material_by_index(
                            i + dir[0],
                            j + dir[1],
                            k + dir[2],
                        );

                        // Outside the domain the exterior counts as phase 0;
                        // a void voxel against the exterior is no boundary
                        // when zero is treated as void.
                        let (same_phase, neighbor_phase) = if neighbor >= 0 {
                            (neighbor == this_phase, neighbor)
                        } else if this_phase == 0 && self.config.treat_zero_as_void {
                            (true, 0)
                        } else {
                            (false, 0)
                        };

                        if !same_phase {
                            self.emit_face(store, [i, j, k], axis, dir, this_phase, neighbor_phase)?;
                        }
                    }
                }
            }
        }

        fix_boundary_vertices(store);
        build_volumes(store, &interior_phases, self.config);
        info!(
            surfaces = store.surfaces().count(),
            triangles = store.triangle_count(),
            vertices = store.vertex_count(),
            "extraction finished"
        );
        Ok(())
    }

    /// Emits the two triangles of the face quad between a voxel and its
    /// neighbor in direction `dir`.
    #[allow(clippy::cast_precision_loss)]
    fn emit_face(
        &self,
        store: &mut MeshStore,
        index: [i64; 3],
        axis: usize,
        dir: [i64; 3],
        this_phase: i32,
        neighbor_phase: i32,
    ) -> Result<()> {
        let spacing = self.source.spacing();
        let origin = self.source.origin();

        // Center of the shared face.
        let mut center = Point3::origin();
        for a in 0..3 {
            center[a] =
                (index[a] as f64 + dir[a] as f64 / 2.0) * spacing[a] + origin[a] + spacing[a] / 2.0;
        }

        // Corners offset by half a spacing on the two cross axes.
        let [c1, c2] = CROSS_AXES[axis];
        let mut corners = [Point3::origin(); 4];
        for (slot, (s1, s2)) in [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)]
            .into_iter()
            .enumerate()
        {
            let mut corner = center;
            corner[c1] += s1 * spacing[c1] / 2.0;
            corner[c2] += s2 * spacing[c2] / 2.0;
            corners[slot] = corner;
        }

        let mut ids = [crate::mesh::VertexId::default(); 4];
        for (slot, corner) in corners.iter().enumerate() {
            ids[slot] = store.add_unique_vertex(*corner)?;
            debug!(?corner, id = ?ids[slot], "face corner");
        }

        let surface = find_or_create_surface(store, this_phase, neighbor_phase);

        // Resolve which side of the face the positive normal points to by
        // sampling the material just off the centroid, instead of trusting
        // the probe direction bookkeeping.
        let (pos_phase, neg_phase) = self.resolve_normal_phases(
            &corners[0],
            &corners[1],
            &corners[2],
            this_phase,
            neighbor_phase,
        );

        store.add_triangle([ids[0], ids[1], ids[2]], surface, pos_phase, neg_phase)?;
        store.add_triangle([ids[1], ids[3], ids[2]], surface, pos_phase, neg_phase)?;

        // The quad diagonal is an extraction artifact, not a physical edge.
        if let Some(diagonal) = store.find_edge(ids[1], ids[2]) {
            store.edge_mut(diagonal)?.transverse = true;
        }

        let surface_data = store.surface_mut(surface)?;
        surface_data.vertices.extend_from_slice(&ids);
        Ok(())
    }

    /// Phase tags as seen from the winding normal of `(a, b, c)`.
    fn resolve_normal_phases(
        &self,
        a: &Point3,
        b: &Point3,
        c: &Point3,
        this_phase: i32,
        neighbor_phase: i32,
    ) -> (i32, i32) {
        let Some(normal) = triangle_3d::triangle_normal(a, b, c) else {
            return (neighbor_phase, this_phase);
        };
        let spacing = self.source.spacing();
        let probe = triangle_3d::triangle_centroid(a, b, c)
            + normal.component_mul(&spacing) / 4.0;
        let sampled = self.source.material_by_coordinate(&probe).max(0);

        if sampled == this_phase {
            (this_phase, neighbor_phase)
        } else {
            (neighbor_phase, this_phase)
        }
    }
}

fn find_or_create_surface(store: &mut MeshStore, a: i32, b: i32) -> SurfaceId {
    store
        .find_surface(a, b)
        .unwrap_or_else(|| store.add_surface(SurfaceData::new(a, b)))
}

/// Freezes vertex coordinates lying on the domain hull, per axis.
///
/// The hull must stay planar through smoothing; constraining only the
/// normal axis lets boundary vertices still slide within their plane.
fn fix_boundary_vertices(store: &mut MeshStore) {
    let domain = *store.domain();
    let eps = (domain.max - domain.min).min() * 1e-9;
    let ids = store.vertex_ids();
    for id in ids {
        let Ok(vertex) = store.vertex_mut(id) else {
            continue;
        };
        for a in 0..3 {
            let c = vertex.position[a];
            if (c - domain.min[a]).abs() < eps || (c - domain.max[a]).abs() < eps {
                vertex.fixed[a] = true;
            }
        }
    }
}

/// Groups surfaces by the phases they bound into volumes.
fn build_volumes(store: &mut MeshStore, interior_phases: &BTreeSet<i32>, config: &Config) {
    for &phase in interior_phases {
        if phase == 0 && config.treat_zero_as_void {
            continue;
        }
        let surfaces: Vec<SurfaceId> = store
            .surface_ids()
            .into_iter()
            .filter(|&s| store.surface(s).is_ok_and(|data| data.has_phase(phase)))
            .collect();
        if !surfaces.is_empty() {
            store.add_volume(VolumeData::new(phase, surfaces));
        }
    }
}
