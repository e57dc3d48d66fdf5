pub mod grid;

pub use grid::ArrayVoxelSource;

use crate::math::{Point3, Vector3};

/// Sentinel phase returned by index queries that leave the grid below x.
pub const OUTSIDE_X_BELOW: i32 = -1;
/// Sentinel phase returned by index queries that leave the grid above x.
pub const OUTSIDE_X_ABOVE: i32 = -2;
/// Sentinel phase returned by index queries that leave the grid below y.
pub const OUTSIDE_Y_BELOW: i32 = -3;
/// Sentinel phase returned by index queries that leave the grid above y.
pub const OUTSIDE_Y_ABOVE: i32 = -4;
/// Sentinel phase returned by index queries that leave the grid below z.
pub const OUTSIDE_Z_BELOW: i32 = -5;
/// Sentinel phase returned by index queries that leave the grid above z.
pub const OUTSIDE_Z_ABOVE: i32 = -6;

/// `true` if a material id is one of the outside-of-grid sentinels.
#[must_use]
pub fn is_outside(phase: i32) -> bool {
    phase < 0
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    /// Creates a bounding box from its extreme corners.
    #[must_use]
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Returns the box grown by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: &Vector3) -> Self {
        Self {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    /// `true` if `point` lies inside or on the boundary of the box.
    #[must_use]
    pub fn contains(&self, point: &Point3) -> bool {
        (0..3).all(|a| point[a] >= self.min[a] && point[a] <= self.max[a])
    }
}

/// Read-only access to a labeled voxel grid.
///
/// Index queries outside the grid return a negative sentinel identifying the
/// crossed boundary face ([`OUTSIDE_X_BELOW`] and friends); the extractor's
/// boundary handling relies on this.
pub trait VoxelSource {
    /// Material id of voxel `(i, j, k)`, or a sentinel when outside the grid.
    fn material_by_index(&self, i: i64, j: i64, k: i64) -> i32;

    /// Material id of the voxel containing a physical coordinate.
    fn material_by_coordinate(&self, point: &Point3) -> i32;

    /// Number of voxels along each axis.
    fn dimensions(&self) -> [usize; 3];

    /// Physical size of one voxel along each axis.
    fn spacing(&self) -> Vector3;

    /// Physical coordinate of the grid's lower corner.
    fn origin(&self) -> Point3;

    /// Tight physical bounds of the grid.
    fn bounding_box(&self) -> BoundingBox {
        let origin = self.origin();
        let dim = self.dimensions();
        let spacing = self.spacing();
        #[allow(clippy::cast_precision_loss)]
        let extent = Vector3::new(
            dim[0] as f64 * spacing.x,
            dim[1] as f64 * spacing.y,
            dim[2] as f64 * spacing.z,
        );
        BoundingBox::new(origin, origin + extent)
    }
}
