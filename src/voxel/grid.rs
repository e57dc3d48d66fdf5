use crate::error::{Result, VoxelError};
use crate::math::{Point3, Vector3};

use super::{
    VoxelSource, OUTSIDE_X_ABOVE, OUTSIDE_X_BELOW, OUTSIDE_Y_ABOVE, OUTSIDE_Y_BELOW,
    OUTSIDE_Z_ABOVE, OUTSIDE_Z_BELOW,
};

/// Dense in-memory voxel grid.
///
/// Material ids are stored row-major with x fastest, matching the layout of
/// the usual microstructure file formats. This is also the grid used by the
/// test suite to build synthetic specimens.
#[derive(Debug, Clone)]
pub struct ArrayVoxelSource {
    dimensions: [usize; 3],
    spacing: Vector3,
    origin: Point3,
    data: Vec<i32>,
}

impl ArrayVoxelSource {
    /// Creates a grid from raw material data.
    ///
    /// # Errors
    ///
    /// Returns an error if any dimension is zero, the spacing is not
    /// positive, or `data` does not hold exactly `nx * ny * nz` entries.
    pub fn new(
        dimensions: [usize; 3],
        spacing: Vector3,
        origin: Point3,
        data: Vec<i32>,
    ) -> Result<Self> {
        if dimensions.contains(&0) {
            return Err(VoxelError::EmptyGrid(dimensions[0], dimensions[1], dimensions[2]).into());
        }
        if spacing.min() <= 0.0 {
            return Err(VoxelError::InvalidSpacing.into());
        }
        let expected = dimensions[0] * dimensions[1] * dimensions[2];
        if data.len() != expected {
            return Err(VoxelError::DataLengthMismatch {
                expected,
                actual: data.len(),
            }
            .into());
        }
        Ok(Self {
            dimensions,
            spacing,
            origin,
            data,
        })
    }

    /// Creates a grid by evaluating `material` at every voxel index.
    ///
    /// # Errors
    ///
    /// Returns an error if any dimension is zero or the spacing is not
    /// positive.
    pub fn from_fn<F>(
        dimensions: [usize; 3],
        spacing: Vector3,
        origin: Point3,
        material: F,
    ) -> Result<Self>
    where
        F: Fn(usize, usize, usize) -> i32,
    {
        let mut data = Vec::with_capacity(dimensions[0] * dimensions[1] * dimensions[2]);
        for k in 0..dimensions[2] {
            for j in 0..dimensions[1] {
                for i in 0..dimensions[0] {
                    data.push(material(i, j, k));
                }
            }
        }
        Self::new(dimensions, spacing, origin, data)
    }
}

impl VoxelSource for ArrayVoxelSource {
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn material_by_index(&self, i: i64, j: i64, k: i64) -> i32 {
        let [nx, ny, nz] = self.dimensions;
        if i < 0 {
            return OUTSIDE_X_BELOW;
        }
        if i >= nx as i64 {
            return OUTSIDE_X_ABOVE;
        }
        if j < 0 {
            return OUTSIDE_Y_BELOW;
        }
        if j >= ny as i64 {
            return OUTSIDE_Y_ABOVE;
        }
        if k < 0 {
            return OUTSIDE_Z_BELOW;
        }
        if k >= nz as i64 {
            return OUTSIDE_Z_ABOVE;
        }
        self.data[(k as usize * ny + j as usize) * nx + i as usize]
    }

    #[allow(clippy::cast_possible_truncation)]
    fn material_by_coordinate(&self, point: &Point3) -> i32 {
        let mut index = [0_i64; 3];
        for a in 0..3 {
            index[a] = ((point[a] - self.origin[a]) / self.spacing[a]).floor() as i64;
        }
        self.material_by_index(index[0], index[1], index[2])
    }

    fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    fn spacing(&self) -> Vector3 {
        self.spacing
    }

    fn origin(&self) -> Point3 {
        self.origin
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn two_voxel_grid() -> ArrayVoxelSource {
        ArrayVoxelSource::new(
            [2, 1, 1],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 0.0, 0.0),
            vec![1, 2],
        )
        .unwrap()
    }

    #[test]
    fn index_lookup_is_x_fastest() {
        let grid = ArrayVoxelSource::from_fn(
            [2, 2, 2],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 0.0, 0.0),
            |i, j, k| i32::try_from(i + 2 * j + 4 * k).unwrap(),
        )
        .unwrap();

        assert_eq!(grid.material_by_index(1, 0, 0), 1);
        assert_eq!(grid.material_by_index(0, 1, 0), 2);
        assert_eq!(grid.material_by_index(0, 0, 1), 4);
        assert_eq!(grid.material_by_index(1, 1, 1), 7);
    }

    #[test]
    fn sentinels_identify_the_crossed_face() {
        let grid = two_voxel_grid();
        assert_eq!(grid.material_by_index(-1, 0, 0), OUTSIDE_X_BELOW);
        assert_eq!(grid.material_by_index(2, 0, 0), OUTSIDE_X_ABOVE);
        assert_eq!(grid.material_by_index(0, -1, 0), OUTSIDE_Y_BELOW);
        assert_eq!(grid.material_by_index(0, 1, 0), OUTSIDE_Y_ABOVE);
        assert_eq!(grid.material_by_index(0, 0, -1), OUTSIDE_Z_BELOW);
        assert_eq!(grid.material_by_index(0, 0, 1), OUTSIDE_Z_ABOVE);
    }

    #[test]
    fn coordinate_lookup_floors_to_the_containing_voxel() {
        let grid = two_voxel_grid();
        assert_eq!(grid.material_by_coordinate(&Point3::new(0.5, 0.5, 0.5)), 1);
        assert_eq!(grid.material_by_coordinate(&Point3::new(1.5, 0.5, 0.5)), 2);
        assert_eq!(
            grid.material_by_coordinate(&Point3::new(-0.5, 0.5, 0.5)),
            OUTSIDE_X_BELOW
        );
    }

    #[test]
    fn mismatched_data_length_is_rejected() {
        let result = ArrayVoxelSource::new(
            [2, 2, 2],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 0.0, 0.0),
            vec![0; 7],
        );
        assert!(result.is_err());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let result = ArrayVoxelSource::new(
            [2, 0, 2],
            Vector3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 0.0, 0.0),
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn bounding_box_spans_the_grid() {
        let grid = two_voxel_grid();
        let bb = grid.bounding_box();
        assert_eq!(bb.min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(bb.max, Point3::new(2.0, 1.0, 1.0));
    }
}
