use thiserror::Error;

/// Top-level error type for the Voxtet mesh kernel.
#[derive(Debug, Error)]
pub enum VoxtetError {
    #[error(transparent)]
    Voxel(#[from] VoxelError),

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Errors related to voxel data access.
#[derive(Debug, Error)]
pub enum VoxelError {
    #[error("grid dimensions must be non-zero, got {0}x{1}x{2}")]
    EmptyGrid(usize, usize, usize),

    #[error("voxel data length {actual} does not match dimensions ({expected} cells)")]
    DataLengthMismatch { expected: usize, actual: usize },

    #[error("voxel spacing must be positive on every axis")]
    InvalidSpacing,
}

/// Errors related to mesh topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("entity not found: {0}")]
    EntityNotFound(&'static str),

    #[error("vertex at ({0}, {1}, {2}) lies outside the spatial index bounds")]
    VertexOutOfBounds(f64, f64, f64),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}

/// Convenience type alias for results using [`VoxtetError`].
pub type Result<T> = std::result::Result<T, VoxtetError>;
