pub mod config;
pub mod error;
pub mod extract;
pub mod math;
pub mod mesh;
pub mod pipeline;
pub mod quality;
pub mod smooth;
pub mod voxel;

pub use config::Config;
pub use error::{Result, VoxtetError};
pub use pipeline::Pipeline;
