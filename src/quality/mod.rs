pub mod coarsen;
pub mod flip;
pub mod intersection;

pub use coarsen::{Coarsen, CollapseGates};
pub use flip::{evaluate_flip, FlipAll, FlipGates};
pub use intersection::ResolveIntersections;
