pub mod penalty;
pub mod spring;

pub use penalty::PenaltySmoother;
pub use spring::SpringSmoother;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::math::{Point3, Vector3};
use crate::mesh::{MeshStore, VertexId};

/// Outer relaxation stops once the largest vertex step falls below this.
const OUTER_TOLERANCE: f64 = 1e-4;

/// Hard cap on outer relaxation sweeps.
const MAX_OUTER_ITERATIONS: usize = 1000;

/// Convergence threshold of the per-vertex displacement fixed point.
const INNER_TOLERANCE: f64 = 1e-8;

/// Hard cap on fixed-point iterations; hitting it zeroes the displacement.
const MAX_INNER_ITERATIONS: usize = 100;

/// Smooths vertex positions in place.
pub trait Smoother {
    /// Runs the smoothing pass over the whole store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store references a missing entity.
    fn execute(&self, store: &mut MeshStore) -> Result<()>;
}

/// Per-vertex spring parameters of the nonlinear pull-back.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpringParams {
    /// Spring stiffness; zero disables the pull-back entirely.
    pub stiffness: f64,
    /// Exponent of the displacement nonlinearity.
    pub alpha: f64,
}

/// A batch of vertices to relax together.
///
/// All four vectors run parallel to `vertices`. Connections may only name
/// vertices present in the batch; unknown neighbors are ignored.
pub(crate) struct SpringNetwork {
    pub vertices: Vec<VertexId>,
    pub fixed: Vec<[bool; 3]>,
    pub params: Vec<SpringParams>,
    pub connections: Vec<Vec<VertexId>>,
}

/// Gauss-Seidel relaxation of a spring network.
///
/// Each sweep pulls every free vertex toward the mean of its connections,
/// then damps the step with a nonlinear spring anchored at the vertex's
/// original position: the admissible displacement solves
/// `d = d0 / exp(d^alpha / stiffness)` by fixed-point iteration, so small
/// deviations pass almost freely while large ones saturate. Sweeps repeat
/// until the largest vertex step converges.
pub(crate) fn relax(store: &mut MeshStore, network: &SpringNetwork) -> Result<()> {
    let n = network.vertices.len();
    let mut slot_of: HashMap<VertexId, usize> = HashMap::with_capacity(n);
    let mut current: Vec<Point3> = Vec::with_capacity(n);
    let mut original: Vec<Point3> = Vec::with_capacity(n);
    for (slot, &v) in network.vertices.iter().enumerate() {
        let data = store.vertex(v)?;
        slot_of.insert(v, slot);
        current.push(data.position);
        original.push(data.original);
    }
    let connections: Vec<Vec<usize>> = network
        .connections
        .iter()
        .map(|c| c.iter().filter_map(|v| slot_of.get(v).copied()).collect())
        .collect();

    let mut sweeps = 0;
    let mut delta_max = f64::INFINITY;
    while delta_max > OUTER_TOLERANCE && sweeps < MAX_OUTER_ITERATIONS {
        delta_max = 0.0;
        for i in 0..n {
            if network.fixed[i] == [true; 3] || connections[i].is_empty() {
                continue;
            }

            #[allow(clippy::cast_precision_loss)]
            let weight = 1.0 / connections[i].len() as f64;
            let mut target = Vector3::zeros();
            for &neighbor in &connections[i] {
                target += current[neighbor].coords * weight;
            }

            let mut position = current[i];
            for a in 0..3 {
                if !network.fixed[i][a] {
                    position[a] = target[a];
                }
            }

            // Pull back toward the original position.
            let deviation = position - original[i];
            let d0 = deviation.norm();
            let params = network.params[i];
            if d0 > INNER_TOLERANCE && params.stiffness != 0.0 {
                let d = solve_spring_displacement(d0, params);
                let unit = deviation / d0;
                for a in 0..3 {
                    if !network.fixed[i][a] {
                        position[a] = original[i][a] + unit[a] * d;
                    }
                }
            }

            let step = (position - current[i]).norm();
            if step > delta_max {
                delta_max = step;
            }
            current[i] = position;
        }
        debug!(sweeps, delta_max, "relaxation sweep");
        sweeps += 1;
    }
    if sweeps == MAX_OUTER_ITERATIONS {
        warn!(delta_max, "spring relaxation did not converge");
    }

    for (slot, &v) in network.vertices.iter().enumerate() {
        store.vertex_mut(v)?.position = current[slot];
    }
    Ok(())
}

/// Admissible displacement for a raw deviation `d0`.
///
/// The fixed point of `d = d0 / exp(d^alpha / stiffness)` is the unique
/// root of `f(d) = d - d0 / exp(d^alpha / stiffness)` in `[0, d0]`; `f` is
/// strictly increasing there, so bisection brackets it unconditionally.
/// (Plain substitution oscillates for stiff springs and crawls at
/// unit-scale deviations.) Returns zero, pinning the vertex to its
/// original position, in the exceptional case the bracket fails to close.
pub(crate) fn solve_spring_displacement(d0: f64, params: SpringParams) -> f64 {
    let residual = |d: f64| d - d0 / (d.powf(params.alpha) / params.stiffness).exp();
    let mut lo = 0.0_f64;
    let mut hi = d0;
    let mut iterations = 0;
    while hi - lo > INNER_TOLERANCE && iterations < MAX_INNER_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        if residual(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        iterations += 1;
    }
    if hi - lo > INNER_TOLERANCE {
        warn!(d0, "spring displacement solve did not converge");
        return 0.0;
    }
    (lo + hi) / 2.0
}

/// Per-axis hull constraints for a position: an axis is locked when the
/// coordinate lies on the domain boundary.
pub(crate) fn boundary_flags(store: &MeshStore, position: &Point3) -> [bool; 3] {
    let domain = store.domain();
    let eps = (domain.max - domain.min).min() * 1e-9;
    let mut flags = [false; 3];
    for a in 0..3 {
        flags[a] = (position[a] - domain.min[a]).abs() < eps
            || (position[a] - domain.max[a]).abs() < eps;
    }
    flags
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::voxel::BoundingBox;

    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn test_store() -> MeshStore {
        let domain = BoundingBox::new(p(0.0, 0.0, 0.0), p(10.0, 10.0, 10.0));
        MeshStore::new(domain, Vector3::new(1.0, 1.0, 1.0), 1e-7)
    }

    fn line_network(store: &mut MeshStore, kink: Point3) -> SpringNetwork {
        let a = store.add_unique_vertex(p(1.0, 1.0, 1.0)).unwrap();
        let b = store.add_unique_vertex(kink).unwrap();
        let c = store.add_unique_vertex(p(3.0, 1.0, 1.0)).unwrap();
        SpringNetwork {
            vertices: vec![a, b, c],
            fixed: vec![[true; 3], [false; 3], [true; 3]],
            params: vec![
                SpringParams {
                    stiffness: 1.0,
                    alpha: 2.0,
                };
                3
            ],
            connections: vec![vec![b], vec![a, c], vec![b]],
        }
    }

    #[test]
    fn displacement_is_damped_but_nonzero() {
        let params = SpringParams {
            stiffness: 1.0,
            alpha: 2.0,
        };
        let d = solve_spring_displacement(0.5, params);
        assert!(d > 0.0 && d < 0.5);

        // A stiffer anchor admits less displacement, but never zero.
        let pinned = solve_spring_displacement(
            0.5,
            SpringParams {
                stiffness: 1e-4,
                alpha: 2.0,
            },
        );
        assert!(pinned > 0.0 && pinned < d / 10.0);
    }

    #[test]
    fn unit_deviation_solves_to_its_fixed_point() {
        // d = e^(-d^2) has its fixed point at d = 0.65292; the solver must
        // land there rather than bail out to zero.
        let params = SpringParams {
            stiffness: 1.0,
            alpha: 2.0,
        };
        let d = solve_spring_displacement(1.0, params);
        assert!((d - 0.65292).abs() < 1e-4, "solved displacement {d}");
    }

    #[test]
    fn kink_relaxes_toward_the_chord() {
        let mut store = test_store();
        let network = line_network(&mut store, p(2.0, 2.0, 1.0));
        relax(&mut store, &network).unwrap();

        let b = network.vertices[1];
        let moved = store.vertex(b).unwrap().position;
        // The chord midpoint is (2, 1, 1); the spring keeps the vertex
        // between its original position and the midpoint.
        assert!(moved.y < 2.0);
        assert!(moved.y > 1.0);
        assert!((moved.x - 2.0).abs() < 1e-6);
        assert!((moved.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_stiffness_gives_pure_laplacian() {
        let mut store = test_store();
        let mut network = line_network(&mut store, p(2.0, 2.0, 1.0));
        for params in &mut network.params {
            params.stiffness = 0.0;
        }
        relax(&mut store, &network).unwrap();

        let b = network.vertices[1];
        let moved = store.vertex(b).unwrap().position;
        assert!((moved.y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn fixed_axes_never_move() {
        let mut store = test_store();
        let mut network = line_network(&mut store, p(2.0, 2.0, 1.5));
        network.fixed[1] = [false, false, true];
        relax(&mut store, &network).unwrap();

        let b = network.vertices[1];
        let moved = store.vertex(b).unwrap().position;
        assert!((moved.z - 1.5).abs() < 1e-12);
        assert!(moved.y < 2.0);
    }

    #[test]
    fn hull_positions_are_flagged_per_axis() {
        let store = test_store();
        assert_eq!(boundary_flags(&store, &p(0.0, 5.0, 10.0)), [true, false, true]);
        assert_eq!(boundary_flags(&store, &p(5.0, 5.0, 5.0)), [false; 3]);
    }
}
