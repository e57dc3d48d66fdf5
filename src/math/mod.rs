pub mod intersect_3d;
pub mod triangle_3d;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Angle in radians between two vectors, clamped against rounding.
///
/// Returns a value in `[0, pi]`. Zero-length inputs yield an angle of zero.
#[must_use]
pub fn angle_between(a: &Vector3, b: &Vector3) -> f64 {
    let denom = a.norm() * b.norm();
    if denom < TOLERANCE {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_between_orthogonal_vectors() {
        let a = Vector3::new(1.0, 0.0, 0.0);
        let b = Vector3::new(0.0, 1.0, 0.0);
        assert!((angle_between(&a, &b) - std::f64::consts::FRAC_PI_2).abs() < TOLERANCE);
    }

    #[test]
    fn angle_between_parallel_vectors_is_zero() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = a * 4.0;
        assert!(angle_between(&a, &b) < 1e-8);
    }

    #[test]
    fn angle_between_opposite_vectors_is_pi() {
        let a = Vector3::new(0.0, 0.0, 2.0);
        let b = Vector3::new(0.0, 0.0, -1.0);
        assert!((angle_between(&a, &b) - std::f64::consts::PI).abs() < 1e-8);
    }
}
