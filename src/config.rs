use crate::math::Vector3;

/// Configuration for the whole pipeline.
///
/// Tolerances that scale with the voxel data (spring stiffness, area and
/// volume budgets) are left unset by default and derived from the grid
/// spacing at the point of use; setting them explicitly overrides the
/// derivation. Angles are in radians.
#[derive(Debug, Clone)]
pub struct Config {
    /// Surface spring stiffness. Default: mean spacing times
    /// [`spring_c_factor`](Self::spring_c_factor).
    pub spring_c: Option<f64>,
    /// Multiplier applied when deriving `spring_c` from the spacing.
    pub spring_c_factor: f64,
    /// Exponent of the surface spring's nonlinearity.
    pub spring_alpha: f64,
    /// Phase-edge spring stiffness. Default: mean spacing times
    /// [`edge_spring_c_factor`](Self::edge_spring_c_factor).
    pub edge_spring_c: Option<f64>,
    /// Multiplier applied when deriving `edge_spring_c` from the spacing.
    pub edge_spring_c_factor: f64,
    /// Exponent of the phase-edge spring's nonlinearity.
    pub edge_spring_alpha: f64,
    /// Smooth edges and surfaces simultaneously, anchoring constrained
    /// vertices with penalty springs instead of freezing them.
    pub smooth_penalty: bool,
    /// Stiffness multiplier for penalty-anchored vertices.
    pub penalty_stiffness_factor: f64,
    /// Skip the coarsening stage entirely.
    pub no_coarsening: bool,
    /// Treat phase 0 as void: voxels of phase 0 bordering the domain
    /// exterior produce no surface.
    pub treat_zero_as_void: bool,

    /// Flip gate: maximum allowed change in the pair's total area.
    /// Default: 1% of a voxel face area.
    pub tol_flip_max_area_change: Option<f64>,
    /// Flip gate: minimum area of each post-flip triangle.
    pub tol_flip_smallest_area: f64,
    /// Flip gate: maximum rotation of a triangle normal.
    pub tol_flip_max_normal_change: f64,
    /// Flip gate: maximum pre-flip normal difference between the pair.
    pub tol_flip_max_normal_difference: f64,

    /// Collapse gate: minimum area of each surviving triangle.
    pub tol_col_smallest_area: f64,
    /// Collapse gate: minimum interior angle of each surviving triangle.
    pub tol_col_min_angle: f64,
    /// Collapse gate: maximum rotation of a surviving triangle's normal.
    pub tol_col_max_normal_change: f64,
    /// Collapse gate: maximum direction change of a re-anchored edge chord.
    pub tol_col_chord_max_normal_change: f64,
    /// Collapse gate: maximum volumetric change. Default: 1% of a voxel
    /// volume.
    pub tol_col_max_volume_change: Option<f64>,
    /// Collapse gate: maximum accumulated positional error per vertex.
    /// Default: one mean spacing.
    pub tol_col_max_error_accumulated: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spring_c: None,
            spring_c_factor: 1.0,
            spring_alpha: 2.0,
            edge_spring_c: None,
            edge_spring_c_factor: 1.0,
            edge_spring_alpha: 2.0,
            smooth_penalty: false,
            penalty_stiffness_factor: 1e4,
            no_coarsening: false,
            treat_zero_as_void: false,
            tol_flip_max_area_change: None,
            tol_flip_smallest_area: 1e-8,
            tol_flip_max_normal_change: 35.0_f64.to_radians(),
            tol_flip_max_normal_difference: 25.0_f64.to_radians(),
            tol_col_smallest_area: 1e-8,
            tol_col_min_angle: 10.0_f64.to_radians(),
            tol_col_max_normal_change: 35.0_f64.to_radians(),
            tol_col_chord_max_normal_change: 35.0_f64.to_radians(),
            tol_col_max_volume_change: None,
            tol_col_max_error_accumulated: None,
        }
    }
}

impl Config {
    /// Surface spring stiffness for a given grid spacing.
    #[must_use]
    pub fn surface_stiffness(&self, spacing: &Vector3) -> f64 {
        self.spring_c
            .unwrap_or_else(|| spacing.mean() * self.spring_c_factor)
    }

    /// Phase-edge spring stiffness for a given grid spacing.
    #[must_use]
    pub fn edge_stiffness(&self, spacing: &Vector3) -> f64 {
        self.edge_spring_c
            .unwrap_or_else(|| spacing.mean() * self.edge_spring_c_factor)
    }

    /// Resolved flip area-change budget for a given grid spacing.
    #[must_use]
    pub fn flip_max_area_change(&self, spacing: &Vector3) -> f64 {
        self.tol_flip_max_area_change.unwrap_or_else(|| {
            let face = (spacing.x * spacing.y + spacing.y * spacing.z + spacing.z * spacing.x) / 3.0;
            face * 1e-2
        })
    }

    /// Resolved collapse volume-change budget for a given grid spacing.
    #[must_use]
    pub fn col_max_volume_change(&self, spacing: &Vector3) -> f64 {
        self.tol_col_max_volume_change
            .unwrap_or_else(|| spacing.x * spacing.y * spacing.z * 1e-2)
    }

    /// Resolved accumulated-error budget for a given grid spacing.
    #[must_use]
    pub fn col_max_error_accumulated(&self, spacing: &Vector3) -> f64 {
        self.tol_col_max_error_accumulated
            .unwrap_or_else(|| spacing.mean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stiffness_scales_with_spacing() {
        let config = Config::default();
        let spacing = Vector3::new(2.0, 2.0, 2.0);
        assert!((config.surface_stiffness(&spacing) - 2.0).abs() < 1e-12);

        let overridden = Config {
            spring_c: Some(0.5),
            ..Config::default()
        };
        assert!((overridden.surface_stiffness(&spacing) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn volume_budget_scales_with_voxel_volume() {
        let config = Config::default();
        let spacing = Vector3::new(1.0, 2.0, 3.0);
        assert!((config.col_max_volume_change(&spacing) - 0.06).abs() < 1e-12);
    }
}
