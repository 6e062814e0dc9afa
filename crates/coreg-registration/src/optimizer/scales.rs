//! Parameter scales from physical shift.
//!
//! Rotation angles and translations live on very different scales. Each
//! parameter is perturbed by a small amount and the largest resulting
//! displacement of the fixed grid's corner voxels is measured; the squared
//! shift per unit perturbation becomes that parameter's scale. Gradient
//! components are divided by their scale before the update.

use coreg_core::image::ImageGrid;
use coreg_core::spatial::Point3;
use coreg_core::transform::{RigidParameters, RigidTransform, RIGID_PARAMETER_COUNT};

/// Default parameter perturbation.
pub const SMALL_PARAMETER_VARIATION: f64 = 0.01;

/// Estimates parameter scales and step sizes from corner displacements.
#[derive(Debug, Clone)]
pub struct PhysicalShiftEstimator {
    sample_points: Vec<Point3>,
    minimum_spacing: f64,
    small_variation: f64,
}

impl PhysicalShiftEstimator {
    /// Estimator sampling the 8 corner voxels of `grid`.
    pub fn new(grid: &ImageGrid) -> Self {
        Self {
            sample_points: grid.corners().to_vec(),
            minimum_spacing: grid.spacing().min_spacing(),
            small_variation: SMALL_PARAMETER_VARIATION,
        }
    }

    pub fn with_small_variation(mut self, variation: f64) -> Self {
        self.small_variation = variation;
        self
    }

    pub fn sample_points(&self) -> &[Point3] {
        &self.sample_points
    }

    /// Default bound on one step's physical displacement: the smallest fixed spacing.
    pub fn maximum_step_size(&self) -> f64 {
        self.minimum_spacing
    }

    /// Largest displacement of a sample point when `delta` is added to the parameters.
    pub fn maximum_shift(&self, transform: &RigidTransform, delta: &RigidParameters) -> f64 {
        let moved = transform.with_parameters(transform.parameters() + delta);
        self.sample_points
            .iter()
            .map(|p| transform.transform_point(p).distance(&moved.transform_point(p)))
            .fold(0.0, f64::max)
    }

    /// Physical shift of a full update step (used for learning-rate estimation).
    pub fn estimate_step_scale(&self, transform: &RigidTransform, step: &RigidParameters) -> f64 {
        self.maximum_shift(transform, step)
    }

    /// `(maxShift / variation)^2` per parameter.
    ///
    /// A parameter that moves no sample point takes the smallest non-zero
    /// shift; if none moves anything every scale is 1.
    pub fn estimate_scales(&self, transform: &RigidTransform) -> RigidParameters {
        let mut shifts = RigidParameters::zeros();
        for i in 0..RIGID_PARAMETER_COUNT {
            let mut delta = RigidParameters::zeros();
            delta[i] = self.small_variation;
            shifts[i] = self.maximum_shift(transform, &delta);
        }

        let min_nonzero = shifts
            .iter()
            .copied()
            .filter(|s| *s > f64::EPSILON)
            .fold(f64::INFINITY, f64::min);
        if !min_nonzero.is_finite() {
            tracing::warn!("No parameter moves the sample points; using unit scales");
            return RigidParameters::repeat(1.0);
        }

        let scales = shifts.map(|s| {
            let s = if s > f64::EPSILON { s } else { min_nonzero };
            (s / self.small_variation).powi(2)
        });
        tracing::debug!("Parameter scales from physical shift: {:?}", scales.as_slice());
        scales
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreg_core::spatial::{Direction3, Spacing3, Vector3};

    fn grid() -> ImageGrid {
        ImageGrid::new([11, 21, 5], Point3::origin(), Spacing3::new([1.0, 0.5, 2.0]), Direction3::identity())
    }

    #[test]
    fn test_translation_scales_are_one() {
        let grid = grid();
        let estimator = PhysicalShiftEstimator::new(&grid);
        let scales = estimator.estimate_scales(&RigidTransform::identity(grid.center()));
        for i in 3..6 {
            assert!((scales[i] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rotation_scales_grow_with_extent() {
        let grid = grid();
        let estimator = PhysicalShiftEstimator::new(&grid);
        let scales = estimator.estimate_scales(&RigidTransform::identity(grid.center()));
        // Corners lie about sqrt(5^2 + 5^2) mm from the centre in the x-y plane.
        let radius = (50.0f64).sqrt();
        let expected = (radius * 2.0 * (0.005f64).sin() / 0.01).powi(2);
        assert!((scales[2] - expected).abs() / expected < 1e-6);
        assert!(scales.iter().all(|s| *s > 0.0));
    }

    #[test]
    fn test_step_scale_is_translation_norm() {
        let grid = grid();
        let estimator = PhysicalShiftEstimator::new(&grid);
        let transform = RigidTransform::from_components([0.1, 0.0, 0.0], Vector3::new([1.0, 2.0, 3.0]), grid.center());
        let step = RigidParameters::from_column_slice(&[0.0, 0.0, 0.0, 3.0, 0.0, 4.0]);
        assert!((estimator.estimate_step_scale(&transform, &step) - 5.0).abs() < 1e-9);
        assert_eq!(estimator.maximum_step_size(), 0.5);
    }

    #[test]
    fn test_single_voxel_grid_uses_unit_scales() {
        let grid = ImageGrid::with_size([1, 1, 1]);
        let estimator = PhysicalShiftEstimator::new(&grid);
        let scales = estimator.estimate_scales(&RigidTransform::identity(grid.center()));
        for i in 0..3 {
            assert!((scales[i] - 1.0).abs() < 1e-9);
        }
    }
}
