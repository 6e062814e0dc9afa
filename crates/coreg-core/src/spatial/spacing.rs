//! Voxel spacing.

use super::Vector;

/// Distance between neighbouring voxel centres along each index axis.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Isotropic spacing.
    pub fn uniform(value: f64) -> Self {
        Self::new([value; D])
    }

    /// Check that every component is strictly positive and finite.
    pub fn is_valid(&self) -> bool {
        (0..D).all(|i| self[i] > 0.0 && self[i].is_finite())
    }

    /// Smallest component; the default maximum optimizer step.
    pub fn min_spacing(&self) -> f64 {
        (0..D).map(|i| self[i]).fold(f64::INFINITY, f64::min)
    }
}
