//! Validation utilities for registration inputs and configuration.

use coreg_core::image::ImageGrid;
use crate::error::{RegistrationError, Result};

/// Smallest usable number of histogram bins (4 of them are padding).
pub const MIN_HISTOGRAM_BINS: usize = 5;

/// Validate learning rate.
pub fn validate_learning_rate(lr: f64) -> Result<()> {
    if !(lr > 0.0) || !lr.is_finite() {
        return Err(RegistrationError::invalid_configuration(format!(
            "Learning rate must be positive and finite, got {}",
            lr
        )));
    }
    Ok(())
}

/// Validate histogram bin count for mutual information.
pub fn validate_histogram_bins(num_bins: usize) -> Result<()> {
    if num_bins < MIN_HISTOGRAM_BINS {
        return Err(RegistrationError::invalid_configuration(format!(
            "Number of bins must be at least {}, got {}",
            MIN_HISTOGRAM_BINS, num_bins
        )));
    }
    Ok(())
}

/// Validate the metric sampling fraction, which must lie in `(0, 1]`.
pub fn validate_sampling_percentage(percentage: f64) -> Result<()> {
    if !(percentage > 0.0 && percentage <= 1.0) {
        return Err(RegistrationError::invalid_configuration(format!(
            "Sampling percentage must be in (0, 1], got {}",
            percentage
        )));
    }
    Ok(())
}

/// Validate the convergence window size.
pub fn validate_convergence_window(window_size: usize) -> Result<()> {
    if window_size < 2 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Convergence window size must be at least 2, got {}",
            window_size
        )));
    }
    Ok(())
}

/// Validate the step relaxation factor, which must lie in `(0, 1]`.
pub fn validate_relaxation_factor(factor: f64) -> Result<()> {
    if !(factor > 0.0 && factor <= 1.0) {
        return Err(RegistrationError::invalid_configuration(format!(
            "Relaxation factor must be in (0, 1], got {}",
            factor
        )));
    }
    Ok(())
}

/// Validate the geometry of a fixed/moving pair.
pub fn validate_image_grids(fixed: &ImageGrid, moving: &ImageGrid) -> Result<()> {
    fixed
        .validate()
        .map_err(|e| RegistrationError::invalid_geometry(format!("fixed image: {}", e)))?;
    moving
        .validate()
        .map_err(|e| RegistrationError::invalid_geometry(format!("moving image: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreg_core::spatial::{Direction3, Point3, Spacing3};

    #[test]
    fn test_validate_learning_rate() {
        assert!(validate_learning_rate(0.01).is_ok());
        assert!(validate_learning_rate(100.0).is_ok());
        assert!(validate_learning_rate(0.0).is_err());
        assert!(validate_learning_rate(-0.01).is_err());
        assert!(validate_learning_rate(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_histogram_bins() {
        assert!(validate_histogram_bins(50).is_ok());
        assert!(validate_histogram_bins(5).is_ok());
        assert!(validate_histogram_bins(4).is_err());
    }

    #[test]
    fn test_validate_sampling_percentage() {
        assert!(validate_sampling_percentage(0.01).is_ok());
        assert!(validate_sampling_percentage(1.0).is_ok());
        assert!(validate_sampling_percentage(0.0).is_err());
        assert!(validate_sampling_percentage(1.5).is_err());
    }

    #[test]
    fn test_validate_relaxation_factor() {
        assert!(validate_relaxation_factor(0.5).is_ok());
        assert!(validate_relaxation_factor(1.0).is_ok());
        assert!(validate_relaxation_factor(0.0).is_err());
        assert!(validate_relaxation_factor(1.5).is_err());
        assert!(validate_relaxation_factor(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_convergence_window() {
        assert!(validate_convergence_window(10).is_ok());
        assert!(validate_convergence_window(1).is_err());
    }

    #[test]
    fn test_validate_image_grids() {
        let good = ImageGrid::with_size([4, 4, 4]);
        let bad = ImageGrid::new([4, 4, 4], Point3::origin(), Spacing3::new([1.0, 0.0, 1.0]), Direction3::identity());
        assert!(validate_image_grids(&good, &good).is_ok());
        assert!(matches!(
            validate_image_grids(&good, &bad),
            Err(RegistrationError::InvalidGeometry(_))
        ));
    }
}
