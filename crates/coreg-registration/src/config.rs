//! Serializable configuration for metric, optimizer, registration and the
//! co-registration pipeline.
//!
//! Every struct uses `#[serde(default)]`, so a TOML file only needs the keys
//! it overrides.

use serde::{Deserialize, Serialize};

use coreg_core::interpolation::InterpolatorKind;
use coreg_core::transform::InitializerMode;
pub use coreg_core::segmentation::SegmentationConfig;

pub use crate::optimizer::{GradientDescentConfig, LearningRateEstimation};
use crate::error::Result;
use crate::validation::{
    validate_convergence_window, validate_histogram_bins, validate_learning_rate, validate_relaxation_factor,
    validate_sampling_percentage,
};

/// Mattes mutual information settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Histogram bins per axis (4 are padding).
    pub histogram_bins: usize,
    /// Fraction of fixed voxels drawn at each evaluation, in `(0, 1]`.
    pub sampling_percentage: f64,
    /// Seed for the sampler; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            histogram_bins: 50,
            sampling_percentage: 0.01,
            seed: None,
        }
    }
}

impl MetricConfig {
    pub fn with_histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = bins;
        self
    }

    pub fn with_sampling_percentage(mut self, percentage: f64) -> Self {
        self.sampling_percentage = percentage;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check bins and sampling fraction.
    pub fn validate(&self) -> Result<()> {
        validate_histogram_bins(self.histogram_bins)?;
        validate_sampling_percentage(self.sampling_percentage)
    }
}

/// Settings of one registration run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub metric: MetricConfig,
    pub optimizer: GradientDescentConfig,
    /// How the initial transform centre and translation are chosen.
    pub initializer: InitializerMode,
}

impl RegistrationConfig {
    pub fn with_metric(mut self, metric: MetricConfig) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_optimizer(mut self, optimizer: GradientDescentConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_initializer(mut self, initializer: InitializerMode) -> Self {
        self.initializer = initializer;
        self
    }

    /// Validate all numeric settings.
    pub fn validate(&self) -> Result<()> {
        self.metric.validate()?;
        validate_learning_rate(self.optimizer.learning_rate)?;
        validate_convergence_window(self.optimizer.convergence_window_size)?;
        validate_relaxation_factor(self.optimizer.relaxation_factor)?;
        if let Some(step) = self.optimizer.maximum_step_size {
            if !(step > 0.0) {
                return Err(crate::RegistrationError::invalid_configuration(format!(
                    "Maximum step size must be positive, got {}",
                    step
                )));
            }
        }
        Ok(())
    }
}

/// Settings of the full CT/MRI co-registration pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub registration: RegistrationConfig,
    pub segmentation: SegmentationConfig,
    /// Interpolator used to resample the MRI onto the CT grid.
    pub resample_interpolator: InterpolatorKind,
    /// Value for output voxels that map outside the MRI.
    pub default_pixel_value: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            registration: RegistrationConfig::default(),
            segmentation: SegmentationConfig::default(),
            resample_interpolator: InterpolatorKind::Linear,
            default_pixel_value: 0.0,
        }
    }
}

impl PipelineConfig {
    pub fn with_registration(mut self, registration: RegistrationConfig) -> Self {
        self.registration = registration;
        self
    }

    pub fn with_segmentation(mut self, segmentation: SegmentationConfig) -> Self {
        self.segmentation = segmentation;
        self
    }

    pub fn with_default_pixel_value(mut self, value: f64) -> Self {
        self.default_pixel_value = value;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.registration.validate()?;
        if self.segmentation.otsu_bins < 2 {
            return Err(crate::RegistrationError::invalid_configuration(
                "Otsu threshold needs at least 2 bins",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.registration.metric.histogram_bins, 50);
        assert_eq!(config.registration.metric.sampling_percentage, 0.01);
        assert_eq!(config.registration.optimizer.max_iterations, 100);
        assert_eq!(config.registration.optimizer.learning_rate, 1.0);
        assert_eq!(config.registration.optimizer.convergence_window_size, 10);
        assert_eq!(config.segmentation.ct_threshold, -300.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let bad_bins = RegistrationConfig::default()
            .with_metric(MetricConfig::default().with_histogram_bins(3));
        assert!(bad_bins.validate().is_err());

        let bad_sampling = RegistrationConfig::default()
            .with_metric(MetricConfig::default().with_sampling_percentage(0.0));
        assert!(bad_sampling.validate().is_err());

        let mut bad_rate = RegistrationConfig::default();
        bad_rate.optimizer.learning_rate = -1.0;
        assert!(bad_rate.validate().is_err());

        let mut bad_window = RegistrationConfig::default();
        bad_window.optimizer.convergence_window_size = 1;
        assert!(bad_window.validate().is_err());

        let bad_relaxation = RegistrationConfig::default()
            .with_optimizer(GradientDescentConfig::default().with_relaxation_factor(0.0));
        assert!(bad_relaxation.validate().is_err());
    }
}
