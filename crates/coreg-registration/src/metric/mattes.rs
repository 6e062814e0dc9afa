//! Mattes mutual information with an analytic parameter derivative.
//!
//! The joint density is estimated from a random subset of fixed voxels
//! (redrawn at every evaluation). Each sample is mapped into the moving
//! image, trilinearly interpolated, and binned with a cubic B-spline Parzen
//! window. The derivative chains the kernel slope, the moving image's
//! physical gradient and the transform Jacobian. Samples whose fixed or
//! interpolated moving intensity is not finite are skipped.
//!
//!
//! ```text
//! dMI/dmu = 1/(N * bin) * sum_samples sum_j dW_j/dterm * log(p(f, j) / pm(j)) * (grad M . J)
//! ```

use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use burn::tensor::backend::Backend;
use coreg_core::image::{Image, ImageBuffer};
use coreg_core::interpolation::LinearInterpolator;
use coreg_core::transform::{RigidParameters, RigidTransform};

use super::histogram::{IntensityBinning, JointHistogram, ParzenContribution};
use super::sampler::VoxelSampler;
use super::trait_::{Metric, MetricEvaluation};
use crate::config::MetricConfig;
use crate::error::{RegistrationError, Result};
use crate::validation::validate_image_grids;

/// Samples per parallel work unit. Partial results are merged in chunk order.
const CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct SamplePoint {
    contribution: ParzenContribution,
    /// Derivative of the interpolated moving value with respect to the parameters.
    moving_derivative: RigidParameters,
}

/// Mattes mutual information between a fixed and a moving volume.
#[derive(Debug, Clone)]
pub struct MattesMutualInformation {
    fixed: ImageBuffer,
    moving: ImageBuffer,
    fixed_binning: IntensityBinning,
    moving_binning: IntensityBinning,
    sampler: VoxelSampler,
    interpolator: LinearInterpolator,
    /// Maps a continuous-index gradient to a physical gradient: `D * diag(1/s)`.
    gradient_basis: Matrix3<f64>,
}

impl MattesMutualInformation {
    /// Build the metric from host snapshots.
    ///
    /// Intensity ranges are taken from the full volumes once, here.
    pub fn new(fixed: ImageBuffer, moving: ImageBuffer, config: &MetricConfig) -> Result<Self> {
        config.validate()?;
        validate_image_grids(fixed.grid(), moving.grid())?;

        let (fixed_min, fixed_max) = fixed.min_max();
        let (moving_min, moving_max) = moving.min_max();
        let bins = config.histogram_bins;
        let fixed_binning = IntensityBinning::new(fixed_min as f64, fixed_max as f64, bins);
        let moving_binning = IntensityBinning::new(moving_min as f64, moving_max as f64, bins);

        let direction = moving.grid().direction();
        let spacing = moving.grid().spacing();
        let gradient_basis = Matrix3::from_fn(|r, c| direction[(r, c)] / spacing[c]);

        tracing::debug!(
            "Mattes MI: {} bins, sampling {:.2}%, fixed range [{}, {}], moving range [{}, {}]",
            bins,
            config.sampling_percentage * 100.0,
            fixed_min,
            fixed_max,
            moving_min,
            moving_max
        );

        Ok(Self {
            fixed,
            moving,
            fixed_binning,
            moving_binning,
            sampler: VoxelSampler::new(config.sampling_percentage, config.seed),
            interpolator: LinearInterpolator::new(),
            gradient_basis,
        })
    }

    /// Build the metric from tensor-backed images.
    pub fn from_images<B: Backend>(
        fixed: &Image<B, 3>,
        moving: &Image<B, 3>,
        config: &MetricConfig,
    ) -> Result<Self> {
        Self::new(fixed.to_buffer()?, moving.to_buffer()?, config)
    }

    pub fn fixed(&self) -> &ImageBuffer {
        &self.fixed
    }

    pub fn moving(&self) -> &ImageBuffer {
        &self.moving
    }

    pub fn histogram_bins(&self) -> usize {
        self.fixed_binning.bins()
    }

    /// Number of fixed voxels drawn per evaluation.
    pub fn samples_per_evaluation(&self) -> usize {
        self.sampler.sample_count(self.fixed.grid().num_voxels())
    }

    /// Joint density of a fresh sample under `transform`.
    pub fn joint_histogram(&mut self, transform: &RigidTransform) -> Result<JointHistogram> {
        let samples = self.collect_samples(transform, false)?;
        Ok(self.histogram(&samples))
    }

    /// Mutual information (positive, higher is better) under `transform`.
    pub fn mutual_information(&mut self, transform: &RigidTransform) -> Result<f64> {
        Ok(self.joint_histogram(transform)?.mutual_information())
    }

    fn collect_samples(&mut self, transform: &RigidTransform, with_derivative: bool) -> Result<Vec<SamplePoint>> {
        let offsets = self.sampler.draw(self.fixed.grid().num_voxels());

        let fixed = &self.fixed;
        let moving = &self.moving;
        let fixed_binning = &self.fixed_binning;
        let moving_binning = &self.moving_binning;
        let interpolator = &self.interpolator;
        let basis = &self.gradient_basis;

        let samples: Vec<SamplePoint> = offsets
            .par_chunks(CHUNK_SIZE)
            .map(|chunk| {
                chunk
                    .iter()
                    .filter_map(|&offset| {
                        let [x, y, z] = fixed.grid().voxel_index(offset);
                        let point = fixed.grid().index_to_physical([x as f64, y as f64, z as f64]);
                        let mapped = transform.transform_point(&point);
                        let index = moving.grid().physical_to_index(&mapped);
                        if !moving.grid().is_inside(&index) {
                            return None;
                        }

                        let fixed_value = fixed.values()[offset] as f64;
                        if !fixed_value.is_finite() {
                            return None;
                        }
                        let (moving_value, index_gradient) =
                            interpolator.evaluate_with_derivative(moving, index);
                        if !moving_value.is_finite() || index_gradient.iter().any(|g| !g.is_finite()) {
                            return None;
                        }
                        let contribution =
                            ParzenContribution::new(fixed_binning, moving_binning, fixed_value, moving_value);

                        let moving_derivative = if with_derivative {
                            let gradient = basis * Vector3::from(index_gradient);
                            transform.jacobian(&point).transpose() * gradient
                        } else {
                            RigidParameters::zeros()
                        };

                        Some(SamplePoint {
                            contribution,
                            moving_derivative,
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();

        if samples.is_empty() {
            return Err(RegistrationError::empty_sample(format!(
                "none of the {} sampled fixed points map inside the moving image",
                offsets.len()
            )));
        }
        Ok(samples)
    }

    fn histogram(&self, samples: &[SamplePoint]) -> JointHistogram {
        let mut histogram = JointHistogram::new(self.histogram_bins());
        for sample in samples {
            histogram.accumulate(&sample.contribution);
        }
        histogram.normalize();
        histogram
    }
}

impl Metric for MattesMutualInformation {
    fn value_and_derivative(&mut self, transform: &RigidTransform) -> Result<MetricEvaluation> {
        let samples = self.collect_samples(transform, true)?;
        let histogram = self.histogram(&samples);
        let mutual_information = histogram.mutual_information();

        let bins = histogram.bins();
        let log_ratios = histogram.log_ratios();
        let partials: Vec<RigidParameters> = samples
            .par_chunks(CHUNK_SIZE)
            .map(|chunk| {
                chunk.iter().fold(RigidParameters::zeros(), |acc, sample| {
                    let c = &sample.contribution;
                    let row = c.fixed_bin * bins + c.moving_start;
                    let weight: f64 = c
                        .weight_derivatives()
                        .iter()
                        .enumerate()
                        .map(|(k, dw)| dw * log_ratios[row + k])
                        .sum();
                    acc + sample.moving_derivative * weight
                })
            })
            .collect();

        let total = partials
            .into_iter()
            .fold(RigidParameters::zeros(), |acc, partial| acc + partial);
        let normalizer = samples.len() as f64 * self.moving_binning.bin_size();
        let derivative = -total / normalizer;

        if !mutual_information.is_finite() || derivative.iter().any(|d| !d.is_finite()) {
            return Err(RegistrationError::numerical_instability(format!(
                "non-finite mutual information or derivative ({})",
                mutual_information
            )));
        }

        Ok(MetricEvaluation {
            value: -mutual_information,
            derivative,
            valid_samples: samples.len(),
        })
    }

    fn name(&self) -> &'static str {
        "MattesMutualInformation"
    }
}
