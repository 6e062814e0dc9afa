//! CT/MRI co-registration pipeline.
//!
//! CT is the fixed image, MRI the moving one:
//!
//! 1. cast CT to `Float32`; cast MRI to `Float32` and shift its minimum to 0;
//! 2. register MRI onto CT (centred initialisation, Mattes MI, gradient descent);
//! 3. resample the shifted MRI onto the CT grid and cast it back to the MRI's
//!    original pixel kind;
//! 4. segment both and measure the body-mask overlap.

use std::sync::Arc;

use burn::tensor::backend::Backend;
use tracing::info;

use coreg_core::filter::{cast_image, shift_to_zero_minimum, ResampleImageFilter};
use coreg_core::image::{Image, PixelKind};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::progress::{CancellationToken, ProgressCallback};
use crate::quality::{evaluate_alignment_quality, QualityEvaluation};
use crate::registration::{ImageRegistrationMethod, RegistrationResult};

/// Everything the pipeline produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput<B: Backend> {
    /// CT as registered (`Float32`).
    pub ct_fixed: Image<B, 3>,
    /// MRI resampled onto the CT grid, in the MRI's original pixel kind.
    pub mri_aligned: Image<B, 3>,
    pub registration: RegistrationResult,
    pub quality: QualityEvaluation,
    /// Intensity shift added to the MRI before registration.
    pub mri_shift: f64,
}

/// Runs registration, resampling and quality evaluation for one CT/MRI pair.
#[derive(Debug, Clone)]
pub struct CoRegistrationPipeline {
    config: PipelineConfig,
    method: ImageRegistrationMethod,
}

impl CoRegistrationPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let method = ImageRegistrationMethod::new(config.registration.clone());
        Ok(Self { config, method })
    }

    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.method = self.method.with_callback(callback);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.method.cancellation_token()
    }

    pub fn run<B: Backend>(&self, ct: &Image<B, 3>, mri: &Image<B, 3>) -> Result<PipelineOutput<B>> {
        log_image_info("CT", ct);
        log_image_info("MRI", mri);

        let ct_fixed = cast_image(ct, PixelKind::Float32);
        let (mri_moving, mri_shift) = shift_to_zero_minimum(&cast_image(mri, PixelKind::Float32));
        info!("MRI intensities shifted by {} before registration", mri_shift);

        let registration = self.method.execute(&ct_fixed, &mri_moving)?;
        info!("Optimizer stop condition: {}", registration.stop_description());
        if let Some(value) = registration.metric_value() {
            info!("Final metric value: {:.6}", value);
        }
        info!(
            "Final transform: angles {:?} rad, translation {:?} mm, center {:?}",
            registration.transform.angles(),
            registration.transform.translation().to_array(),
            registration.transform.center().to_array()
        );

        let resampler = ResampleImageFilter::new_from_reference(
            &ct_fixed,
            registration.transform,
            self.config.resample_interpolator,
        )
        .with_default_pixel_value(self.config.default_pixel_value);
        let mri_aligned = cast_image(&resampler.apply(&mri_moving), mri.pixel_kind());
        log_image_info("Aligned MRI", &mri_aligned);

        let quality = evaluate_alignment_quality(&ct_fixed, &mri_aligned, &self.config.segmentation)?;

        Ok(PipelineOutput {
            ct_fixed,
            mri_aligned,
            registration,
            quality,
            mri_shift,
        })
    }
}

/// Log origin, spacing, size, direction and pixel kind.
pub fn log_image_info<B: Backend>(label: &str, image: &Image<B, 3>) {
    let grid = image.grid();
    let d = grid.direction();
    info!(
        "{}: size {:?}, origin {:?}, spacing {:?}, direction [{}], pixel {}",
        label,
        grid.size(),
        grid.origin().to_array(),
        grid.spacing().to_array(),
        (0..3)
            .flat_map(|r| (0..3).map(move |c| (r, c)))
            .map(|(r, c)| format!("{:.4}", d[(r, c)]))
            .collect::<Vec<_>>()
            .join(", "),
        image.pixel_kind()
    );
}
