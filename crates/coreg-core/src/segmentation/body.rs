//! Body-mask segmentation.

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::Result;
use crate::filter::{binary_threshold, fill_holes, keep_largest_component, otsu_threshold};
use crate::image::{Image, ImageBuffer};
use super::mask::BinaryMask;

/// Imaging modality, selecting the thresholding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modality {
    /// Fixed Hounsfield threshold.
    Ct,
    /// Otsu threshold.
    Mri,
}

/// Parameters of the body-mask segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// CT voxels strictly above this value are foreground (HU).
    pub ct_threshold: f64,
    /// Histogram bins used by the MRI Otsu threshold.
    pub otsu_bins: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            ct_threshold: -300.0,
            otsu_bins: 128,
        }
    }
}

impl SegmentationConfig {
    pub fn with_ct_threshold(mut self, threshold: f64) -> Self {
        self.ct_threshold = threshold;
        self
    }

    pub fn with_otsu_bins(mut self, bins: usize) -> Self {
        self.otsu_bins = bins;
        self
    }
}

/// Derives a single connected foreground region from a volume.
///
/// Threshold, fill holes, keep the largest 6-connected component, fill holes
/// again. The result is one component, or empty when nothing passes the
/// threshold.
#[derive(Debug, Clone, Default)]
pub struct BodyMaskSegmenter {
    config: SegmentationConfig,
}

impl BodyMaskSegmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Intensity threshold used for `modality` on `image`.
    pub fn threshold(&self, image: &ImageBuffer, modality: Modality) -> f64 {
        match modality {
            Modality::Ct => self.config.ct_threshold,
            Modality::Mri => otsu_threshold(image.values(), self.config.otsu_bins),
        }
    }

    /// Segment a host snapshot.
    pub fn segment(&self, image: &ImageBuffer, modality: Modality) -> BinaryMask {
        let threshold = self.threshold(image, modality);
        let raw = binary_threshold(image, threshold);
        let filled = fill_holes(&raw);
        let largest = keep_largest_component(&filled);
        let mask = fill_holes(&largest);
        debug!(
            ?modality,
            threshold,
            thresholded = raw.count(),
            kept = mask.count(),
            "body mask segmented"
        );
        mask
    }

    /// Segment a tensor-backed image.
    pub fn segment_image<B: Backend>(&self, image: &Image<B, 3>, modality: Modality) -> Result<BinaryMask> {
        Ok(self.segment(&image.to_buffer()?, modality))
    }
}
