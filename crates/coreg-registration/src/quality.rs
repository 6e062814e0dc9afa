//! Alignment quality evaluation from body-mask overlap.
//!
//! The CT is segmented with a fixed HU threshold and the aligned MRI with
//! Otsu's threshold. The CT mask is restricted to the MRI mask before it is
//! compared, so CT anatomy outside the MRI field of view does not count
//! against the alignment.

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use coreg_core::image::{Image, ImageBuffer};
use coreg_core::segmentation::{restricted_overlap, BinaryMask, BodyMaskSegmenter, LabelOverlapMeasures, Modality, SegmentationConfig};

use crate::error::Result;

/// Non-fatal problems found during quality evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QualityWarning {
    /// Segmentation produced an empty mask.
    DegenerateMask { modality: Modality },
}

impl std::fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityWarning::DegenerateMask { modality } => {
                write!(f, "{:?} body mask is empty; overlap is undefined and reported as 0", modality)
            }
        }
    }
}

/// Overlap statistics between the restricted CT mask and the MRI mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub overlap: LabelOverlapMeasures,
    pub ct_voxels: usize,
    pub mri_voxels: usize,
    pub warnings: Vec<QualityWarning>,
}

impl QualityReport {
    pub fn dice(&self) -> f64 {
        self.overlap.dice()
    }

    pub fn jaccard(&self) -> f64 {
        self.overlap.jaccard()
    }

    pub fn is_degenerate(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Report plus the masks it was computed from.
#[derive(Debug, Clone)]
pub struct QualityEvaluation {
    pub report: QualityReport,
    pub ct_mask: BinaryMask,
    pub mri_mask: BinaryMask,
}

/// Segment both volumes (which must share a grid) and measure their overlap.
pub fn evaluate_buffers(ct: &ImageBuffer, mri_aligned: &ImageBuffer, config: &SegmentationConfig) -> Result<QualityEvaluation> {
    ct.grid().ensure_same_geometry(mri_aligned.grid())?;

    let segmenter = BodyMaskSegmenter::new(config.clone());
    let ct_mask = segmenter.segment(ct, Modality::Ct);
    let mri_mask = segmenter.segment(mri_aligned, Modality::Mri);

    let mut warnings = Vec::new();
    for (mask, modality) in [(&ct_mask, Modality::Ct), (&mri_mask, Modality::Mri)] {
        if mask.is_empty() {
            let warning = QualityWarning::DegenerateMask { modality };
            warn!("{}", warning);
            warnings.push(warning);
        }
    }

    let overlap = restricted_overlap(&ct_mask, &mri_mask)?;
    info!(
        ct_voxels = ct_mask.count(),
        mri_voxels = mri_mask.count(),
        intersection = overlap.intersection,
        "Dice: {:.4}, Jaccard: {:.4}",
        overlap.dice(),
        overlap.jaccard()
    );

    Ok(QualityEvaluation {
        report: QualityReport {
            overlap,
            ct_voxels: ct_mask.count(),
            mri_voxels: mri_mask.count(),
            warnings,
        },
        ct_mask,
        mri_mask,
    })
}

/// [`evaluate_buffers`] on tensor-backed images.
pub fn evaluate_alignment_quality<B: Backend>(
    ct: &Image<B, 3>,
    mri_aligned: &Image<B, 3>,
    config: &SegmentationConfig,
) -> Result<QualityEvaluation> {
    evaluate_buffers(&ct.to_buffer()?, &mri_aligned.to_buffer()?, config)
}
