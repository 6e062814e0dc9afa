//! Body-mask segmentation and mask overlap.

pub mod mask;
pub mod body;
pub mod overlap;

pub use mask::BinaryMask;
pub use body::{BodyMaskSegmenter, Modality, SegmentationConfig};
pub use overlap::{restricted_overlap, LabelOverlapMeasures};
