//! Similarity metrics.
//!
//! Only Mattes mutual information is provided; it is the metric suited to
//! multi-modal (CT/MRI) alignment.

pub mod trait_;
pub mod histogram;
pub mod sampler;
pub mod mattes;

pub use trait_::{Metric, MetricEvaluation};
pub use histogram::{
    cubic_bspline, cubic_bspline_derivative, IntensityBinning, JointHistogram, ParzenContribution,
    HISTOGRAM_PADDING, PROBABILITY_EPSILON,
};
pub use sampler::VoxelSampler;
pub use mattes::MattesMutualInformation;
