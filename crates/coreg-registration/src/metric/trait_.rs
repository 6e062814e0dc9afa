//! Metric trait for image similarity measurement.

use coreg_core::transform::{RigidParameters, RigidTransform};
use crate::error::Result;

/// Cost value and its parameter derivative for one transform.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvaluation {
    /// Cost (lower is better). For mutual information this is `-MI`.
    pub value: f64,
    /// Derivative of the cost with respect to the transform parameters.
    pub derivative: RigidParameters,
    /// Samples that mapped inside the moving image.
    pub valid_samples: usize,
}

/// Similarity metric between a fixed and a moving image under a rigid
/// transform mapping fixed physical space into moving physical space.
///
/// Lower values indicate better alignment.
pub trait Metric {
    /// Evaluate the cost and its derivative.
    fn value_and_derivative(&mut self, transform: &RigidTransform) -> Result<MetricEvaluation>;

    /// Evaluate the cost only.
    fn value(&mut self, transform: &RigidTransform) -> Result<f64> {
        Ok(self.value_and_derivative(transform)?.value)
    }

    /// Get the name of this metric.
    fn name(&self) -> &'static str;
}
