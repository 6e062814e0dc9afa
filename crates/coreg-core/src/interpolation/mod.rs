//! Interpolation types and operations.
//!
//! This module provides interpolation traits and implementations
//! for sampling values at continuous coordinates.

pub mod trait_;
pub mod linear;
pub mod nearest;

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use crate::image::ImageBuffer;

pub use trait_::{Interpolator, INDEX_SNAP_TOLERANCE};
pub use linear::LinearInterpolator;
pub use nearest::NearestNeighborInterpolator;

/// Interpolation rule selected at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InterpolatorKind {
    #[default]
    Linear,
    NearestNeighbor,
}

impl<B: Backend> Interpolator<B> for InterpolatorKind {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            InterpolatorKind::Linear => LinearInterpolator.interpolate(data, indices),
            InterpolatorKind::NearestNeighbor => NearestNeighborInterpolator.interpolate(data, indices),
        }
    }

    fn evaluate(&self, image: &ImageBuffer, index: [f64; 3]) -> f64 {
        match self {
            InterpolatorKind::Linear => Interpolator::<B>::evaluate(&LinearInterpolator, image, index),
            InterpolatorKind::NearestNeighbor => {
                Interpolator::<B>::evaluate(&NearestNeighborInterpolator, image, index)
            }
        }
    }
}
