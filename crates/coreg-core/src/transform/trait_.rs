use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

/// Maps physical points of the fixed space into the moving space.
///
/// The resampler pulls every output voxel centre through this mapping, so
/// implementations work on whole `[N, D]` point batches.
pub trait Transform<B: Backend, const D: usize> {
    /// `points` and the result are `[N, D]` physical coordinates.
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}
