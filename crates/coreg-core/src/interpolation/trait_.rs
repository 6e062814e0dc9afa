//! Interpolator trait for sampling values at continuous coordinates.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use crate::image::ImageBuffer;

/// Continuous indices closer than this to an integer are snapped to it, so
/// sampling exactly on grid points reproduces voxel values.
pub const INDEX_SNAP_TOLERANCE: f64 = 1e-4;

/// Interpolator trait for sampling values at continuous coordinates.
///
/// Implementors provide a batched tensor path (used by the resampler) and a
/// single-point host path (used by the metric).
///
/// # Type Parameters
/// * `B` - The Burn backend
pub trait Interpolator<B: Backend> {
    /// Interpolate values from a `[Nz, Ny, Nx]` volume at continuous indices.
    ///
    /// # Arguments
    /// * `data` - The source volume
    /// * `indices` - `[Batch, 3]` continuous indices ordered `(x, y, z)`
    ///
    /// # Returns
    /// Tensor of sampled values `[Batch]`
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1>;

    /// Interpolate a host snapshot at one continuous index.
    fn evaluate(&self, image: &ImageBuffer, index: [f64; 3]) -> f64;
}

/// Snap indices lying within [`INDEX_SNAP_TOLERANCE`] of an integer.
pub(crate) fn snap_indices<B: Backend>(indices: Tensor<B, 2>) -> Tensor<B, 2> {
    let rounded = indices.clone().round();
    let near = (indices.clone() - rounded.clone())
        .abs()
        .lower_elem(INDEX_SNAP_TOLERANCE);
    indices.mask_where(near, rounded)
}

#[inline]
pub(crate) fn snap_index(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < INDEX_SNAP_TOLERANCE {
        rounded
    } else {
        value
    }
}

/// Split `[Batch, 3]` indices into x, y and z columns.
pub(crate) fn index_columns<B: Backend>(indices: Tensor<B, 2>) -> [Tensor<B, 1>; 3] {
    let x = indices.clone().narrow(1, 0, 1).squeeze::<1>(1);
    let y = indices.clone().narrow(1, 1, 1).squeeze::<1>(1);
    let z = indices.narrow(1, 2, 1).squeeze::<1>(1);
    [x, y, z]
}
