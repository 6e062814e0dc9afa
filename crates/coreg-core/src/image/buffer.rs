//! Host-side voxel snapshot.

use burn::tensor::{Tensor, TensorData};
use burn::tensor::backend::Backend;
use crate::error::{ImageError, Result};
use super::{Image, ImageGrid, PixelKind};

/// Voxel values of a 3-D image copied to host memory, x fastest.
///
/// Metric evaluation and mask segmentation read voxels one at a time in tight
/// loops, so they work on this snapshot rather than on the tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    grid: ImageGrid,
    values: Vec<f32>,
}

impl ImageBuffer {
    /// Wrap voxel values laid out in raster order over `grid`.
    pub fn new(grid: ImageGrid, values: Vec<f32>) -> Result<Self> {
        let expected = grid.num_voxels();
        if values.len() != expected {
            return Err(ImageError::DataLength {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { grid, values })
    }

    /// Caller guarantees `values.len() == grid.num_voxels()`.
    pub(crate) fn from_raw(grid: ImageGrid, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), grid.num_voxels());
        Self { grid, values }
    }

    pub fn grid(&self) -> &ImageGrid {
        &self.grid
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Value of voxel `(x, y, z)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.values[self.grid.linear_index(x, y, z)]
    }

    /// Smallest and largest finite voxel value. `(0, 0)` when no value is finite.
    pub fn min_max(&self) -> (f32, f32) {
        let (lo, hi) = self
            .values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if lo > hi {
            (0.0, 0.0)
        } else {
            (lo, hi)
        }
    }

    /// Upload to a tensor-backed image.
    pub fn to_image<B: Backend>(&self, pixel_kind: PixelKind, device: &B::Device) -> Image<B, 3> {
        let data = Tensor::<B, 1>::from_data(
            TensorData::new(self.values.clone(), [self.values.len()]),
            device,
        )
        .reshape(self.grid.shape());
        Image::new(
            data,
            *self.grid.origin(),
            *self.grid.spacing(),
            *self.grid.direction(),
        )
        .with_pixel_kind(pixel_kind)
    }
}
