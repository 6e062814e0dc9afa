//! Binary masks over an image grid.

use burn::tensor::backend::Backend;
use crate::error::{ImageError, Result};
use crate::image::{Image, ImageBuffer, ImageGrid, PixelKind};

/// Boolean voxels on an [`ImageGrid`], x fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    grid: ImageGrid,
    voxels: Vec<bool>,
}

impl BinaryMask {
    pub fn new(grid: ImageGrid, voxels: Vec<bool>) -> Result<Self> {
        let expected = grid.num_voxels();
        if voxels.len() != expected {
            return Err(ImageError::DataLength {
                expected,
                actual: voxels.len(),
            });
        }
        Ok(Self { grid, voxels })
    }

    /// All-background mask.
    pub fn empty(grid: ImageGrid) -> Self {
        let voxels = vec![false; grid.num_voxels()];
        Self { grid, voxels }
    }

    /// Mask set where `predicate(x, y, z)` holds.
    pub fn from_fn(grid: ImageGrid, predicate: impl Fn(usize, usize, usize) -> bool) -> Self {
        let voxels = (0..grid.num_voxels())
            .map(|offset| {
                let [x, y, z] = grid.voxel_index(offset);
                predicate(x, y, z)
            })
            .collect();
        Self { grid, voxels }
    }

    /// Caller guarantees `voxels.len() == grid.num_voxels()`.
    pub(crate) fn from_buffer_voxels(grid: ImageGrid, voxels: Vec<bool>) -> Self {
        debug_assert_eq!(voxels.len(), grid.num_voxels());
        Self { grid, voxels }
    }

    pub fn grid(&self) -> &ImageGrid {
        &self.grid
    }

    pub fn voxels(&self) -> &[bool] {
        &self.voxels
    }

    pub fn into_voxels(self) -> Vec<bool> {
        self.voxels
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> bool {
        self.voxels[self.grid.linear_index(x, y, z)]
    }

    /// Number of foreground voxels.
    pub fn count(&self) -> usize {
        self.voxels.iter().filter(|&&v| v).count()
    }

    /// True when no voxel is set.
    pub fn is_empty(&self) -> bool {
        !self.voxels.iter().any(|&v| v)
    }

    /// Voxel-wise AND. Both masks must share the same grid.
    pub fn and(&self, other: &BinaryMask) -> Result<BinaryMask> {
        self.grid.ensure_same_geometry(&other.grid)?;
        let voxels = self
            .voxels
            .iter()
            .zip(&other.voxels)
            .map(|(&a, &b)| a && b)
            .collect();
        Ok(Self {
            grid: self.grid,
            voxels,
        })
    }

    /// Foreground as 1, background as 0.
    pub fn to_buffer(&self) -> ImageBuffer {
        let values = self.voxels.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();
        ImageBuffer::from_raw(self.grid, values)
    }

    /// Upload as an 8-bit unsigned label image.
    pub fn to_image<B: Backend>(&self, device: &B::Device) -> Image<B, 3> {
        self.to_buffer().to_image(PixelKind::UInt8, device)
    }
}
