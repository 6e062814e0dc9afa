//! Nearest neighbor interpolation implementation.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use serde::{Serialize, Deserialize};
use crate::image::ImageBuffer;
use super::trait_::{index_columns, Interpolator};

/// Nearest Neighbor Interpolator.
///
/// Picks the voxel whose centre is closest, halves rounding up; indices are
/// clamped to the grid. Used for label images and masks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NearestNeighborInterpolator;

impl NearestNeighborInterpolator {
    /// Create a new nearest neighbor interpolator.
    pub fn new() -> Self {
        Self
    }
}

#[inline]
fn nearest(c: f64, n: usize) -> usize {
    (c + 0.5).floor().clamp(0.0, n.saturating_sub(1) as f64) as usize
}

impl<B: Backend> Interpolator<B> for NearestNeighborInterpolator {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let [d0, d1, d2] = data.dims(); // Z, Y, X
        let [x, y, z] = index_columns(indices);

        let x_i = (x + 0.5).floor().clamp(0.0, (d2 - 1) as f64).int();
        let y_i = (y + 0.5).floor().clamp(0.0, (d1 - 1) as f64).int();
        let z_i = (z + 0.5).floor().clamp(0.0, (d0 - 1) as f64).int();

        let stride_z = (d1 * d2) as i32;
        let stride_y = d2 as i32;

        let idx = z_i * stride_z + y_i * stride_y + x_i;
        let flat_data = data.clone().reshape([d0 * d1 * d2]);
        flat_data.gather(0, idx)
    }

    fn evaluate(&self, image: &ImageBuffer, index: [f64; 3]) -> f64 {
        let [nx, ny, nz] = image.grid().size();
        image.get(nearest(index[0], nx), nearest(index[1], ny), nearest(index[2], nz)) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use crate::image::{tensor_from_fn, ImageGrid};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_nearest_3d() {
        let device = Default::default();
        let data = tensor_from_fn::<TestBackend>([2, 2, 2], &device, |x, y, z| (x + 2 * y + 4 * z) as f32);
        let indices = Tensor::<TestBackend, 2>::from_floats(
            [[0.1, 0.1, 0.1], [0.9, 0.1, 0.1], [0.6, 0.6, 0.6], [5.0, -3.0, 0.4]],
            &device,
        );
        let values = NearestNeighborInterpolator.interpolate(&data, indices).into_data();
        assert_eq!(values.as_slice::<f32>().unwrap(), &[0.0, 1.0, 7.0, 1.0]);
    }

    #[test]
    fn test_host_nearest_rounds_half_up() {
        let grid = ImageGrid::with_size([3, 1, 1]);
        let buffer = ImageBuffer::new(grid, vec![10.0, 20.0, 30.0]).unwrap();
        let interp = NearestNeighborInterpolator::new();
        assert_eq!(Interpolator::<TestBackend>::evaluate(&interp, &buffer, [0.5, 0.0, 0.0]), 20.0);
        assert_eq!(Interpolator::<TestBackend>::evaluate(&interp, &buffer, [1.49, 0.0, 0.0]), 20.0);
        assert_eq!(Interpolator::<TestBackend>::evaluate(&interp, &buffer, [7.0, 0.0, 0.0]), 30.0);
    }
}
