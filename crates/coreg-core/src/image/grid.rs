use burn::tensor::{Tensor, TensorData};
use burn::tensor::backend::Backend;

/// Generate the continuous indices of every voxel of a 3-D grid.
///
/// `size` is ordered `(Nx, Ny, Nz)`. Returns a tensor of shape `[N, 3]`
/// holding `(x, y, z)` rows in raster order (x fastest), matching the
/// memory layout of a `[Nz, Ny, Nx]` data tensor.
pub fn generate_grid_3d<B>(size: [usize; 3], device: &B::Device) -> Tensor<B, 2>
where
    B: Backend,
{
    let [w, h, d] = size;
    let total = d * h * w;

    let mut grid = Vec::with_capacity(total * 3);
    for z in 0..d {
        for y in 0..h {
            for x in 0..w {
                grid.push(x as f32);
                grid.push(y as f32);
                grid.push(z as f32);
            }
        }
    }

    Tensor::<B, 1>::from_data(TensorData::new(grid, [total * 3]), device).reshape([total, 3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    #[test]
    fn test_grid_raster_order() {
        let device = Default::default();
        let grid = generate_grid_3d::<NdArray<f32>>([2, 3, 1], &device);
        assert_eq!(grid.dims(), [6, 3]);
        let data = grid.into_data();
        let slice = data.as_slice::<f32>().unwrap();
        // Row 1 is (1, 0, 0), row 2 is (0, 1, 0)
        assert_eq!(&slice[3..6], &[1.0, 0.0, 0.0]);
        assert_eq!(&slice[6..9], &[0.0, 1.0, 0.0]);
    }
}
