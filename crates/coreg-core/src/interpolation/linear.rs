//! Trilinear interpolation.

use burn::tensor::{Tensor, Int};
use burn::tensor::backend::Backend;
use serde::{Serialize, Deserialize};
use crate::image::ImageBuffer;
use super::trait_::{index_columns, snap_index, snap_indices, Interpolator};

/// Linear Interpolator.
///
/// Weighted combination of the 8 surrounding voxels; neighbour indices are
/// clamped to the grid.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    /// Create a new linear interpolator.
    pub fn new() -> Self {
        Self
    }

    /// Interpolated value and its derivative with respect to the continuous
    /// index `(x, y, z)`.
    pub fn evaluate_with_derivative(&self, image: &ImageBuffer, index: [f64; 3]) -> (f64, [f64; 3]) {
        let [nx, ny, nz] = image.grid().size();
        let (x0, x1, wx) = corners(snap_index(index[0]), nx);
        let (y0, y1, wy) = corners(snap_index(index[1]), ny);
        let (z0, z1, wz) = corners(snap_index(index[2]), nz);

        let v = |x: usize, y: usize, z: usize| image.get(x, y, z) as f64;
        let v000 = v(x0, y0, z0);
        let v100 = v(x1, y0, z0);
        let v010 = v(x0, y1, z0);
        let v110 = v(x1, y1, z0);
        let v001 = v(x0, y0, z1);
        let v101 = v(x1, y0, z1);
        let v011 = v(x0, y1, z1);
        let v111 = v(x1, y1, z1);

        // Along x
        let c00 = v000 + (v100 - v000) * wx;
        let c10 = v010 + (v110 - v010) * wx;
        let c01 = v001 + (v101 - v001) * wx;
        let c11 = v011 + (v111 - v011) * wx;
        // Along y
        let c0 = c00 + (c10 - c00) * wy;
        let c1 = c01 + (c11 - c01) * wy;
        let value = c0 + (c1 - c0) * wz;

        let dx0 = (v100 - v000) + ((v110 - v010) - (v100 - v000)) * wy;
        let dx1 = (v101 - v001) + ((v111 - v011) - (v101 - v001)) * wy;
        let dx = if x1 == x0 { 0.0 } else { dx0 + (dx1 - dx0) * wz };

        let dy0 = c10 - c00;
        let dy1 = c11 - c01;
        let dy = if y1 == y0 { 0.0 } else { dy0 + (dy1 - dy0) * wz };

        let dz = if z1 == z0 { 0.0 } else { c1 - c0 };

        (value, [dx, dy, dz])
    }

    #[inline]
    fn gather_3d<B: Backend>(
        flat_data: &Tensor<B, 1>,
        xi: &Tensor<B, 1, Int>,
        yi: &Tensor<B, 1, Int>,
        zi: &Tensor<B, 1, Int>,
        stride_y: i32,
        stride_z: i32,
    ) -> Tensor<B, 1> {
        let idx = zi.clone() * stride_z + yi.clone() * stride_y + xi.clone();
        flat_data.clone().gather(0, idx)
    }
}

/// Lower and upper neighbour (clamped) and the weight of the upper one.
#[inline]
fn corners(c: f64, n: usize) -> (usize, usize, f64) {
    let last = n.saturating_sub(1) as f64;
    let base = c.floor();
    let weight = c - base;
    let lo = base.clamp(0.0, last) as usize;
    let hi = (base + 1.0).clamp(0.0, last) as usize;
    (lo, hi, weight)
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let [d0, d1, d2] = data.dims(); // Z, Y, X
        let batch_size = indices.dims()[0];
        let device = indices.device();

        let [x, y, z] = index_columns(snap_indices(indices));

        let x0 = x.clone().floor();
        let y0 = y.clone().floor();
        let z0 = z.clone().floor();

        let wx = x - x0.clone();
        let wy = y - y0.clone();
        let wz = z - z0.clone();

        let x1 = x0.clone() + 1.0;
        let y1 = y0.clone() + 1.0;
        let z1 = z0.clone() + 1.0;

        let x0_i = x0.clamp(0.0, (d2 - 1) as f64).int();
        let y0_i = y0.clamp(0.0, (d1 - 1) as f64).int();
        let z0_i = z0.clamp(0.0, (d0 - 1) as f64).int();

        let x1_i = x1.clamp(0.0, (d2 - 1) as f64).int();
        let y1_i = y1.clamp(0.0, (d1 - 1) as f64).int();
        let z1_i = z1.clamp(0.0, (d0 - 1) as f64).int();

        let stride_z = (d1 * d2) as i32;
        let stride_y = d2 as i32;

        let flat_data = data.clone().reshape([d0 * d1 * d2]);

        let v000 = Self::gather_3d(&flat_data, &x0_i, &y0_i, &z0_i, stride_y, stride_z);
        let v001 = Self::gather_3d(&flat_data, &x0_i, &y0_i, &z1_i, stride_y, stride_z);
        let v010 = Self::gather_3d(&flat_data, &x0_i, &y1_i, &z0_i, stride_y, stride_z);
        let v011 = Self::gather_3d(&flat_data, &x0_i, &y1_i, &z1_i, stride_y, stride_z);
        let v100 = Self::gather_3d(&flat_data, &x1_i, &y0_i, &z0_i, stride_y, stride_z);
        let v101 = Self::gather_3d(&flat_data, &x1_i, &y0_i, &z1_i, stride_y, stride_z);
        let v110 = Self::gather_3d(&flat_data, &x1_i, &y1_i, &z0_i, stride_y, stride_z);
        let v111 = Self::gather_3d(&flat_data, &x1_i, &y1_i, &z1_i, stride_y, stride_z);

        let one = Tensor::<B, 1>::ones([batch_size], &device);
        let one_minus_wx = one.clone() - wx.clone();
        let one_minus_wy = one.clone() - wy.clone();
        let one_minus_wz = one - wz.clone();

        // Along X
        let c00 = v000 * one_minus_wx.clone() + v100 * wx.clone();
        let c01 = v001 * one_minus_wx.clone() + v101 * wx.clone();
        let c10 = v010 * one_minus_wx.clone() + v110 * wx.clone();
        let c11 = v011 * one_minus_wx + v111 * wx;

        // Along Y
        let c0 = c00 * one_minus_wy.clone() + c10 * wy.clone();
        let c1 = c01 * one_minus_wy + c11 * wy;

        // Along Z
        c0 * one_minus_wz + c1 * wz
    }

    fn evaluate(&self, image: &ImageBuffer, index: [f64; 3]) -> f64 {
        self.evaluate_with_derivative(image, index).0
    }
}
