//! Image grid metadata.
//!
//! An [`ImageGrid`] describes where the voxels of a 3-D image live in
//! physical space: size, origin, spacing and direction cosines.

use burn::tensor::{Tensor, TensorData};
use burn::tensor::backend::Backend;
use nalgebra::Matrix3;
use crate::error::{ImageError, Result};
use crate::spatial::{Point3, Spacing3, Direction3, Vector3};

/// Relative tolerance used when comparing two grids.
pub const GEOMETRY_TOLERANCE: f64 = 1e-6;

/// Voxel grid of a 3-D image.
///
/// `size` is ordered `(Nx, Ny, Nz)`, matching continuous indices `(x, y, z)`.
/// The physical position of index `i` is `origin + direction * (i * spacing)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageGrid {
    size: [usize; 3],
    origin: Point3,
    spacing: Spacing3,
    direction: Direction3,
    inverse_direction: Matrix3<f64>,
}

impl ImageGrid {
    /// Create a grid. Use [`ImageGrid::validate`] to check the invariants.
    pub fn new(size: [usize; 3], origin: Point3, spacing: Spacing3, direction: Direction3) -> Self {
        let inverse_direction = direction
            .0
            .try_inverse()
            .unwrap_or_else(|| direction.0.transpose());
        Self {
            size,
            origin,
            spacing,
            direction,
            inverse_direction,
        }
    }

    /// Unit spacing, zero origin, identity direction.
    pub fn with_size(size: [usize; 3]) -> Self {
        Self::new(size, Point3::origin(), Spacing3::uniform(1.0), Direction3::identity())
    }

    /// Number of voxels along `(x, y, z)`.
    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    /// Tensor shape `[Nz, Ny, Nx]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.size[2], self.size[1], self.size[0]]
    }

    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing3 {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction3 {
        &self.direction
    }

    /// Total number of voxels.
    pub fn num_voxels(&self) -> usize {
        self.size.iter().product()
    }

    /// Check positive spacing, non-empty size and orthonormal direction.
    pub fn validate(&self) -> Result<()> {
        if !self.spacing.is_valid() {
            return Err(ImageError::InvalidSpacing(self.spacing.to_array()));
        }
        if self.size.iter().any(|&n| n == 0) {
            return Err(ImageError::geometry(format!("empty grid {:?}", self.size)));
        }
        if !self.direction.is_orthonormal(GEOMETRY_TOLERANCE * 10.0) {
            return Err(ImageError::NonOrthonormalDirection);
        }
        Ok(())
    }

    /// Linear offset of voxel `(x, y, z)`; x runs fastest.
    #[inline]
    pub fn linear_index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.size[1] + y) * self.size[0] + x
    }

    /// Inverse of [`ImageGrid::linear_index`].
    #[inline]
    pub fn voxel_index(&self, offset: usize) -> [usize; 3] {
        let plane = self.size[0] * self.size[1];
        let z = offset / plane;
        let rem = offset % plane;
        [rem % self.size[0], rem / self.size[0], z]
    }

    /// Physical point of a continuous index.
    pub fn index_to_physical(&self, index: [f64; 3]) -> Point3 {
        let mut scaled = Vector3::zeros();
        for i in 0..3 {
            scaled[i] = index[i] * self.spacing[i];
        }
        self.origin + self.direction * scaled
    }

    /// Continuous index of a physical point.
    pub fn physical_to_index(&self, point: &Point3) -> [f64; 3] {
        let diff = (*point - self.origin).0;
        let rotated = self.inverse_direction * diff;
        [
            rotated[0] / self.spacing[0],
            rotated[1] / self.spacing[1],
            rotated[2] / self.spacing[2],
        ]
    }

    /// Inside test for continuous indices: `[-0.5, N - 0.5)` on every axis.
    #[inline]
    pub fn is_inside(&self, index: &[f64; 3]) -> bool {
        (0..3).all(|i| index[i] >= -0.5 && index[i] < self.size[i] as f64 - 0.5)
    }

    /// Physical centre of the voxel grid (continuous index `(N - 1) / 2`).
    pub fn center(&self) -> Point3 {
        self.index_to_physical([
            (self.size[0] as f64 - 1.0) / 2.0,
            (self.size[1] as f64 - 1.0) / 2.0,
            (self.size[2] as f64 - 1.0) / 2.0,
        ])
    }

    /// Physical positions of the 8 corner voxels.
    pub fn corners(&self) -> [Point3; 8] {
        let mut corners = [Point3::origin(); 8];
        for (bits, corner) in corners.iter_mut().enumerate() {
            let mut index = [0.0; 3];
            for (axis, value) in index.iter_mut().enumerate() {
                if bits & (1 << axis) != 0 {
                    *value = (self.size[axis] - 1) as f64;
                }
            }
            *corner = self.index_to_physical(index);
        }
        corners
    }

    /// Same size and, within a relative tolerance, the same origin,
    /// spacing and direction.
    pub fn same_geometry(&self, other: &ImageGrid, tolerance: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0);
        self.size == other.size
            && (0..3).all(|i| close(self.origin[i], other.origin[i]))
            && (0..3).all(|i| close(self.spacing[i], other.spacing[i]))
            && (0..3).all(|r| (0..3).all(|c| close(self.direction[(r, c)], other.direction[(r, c)])))
    }

    /// Fail with `InvalidGeometry` when the grids differ.
    pub fn ensure_same_geometry(&self, other: &ImageGrid) -> Result<()> {
        if self.same_geometry(other, GEOMETRY_TOLERANCE) {
            Ok(())
        } else {
            Err(ImageError::geometry(format!(
                "grid {:?} (spacing {:?}) does not match grid {:?} (spacing {:?})",
                self.size,
                self.spacing.to_array(),
                other.size,
                other.spacing.to_array()
            )))
        }
    }

    /// Batch transform physical points `[Batch, 3]` to continuous indices.
    pub fn world_to_index_tensor<B: Backend>(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let origin = self.origin_tensor::<B>(&device);

        // I = (P - O) @ T with T[r, c] = inv_dir[c, r] / spacing[c]
        let mut t_data = Vec::with_capacity(9);
        for r in 0..3 {
            for c in 0..3 {
                t_data.push((self.inverse_direction[(c, r)] / self.spacing[c]) as f32);
            }
        }
        let t = Tensor::<B, 2>::from_data(TensorData::new(t_data, [3, 3]), &device);

        (points - origin).matmul(t)
    }

    /// Batch transform continuous indices `[Batch, 3]` to physical points.
    pub fn index_to_world_tensor<B: Backend>(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        let origin = self.origin_tensor::<B>(&device);

        // P = O + I @ M with M[r, c] = spacing[r] * dir[c, r]
        let mut m_data = Vec::with_capacity(9);
        for r in 0..3 {
            for c in 0..3 {
                m_data.push((self.spacing[r] * self.direction[(c, r)]) as f32);
            }
        }
        let m = Tensor::<B, 2>::from_data(TensorData::new(m_data, [3, 3]), &device);

        indices.matmul(m) + origin
    }

    fn origin_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let origin: Vec<f32> = (0..3).map(|i| self.origin[i] as f32).collect();
        Tensor::<B, 1>::from_data(TensorData::new(origin, [3]), device).reshape([1, 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn rotated_grid() -> ImageGrid {
        let mut direction = Direction3::from_matrix(nalgebra::Matrix3::zeros());
        direction[(0, 1)] = -1.0;
        direction[(1, 0)] = 1.0;
        direction[(2, 2)] = 1.0;
        ImageGrid::new(
            [4, 5, 6],
            Point3::new([10.0, -5.0, 2.0]),
            Spacing3::new([0.5, 2.0, 1.5]),
            direction,
        )
    }

    #[test]
    fn test_index_physical_roundtrip() {
        let grid = rotated_grid();
        let index = [1.25, 3.5, 4.0];
        let point = grid.index_to_physical(index);
        let back = grid.physical_to_index(&point);
        for i in 0..3 {
            assert!((back[i] - index[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_index_to_physical_uses_direction_columns() {
        let grid = rotated_grid();
        // One step along x moves along the first direction column (0, 1, 0).
        let p0 = grid.index_to_physical([0.0, 0.0, 0.0]);
        let p1 = grid.index_to_physical([1.0, 0.0, 0.0]);
        let d = p1 - p0;
        assert!((d[0]).abs() < 1e-12);
        assert!((d[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_linear_and_voxel_index() {
        let grid = ImageGrid::with_size([4, 5, 6]);
        let offset = grid.linear_index(3, 2, 1);
        assert_eq!(offset, (5 + 2) * 4 + 3);
        assert_eq!(grid.voxel_index(offset), [3, 2, 1]);
        assert_eq!(grid.shape(), [6, 5, 4]);
    }

    #[test]
    fn test_inside_test_bounds() {
        let grid = ImageGrid::with_size([4, 4, 4]);
        assert!(grid.is_inside(&[-0.5, 0.0, 3.49]));
        assert!(!grid.is_inside(&[-0.51, 0.0, 0.0]));
        assert!(!grid.is_inside(&[0.0, 3.5, 0.0]));
    }

    #[test]
    fn test_center_and_corners() {
        let grid = ImageGrid::new(
            [3, 5, 7],
            Point3::new([1.0, 1.0, 1.0]),
            Spacing3::new([2.0, 1.0, 1.0]),
            Direction3::identity(),
        );
        let center = grid.center();
        assert_eq!(center.to_array(), [3.0, 3.0, 4.0]);
        let corners = grid.corners();
        assert_eq!(corners[0].to_array(), [1.0, 1.0, 1.0]);
        assert_eq!(corners[7].to_array(), [5.0, 5.0, 7.0]);
    }

    #[test]
    fn test_validate_rejects_bad_geometry() {
        let mut grid = ImageGrid::with_size([2, 2, 2]);
        assert!(grid.validate().is_ok());

        grid = ImageGrid::new([2, 2, 2], Point3::origin(), Spacing3::new([1.0, 0.0, 1.0]), Direction3::identity());
        assert!(matches!(grid.validate(), Err(ImageError::InvalidSpacing(_))));

        let mut skew = Direction3::identity();
        skew[(0, 1)] = 0.5;
        grid = ImageGrid::new([2, 2, 2], Point3::origin(), Spacing3::uniform(1.0), skew);
        assert_eq!(grid.validate(), Err(ImageError::NonOrthonormalDirection));
    }

    #[test]
    fn test_same_geometry_tolerance() {
        let a = rotated_grid();
        let mut origin = *a.origin();
        origin[0] += 1e-9;
        let b = ImageGrid::new(a.size(), origin, *a.spacing(), *a.direction());
        assert!(a.same_geometry(&b, GEOMETRY_TOLERANCE));
        assert!(a.ensure_same_geometry(&ImageGrid::with_size([4, 5, 6])).is_err());
    }

    #[test]
    fn test_tensor_mappings_match_host() {
        let device = Default::default();
        let grid = rotated_grid();
        let indices = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0], [0.5, 0.0, 5.0]], &device);
        let points = grid.index_to_world_tensor(indices.clone());
        let data = points.clone().into_data();
        let slice = data.as_slice::<f32>().unwrap();
        let expected = grid.index_to_physical([1.0, 2.0, 3.0]);
        for i in 0..3 {
            assert!((slice[i] as f64 - expected[i]).abs() < 1e-4);
        }

        let back = grid.world_to_index_tensor(points).into_data();
        let back = back.as_slice::<f32>().unwrap();
        assert!((back[3] - 0.5).abs() < 1e-4);
        assert!((back[5] - 5.0).abs() < 1e-4);
    }
}
