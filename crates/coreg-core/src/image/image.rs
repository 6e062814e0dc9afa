//! Image type with physical metadata and coordinate transformations.
//!
//! This module provides the Image struct which represents medical images
//! with tensor data and physical space metadata (origin, spacing, direction).

use burn::tensor::{Tensor, TensorData};
use burn::tensor::backend::Backend;
use crate::error::{ImageError, Result};
use crate::spatial::{Point, Point3, Spacing, Direction, Vector};
use super::{ImageBuffer, ImageGrid, PixelKind};

/// Medical image with physical metadata.
///
/// The Image type combines tensor data with physical space metadata that
/// describes how image indices map to physical coordinates. Values are held
/// as 32-bit floats; `pixel_kind` records the nominal scalar type.
///
/// # Type Parameters
/// * `B` - The backend (CPU or GPU) for tensor operations
/// * `D` - The dimensionality of the image
///
/// # Coordinate Systems
/// * **Index Space**: continuous indices ordered `(x, y, z)`; the data tensor
///   is shaped `[Nz, Ny, Nx]`
/// * **Physical Space**: `point = origin + direction * (index * spacing)`
///
/// # Examples
/// ```rust
/// use coreg_core::Image;
/// use coreg_core::spatial::{Point3, Spacing3, Direction3};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
/// let image = Image::new(data, Point3::origin(), Spacing3::uniform(1.0), Direction3::identity());
/// assert_eq!(image.size(), [10, 10, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
    pixel_kind: PixelKind,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new `Float32` image with the given data and metadata.
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Self {
        Self {
            data,
            origin,
            spacing,
            direction,
            pixel_kind: PixelKind::Float32,
        }
    }

    /// Set the nominal pixel kind.
    pub fn with_pixel_kind(mut self, pixel_kind: PixelKind) -> Self {
        self.pixel_kind = pixel_kind;
        self
    }

    /// Same geometry and pixel kind, new voxel values.
    pub fn with_data(&self, data: Tensor<B, D>) -> Self {
        Self {
            data,
            origin: self.origin,
            spacing: self.spacing,
            direction: self.direction,
            pixel_kind: self.pixel_kind,
        }
    }

    /// Get the image data tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    /// Get the origin (physical coordinate of first pixel).
    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    /// Get the spacing (physical distance between pixels).
    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    /// Get the direction (orientation matrix).
    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    pub fn pixel_kind(&self) -> PixelKind {
        self.pixel_kind
    }

    /// Tensor shape (slowest axis first).
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Convert a continuous physical point to a continuous index.
    ///
    /// `index = (Direction^-1 * (point - origin)) / spacing`
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        let diff = *point - self.origin;
        let inv_dir = self
            .direction
            .0
            .try_inverse()
            .unwrap_or_else(|| self.direction.0.transpose());
        let rotated = inv_dir * diff.0;

        let mut index = Point::<D>::origin();
        for i in 0..D {
            index[i] = rotated[i] / self.spacing[i];
        }
        index
    }

    /// Convert a continuous index to a physical point.
    ///
    /// `point = origin + Direction * (index * spacing)`
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        let mut scaled_index = Vector::<D>::zeros();
        for i in 0..D {
            scaled_index[i] = index[i] * self.spacing[i];
        }
        self.origin + self.direction * scaled_index
    }
}

impl<B: Backend> Image<B, 3> {
    /// Build an image from raster-ordered voxel values on `grid`.
    pub fn from_values(
        grid: &ImageGrid,
        values: Vec<f32>,
        pixel_kind: PixelKind,
        device: &B::Device,
    ) -> Result<Self> {
        Ok(ImageBuffer::new(*grid, values)?.to_image(pixel_kind, device))
    }

    /// Number of voxels along `(x, y, z)`.
    pub fn size(&self) -> [usize; 3] {
        let [nz, ny, nx] = self.shape();
        [nx, ny, nz]
    }

    /// The voxel grid of this image.
    pub fn grid(&self) -> ImageGrid {
        ImageGrid::new(self.size(), self.origin, self.spacing, self.direction)
    }

    /// Check the geometry invariants (positive spacing, orthonormal direction).
    pub fn validate_geometry(&self) -> Result<()> {
        self.grid().validate()
    }

    /// Copy the voxel values to host memory.
    pub fn to_buffer(&self) -> Result<ImageBuffer> {
        let values = self
            .data
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(ImageError::tensor_data)?;
        ImageBuffer::new(self.grid(), values)
    }

    /// Batch transform physical points `[Batch, 3]` to continuous indices.
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        self.grid().world_to_index_tensor(points)
    }

    /// Batch transform continuous indices `[Batch, 3]` to physical points.
    pub fn index_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        self.grid().index_to_world_tensor(indices)
    }

    /// Physical centre of the voxel grid.
    pub fn center(&self) -> Point3 {
        self.grid().center()
    }
}

/// Fill a `[Nz, Ny, Nx]` tensor from a closure of `(x, y, z)`.
pub fn tensor_from_fn<B: Backend>(
    size: [usize; 3],
    device: &B::Device,
    f: impl Fn(usize, usize, usize) -> f32,
) -> Tensor<B, 3> {
    let [nx, ny, nz] = size;
    let mut values = Vec::with_capacity(nx * ny * nz);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                values.push(f(x, y, z));
            }
        }
    }
    Tensor::<B, 1>::from_data(TensorData::new(values, [nx * ny * nz]), device).reshape([nz, ny, nx])
}
