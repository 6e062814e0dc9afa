//! Resample image filter.
//!
//! This module provides ResampleImageFilter which resamples an image
//! onto a reference grid using a transform and an interpolator.

use std::marker::PhantomData;
use burn::tensor::{Tensor, Shape};
use burn::tensor::backend::Backend;
use tracing::debug;
use crate::image::{generate_grid_3d, Image, ImageGrid};
use crate::interpolation::trait_::{index_columns, Interpolator};
use crate::transform::trait_::Transform;

/// Resample image filter.
///
/// For each output voxel, its physical point is mapped by the transform into
/// the input image and interpolated there. The transform maps output space
/// to input space, which for a registration result is fixed → moving.
/// Points outside the input domain (`[-0.5, N - 0.5)` per axis) receive the
/// default pixel value. The output keeps the input's pixel kind.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `T` - The transform type
/// * `I` - The interpolator type
pub struct ResampleImageFilter<B, T, I>
where
    B: Backend,
    T: Transform<B, 3>,
    I: Interpolator<B>,
{
    grid: ImageGrid,
    transform: T,
    interpolator: I,
    default_pixel_value: f64,
    _phantom: PhantomData<B>,
}

impl<B, T, I> ResampleImageFilter<B, T, I>
where
    B: Backend,
    T: Transform<B, 3>,
    I: Interpolator<B>,
{
    /// Create a new resample filter producing images on `grid`.
    pub fn new(grid: ImageGrid, transform: T, interpolator: I) -> Self {
        Self {
            grid,
            transform,
            interpolator,
            default_pixel_value: 0.0,
            _phantom: PhantomData,
        }
    }

    /// Set default pixel value for outside the field of view.
    pub fn with_default_pixel_value(mut self, value: f64) -> Self {
        self.default_pixel_value = value;
        self
    }

    /// Create from a reference image, using its grid as the output grid.
    pub fn new_from_reference(reference: &Image<B, 3>, transform: T, interpolator: I) -> Self {
        Self::new(reference.grid(), transform, interpolator)
    }

    pub fn grid(&self) -> &ImageGrid {
        &self.grid
    }

    /// Apply filter to an input image.
    pub fn apply(&self, input: &Image<B, 3>) -> Image<B, 3> {
        let device = input.data().device();
        let input_grid = input.grid();
        debug!(
            input_size = ?input_grid.size(),
            output_size = ?self.grid.size(),
            "resampling image"
        );

        let output_indices = generate_grid_3d::<B>(self.grid.size(), &device);
        let output_points = self.grid.index_to_world_tensor(output_indices);
        let input_points = self.transform.transform_points(output_points);
        let input_indices = input_grid.world_to_index_tensor(input_points);

        let values = self.interpolator.interpolate(input.data(), input_indices.clone());

        let [nx, ny, nz] = input_grid.size();
        let [x, y, z] = index_columns(input_indices);
        let inside = Self::inside_axis(x, nx) * Self::inside_axis(y, ny) * Self::inside_axis(z, nz);
        let values = values.mask_fill(inside.lower_elem(0.5), self.default_pixel_value);

        let output = values.reshape(Shape::new(self.grid.shape()));
        Image::new(
            output,
            *self.grid.origin(),
            *self.grid.spacing(),
            *self.grid.direction(),
        )
        .with_pixel_kind(input.pixel_kind())
    }

    /// 1.0 where `-0.5 <= c < n - 0.5`, 0.0 elsewhere.
    fn inside_axis(c: Tensor<B, 1>, n: usize) -> Tensor<B, 1> {
        let lower = c.clone().greater_equal_elem(-0.5).float();
        let upper = c.lower_elem(n as f64 - 0.5).float();
        lower * upper
    }
}
