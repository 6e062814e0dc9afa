//! Pixel-wise intensity filters: casting and shifting.

use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;
use crate::image::{Image, PixelKind};

/// Cast an image to another pixel kind.
///
/// Integer kinds truncate toward zero and saturate at the kind's range.
/// Float kinds keep the values.
pub fn cast_image<B: Backend>(image: &Image<B, 3>, kind: PixelKind) -> Image<B, 3> {
    if !kind.is_integer() {
        return image.with_data(image.data().clone()).with_pixel_kind(kind);
    }
    let (lo, hi) = kind.range();
    let data = image.data().clone();
    let down = data.clone().floor();
    let up = data.clone().neg().floor().neg();
    let truncated = down.mask_where(data.lower_elem(0.0), up);
    image
        .with_data(truncated.clamp(lo, hi))
        .with_pixel_kind(kind)
}

/// Add a constant to every voxel.
pub fn shift_intensity<B: Backend>(image: &Image<B, 3>, shift: f64) -> Image<B, 3> {
    image.with_data(image.data().clone().add_scalar(shift))
}

/// Smallest and largest voxel value.
pub fn minimum_maximum<B: Backend>(image: &Image<B, 3>) -> (f64, f64) {
    let min: f64 = image.data().clone().min().into_scalar().elem();
    let max: f64 = image.data().clone().max().into_scalar().elem();
    (min, max)
}

/// Shift intensities so the minimum becomes zero. Returns the shifted image
/// and the shift applied.
pub fn shift_to_zero_minimum<B: Backend>(image: &Image<B, 3>) -> (Image<B, 3>, f64) {
    let (min, _) = minimum_maximum(image);
    let shift = -min;
    (shift_intensity(image, shift), shift)
}
