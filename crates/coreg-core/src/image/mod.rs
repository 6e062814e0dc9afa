//! Image types and operations.
//!
//! This module provides the Image type and related functionality
//! for representing medical images with physical metadata.

pub mod image;
pub mod metadata;
pub mod grid;
pub mod buffer;
pub mod pixel;

pub use image::{Image, tensor_from_fn};
pub use metadata::{ImageGrid, GEOMETRY_TOLERANCE};
pub use grid::generate_grid_3d;
pub use buffer::ImageBuffer;
pub use pixel::PixelKind;
