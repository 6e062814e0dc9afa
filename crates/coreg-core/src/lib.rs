//! Image geometry, rigid transforms, resampling and body segmentation for
//! CT/MRI co-registration.

pub mod error;
pub mod filter;
pub mod image;
pub mod interpolation;
pub mod segmentation;
pub mod spatial;
pub mod transform;

pub use error::{ImageError, Result};
pub use image::{Image, ImageBuffer, ImageGrid, PixelKind};
pub use spatial::{Direction, Point, Spacing, Vector};
pub use transform::RigidTransform;
