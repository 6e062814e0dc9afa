//! Nominal pixel kinds.
//!
//! Voxel values are always held as `f32`. The pixel kind records the scalar
//! type an image was loaded with (or should be saved as) and drives casting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar numeric kind of an image's voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PixelKind {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    #[default]
    Float32,
    Float64,
}

impl PixelKind {
    /// True for the integer kinds.
    pub fn is_integer(&self) -> bool {
        !matches!(self, PixelKind::Float32 | PixelKind::Float64)
    }

    /// Representable value range.
    pub fn range(&self) -> (f64, f64) {
        match self {
            PixelKind::Int8 => (i8::MIN as f64, i8::MAX as f64),
            PixelKind::UInt8 => (0.0, u8::MAX as f64),
            PixelKind::Int16 => (i16::MIN as f64, i16::MAX as f64),
            PixelKind::UInt16 => (0.0, u16::MAX as f64),
            PixelKind::Int32 => (i32::MIN as f64, i32::MAX as f64),
            PixelKind::UInt32 => (0.0, u32::MAX as f64),
            PixelKind::Float32 => (f32::MIN as f64, f32::MAX as f64),
            PixelKind::Float64 => (f64::MIN, f64::MAX),
        }
    }

    /// Convert a value to this kind: integers truncate toward zero and
    /// saturate at the kind's range, floats pass through.
    pub fn cast(&self, value: f64) -> f64 {
        if !self.is_integer() {
            return value;
        }
        if value.is_nan() {
            return 0.0;
        }
        let (lo, hi) = self.range();
        value.trunc().clamp(lo, hi)
    }

    /// Size of one voxel in bytes.
    pub fn byte_size(&self) -> usize {
        match self {
            PixelKind::Int8 | PixelKind::UInt8 => 1,
            PixelKind::Int16 | PixelKind::UInt16 => 2,
            PixelKind::Int32 | PixelKind::UInt32 | PixelKind::Float32 => 4,
            PixelKind::Float64 => 8,
        }
    }
}

impl fmt::Display for PixelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelKind::Int8 => "8-bit signed integer",
            PixelKind::UInt8 => "8-bit unsigned integer",
            PixelKind::Int16 => "16-bit signed integer",
            PixelKind::UInt16 => "16-bit unsigned integer",
            PixelKind::Int32 => "32-bit signed integer",
            PixelKind::UInt32 => "32-bit unsigned integer",
            PixelKind::Float32 => "32-bit float",
            PixelKind::Float64 => "64-bit float",
        };
        f.write_str(name)
    }
}
