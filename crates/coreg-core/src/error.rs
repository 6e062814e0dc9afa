//! Error types for image and geometry operations.

use thiserror::Error;

/// Error type for image construction, geometry checks and host readback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    /// Two images or masks do not share the same voxel grid.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Spacing must be strictly positive and finite along every axis.
    #[error("Invalid spacing: {0:?}")]
    InvalidSpacing([f64; 3]),

    /// Direction cosines must form an orthonormal matrix.
    #[error("Direction matrix is not orthonormal")]
    NonOrthonormalDirection,

    /// Voxel buffer length does not match the grid size.
    #[error("Data length mismatch: expected {expected}, got {actual}")]
    DataLength { expected: usize, actual: usize },

    /// Tensor data could not be read back to the host.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// A transform could not be built from the given values.
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImageError>;

impl ImageError {
    /// Create an invalid geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create an invalid transform error.
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::InvalidTransform(msg.into())
    }

    /// Wrap a tensor readback failure.
    pub fn tensor_data(err: impl std::fmt::Debug) -> Self {
        Self::TensorData(format!("{:?}", err))
    }
}
