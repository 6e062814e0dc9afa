//! Errors raised while configuring or running a registration.

use coreg_core::ImageError;
use thiserror::Error;

/// Failure of a registration run or of its configuration.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Input volumes have unusable geometry.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// No sampled point mapped inside the moving image.
    #[error("Empty sample: {0}")]
    EmptySample(String),

    /// Numerical instability detected.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Image construction or readback failed.
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create an invalid geometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create an empty sample error.
    pub fn empty_sample(msg: impl Into<String>) -> Self {
        Self::EmptySample(msg.into())
    }

    /// Create a numerical instability error.
    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RegistrationError::invalid_configuration("bins < 5");
        assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RegistrationError::empty_sample("0 of 12 points inside");
        assert_eq!(err.to_string(), "Empty sample: 0 of 12 points inside");
    }

    #[test]
    fn test_image_error_conversion() {
        let err: RegistrationError = ImageError::NonOrthonormalDirection.into();
        assert!(matches!(err, RegistrationError::Image(_)));
        assert_eq!(err.to_string(), "Direction matrix is not orthonormal");
    }
}
