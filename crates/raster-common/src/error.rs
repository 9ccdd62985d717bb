//! Error types for raster geometry.

use thiserror::Error;

/// Result type alias using GeoError.
pub type GeoResult<T> = Result<T, GeoError>;

/// Errors raised while converting between coordinate and pixel space.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeoError {
    #[error("Transform is not invertible (determinant {0})")]
    NonInvertibleTransform(f64),

    #[error("Invalid bounds {bounds:?}: {reason}")]
    InvalidBounds {
        bounds: (f64, f64, f64, f64),
        reason: String,
    },

    #[error("Invalid raster shape: {0}")]
    InvalidShape(String),
}

impl GeoError {
    pub fn invalid_bounds(bounds: (f64, f64, f64, f64), reason: impl Into<String>) -> Self {
        Self::InvalidBounds {
            bounds,
            reason: reason.into(),
        }
    }
}
