//! Error types for mesh transformation operations.

use thiserror::Error;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors that can occur during mesh transformation.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Matrix collapses space onto a plane, line or point.
    #[error("matrix is not invertible (determinant {determinant})")]
    NotInvertible {
        /// Determinant of the linear part.
        determinant: f64,
    },

    /// Matrix or parameter contains NaN or infinity.
    #[error("non-finite {what}")]
    NonFinite {
        /// What was rejected.
        what: &'static str,
    },

    /// Scale factor must be finite and strictly positive.
    #[error("invalid scale factor {factor}")]
    InvalidScale {
        /// Rejected factor.
        factor: f64,
    },

    /// Unrecognized axis name.
    #[error("unknown axis '{name}' (expected x, y or z)")]
    UnknownAxis {
        /// Text that failed to parse.
        name: String,
    },
}
