//! Error types for volume loading and surface extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for volume operations.
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Errors raised while loading, resampling or meshing a volume.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// File or directory not found.
    #[error("volume not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// The path does not name a supported volume format.
    #[error("unsupported volume format: {path}")]
    UnsupportedFormat {
        /// The offending path.
        path: PathBuf,
    },

    /// The header is malformed.
    #[error("invalid volume header: {message}")]
    InvalidHeader {
        /// What was wrong.
        message: String,
    },

    /// The voxel datatype code is not one we can read.
    #[error("unsupported voxel datatype code {code}")]
    UnsupportedDatatype {
        /// NIfTI datatype code (or DICOM bits allocated).
        code: i16,
    },

    /// Voxel data ended early.
    #[error("truncated voxel data: expected {expected} bytes, got {got}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        got: usize,
    },

    /// A grid operation was given inconsistent sizes.
    #[error("grid of {dims:?} needs {expected} values, got {got}")]
    DimensionMismatch {
        /// Grid dimensions.
        dims: [usize; 3],
        /// Values required.
        expected: usize,
        /// Values given.
        got: usize,
    },

    /// A parameter is out of its valid range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The isovalue produced no surface.
    #[error("no surface at isovalue {isovalue} (data range {min} to {max})")]
    EmptyIsosurface {
        /// Requested isovalue.
        isovalue: f32,
        /// Smallest intensity in the grid.
        min: f32,
        /// Largest intensity in the grid.
        max: f32,
    },

    /// Error from the DICOM reader.
    #[cfg(feature = "dicom")]
    #[error("DICOM error in {path}: {message}")]
    Dicom {
        /// File being read.
        path: PathBuf,
        /// Reader message.
        message: String,
    },

    /// Cleanup after extraction failed.
    #[error("surface repair failed: {0}")]
    Repair(#[from] mesh_repair::RepairError),

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VolumeError {
    /// Create an [`VolumeError::InvalidHeader`] with the given message.
    #[must_use]
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }
}
