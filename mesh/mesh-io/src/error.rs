//! Error types for mesh I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for mesh I/O operations.
pub type IoResult<T> = Result<T, IoError>;

/// Errors raised while reading or writing mesh files.
#[derive(Debug, Error)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// Unrecognized file extension.
    #[error("unknown mesh format: .{extension}")]
    UnknownFormat {
        /// The unrecognized extension.
        extension: String,
    },

    /// File content could not be parsed.
    #[error("invalid file content: {message}")]
    InvalidContent {
        /// What was wrong.
        message: String,
    },

    /// Binary payload ended before the header said it would.
    #[error("truncated {section}: expected {expected} bytes, got {got}")]
    Truncated {
        /// Section being read (e.g. "STL triangles", "VTK points").
        section: &'static str,
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        got: usize,
    },

    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {index}, but only {vertex_count} vertices exist")]
    IndexOutOfRange {
        /// Face number in file order.
        face: usize,
        /// Offending vertex index.
        index: u64,
        /// Number of vertices read.
        vertex_count: usize,
    },

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Float parsing error.
    #[error("float parsing error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    /// Integer parsing error.
    #[error("integer parsing error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
}

impl IoError {
    /// Create an [`IoError::InvalidContent`] with the given message.
    #[must_use]
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }
}
