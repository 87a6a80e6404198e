//! Error types for boolean operations.

use thiserror::Error;

/// Errors that can occur during boolean operations.
#[derive(Debug, Error)]
pub enum BooleanError {
    /// An operand has no vertices or no faces.
    #[error("operand {operand} is empty")]
    EmptyMesh {
        /// Which operand ("A" or "B").
        operand: &'static str,
    },

    /// A face references a vertex that does not exist.
    #[error("operand {operand}: invalid vertex index {index} (mesh has {vertex_count} vertices)")]
    InvalidIndex {
        /// Which operand ("A" or "B").
        operand: &'static str,
        /// The invalid index.
        index: u32,
        /// Total number of vertices in the operand.
        vertex_count: usize,
    },

    /// An operand contains a NaN or infinite coordinate.
    #[error("operand {operand} has a non-finite vertex at index {index}")]
    NonFinite {
        /// Which operand ("A" or "B").
        operand: &'static str,
        /// Index of the offending vertex.
        index: usize,
    },
}

/// Result type for boolean operations.
pub type BooleanResult<T> = Result<T, BooleanError>;
