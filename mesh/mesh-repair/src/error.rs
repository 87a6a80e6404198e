//! Error types for mesh repair operations.

use thiserror::Error;

/// Result type for repair operations.
pub type RepairResult<T> = Result<T, RepairError>;

/// Errors that can occur during mesh repair.
#[derive(Debug, Error)]
pub enum RepairError {
    /// Mesh has no vertices or no faces.
    #[error("mesh is empty")]
    EmptyMesh,

    /// A face references a vertex that does not exist.
    #[error("invalid vertex index {index} (mesh has {vertex_count} vertices)")]
    InvalidIndex {
        /// The invalid index.
        index: u32,
        /// Total number of vertices in the mesh.
        vertex_count: usize,
    },

    /// A parameter is outside its valid range.
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: f64,
        /// Valid range or constraint.
        reason: &'static str,
    },

    /// An operation produced a mesh with no faces.
    #[error("{operation} removed every face")]
    EmptyResult {
        /// Operation that emptied the mesh.
        operation: &'static str,
    },

    /// Smoothing diverged (produced non-finite coordinates).
    #[error("smoothing produced non-finite coordinates after {iterations} iterations")]
    SmoothingDiverged {
        /// Iteration count requested.
        iterations: usize,
    },
}

impl RepairError {
    /// Check that every face index is in range.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::InvalidIndex`] for the first bad index found.
    pub fn check_indices(mesh: &mesh_types::IndexedMesh) -> RepairResult<()> {
        let vertex_count = mesh.vertices.len();
        mesh.faces
            .iter()
            .flatten()
            .find(|&&i| i as usize >= vertex_count)
            .map_or(Ok(()), |&index| {
                Err(Self::InvalidIndex {
                    index,
                    vertex_count,
                })
            })
    }
}
