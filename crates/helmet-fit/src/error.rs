//! Error types for the fitting session.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for compositor operations.
pub type CompositorResult<T> = Result<T, CompositorError>;

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Result type for session-level operations.
pub type HelmetFitResult<T> = Result<T, HelmetFitError>;

/// Errors raised while carving the head out of the helmet.
#[derive(Debug, Error)]
pub enum CompositorError {
    /// A boolean operation rejected its operands.
    #[error("{stage} boolean failed: {source}")]
    Boolean {
        /// Which boolean ("shell" or "chin").
        stage: &'static str,
        /// Underlying error.
        #[source]
        source: mesh_boolean::BooleanError,
    },

    /// A boolean produced no faces.
    #[error("{stage} boolean produced an empty mesh")]
    DegenerateResult {
        /// Which boolean ("shell" or "chin").
        stage: &'static str,
    },

    /// Post-processing failed.
    #[error("post-processing failed: {0}")]
    Repair(#[from] mesh_repair::RepairError),
}

/// Errors raised while writing artifacts.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// There is nothing committed to save.
    #[error("no artifact to save; commit the fit first")]
    NothingToSave,

    /// The output directory could not be created.
    #[error("cannot create {path}: {source}")]
    CreateDir {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Writing a mesh failed.
    #[error("cannot write {path}: {source}")]
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: mesh_io::IoError,
    },
}

/// Top-level errors for the fitting workflow.
#[derive(Debug, Error)]
pub enum HelmetFitError {
    /// A template asset is missing.
    #[error("template asset not found: {path}")]
    MissingAsset {
        /// Expected asset location.
        path: PathBuf,
    },

    /// A mesh could not be read.
    #[error("cannot read mesh {path}: {source}")]
    Load {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: mesh_io::IoError,
    },

    /// The configuration file is unreadable or malformed.
    #[error("invalid configuration {path}: {message}")]
    Config {
        /// Configuration file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// An action token did not parse.
    #[error("unknown action '{token}': {reason}")]
    InvalidAction {
        /// Offending token.
        token: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A mesh has no geometry where some is required.
    #[error("{what} mesh is empty")]
    EmptyMesh {
        /// Which mesh.
        what: &'static str,
    },

    /// Volume loading or segmentation failed.
    #[error(transparent)]
    Volume(#[from] mesh_volume::VolumeError),

    /// Compositing failed.
    #[error(transparent)]
    Compositor(#[from] CompositorError),

    /// Saving failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// A repair stage failed and the caller chose to abort.
    #[error("{stage} failed: {diagnostic}")]
    Stage {
        /// Stage name.
        stage: &'static str,
        /// Diagnostic message.
        diagnostic: String,
    },
}

impl HelmetFitError {
    /// Create an [`HelmetFitError::InvalidAction`].
    #[must_use]
    pub fn invalid_action(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAction {
            token: token.into(),
            reason: reason.into(),
        }
    }
}
