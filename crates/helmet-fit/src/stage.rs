//! Outcome of a geometry stage that may fail without aborting the session.

use std::fmt::Display;

use mesh_types::IndexedMesh;
use tracing::warn;

use crate::error::{HelmetFitError, HelmetFitResult};

/// Result of running one mesh stage.
///
/// A failed stage keeps its input untouched, so the caller can either
/// continue with it ([`into_mesh`](Self::into_mesh)) or abort
/// ([`into_result`](Self::into_result)).
///
/// # Example
///
/// ```
/// use helmet_fit::StageOutcome;
/// use mesh_types::unit_cube;
///
/// let outcome = StageOutcome::run("noop", unit_cube(), |_| Ok::<_, String>(()));
/// assert!(outcome.is_applied());
///
/// let failed = StageOutcome::run("broken", unit_cube(), |mesh| {
///     mesh.faces.clear();
///     Err::<(), _>("boom")
/// });
/// assert_eq!(failed.diagnostic(), Some("boom"));
/// assert_eq!(failed.into_mesh().faces.len(), 12);
/// ```
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// The stage succeeded.
    Applied(IndexedMesh),
    /// The stage failed; `input` is what it was given.
    Failed {
        /// Unmodified input mesh.
        input: IndexedMesh,
        /// Stage name.
        stage: &'static str,
        /// Why it failed.
        diagnostic: String,
    },
}

impl StageOutcome {
    /// Run `f` on `mesh`. On error, log a warning and keep the original.
    pub fn run<T, E: Display>(
        stage: &'static str,
        mut mesh: IndexedMesh,
        f: impl FnOnce(&mut IndexedMesh) -> Result<T, E>,
    ) -> Self {
        let input = mesh.clone();
        match f(&mut mesh) {
            Ok(_) => Self::Applied(mesh),
            Err(err) => {
                let diagnostic = err.to_string();
                warn!(stage, %diagnostic, "stage failed, passing input through");
                Self::Failed {
                    input,
                    stage,
                    diagnostic,
                }
            }
        }
    }

    /// True if the stage succeeded.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Failure message, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Applied(_) => None,
            Self::Failed { diagnostic, .. } => Some(diagnostic),
        }
    }

    /// The stage output, or its untouched input on failure.
    pub fn into_mesh(self) -> IndexedMesh {
        match self {
            Self::Applied(mesh) | Self::Failed { input: mesh, .. } => mesh,
        }
    }

    /// The stage output, or an error on failure.
    ///
    /// # Errors
    ///
    /// Returns [`HelmetFitError::Stage`] if the stage failed.
    pub fn into_result(self) -> HelmetFitResult<IndexedMesh> {
        match self {
            Self::Applied(mesh) => Ok(mesh),
            Self::Failed {
                stage, diagnostic, ..
            } => Err(HelmetFitError::Stage { stage, diagnostic }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_repair::fill_holes;
    use mesh_types::unit_cube;

    #[test]
    fn applied_keeps_changes() {
        let outcome = StageOutcome::run("fill", unit_cube(), |m| {
            m.faces.pop();
            fill_holes(m, 10.0)
        });
        assert!(outcome.is_applied());
        assert_eq!(outcome.into_mesh().faces.len(), 12);
    }

    #[test]
    fn failure_passes_input_through() {
        let outcome = StageOutcome::run("fill", unit_cube(), |m| {
            m.faces.truncate(2);
            fill_holes(m, -1.0)
        });
        assert!(!outcome.is_applied());
        assert!(outcome.diagnostic().unwrap().contains("max_hole_size"));
        assert_eq!(outcome.clone().into_mesh().faces.len(), 12);
        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, HelmetFitError::Stage { stage: "fill", .. }));
    }
}
