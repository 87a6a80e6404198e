//! Fit a printable helmet to a CT-scanned head.
//!
//! The workflow:
//! - Segment the skin surface from a CT volume, or load a head mesh
//! - Prepare the head and pre-align it against a helmet template
//! - Position it with discrete [`PoseAction`]s, each replayed from the
//!   frozen base mesh
//! - [`Session::commit`] carves the head out of the helmet (and optionally
//!   out of the chin piece)
//! - [`Session::save`] writes the result with the pose encoded in the name
//!
//! Everything is synchronous and UI-agnostic. Drawing goes through the
//! [`RenderBackend`] trait; [`RecordingBackend`] records calls for tests and
//! the command line.
//!
//! # Example
//!
//! ```
//! use helmet_fit::{parse_actions, HelmetFitConfig, HelmetTemplate, Session, TemplateKind};
//! use mesh_types::{cuboid, Point3};
//!
//! let helmet = cuboid(Point3::new(-40.0, -40.0, -40.0), Point3::new(40.0, 40.0, 40.0));
//! let template = HelmetTemplate::from_meshes(TemplateKind::Flat, helmet, None);
//! let head = cuboid(Point3::origin(), Point3::new(30.0, 30.0, 30.0));
//!
//! // Pre-alignment leaves the back of the head 2.75 mm behind the helmet
//! let mut session = Session::new(HelmetFitConfig::default(), template, head).unwrap();
//! session.apply_actions(parse_actions("ty+ ty+ ty+ ty+ ty+ ty+").unwrap());
//! assert_eq!(session.pose().translation().y, 3.0);
//! let artifact = session.commit().unwrap();
//! assert!(artifact.helmet.volume() < 80.0_f64.powi(3));
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod action;
mod artifact;
mod compositor;
mod config;
mod error;
mod persistence;
mod pose;
mod session;
mod stage;
mod template;
mod viewport;

pub use action::{parse_actions, Direction, PoseAction, StepSizes};
pub use artifact::FinalArtifact;
pub use compositor::{compose, prepare_head, BoxFace, CompositorConfig, PrepareParams, PrepareSummary};
pub use config::{HelmetFitConfig, PathsConfig};
pub use error::{
    CompositorError, CompositorResult, HelmetFitError, HelmetFitResult, PersistenceError, PersistenceResult,
};
pub use persistence::{artifact_paths, save_artifact, ArtifactPaths, SaveReport, SaveTarget};
pub use pose::{prealign_head, Pose, PrealignParams, StepCounts, POSE_SMOOTHING_ITERATIONS};
pub use session::Session;
pub use stage::StageOutcome;
pub use template::{HelmetTemplate, TemplateCatalog, TemplateKind};
pub use viewport::{Layer, RecordingBackend, RenderBackend, RenderCall, Scene, Viewport};
