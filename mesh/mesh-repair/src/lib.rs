//! Mesh repair operations for the helmet fitting pipeline.
//!
//! This crate provides tools for:
//! - Mesh validation (manifold, watertight and winding checks)
//! - Cleaning: vertex welding, degenerate/duplicate face removal,
//!   unreferenced vertex removal
//! - Connected component analysis and small-object removal
//! - Hole detection and filling
//! - Windowed-sinc and Laplacian smoothing
//! - Quadric-error decimation
//! - Box clipping
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with no rendering or UI dependencies.
//!
//! # Example
//!
//! ```
//! use mesh_types::{cuboid, Point3};
//! use mesh_repair::{clean_mesh, fill_holes, validate_mesh, CleanParams};
//!
//! let mut mesh = cuboid(Point3::origin(), Point3::new(10.0, 10.0, 10.0));
//! mesh.faces.pop();
//!
//! let summary = clean_mesh(&mut mesh, &CleanParams::default());
//! println!("{summary}");
//!
//! fill_holes(&mut mesh, 100.0).unwrap();
//! assert!(validate_mesh(&mesh).is_solid());
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod adjacency;
mod clean;
mod clip;
pub mod components;
mod decimate;
mod error;
pub mod holes;
mod smooth;
mod validate;

pub use adjacency::{face_edges, undirected, MeshAdjacency};
pub use clean::{
    clean_mesh, remove_degenerate_triangles, remove_duplicate_faces, remove_unreferenced_vertices,
    weld_vertices, CleanParams, CleanSummary,
};
pub use clip::{clip_box, ClipSide};
pub use decimate::{decimate_mesh, DecimateParams, DecimationResult};
pub use error::{RepairError, RepairResult};
pub use smooth::{smooth_laplacian, smooth_windowed_sinc, SmoothParams, SmoothSummary};
pub use validate::{validate_mesh, validate_mesh_with_options, MeshReport, ValidationOptions};

// Re-export commonly used items from submodules
pub use components::{
    find_components, keep_largest_component, keep_largest_solid, remove_small_components,
    split_components, Component, ComponentAnalysis,
};
pub use holes::{detect_holes, fill_hole_ear_clipping, fill_holes, BoundaryLoop};
