//! Boolean operations (CSG) for triangle meshes.
//!
//! This crate combines closed triangle meshes: union (A ∪ B),
//! intersection (A ∩ B), and difference (A - B). The helmet compositor uses
//! the difference to carve a head out of a helmet shell.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with no rendering dependencies. It works on
//! [`IndexedMesh`] values and is used by the fitting session, the CLI and
//! the tests alike.
//!
//! # How it works
//!
//! 1. A BVH over each operand finds candidate triangle pairs
//! 2. Each intersecting pair contributes a segment of the intersection
//!    curve; triangles are retriangulated so the curve becomes mesh edges
//!    shared by both operands
//! 3. Faces are grouped into patches bounded by the curve, and each patch
//!    is classified inside or outside the other operand by ray casting
//! 4. Selected patches are stitched together and welded
//!
//! Coplanar overlapping faces are not cut; operands that only touch along
//! a shared plane give undefined seams there.
//!
//! # Quick Start
//!
//! ```
//! use mesh_boolean::{difference, intersection, union};
//! use mesh_types::{cuboid, Point3};
//!
//! let a = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
//! let b = cuboid(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0));
//!
//! let carved = difference(&a, &b).unwrap();
//! assert!((carved.volume() - 7.0).abs() < 1e-6);
//! assert!((union(&a, &b).unwrap().volume() - 15.0).abs() < 1e-6);
//! assert!((intersection(&a, &b).unwrap().volume() - 1.0).abs() < 1e-6);
//! ```
//!
//! # Configuration
//!
//! ```
//! use mesh_boolean::{BooleanConfig, CleanupLevel};
//!
//! let config = BooleanConfig::for_scans().with_cleanup(CleanupLevel::Full);
//! assert_eq!(config.cleanup, CleanupLevel::Full);
//! ```
//!
//! # Presets
//!
//! | Preset | Use Case | Tolerances |
//! |--------|----------|------------|
//! | `default()` | General purpose | Balanced |
//! | `for_scans()` | Segmented CT surfaces | Looser weld |
//! | `strict()` | Exact synthetic geometry | Tightest |
//!
//! # Quality Standards
//!
//! - Zero clippy/doc warnings
//! - Zero `unwrap`/`expect` in library code

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that conflict with API design choices
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
// Allow single-char names in math-heavy code (standard in graphics/geometry algorithms)
#![allow(clippy::many_single_char_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_panics_doc)]

pub mod bvh;
mod classify;
pub mod config;
pub mod error;
pub mod intersect;
mod operation;
mod split;

pub use bvh::{Bvh, BvhStats};
pub use classify::{point_in_mesh, PointInMeshResult};
pub use config::{BooleanConfig, BooleanOp, CleanupLevel};
pub use error::{BooleanError, BooleanResult};
pub use operation::{
    boolean_operation, difference, difference_with_config, intersection,
    intersection_with_config, union, union_with_config, BooleanOperationResult, BooleanStats,
};

// Re-export mesh types for convenience
pub use mesh_types::{IndexedMesh, Point3, Vector3, Vertex};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use mesh_boolean::prelude::*;
///
/// let config = BooleanConfig::default().with_parallel(false);
/// assert_eq!(format!("{}", BooleanOp::Difference), "difference (A - B)");
/// # let _ = config;
/// ```
pub mod prelude {
    pub use crate::config::{BooleanConfig, BooleanOp, CleanupLevel};
    pub use crate::error::{BooleanError, BooleanResult};
    pub use crate::operation::{
        boolean_operation, difference, difference_with_config, intersection,
        intersection_with_config, union, union_with_config,
    };
}
