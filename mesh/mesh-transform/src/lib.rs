//! Rigid and uniform-scale transforms for meshes.
//!
//! This crate provides tools for:
//! - Rotation about the cardinal axes, through the origin or the centroid
//! - Uniform scaling about a point and translation
//! - Arbitrary homogeneous matrices, keeping outward winding under mirrors
//! - [`Transform3D`] for composing transforms before applying them
//!
//! Quarter-turn rotations are exact: no `1e-16` residue from `cos(270°)`.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with no rendering or UI dependencies.
//!
//! # Example
//!
//! ```
//! use mesh_transform::{rotate_about_axis, scale_about, Axis};
//! use mesh_types::{unit_cube, Point3};
//!
//! let mut mesh = unit_cube();
//! scale_about(&mut mesh, 2.0, &Point3::origin()).unwrap();
//! rotate_about_axis(&mut mesh, Axis::X, 90.0);
//!
//! assert!((mesh.volume() - 8.0).abs() < 1e-12);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod axis;
mod error;
mod ops;
mod transform;

pub use axis::Axis;
pub use error::{TransformError, TransformResult};
pub use ops::{apply_transform, rotate_about_axis, rotate_about_axis_centered, scale_about, translate};
pub use transform::{sin_cos_degrees, Transform3D};
