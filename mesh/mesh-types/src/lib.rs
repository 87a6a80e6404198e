//! Core mesh types for the helmet fitting pipeline.
//!
//! This crate provides the foundational types shared by every mesh stage:
//!
//! - [`Vertex`] - A point in 3D space with optional attributes
//! - [`IndexedMesh`] - A triangle mesh with indexed vertices
//! - [`Triangle`] - A concrete triangle with vertex positions
//! - [`Aabb`] - Axis-aligned bounding box
//!
//! # Layer 0 Crate
//!
//! This crate has no rendering or UI dependencies. The surface extractor,
//! the repair pipeline, the boolean engine and the fitting session all
//! exchange [`IndexedMesh`] values.
//!
//! # Units
//!
//! Coordinates are `f64` millimeters. Volumes coming from CT scans are
//! expressed in the LPS patient frame (x = left, y = posterior, z = superior).
//!
//! # Winding
//!
//! Face winding is **counter-clockwise (CCW) when viewed from outside**, so
//! normals point outward by the right-hand rule and a closed mesh has a
//! positive [`IndexedMesh::signed_volume`].
//!
//! # Example
//!
//! ```
//! use mesh_types::{cuboid, MeshTopology, Point3};
//!
//! let mesh = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 3.0, 4.0));
//! assert_eq!(mesh.face_count(), 12);
//! assert!((mesh.volume() - 24.0).abs() < 1e-10);
//! ```
//!
//! # Quality Standards
//!
//! - Zero clippy/doc warnings
//! - Zero `unwrap`/`expect` in library code

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod mesh;
mod traits;
mod triangle;
mod vertex;

pub use bounds::Aabb;
pub use mesh::{cuboid, unit_cube, IndexedMesh};
pub use traits::{MeshBounds, MeshTopology};
pub use triangle::Triangle;
pub use vertex::{Vertex, VertexAttributes};

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
