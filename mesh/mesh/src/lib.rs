//! Mesh and volume toolkit for helmet fitting.
//!
//! This umbrella crate re-exports the mesh-* crates, providing a unified API
//! from CT volume to printable helmet. All crates are Layer 0 (no rendering
//! dependencies) and can be used in CLI tools, servers or tests.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh::prelude::*;
//!
//! // Segment a skin surface from a CT scan
//! let grid = mesh::volume::load_volume("scan.nii.gz").unwrap();
//! let grid = mesh::volume::reorient_to_lps(&grid);
//! let (head, _) = segment_skin(&grid, &SegmentationParams::default()).unwrap();
//!
//! // Carve it out of a helmet shell
//! let helmet = load_mesh("helmet.stl").unwrap();
//! let carved = difference(&helmet, &head).unwrap();
//! let report = validate_mesh(&carved);
//! println!("{report}");
//!
//! save_mesh(&carved, "fitted.stl").unwrap();
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - Core data structures: `IndexedMesh`, `Vertex`, `Triangle`, `Aabb`
//! - [`io`] - File I/O for STL, PLY and legacy VTK
//! - [`volume`] - NIfTI/DICOM loading, skin segmentation, isosurfaces
//! - [`repair`] - Cleaning, hole filling, smoothing, decimation, clipping
//! - [`transform`] - Rotations, uniform scaling and translation
//! - [`boolean`] - CSG operations (union, intersection, difference)
//!
//! # Feature Flags
//!
//! - `parallel` (default) - Parallel BVH builds and patch classification
//! - `dicom` - DICOM series loading
//! - `serde` - Serialization of core types

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

// =============================================================================
// Re-exports
// =============================================================================

/// Core data structures: `IndexedMesh`, `Vertex`, `Triangle`, `Aabb`.
pub use mesh_types as types;

/// File I/O for STL, PLY and legacy VTK.
pub use mesh_io as io;

/// CT volume loading, skin segmentation and isosurface extraction.
pub use mesh_volume as volume;

/// Mesh cleaning, hole filling, smoothing, decimation and clipping.
pub use mesh_repair as repair;

/// Rotations, uniform scaling and translation.
pub use mesh_transform as transform;

/// CSG operations (union, intersection, difference).
pub use mesh_boolean as boolean;

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for mesh processing.
///
/// # Usage
///
/// ```
/// use mesh::prelude::*;
///
/// let cube = cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// assert_eq!(cube.face_count(), 12);
/// ```
pub mod prelude {
    // Core types
    pub use mesh_types::{
        cuboid, Aabb, IndexedMesh, MeshBounds, MeshTopology, Point3, Triangle, Vector3, Vertex,
    };

    // I/O
    pub use mesh_io::{load_mesh, save_mesh, MeshFormat};

    // Volume
    pub use mesh_volume::{load_volume, segment_skin, SegmentationParams, VoxelGrid};

    // Repair
    pub use mesh_repair::{
        clean_mesh, fill_holes, smooth_windowed_sinc, validate_mesh, CleanParams, MeshReport,
        SmoothParams,
    };

    // Transform
    pub use mesh_transform::{Axis, Transform3D};

    // Boolean
    pub use mesh_boolean::{difference, BooleanConfig};
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let mesh = IndexedMesh::new();
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.face_count(), 0);
    }

    #[test]
    fn test_module_reexports() {
        let _ = types::IndexedMesh::new();
        let _ = repair::ValidationOptions::default();
        let _ = boolean::BooleanConfig::default();
        let _ = volume::SegmentationParams::default();
    }
}
