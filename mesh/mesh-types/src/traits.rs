//! Traits shared by mesh representations.

use crate::{Aabb, Triangle, Vertex};
use nalgebra::Point3;

/// Read access to mesh topology.
pub trait MeshTopology {
    /// Number of vertices.
    fn vertex_count(&self) -> usize;

    /// Number of triangles.
    fn face_count(&self) -> usize;

    /// True if the mesh has no vertices or no faces.
    fn is_empty(&self) -> bool {
        self.vertex_count() == 0 || self.face_count() == 0
    }

    /// Vertex by index, `None` if out of range.
    fn vertex(&self, index: usize) -> Option<&Vertex>;

    /// Face by index, `None` if out of range.
    fn face(&self, index: usize) -> Option<[u32; 3]>;

    /// Triangle with resolved positions, `None` if the face or one of its
    /// vertices is out of range.
    fn triangle(&self, face_index: usize) -> Option<Triangle>;

    /// Iterate over resolved triangles, skipping faces with bad indices.
    fn triangles(&self) -> impl Iterator<Item = Triangle>;
}

/// Bounding box queries.
pub trait MeshBounds {
    /// Axis-aligned bounds. Empty if there are no vertices.
    fn bounds(&self) -> Aabb;

    /// Bounds, or `None` when empty.
    fn bounds_opt(&self) -> Option<Aabb> {
        let b = self.bounds();
        if b.is_empty() {
            None
        } else {
            Some(b)
        }
    }

    /// Center of the bounding box.
    fn center(&self) -> Point3<f64> {
        self.bounds().center()
    }
}
