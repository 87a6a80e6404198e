//! Indexed triangle mesh.

use crate::{Aabb, MeshBounds, MeshTopology, Triangle, Vertex};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh.
///
/// Vertices and faces are stored separately, faces referencing vertices by
/// index. This is the surface type produced by isosurface extraction,
/// reworked by the repair stages and consumed by the boolean engine.
///
/// # Winding Order
///
/// Faces use **counter-clockwise (CCW) winding** when viewed from outside.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex, MeshTopology};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.face_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into `vertices`.
    pub faces: Vec<[u32; 3]>,
}

impl IndexedMesh {
    /// Create an empty mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create an empty mesh with room for the given counts.
    #[inline]
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Create a mesh from vertices and faces.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Create a mesh from flat coordinate and index arrays.
    ///
    /// Returns an empty mesh if either array length is not a multiple of 3.
    ///
    /// ```
    /// use mesh_types::{IndexedMesh, MeshTopology};
    ///
    /// let mesh = IndexedMesh::from_raw(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[0, 1, 2]);
    /// assert_eq!(mesh.face_count(), 1);
    /// ```
    #[must_use]
    pub fn from_raw(positions: &[f64], indices: &[u32]) -> Self {
        if positions.len() % 3 != 0 || indices.len() % 3 != 0 {
            return Self::new();
        }
        let vertices = positions
            .chunks_exact(3)
            .map(|c| Vertex::from_coords(c[0], c[1], c[2]))
            .collect();
        let faces = indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        Self { vertices, faces }
    }

    /// Iterate over vertex positions.
    pub fn positions(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.vertices.iter().map(|v| &v.position)
    }

    /// Mean of all vertex positions, or the origin for an empty mesh.
    ///
    /// This is the pivot used for uniform scaling of the head mesh.
    #[must_use]
    pub fn centroid(&self) -> Point3<f64> {
        if self.vertices.is_empty() {
            return Point3::origin();
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.position.coords);
        #[allow(clippy::cast_precision_loss)]
        // Precision: vertex counts stay far below 2^52
        let n = self.vertices.len() as f64;
        Point3::from(sum / n)
    }

    /// Translate every vertex.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Scale uniformly about `center`.
    pub fn scale_about(&mut self, center: Point3<f64>, factor: f64) {
        for vertex in &mut self.vertices {
            vertex.position = center + (vertex.position - center) * factor;
        }
    }

    /// Move the bounding-box center to the origin.
    pub fn center_at_origin(&mut self) {
        if let Some(bounds) = self.bounds_opt() {
            self.translate(-bounds.center().coords);
        }
    }

    /// Signed enclosed volume by the divergence theorem.
    ///
    /// Positive for a closed mesh with outward normals, negative when inside
    /// out. Only meaningful for closed meshes. Faces with out-of-range
    /// indices are ignored.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for tri in self.triangles() {
            let (v0, v1, v2) = (tri.v0, tri.v1, tri.v2);
            let cross = Vector3::new(
                v1.y.mul_add(v2.z, -(v1.z * v2.y)),
                v1.z.mul_add(v2.x, -(v1.x * v2.z)),
                v1.x.mul_add(v2.y, -(v1.y * v2.x)),
            );
            volume += v0.z.mul_add(cross.z, v0.x.mul_add(cross.x, v0.y * cross.y));
        }
        volume / 6.0
    }

    /// Absolute enclosed volume.
    #[inline]
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// True if the signed volume is negative.
    #[inline]
    #[must_use]
    pub fn is_inside_out(&self) -> bool {
        self.signed_volume() < 0.0
    }

    /// Total surface area.
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }

    /// Reverse the winding of every face.
    pub fn flip_normals(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
        for vertex in &mut self.vertices {
            if let Some(normal) = vertex.attributes.normal.as_mut() {
                *normal = -*normal;
            }
        }
    }

    /// Drop all vertex normals, e.g. after the geometry has moved.
    pub fn clear_normals(&mut self) {
        for vertex in &mut self.vertices {
            vertex.attributes.normal = None;
        }
    }

    /// Assign area-weighted vertex normals from the faces.
    pub fn compute_vertex_normals(&mut self) {
        let mut sums = vec![Vector3::zeros(); self.vertices.len()];
        for (face_idx, face) in self.faces.iter().enumerate() {
            if let Some(tri) = self.triangle(face_idx) {
                let n = tri.normal_unnormalized();
                for &i in face {
                    if let Some(s) = sums.get_mut(i as usize) {
                        *s += n;
                    }
                }
            }
        }
        for (vertex, sum) in self.vertices.iter_mut().zip(sums) {
            let len = sum.norm();
            vertex.attributes.normal = (len > f64::EPSILON).then(|| sum / len);
        }
    }

    /// Append another mesh, offsetting its face indices.
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: mesh indices are u32, meshes with >4B vertices are unsupported
    pub fn merge(&mut self, other: &Self) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]),
        );
    }
}

impl MeshTopology for IndexedMesh {
    #[inline]
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn vertex(&self, index: usize) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    fn face(&self, index: usize) -> Option<[u32; 3]> {
        self.faces.get(index).copied()
    }

    fn triangle(&self, face_index: usize) -> Option<Triangle> {
        let [i0, i1, i2] = *self.faces.get(face_index)?;
        Some(Triangle::new(
            self.vertices.get(i0 as usize)?.position,
            self.vertices.get(i1 as usize)?.position,
            self.vertices.get(i2 as usize)?.position,
        ))
    }

    fn triangles(&self) -> impl Iterator<Item = Triangle> {
        (0..self.faces.len()).filter_map(|i| self.triangle(i))
    }
}

impl MeshBounds for IndexedMesh {
    fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions())
    }
}

/// Closed box mesh spanning `min`..`max` with outward normals.
///
/// 8 vertices and 12 faces; vertex `i` sits at corner `i` of
/// [`Aabb::corners`].
///
/// ```
/// use mesh_types::{cuboid, Point3};
///
/// let b = cuboid(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
/// assert!((b.signed_volume() - 8.0).abs() < 1e-10);
/// ```
#[must_use]
pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> IndexedMesh {
    let corners = Aabb::new(min, max).corners();
    let vertices = corners.iter().map(|&p| Vertex::new(p)).collect();
    let faces = vec![
        // -Z
        [0, 2, 1],
        [1, 2, 3],
        // +Z
        [4, 5, 7],
        [4, 7, 6],
        // -Y
        [0, 1, 5],
        [0, 5, 4],
        // +Y
        [2, 6, 7],
        [2, 7, 3],
        // -X
        [0, 4, 6],
        [0, 6, 2],
        // +X
        [1, 3, 7],
        [1, 7, 5],
    ];
    IndexedMesh::from_parts(vertices, faces)
}

/// Unit cube from (0,0,0) to (1,1,1).
#[must_use]
pub fn unit_cube() -> IndexedMesh {
    cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_mesh() {
        let mesh = IndexedMesh::new();
        assert!(mesh.is_empty());
        assert_eq!(mesh.signed_volume(), 0.0);
        assert_eq!(mesh.centroid(), Point3::origin());
        assert!(mesh.bounds_opt().is_none());
    }

    #[test]
    fn cuboid_volume_and_orientation() {
        let mesh = cuboid(Point3::new(1.0, 2.0, 3.0), Point3::new(3.0, 5.0, 7.0));
        assert_relative_eq!(mesh.signed_volume(), 24.0, epsilon = 1e-10);
        assert!(!mesh.is_inside_out());
        assert_relative_eq!(mesh.surface_area(), 2.0 * (6.0 + 8.0 + 12.0), epsilon = 1e-10);
    }

    #[test]
    fn cuboid_normals_point_outward() {
        let mesh = cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let center = Point3::new(0.5, 0.5, 0.5);
        for tri in mesh.triangles() {
            let n = tri.normal().unwrap();
            assert!(n.dot(&(tri.centroid() - center)) > 0.0);
        }
    }

    #[test]
    fn flip_makes_inside_out() {
        let mut mesh = unit_cube();
        mesh.flip_normals();
        assert!(mesh.is_inside_out());
        assert_relative_eq!(mesh.volume(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn scale_about_centroid_keeps_centroid() {
        let mut mesh = unit_cube();
        let c = mesh.centroid();
        mesh.scale_about(c, 2.0);
        assert_relative_eq!(mesh.centroid(), c, epsilon = 1e-12);
        assert_relative_eq!(mesh.volume(), 8.0, epsilon = 1e-10);
    }

    #[test]
    fn center_at_origin_moves_bounds() {
        let mut mesh = cuboid(Point3::new(10.0, 10.0, 10.0), Point3::new(12.0, 14.0, 16.0));
        mesh.center_at_origin();
        assert_relative_eq!(mesh.bounds().center(), Point3::origin(), epsilon = 1e-12);
    }

    #[test]
    fn merge_offsets_indices() {
        let mut a = unit_cube();
        let mut b = unit_cube();
        b.translate(Vector3::new(5.0, 0.0, 0.0));
        a.merge(&b);
        assert_eq!(a.vertex_count(), 16);
        assert_eq!(a.face_count(), 24);
        assert_eq!(a.faces[12], [8, 10, 9]);
        assert_relative_eq!(a.volume(), 2.0, epsilon = 1e-10);
    }

    #[test]
    fn vertex_normals_are_unit() {
        let mut mesh = unit_cube();
        mesh.compute_vertex_normals();
        for v in &mesh.vertices {
            let n = v.attributes.normal.unwrap();
            assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-12);
        }
        mesh.clear_normals();
        assert!(mesh.vertices.iter().all(|v| v.attributes.normal.is_none()));
    }

    #[test]
    fn triangle_out_of_range_is_none() {
        let mut mesh = unit_cube();
        mesh.faces.push([0, 1, 99]);
        assert!(mesh.triangle(12).is_none());
        assert_eq!(mesh.triangles().count(), 12);
    }

    #[test]
    fn from_raw_rejects_ragged_input() {
        assert!(IndexedMesh::from_raw(&[0.0, 1.0], &[0, 1, 2]).is_empty());
    }
}
