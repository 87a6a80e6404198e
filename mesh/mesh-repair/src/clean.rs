//! Mesh cleaning: vertex welding, degenerate and duplicate face removal,
//! unreferenced vertex compaction.
//!
//! [`clean_mesh`] runs the four steps in order and is idempotent: cleaning an
//! already clean mesh reports zero changes.

use hashbrown::{HashMap, HashSet};
use mesh_types::IndexedMesh;
use nalgebra::Point3;
use tracing::debug;

use crate::components::keep_largest_component;

/// Configuration for [`clean_mesh`].
///
/// Distances are in mesh units (millimeters for CT-derived meshes).
///
/// # Example
///
/// ```
/// use mesh_repair::CleanParams;
///
/// let params = CleanParams::default()
///     .with_tolerance(0.05)
///     .with_largest_component_only(true);
/// assert!(params.largest_component_only);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CleanParams {
    /// Vertices closer than this are merged.
    ///
    /// Default: `0.01`
    pub tolerance: f64,

    /// Triangles with area at or below this are removed.
    ///
    /// Triangles with a repeated vertex index are always removed.
    /// Default: `1e-12`
    pub degenerate_area: f64,

    /// Remove faces that repeat another face's vertex set.
    ///
    /// Default: `true`
    pub remove_duplicates: bool,

    /// Drop vertices no face references.
    ///
    /// Default: `true`
    pub remove_unreferenced: bool,

    /// Keep only the connected component with the most vertices.
    ///
    /// Default: `false`
    pub largest_component_only: bool,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            degenerate_area: 1e-12,
            remove_duplicates: true,
            remove_unreferenced: true,
            largest_component_only: false,
        }
    }
}

impl CleanParams {
    /// Merge only bit-identical positions, as needed after loading STL soup.
    #[must_use]
    pub fn exact() -> Self {
        Self {
            tolerance: 0.0,
            ..Self::default()
        }
    }

    /// Default clean followed by a largest-component pass.
    #[must_use]
    pub fn largest_component() -> Self {
        Self {
            largest_component_only: true,
            ..Self::default()
        }
    }

    /// Set the vertex merge tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the degenerate area threshold.
    #[must_use]
    pub fn with_degenerate_area(mut self, area: f64) -> Self {
        self.degenerate_area = area;
        self
    }

    /// Enable or disable duplicate face removal.
    #[must_use]
    pub fn with_remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = remove;
        self
    }

    /// Enable or disable unreferenced vertex removal.
    #[must_use]
    pub fn with_remove_unreferenced(mut self, remove: bool) -> Self {
        self.remove_unreferenced = remove;
        self
    }

    /// Keep only the largest connected component after cleaning.
    #[must_use]
    pub fn with_largest_component_only(mut self, enabled: bool) -> Self {
        self.largest_component_only = enabled;
        self
    }
}

/// What [`clean_mesh`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSummary {
    /// Vertices before cleaning.
    pub initial_vertices: usize,
    /// Faces before cleaning.
    pub initial_faces: usize,
    /// Vertices after cleaning.
    pub final_vertices: usize,
    /// Faces after cleaning.
    pub final_faces: usize,
    /// Vertices merged into a neighbour.
    pub vertices_welded: usize,
    /// Degenerate faces removed.
    pub degenerates_removed: usize,
    /// Duplicate faces removed.
    pub duplicates_removed: usize,
    /// Unreferenced vertices removed.
    pub unreferenced_removed: usize,
    /// Connected components discarded by the largest-component pass.
    pub components_removed: usize,
}

impl CleanSummary {
    /// True if cleaning modified the mesh.
    #[must_use]
    pub fn had_changes(&self) -> bool {
        self.vertices_welded > 0
            || self.degenerates_removed > 0
            || self.duplicates_removed > 0
            || self.unreferenced_removed > 0
            || self.components_removed > 0
    }
}

impl std::fmt::Display for CleanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Clean: {} verts ({} welded, {} unreferenced), {} faces ({} degenerate, {} duplicate)",
            self.final_vertices,
            self.vertices_welded,
            self.unreferenced_removed,
            self.final_faces,
            self.degenerates_removed,
            self.duplicates_removed
        )?;
        if self.components_removed > 0 {
            write!(f, ", {} components dropped", self.components_removed)?;
        }
        Ok(())
    }
}

/// Clean a mesh in place.
///
/// Steps, in order:
/// 1. Weld vertices within `params.tolerance`
/// 2. Remove degenerate faces, then duplicate faces
/// 3. Remove unreferenced vertices
/// 4. Optionally keep only the largest connected component
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::{clean_mesh, CleanParams};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.001)); // near-duplicate of 1
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([0, 2, 3]);
///
/// let summary = clean_mesh(&mut mesh, &CleanParams::default());
/// assert_eq!(summary.vertices_welded, 1);
/// assert_eq!(mesh.vertices.len(), 3);
///
/// // A second pass finds nothing to do.
/// assert!(!clean_mesh(&mut mesh, &CleanParams::default()).had_changes());
/// ```
pub fn clean_mesh(mesh: &mut IndexedMesh, params: &CleanParams) -> CleanSummary {
    let initial_vertices = mesh.vertices.len();
    let initial_faces = mesh.faces.len();

    let vertices_welded = weld_vertices(mesh, params.tolerance);
    let degenerates_removed = remove_degenerate_triangles(mesh, params.degenerate_area);
    let duplicates_removed = if params.remove_duplicates {
        remove_duplicate_faces(mesh)
    } else {
        0
    };
    let unreferenced_removed = if params.remove_unreferenced {
        remove_unreferenced_vertices(mesh)
    } else {
        0
    };
    let components_removed = if params.largest_component_only {
        keep_largest_component(mesh)
    } else {
        0
    };

    let summary = CleanSummary {
        initial_vertices,
        initial_faces,
        final_vertices: mesh.vertices.len(),
        final_faces: mesh.faces.len(),
        vertices_welded,
        degenerates_removed,
        duplicates_removed,
        unreferenced_removed,
        components_removed,
    };
    debug!(
        welded = summary.vertices_welded,
        degenerate = summary.degenerates_removed,
        duplicate = summary.duplicates_removed,
        unreferenced = summary.unreferenced_removed,
        components = summary.components_removed,
        "cleaned mesh"
    );
    summary
}

/// Weld vertices that are within `epsilon` of each other.
///
/// Uses a spatial hash with cells of size `2 * epsilon`. With `epsilon == 0`
/// only bit-identical positions are merged. Faces that collapse to a
/// repeated index are dropped. Returns the number of vertices merged.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::weld_vertices;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0001, 0.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([0, 3, 2]);
///
/// assert_eq!(weld_vertices(&mut mesh, 0.001), 1);
/// assert_eq!(mesh.faces[1], [0, 1, 2]);
/// ```
pub fn weld_vertices(mesh: &mut IndexedMesh, epsilon: f64) -> usize {
    if mesh.vertices.is_empty() {
        return 0;
    }

    let vertex_remap = if epsilon > 0.0 {
        weld_remap_spatial(mesh, epsilon)
    } else {
        weld_remap_exact(mesh)
    };

    #[allow(clippy::cast_possible_truncation)]
    // Truncation: face indices are u32, so the vertex count fits in u32.
    let merged_count = vertex_remap
        .iter()
        .enumerate()
        .filter(|&(i, &target)| target != i as u32)
        .count();

    if merged_count == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for idx in face.iter_mut() {
            *idx = vertex_remap[*idx as usize];
        }
    }
    mesh.faces
        .retain(|&[i0, i1, i2]| i0 != i1 && i1 != i2 && i0 != i2);

    merged_count
}

#[allow(clippy::cast_possible_truncation)]
// Truncation: face indices are u32, so the vertex count fits in u32.
fn weld_remap_spatial(mesh: &IndexedMesh, epsilon: f64) -> Vec<u32> {
    let cell_size = epsilon * 2.0;

    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let cell = pos_to_cell(&vertex.position, cell_size);
        spatial_hash.entry(cell).or_default().push(idx as u32);
    }

    let mut vertex_remap: Vec<u32> = (0..mesh.vertices.len() as u32).collect();

    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let idx = idx as u32;
        if vertex_remap[idx as usize] != idx {
            continue;
        }

        let cell = pos_to_cell(&vertex.position, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other_idx in candidates {
                        if other_idx <= idx || vertex_remap[other_idx as usize] != other_idx {
                            continue;
                        }
                        let other_pos = &mesh.vertices[other_idx as usize].position;
                        if (vertex.position - other_pos).norm() < epsilon {
                            vertex_remap[other_idx as usize] = idx;
                        }
                    }
                }
            }
        }
    }

    vertex_remap
}

#[allow(clippy::cast_possible_truncation)]
// Truncation: face indices are u32, so the vertex count fits in u32.
fn weld_remap_exact(mesh: &IndexedMesh) -> Vec<u32> {
    let mut first_seen: HashMap<[u64; 3], u32> = HashMap::with_capacity(mesh.vertices.len());
    mesh.vertices
        .iter()
        .enumerate()
        .map(|(idx, v)| {
            let p = v.position;
            // -0.0 and 0.0 are the same point
            let key = [p.x + 0.0, p.y + 0.0, p.z + 0.0].map(f64::to_bits);
            *first_seen.entry(key).or_insert(idx as u32)
        })
        .collect()
}

/// Convert position to spatial hash cell.
#[allow(clippy::cast_possible_truncation)]
// Truncation: cell coordinates of mm-scale meshes are far inside i64.
fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

/// Remove triangles with a repeated vertex or an area at or below
/// `area_threshold`.
///
/// Returns the number of triangles removed.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_degenerate_triangles;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(10.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(5.0, 0.0, 0.0)); // collinear
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(remove_degenerate_triangles(&mut mesh, 1e-9), 1);
/// ```
pub fn remove_degenerate_triangles(mesh: &mut IndexedMesh, area_threshold: f64) -> usize {
    let original_count = mesh.faces.len();
    let vertices = &mesh.vertices;

    mesh.faces.retain(|&[i0, i1, i2]| {
        if i0 == i1 || i1 == i2 || i0 == i2 {
            return false;
        }
        let (Some(v0), Some(v1), Some(v2)) = (
            vertices.get(i0 as usize),
            vertices.get(i1 as usize),
            vertices.get(i2 as usize),
        ) else {
            return false;
        };
        let area = (v1.position - v0.position)
            .cross(&(v2.position - v0.position))
            .norm()
            * 0.5;
        area > area_threshold
    });

    original_count - mesh.faces.len()
}

/// Remove faces that reuse another face's vertex set.
///
/// Faces are duplicates regardless of winding or starting vertex; the first
/// occurrence is kept. Returns the number of faces removed.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_duplicate_faces;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([2, 1, 0]);
///
/// assert_eq!(remove_duplicate_faces(&mut mesh), 1);
/// ```
pub fn remove_duplicate_faces(mesh: &mut IndexedMesh) -> usize {
    let original_count = mesh.faces.len();

    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(original_count);
    mesh.faces.retain(|face| {
        let mut key = *face;
        key.sort_unstable();
        seen.insert(key)
    });

    original_count - mesh.faces.len()
}

/// Remove vertices no face references and compact the vertex array.
///
/// Returns the number of vertices removed.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_unreferenced_vertices;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(100.0, 100.0, 100.0));
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(remove_unreferenced_vertices(&mut mesh), 1);
/// assert_eq!(mesh.vertices.len(), 3);
/// ```
pub fn remove_unreferenced_vertices(mesh: &mut IndexedMesh) -> usize {
    let original_count = mesh.vertices.len();

    let mut referenced = vec![false; original_count];
    for &idx in mesh.faces.iter().flatten() {
        if let Some(slot) = referenced.get_mut(idx as usize) {
            *slot = true;
        }
    }
    if referenced.iter().all(|&r| r) {
        return 0;
    }

    let mut remap = vec![u32::MAX; original_count];
    let mut new_vertices = Vec::with_capacity(original_count);
    for (old_idx, vertex) in mesh.vertices.iter().enumerate() {
        if referenced[old_idx] {
            #[allow(clippy::cast_possible_truncation)]
            // Truncation: new_vertices is no longer than the u32-indexed input.
            let new_idx = new_vertices.len() as u32;
            remap[old_idx] = new_idx;
            new_vertices.push(*vertex);
        }
    }

    for idx in mesh.faces.iter_mut().flatten() {
        *idx = remap[*idx as usize];
    }

    let removed = original_count - new_vertices.len();
    mesh.vertices = new_vertices;
    removed
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_types::{unit_cube, MeshTopology, Vertex};

    fn soup_square() -> IndexedMesh {
        // Two triangles sharing an edge, stored as separate vertices
        let mut mesh = IndexedMesh::new();
        for p in [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ] {
            mesh.vertices.push(Vertex::from(p));
        }
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([3, 4, 5]);
        mesh
    }

    #[test]
    fn exact_weld_merges_identical_positions() {
        let mut mesh = soup_square();
        assert_eq!(weld_vertices(&mut mesh, 0.0), 2);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 5]]);
    }

    #[test]
    fn weld_ignores_distant_vertices() {
        let mut mesh = unit_cube();
        assert_eq!(weld_vertices(&mut mesh, 0.1), 0);
        assert_eq!(mesh.face_count(), 12);
    }

    #[test]
    fn weld_collapses_sliver() {
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.005, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 5.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        assert_eq!(weld_vertices(&mut mesh, 0.01), 1);
        assert!(mesh.faces.is_empty());
    }

    #[test]
    fn clean_soup_square() {
        let mut mesh = soup_square();
        let summary = clean_mesh(&mut mesh, &CleanParams::default());
        assert_eq!(summary.vertices_welded, 2);
        assert_eq!(summary.unreferenced_removed, 2);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn clean_is_idempotent() {
        let mut mesh = soup_square();
        mesh.faces.push([0, 0, 1]);
        mesh.faces.push([2, 1, 0]);
        let _ = clean_mesh(&mut mesh, &CleanParams::default());
        let snapshot = mesh.clone();
        let second = clean_mesh(&mut mesh, &CleanParams::default());
        assert!(!second.had_changes(), "{second}");
        assert_eq!(mesh, snapshot);
    }

    #[test]
    fn duplicates_with_any_rotation() {
        let mut mesh = unit_cube();
        let f = mesh.faces[0];
        mesh.faces.push([f[1], f[2], f[0]]);
        mesh.faces.push([f[2], f[1], f[0]]);
        assert_eq!(remove_duplicate_faces(&mut mesh), 2);
    }

    #[test]
    fn largest_component_pass() {
        let mut mesh = unit_cube();
        let mut tri = IndexedMesh::new();
        tri.vertices.push(Vertex::from_coords(5.0, 0.0, 0.0));
        tri.vertices.push(Vertex::from_coords(6.0, 0.0, 0.0));
        tri.vertices.push(Vertex::from_coords(5.0, 1.0, 0.0));
        tri.faces.push([0, 1, 2]);
        mesh.merge(&tri);

        let summary = clean_mesh(&mut mesh, &CleanParams::largest_component());
        assert_eq!(summary.components_removed, 1);
        assert_eq!(mesh.vertex_count(), 8);
        assert!(summary.to_string().contains("1 components dropped"));
    }

    #[test]
    fn unreferenced_keeps_order() {
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(9.0, 9.0, 9.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([1, 2, 3]);
        assert_eq!(remove_unreferenced_vertices(&mut mesh), 1);
        assert_eq!(mesh.faces[0], [0, 1, 2]);
        assert!((mesh.vertices[1].position.x - 1.0).abs() < f64::EPSILON);
    }
}
