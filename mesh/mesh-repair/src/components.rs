//! Connected component analysis.
//!
//! Two faces are connected when they share a vertex. Component size is the
//! number of distinct vertices the component references, which is what the
//! small-object filter compares.

use mesh_types::{Aabb, IndexedMesh};
use tracing::debug;

use crate::clean::remove_unreferenced_vertices;

/// One connected component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Indices into the mesh face list, ascending.
    pub faces: Vec<usize>,
    /// Distinct vertices referenced by the component.
    pub vertex_count: usize,
}

/// Result of [`find_components`].
///
/// Components are ordered by their lowest face index, so ties on size are
/// broken by mesh order.
#[derive(Debug, Clone, Default)]
pub struct ComponentAnalysis {
    /// Every component found.
    pub components: Vec<Component>,
}

impl ComponentAnalysis {
    /// Number of components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Index of the component with the most vertices. First wins on ties.
    #[must_use]
    pub fn largest(&self) -> Option<usize> {
        self.components
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, usize)>, (i, c)| match best {
                Some((_, n)) if n >= c.vertex_count => best,
                _ => Some((i, c.vertex_count)),
            })
            .map(|(i, _)| i)
    }

    /// Vertex count of the largest component, or 0 for an empty mesh.
    #[must_use]
    pub fn largest_vertex_count(&self) -> usize {
        self.largest()
            .map_or(0, |i| self.components[i].vertex_count)
    }
}

struct DisjointSet {
    parent: Vec<u32>,
}

impl DisjointSet {
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: face indices are u32, so the vertex count fits in u32.
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
        }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower root wins so labels follow mesh order
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi as usize] = lo;
        }
    }
}

/// Find vertex-connected components.
///
/// Faces with out-of-range indices are ignored.
///
/// # Example
///
/// ```
/// use mesh_types::{cuboid, Point3};
/// use mesh_repair::find_components;
///
/// let mut mesh = cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// mesh.merge(&cuboid(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0)));
///
/// let analysis = find_components(&mesh);
/// assert_eq!(analysis.component_count(), 2);
/// assert_eq!(analysis.components[0].vertex_count, 8);
/// ```
#[must_use]
pub fn find_components(mesh: &IndexedMesh) -> ComponentAnalysis {
    let n = mesh.vertices.len();
    let mut sets = DisjointSet::new(n);
    let valid = |face: &[u32; 3]| face.iter().all(|&i| (i as usize) < n);

    for face in mesh.faces.iter().filter(|f| valid(f)) {
        sets.union(face[0], face[1]);
        sets.union(face[1], face[2]);
    }

    let mut root_to_component: hashbrown::HashMap<u32, usize> = hashbrown::HashMap::new();
    let mut components: Vec<Component> = Vec::new();
    let mut counted = vec![false; n];

    for (face_idx, face) in mesh.faces.iter().enumerate() {
        if !valid(face) {
            continue;
        }
        let root = sets.find(face[0]);
        let slot = *root_to_component.entry(root).or_insert_with(|| {
            components.push(Component {
                faces: Vec::new(),
                vertex_count: 0,
            });
            components.len() - 1
        });
        let component = &mut components[slot];
        component.faces.push(face_idx);
        for &v in face {
            if !counted[v as usize] {
                counted[v as usize] = true;
                component.vertex_count += 1;
            }
        }
    }

    ComponentAnalysis { components }
}

/// Split a mesh into one mesh per component, in [`find_components`] order.
#[must_use]
pub fn split_components(mesh: &IndexedMesh) -> Vec<IndexedMesh> {
    find_components(mesh)
        .components
        .iter()
        .map(|c| extract_faces(mesh, &c.faces))
        .collect()
}

/// Discard components whose vertex count is not above `ratio` times the
/// largest component's.
///
/// - `ratio <= 0` leaves the mesh untouched.
/// - `ratio >= 1` keeps only the single largest component (the first one on
///   a tie).
///
/// Vertices left unreferenced are removed. Returns the number of components
/// discarded.
///
/// # Example
///
/// ```
/// use mesh_types::{cuboid, Point3, MeshTopology};
/// use mesh_repair::remove_small_components;
///
/// let mut mesh = cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// mesh.merge(&cuboid(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0)));
///
/// // Equal-size components both survive a ratio below 1
/// assert_eq!(remove_small_components(&mut mesh, 0.99), 0);
/// assert_eq!(remove_small_components(&mut mesh, 1.0), 1);
/// assert_eq!(mesh.vertex_count(), 8);
/// ```
pub fn remove_small_components(mesh: &mut IndexedMesh, ratio: f64) -> usize {
    if ratio <= 0.0 || mesh.faces.is_empty() {
        return 0;
    }

    let analysis = find_components(mesh);
    let Some(largest) = analysis.largest() else {
        return 0;
    };

    #[allow(clippy::cast_precision_loss)]
    // Precision: vertex counts are far below 2^52.
    let threshold = analysis.largest_vertex_count() as f64 * ratio;
    let keep: Vec<bool> = analysis
        .components
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if ratio >= 1.0 {
                i == largest
            } else {
                #[allow(clippy::cast_precision_loss)]
                // Precision: vertex counts are far below 2^52.
                let size = c.vertex_count as f64;
                size > threshold
            }
        })
        .collect();

    retain_components(mesh, &analysis, &keep)
}

/// Keep only the component with the most vertices.
///
/// Returns the number of components discarded.
pub fn keep_largest_component(mesh: &mut IndexedMesh) -> usize {
    remove_small_components(mesh, 1.0)
}

/// Keep the largest closed solid: the outer shell enclosing the most volume,
/// together with every inward-facing shell nested inside its bounds.
///
/// A boolean difference that carves a fully enclosed cavity produces two
/// disconnected shells that belong to the same solid; this keeps both where
/// [`keep_largest_component`] would drop the cavity. When no component
/// encloses positive volume this falls back to [`keep_largest_component`].
///
/// Returns the number of components discarded.
pub fn keep_largest_solid(mesh: &mut IndexedMesh) -> usize {
    let analysis = find_components(mesh);
    if analysis.component_count() <= 1 {
        return 0;
    }

    let shells: Vec<(f64, Aabb)> = analysis
        .components
        .iter()
        .map(|c| {
            let part = extract_faces(mesh, &c.faces);
            (part.signed_volume(), Aabb::from_points(part.positions()))
        })
        .collect();

    let outer = shells
        .iter()
        .enumerate()
        .filter(|(_, (v, _))| *v > 0.0)
        .fold(None, |best: Option<(usize, f64)>, (i, &(v, _))| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i);

    let Some(outer) = outer else {
        return keep_largest_component(mesh);
    };
    let outer_bounds = shells[outer].1;

    let keep: Vec<bool> = shells
        .iter()
        .enumerate()
        .map(|(i, (volume, bounds))| {
            i == outer
                || (*volume < 0.0
                    && outer_bounds.contains(&bounds.min)
                    && outer_bounds.contains(&bounds.max))
        })
        .collect();

    retain_components(mesh, &analysis, &keep)
}

fn retain_components(mesh: &mut IndexedMesh, analysis: &ComponentAnalysis, keep: &[bool]) -> usize {
    let removed = keep.iter().filter(|&&k| !k).count();
    if removed == 0 {
        return 0;
    }

    let mut keep_face = vec![false; mesh.faces.len()];
    for (component, _) in analysis
        .components
        .iter()
        .zip(keep)
        .filter(|(_, &k)| k)
    {
        for &f in &component.faces {
            keep_face[f] = true;
        }
    }

    let mut idx = 0;
    mesh.faces.retain(|_| {
        let k = keep_face[idx];
        idx += 1;
        k
    });
    let dropped_vertices = remove_unreferenced_vertices(mesh);

    debug!(
        components_removed = removed,
        vertices_removed = dropped_vertices,
        remaining_faces = mesh.faces.len(),
        "removed small components"
    );
    removed
}

fn extract_faces(mesh: &IndexedMesh, faces: &[usize]) -> IndexedMesh {
    let mut part = IndexedMesh::new();
    let mut remap: hashbrown::HashMap<u32, u32> = hashbrown::HashMap::new();
    for &f in faces {
        let face = mesh.faces[f];
        let mapped = face.map(|v| {
            *remap.entry(v).or_insert_with(|| {
                #[allow(clippy::cast_possible_truncation)]
                // Truncation: part is a subset of a u32-indexed mesh.
                let idx = part.vertices.len() as u32;
                part.vertices.push(mesh.vertices[v as usize]);
                idx
            })
        });
        part.faces.push(mapped);
    }
    part
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_types::{cuboid, MeshBounds, MeshTopology, Point3, Vertex};

    fn big_and_small() -> IndexedMesh {
        // Small component first so "largest" must not just pick index 0
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(50.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(51.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(50.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh.merge(&cuboid(Point3::origin(), Point3::new(10.0, 10.0, 10.0)));
        mesh
    }

    #[test]
    fn finds_components_in_order() {
        let analysis = find_components(&big_and_small());
        assert_eq!(analysis.component_count(), 2);
        assert_eq!(analysis.components[0].vertex_count, 3);
        assert_eq!(analysis.components[1].vertex_count, 8);
        assert_eq!(analysis.largest(), Some(1));
    }

    #[test]
    fn ratio_zero_is_noop() {
        let mut mesh = big_and_small();
        let before = mesh.clone();
        assert_eq!(remove_small_components(&mut mesh, 0.0), 0);
        assert_eq!(mesh, before);
    }

    #[test]
    fn ratio_filters_by_vertex_count() {
        let mut mesh = big_and_small();
        // 3 > 8 * 0.3 keeps both
        assert_eq!(remove_small_components(&mut mesh.clone(), 0.3), 0);
        // 3 > 8 * 0.5 fails
        assert_eq!(remove_small_components(&mut mesh, 0.5), 1);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
    }

    #[test]
    fn component_at_threshold_is_dropped() {
        let mut mesh = big_and_small();
        // 3 == 8 * 0.375 exactly; only a strictly larger component survives
        assert_eq!(remove_small_components(&mut mesh, 0.375), 1);
        assert_eq!(mesh.vertex_count(), 8);
    }

    #[test]
    fn ratio_one_keeps_first_on_tie() {
        let mut mesh = cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        mesh.merge(&cuboid(Point3::new(5.0, 0.0, 0.0), Point3::new(6.0, 1.0, 1.0)));
        assert_eq!(keep_largest_component(&mut mesh), 1);
        assert!(mesh.bounds().max.x < 2.0);
    }

    #[test]
    fn split_round_trips_counts() {
        let parts = split_components(&big_and_small());
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].face_count(), 1);
        assert_eq!(parts[1].face_count(), 12);
        assert!((parts[1].volume() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn largest_solid_keeps_cavity() {
        let mut mesh = cuboid(Point3::origin(), Point3::new(10.0, 10.0, 10.0));
        let mut cavity = cuboid(Point3::new(4.0, 4.0, 4.0), Point3::new(6.0, 6.0, 6.0));
        cavity.flip_normals();
        mesh.merge(&cavity);
        let mut debris = cuboid(Point3::new(20.0, 0.0, 0.0), Point3::new(21.0, 1.0, 1.0));
        debris.flip_normals();
        mesh.merge(&debris);

        assert_eq!(keep_largest_solid(&mut mesh), 1);
        assert_eq!(mesh.vertex_count(), 16);
        assert!((mesh.signed_volume() - 992.0).abs() < 1e-9);
    }

    #[test]
    fn empty_mesh() {
        let mut mesh = IndexedMesh::new();
        assert_eq!(find_components(&mesh).component_count(), 0);
        assert_eq!(keep_largest_component(&mut mesh), 0);
        assert_eq!(keep_largest_solid(&mut mesh), 0);
    }
}
