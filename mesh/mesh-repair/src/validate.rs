//! Mesh validation and health reporting.
//!
//! The compositor validates both boolean operands before every boolean and
//! logs the report when a mesh is open or non-manifold.

use hashbrown::HashSet;
use mesh_types::{IndexedMesh, MeshTopology};

use crate::adjacency::MeshAdjacency;
use crate::components::find_components;

/// Report of mesh validation results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshReport {
    /// Total number of vertices.
    pub vertex_count: usize,
    /// Total number of faces.
    pub face_count: usize,
    /// Total number of distinct edges.
    pub edge_count: usize,
    /// Number of vertex-connected components.
    pub component_count: usize,

    /// Edges with only one adjacent face.
    pub boundary_edge_count: usize,
    /// Edges with more than two adjacent faces.
    pub non_manifold_edge_count: usize,
    /// Faces with (near) zero area or a repeated vertex.
    pub degenerate_face_count: usize,
    /// Faces repeating another face's vertex set.
    pub duplicate_face_count: usize,
    /// Faces referencing a vertex that does not exist.
    pub invalid_index_count: usize,

    /// No boundary edges.
    pub is_watertight: bool,
    /// No non-manifold edges.
    pub is_manifold: bool,
    /// Signed volume is negative.
    pub is_inside_out: bool,
}

impl MeshReport {
    /// Closed, manifold and outward facing: safe to use as a boolean operand.
    #[must_use]
    pub fn is_solid(&self) -> bool {
        self.is_watertight && self.is_manifold && !self.is_inside_out
    }

    /// True if any issue was counted.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        self.issue_count() > 0
    }

    /// Sum of all counted issues.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.boundary_edge_count
            + self.non_manifold_edge_count
            + self.degenerate_face_count
            + self.duplicate_face_count
            + self.invalid_index_count
    }
}

impl std::fmt::Display for MeshReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let yes_no = |b: bool| if b { "Yes" } else { "No" };

        writeln!(f, "Mesh Report:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Faces: {}", self.face_count)?;
        writeln!(f, "  Edges: {}", self.edge_count)?;
        writeln!(f, "  Components: {}", self.component_count)?;
        writeln!(f)?;
        writeln!(f, "  Status:")?;
        writeln!(f, "    Watertight: {}", yes_no(self.is_watertight))?;
        writeln!(f, "    Manifold: {}", yes_no(self.is_manifold))?;
        writeln!(
            f,
            "    Winding: {}",
            if self.is_inside_out {
                "Inside-out"
            } else {
                "Correct"
            }
        )?;

        if self.has_issues() {
            writeln!(f)?;
            writeln!(f, "  Issues:")?;
            for (label, count) in [
                ("Boundary edges", self.boundary_edge_count),
                ("Non-manifold edges", self.non_manifold_edge_count),
                ("Degenerate faces", self.degenerate_face_count),
                ("Duplicate faces", self.duplicate_face_count),
                ("Invalid indices", self.invalid_index_count),
            ] {
                if count > 0 {
                    writeln!(f, "    {label}: {count}")?;
                }
            }
        }

        Ok(())
    }
}

/// Options for mesh validation.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Area at or below which a face counts as degenerate.
    pub degenerate_area_threshold: f64,
    /// Compute the signed volume to detect inside-out meshes.
    pub check_winding: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            degenerate_area_threshold: 1e-12,
            check_winding: true,
        }
    }
}

/// Validate a mesh with default options.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::validate_mesh;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// let report = validate_mesh(&mesh);
/// assert_eq!(report.boundary_edge_count, 3);
/// assert!(!report.is_watertight);
/// ```
#[must_use]
pub fn validate_mesh(mesh: &IndexedMesh) -> MeshReport {
    validate_mesh_with_options(mesh, &ValidationOptions::default())
}

/// Validate a mesh with custom options.
#[must_use]
pub fn validate_mesh_with_options(mesh: &IndexedMesh, options: &ValidationOptions) -> MeshReport {
    let adjacency = MeshAdjacency::build(&mesh.faces);

    let vertex_count = mesh.vertices.len();
    let invalid_index_count = mesh
        .faces
        .iter()
        .filter(|f| f.iter().any(|&i| i as usize >= vertex_count))
        .count();

    let degenerate_face_count = mesh
        .faces
        .iter()
        .enumerate()
        .filter(|&(i, &[a, b, c])| {
            a == b
                || b == c
                || a == c
                || mesh
                    .triangle(i)
                    .is_some_and(|t| t.area() <= options.degenerate_area_threshold)
        })
        .count();

    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(mesh.faces.len());
    let duplicate_face_count = mesh
        .faces
        .iter()
        .filter(|face| {
            let mut key = **face;
            key.sort_unstable();
            !seen.insert(key)
        })
        .count();

    let is_inside_out = options.check_winding && !mesh.faces.is_empty() && mesh.is_inside_out();

    MeshReport {
        vertex_count,
        face_count: mesh.faces.len(),
        edge_count: adjacency.edge_count(),
        component_count: find_components(mesh).component_count(),
        boundary_edge_count: adjacency.boundary_edge_count(),
        non_manifold_edge_count: adjacency.non_manifold_edge_count(),
        degenerate_face_count,
        duplicate_face_count,
        invalid_index_count,
        is_watertight: adjacency.is_watertight(),
        is_manifold: adjacency.is_manifold(),
        is_inside_out,
    }
}
