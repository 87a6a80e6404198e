//! Mesh adjacency data structures.
//!
//! Edge-to-face and vertex-to-face lookups shared by validation, hole
//! detection, smoothing and component analysis.

use hashbrown::HashMap;
use smallvec::SmallVec;

/// Faces around an edge. Two for a manifold interior edge.
pub type EdgeFaces = SmallVec<[usize; 2]>;

/// Adjacency information for a mesh.
///
/// Provides lookups for:
/// - Faces adjacent to an edge
/// - Faces adjacent to a vertex
/// - Boundary edges (one adjacent face)
/// - Non-manifold edges (more than two adjacent faces)
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Undirected edge `(lo, hi)` to incident faces.
    edge_to_faces: HashMap<(u32, u32), EdgeFaces>,
    /// Vertex to incident faces.
    vertex_to_faces: HashMap<u32, Vec<usize>>,
}

impl MeshAdjacency {
    /// Build adjacency from a face list.
    ///
    /// ```
    /// use mesh_repair::MeshAdjacency;
    ///
    /// let adj = MeshAdjacency::build(&[[0, 1, 2], [1, 3, 2]]);
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// assert_eq!(adj.faces_for_edge(2, 1).map(<[usize]>::len), Some(2));
    /// ```
    #[must_use]
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), EdgeFaces> =
            HashMap::with_capacity(faces.len() * 3 / 2);
        let mut vertex_to_faces: HashMap<u32, Vec<usize>> = HashMap::with_capacity(faces.len() / 2);

        for (face_idx, face) in faces.iter().enumerate() {
            for &v in face {
                vertex_to_faces.entry(v).or_default().push(face_idx);
            }
            for (a, b) in face_edges(*face) {
                edge_to_faces
                    .entry(undirected(a, b))
                    .or_default()
                    .push(face_idx);
            }
        }

        Self {
            edge_to_faces,
            vertex_to_faces,
        }
    }

    /// Faces on an edge, in either direction. `None` if the edge is absent.
    #[must_use]
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[usize]> {
        self.edge_to_faces
            .get(&undirected(v0, v1))
            .map(SmallVec::as_slice)
    }

    /// Faces around a vertex; empty if the vertex is unused.
    #[must_use]
    pub fn faces_for_vertex(&self, v: u32) -> &[usize] {
        self.vertex_to_faces.get(&v).map_or(&[], Vec::as_slice)
    }

    /// Iterate over all undirected edges with their face count.
    pub fn edges(&self) -> impl Iterator<Item = ((u32, u32), usize)> + '_ {
        self.edge_to_faces.iter().map(|(&e, f)| (e, f.len()))
    }

    /// Edges with exactly one adjacent face.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edges().filter(|&(_, n)| n == 1).map(|(e, _)| e)
    }

    /// Number of boundary edges.
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.boundary_edges().count()
    }

    /// Edges with more than two adjacent faces.
    pub fn non_manifold_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edges().filter(|&(_, n)| n > 2).map(|(e, _)| e)
    }

    /// Number of non-manifold edges.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.non_manifold_edges().count()
    }

    /// True if no edge has more than two faces.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.edge_to_faces.values().all(|f| f.len() <= 2)
    }

    /// True if every edge has at least two faces (no boundary).
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edge_to_faces.values().all(|f| f.len() >= 2)
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    /// Number of vertices referenced by at least one face.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_to_faces.len()
    }
}

/// The three directed edges of a face, in winding order.
#[inline]
#[must_use]
pub fn face_edges(face: [u32; 3]) -> [(u32, u32); 3] {
    [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])]
}

/// Edge key with the smaller index first.
#[inline]
#[must_use]
pub fn undirected(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 {
        (v0, v1)
    } else {
        (v1, v0)
    }
}
