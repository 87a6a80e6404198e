//! Hole detection and filling.
//!
//! A hole is a closed loop of boundary edges (edges with only one adjacent
//! face). Loops are traced against the direction of the faces around them,
//! so fill triangles inherit the winding of the surrounding surface.
//!
//! # Example
//!
//! ```
//! use mesh_types::unit_cube;
//! use mesh_repair::{fill_holes, validate_mesh};
//!
//! let mut mesh = unit_cube();
//! mesh.faces.truncate(10); // open the +X side
//! assert!(!validate_mesh(&mesh).is_watertight);
//!
//! let filled = fill_holes(&mut mesh, 5.0).unwrap();
//! assert_eq!(filled, 1);
//! assert!(validate_mesh(&mesh).is_watertight);
//! assert!(!mesh.is_inside_out());
//! ```

use hashbrown::HashMap;
use mesh_types::{IndexedMesh, Point3, Triangle, Vector3};
use tracing::{debug, info, warn};

use crate::adjacency::{face_edges, MeshAdjacency};
use crate::error::{RepairError, RepairResult};

/// A boundary loop representing a hole in the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Ordered vertex indices. Triangulating in this order matches the
    /// winding of the surrounding faces.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }

    /// A loop needs at least three vertices to be filled.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3
    }

    /// Mean position of the loop vertices.
    #[must_use]
    pub fn centroid(&self, mesh: &IndexedMesh) -> Point3<f64> {
        let positions = self.positions(mesh);
        if positions.is_empty() {
            return Point3::origin();
        }
        let sum = positions
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        #[allow(clippy::cast_precision_loss)]
        let n = positions.len() as f64;
        Point3::from(sum / n)
    }

    /// Largest distance from the loop centroid to a loop vertex.
    ///
    /// This is the size compared against the `max_hole_size` of
    /// [`fill_holes`].
    #[must_use]
    pub fn radius(&self, mesh: &IndexedMesh) -> f64 {
        let centroid = self.centroid(mesh);
        self.positions(mesh)
            .iter()
            .map(|p| (p - centroid).norm())
            .fold(0.0, f64::max)
    }

    fn positions(&self, mesh: &IndexedMesh) -> Vec<Point3<f64>> {
        self.vertices
            .iter()
            .filter_map(|&i| mesh.vertices.get(i as usize).map(|v| v.position))
            .collect()
    }
}

/// Detect all boundary loops in the mesh.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::{detect_holes, MeshAdjacency};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// let adjacency = MeshAdjacency::build(&mesh.faces);
/// let holes = detect_holes(&mesh, &adjacency);
///
/// assert_eq!(holes.len(), 1);
/// assert_eq!(holes[0].vertices, vec![0, 2, 1]);
/// ```
#[must_use]
pub fn detect_holes(mesh: &IndexedMesh, adjacency: &MeshAdjacency) -> Vec<BoundaryLoop> {
    // Loop direction runs opposite to the owning face's directed edge.
    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut edge_count = 0usize;
    for face in &mesh.faces {
        for (a, b) in face_edges(*face) {
            if adjacency.faces_for_edge(a, b).is_some_and(|f| f.len() == 1) {
                outgoing.entry(b).or_default().push(a);
                edge_count += 1;
            }
        }
    }

    if edge_count == 0 {
        return Vec::new();
    }
    debug!(boundary_edges = edge_count, "tracing boundary loops");

    let mut starts: Vec<u32> = outgoing.keys().copied().collect();
    starts.sort_unstable();

    let mut loops = Vec::new();
    for start in starts {
        while let Some(first) = outgoing.get_mut(&start).and_then(Vec::pop) {
            let mut vertices = vec![start];
            let mut current = first;
            let mut closed = false;

            for _ in 0..=edge_count {
                if current == start {
                    closed = true;
                    break;
                }
                vertices.push(current);
                match outgoing.get_mut(&current).and_then(Vec::pop) {
                    Some(next) => current = next,
                    None => break,
                }
            }

            if !closed {
                warn!(start, length = vertices.len(), "boundary loop is not closed");
                continue;
            }
            if vertices.len() >= 3 {
                loops.push(BoundaryLoop { vertices });
            }
        }
    }

    info!(
        holes = loops.len(),
        sizes = ?loops.iter().map(BoundaryLoop::edge_count).collect::<Vec<_>>(),
        "detected boundary loops"
    );

    loops
}

/// Triangulate a boundary loop by ear clipping on its best-fit plane.
///
/// Falls back to a fan when no ear can be found. Returns the new faces; the
/// mesh itself is not modified.
#[must_use]
pub fn fill_hole_ear_clipping(mesh: &IndexedMesh, boundary: &BoundaryLoop) -> Vec<[u32; 3]> {
    let n = boundary.vertices.len();
    if n < 3 {
        return Vec::new();
    }

    let positions = boundary.positions(mesh);
    if positions.len() != n {
        return Vec::new();
    }
    let hole_normal = compute_hole_normal(&positions);

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let m = remaining.len();
        let ear = (0..m).find(|&i| {
            let prev = remaining[(i + m - 1) % m];
            let next = remaining[(i + 1) % m];
            is_ear(&positions, &remaining, prev, remaining[i], next, &hole_normal)
        });

        let Some(i) = ear else {
            warn!(
                remaining = m,
                "ear clipping stuck, using fan triangulation"
            );
            break;
        };

        let prev = remaining[(i + m - 1) % m];
        let next = remaining[(i + 1) % m];
        triangles.push([
            boundary.vertices[prev],
            boundary.vertices[remaining[i]],
            boundary.vertices[next],
        ]);
        remaining.remove(i);
    }

    for i in 1..remaining.len() - 1 {
        triangles.push([
            boundary.vertices[remaining[0]],
            boundary.vertices[remaining[i]],
            boundary.vertices[remaining[i + 1]],
        ]);
    }

    debug!(edges = n, triangles = triangles.len(), "filled hole");
    triangles
}

/// Newell normal of a closed polygon.
fn compute_hole_normal(positions: &[Point3<f64>]) -> Vector3<f64> {
    let n = positions.len();
    let normal = (0..n).fold(Vector3::zeros(), |acc, i| {
        let p = positions[i];
        let q = positions[(i + 1) % n];
        acc + Vector3::new(
            (p.y - q.y) * (p.z + q.z),
            (p.z - q.z) * (p.x + q.x),
            (p.x - q.x) * (p.y + q.y),
        )
    });

    let len = normal.norm();
    if len > f64::EPSILON {
        normal / len
    } else {
        Vector3::z()
    }
}

fn is_ear(
    positions: &[Point3<f64>],
    remaining: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    hole_normal: &Vector3<f64>,
) -> bool {
    let (p_prev, p_curr, p_next) = (positions[prev], positions[curr], positions[next]);

    let tri = Triangle::new(p_prev, p_curr, p_next);
    let Some(tri_normal) = tri.normal() else {
        return false;
    };
    // Reflex corner
    if tri_normal.dot(hole_normal) <= 0.0 {
        return false;
    }

    remaining
        .iter()
        .filter(|&&idx| idx != prev && idx != curr && idx != next)
        .all(|&idx| !point_in_triangle_2d(&positions[idx], &p_prev, &p_curr, &p_next, hole_normal))
}

/// Point-in-triangle test after projecting along the dominant normal axis.
fn point_in_triangle_2d(
    p: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
    normal: &Vector3<f64>,
) -> bool {
    let abs_normal = normal.abs();
    let project = |q: &Point3<f64>| {
        if abs_normal.z >= abs_normal.x && abs_normal.z >= abs_normal.y {
            (q.x, q.y)
        } else if abs_normal.y >= abs_normal.x {
            (q.x, q.z)
        } else {
            (q.y, q.z)
        }
    };

    let sign = |p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)| -> f64 {
        (p1.0 - p3.0) * (p2.1 - p3.1) - (p2.0 - p3.0) * (p1.1 - p3.1)
    };
    let (p, a, b, c) = (project(p), project(v0), project(v1), project(v2));

    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Fill every hole whose [`BoundaryLoop::radius`] is at most
/// `max_hole_size`.
///
/// Returns the number of holes filled.
///
/// # Errors
///
/// Returns [`RepairError::InvalidIndex`] if a face references a missing
/// vertex, or [`RepairError::InvalidParameter`] for a negative or NaN size.
pub fn fill_holes(mesh: &mut IndexedMesh, max_hole_size: f64) -> RepairResult<usize> {
    if max_hole_size.is_nan() || max_hole_size < 0.0 {
        return Err(RepairError::InvalidParameter {
            name: "max_hole_size",
            value: max_hole_size,
            reason: "must be non-negative",
        });
    }
    RepairError::check_indices(mesh)?;

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let holes = detect_holes(mesh, &adjacency);

    let mut filled = 0;
    let mut new_faces = Vec::new();
    for hole in &holes {
        let radius = hole.radius(mesh);
        if radius > max_hole_size {
            debug!(
                edges = hole.edge_count(),
                radius, max_hole_size, "skipping hole above size limit"
            );
            continue;
        }
        let triangles = fill_hole_ear_clipping(mesh, hole);
        if !triangles.is_empty() {
            new_faces.extend(triangles);
            filled += 1;
        }
    }
    mesh.faces.extend(new_faces);

    if filled > 0 {
        info!(filled, skipped = holes.len() - filled, "filled holes");
    }
    Ok(filled)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_types::{cuboid, unit_cube, Vertex};

    /// Unit cube missing its two top (+Z) triangles.
    fn open_box_mesh() -> IndexedMesh {
        let mut mesh = unit_cube();
        mesh.faces.drain(2..4);
        mesh
    }

    #[test]
    fn detect_holes_open_box() {
        let mesh = open_box_mesh();
        let adjacency = MeshAdjacency::build(&mesh.faces);
        let holes = detect_holes(&mesh, &adjacency);

        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].edge_count(), 4);
    }

    #[test]
    fn detect_holes_closed_box() {
        let mesh = unit_cube();
        let adjacency = MeshAdjacency::build(&mesh.faces);
        assert!(detect_holes(&mesh, &adjacency).is_empty());
    }

    #[test]
    fn fill_restores_volume_and_orientation() {
        let mut mesh = open_box_mesh();
        let filled = fill_holes(&mut mesh, 100.0).unwrap();

        assert_eq!(filled, 1);
        assert!(MeshAdjacency::build(&mesh.faces).is_watertight());
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn radius_limit_skips_hole() {
        let mut mesh = open_box_mesh();
        // Square of side 1 has radius sqrt(0.5)
        assert_eq!(fill_holes(&mut mesh, 0.7).unwrap(), 0);
        assert_eq!(fill_holes(&mut mesh, 0.71).unwrap(), 1);
    }

    #[test]
    fn concave_hole() {
        // L-shaped opening: flat L polygon as a one-sided sheet, filled from below
        let mut mesh = IndexedMesh::new();
        for p in [
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 2.0, 0.0],
            [0.0, 2.0, 0.0],
        ] {
            mesh.vertices.push(Vertex::from(p));
        }
        let boundary = BoundaryLoop {
            vertices: vec![0, 1, 2, 3, 4, 5],
        };
        let tris = fill_hole_ear_clipping(&mesh, &boundary);
        assert_eq!(tris.len(), 4);
        mesh.faces = tris;
        assert!((mesh.surface_area() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn two_holes_in_tube() {
        // Box with both Z caps removed is an open tube
        let mut mesh = cuboid(Point3::origin(), Point3::new(2.0, 2.0, 10.0));
        mesh.faces.drain(0..4);
        let adjacency = MeshAdjacency::build(&mesh.faces);
        assert_eq!(detect_holes(&mesh, &adjacency).len(), 2);

        assert_eq!(fill_holes(&mut mesh, 2.0).unwrap(), 2);
        assert!((mesh.signed_volume() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn negative_size_rejected() {
        let mut mesh = open_box_mesh();
        assert!(matches!(
            fill_holes(&mut mesh, -1.0),
            Err(RepairError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn boundary_loop_validity() {
        assert!(BoundaryLoop {
            vertices: vec![0, 1, 2]
        }
        .is_valid());
        assert!(!BoundaryLoop {
            vertices: vec![0, 1]
        }
        .is_valid());
    }
}
