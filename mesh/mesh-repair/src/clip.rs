//! Clip a mesh against an axis-aligned box.
//!
//! Triangles straddling a box plane are split exactly at the plane. New
//! vertices on a cut edge are shared between the pieces on either side, so
//! the result stays connected; the cut itself leaves open boundary loops.

use hashbrown::HashMap;
use mesh_types::{Aabb, IndexedMesh, Point3, Vertex};
use tracing::debug;

use crate::adjacency::undirected;
use crate::clean::remove_unreferenced_vertices;

/// Which part of the mesh [`clip_box`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ClipSide {
    /// Keep the surface inside the box.
    #[default]
    Inside,
    /// Keep the surface outside the box.
    Outside,
}

/// One box face as the half-space `sign * (p[axis] - value) <= 0`.
#[derive(Debug, Clone, Copy)]
struct HalfSpace {
    axis: usize,
    value: f64,
    sign: f64,
}

impl HalfSpace {
    fn distance(&self, p: &Point3<f64>) -> f64 {
        self.sign * (p[self.axis] - self.value)
    }
}

fn box_half_spaces(bounds: &Aabb) -> [HalfSpace; 6] {
    let mut planes = [HalfSpace {
        axis: 0,
        value: 0.0,
        sign: 1.0,
    }; 6];
    for axis in 0..3 {
        planes[axis * 2] = HalfSpace {
            axis,
            value: bounds.min[axis],
            sign: -1.0,
        };
        planes[axis * 2 + 1] = HalfSpace {
            axis,
            value: bounds.max[axis],
            sign: 1.0,
        };
    }
    planes
}

struct Clipper {
    vertices: Vec<Vertex>,
    cuts: HashMap<((u32, u32), usize), u32>,
}

impl Clipper {
    /// Vertex where edge `a-b` crosses plane `plane_id`, created once.
    fn cut_vertex(&mut self, a: u32, b: u32, plane_id: usize, plane: &HalfSpace) -> u32 {
        let key = (undirected(a, b), plane_id);
        if let Some(&idx) = self.cuts.get(&key) {
            return idx;
        }
        // Interpolate from the lower index so both directions agree bitwise
        let (lo, hi) = key.0;
        let (p, q) = (
            self.vertices[lo as usize].position,
            self.vertices[hi as usize].position,
        );
        let (dp, dq) = (plane.distance(&p), plane.distance(&q));
        let t = dp / (dp - dq);
        let mut position = p + (q - p) * t;
        // Land exactly on the plane
        position[plane.axis] = plane.value;

        #[allow(clippy::cast_possible_truncation)]
        // Truncation: clipping adds at most two vertices per edge and plane.
        let idx = self.vertices.len() as u32;
        self.vertices.push(Vertex::new(position));
        self.cuts.insert(key, idx);
        idx
    }

    /// Split a convex polygon into the parts with `d <= 0` and `d >= 0`.
    fn split(
        &mut self,
        polygon: &[u32],
        plane_id: usize,
        plane: &HalfSpace,
    ) -> (Vec<u32>, Vec<u32>) {
        let distances: Vec<f64> = polygon
            .iter()
            .map(|&v| plane.distance(&self.vertices[v as usize].position))
            .collect();
        // A polygon lying in the plane belongs to the inside only
        if distances.iter().all(|&d| d == 0.0) {
            return (polygon.to_vec(), Vec::new());
        }

        let mut inside = Vec::with_capacity(polygon.len() + 1);
        let mut outside = Vec::with_capacity(polygon.len() + 1);
        let n = polygon.len();

        for i in 0..n {
            let a = polygon[i];
            let b = polygon[(i + 1) % n];
            let (da, db) = (distances[i], distances[(i + 1) % n]);

            if da <= 0.0 {
                inside.push(a);
            }
            if da >= 0.0 {
                outside.push(a);
            }
            if (da < 0.0 && db > 0.0) || (da > 0.0 && db < 0.0) {
                let c = self.cut_vertex(a, b, plane_id, plane);
                inside.push(c);
                outside.push(c);
            }
        }
        (inside, outside)
    }
}

fn push_fan(faces: &mut Vec<[u32; 3]>, polygon: &[u32]) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..polygon.len() - 1 {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

/// Clip `mesh` against `bounds`, keeping the `side` part.
///
/// An [`ClipSide::Inside`] clip intersects each triangle with the six
/// half-spaces of the box. An [`ClipSide::Outside`] clip peels off the part
/// outside each plane in turn. Unused vertices are dropped.
///
/// # Example
///
/// ```
/// use mesh_types::{cuboid, Aabb, Point3, MeshBounds};
/// use mesh_repair::{clip_box, ClipSide};
///
/// let mesh = cuboid(Point3::origin(), Point3::new(10.0, 10.0, 10.0));
/// let bounds = Aabb::new(Point3::new(-1.0, -1.0, 5.0), Point3::new(11.0, 11.0, 11.0));
///
/// let top = clip_box(&mesh, &bounds, ClipSide::Inside);
/// assert!((top.bounds().min.z - 5.0).abs() < 1e-12);
///
/// let bottom = clip_box(&mesh, &bounds, ClipSide::Outside);
/// assert!((bottom.bounds().max.z - 5.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn clip_box(mesh: &IndexedMesh, bounds: &Aabb, side: ClipSide) -> IndexedMesh {
    let planes = box_half_spaces(bounds);
    let mut clipper = Clipper {
        vertices: mesh.vertices.clone(),
        cuts: HashMap::new(),
    };
    let mut faces = Vec::with_capacity(mesh.faces.len());
    let vertex_count = mesh.vertices.len();

    for face in &mesh.faces {
        if face.iter().any(|&i| i as usize >= vertex_count) {
            continue;
        }
        let mut polygon: Vec<u32> = face.to_vec();

        for (plane_id, plane) in planes.iter().enumerate() {
            if polygon.len() < 3 {
                break;
            }
            let (inside, outside) = clipper.split(&polygon, plane_id, plane);
            if side == ClipSide::Outside {
                push_fan(&mut faces, &outside);
            }
            polygon = inside;
        }

        if side == ClipSide::Inside {
            push_fan(&mut faces, &polygon);
        }
    }

    let mut result = IndexedMesh {
        vertices: clipper.vertices,
        faces,
    };
    // Pieces touching a plane only along an edge or a point have zero area
    result.faces.retain(|f| {
        let [a, b, c] = f.map(|i| result.vertices[i as usize].position);
        (b - a).cross(&(c - a)).norm_squared() > 0.0
    });
    remove_unreferenced_vertices(&mut result);

    debug!(
        ?side,
        input_faces = mesh.faces.len(),
        output_faces = result.faces.len(),
        cut_vertices = clipper.cuts.len(),
        "clipped mesh against box"
    );
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::adjacency::MeshAdjacency;
    use crate::holes::fill_holes;
    use mesh_types::{cuboid, unit_cube, MeshBounds, MeshTopology};

    #[test]
    fn box_fully_inside_keeps_everything() {
        let mesh = unit_cube();
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(2.0, 2.0, 2.0));
        let inside = clip_box(&mesh, &bounds, ClipSide::Inside);
        assert_eq!(inside.face_count(), 12);
        assert!(clip_box(&mesh, &bounds, ClipSide::Outside).is_empty());
    }

    #[test]
    fn disjoint_box_keeps_nothing_inside() {
        let mesh = unit_cube();
        let bounds = Aabb::new(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0));
        assert!(clip_box(&mesh, &bounds, ClipSide::Inside).is_empty());
        assert_eq!(clip_box(&mesh, &bounds, ClipSide::Outside).face_count(), 12);
    }

    #[test]
    fn cut_is_exact_and_connected() {
        let mesh = cuboid(Point3::origin(), Point3::new(4.0, 4.0, 4.0));
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, 1.5), Point3::new(5.0, 5.0, 5.0));
        let top = clip_box(&mesh, &bounds, ClipSide::Inside);

        assert!((top.bounds().min.z - 1.5).abs() < 1e-12);
        let adjacency = MeshAdjacency::build(&top.faces);
        assert!(adjacency.is_manifold());
        // Only the cut rim is open
        for (a, b) in adjacency.boundary_edges() {
            assert!((top.vertices[a as usize].position.z - 1.5).abs() < 1e-12);
            assert!((top.vertices[b as usize].position.z - 1.5).abs() < 1e-12);
        }
    }

    #[test]
    fn capped_halves_recover_volume() {
        let mesh = cuboid(Point3::origin(), Point3::new(4.0, 4.0, 4.0));
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, 1.0), Point3::new(5.0, 5.0, 5.0));

        let mut top = clip_box(&mesh, &bounds, ClipSide::Inside);
        let mut bottom = clip_box(&mesh, &bounds, ClipSide::Outside);
        assert_eq!(fill_holes(&mut top, 100.0).unwrap(), 1);
        assert_eq!(fill_holes(&mut bottom, 100.0).unwrap(), 1);

        assert!((top.signed_volume() - 48.0).abs() < 1e-9);
        assert!((bottom.signed_volume() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn corner_box_outside() {
        // Remove one octant corner
        let mesh = cuboid(Point3::origin(), Point3::new(2.0, 2.0, 2.0));
        let bounds = Aabb::new(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0));
        let rest = clip_box(&mesh, &bounds, ClipSide::Outside);
        let corner = clip_box(&mesh, &bounds, ClipSide::Inside);

        let total = mesh.surface_area();
        assert!((rest.surface_area() + corner.surface_area() - total).abs() < 1e-9);
        assert!((corner.surface_area() - 3.0).abs() < 1e-9);
    }
}
