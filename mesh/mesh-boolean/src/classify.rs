//! Inside/outside classification for boolean operations.
//!
//! After cutting, no face of one operand crosses the other surface. Faces
//! connected through edges that are not on the intersection curve form a
//! patch, and all faces of a patch share the same side. Each patch is
//! classified once, by ray casting from a sample point against the other
//! original operand.

use hashbrown::{HashMap, HashSet};
use mesh_types::{IndexedMesh, Point3, Vector3};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::bvh::Bvh;
use crate::intersect::{ray_triangle_intersect, triangle_centroid};

/// Skewed ray directions; none is parallel to a coordinate plane, so rays
/// from axis-aligned geometry do not graze its edges.
const RAY_DIRECTIONS: [[f64; 3]; 3] = [
    [0.8017, 0.4534, 0.3895],
    [-0.3251, 0.8713, -0.3677],
    [0.2133, -0.3578, 0.9091],
];

/// Result of a point-in-mesh test with additional information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointInMeshResult {
    /// Whether the point is inside the mesh.
    pub inside: bool,
    /// Rays (out of three) with an odd number of crossings.
    pub odd_rays: usize,
}

fn count_crossings(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    mesh: &IndexedMesh,
    bvh: &Bvh,
) -> usize {
    bvh.query_ray(origin, direction)
        .into_iter()
        .filter(|&tri| {
            let face = mesh.faces[tri as usize];
            let [v0, v1, v2] = face.map(|v| mesh.vertices[v as usize].position);
            ray_triangle_intersect(origin, direction, &v0, &v1, &v2, 0.0).is_some()
        })
        .count()
}

/// Test if a point is inside a closed mesh.
///
/// Casts three rays in fixed skewed directions and takes the majority of
/// their crossing parities, which tolerates one ray grazing an edge.
///
/// # Example
///
/// ```
/// use mesh_boolean::{point_in_mesh, Bvh};
/// use mesh_types::{cuboid, Point3};
///
/// let cube = cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// let bvh = Bvh::build(&cube, 4);
/// assert!(point_in_mesh(&Point3::new(0.5, 0.5, 0.5), &cube, &bvh).inside);
/// assert!(!point_in_mesh(&Point3::new(1.5, 0.5, 0.5), &cube, &bvh).inside);
/// ```
#[must_use]
pub fn point_in_mesh(point: &Point3<f64>, mesh: &IndexedMesh, bvh: &Bvh) -> PointInMeshResult {
    let odd_rays = RAY_DIRECTIONS
        .iter()
        .filter(|d| {
            let direction = Vector3::new(d[0], d[1], d[2]);
            count_crossings(point, &direction, mesh, bvh) % 2 == 1
        })
        .count();
    PointInMeshResult {
        inside: odd_rays >= 2,
        odd_rays,
    }
}

/// Faces grouped into patches bounded by the intersection curve.
#[derive(Debug, Clone)]
pub(crate) struct Patches {
    /// Patch index of every face.
    pub face_patch: Vec<usize>,
    /// Representative face of every patch (its largest).
    pub representatives: Vec<usize>,
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

fn face_area(face: &[u32; 3], positions: &[Point3<f64>]) -> f64 {
    let [a, b, c] = face.map(|v| positions[v as usize]);
    (b - a).cross(&(c - a)).norm()
}

/// Group `faces` into patches that do not cross `cut_edges`.
pub(crate) fn find_patches(
    faces: &[[u32; 3]],
    positions: &[Point3<f64>],
    cut_edges: &HashSet<(u32, u32)>,
) -> Patches {
    let mut parent: Vec<usize> = (0..faces.len()).collect();
    let mut first_with_edge: HashMap<(u32, u32), usize> = HashMap::new();

    for (fi, face) in faces.iter().enumerate() {
        for k in 0..3 {
            let (a, b) = (face[k], face[(k + 1) % 3]);
            let edge = if a < b { (a, b) } else { (b, a) };
            if cut_edges.contains(&edge) {
                continue;
            }
            match first_with_edge.get(&edge) {
                Some(&other) => {
                    let (ra, rb) = (find(&mut parent, fi), find(&mut parent, other));
                    if ra != rb {
                        parent[ra.max(rb)] = ra.min(rb);
                    }
                }
                None => {
                    first_with_edge.insert(edge, fi);
                }
            }
        }
    }

    let mut root_patch: HashMap<usize, usize> = HashMap::new();
    let mut face_patch = Vec::with_capacity(faces.len());
    let mut representatives: Vec<usize> = Vec::new();
    let mut best_area: Vec<f64> = Vec::new();
    for (fi, face) in faces.iter().enumerate() {
        let root = find(&mut parent, fi);
        let next = representatives.len();
        let patch = *root_patch.entry(root).or_insert(next);
        if patch == next {
            representatives.push(fi);
            best_area.push(face_area(face, positions));
        } else {
            let area = face_area(face, positions);
            if area > best_area[patch] {
                best_area[patch] = area;
                representatives[patch] = fi;
            }
        }
        face_patch.push(patch);
    }

    Patches {
        face_patch,
        representatives,
    }
}

/// Whether each patch lies inside `other`.
pub(crate) fn classify_patches(
    patches: &Patches,
    faces: &[[u32; 3]],
    positions: &[Point3<f64>],
    other: &IndexedMesh,
    other_bvh: &Bvh,
    parallel: bool,
) -> Vec<bool> {
    let sample = |&rep: &usize| {
        let [a, b, c] = faces[rep].map(|v| positions[v as usize]);
        point_in_mesh(&triangle_centroid(&a, &b, &c), other, other_bvh).inside
    };

    #[cfg(feature = "parallel")]
    if parallel {
        return patches.representatives.par_iter().map(sample).collect();
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    patches.representatives.iter().map(sample).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_types::cuboid;

    fn cube() -> IndexedMesh {
        cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn point_in_mesh_inside_and_outside() {
        let mesh = cube();
        let bvh = Bvh::build(&mesh, 4);
        let inside = point_in_mesh(&Point3::new(0.5, 0.5, 0.5), &mesh, &bvh);
        assert!(inside.inside);
        assert_eq!(inside.odd_rays, 3);
        assert!(!point_in_mesh(&Point3::new(2.0, 0.5, 0.5), &mesh, &bvh).inside);
        assert!(!point_in_mesh(&Point3::new(-0.5, -0.5, -0.5), &mesh, &bvh).inside);
    }

    #[test]
    fn point_in_mesh_near_corner() {
        let mesh = cube();
        let bvh = Bvh::build(&mesh, 4);
        assert!(point_in_mesh(&Point3::new(0.01, 0.01, 0.99), &mesh, &bvh).inside);
    }

    #[test]
    fn uncut_cube_is_one_patch() {
        let mesh = cube();
        let positions: Vec<_> = mesh.positions().copied().collect();
        let patches = find_patches(&mesh.faces, &positions, &HashSet::new());
        assert_eq!(patches.representatives.len(), 1);
        assert!(patches.face_patch.iter().all(|&p| p == 0));
    }

    #[test]
    fn cut_edges_separate_patches() {
        let mesh = cube();
        let positions: Vec<_> = mesh.positions().copied().collect();
        // Cut every edge: each face becomes its own patch
        let cut: HashSet<(u32, u32)> = mesh
            .faces
            .iter()
            .flat_map(|f| {
                (0..3).map(move |k| {
                    let (a, b) = (f[k], f[(k + 1) % 3]);
                    (a.min(b), a.max(b))
                })
            })
            .collect();
        let patches = find_patches(&mesh.faces, &positions, &cut);
        assert_eq!(patches.representatives.len(), 12);
    }

    #[test]
    fn patch_classification_against_other() {
        let small = cuboid(Point3::new(0.25, 0.25, 0.25), Point3::new(0.75, 0.75, 0.75));
        let big = cube();
        let bvh = Bvh::build(&big, 4);
        let positions: Vec<_> = small.positions().copied().collect();
        let patches = find_patches(&small.faces, &positions, &HashSet::new());
        let inside = classify_patches(&patches, &small.faces, &positions, &big, &bvh, false);
        assert_eq!(inside, vec![true]);
        let inside_par = classify_patches(&patches, &small.faces, &positions, &big, &bvh, true);
        assert_eq!(inside, inside_par);
    }
}
