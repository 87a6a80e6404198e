//! Quadric-error edge-collapse decimation.
//!
//! Each vertex carries the sum of the plane quadrics of its faces. Edges are
//! collapsed cheapest first into the point minimizing the combined quadric,
//! until the face count reaches the target. Collapses that would change the
//! topology (link condition) or fold a face over are rejected.

// Algorithm uses standard mathematical variable names
#![allow(clippy::many_single_char_names)]

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::HashSet;
use mesh_types::{IndexedMesh, Point3, Vector3};
use tracing::{debug, info};

use crate::adjacency::{undirected, MeshAdjacency};
use crate::clean::remove_unreferenced_vertices;
use crate::error::{RepairError, RepairResult};

/// Parameters for [`decimate_mesh`].
///
/// # Example
///
/// ```
/// use mesh_repair::DecimateParams;
///
/// let params = DecimateParams::default().with_target_reduction(0.75);
/// assert!((params.target_reduction - 0.75).abs() < f64::EPSILON);
/// assert!(params.preserve_boundary);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DecimateParams {
    /// Fraction of faces to remove, in `[0, 1)`.
    ///
    /// Default: `0.5`
    pub target_reduction: f64,

    /// Keep boundary vertices where they are.
    ///
    /// Default: `true`
    pub preserve_boundary: bool,

    /// Reject collapses whose quadric error exceeds this.
    ///
    /// Default: `None`
    pub max_error: Option<f64>,
}

impl Default for DecimateParams {
    fn default() -> Self {
        Self {
            target_reduction: 0.5,
            preserve_boundary: true,
            max_error: None,
        }
    }
}

impl DecimateParams {
    /// Remove the given fraction of faces with default settings.
    #[must_use]
    pub fn reduce_by(fraction: f64) -> Self {
        Self::default().with_target_reduction(fraction)
    }

    /// Set the fraction of faces to remove.
    #[must_use]
    pub fn with_target_reduction(mut self, fraction: f64) -> Self {
        self.target_reduction = fraction;
        self
    }

    /// Enable or disable boundary preservation.
    #[must_use]
    pub fn with_preserve_boundary(mut self, preserve: bool) -> Self {
        self.preserve_boundary = preserve;
        self
    }

    /// Set the quadric error ceiling.
    #[must_use]
    pub fn with_max_error(mut self, max_error: f64) -> Self {
        self.max_error = Some(max_error);
        self
    }
}

/// What [`decimate_mesh`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecimationResult {
    /// Faces before decimation.
    pub original_triangles: usize,
    /// Faces after decimation.
    pub final_triangles: usize,
    /// Edge collapses performed.
    pub collapses_performed: usize,
    /// Candidate collapses rejected by the topology, fold-over or error checks.
    pub collapses_rejected: usize,
}

impl DecimationResult {
    /// `final / original`, or 1 for an empty mesh.
    #[must_use]
    pub fn reduction_ratio(&self) -> f64 {
        if self.original_triangles == 0 {
            1.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = self.final_triangles as f64 / self.original_triangles as f64;
            ratio
        }
    }

    /// Percentage of faces removed.
    #[must_use]
    pub fn reduction_percent(&self) -> f64 {
        (1.0 - self.reduction_ratio()) * 100.0
    }
}

impl std::fmt::Display for DecimationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Decimation: {} → {} triangles ({:.1}% reduction, {} collapses)",
            self.original_triangles,
            self.final_triangles,
            self.reduction_percent(),
            self.collapses_performed
        )
    }
}

/// Symmetric 4x4 quadric stored as its upper triangle.
#[derive(Debug, Clone, Copy, Default)]
struct Quadric {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    g: f64,
    h: f64,
    i: f64,
    j: f64,
}

impl Quadric {
    /// Quadric of the plane `ax + by + cz + d = 0` with a unit normal.
    fn from_plane(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            a: a * a,
            b: a * b,
            c: a * c,
            d: a * d,
            e: b * b,
            f: b * c,
            g: b * d,
            h: c * c,
            i: c * d,
            j: d * d,
        }
    }

    fn add(&mut self, other: &Self) {
        self.a += other.a;
        self.b += other.b;
        self.c += other.c;
        self.d += other.d;
        self.e += other.e;
        self.f += other.f;
        self.g += other.g;
        self.h += other.h;
        self.i += other.i;
        self.j += other.j;
    }

    /// Sum of squared distances from `p` to the accumulated planes.
    fn evaluate(&self, p: &Point3<f64>) -> f64 {
        let (x, y, z) = (p.x, p.y, p.z);
        x.mul_add(
            x.mul_add(self.a, 2.0 * y.mul_add(self.b, z.mul_add(self.c, self.d))),
            y.mul_add(
                y.mul_add(self.e, 2.0 * z.mul_add(self.f, self.g)),
                z.mul_add(z.mul_add(self.h, 2.0 * self.i), self.j),
            ),
        )
    }

    /// Minimizer of the quadric, `None` when the system is singular.
    fn optimal_point(&self) -> Option<Point3<f64>> {
        let det = self.a.mul_add(
            self.f.mul_add(-self.f, self.e * self.h),
            self.b.mul_add(
                self.c.mul_add(self.f, -self.b * self.h),
                self.c * self.e.mul_add(-self.c, self.b * self.f),
            ),
        );
        if det.abs() < 1e-10 {
            return None;
        }
        let inv_det = 1.0 / det;

        let m00 = self.f.mul_add(-self.f, self.e * self.h) * inv_det;
        let m01 = self.c.mul_add(self.f, -self.b * self.h) * inv_det;
        let m02 = self.c.mul_add(-self.e, self.b * self.f) * inv_det;
        let m11 = self.c.mul_add(-self.c, self.a * self.h) * inv_det;
        let m12 = self.b.mul_add(self.c, -self.a * self.f) * inv_det;
        let m22 = self.b.mul_add(-self.b, self.a * self.e) * inv_det;

        Some(Point3::new(
            m00.mul_add(-self.d, m01.mul_add(-self.g, m02 * -self.i)),
            m01.mul_add(-self.d, m11.mul_add(-self.g, m12 * -self.i)),
            m02.mul_add(-self.d, m12.mul_add(-self.g, m22 * -self.i)),
        ))
    }
}

/// Heap entry. Stale when either endpoint's version has moved on.
#[derive(Debug, Clone)]
struct Candidate {
    cost: f64,
    v1: u32,
    v2: u32,
    stamp: (u32, u32),
    position: Point3<f64>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost, then on the edge for a stable order
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| (other.v1, other.v2).cmp(&(self.v1, self.v2)))
    }
}

struct Decimator {
    positions: Vec<Point3<f64>>,
    alive: Vec<bool>,
    version: Vec<u32>,
    locked: Vec<bool>,
    quadrics: Vec<Quadric>,
    faces: Vec<Option<[u32; 3]>>,
    vertex_faces: Vec<Vec<usize>>,
    active_faces: usize,
}

impl Decimator {
    fn new(mesh: &IndexedMesh, preserve_boundary: bool) -> Self {
        let n = mesh.vertices.len();
        let positions: Vec<Point3<f64>> = mesh.positions().copied().collect();

        let mut quadrics = vec![Quadric::default(); n];
        let mut vertex_faces = vec![Vec::new(); n];
        for (face_idx, face) in mesh.faces.iter().enumerate() {
            for &v in face {
                vertex_faces[v as usize].push(face_idx);
            }
            if let Some(normal) = face_normal(&positions, *face) {
                let p0 = positions[face[0] as usize];
                let d = -normal.dot(&p0.coords);
                let q = Quadric::from_plane(normal.x, normal.y, normal.z, d);
                for &v in face {
                    quadrics[v as usize].add(&q);
                }
            }
        }

        let mut locked = vec![false; n];
        if preserve_boundary {
            let adjacency = MeshAdjacency::build(&mesh.faces);
            for (a, b) in adjacency.boundary_edges() {
                locked[a as usize] = true;
                locked[b as usize] = true;
            }
        }

        Self {
            positions,
            alive: vec![true; n],
            version: vec![0; n],
            locked,
            quadrics,
            faces: mesh.faces.iter().copied().map(Some).collect(),
            vertex_faces,
            active_faces: mesh.faces.len(),
        }
    }

    fn live_faces(&self, v: u32) -> impl Iterator<Item = (usize, [u32; 3])> + '_ {
        self.vertex_faces[v as usize]
            .iter()
            .filter_map(move |&f| self.faces[f].filter(|face| face.contains(&v)).map(|face| (f, face)))
    }

    fn neighbors(&self, v: u32) -> HashSet<u32> {
        self.live_faces(v)
            .flat_map(|(_, face)| face)
            .filter(|&u| u != v)
            .collect()
    }

    fn candidate(&self, v1: u32, v2: u32) -> Option<Candidate> {
        let (l1, l2) = (self.locked[v1 as usize], self.locked[v2 as usize]);
        let mut combined = self.quadrics[v1 as usize];
        combined.add(&self.quadrics[v2 as usize]);

        let (p1, p2) = (self.positions[v1 as usize], self.positions[v2 as usize]);
        let position = match (l1, l2) {
            (true, true) => return None,
            (true, false) => p1,
            (false, true) => p2,
            (false, false) => combined
                .optimal_point()
                .unwrap_or_else(|| Point3::from((p1.coords + p2.coords) / 2.0)),
        };

        Some(Candidate {
            cost: combined.evaluate(&position).max(0.0),
            v1,
            v2,
            stamp: (self.version[v1 as usize], self.version[v2 as usize]),
            position,
        })
    }

    fn is_stale(&self, c: &Candidate) -> bool {
        !self.alive[c.v1 as usize]
            || !self.alive[c.v2 as usize]
            || c.stamp != (self.version[c.v1 as usize], self.version[c.v2 as usize])
    }

    /// Link condition plus fold-over check.
    fn is_collapse_valid(&self, v1: u32, v2: u32, target: &Point3<f64>) -> bool {
        let n1 = self.neighbors(v1);
        let n2 = self.neighbors(v2);
        if !n1.contains(&v2) {
            return false;
        }

        let edge_faces = self
            .live_faces(v1)
            .filter(|(_, face)| face.contains(&v2))
            .count();
        let shared = n1.intersection(&n2).count();
        if shared != edge_faces {
            return false;
        }
        // Collapsing a tetrahedron-sized shell would flatten it
        if n1.union(&n2).count() <= 4 {
            return false;
        }

        for v in [v1, v2] {
            for (_, face) in self.live_faces(v) {
                if face.contains(&v1) && face.contains(&v2) {
                    continue;
                }
                let Some(before) = face_normal(&self.positions, face) else {
                    continue;
                };
                let moved = face.map(|u| if u == v { target } else { &self.positions[u as usize] });
                let after = (moved[1] - moved[0]).cross(&(moved[2] - moved[0]));
                if after.dot(&before) <= 0.0 {
                    return false;
                }
            }
        }
        true
    }

    /// Merge `v2` into `v1` at `target`.
    fn collapse(&mut self, v1: u32, v2: u32, target: Point3<f64>) {
        let moved: Vec<usize> = self.vertex_faces[v2 as usize].clone();
        for f in moved {
            let Some(mut face) = self.faces[f] else {
                continue;
            };
            if !face.contains(&v2) {
                continue;
            }
            if face.contains(&v1) {
                self.faces[f] = None;
                self.active_faces -= 1;
                continue;
            }
            for idx in &mut face {
                if *idx == v2 {
                    *idx = v1;
                }
            }
            self.faces[f] = Some(face);
            self.vertex_faces[v1 as usize].push(f);
        }

        self.positions[v1 as usize] = target;
        let q2 = self.quadrics[v2 as usize];
        self.quadrics[v1 as usize].add(&q2);
        self.locked[v1 as usize] |= self.locked[v2 as usize];
        self.alive[v2 as usize] = false;
        self.vertex_faces[v2 as usize].clear();
        self.version[v1 as usize] += 1;
        self.vertex_faces[v1 as usize].retain(|&f| self.faces[f].is_some());
    }
}

fn face_normal(positions: &[Point3<f64>], face: [u32; 3]) -> Option<Vector3<f64>> {
    let [p0, p1, p2] = face.map(|v| positions[v as usize]);
    let n = (p1 - p0).cross(&(p2 - p0));
    let len = n.norm();
    (len > 1e-12).then(|| n / len)
}

/// Decimate a mesh in place by quadric-error edge collapse.
///
/// Removes up to `params.target_reduction` of the faces. Closed manifold
/// input stays closed and manifold.
///
/// # Errors
///
/// Returns [`RepairError::InvalidParameter`] if the reduction is outside
/// `[0, 1)`, or [`RepairError::InvalidIndex`] for bad faces.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::{decimate_mesh, DecimateParams};
///
/// // Finely tessellated flat square
/// let mut mesh = IndexedMesh::new();
/// for j in 0..11u32 {
///     for i in 0..11u32 {
///         mesh.vertices.push(Vertex::from_coords(f64::from(i), f64::from(j), 0.0));
///     }
/// }
/// for j in 0..10u32 {
///     for i in 0..10u32 {
///         let a = j * 11 + i;
///         mesh.faces.push([a, a + 1, a + 12]);
///         mesh.faces.push([a, a + 12, a + 11]);
///     }
/// }
///
/// let result = decimate_mesh(&mut mesh, &DecimateParams::reduce_by(0.5)).unwrap();
/// assert!(result.final_triangles <= 100);
/// assert!((mesh.surface_area() - 100.0).abs() < 1e-9);
/// ```
pub fn decimate_mesh(
    mesh: &mut IndexedMesh,
    params: &DecimateParams,
) -> RepairResult<DecimationResult> {
    if !(0.0..1.0).contains(&params.target_reduction) {
        return Err(RepairError::InvalidParameter {
            name: "target_reduction",
            value: params.target_reduction,
            reason: "must be in [0, 1)",
        });
    }
    RepairError::check_indices(mesh)?;

    let original_triangles = mesh.faces.len();
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    // Truncation: the product is non-negative and no larger than the face count.
    let target = (original_triangles as f64 * (1.0 - params.target_reduction)).ceil() as usize;

    if original_triangles <= target {
        return Ok(DecimationResult {
            original_triangles,
            final_triangles: original_triangles,
            ..DecimationResult::default()
        });
    }

    info!(
        original = original_triangles,
        target, "starting quadric decimation"
    );

    let mut state = Decimator::new(mesh, params.preserve_boundary);

    let mut heap = BinaryHeap::new();
    let mut seen: HashSet<(u32, u32)> = HashSet::new();
    for face in &mesh.faces {
        for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
            if seen.insert(undirected(a, b)) {
                if let Some(c) = state.candidate(a, b) {
                    heap.push(c);
                }
            }
        }
    }

    let mut collapses_performed = 0;
    let mut collapses_rejected = 0;

    while state.active_faces > target {
        let Some(c) = heap.pop() else {
            break;
        };
        if state.is_stale(&c) {
            continue;
        }
        if params.max_error.is_some_and(|max| c.cost > max) {
            collapses_rejected += 1;
            continue;
        }
        if !state.is_collapse_valid(c.v1, c.v2, &c.position) {
            collapses_rejected += 1;
            continue;
        }

        state.collapse(c.v1, c.v2, c.position);
        collapses_performed += 1;

        let mut around: Vec<u32> = state.neighbors(c.v1).into_iter().collect();
        around.sort_unstable();
        for u in around {
            if let Some(next) = state.candidate(c.v1, u) {
                heap.push(next);
            }
        }
    }

    for (vertex, p) in mesh.vertices.iter_mut().zip(&state.positions) {
        vertex.position = *p;
    }
    mesh.faces = state.faces.into_iter().flatten().collect();
    remove_unreferenced_vertices(mesh);
    mesh.clear_normals();

    let result = DecimationResult {
        original_triangles,
        final_triangles: mesh.faces.len(),
        collapses_performed,
        collapses_rejected,
    };
    debug!(
        vertices = mesh.vertices.len(),
        faces = result.final_triangles,
        collapses = result.collapses_performed,
        rejected = result.collapses_rejected,
        "decimation complete"
    );
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::validate::validate_mesh;
    use mesh_types::{unit_cube, MeshTopology, Vertex};

    /// Closed UV sphere.
    fn sphere(radius: f64, rings: u32, segments: u32) -> IndexedMesh {
        use std::f64::consts::PI;
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, radius));
        for r in 1..rings {
            let phi = PI * f64::from(r) / f64::from(rings);
            for s in 0..segments {
                let theta = 2.0 * PI * f64::from(s) / f64::from(segments);
                mesh.vertices.push(Vertex::from_coords(
                    radius * phi.sin() * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                    radius * phi.cos(),
                ));
            }
        }
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, -radius));
        let south = (rings - 1) * segments + 1;
        let ring = |r: u32, s: u32| 1 + (r - 1) * segments + (s % segments);

        for s in 0..segments {
            mesh.faces.push([0, ring(1, s), ring(1, s + 1)]);
            mesh.faces
                .push([south, ring(rings - 1, s + 1), ring(rings - 1, s)]);
        }
        for r in 1..rings - 1 {
            for s in 0..segments {
                let (a, b) = (ring(r, s), ring(r, s + 1));
                let (c, d) = (ring(r + 1, s), ring(r + 1, s + 1));
                mesh.faces.push([a, c, d]);
                mesh.faces.push([a, d, b]);
            }
        }
        mesh
    }

    #[test]
    fn quadric_of_plane() {
        let q = Quadric::from_plane(0.0, 0.0, 1.0, 0.0);
        assert!((q.evaluate(&Point3::new(3.0, 4.0, 0.0))).abs() < 1e-12);
        assert!((q.evaluate(&Point3::new(0.0, 0.0, 2.0)) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn quadric_corner_is_optimal() {
        let mut q = Quadric::from_plane(1.0, 0.0, 0.0, -1.0);
        q.add(&Quadric::from_plane(0.0, 1.0, 0.0, -2.0));
        q.add(&Quadric::from_plane(0.0, 0.0, 1.0, -3.0));
        let p = q.optimal_point().unwrap();
        assert!((p - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-9);
    }

    #[test]
    fn sphere_stays_closed() {
        let mut mesh = sphere(10.0, 16, 24);
        let original = mesh.face_count();
        let volume = mesh.volume();

        let result = decimate_mesh(&mut mesh, &DecimateParams::reduce_by(0.5)).unwrap();

        assert!(result.final_triangles <= original / 2 + 1);
        assert!(result.collapses_performed > 0);
        let report = validate_mesh(&mesh);
        assert!(report.is_watertight, "{report}");
        assert!(report.is_manifold, "{report}");
        assert!((mesh.volume() - volume).abs() / volume < 0.1);
        assert!(!mesh.is_inside_out());
    }

    #[test]
    fn zero_reduction_is_noop() {
        let mut mesh = sphere(5.0, 8, 8);
        let before = mesh.clone();
        let result = decimate_mesh(&mut mesh, &DecimateParams::reduce_by(0.0)).unwrap();
        assert_eq!(result.collapses_performed, 0);
        assert_eq!(mesh, before);
    }

    #[test]
    fn cube_cannot_collapse_below_tetrahedron() {
        let mut mesh = unit_cube();
        let result = decimate_mesh(&mut mesh, &DecimateParams::reduce_by(0.9)).unwrap();
        assert!(result.final_triangles >= 4);
        assert!(validate_mesh(&mesh).is_watertight);
    }

    #[test]
    fn rejects_full_reduction() {
        let mut mesh = unit_cube();
        assert!(decimate_mesh(&mut mesh, &DecimateParams::reduce_by(1.0)).is_err());
    }

    #[test]
    fn max_error_blocks_collapses() {
        let mut mesh = sphere(10.0, 12, 12);
        let original = mesh.face_count();
        let params = DecimateParams::reduce_by(0.5).with_max_error(0.0);
        let result = decimate_mesh(&mut mesh, &params).unwrap();
        assert_eq!(result.final_triangles, original);
        assert!(result.collapses_rejected > 0);
    }

    #[test]
    fn display_reports_counts() {
        let result = DecimationResult {
            original_triangles: 1000,
            final_triangles: 500,
            collapses_performed: 250,
            collapses_rejected: 10,
        };
        assert!((result.reduction_percent() - 50.0).abs() < 1e-9);
        assert!(result.to_string().contains("1000 → 500"));
    }
}
