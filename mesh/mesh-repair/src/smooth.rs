//! Surface smoothing.
//!
//! [`smooth_windowed_sinc`] is a low-pass filter over the umbrella
//! Laplacian, expanded as a Chebyshev series with Hamming window weights. It
//! removes high-frequency noise without the shrinkage of repeated Laplacian
//! relaxation. [`smooth_laplacian`] is the plain relaxation filter.
//!
//! Both filters share the same vertex classification:
//! - a vertex with no constrained edges moves toward all its neighbours;
//! - a vertex on exactly two constrained edges slides along them;
//! - any other constrained vertex stays fixed.
//!
//! Constrained edges are boundary edges, non-manifold edges, and (when
//! feature smoothing is enabled) sharp edges above the feature angle.

use mesh_types::{IndexedMesh, MeshTopology, Point3, Vector3};
use tracing::debug;

use crate::adjacency::MeshAdjacency;
use crate::error::{RepairError, RepairResult};

/// Parameters for [`smooth_windowed_sinc`].
///
/// # Example
///
/// ```
/// use mesh_repair::SmoothParams;
///
/// let params = SmoothParams::for_post_boolean().with_feature_angle(30.0);
/// assert_eq!(params.iterations, 70);
/// assert!(params.feature_edge_smoothing);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SmoothParams {
    /// Chebyshev expansion order.
    ///
    /// Default: `20`
    pub iterations: usize,

    /// Pass band in `(0, 2)`. Lower values smooth more.
    ///
    /// Default: `0.1`
    pub pass_band: f64,

    /// Constrain vertices on sharp edges.
    ///
    /// Default: `false`
    pub feature_edge_smoothing: bool,

    /// Dihedral angle above which an edge is sharp, in degrees.
    ///
    /// Default: `45.0`
    pub feature_angle_deg: f64,

    /// Let boundary vertices slide along the boundary. When disabled they
    /// are fixed.
    ///
    /// Default: `true`
    pub boundary_smoothing: bool,

    /// Let vertices on non-manifold edges slide along them. When disabled
    /// they are fixed.
    ///
    /// Default: `false`
    pub non_manifold_smoothing: bool,

    /// Filter in a unit-cube frame to make the response scale independent.
    ///
    /// Default: `false`
    pub normalize_coordinates: bool,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            iterations: 20,
            pass_band: 0.1,
            feature_edge_smoothing: false,
            feature_angle_deg: 45.0,
            boundary_smoothing: true,
            non_manifold_smoothing: false,
            normalize_coordinates: false,
        }
    }
}

impl SmoothParams {
    /// Smoothing applied to the helmet after the boolean subtraction.
    ///
    /// Sharp edges are constrained, so the flat faces and corners of a CAD
    /// template stay put while the carved scan surface is smoothed.
    #[must_use]
    pub fn for_post_boolean() -> Self {
        Self {
            iterations: 70,
            pass_band: 0.04,
            feature_edge_smoothing: true,
            non_manifold_smoothing: true,
            normalize_coordinates: true,
            ..Self::default()
        }
    }

    /// Heavy smoothing for freshly segmented skin surfaces.
    #[must_use]
    pub fn for_segmentation() -> Self {
        Self {
            iterations: 500,
            ..Self::default()
        }
    }

    /// Set the expansion order.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the pass band.
    #[must_use]
    pub fn with_pass_band(mut self, pass_band: f64) -> Self {
        self.pass_band = pass_band;
        self
    }

    /// Enable or disable sharp-edge constraints.
    #[must_use]
    pub fn with_feature_edge_smoothing(mut self, enabled: bool) -> Self {
        self.feature_edge_smoothing = enabled;
        self
    }

    /// Set the sharp-edge angle in degrees.
    #[must_use]
    pub fn with_feature_angle(mut self, degrees: f64) -> Self {
        self.feature_angle_deg = degrees;
        self
    }

    /// Enable or disable boundary sliding.
    #[must_use]
    pub fn with_boundary_smoothing(mut self, enabled: bool) -> Self {
        self.boundary_smoothing = enabled;
        self
    }

    /// Enable or disable non-manifold sliding.
    #[must_use]
    pub fn with_non_manifold_smoothing(mut self, enabled: bool) -> Self {
        self.non_manifold_smoothing = enabled;
        self
    }

    /// Enable or disable unit-cube normalization.
    #[must_use]
    pub fn with_normalize_coordinates(mut self, enabled: bool) -> Self {
        self.normalize_coordinates = enabled;
        self
    }

    fn validate(&self) -> RepairResult<()> {
        if !(self.pass_band > 0.0 && self.pass_band < 2.0) {
            return Err(RepairError::InvalidParameter {
                name: "pass_band",
                value: self.pass_band,
                reason: "must be in (0, 2)",
            });
        }
        if !(0.0..=180.0).contains(&self.feature_angle_deg) {
            return Err(RepairError::InvalidParameter {
                name: "feature_angle_deg",
                value: self.feature_angle_deg,
                reason: "must be in [0, 180]",
            });
        }
        Ok(())
    }
}

/// What a smoothing pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothSummary {
    /// Iterations run.
    pub iterations: usize,
    /// Vertices held in place by the classification.
    pub fixed_vertices: usize,
    /// Largest distance any vertex moved.
    pub max_displacement: f64,
}

impl std::fmt::Display for SmoothSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Smooth: {} iterations, {} fixed vertices, max displacement {:.4}",
            self.iterations, self.fixed_vertices, self.max_displacement
        )
    }
}

/// Per-vertex smoothing neighbourhood. An empty list means fixed.
struct Stencil {
    neighbors: Vec<Vec<u32>>,
}

impl Stencil {
    fn build(mesh: &IndexedMesh, params: &SmoothParams) -> Self {
        let n = mesh.vertices.len();
        let adjacency = MeshAdjacency::build(&mesh.faces);
        let cos_feature = params.feature_angle_deg.to_radians().cos();

        let mut all: Vec<Vec<u32>> = vec![Vec::new(); n];
        let mut constrained: Vec<Vec<u32>> = vec![Vec::new(); n];
        let mut pinned = vec![false; n];

        for ((a, b), face_count) in adjacency.edges() {
            if a as usize >= n || b as usize >= n {
                continue;
            }
            all[a as usize].push(b);
            all[b as usize].push(a);

            let kind = match face_count {
                1 => Some(params.boundary_smoothing),
                2 if params.feature_edge_smoothing => {
                    let sharp = adjacency
                        .faces_for_edge(a, b)
                        .and_then(|faces| {
                            let n0 = mesh.triangle(faces[0])?.normal()?;
                            let n1 = mesh.triangle(faces[1])?.normal()?;
                            Some(n0.dot(&n1) <= cos_feature)
                        })
                        .unwrap_or(false);
                    sharp.then_some(true)
                }
                2 => None,
                _ => Some(params.non_manifold_smoothing),
            };

            match kind {
                None => {}
                Some(true) => {
                    constrained[a as usize].push(b);
                    constrained[b as usize].push(a);
                }
                Some(false) => {
                    pinned[a as usize] = true;
                    pinned[b as usize] = true;
                }
            }
        }

        let neighbors = (0..n)
            .map(|v| {
                let mut list = if pinned[v] {
                    Vec::new()
                } else {
                    match constrained[v].len() {
                        0 => std::mem::take(&mut all[v]),
                        2 => std::mem::take(&mut constrained[v]),
                        _ => Vec::new(),
                    }
                };
                // Edge iteration order is unspecified; summation order must not be.
                list.sort_unstable();
                list
            })
            .collect();

        Self { neighbors }
    }

    fn fixed_count(&self) -> usize {
        self.neighbors.iter().filter(|n| n.is_empty()).count()
    }

    /// `W·x - x` for every vertex: the umbrella Laplacian.
    fn laplacian(&self, x: &[Vector3<f64>], out: &mut [Vector3<f64>]) {
        for (v, (neighbors, delta)) in self.neighbors.iter().zip(out.iter_mut()).enumerate() {
            if neighbors.is_empty() {
                *delta = Vector3::zeros();
                continue;
            }
            let sum = neighbors
                .iter()
                .fold(Vector3::zeros(), |acc, &nb| acc + x[nb as usize]);
            #[allow(clippy::cast_precision_loss)]
            let count = neighbors.len() as f64;
            *delta = sum / count - x[v];
        }
    }
}

/// Affine frame mapping the mesh bounding box into `[-1, 1]`.
struct Normalization {
    center: Vector3<f64>,
    scale: f64,
}

impl Normalization {
    fn new(mesh: &IndexedMesh, enabled: bool) -> Self {
        let identity = Self {
            center: Vector3::zeros(),
            scale: 1.0,
        };
        if !enabled {
            return identity;
        }
        let bounds = mesh_types::Aabb::from_points(mesh.positions());
        let half = bounds.max_extent() / 2.0;
        if bounds.is_empty() || half <= f64::EPSILON {
            return identity;
        }
        Self {
            center: bounds.center().coords,
            scale: half,
        }
    }

    fn forward(&self, p: &Point3<f64>) -> Vector3<f64> {
        (p.coords - self.center) / self.scale
    }

    fn inverse(&self, v: &Vector3<f64>) -> Point3<f64> {
        Point3::from(v * self.scale + self.center)
    }
}

/// Windowed-sinc low-pass smoothing.
///
/// The response is a sinc truncated at `params.iterations` terms, weighted
/// by a Hamming window and normalized so a rigid translation passes through
/// unchanged. Topology is never modified.
///
/// # Errors
///
/// Returns [`RepairError::InvalidParameter`] for an out-of-range pass band
/// or feature angle, [`RepairError::InvalidIndex`] for bad faces, and
/// [`RepairError::SmoothingDiverged`] if a coordinate becomes non-finite.
///
/// # Example
///
/// ```
/// use mesh_types::{cuboid, Point3};
/// use mesh_repair::{smooth_windowed_sinc, SmoothParams};
///
/// // With sharp-edge constraints a box keeps every corner
/// let mut mesh = cuboid(Point3::origin(), Point3::new(3.0, 2.0, 1.0));
/// let params = SmoothParams::default().with_feature_edge_smoothing(true);
/// let summary = smooth_windowed_sinc(&mut mesh, &params).unwrap();
///
/// assert_eq!(summary.fixed_vertices, 8);
/// assert!((mesh.volume() - 6.0).abs() < 1e-9);
/// ```
pub fn smooth_windowed_sinc(
    mesh: &mut IndexedMesh,
    params: &SmoothParams,
) -> RepairResult<SmoothSummary> {
    params.validate()?;
    RepairError::check_indices(mesh)?;

    let stencil = Stencil::build(mesh, params);
    let fixed_vertices = stencil.fixed_count();
    if params.iterations == 0 || mesh.vertices.is_empty() {
        return Ok(SmoothSummary {
            iterations: 0,
            fixed_vertices,
            max_displacement: 0.0,
        });
    }

    let coefficients = windowed_sinc_coefficients(params.iterations, params.pass_band);
    let frame = Normalization::new(mesh, params.normalize_coordinates);
    let n = mesh.vertices.len();

    // Chebyshev recurrence on M = I + L/2:
    //   T0 = x, T1 = M x, T(j+1) = 2 M T(j) - T(j-1)
    let mut t_prev: Vec<Vector3<f64>> = mesh.positions().map(|p| frame.forward(p)).collect();
    let mut lap = vec![Vector3::zeros(); n];
    stencil.laplacian(&t_prev, &mut lap);
    let mut t_curr: Vec<Vector3<f64>> = t_prev
        .iter()
        .zip(&lap)
        .map(|(x, d)| x + d * 0.5)
        .collect();

    let mut result: Vec<Vector3<f64>> = t_prev
        .iter()
        .zip(&t_curr)
        .map(|(t0, t1)| t0 * coefficients[0] + t1 * coefficients[1])
        .collect();

    for &c in &coefficients[2..] {
        stencil.laplacian(&t_curr, &mut lap);
        for v in 0..n {
            let next = (t_curr[v] + lap[v] * 0.5) * 2.0 - t_prev[v];
            t_prev[v] = t_curr[v];
            t_curr[v] = next;
            result[v] += next * c;
        }
    }

    let mut max_displacement: f64 = 0.0;
    for ((vertex, filtered), neighbors) in mesh
        .vertices
        .iter_mut()
        .zip(&result)
        .zip(&stencil.neighbors)
    {
        if neighbors.is_empty() {
            continue;
        }
        let p = frame.inverse(filtered);
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(RepairError::SmoothingDiverged {
                iterations: params.iterations,
            });
        }
        max_displacement = max_displacement.max((p - vertex.position).norm());
        vertex.position = p;
    }
    mesh.clear_normals();

    let summary = SmoothSummary {
        iterations: params.iterations,
        fixed_vertices,
        max_displacement,
    };
    debug!(
        iterations = summary.iterations,
        pass_band = params.pass_band,
        fixed = summary.fixed_vertices,
        max_displacement = summary.max_displacement,
        "windowed-sinc smoothing"
    );
    Ok(summary)
}

/// Hamming-windowed sinc coefficients `c[0..=order]`, normalized to sum to 1.
fn windowed_sinc_coefficients(order: usize, pass_band: f64) -> Vec<f64> {
    use std::f64::consts::PI;

    let theta = (1.0 - pass_band / 2.0).acos();
    #[allow(clippy::cast_precision_loss)]
    let window_len = (order + 1) as f64;

    let mut coefficients: Vec<f64> = (0..=order)
        .map(|j| {
            #[allow(clippy::cast_precision_loss)]
            let jf = j as f64;
            let sinc = if j == 0 {
                theta / PI
            } else {
                2.0 * (jf * theta).sin() / (jf * PI)
            };
            let window = 0.46f64.mul_add((jf * PI / window_len).cos(), 0.54);
            sinc * window
        })
        .collect();

    let total: f64 = coefficients.iter().sum();
    if total.abs() > f64::EPSILON {
        for c in &mut coefficients {
            *c /= total;
        }
    }
    coefficients
}

/// Laplacian relaxation: each pass moves every free vertex `relaxation` of
/// the way toward the mean of its neighbours.
///
/// Uses the default [`SmoothParams`] classification, so boundaries slide
/// and non-manifold vertices stay fixed. `relaxation` is clamped to
/// `[0, 1]`.
///
/// # Errors
///
/// Returns [`RepairError::InvalidIndex`] if a face references a missing
/// vertex.
///
/// # Example
///
/// ```
/// use mesh_types::unit_cube;
/// use mesh_repair::smooth_laplacian;
///
/// let mut mesh = unit_cube();
/// let before = mesh.volume();
/// smooth_laplacian(&mut mesh, 5, 0.5).unwrap();
/// assert!(mesh.volume() < before);
/// ```
pub fn smooth_laplacian(
    mesh: &mut IndexedMesh,
    iterations: usize,
    relaxation: f64,
) -> RepairResult<SmoothSummary> {
    RepairError::check_indices(mesh)?;
    let relaxation = relaxation.clamp(0.0, 1.0);

    let stencil = Stencil::build(mesh, &SmoothParams::default());
    let fixed_vertices = stencil.fixed_count();

    let original: Vec<Point3<f64>> = mesh.positions().copied().collect();
    let mut x: Vec<Vector3<f64>> = original.iter().map(|p| p.coords).collect();
    let mut lap = vec![Vector3::zeros(); x.len()];

    if relaxation > 0.0 {
        for _ in 0..iterations {
            stencil.laplacian(&x, &mut lap);
            for (p, d) in x.iter_mut().zip(&lap) {
                *p += d * relaxation;
            }
        }
    }

    let mut max_displacement: f64 = 0.0;
    for ((vertex, p), orig) in mesh.vertices.iter_mut().zip(&x).zip(&original) {
        vertex.position = Point3::from(*p);
        max_displacement = max_displacement.max((vertex.position - orig).norm());
    }
    if max_displacement > 0.0 {
        mesh.clear_normals();
    }

    debug!(iterations, relaxation, max_displacement, "laplacian smoothing");
    Ok(SmoothSummary {
        iterations,
        fixed_vertices,
        max_displacement,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::{cuboid, unit_cube, Vertex};

    /// A flat grid with one vertex bumped up.
    fn bumpy_grid() -> (IndexedMesh, usize) {
        let mut mesh = IndexedMesh::new();
        let size = 7u32;
        for j in 0..size {
            for i in 0..size {
                let z = if i == 3 && j == 3 { 1.0 } else { 0.0 };
                mesh.vertices
                    .push(Vertex::from_coords(f64::from(i), f64::from(j), z));
            }
        }
        for j in 0..size - 1 {
            for i in 0..size - 1 {
                let a = j * size + i;
                mesh.faces.push([a, a + 1, a + size + 1]);
                mesh.faces.push([a, a + size + 1, a + size]);
            }
        }
        (mesh, 3 * 7 + 3)
    }

    #[test]
    fn coefficients_sum_to_one() {
        let c = windowed_sinc_coefficients(20, 0.1);
        assert_eq!(c.len(), 21);
        assert_relative_eq!(c.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn sinc_flattens_bump() {
        let (mut mesh, bump) = bumpy_grid();
        let summary = smooth_windowed_sinc(&mut mesh, &SmoothParams::default()).unwrap();
        assert!(mesh.vertices[bump].position.z < 0.5);
        assert!(summary.max_displacement > 0.5);
    }

    #[test]
    fn fixed_boundary_stays_put() {
        let (mut mesh, _) = bumpy_grid();
        let corner = mesh.vertices[0].position;
        let params = SmoothParams::default().with_boundary_smoothing(false);
        let summary = smooth_windowed_sinc(&mut mesh, &params).unwrap();
        assert_eq!(summary.fixed_vertices, 24);
        assert_eq!(mesh.vertices[0].position, corner);
    }

    #[test]
    fn translation_invariant() {
        let (mut a, _) = bumpy_grid();
        let (mut b, _) = bumpy_grid();
        b.translate(Vector3::new(100.0, -50.0, 7.0));
        let params = SmoothParams::default();
        smooth_windowed_sinc(&mut a, &params).unwrap();
        smooth_windowed_sinc(&mut b, &params).unwrap();
        for (va, vb) in a.vertices.iter().zip(&b.vertices) {
            assert_relative_eq!(
                va.position + Vector3::new(100.0, -50.0, 7.0),
                vb.position,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn normalization_is_scale_invariant() {
        let (mut a, _) = bumpy_grid();
        let (mut b, _) = bumpy_grid();
        b.scale_about(Point3::origin(), 10.0);
        let params = SmoothParams::for_post_boolean();
        smooth_windowed_sinc(&mut a, &params).unwrap();
        smooth_windowed_sinc(&mut b, &params).unwrap();
        for (va, vb) in a.vertices.iter().zip(&b.vertices) {
            assert_relative_eq!(va.position * 10.0, vb.position, epsilon = 1e-8);
        }
    }

    #[test]
    fn feature_edges_preserve_box() {
        let mut mesh = cuboid(Point3::new(-1.0, -2.0, -3.0), Point3::new(4.0, 5.0, 6.0));
        let before = mesh.clone();
        smooth_windowed_sinc(&mut mesh, &SmoothParams::for_post_boolean()).unwrap();
        assert_eq!(mesh, before);
    }

    #[test]
    fn unconstrained_box_collapses() {
        let mut mesh = cuboid(Point3::origin(), Point3::new(80.0, 80.0, 80.0));
        let params = SmoothParams::for_post_boolean().with_feature_edge_smoothing(false);
        smooth_windowed_sinc(&mut mesh, &params).unwrap();
        assert!(mesh.volume() < 0.5 * 80.0_f64.powi(3));
    }

    #[test]
    fn rejects_bad_pass_band() {
        let mut mesh = unit_cube();
        let err = smooth_windowed_sinc(&mut mesh, &SmoothParams::default().with_pass_band(2.5));
        assert!(matches!(
            err,
            Err(RepairError::InvalidParameter {
                name: "pass_band",
                ..
            })
        ));
    }

    #[test]
    fn zero_iterations_is_noop() {
        let (mut mesh, _) = bumpy_grid();
        let before = mesh.clone();
        smooth_windowed_sinc(&mut mesh, &SmoothParams::default().with_iterations(0)).unwrap();
        assert_eq!(mesh, before);
    }

    #[test]
    fn laplacian_zero_relaxation_is_noop() {
        let (mut mesh, _) = bumpy_grid();
        let before = mesh.clone();
        let summary = smooth_laplacian(&mut mesh, 20, 0.0).unwrap();
        assert_eq!(mesh, before);
        assert!(summary.max_displacement.abs() < f64::EPSILON);
    }

    #[test]
    fn laplacian_moves_bump_down() {
        let (mut mesh, bump) = bumpy_grid();
        smooth_laplacian(&mut mesh, 20, 0.5).unwrap();
        assert!(mesh.vertices[bump].position.z < 0.2);
    }

    #[test]
    fn laplacian_is_deterministic() {
        let (mut a, _) = bumpy_grid();
        let (mut b, _) = bumpy_grid();
        smooth_laplacian(&mut a, 20, 0.3).unwrap();
        smooth_laplacian(&mut b, 20, 0.3).unwrap();
        assert_eq!(a, b);
    }
}
