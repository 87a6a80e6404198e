//! Core boolean operations: union, intersection, and difference.
//!
//! Both operands are cut along their intersection curve, every resulting
//! patch is classified as inside or outside the other operand, and the
//! patches selected by the operation are stitched into one mesh.

use std::fmt;

use mesh_repair::{
    remove_degenerate_triangles, remove_duplicate_faces, remove_unreferenced_vertices,
    weld_vertices,
};
use mesh_types::{IndexedMesh, MeshBounds, Vertex};
use tracing::{debug, info};

use crate::bvh::Bvh;
use crate::classify::{classify_patches, find_patches};
use crate::config::{BooleanConfig, BooleanOp, CleanupLevel};
use crate::error::{BooleanError, BooleanResult};
use crate::split::cut;

/// Statistics from a boolean operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanStats {
    /// Faces from mesh A in result.
    pub faces_from_a: usize,
    /// Faces from mesh B in result.
    pub faces_from_b: usize,
    /// Triangle pairs that produced a segment of the intersection curve.
    pub intersecting_pairs: usize,
    /// Vertices created on the intersection curve.
    pub cut_vertices: usize,
    /// Faces replaced by their retriangulation.
    pub faces_split: usize,
    /// Cut faces that could not be retriangulated and were kept whole.
    pub faces_unsplit: usize,
    /// Patches of A and B that were classified.
    pub patches: usize,
    /// Vertices merged by cleanup.
    pub vertices_welded: usize,
    /// Whether the operand bounding boxes overlapped at all.
    pub meshes_intersected: bool,
}

impl fmt::Display for BooleanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} faces from A, {} from B; {} intersecting pairs, {} cut vertices, {} faces split",
            self.faces_from_a,
            self.faces_from_b,
            self.intersecting_pairs,
            self.cut_vertices,
            self.faces_split
        )?;
        if self.faces_unsplit > 0 {
            write!(f, " ({} left whole)", self.faces_unsplit)?;
        }
        Ok(())
    }
}

/// Result of a boolean operation.
#[derive(Debug)]
pub struct BooleanOperationResult {
    /// The resulting mesh.
    pub mesh: IndexedMesh,
    /// Statistics about the operation.
    pub stats: BooleanStats,
}

fn validate(mesh: &IndexedMesh, operand: &'static str) -> BooleanResult<()> {
    if mesh.vertices.is_empty() || mesh.faces.is_empty() {
        return Err(BooleanError::EmptyMesh { operand });
    }
    if let Some(index) = mesh
        .vertices
        .iter()
        .position(|v| !v.position.coords.iter().all(|c| c.is_finite()))
    {
        return Err(BooleanError::NonFinite { operand, index });
    }
    let vertex_count = mesh.vertices.len();
    for face in &mesh.faces {
        if let Some(&index) = face.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(BooleanError::InvalidIndex {
                operand,
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}

/// Operands whose bounding boxes do not touch.
fn disjoint_result(mesh_a: &IndexedMesh, mesh_b: &IndexedMesh, operation: BooleanOp) -> IndexedMesh {
    match operation {
        BooleanOp::Union => {
            let mut mesh = mesh_a.clone();
            mesh.merge(mesh_b);
            mesh
        }
        BooleanOp::Difference => mesh_a.clone(),
        BooleanOp::Intersection => IndexedMesh::new(),
    }
}

/// Perform a boolean operation on two meshes.
///
/// Both meshes should be closed and consistently wound (CCW from outside).
/// The result is built from the parts of A and B selected by `operation`;
/// for [`BooleanOp::Difference`] the kept parts of B are inverted so they
/// face into the cavity they bound. A B nested entirely inside A is kept
/// as an inner shell, so `A - B` is hollow.
///
/// # Arguments
///
/// * `mesh_a` - First mesh (the "base" for difference operations)
/// * `mesh_b` - Second mesh (subtracted in difference operations)
/// * `operation` - The boolean operation to perform
/// * `config` - Configuration controlling tolerances and cleanup
///
/// # Errors
///
/// Returns `BooleanError` if either mesh is empty, has an out-of-range
/// face index, or has a non-finite coordinate.
///
/// # Example
///
/// ```
/// use mesh_boolean::{boolean_operation, BooleanConfig, BooleanOp};
/// use mesh_types::{cuboid, Point3};
///
/// let a = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
/// let b = cuboid(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0));
/// let result = boolean_operation(&a, &b, BooleanOp::Difference, &BooleanConfig::default()).unwrap();
/// assert!((result.mesh.volume() - 7.0).abs() < 1e-6);
/// ```
pub fn boolean_operation(
    mesh_a: &IndexedMesh,
    mesh_b: &IndexedMesh,
    operation: BooleanOp,
    config: &BooleanConfig,
) -> BooleanResult<BooleanOperationResult> {
    validate(mesh_a, "A")?;
    validate(mesh_b, "B")?;

    let bounds_a = mesh_a.bounds();
    let bounds_b = mesh_b.bounds();
    let extent = bounds_a.union(&bounds_b).max_extent();
    let scale = if extent > 0.0 { extent } else { 1.0 };
    let tolerance = config.epsilon * scale;

    if !bounds_a.expanded(tolerance).intersects(&bounds_b) {
        debug!(%operation, "operand bounds are disjoint");
        let mesh = disjoint_result(mesh_a, mesh_b, operation);
        let stats = BooleanStats {
            faces_from_a: if operation == BooleanOp::Intersection { 0 } else { mesh_a.faces.len() },
            faces_from_b: if operation == BooleanOp::Union { mesh_b.faces.len() } else { 0 },
            ..BooleanStats::default()
        };
        return Ok(BooleanOperationResult { mesh, stats });
    }

    let (bvh_a, bvh_b) = if config.use_parallel() {
        (
            Bvh::build_parallel(mesh_a, config.bvh_leaf_size),
            Bvh::build_parallel(mesh_b, config.bvh_leaf_size),
        )
    } else {
        (
            Bvh::build(mesh_a, config.bvh_leaf_size),
            Bvh::build(mesh_b, config.bvh_leaf_size),
        )
    };

    let arrangement = cut(mesh_a, mesh_b, &bvh_b, tolerance);
    let positions = &arrangement.positions;

    let patches_a = find_patches(&arrangement.a_faces, positions, &arrangement.cut_edges);
    let patches_b = find_patches(&arrangement.b_faces, positions, &arrangement.cut_edges);
    let parallel = config.use_parallel();
    let a_inside = classify_patches(&patches_a, &arrangement.a_faces, positions, mesh_b, &bvh_b, parallel);
    let b_inside = classify_patches(&patches_b, &arrangement.b_faces, positions, mesh_a, &bvh_a, parallel);

    let mut mesh = IndexedMesh::with_capacity(
        positions.len(),
        arrangement.a_faces.len() + arrangement.b_faces.len(),
    );
    mesh.vertices = positions.iter().map(|p| Vertex::new(*p)).collect();

    let mut stats = BooleanStats {
        intersecting_pairs: arrangement.stats.intersecting_pairs,
        cut_vertices: arrangement.stats.cut_vertices,
        faces_split: arrangement.stats.faces_split,
        faces_unsplit: arrangement.stats.faces_unsplit,
        patches: patches_a.representatives.len() + patches_b.representatives.len(),
        meshes_intersected: true,
        ..BooleanStats::default()
    };

    for (face, &patch) in arrangement.a_faces.iter().zip(&patches_a.face_patch) {
        if a_inside[patch] == operation.keeps_a_inside() {
            mesh.faces.push(*face);
            stats.faces_from_a += 1;
        }
    }
    for (face, &patch) in arrangement.b_faces.iter().zip(&patches_b.face_patch) {
        if b_inside[patch] == operation.keeps_b_inside() {
            let face = if operation.inverts_b() {
                [face[0], face[2], face[1]]
            } else {
                *face
            };
            mesh.faces.push(face);
            stats.faces_from_b += 1;
        }
    }

    remove_unreferenced_vertices(&mut mesh);
    match config.cleanup {
        CleanupLevel::None => {}
        CleanupLevel::Fast | CleanupLevel::Full => {
            stats.vertices_welded = weld_vertices(&mut mesh, config.vertex_weld_tolerance * scale);
            remove_degenerate_triangles(&mut mesh, 0.0);
            if config.cleanup == CleanupLevel::Full {
                remove_duplicate_faces(&mut mesh);
            }
            remove_unreferenced_vertices(&mut mesh);
        }
    }

    info!(
        %operation,
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        patches = stats.patches,
        "boolean operation complete: {stats}"
    );

    Ok(BooleanOperationResult { mesh, stats })
}

/// Convenience function for union operation.
///
/// # Errors
///
/// Returns `BooleanError` if either mesh is invalid.
pub fn union(mesh_a: &IndexedMesh, mesh_b: &IndexedMesh) -> BooleanResult<IndexedMesh> {
    let result = boolean_operation(mesh_a, mesh_b, BooleanOp::Union, &BooleanConfig::default())?;
    Ok(result.mesh)
}

/// Convenience function for union with custom config.
///
/// # Errors
///
/// Returns `BooleanError` if either mesh is invalid.
pub fn union_with_config(
    mesh_a: &IndexedMesh,
    mesh_b: &IndexedMesh,
    config: &BooleanConfig,
) -> BooleanResult<BooleanOperationResult> {
    boolean_operation(mesh_a, mesh_b, BooleanOp::Union, config)
}

/// Convenience function for difference operation.
///
/// # Errors
///
/// Returns `BooleanError` if either mesh is invalid.
pub fn difference(mesh_a: &IndexedMesh, mesh_b: &IndexedMesh) -> BooleanResult<IndexedMesh> {
    let result = boolean_operation(mesh_a, mesh_b, BooleanOp::Difference, &BooleanConfig::default())?;
    Ok(result.mesh)
}

/// Convenience function for difference with custom config.
///
/// # Errors
///
/// Returns `BooleanError` if either mesh is invalid.
pub fn difference_with_config(
    mesh_a: &IndexedMesh,
    mesh_b: &IndexedMesh,
    config: &BooleanConfig,
) -> BooleanResult<BooleanOperationResult> {
    boolean_operation(mesh_a, mesh_b, BooleanOp::Difference, config)
}

/// Convenience function for intersection operation.
///
/// # Errors
///
/// Returns `BooleanError` if either mesh is invalid.
pub fn intersection(mesh_a: &IndexedMesh, mesh_b: &IndexedMesh) -> BooleanResult<IndexedMesh> {
    let result =
        boolean_operation(mesh_a, mesh_b, BooleanOp::Intersection, &BooleanConfig::default())?;
    Ok(result.mesh)
}

/// Convenience function for intersection with custom config.
///
/// # Errors
///
/// Returns `BooleanError` if either mesh is invalid.
pub fn intersection_with_config(
    mesh_a: &IndexedMesh,
    mesh_b: &IndexedMesh,
    config: &BooleanConfig,
) -> BooleanResult<BooleanOperationResult> {
    boolean_operation(mesh_a, mesh_b, BooleanOp::Intersection, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_repair::validate_mesh;
    use mesh_types::{cuboid, Point3};

    fn cube(min: f64, max: f64) -> IndexedMesh {
        cuboid(Point3::new(min, min, min), Point3::new(max, max, max))
    }

    #[test]
    fn empty_operand_is_rejected() {
        let err = difference(&IndexedMesh::new(), &cube(0.0, 1.0)).unwrap_err();
        assert!(matches!(err, BooleanError::EmptyMesh { operand: "A" }));
        let err = union(&cube(0.0, 1.0), &IndexedMesh::new()).unwrap_err();
        assert!(matches!(err, BooleanError::EmptyMesh { operand: "B" }));
    }

    #[test]
    fn invalid_index_is_rejected() {
        let mut bad = cube(0.0, 1.0);
        bad.faces.push([0, 1, 99]);
        let err = difference(&cube(0.0, 1.0), &bad).unwrap_err();
        assert!(matches!(
            err,
            BooleanError::InvalidIndex { operand: "B", index: 99, vertex_count: 8 }
        ));
    }

    #[test]
    fn non_finite_is_rejected() {
        let mut bad = cube(0.0, 1.0);
        bad.vertices[3].position.y = f64::NAN;
        let err = intersection(&bad, &cube(0.0, 1.0)).unwrap_err();
        assert!(matches!(err, BooleanError::NonFinite { operand: "A", index: 3 }));
    }

    #[test]
    fn disjoint_operands() {
        let a = cube(0.0, 1.0);
        let b = cube(5.0, 6.0);

        let u = boolean_operation(&a, &b, BooleanOp::Union, &BooleanConfig::default()).unwrap();
        assert_eq!(u.mesh.faces.len(), 24);
        assert!(!u.stats.meshes_intersected);
        assert_eq!(u.stats.faces_from_b, 12);

        assert_eq!(difference(&a, &b).unwrap(), a);
        assert!(intersection(&a, &b).unwrap().faces.is_empty());
    }

    #[test]
    fn overlapping_cubes_difference() {
        let a = cube(0.0, 2.0);
        let b = cube(1.0, 3.0);
        let result = boolean_operation(&a, &b, BooleanOp::Difference, &BooleanConfig::default())
            .unwrap();

        assert!(result.stats.meshes_intersected);
        assert!(result.stats.intersecting_pairs > 0);
        assert_eq!(result.stats.faces_unsplit, 0);
        assert!((result.mesh.volume() - 7.0).abs() < 1e-9);

        let report = validate_mesh(&result.mesh);
        assert!(report.is_watertight, "{report}");
    }

    #[test]
    fn overlapping_cubes_union_and_intersection() {
        let a = cube(0.0, 2.0);
        let b = cube(1.0, 3.0);
        let u = union(&a, &b).unwrap();
        assert!((u.volume() - 15.0).abs() < 1e-9);
        let i = intersection(&a, &b).unwrap();
        assert!((i.volume() - 1.0).abs() < 1e-9);
        assert!(validate_mesh(&i).is_watertight);
    }

    #[test]
    fn nested_difference_leaves_cavity() {
        let outer = cube(0.0, 10.0);
        let inner = cube(2.0, 8.0);
        let result = boolean_operation(&outer, &inner, BooleanOp::Difference, &BooleanConfig::default())
            .unwrap();

        assert_eq!(result.stats.intersecting_pairs, 0);
        assert_eq!(result.stats.faces_from_a, 12);
        assert_eq!(result.stats.faces_from_b, 12);
        assert!((result.mesh.volume() - (1000.0 - 216.0)).abs() < 1e-9);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let a = cube(0.0, 2.0);
        let b = cuboid(Point3::new(0.5, 0.7, 1.1), Point3::new(2.5, 1.9, 3.0));
        let seq = difference_with_config(&a, &b, &BooleanConfig::default().with_parallel(false))
            .unwrap();
        let par = difference_with_config(&a, &b, &BooleanConfig::default().with_parallel(true))
            .unwrap();
        assert_eq!(seq.mesh, par.mesh);
        assert_eq!(seq.stats, par.stats);
    }

    #[test]
    fn stats_display() {
        let stats = BooleanStats {
            faces_from_a: 10,
            faces_from_b: 4,
            faces_unsplit: 1,
            ..BooleanStats::default()
        };
        let text = stats.to_string();
        assert!(text.starts_with("10 faces from A, 4 from B"));
        assert!(text.ends_with("(1 left whole)"));
    }
}
