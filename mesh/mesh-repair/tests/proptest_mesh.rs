//! Property-based tests for mesh repair operations.
//!
//! Run with: cargo test -p mesh-repair --test proptest_mesh

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mesh_repair::{
    clean_mesh, find_components, remove_small_components, smooth_laplacian, validate_mesh,
    weld_vertices, CleanParams,
};
use mesh_types::{cuboid, IndexedMesh, MeshTopology, Point3, Vector3, Vertex};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// Positions on a coarse lattice with a little jitter, so welding has work.
fn arb_vertex() -> impl Strategy<Value = Vertex> {
    (
        prop::array::uniform3(-5i32..5),
        prop::array::uniform3(-0.004..0.004f64),
    )
        .prop_map(|(cell, jitter)| {
            Vertex::from_coords(
                f64::from(cell[0]) + jitter[0],
                f64::from(cell[1]) + jitter[1],
                f64::from(cell[2]) + jitter[2],
            )
        })
}

/// Random triangle soup with valid indices.
fn arb_mesh(max_vertices: usize, max_faces: usize) -> impl Strategy<Value = IndexedMesh> {
    prop::collection::vec(arb_vertex(), 3..=max_vertices).prop_flat_map(move |verts| {
        #[allow(clippy::cast_possible_truncation)]
        let n = verts.len() as u32;
        prop::collection::vec(prop::array::uniform3(0..n), 1..=max_faces).prop_map(move |faces| {
            IndexedMesh {
                vertices: verts.clone(),
                faces,
            }
        })
    })
}

/// A handful of disjoint boxes of random size.
fn arb_boxes() -> impl Strategy<Value = IndexedMesh> {
    prop::collection::vec(0.5..5.0f64, 1..6).prop_map(|sizes| {
        let mut mesh = IndexedMesh::new();
        for (i, s) in sizes.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let x = i as f64 * 10.0;
            mesh.merge(&cuboid(Point3::new(x, 0.0, 0.0), Point3::new(x + s, *s, *s)));
        }
        mesh
    })
}

// =============================================================================
// Cleaning
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn clean_is_idempotent(mesh in arb_mesh(40, 60), largest in any::<bool>()) {
        let params = CleanParams::default().with_largest_component_only(largest);
        let mut mesh = mesh;
        let _ = clean_mesh(&mut mesh, &params);
        let snapshot = mesh.clone();

        let second = clean_mesh(&mut mesh, &params);
        prop_assert!(!second.had_changes(), "second pass changed: {}", second);
        prop_assert_eq!(mesh, snapshot);
    }

    #[test]
    fn clean_leaves_valid_indices(mesh in arb_mesh(40, 60)) {
        let mut mesh = mesh;
        let _ = clean_mesh(&mut mesh, &CleanParams::default());
        let report = validate_mesh(&mesh);
        prop_assert_eq!(report.invalid_index_count, 0);
        prop_assert_eq!(report.degenerate_face_count, 0);
        prop_assert_eq!(report.duplicate_face_count, 0);
    }

    #[test]
    fn weld_never_increases_counts(mesh in arb_mesh(40, 60), eps in 0.0..0.02f64) {
        let mut welded = mesh.clone();
        weld_vertices(&mut welded, eps);
        prop_assert!(welded.face_count() <= mesh.face_count());
        prop_assert_eq!(welded.vertex_count(), mesh.vertex_count());
    }
}

// =============================================================================
// Components
// =============================================================================

proptest! {
    #[test]
    fn ratio_zero_is_noop(mesh in arb_boxes()) {
        let mut out = mesh.clone();
        prop_assert_eq!(remove_small_components(&mut out, 0.0), 0);
        prop_assert_eq!(out, mesh);
    }

    #[test]
    fn ratio_one_keeps_single_component(mesh in arb_boxes()) {
        let before = find_components(&mesh).component_count();
        let mut out = mesh;
        let removed = remove_small_components(&mut out, 1.0);
        prop_assert_eq!(removed, before - 1);
        prop_assert_eq!(find_components(&out).component_count(), 1);
        prop_assert_eq!(out.face_count(), 12);
    }

    #[test]
    fn components_partition_faces(mesh in arb_mesh(30, 40)) {
        let analysis = find_components(&mesh);
        let total: usize = analysis.components.iter().map(|c| c.faces.len()).sum();
        prop_assert_eq!(total, mesh.face_count());
    }
}

// =============================================================================
// Smoothing
// =============================================================================

proptest! {
    #[test]
    fn laplacian_commutes_with_translation(
        offset in prop::array::uniform3(-50.0..50.0f64),
        relaxation in 0.0..1.0f64,
    ) {
        let offset = Vector3::from(offset);
        let mut a = cuboid(Point3::origin(), Point3::new(3.0, 2.0, 1.0));
        let mut b = a.clone();
        b.translate(offset);

        smooth_laplacian(&mut a, 10, relaxation).unwrap();
        smooth_laplacian(&mut b, 10, relaxation).unwrap();

        for (va, vb) in a.vertices.iter().zip(&b.vertices) {
            prop_assert!((va.position + offset - vb.position).norm() < 1e-9);
        }
    }
}

#[test]
fn closed_box_report() {
    let report = validate_mesh(&cuboid(Point3::origin(), Point3::new(1.0, 2.0, 3.0)));
    assert!(report.is_solid());
    assert_eq!(report.component_count, 1);
}
