//! Boolean operations on closed solids.
//!
//! Run with: cargo test -p mesh-boolean --test boolean_solids

#![allow(clippy::unwrap_used, clippy::expect_used)]

use approx::assert_relative_eq;
use mesh_boolean::{
    boolean_operation, difference, difference_with_config, intersection, union, BooleanConfig,
    BooleanOp, CleanupLevel,
};
use mesh_repair::{find_components, validate_mesh};
use mesh_types::{cuboid, IndexedMesh, Point3, Vector3};
use proptest::prelude::*;

fn boxed(min: [f64; 3], max: [f64; 3]) -> IndexedMesh {
    cuboid(
        Point3::new(min[0], min[1], min[2]),
        Point3::new(max[0], max[1], max[2]),
    )
}

/// Octahedron with its vertices on the axes at `radius` from `center`.
fn octahedron(center: [f64; 3], radius: f64) -> IndexedMesh {
    let [cx, cy, cz] = center;
    let positions = [
        cx + radius, cy, cz,
        cx - radius, cy, cz,
        cx, cy + radius, cz,
        cx, cy - radius, cz,
        cx, cy, cz + radius,
        cx, cy, cz - radius,
    ];
    let faces = [
        0, 2, 4, 2, 1, 4, 1, 3, 4, 3, 0, 4, //
        2, 0, 5, 1, 2, 5, 3, 1, 5, 0, 3, 5,
    ];
    IndexedMesh::from_raw(&positions, &faces)
}

#[test]
fn head_inside_helmet_leaves_closed_cavity() {
    // 10 mm clearance on every side
    let helmet = boxed([0.0, 0.0, 0.0], [120.0, 140.0, 100.0]);
    let head = boxed([10.0, 10.0, 10.0], [110.0, 130.0, 90.0]);

    let result = difference(&helmet, &head).unwrap();
    assert_relative_eq!(
        result.volume(),
        helmet.volume() - head.volume(),
        max_relative = 1e-9
    );

    let report = validate_mesh(&result);
    assert!(report.is_watertight, "{report}");
    assert!(report.is_manifold, "{report}");
    // Outer shell plus inverted inner shell
    assert_eq!(find_components(&result).component_count(), 2);
}

#[test]
fn head_poking_out_of_helmet_opens_the_shell() {
    let helmet = boxed([0.0, 0.0, 0.0], [120.0, 140.0, 100.0]);
    // Extends below the helmet's lower face
    let head = boxed([10.0, 10.0, -20.0], [110.0, 130.0, 90.0]);

    let result = boolean_operation(&helmet, &head, BooleanOp::Difference, &BooleanConfig::default())
        .unwrap();
    assert!(result.stats.meshes_intersected);
    assert!(result.stats.intersecting_pairs > 0);

    let expected = helmet.volume() - 100.0 * 120.0 * 90.0;
    assert_relative_eq!(result.mesh.volume(), expected, max_relative = 1e-9);

    let report = validate_mesh(&result.mesh);
    assert!(report.is_watertight, "{report}");
    // One solid: the cavity opens through the bottom
    assert_eq!(find_components(&result.mesh).component_count(), 1);
}

#[test]
fn octahedron_through_box() {
    let slab = boxed([-2.0, -2.0, -0.5], [2.0, 2.0, 0.5]);
    let tip = octahedron([0.1, -0.2, 0.0], 1.0);

    let inter = intersection(&slab, &tip).unwrap();
    let outside = difference(&tip, &slab).unwrap();
    // The parts of the octahedron inside and outside the slab make it up
    assert_relative_eq!(
        inter.volume() + outside.volume(),
        tip.volume(),
        max_relative = 1e-9
    );
    assert!(validate_mesh(&inter).is_watertight);
    assert!(validate_mesh(&outside).is_watertight);
}

#[test]
fn difference_is_not_symmetric() {
    let a = boxed([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
    let b = boxed([1.0, 0.5, 0.5], [3.0, 1.5, 1.5]);
    let ab = difference(&a, &b).unwrap();
    let ba = difference(&b, &a).unwrap();
    assert_relative_eq!(ab.volume(), 8.0 - 1.0, max_relative = 1e-9);
    assert_relative_eq!(ba.volume(), 2.0 - 1.0, max_relative = 1e-9);
}

#[test]
fn cleanup_none_keeps_coincident_vertices() {
    let a = boxed([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
    let b = boxed([1.0, 1.0, 1.0], [3.0, 3.0, 3.0]);
    let raw = difference_with_config(
        &a,
        &b,
        &BooleanConfig::default().with_cleanup(CleanupLevel::None),
    )
    .unwrap();
    let clean = difference_with_config(&a, &b, &BooleanConfig::default()).unwrap();
    assert!(raw.mesh.vertices.len() >= clean.mesh.vertices.len());
    assert_relative_eq!(raw.mesh.volume(), clean.mesh.volume(), max_relative = 1e-9);
}

#[test]
fn translation_does_not_change_volume() {
    let a = boxed([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
    let b = boxed([1.3, 0.4, 0.6], [2.7, 1.7, 2.9]);
    let base = difference(&a, &b).unwrap();

    let offset = Vector3::new(5.0, -3.0, 2.0);
    let (mut a2, mut b2) = (a.clone(), b.clone());
    a2.translate(offset);
    b2.translate(offset);
    let moved = difference(&a2, &b2).unwrap();

    assert_relative_eq!(base.volume(), moved.volume(), max_relative = 1e-9);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// vol(A ∪ B) + vol(A ∩ B) = vol(A) + vol(B) for overlapping boxes.
    #[test]
    fn inclusion_exclusion(
        dx in 0.13..0.87f64,
        dy in 0.13..0.87f64,
        dz in 0.13..0.87f64,
    ) {
        let a = boxed([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = boxed([dx, dy, dz], [dx + 1.0, dy + 1.0, dz + 1.0]);

        let u = union(&a, &b).unwrap();
        let i = intersection(&a, &b).unwrap();
        let overlap = (1.0 - dx) * (1.0 - dy) * (1.0 - dz);

        prop_assert!((i.volume() - overlap).abs() < 1e-9);
        prop_assert!((u.volume() + i.volume() - 2.0).abs() < 1e-9);
        prop_assert!(validate_mesh(&u).is_watertight);
    }
}
