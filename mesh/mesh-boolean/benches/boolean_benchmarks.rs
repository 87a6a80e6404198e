//! Benchmarks for mesh-boolean operations.
//!
//! Run with: cargo bench -p mesh-boolean
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-boolean -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-boolean -- --baseline main

#![allow(missing_docs, clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mesh_boolean::{boolean_operation, difference, intersection, union, Bvh, BooleanConfig, BooleanOp};
use mesh_types::{cuboid, IndexedMesh, Point3, Vector3, Vertex};
use std::collections::HashMap;

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Head stand-in: a sphere of radius `radius` centered at `center`.
fn head(subdivisions: u32, radius: f64, center: [f64; 3]) -> IndexedMesh {
    let mut mesh = create_sphere(subdivisions);
    mesh.scale_about(Point3::origin(), radius);
    mesh.translate(Vector3::new(center[0], center[1], center[2]));
    mesh
}

/// Create an icosphere mesh with specified subdivision level.
fn create_sphere(subdivisions: u32) -> IndexedMesh {
    let mut mesh = IndexedMesh::new();

    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let a = 1.0;
    let b = 1.0 / phi;

    let ico_verts = [
        [0.0, b, -a],
        [b, a, 0.0],
        [-b, a, 0.0],
        [0.0, b, a],
        [0.0, -b, a],
        [-a, 0.0, b],
        [0.0, -b, -a],
        [a, 0.0, -b],
        [a, 0.0, b],
        [-a, 0.0, -b],
        [b, -a, 0.0],
        [-b, -a, 0.0],
    ];

    for v in &ico_verts {
        let len = v[2].mul_add(v[2], v[0].mul_add(v[0], v[1] * v[1])).sqrt();
        mesh.vertices
            .push(Vertex::from_coords(v[0] / len, v[1] / len, v[2] / len));
    }

    let ico_faces: [[u32; 3]; 20] = [
        [0, 1, 2],
        [3, 2, 1],
        [3, 4, 5],
        [3, 8, 4],
        [0, 6, 7],
        [0, 9, 6],
        [4, 10, 11],
        [6, 11, 10],
        [2, 5, 9],
        [11, 9, 5],
        [1, 7, 8],
        [10, 8, 7],
        [3, 5, 2],
        [3, 1, 8],
        [0, 2, 9],
        [0, 7, 1],
        [6, 9, 11],
        [6, 10, 7],
        [4, 11, 5],
        [4, 8, 10],
    ];

    for f in &ico_faces {
        mesh.faces.push(*f);
    }

    for _ in 0..subdivisions {
        mesh = subdivide_sphere(&mesh);
    }

    mesh
}

fn subdivide_sphere(mesh: &IndexedMesh) -> IndexedMesh {
    let mut new_mesh = IndexedMesh::new();
    new_mesh.vertices = mesh.vertices.clone();

    let mut edge_midpoints: HashMap<(u32, u32), u32> = HashMap::new();

    for face in &mesh.faces {
        let v0 = face[0];
        let v1 = face[1];
        let v2 = face[2];

        let m01 = get_midpoint(v0, v1, &mut new_mesh.vertices, &mut edge_midpoints);
        let m12 = get_midpoint(v1, v2, &mut new_mesh.vertices, &mut edge_midpoints);
        let m20 = get_midpoint(v2, v0, &mut new_mesh.vertices, &mut edge_midpoints);

        new_mesh.faces.push([v0, m01, m20]);
        new_mesh.faces.push([v1, m12, m01]);
        new_mesh.faces.push([v2, m20, m12]);
        new_mesh.faces.push([m01, m12, m20]);
    }

    new_mesh
}

fn get_midpoint(
    v1: u32,
    v2: u32,
    vertices: &mut Vec<Vertex>,
    edge_midpoints: &mut HashMap<(u32, u32), u32>,
) -> u32 {
    let key = if v1 < v2 { (v1, v2) } else { (v2, v1) };

    if let Some(&idx) = edge_midpoints.get(&key) {
        return idx;
    }

    let p1 = &vertices[v1 as usize];
    let p2 = &vertices[v2 as usize];

    let mx = (p1.position.x + p2.position.x) / 2.0;
    let my = (p1.position.y + p2.position.y) / 2.0;
    let mz = (p1.position.z + p2.position.z) / 2.0;
    let len = mz.mul_add(mz, mx.mul_add(mx, my * my)).sqrt();

    let idx = vertices.len() as u32;
    vertices.push(Vertex::from_coords(mx / len, my / len, mz / len));
    edge_midpoints.insert(key, idx);
    idx
}

// =============================================================================
// Boolean Operation Benchmarks
// =============================================================================

fn bench_cube_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("BooleanOps");
    group.sample_size(10);

    let cube_a = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
    let cube_b = cuboid(Point3::new(0.5, 0.7, 1.1), Point3::new(2.5, 2.3, 3.0));

    group.throughput(Throughput::Elements(
        (cube_a.faces.len() + cube_b.faces.len()) as u64,
    ));

    group.bench_function("union_cubes", |b| {
        b.iter(|| union(black_box(&cube_a), black_box(&cube_b)));
    });
    group.bench_function("intersection_cubes", |b| {
        b.iter(|| intersection(black_box(&cube_a), black_box(&cube_b)));
    });
    group.bench_function("difference_cubes", |b| {
        b.iter(|| difference(black_box(&cube_a), black_box(&cube_b)));
    });

    group.finish();
}

fn bench_helmet_carve(c: &mut Criterion) {
    let mut group = c.benchmark_group("HelmetCarve");
    group.sample_size(10);

    let helmet = cuboid(Point3::new(-100.0, -110.0, -60.0), Point3::new(100.0, 110.0, 90.0));
    for subdivisions in [2, 3, 4] {
        // The head pokes out of the helmet's lower face, like a real fit
        let head = head(subdivisions, 90.0, [0.0, 0.0, -10.0]);
        group.throughput(Throughput::Elements(head.faces.len() as u64));

        for parallel in [false, true] {
            let config = BooleanConfig::for_scans().with_parallel(parallel);
            let label = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(
                BenchmarkId::new(label, head.faces.len()),
                &head,
                |b, head| {
                    b.iter(|| {
                        boolean_operation(
                            black_box(&helmet),
                            black_box(head),
                            BooleanOp::Difference,
                            &config,
                        )
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_bvh(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bvh");
    for subdivisions in [3, 5] {
        let mesh = head(subdivisions, 90.0, [0.0; 3]);
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));
        group.bench_with_input(BenchmarkId::new("build", mesh.faces.len()), &mesh, |b, m| {
            b.iter(|| Bvh::build(black_box(m), 8));
        });
        group.bench_with_input(
            BenchmarkId::new("build_parallel", mesh.faces.len()),
            &mesh,
            |b, m| {
                b.iter(|| Bvh::build_parallel(black_box(m), 8));
            },
        );
    }
    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_cube_ops, bench_helmet_carve, bench_bvh);
criterion_main!(benches);
