//! Isosurface extraction using Surface Nets.

use fast_surface_nets::{ndshape::RuntimeShape, surface_nets, SurfaceNetsBuffer};
use mesh_types::{IndexedMesh, Vertex};
use tracing::{debug, info};

use crate::error::{VolumeError, VolumeResult};
use crate::grid::VoxelGrid;

/// Value outside the grid. Positive is outside, so the surface closes at
/// the border.
const EXTERIOR: f32 = 1000.0;

/// Exterior layers before and after the data on each axis. Surface nets
/// emits no quads for cells on the max face of its extent, so the max side
/// needs one more layer than the min side.
const PAD_MIN: usize = 1;
const PAD_MAX: usize = 2;

/// Extract the surface where the grid's intensity equals `isovalue`.
///
/// Voxels brighter than `isovalue` are inside. Vertices are placed in world
/// coordinates using the grid's origin, spacing and direction, and faces are
/// wound so the enclosed volume is positive.
///
/// # Errors
///
/// Returns [`VolumeError::EmptyIsosurface`] if `isovalue` lies outside the
/// data range or no faces are produced.
///
/// # Example
///
/// ```
/// use mesh_volume::{extract_isosurface, VoxelGrid};
///
/// let grid = VoxelGrid::from_fn([12, 12, 12], |i, j, k| {
///     let inside = (3..9).contains(&i) && (3..9).contains(&j) && (3..9).contains(&k);
///     if inside { 100.0 } else { 0.0 }
/// });
/// let mesh = extract_isosurface(&grid, 50.0).unwrap();
/// assert!(mesh.signed_volume() > 0.0);
/// ```
pub fn extract_isosurface(grid: &VoxelGrid, isovalue: f32) -> VolumeResult<IndexedMesh> {
    let empty = |min: f32, max: f32| VolumeError::EmptyIsosurface { isovalue, min, max };

    let (min, max) = grid
        .intensity_range()
        .ok_or_else(|| empty(f32::NAN, f32::NAN))?;
    if !(isovalue > min && isovalue < max) {
        return Err(empty(min, max));
    }

    info!(dims = ?grid.dims(), isovalue, "Extracting isosurface");

    let dims = grid.dims();
    let padded_dims = dims.map(|d| d + PAD_MIN + PAD_MAX);
    let mut sdf = vec![EXTERIOR; padded_dims.iter().product()];
    for k in 0..dims[2] {
        for j in 0..dims[1] {
            for i in 0..dims[0] {
                let dst = (i + PAD_MIN)
                    + padded_dims[0] * ((j + PAD_MIN) + padded_dims[1] * (k + PAD_MIN));
                let value = grid.data()[grid.index(i, j, k)];
                // NaN voxels count as outside
                sdf[dst] = if value.is_nan() { EXTERIOR } else { isovalue - value };
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    // Truncation: CT grids are far below u32::MAX voxels per axis
    let shape_dims = padded_dims.map(|d| d as u32);
    let shape = RuntimeShape::<u32, 3>::new(shape_dims);
    let mut buffer = SurfaceNetsBuffer::default();
    surface_nets(
        &sdf,
        &shape,
        [0, 0, 0],
        shape_dims.map(|d| d - 1),
        &mut buffer,
    );

    debug!(
        positions = buffer.positions.len(),
        indices = buffer.indices.len(),
        "Surface nets complete"
    );
    if buffer.indices.len() < 3 {
        return Err(empty(min, max));
    }

    let mut mesh = IndexedMesh::with_capacity(buffer.positions.len(), buffer.indices.len() / 3);
    for pos in &buffer.positions {
        #[allow(clippy::cast_precision_loss)]
        // Precision: PAD_MIN is a small constant
        let pad = PAD_MIN as f64;
        let p = grid.world_position(
            f64::from(pos[0]) - pad,
            f64::from(pos[1]) - pad,
            f64::from(pos[2]) - pad,
        );
        mesh.vertices.push(Vertex::new(p));
    }
    mesh.faces.extend(
        buffer
            .indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]]),
    );

    if mesh.signed_volume() < 0.0 {
        mesh.flip_normals();
    }

    info!(
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "Isosurface mesh created"
    );
    Ok(mesh)
}
