//! Reorientation of index axes to the LPS patient frame.

use mesh_types::{Matrix3, Vector3};
use tracing::debug;

use crate::grid::VoxelGrid;

const PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// Permute and flip the index axes so they run along +L, +P and +S.
///
/// The axis assignment maximizes the alignment between each index axis and
/// its world axis; an oblique scan keeps its residual tilt in the direction
/// matrix. Every voxel keeps its world position.
#[must_use]
pub fn reorient_to_lps(grid: &VoxelGrid) -> VoxelGrid {
    let direction = grid.direction();

    // world_of[a]: world axis assigned to old index axis a
    let world_of = PERMUTATIONS
        .iter()
        .copied()
        .max_by(|p, q| {
            let score = |perm: &[usize; 3]| -> f64 {
                (0..3).map(|a| direction[(perm[a], a)].abs()).sum()
            };
            score(p).total_cmp(&score(q))
        })
        .unwrap_or([0, 1, 2]);
    let flip: [bool; 3] = std::array::from_fn(|a| direction[(world_of[a], a)] < 0.0);

    if world_of == [0, 1, 2] && !flip.iter().any(|&f| f) {
        return grid.clone();
    }

    let old_dims = grid.dims();
    let old_spacing = grid.spacing();
    let mut old_of = [0usize; 3];
    for (a, &w) in world_of.iter().enumerate() {
        old_of[w] = a;
    }

    let dims: [usize; 3] = std::array::from_fn(|w| old_dims[old_of[w]]);
    let spacing = Vector3::from_fn(|w, _| old_spacing[old_of[w]]);
    let columns: Vec<Vector3<f64>> = (0..3)
        .map(|w| {
            let a = old_of[w];
            let column = direction.column(a).into_owned();
            if flip[a] { -column } else { column }
        })
        .collect();
    let new_direction = Matrix3::from_columns(&columns);

    let old_index = |n: [usize; 3]| -> [usize; 3] {
        std::array::from_fn(|a| {
            let v = n[world_of[a]];
            if flip[a] { old_dims[a] - 1 - v } else { v }
        })
    };

    let mut data = Vec::with_capacity(grid.len());
    for k in 0..dims[2] {
        for j in 0..dims[1] {
            for i in 0..dims[0] {
                let [oi, oj, ok] = old_index([i, j, k]);
                data.push(grid.data()[grid.index(oi, oj, ok)]);
            }
        }
    }

    let origin = if grid.is_empty() {
        grid.origin()
    } else {
        #[allow(clippy::cast_precision_loss)]
        // Precision: grid indices are far below 2^52
        let start = old_index([0, 0, 0]).map(|v| v as f64);
        grid.world_position(start[0], start[1], start[2])
    };

    debug!(?world_of, ?flip, ?dims, "Reoriented grid to LPS");
    VoxelGrid::with_layout(dims, data, spacing, origin, new_direction)
}
