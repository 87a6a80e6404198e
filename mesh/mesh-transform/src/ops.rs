//! In-place transforms on whole meshes.

use mesh_types::{IndexedMesh, Matrix4, Point3, Vector3};
use tracing::debug;

use crate::axis::Axis;
use crate::error::{TransformError, TransformResult};
use crate::transform::Transform3D;

/// Rotate about a cardinal axis through the origin.
///
/// # Example
///
/// ```
/// use mesh_transform::{rotate_about_axis, Axis};
/// use mesh_types::{unit_cube, MeshBounds};
///
/// let mut mesh = unit_cube();
/// rotate_about_axis(&mut mesh, Axis::Z, 180.0);
/// assert_eq!(mesh.bounds().min.x, -1.0);
/// ```
pub fn rotate_about_axis(mesh: &mut IndexedMesh, axis: Axis, degrees: f64) {
    Transform3D::rotation(axis, degrees).apply_in_place(mesh);
}

/// Rotate about a cardinal axis through the vertex centroid.
pub fn rotate_about_axis_centered(mesh: &mut IndexedMesh, axis: Axis, degrees: f64) {
    if mesh.vertices.is_empty() {
        return;
    }
    let center = mesh.centroid();
    Transform3D::rotation_about(axis, degrees, &center).apply_in_place(mesh);
}

/// Apply an arbitrary homogeneous matrix.
///
/// Mirroring matrices (negative determinant) also reverse the face winding,
/// so a closed mesh keeps a positive signed volume.
///
/// # Errors
///
/// Returns [`TransformError::NonFinite`] if the matrix contains NaN or
/// infinity, and [`TransformError::NotInvertible`] if its linear part is
/// singular.
pub fn apply_transform(mesh: &mut IndexedMesh, matrix: &Matrix4<f64>) -> TransformResult<()> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(TransformError::NonFinite { what: "matrix" });
    }
    let transform = Transform3D::from_matrix(*matrix);
    let determinant = transform.linear_determinant();
    if determinant.abs() < f64::EPSILON {
        return Err(TransformError::NotInvertible { determinant });
    }

    transform.apply_in_place(mesh);
    debug!(
        determinant,
        mirrored = determinant < 0.0,
        vertices = mesh.vertices.len(),
        "applied transform"
    );
    Ok(())
}

/// Scale uniformly about `center`.
///
/// # Errors
///
/// Returns [`TransformError::InvalidScale`] unless `factor` is finite and
/// positive.
pub fn scale_about(
    mesh: &mut IndexedMesh,
    factor: f64,
    center: &Point3<f64>,
) -> TransformResult<()> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(TransformError::InvalidScale { factor });
    }
    mesh.scale_about(*center, factor);
    Ok(())
}

/// Translate every vertex by `offset`.
pub fn translate(mesh: &mut IndexedMesh, offset: &Vector3<f64>) {
    mesh.translate(*offset);
}
