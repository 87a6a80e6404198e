//! 3D transformation matrix operations.

use mesh_types::{IndexedMesh, Point3};
use nalgebra::{Matrix3, Matrix4, Vector3};

use crate::axis::Axis;

/// Sine and cosine of an angle in degrees, exact at quarter turns.
///
/// `270.0_f64.to_radians().cos()` is `-1.8e-16`, not zero. Reorienting a
/// scan by a quarter turn should not smear every coordinate by an ulp.
#[must_use]
pub fn sin_cos_degrees(degrees: f64) -> (f64, f64) {
    let quarter = degrees / 90.0;
    if quarter.fract() == 0.0 && quarter.is_finite() {
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: rem_euclid keeps the value in 0..4
        let turn = quarter.rem_euclid(4.0) as u8;
        return match turn {
            0 => (0.0, 1.0),
            1 => (1.0, 0.0),
            2 => (0.0, -1.0),
            _ => (-1.0, 0.0),
        };
    }
    degrees.to_radians().sin_cos()
}

/// A 3D transformation represented as a 4x4 matrix.
///
/// Supports translation, rotation about a cardinal axis, uniform scaling and
/// composition.
///
/// # Example
///
/// ```
/// use mesh_transform::{Axis, Transform3D};
/// use mesh_types::{Point3, Vector3};
///
/// let t = Transform3D::rotation(Axis::Z, 90.0)
///     .then(&Transform3D::translation(Vector3::new(0.0, 0.0, 5.0)));
///
/// let p = t.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert_eq!(p, Point3::new(0.0, 1.0, 5.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    /// The 4x4 transformation matrix in column-major order.
    matrix: Matrix4<f64>,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform3D {
    /// Create a new transformation from a 4x4 matrix.
    #[must_use]
    pub const fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Create the identity transformation (no change).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Create a translation transformation.
    #[must_use]
    pub fn translation(offset: Vector3<f64>) -> Self {
        Self {
            matrix: Matrix4::new_translation(&offset),
        }
    }

    /// Uniform scale that keeps `center` fixed.
    #[must_use]
    pub fn uniform_scale_about(center: &Point3<f64>, factor: f64) -> Self {
        let to_origin = Self::translation(-center.coords);
        let scale = Self {
            matrix: Matrix4::new_scaling(factor),
        };
        let back = Self::translation(center.coords);
        to_origin.then(&scale).then(&back)
    }

    /// Right-handed rotation about a cardinal axis through the origin.
    ///
    /// # Arguments
    ///
    /// * `axis` - Axis to rotate about
    /// * `degrees` - Rotation angle in degrees
    #[must_use]
    pub fn rotation(axis: Axis, degrees: f64) -> Self {
        let (s, c) = sin_cos_degrees(degrees);
        #[rustfmt::skip]
        let linear = match axis {
            Axis::X => Matrix3::new(
                1.0, 0.0, 0.0,
                0.0,   c,  -s,
                0.0,   s,   c,
            ),
            Axis::Y => Matrix3::new(
                  c, 0.0,   s,
                0.0, 1.0, 0.0,
                 -s, 0.0,   c,
            ),
            Axis::Z => Matrix3::new(
                  c,  -s, 0.0,
                  s,   c, 0.0,
                0.0, 0.0, 1.0,
            ),
        };
        Self {
            matrix: linear.to_homogeneous(),
        }
    }

    /// Rotation about a cardinal axis through `center`.
    #[must_use]
    pub fn rotation_about(axis: Axis, degrees: f64, center: &Point3<f64>) -> Self {
        Self::translation(-center.coords)
            .then(&Self::rotation(axis, degrees))
            .then(&Self::translation(center.coords))
    }

    /// Get the underlying 4x4 matrix.
    #[must_use]
    pub const fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Compose this transformation with another (self then other).
    ///
    /// The result applies `self` first, then `other`.
    #[must_use]
    pub fn then(&self, other: &Self) -> Self {
        Self {
            matrix: other.matrix * self.matrix,
        }
    }

    /// Compute the inverse transformation.
    ///
    /// # Returns
    ///
    /// `Some(inverse)` if the matrix is invertible, `None` otherwise.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|m| Self { matrix: m })
    }

    /// Determinant of the upper-left 3x3 block.
    #[must_use]
    pub fn linear_determinant(&self) -> f64 {
        self.matrix.fixed_view::<3, 3>(0, 0).determinant()
    }

    /// Whether the transform mirrors space, turning outward normals inward.
    #[must_use]
    pub fn reverses_orientation(&self) -> bool {
        self.linear_determinant() < 0.0
    }

    /// Transform a point (applies translation).
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(point)
    }

    /// Transform a direction vector (ignores translation).
    #[must_use]
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.matrix.transform_vector(vector)
    }

    /// Transform a normal vector (uses inverse transpose).
    ///
    /// # Returns
    ///
    /// The transformed normal, or the original if the matrix is not invertible.
    #[must_use]
    pub fn transform_normal(&self, normal: &Vector3<f64>) -> Vector3<f64> {
        let m = self.matrix.fixed_view::<3, 3>(0, 0);
        m.try_inverse()
            .map_or(*normal, |inv| inv.transpose() * normal)
    }

    /// Apply this transformation to all vertices of a mesh in place.
    ///
    /// Normals are carried through the inverse transpose. A mirroring
    /// transform also reverses every face so the winding stays
    /// counter-clockwise from outside.
    pub fn apply_in_place(&self, mesh: &mut IndexedMesh) {
        for vertex in &mut mesh.vertices {
            vertex.position = self.transform_point(&vertex.position);

            if let Some(norm) = vertex.attributes.normal {
                let transformed_normal = self.transform_normal(&norm);
                vertex.attributes.normal = transformed_normal.try_normalize(f64::EPSILON);
            }
        }

        if self.reverses_orientation() {
            for face in &mut mesh.faces {
                face.swap(1, 2);
            }
        }
    }

    /// Apply this transformation to a copy of the mesh.
    #[must_use]
    pub fn apply_to_mesh(&self, mesh: &IndexedMesh) -> IndexedMesh {
        let mut result = mesh.clone();
        self.apply_in_place(&mut result);
        result
    }
}
