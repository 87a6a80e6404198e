//! Vertex types and attributes.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Optional per-vertex data carried through the pipeline.
///
/// - `normal`: area-weighted average of adjacent face normals
/// - `scalar`: a single scalar sample, e.g. the intensity a surface
///   vertex was extracted at, or a distance measurement
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexAttributes {
    /// Unit normal vector.
    pub normal: Option<Vector3<f64>>,

    /// Scalar sample attached to this vertex.
    pub scalar: Option<f32>,
}

impl VertexAttributes {
    /// Attributes with nothing set.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            normal: None,
            scalar: None,
        }
    }

    /// Set the normal.
    #[inline]
    #[must_use]
    pub const fn with_normal(mut self, normal: Vector3<f64>) -> Self {
        self.normal = Some(normal);
        self
    }

    /// Set the scalar sample.
    #[inline]
    #[must_use]
    pub const fn with_scalar(mut self, scalar: f32) -> Self {
        self.scalar = Some(scalar);
        self
    }
}

/// A mesh vertex: a position plus optional attributes.
///
/// # Example
///
/// ```
/// use mesh_types::Vertex;
///
/// let v = Vertex::from_coords(1.0, 2.0, 3.0);
/// assert!((v.position.y - 2.0).abs() < 1e-12);
/// assert!(v.attributes.normal.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    /// Position in millimeters.
    pub position: Point3<f64>,

    /// Optional attributes.
    pub attributes: VertexAttributes,
}

impl Vertex {
    /// Create a vertex at a position with no attributes.
    #[inline]
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            attributes: VertexAttributes::new(),
        }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    #[must_use]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Create a vertex with a normal already assigned.
    #[inline]
    #[must_use]
    pub const fn with_normal(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            position,
            attributes: VertexAttributes::new().with_normal(normal),
        }
    }
}

impl From<Point3<f64>> for Vertex {
    fn from(position: Point3<f64>) -> Self {
        Self::new(position)
    }
}

impl From<[f64; 3]> for Vertex {
    fn from(coords: [f64; 3]) -> Self {
        Self::from_coords(coords[0], coords[1], coords[2])
    }
}
