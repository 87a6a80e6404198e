//! Dense voxel grid with physical geometry.

use mesh_types::{Matrix3, Point3, Vector3};

use crate::error::{VolumeError, VolumeResult};

/// A dense 3D grid of `f32` intensities.
///
/// Values are stored with x varying fastest, then y, then z. The physical
/// position of voxel `(i, j, k)` is `origin + direction * (ijk ⊙ spacing)`,
/// where the columns of `direction` are the world directions of the three
/// index axes. Operations return new grids; a loaded grid is never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    dims: [usize; 3],
    spacing: Vector3<f64>,
    origin: Point3<f64>,
    direction: Matrix3<f64>,
    data: Vec<f32>,
}

impl VoxelGrid {
    /// Create a grid from values in x-fastest order, with unit spacing, the
    /// origin at zero and identity direction.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::DimensionMismatch`] if `data` does not hold
    /// exactly `dims[0] * dims[1] * dims[2]` values.
    pub fn new(dims: [usize; 3], data: Vec<f32>) -> VolumeResult<Self> {
        let expected = dims.iter().product();
        if data.len() != expected {
            return Err(VolumeError::DimensionMismatch {
                dims,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            dims,
            spacing: Vector3::new(1.0, 1.0, 1.0),
            origin: Point3::origin(),
            direction: Matrix3::identity(),
            data,
        })
    }

    /// Create a grid by evaluating `f(i, j, k)` at every voxel.
    pub fn from_fn(dims: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(dims.iter().product());
        for k in 0..dims[2] {
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    data.push(f(i, j, k));
                }
            }
        }
        Self {
            dims,
            spacing: Vector3::new(1.0, 1.0, 1.0),
            origin: Point3::origin(),
            direction: Matrix3::identity(),
            data,
        }
    }

    /// Set the voxel spacing in millimeters.
    #[must_use]
    pub fn with_spacing(mut self, spacing: Vector3<f64>) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set the world position of voxel `(0, 0, 0)`.
    #[must_use]
    pub fn with_origin(mut self, origin: Point3<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Set the direction matrix (columns are index axis directions).
    #[must_use]
    pub fn with_direction(mut self, direction: Matrix3<f64>) -> Self {
        self.direction = direction;
        self
    }

    /// Grid dimensions `[nx, ny, nz]`.
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Voxel spacing in millimeters.
    #[must_use]
    pub fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    /// World position of voxel `(0, 0, 0)`.
    #[must_use]
    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Direction matrix.
    #[must_use]
    pub fn direction(&self) -> Matrix3<f64> {
        self.direction
    }

    /// Raw values in x-fastest order.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of voxels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the grid has no voxels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Linear index of voxel `(i, j, k)`.
    #[inline]
    #[must_use]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    /// Value at voxel `(i, j, k)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f32> {
        (i < self.dims[0] && j < self.dims[1] && k < self.dims[2])
            .then(|| self.data[self.index(i, j, k)])
    }

    /// World position of a (possibly fractional) index.
    #[must_use]
    pub fn world_position(&self, i: f64, j: f64, k: f64) -> Point3<f64> {
        let scaled = Vector3::new(i, j, k).component_mul(&self.spacing);
        self.origin + self.direction * scaled
    }

    /// Smallest and largest value, ignoring NaN. `None` if there are none.
    #[must_use]
    pub fn intensity_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Keep every `stride`-th voxel along each axis, starting at 0.
    ///
    /// Spacing grows by `stride`; the origin is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidParameter`] if `stride` is 0.
    pub fn downsample(&self, stride: usize) -> VolumeResult<Self> {
        if stride == 0 {
            return Err(VolumeError::InvalidParameter {
                name: "stride",
                reason: "must be at least 1".to_string(),
            });
        }
        let dims = self.dims.map(|d| d.div_ceil(stride));
        let grid = Self::from_fn(dims, |i, j, k| {
            self.data[self.index(i * stride, j * stride, k * stride)]
        });
        #[allow(clippy::cast_precision_loss)]
        // Precision: strides are tiny integers
        let factor = stride as f64;
        Ok(grid
            .with_spacing(self.spacing * factor)
            .with_origin(self.origin)
            .with_direction(self.direction))
    }

    /// Surround the grid with `voxels` layers of `value` on every side.
    ///
    /// The origin moves so existing voxels keep their world positions.
    #[must_use]
    pub fn pad(&self, voxels: usize, value: f32) -> Self {
        let dims = self.dims.map(|d| d + 2 * voxels);
        let grid = Self::from_fn(dims, |i, j, k| {
            let inside = [i, j, k]
                .iter()
                .zip(&self.dims)
                .all(|(&x, &d)| x >= voxels && x < d + voxels);
            if inside {
                self.data[self.index(i - voxels, j - voxels, k - voxels)]
            } else {
                value
            }
        });
        #[allow(clippy::cast_precision_loss)]
        // Precision: padding widths are small integers
        let shift = -(voxels as f64);
        Self {
            origin: self.world_position(shift, shift, shift),
            spacing: self.spacing,
            direction: self.direction,
            ..grid
        }
    }

    /// Apply `f` to every value.
    #[must_use]
    pub fn map_values(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            dims: self.dims,
            spacing: self.spacing,
            origin: self.origin,
            direction: self.direction,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Replace the values and dimensions, keeping geometry. Used by
    /// reorientation, which permutes axes.
    pub(crate) fn with_layout(
        dims: [usize; 3],
        data: Vec<f32>,
        spacing: Vector3<f64>,
        origin: Point3<f64>,
        direction: Matrix3<f64>,
    ) -> Self {
        Self {
            dims,
            spacing,
            origin,
            direction,
            data,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[allow(clippy::cast_precision_loss)]
    fn ramp() -> VoxelGrid {
        VoxelGrid::from_fn([4, 3, 2], |i, j, k| (i + 10 * j + 100 * k) as f32)
    }

    #[test]
    fn new_checks_length() {
        assert!(VoxelGrid::new([2, 2, 2], vec![0.0; 8]).is_ok());
        let err = VoxelGrid::new([2, 2, 2], vec![0.0; 7]).unwrap_err();
        assert!(matches!(err, VolumeError::DimensionMismatch { expected: 8, got: 7, .. }));
    }

    #[test]
    fn x_varies_fastest() {
        let g = ramp();
        assert_eq!(g.index(1, 0, 0), 1);
        assert_eq!(g.index(0, 1, 0), 4);
        assert_eq!(g.index(0, 0, 1), 12);
        assert_eq!(g.get(3, 2, 1), Some(123.0));
        assert_eq!(g.get(4, 0, 0), None);
    }

    #[test]
    fn world_position_uses_geometry() {
        let g = ramp()
            .with_spacing(Vector3::new(0.5, 2.0, 3.0))
            .with_origin(Point3::new(10.0, 20.0, 30.0))
            .with_direction(Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, 1.0)));
        let p = g.world_position(2.0, 1.0, 1.0);
        assert_relative_eq!(p, Point3::new(9.0, 22.0, 33.0));
    }

    #[test]
    fn intensity_range_skips_nan() {
        let g = VoxelGrid::new([3, 1, 1], vec![f32::NAN, -2.0, 5.0]).unwrap();
        assert_eq!(g.intensity_range(), Some((-2.0, 5.0)));
        let all_nan = VoxelGrid::new([1, 1, 1], vec![f32::NAN]).unwrap();
        assert_eq!(all_nan.intensity_range(), None);
    }

    #[test]
    fn downsample_takes_every_other_voxel() {
        let g = ramp().with_spacing(Vector3::new(1.0, 1.0, 2.0));
        let d = g.downsample(2).unwrap();
        assert_eq!(d.dims(), [2, 2, 1]);
        assert_eq!(d.get(1, 1, 0), Some(22.0));
        assert_relative_eq!(d.spacing(), Vector3::new(2.0, 2.0, 4.0));
        assert!(g.downsample(0).is_err());
    }

    #[test]
    fn pad_keeps_world_positions() {
        let g = ramp().with_origin(Point3::new(5.0, 5.0, 5.0));
        let p = g.pad(2, -1.0);
        assert_eq!(p.dims(), [8, 7, 6]);
        assert_eq!(p.get(0, 0, 0), Some(-1.0));
        assert_eq!(p.get(3, 2, 2), Some(1.0));
        assert_relative_eq!(p.world_position(3.0, 2.0, 2.0), g.world_position(1.0, 0.0, 0.0));
    }

    #[test]
    fn map_values_keeps_geometry() {
        let g = ramp().with_spacing(Vector3::new(2.0, 2.0, 2.0));
        let m = g.map_values(|v| v * 2.0);
        assert_eq!(m.get(1, 0, 0), Some(2.0));
        assert_eq!(m.spacing(), g.spacing());
    }
}
