//! Skin segmentation preset: CT volume to a smooth closed head surface.

use std::fmt;

use mesh_repair::{
    clean_mesh, remove_small_components, smooth_windowed_sinc, CleanParams, SmoothParams,
};
use mesh_types::IndexedMesh;
use tracing::{debug, info};

use crate::error::{VolumeError, VolumeResult};
use crate::extract::extract_isosurface;
use crate::grid::VoxelGrid;

/// Output value of the double threshold inside the band.
pub const FOREGROUND: f32 = 255.0;

/// Map an intensity through a double threshold `[t0, t1, t2, t3]`.
///
/// Values in `[t1, t2]` map to [`FOREGROUND`]. Values on the ramps
/// `[t0, t1)` and `(t2, t3]` fall linearly to 0 at `t0` and `t3`. Everything
/// else, including NaN, maps to 0.
///
/// ```
/// use mesh_volume::double_threshold;
///
/// let t = [-300.0, -200.0, 400.0, 2000.0];
/// assert_eq!(double_threshold(0.0, t), 255.0);
/// assert_eq!(double_threshold(-250.0, t), 127.5);
/// assert_eq!(double_threshold(-1000.0, t), 0.0);
/// ```
#[must_use]
pub fn double_threshold(value: f32, thresholds: [f32; 4]) -> f32 {
    let [t0, t1, t2, t3] = thresholds;
    if value >= t1 && value <= t2 {
        FOREGROUND
    } else if value >= t0 && value < t1 {
        FOREGROUND * (value - t0) / (t1 - t0)
    } else if value > t2 && value <= t3 {
        FOREGROUND * (t3 - value) / (t3 - t2)
    } else {
        0.0
    }
}

/// Parameters for [`segment_skin`].
///
/// # Example
///
/// ```
/// use mesh_volume::SegmentationParams;
///
/// let params = SegmentationParams::default().with_stride(1).with_isovalue(100.0);
/// assert_eq!(params.stride, 1);
/// assert_eq!(params.padding, 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentationParams {
    /// Keep every `stride`-th voxel before thresholding.
    ///
    /// Default: `2`
    pub stride: usize,

    /// Double threshold in Hounsfield units, ascending.
    ///
    /// Default: `[-300, -200, 400, 2000]` (soft tissue band)
    pub thresholds: [f32; 4],

    /// Layers of background added around the thresholded grid so the
    /// surface closes where the scan was cut off.
    ///
    /// Default: `5`
    pub padding: usize,

    /// Isovalue on the thresholded scale.
    ///
    /// Default: `64`
    pub isovalue: f32,

    /// Keep only the largest connected component after extraction.
    ///
    /// Default: `true`
    pub keep_largest: bool,

    /// Drop components with at most this fraction of the largest
    /// component's vertices. 0 disables.
    ///
    /// Default: `0.99`
    pub small_component_ratio: f64,

    /// Windowed-sinc smoothing applied last. `iterations == 0` disables.
    ///
    /// Default: [`SmoothParams::for_segmentation`]
    pub smoothing: SmoothParams,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            stride: 2,
            thresholds: [-300.0, -200.0, 400.0, 2000.0],
            padding: 5,
            isovalue: 64.0,
            keep_largest: true,
            small_component_ratio: 0.99,
            smoothing: SmoothParams::for_segmentation(),
        }
    }
}

impl SegmentationParams {
    /// Full resolution and light smoothing, for previews and tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            stride: 1,
            smoothing: SmoothParams::default().with_iterations(20),
            ..Self::default()
        }
    }

    /// Set the downsampling stride.
    #[must_use]
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Set the double threshold.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: [f32; 4]) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the padding width in voxels.
    #[must_use]
    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// Set the isovalue.
    #[must_use]
    pub fn with_isovalue(mut self, isovalue: f32) -> Self {
        self.isovalue = isovalue;
        self
    }

    /// Enable or disable the largest-component pass.
    #[must_use]
    pub fn with_keep_largest(mut self, enabled: bool) -> Self {
        self.keep_largest = enabled;
        self
    }

    /// Set the small-component ratio.
    #[must_use]
    pub fn with_small_component_ratio(mut self, ratio: f64) -> Self {
        self.small_component_ratio = ratio;
        self
    }

    /// Set the smoothing parameters.
    #[must_use]
    pub fn with_smoothing(mut self, smoothing: SmoothParams) -> Self {
        self.smoothing = smoothing;
        self
    }

    fn validate(&self) -> VolumeResult<()> {
        let t = self.thresholds;
        if !(t[0] <= t[1] && t[1] <= t[2] && t[2] <= t[3]) {
            return Err(VolumeError::InvalidParameter {
                name: "thresholds",
                reason: format!("must be ascending, got {t:?}"),
            });
        }
        if !(self.isovalue > 0.0 && self.isovalue < FOREGROUND) {
            return Err(VolumeError::InvalidParameter {
                name: "isovalue",
                reason: format!("must be in (0, {FOREGROUND}), got {}", self.isovalue),
            });
        }
        Ok(())
    }
}

/// What [`segment_skin`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentationSummary {
    /// Dimensions of the input grid.
    pub input_dims: [usize; 3],
    /// Dimensions after downsampling and padding.
    pub grid_dims: [usize; 3],
    /// Vertices in the raw isosurface.
    pub raw_vertices: usize,
    /// Faces in the raw isosurface.
    pub raw_faces: usize,
    /// Components dropped by the largest-component and small-object passes.
    pub components_removed: usize,
    /// Smoothing iterations run.
    pub smoothing_iterations: usize,
    /// Vertices in the final surface.
    pub final_vertices: usize,
    /// Faces in the final surface.
    pub final_faces: usize,
}

impl fmt::Display for SegmentationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.input_dims;
        let [gx, gy, gz] = self.grid_dims;
        write!(
            f,
            "Segmentation: {x}x{y}x{z} -> {gx}x{gy}x{gz} grid, {} faces raw, \
             {} components removed, {} smoothing iterations, {} verts / {} faces",
            self.raw_faces,
            self.components_removed,
            self.smoothing_iterations,
            self.final_vertices,
            self.final_faces
        )
    }
}

/// Segment the skin surface from a CT volume.
///
/// Steps, in order:
/// 1. Downsample by `params.stride`
/// 2. Apply the double threshold
/// 3. Pad with the thresholded minimum
/// 4. Extract the isosurface at `params.isovalue`
/// 5. Clean, optionally keeping only the largest component
/// 6. Remove small components
/// 7. Windowed-sinc smoothing
///
/// The input grid is not modified.
///
/// # Errors
///
/// Returns [`VolumeError::InvalidParameter`] for bad parameters,
/// [`VolumeError::EmptyIsosurface`] if nothing lies inside the threshold
/// band, and [`VolumeError::Repair`] if smoothing fails.
pub fn segment_skin(
    grid: &VoxelGrid,
    params: &SegmentationParams,
) -> VolumeResult<(IndexedMesh, SegmentationSummary)> {
    params.validate()?;
    let mut summary = SegmentationSummary {
        input_dims: grid.dims(),
        ..SegmentationSummary::default()
    };

    let resampled = grid.downsample(params.stride)?;
    let thresholds = params.thresholds;
    let banded = resampled.map_values(|v| double_threshold(v, thresholds));
    let background = banded.intensity_range().map_or(0.0, |(min, _)| min);
    let padded = banded.pad(params.padding, background);
    summary.grid_dims = padded.dims();
    debug!(dims = ?summary.grid_dims, background, "Thresholded and padded");

    let mut mesh = extract_isosurface(&padded, params.isovalue)?;
    summary.raw_vertices = mesh.vertices.len();
    summary.raw_faces = mesh.faces.len();

    let clean = clean_mesh(
        &mut mesh,
        &CleanParams::default().with_largest_component_only(params.keep_largest),
    );
    summary.components_removed = clean.components_removed;
    summary.components_removed += remove_small_components(&mut mesh, params.small_component_ratio);

    summary.smoothing_iterations = smooth_windowed_sinc(&mut mesh, &params.smoothing)?.iterations;
    summary.final_vertices = mesh.vertices.len();
    summary.final_faces = mesh.faces.len();

    info!(%summary, "Skin segmented");
    Ok((mesh, summary))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use mesh_repair::{find_components, validate_mesh};

    const AIR: f32 = -1000.0;
    const TISSUE: f32 = 40.0;

    /// Air-filled grid with a tissue ball and an optional small blob.
    #[allow(clippy::cast_precision_loss)]
    fn phantom(with_blob: bool) -> VoxelGrid {
        VoxelGrid::from_fn([40, 40, 40], |i, j, k| {
            let d = |c: [f64; 3]| {
                ((i as f64 - c[0]).powi(2) + (j as f64 - c[1]).powi(2) + (k as f64 - c[2]).powi(2))
                    .sqrt()
            };
            if d([18.0, 18.0, 18.0]) < 12.0 || (with_blob && d([34.0, 34.0, 34.0]) < 3.0) {
                TISSUE
            } else {
                AIR
            }
        })
    }

    #[test]
    fn double_threshold_ramps() {
        let t = [-300.0, -200.0, 400.0, 2000.0];
        assert_eq!(double_threshold(-200.0, t), 255.0);
        assert_eq!(double_threshold(400.0, t), 255.0);
        assert_eq!(double_threshold(1200.0, t), 127.5);
        assert_eq!(double_threshold(2000.0, t), 0.0);
        assert_eq!(double_threshold(2500.0, t), 0.0);
        assert_eq!(double_threshold(-300.0, t), 0.0);
        assert_eq!(double_threshold(f32::NAN, t), 0.0);
    }

    #[test]
    fn double_threshold_with_flat_edges() {
        let t = [0.0, 0.0, 10.0, 10.0];
        assert_eq!(double_threshold(0.0, t), 255.0);
        assert_eq!(double_threshold(10.0, t), 255.0);
        assert_eq!(double_threshold(10.5, t), 0.0);
    }

    proptest::proptest! {
        #[test]
        fn double_threshold_stays_in_range(v in -5000.0f32..5000.0) {
            let out = double_threshold(v, [-300.0, -200.0, 400.0, 2000.0]);
            proptest::prop_assert!((0.0..=FOREGROUND).contains(&out));
            if (-200.0..=400.0).contains(&v) {
                proptest::prop_assert_eq!(out, FOREGROUND);
            }
        }
    }

    #[test]
    fn segments_single_closed_surface() {
        let params = SegmentationParams::default()
            .with_smoothing(SmoothParams::default().with_iterations(20));
        let (mesh, summary) = segment_skin(&phantom(true), &params).unwrap();

        assert_eq!(summary.input_dims, [40, 40, 40]);
        assert_eq!(summary.grid_dims, [30, 30, 30]);
        assert!(summary.components_removed >= 1);
        assert_eq!(find_components(&mesh).component_count(), 1);
        assert!(validate_mesh(&mesh).is_watertight);
        assert!(mesh.signed_volume() > 0.0);
        assert!(summary.to_string().starts_with("Segmentation: 40x40x40"));
    }

    #[test]
    fn keeps_blob_when_filters_disabled() {
        let params = SegmentationParams::quick()
            .with_keep_largest(false)
            .with_small_component_ratio(0.0);
        let (mesh, summary) = segment_skin(&phantom(true), &params).unwrap();
        assert_eq!(summary.components_removed, 0);
        assert_eq!(find_components(&mesh).component_count(), 2);
    }

    #[test]
    fn all_air_is_empty() {
        let grid = VoxelGrid::from_fn([10, 10, 10], |_, _, _| AIR);
        let err = segment_skin(&grid, &SegmentationParams::quick()).unwrap_err();
        assert!(matches!(err, VolumeError::EmptyIsosurface { .. }));
    }

    #[test]
    fn rejects_bad_parameters() {
        let grid = phantom(false);
        let descending = SegmentationParams::quick().with_thresholds([4.0, 3.0, 2.0, 1.0]);
        assert!(matches!(
            segment_skin(&grid, &descending),
            Err(VolumeError::InvalidParameter { name: "thresholds", .. })
        ));
        let stride = SegmentationParams::quick().with_stride(0);
        assert!(segment_skin(&grid, &stride).is_err());
    }

    #[test]
    fn input_grid_is_untouched() {
        let grid = phantom(false);
        let before = grid.clone();
        segment_skin(&grid, &SegmentationParams::quick()).unwrap();
        assert_eq!(grid, before);
    }
}
