//! Carving the positioned head out of the helmet.
//!
//! The compositor runs two booleans: the optional chin piece minus the head,
//! and the helmet minus a closed "shell" cut from the head. Everything after
//! the booleans is best effort: smoothing and hole filling failures are
//! logged and the unsmoothed result is kept.

use std::fmt;

use mesh_boolean::{difference_with_config, BooleanConfig};
use mesh_repair::{
    clean_mesh, clip_box, decimate_mesh, fill_holes, keep_largest_component, keep_largest_solid,
    smooth_windowed_sinc, validate_mesh, CleanParams, ClipSide, DecimateParams, SmoothParams,
};
use mesh_transform::Axis;
use mesh_types::{Aabb, IndexedMesh, MeshBounds};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::FinalArtifact;
use crate::error::{CompositorError, CompositorResult};
use crate::pose::Pose;
use crate::stage::StageOutcome;
use crate::template::HelmetTemplate;

/// Head preparation applied once before fitting.
///
/// # Example
///
/// ```
/// use helmet_fit::PrepareParams;
///
/// let params = PrepareParams::default().with_decimate_above(20_000);
/// assert_eq!(params.decimate_above, 20_000);
/// assert_eq!(params.fill_hole_size, 1000.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareParams {
    /// Weld tolerance for cleaning.
    ///
    /// Default: `0.01`
    pub weld_tolerance: f64,

    /// Largest hole radius filled on the raw head.
    ///
    /// Default: `1000.0`
    pub fill_hole_size: f64,

    /// Decimate when the head has more faces than this.
    ///
    /// Default: `8000`
    pub decimate_above: usize,

    /// Fraction of faces removed when decimating.
    ///
    /// Default: `0.5`
    pub decimate_reduction: f64,

    /// Largest hole radius filled after decimation.
    ///
    /// Default: `500.0`
    pub refill_hole_size: f64,
}

impl Default for PrepareParams {
    fn default() -> Self {
        Self {
            weld_tolerance: 0.01,
            fill_hole_size: 1000.0,
            decimate_above: 8000,
            decimate_reduction: 0.5,
            refill_hole_size: 500.0,
        }
    }
}

impl PrepareParams {
    /// Never decimate.
    #[must_use]
    pub fn without_decimation() -> Self {
        Self {
            decimate_above: usize::MAX,
            ..Self::default()
        }
    }

    /// Set the face count above which the head is decimated.
    #[must_use]
    pub fn with_decimate_above(mut self, faces: usize) -> Self {
        self.decimate_above = faces;
        self
    }

    /// Set the decimation reduction.
    #[must_use]
    pub fn with_decimate_reduction(mut self, fraction: f64) -> Self {
        self.decimate_reduction = fraction;
        self
    }

    /// Set the weld tolerance.
    #[must_use]
    pub fn with_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.weld_tolerance = tolerance;
        self
    }

    fn clean(&self) -> CleanParams {
        CleanParams::default().with_tolerance(self.weld_tolerance)
    }
}

/// What [`prepare_head`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareSummary {
    /// Faces before preparation.
    pub initial_faces: usize,
    /// Faces after preparation.
    pub final_faces: usize,
    /// Holes closed across both filling passes.
    pub holes_filled: usize,
    /// Components dropped across both passes.
    pub components_removed: usize,
    /// Whether decimation ran.
    pub decimated: bool,
}

impl fmt::Display for PrepareSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Head: {} -> {} faces, {} holes filled, {} components removed{}",
            self.initial_faces,
            self.final_faces,
            self.holes_filled,
            self.components_removed,
            if self.decimated { ", decimated" } else { "" }
        )
    }
}

/// Clean, close and simplify a head mesh before it is positioned.
///
/// # Errors
///
/// Returns [`CompositorError::Repair`] if the mesh has invalid indices or a
/// parameter is out of range.
pub fn prepare_head(mesh: &mut IndexedMesh, params: &PrepareParams) -> CompositorResult<PrepareSummary> {
    let mut summary = PrepareSummary {
        initial_faces: mesh.faces.len(),
        ..PrepareSummary::default()
    };
    let clean = params.clean();

    clean_mesh(mesh, &clean);
    summary.holes_filled += fill_holes(mesh, params.fill_hole_size)?;
    summary.components_removed += keep_largest_component(mesh);

    if mesh.faces.len() > params.decimate_above {
        let result = decimate_mesh(mesh, &DecimateParams::reduce_by(params.decimate_reduction))?;
        debug!(
            from = result.original_triangles,
            to = result.final_triangles,
            "decimated head"
        );
        clean_mesh(mesh, &clean);
        summary.holes_filled += fill_holes(mesh, params.refill_hole_size)?;
        summary.components_removed += keep_largest_component(mesh);
        clean_mesh(mesh, &clean);
        summary.decimated = true;
    }

    summary.final_faces = mesh.faces.len();
    info!(%summary, "prepared head");
    Ok(summary)
}

/// Which face of a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxFace {
    /// The face at the minimum coordinate.
    #[default]
    Min,
    /// The face at the maximum coordinate.
    Max,
}

/// Compositor settings.
///
/// # Example
///
/// ```
/// use helmet_fit::CompositorConfig;
///
/// let config = CompositorConfig::default().with_clip_margin(2.0);
/// assert_eq!(config.clip_margin, 2.0);
/// assert_eq!(config.post_fill_hole_size, 20.0);
/// assert_eq!(config.smoothing.iterations, 70);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Margin added to every side of the helmet bounds before clipping the
    /// head. Keeps the cap off the helmet's own faces.
    ///
    /// Default: `1.0`
    pub clip_margin: f64,

    /// Axis of the helmet's open face.
    ///
    /// Default: `Axis::Z`
    pub clip_axis: Axis,

    /// Which end of `clip_axis` is open.
    ///
    /// Default: `BoxFace::Min`
    pub clip_face: BoxFace,

    /// Distance the open face of the clip box is pushed out, so the neck
    /// below the helmet rim is kept.
    ///
    /// Default: `1000.0`
    pub clip_extent: f64,

    /// Largest loop radius capped after clipping.
    ///
    /// Default: `1000.0`
    pub cap_hole_size: f64,

    /// Weld tolerance when extracting the boolean result.
    ///
    /// Default: `0.01`
    pub weld_tolerance: f64,

    /// Smoothing applied to the carved helmet.
    ///
    /// Default: [`SmoothParams::for_post_boolean`]
    pub smoothing: SmoothParams,

    /// Largest hole radius filled after smoothing.
    ///
    /// Default: `20.0`
    pub post_fill_hole_size: f64,

    /// Boolean tolerances.
    ///
    /// Default: [`BooleanConfig::for_scans`]
    pub boolean: BooleanConfig,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            clip_margin: 1.0,
            clip_axis: Axis::Z,
            clip_face: BoxFace::Min,
            clip_extent: 1000.0,
            cap_hole_size: 1000.0,
            weld_tolerance: 0.01,
            smoothing: SmoothParams::for_post_boolean(),
            post_fill_hole_size: 20.0,
            boolean: BooleanConfig::for_scans(),
        }
    }
}

impl CompositorConfig {
    /// Set the clip margin.
    #[must_use]
    pub fn with_clip_margin(mut self, margin: f64) -> Self {
        self.clip_margin = margin;
        self
    }

    /// Set the open face of the clip box.
    #[must_use]
    pub fn with_open_face(mut self, axis: Axis, face: BoxFace) -> Self {
        self.clip_axis = axis;
        self.clip_face = face;
        self
    }

    /// Set the post-boolean smoothing.
    #[must_use]
    pub fn with_smoothing(mut self, smoothing: SmoothParams) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Set the boolean configuration.
    #[must_use]
    pub fn with_boolean(mut self, boolean: BooleanConfig) -> Self {
        self.boolean = boolean;
        self
    }

    /// Box the head is clipped to for a helmet with bounds `helmet`.
    pub fn clip_bounds(&self, helmet: &Aabb) -> Aabb {
        let mut bounds = helmet.expanded(self.clip_margin);
        let axis = self.clip_axis.index();
        match self.clip_face {
            BoxFace::Min => bounds.min[axis] -= self.clip_extent,
            BoxFace::Max => bounds.max[axis] += self.clip_extent,
        }
        bounds
    }
}

fn warn_if_unsound(mesh: &IndexedMesh, what: &'static str) {
    let report = validate_mesh(mesh);
    if !report.is_watertight || !report.is_manifold {
        warn!(
            mesh = what,
            watertight = report.is_watertight,
            manifold = report.is_manifold,
            "boolean input is not a closed manifold; result may be unreliable"
        );
    }
}

/// `stage` names the boolean and the target; `tool_name` names what is cut
/// away.
fn subtract(
    stage: &'static str,
    target: &IndexedMesh,
    tool_name: &'static str,
    tool: &IndexedMesh,
    config: &BooleanConfig,
) -> CompositorResult<IndexedMesh> {
    warn_if_unsound(target, stage);
    warn_if_unsound(tool, tool_name);
    let result = difference_with_config(target, tool, config)
        .map_err(|source| CompositorError::Boolean { stage, source })?;
    debug!(stage, stats = ?result.stats, "boolean difference");
    if result.mesh.faces.is_empty() {
        return Err(CompositorError::DegenerateResult { stage });
    }
    Ok(result.mesh)
}

/// Smoothing that keeps less than this share of the carved volume is
/// rejected.
const MIN_SMOOTHED_VOLUME_RATIO: f64 = 0.5;

/// Smooth the carved helmet, passing it through unchanged if the filter
/// fails or collapses it.
fn smooth_carved(helmet: IndexedMesh, params: &SmoothParams) -> StageOutcome {
    let before = helmet.volume();
    StageOutcome::run("post-boolean smoothing", helmet, |m| {
        smooth_windowed_sinc(m, params).map_err(|e| e.to_string())?;
        let after = m.volume();
        if !after.is_finite() || after < before * MIN_SMOOTHED_VOLUME_RATIO {
            return Err(format!("smoothing collapsed the helmet from {before:.1} to {after:.1} mm³"));
        }
        Ok(())
    })
}

/// Close the head where it leaves the helmet so it can act as a solid tool.
fn head_shell(helmet: &IndexedMesh, head: &IndexedMesh, config: &CompositorConfig) -> IndexedMesh {
    let bounds = config.clip_bounds(&helmet.bounds());
    let clipped = clip_box(head, &bounds, ClipSide::Inside);
    if clipped.faces.len() == head.faces.len() {
        return clipped;
    }
    let cap = config.cap_hole_size;
    StageOutcome::run("cap clipped head", clipped, |m| fill_holes(m, cap)).into_mesh()
}

/// Carve the positioned head out of the template.
///
/// Steps, in order:
/// 1. Chin piece minus head, largest component kept (when enabled)
/// 2. Head clipped to the helmet bounds and capped
/// 3. Helmet minus the capped head
/// 4. Weld, drop degenerates, keep the largest solid
/// 5. Windowed-sinc smoothing and small-hole filling; smoothing that
///    collapses the helmet is discarded
///
/// The chin piece stays where the template put it. Only the head carries
/// the pose, and the shell is cut from the head itself rather than from
/// the head minus the chin piece.
///
/// # Errors
///
/// Returns [`CompositorError::Boolean`] if either boolean rejects its
/// inputs and [`CompositorError::DegenerateResult`] if either produces
/// nothing.
pub fn compose(
    template: &HelmetTemplate,
    head: &IndexedMesh,
    pose: Pose,
    chin_enabled: bool,
    config: &CompositorConfig,
) -> CompositorResult<FinalArtifact> {
    let chin = match (&template.chin, chin_enabled) {
        (Some(chin_piece), true) => {
            let mut carved = subtract("chin", chin_piece, "head", head, &config.boolean)?;
            let dropped = keep_largest_component(&mut carved);
            debug!(dropped, faces = carved.faces.len(), "carved chin piece");
            Some(carved)
        }
        _ => None,
    };

    let shell = head_shell(&template.helmet, head, config);
    let mut helmet = subtract("shell", &template.helmet, "clipped head", &shell, &config.boolean)?;

    let clean = clean_mesh(
        &mut helmet,
        &CleanParams::default().with_tolerance(config.weld_tolerance),
    );
    let dropped = keep_largest_solid(&mut helmet);
    if helmet.faces.is_empty() {
        return Err(CompositorError::DegenerateResult { stage: "shell" });
    }
    debug!(welded = clean.vertices_welded, dropped, "extracted carved helmet");

    let helmet = smooth_carved(helmet, &config.smoothing).into_mesh();
    let fill = config.post_fill_hole_size;
    let helmet = StageOutcome::run("post-boolean hole filling", helmet, |m| fill_holes(m, fill)).into_mesh();

    let artifact = FinalArtifact { helmet, chin, pose };
    info!(%artifact, "composed helmet");
    Ok(artifact)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::template::TemplateKind;
    use approx::assert_relative_eq;
    use mesh_types::{cuboid, unit_cube, Point3};

    #[test]
    fn clip_bounds_opens_one_face() {
        let helmet = Aabb::new(Point3::new(-10.0, -10.0, -10.0), Point3::new(10.0, 10.0, 10.0));
        let config = CompositorConfig::default();
        let bounds = config.clip_bounds(&helmet);
        assert_eq!(bounds.min, Point3::new(-11.0, -11.0, -1011.0));
        assert_eq!(bounds.max, Point3::new(11.0, 11.0, 11.0));

        let sideways = config.with_open_face(Axis::Y, BoxFace::Max).clip_bounds(&helmet);
        assert_eq!(sideways.max.y, 1011.0);
        assert_eq!(sideways.min.z, -11.0);
    }

    #[test]
    fn prepare_closes_and_keeps_largest() {
        let mut head = cuboid(Point3::origin(), Point3::new(10.0, 10.0, 10.0));
        head.faces.pop();
        head.merge(&cuboid(Point3::new(50.0, 0.0, 0.0), Point3::new(51.0, 1.0, 1.0)));

        let summary = prepare_head(&mut head, &PrepareParams::default()).unwrap();
        assert_eq!(summary.holes_filled, 1);
        assert_eq!(summary.components_removed, 1);
        assert!(!summary.decimated);
        assert!(validate_mesh(&head).is_watertight);
        assert_relative_eq!(head.volume(), 1000.0, max_relative = 1e-9);
    }

    #[test]
    fn prepare_decimates_dense_heads() {
        let mut head = unit_cube();
        let summary = prepare_head(&mut head, &PrepareParams::default().with_decimate_above(4)).unwrap();
        assert!(summary.decimated);
        assert!(summary.final_faces <= summary.initial_faces);
    }

    #[test]
    fn head_outside_neck_is_capped() {
        let helmet = cuboid(Point3::new(-20.0, -20.0, 0.0), Point3::new(20.0, 20.0, 30.0));
        let head = cuboid(Point3::new(-10.0, -10.0, -40.0), Point3::new(10.0, 25.0, 20.0));
        let shell = head_shell(&helmet, &head, &CompositorConfig::default());

        let bounds = shell.bounds();
        assert_relative_eq!(bounds.max.y, 21.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.min.z, -40.0, epsilon = 1e-9);
        assert!(validate_mesh(&shell).is_watertight);
    }

    #[test]
    fn disjoint_chin_survives_and_head_is_carved() {
        let helmet = cuboid(Point3::new(-20.0, -20.0, -20.0), Point3::new(20.0, 20.0, 20.0));
        let chin = cuboid(Point3::new(-5.0, -5.0, -5.0), Point3::new(5.0, 5.0, 5.0));
        let mut template = HelmetTemplate::from_meshes(TemplateKind::Flat, helmet, Some(chin));
        template.chin = template.chin.map(|mut c| {
            c.center_at_origin();
            c.translate(mesh_types::Vector3::new(0.0, 0.0, -30.0));
            c
        });
        let head = cuboid(Point3::new(-5.0, -5.0, -5.0), Point3::new(5.0, 5.0, 5.0));
        let config = CompositorConfig::default();

        let artifact = compose(&template, &head, Pose::default(), true, &config).unwrap();
        assert!(artifact.has_chin());
        assert_relative_eq!(artifact.chin.unwrap().volume(), 1000.0, max_relative = 1e-6);
        assert_relative_eq!(artifact.helmet.volume(), 64_000.0 - 1000.0, max_relative = 1e-6);
    }

    #[test]
    fn collapsing_smoothing_is_discarded() {
        let helmet = cuboid(Point3::new(-20.0, -20.0, -20.0), Point3::new(20.0, 20.0, 20.0));
        let template = HelmetTemplate::from_meshes(TemplateKind::Flat, helmet, None);
        let head = cuboid(Point3::new(-5.0, -5.0, -5.0), Point3::new(5.0, 5.0, 5.0));
        let unconstrained = SmoothParams::for_post_boolean().with_feature_edge_smoothing(false);
        let config = CompositorConfig::default().with_smoothing(unconstrained.clone());

        let mut carved = template.helmet.clone();
        carved.merge(&{
            let mut cavity = head.clone();
            cavity.flip_normals();
            cavity
        });
        let outcome = smooth_carved(carved, &unconstrained);
        assert!(outcome.diagnostic().unwrap().contains("collapsed"));

        let artifact = compose(&template, &head, Pose::default(), false, &config).unwrap();
        assert_relative_eq!(artifact.helmet.volume(), 64_000.0 - 1000.0, max_relative = 1e-6);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unsound_tool_is_named_in_warning() {
        let helmet = cuboid(Point3::new(-20.0, -20.0, -20.0), Point3::new(20.0, 20.0, 20.0));
        let mut open_shell = cuboid(Point3::new(-5.0, -5.0, -5.0), Point3::new(5.0, 5.0, 5.0));
        open_shell.faces.pop();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let _ = subtract("shell", &helmet, "clipped head", &open_shell, &BooleanConfig::for_scans());
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("mesh=\"clipped head\""), "{logs}");
        assert!(!logs.contains("mesh=\"head\""), "{logs}");
    }

    #[test]
    fn chin_disabled_produces_no_chin() {
        let helmet = cuboid(Point3::new(-20.0, -20.0, -20.0), Point3::new(20.0, 20.0, 20.0));
        let template = HelmetTemplate::from_meshes(TemplateKind::Flat, helmet, Some(unit_cube()));
        let head = cuboid(Point3::new(-5.0, -5.0, -5.0), Point3::new(5.0, 5.0, 5.0));
        let artifact = compose(&template, &head, Pose::default(), false, &CompositorConfig::default()).unwrap();
        assert!(!artifact.has_chin());
    }

    #[test]
    fn head_swallowing_chin_is_degenerate() {
        let helmet = cuboid(Point3::new(-20.0, -20.0, -20.0), Point3::new(20.0, 20.0, 20.0));
        let template = HelmetTemplate::from_meshes(TemplateKind::Flat, helmet, Some(unit_cube()));
        let head = cuboid(Point3::new(-30.0, -30.0, -30.0), Point3::new(30.0, 30.0, 30.0));
        let err = compose(&template, &head, Pose::default(), true, &CompositorConfig::default()).unwrap_err();
        assert!(matches!(err, CompositorError::DegenerateResult { stage: "chin" }));
    }
}
