//! Accumulated head pose and initial alignment.
//!
//! The pose is stored as integer step counts so it depends only on how many
//! times each control moved, never on the order of the moves or on float
//! round-off accumulated across steps.

use mesh_repair::smooth_laplacian;
use mesh_transform::{Axis, Transform3D};
use mesh_types::{IndexedMesh, MeshBounds, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::StepSizes;
use crate::stage::StageOutcome;

/// Laplacian iterations driven by the smoothing slider.
pub const POSE_SMOOTHING_ITERATIONS: usize = 20;

/// Net step counts per control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepCounts {
    /// Rotation steps about X, Y and Z.
    pub rotation: [i32; 3],
    /// Translation steps along X, Y and Z.
    pub translation: [i32; 3],
    /// Scale steps.
    pub scale: i32,
}

/// Head pose relative to the frozen base mesh.
///
/// Real-valued components are derived from [`StepCounts`] and
/// [`StepSizes`] as `count * step`; scale is `1 + count * step`.
///
/// # Example
///
/// ```
/// use helmet_fit::{Direction, Pose, PoseAction, StepSizes};
///
/// let steps = StepSizes::default();
/// let grow = PoseAction::Scale { direction: Direction::Increase };
/// let pose = (0..50).fold(Pose::default(), |p, _| grow.apply(&p, &steps));
/// assert_eq!(pose.scale(), 1.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    counts: StepCounts,
    smoothing_percent: u8,
    rotation_deg: [f64; 3],
    translation: Vector3<f64>,
    scale: f64,
}

impl Default for Pose {
    fn default() -> Self {
        Self::from_counts(StepCounts::default(), 0, &StepSizes::default())
    }
}

impl Pose {
    /// Derive a pose from step counts and a smoothing slider value.
    #[must_use]
    pub fn from_counts(counts: StepCounts, smoothing_percent: u8, steps: &StepSizes) -> Self {
        let rotation_deg = counts.rotation.map(|c| f64::from(c) * steps.rotation_deg);
        let [tx, ty, tz] = counts.translation.map(|c| f64::from(c) * steps.translation);
        Self {
            counts,
            smoothing_percent: smoothing_percent.min(100),
            rotation_deg,
            translation: Vector3::new(tx, ty, tz),
            scale: 1.0 + f64::from(counts.scale) * steps.scale,
        }
    }

    /// Step counts this pose was derived from.
    pub fn counts(&self) -> &StepCounts {
        &self.counts
    }

    /// Rotation about X, Y and Z in degrees.
    pub fn rotation_deg(&self) -> [f64; 3] {
        self.rotation_deg
    }

    /// Translation in millimeters.
    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    /// Uniform scale factor; 1 is the base size.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Smoothing slider value, 0 to 100.
    pub fn smoothing_percent(&self) -> u8 {
        self.smoothing_percent
    }

    /// Smoothing as a fraction, 0 to 1.
    pub fn smoothing(&self) -> f64 {
        f64::from(self.smoothing_percent) / 100.0
    }

    /// True when the pose leaves the base mesh unchanged.
    pub fn is_identity(&self) -> bool {
        self.counts == StepCounts::default() && self.smoothing_percent == 0
    }

    /// Rigid and scale part of the pose for a base mesh with the given
    /// scaling pivot: scale about `pivot`, translate, then rotate about X,
    /// Y and Z through the origin.
    pub fn transform(&self, pivot: &mesh_types::Point3<f64>) -> Transform3D {
        let [rx, ry, rz] = self.rotation_deg;
        Transform3D::uniform_scale_about(pivot, self.scale)
            .then(&Transform3D::translation(self.translation))
            .then(&Transform3D::rotation(Axis::X, rx))
            .then(&Transform3D::rotation(Axis::Y, ry))
            .then(&Transform3D::rotation(Axis::Z, rz))
    }

    /// Replay the pose onto `base`.
    ///
    /// Steps, in order:
    /// 1. Copy the base mesh
    /// 2. Laplacian smoothing when the slider is above zero
    /// 3. Uniform scale about the base centroid
    /// 4. Translation
    /// 5. Rotation about X, then Y, then Z
    ///
    /// The result depends only on `base` and the pose.
    #[must_use]
    pub fn apply(&self, base: &IndexedMesh) -> IndexedMesh {
        let pivot = base.centroid();
        let mut mesh = base.clone();

        if self.smoothing_percent > 0 {
            let relaxation = self.smoothing();
            mesh = StageOutcome::run("pose smoothing", mesh, |m| {
                smooth_laplacian(m, POSE_SMOOTHING_ITERATIONS, relaxation)
            })
            .into_mesh();
        }

        self.transform(&pivot).apply_in_place(&mut mesh);
        debug!(
            scale = self.scale,
            rotation = ?self.rotation_deg,
            translation = ?self.translation,
            smoothing = self.smoothing_percent,
            "applied pose"
        );
        mesh
    }
}

/// Placement of the head relative to the helmet before fitting starts.
///
/// # Example
///
/// ```
/// use helmet_fit::PrealignParams;
///
/// let params = PrealignParams::default().with_top_offset(-5.0);
/// assert_eq!(params.rotate_x_deg, 270.0);
/// assert_eq!(params.top_offset, -5.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrealignParams {
    /// Rotation about X bringing the scanner frame upright.
    ///
    /// Default: `270.0`
    pub rotate_x_deg: f64,

    /// Added to the head's minimum Y after matching the helmet's.
    ///
    /// Default: `-2.75`
    pub back_offset: f64,

    /// Added to the head's maximum Z after matching the helmet's.
    ///
    /// Default: `-3.25`
    pub top_offset: f64,
}

impl Default for PrealignParams {
    fn default() -> Self {
        Self {
            rotate_x_deg: 270.0,
            back_offset: -2.75,
            top_offset: -3.25,
        }
    }
}

impl PrealignParams {
    /// Set the X rotation in degrees.
    #[must_use]
    pub fn with_rotate_x(mut self, degrees: f64) -> Self {
        self.rotate_x_deg = degrees;
        self
    }

    /// Set the back offset.
    #[must_use]
    pub fn with_back_offset(mut self, offset: f64) -> Self {
        self.back_offset = offset;
        self
    }

    /// Set the top offset.
    #[must_use]
    pub fn with_top_offset(mut self, offset: f64) -> Self {
        self.top_offset = offset;
        self
    }
}

/// Bring a freshly segmented head into the helmet's frame.
///
/// Rotates the head about X, centers both meshes' bounding boxes at the
/// origin, then moves the head so its back and top sit at the configured
/// offsets from the helmet's. Empty meshes are left alone.
pub fn prealign_head(head: &mut IndexedMesh, helmet: &mut IndexedMesh, params: &PrealignParams) {
    Transform3D::rotation(Axis::X, params.rotate_x_deg).apply_in_place(head);
    helmet.center_at_origin();
    head.center_at_origin();

    let (Some(head_box), Some(helmet_box)) = (head.bounds_opt(), helmet.bounds_opt()) else {
        return;
    };
    let offset = Vector3::new(
        0.0,
        helmet_box.min.y - head_box.min.y + params.back_offset,
        helmet_box.max.z - head_box.max.z + params.top_offset,
    );
    head.translate(offset);
    info!(offset = ?offset, "pre-aligned head to helmet");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::action::{Direction, PoseAction};
    use approx::assert_relative_eq;
    use mesh_types::{cuboid, Point3};
    use proptest::prelude::*;

    fn block() -> IndexedMesh {
        cuboid(Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 8.0, 5.0))
    }

    fn positions(mesh: &IndexedMesh) -> Vec<[u64; 3]> {
        mesh.positions()
            .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
            .collect()
    }

    #[test]
    fn identity_pose_copies_base() {
        let base = block();
        assert!(Pose::default().is_identity());
        assert_eq!(Pose::default().apply(&base), base);
    }

    #[test]
    fn fifty_scale_steps_give_exactly_one_and_a_half() {
        let steps = StepSizes::default();
        let up = PoseAction::Scale { direction: Direction::Increase };
        let mut pose = Pose::default();
        for _ in 0..50 {
            pose = up.apply(&pose, &steps);
        }
        assert_eq!(pose.counts().scale, 50);
        assert_eq!(pose.scale(), 1.50);
    }

    #[test]
    fn scale_pivots_on_base_centroid() {
        let base = block();
        let counts = StepCounts { scale: 100, ..StepCounts::default() };
        let moved = Pose::from_counts(counts, 0, &StepSizes::default()).apply(&base);
        assert_relative_eq!(moved.centroid(), base.centroid(), epsilon = 1e-12);
        assert_relative_eq!(moved.volume(), base.volume() * 8.0, max_relative = 1e-12);
    }

    #[test]
    fn rotation_order_is_x_then_y_then_z() {
        let base = block();
        let steps = StepSizes::default().with_rotation(10.0);
        let counts = StepCounts { rotation: [1, 1, 0], ..StepCounts::default() };
        let posed = Pose::from_counts(counts, 0, &steps).apply(&base);

        let mut x_then_y = base.clone();
        Transform3D::rotation(Axis::X, 10.0).apply_in_place(&mut x_then_y);
        Transform3D::rotation(Axis::Y, 10.0).apply_in_place(&mut x_then_y);
        let mut y_then_x = base.clone();
        Transform3D::rotation(Axis::Y, 10.0).apply_in_place(&mut y_then_x);
        Transform3D::rotation(Axis::X, 10.0).apply_in_place(&mut y_then_x);

        let max_gap = |a: &IndexedMesh, b: &IndexedMesh| {
            a.positions()
                .zip(b.positions())
                .map(|(p, q)| (p - q).norm())
                .fold(0.0, f64::max)
        };
        assert!(max_gap(&posed, &x_then_y) < 1e-9);
        assert!(max_gap(&posed, &y_then_x) > 1e-3);
    }

    #[test]
    fn smoothing_shrinks_but_keeps_topology() {
        let base = block();
        let smoothed = Pose::from_counts(StepCounts::default(), 60, &StepSizes::default())
            .apply(&base);
        assert_eq!(smoothed.faces, base.faces);
        assert!(smoothed.volume() < base.volume());
    }

    #[test]
    fn prealign_places_head_under_helmet_top() {
        let mut helmet = cuboid(Point3::new(10.0, 10.0, 10.0), Point3::new(70.0, 90.0, 60.0));
        let mut head = cuboid(Point3::new(-5.0, -5.0, -5.0), Point3::new(35.0, 25.0, 55.0));
        prealign_head(&mut head, &mut helmet, &PrealignParams::default());

        let helmet_box = helmet.bounds();
        assert_relative_eq!(helmet_box.center(), Point3::origin(), epsilon = 1e-12);
        let head_box = head.bounds();
        assert_relative_eq!(head_box.center().x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(head_box.min.y, helmet_box.min.y - 2.75, epsilon = 1e-9);
        assert_relative_eq!(head_box.max.z, helmet_box.max.z - 3.25, epsilon = 1e-9);
        // 270 degrees about X turns the 60 mm tall head along Y
        assert_relative_eq!(head_box.size().y, 60.0, epsilon = 1e-9);
    }

    fn arb_action() -> impl Strategy<Value = PoseAction> {
        let direction = prop_oneof![Just(Direction::Increase), Just(Direction::Decrease)];
        let axis = prop_oneof![Just(Axis::X), Just(Axis::Y), Just(Axis::Z)];
        prop_oneof![
            (axis.clone(), direction.clone())
                .prop_map(|(axis, direction)| PoseAction::Rotate { axis, direction }),
            (axis, direction.clone())
                .prop_map(|(axis, direction)| PoseAction::Translate { axis, direction }),
            direction.prop_map(|direction| PoseAction::Scale { direction }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Any history with the same net counts yields a bitwise identical mesh.
        #[test]
        fn pose_depends_only_on_counts(actions in proptest::collection::vec(arb_action(), 0..40)) {
            let steps = StepSizes::default();
            let pose = actions.iter().fold(Pose::default(), |p, a| a.apply(&p, &steps));

            let mut shuffled = actions.clone();
            shuffled.reverse();
            let reversed = shuffled.iter().fold(Pose::default(), |p, a| a.apply(&p, &steps));
            prop_assert_eq!(pose, reversed);

            let direct = Pose::from_counts(*pose.counts(), 0, &steps);
            let base = block();
            prop_assert_eq!(positions(&pose.apply(&base)), positions(&direct.apply(&base)));
        }
    }
}
