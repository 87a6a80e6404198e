//! The fitting session: one head, one template, one pose.

use mesh_types::IndexedMesh;
use mesh_volume::{segment_skin, VoxelGrid};
use tracing::{info, warn};

use crate::action::{PoseAction, StepSizes};
use crate::artifact::FinalArtifact;
use crate::compositor::{compose, prepare_head, PrepareSummary};
use crate::config::HelmetFitConfig;
use crate::error::{HelmetFitError, HelmetFitResult, PersistenceError};
use crate::persistence::{save_artifact, SaveReport, SaveTarget};
use crate::pose::{prealign_head, Pose};
use crate::template::HelmetTemplate;
use crate::viewport::{RecordingBackend, RenderBackend, Scene, Viewport};

/// State of one fitting session.
///
/// The head is prepared and pre-aligned once, then frozen. Every action
/// replays the whole pose onto that frozen base, so the positioned head
/// never accumulates round-off from earlier steps.
///
/// # Example
///
/// ```
/// use helmet_fit::{HelmetFitConfig, HelmetTemplate, PoseAction, Session, TemplateKind};
/// use mesh_types::{cuboid, Point3};
///
/// let helmet = cuboid(Point3::new(-30.0, -30.0, -30.0), Point3::new(30.0, 30.0, 30.0));
/// let template = HelmetTemplate::from_meshes(TemplateKind::Flat, helmet, None);
/// let head = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(20.0, 20.0, 20.0));
///
/// let mut session = Session::new(HelmetFitConfig::default(), template, head).unwrap();
/// session.apply_action("tz+".parse::<PoseAction>().unwrap());
/// assert_eq!(session.pose().translation().z, 0.5);
/// assert_eq!(session.viewport().redraw_count(), 2);
/// ```
#[derive(Debug)]
pub struct Session<B: RenderBackend = RecordingBackend> {
    config: HelmetFitConfig,
    volume: Option<VoxelGrid>,
    base: IndexedMesh,
    positioned: IndexedMesh,
    template: HelmetTemplate,
    pose: Pose,
    chin_enabled: bool,
    artifact: Option<FinalArtifact>,
    prepare_summary: PrepareSummary,
    viewport: Viewport<B>,
}

/// Draw the helmet with either the positioned head and chin piece, or the
/// committed artifact in their place.
fn draw<B: RenderBackend>(
    viewport: &mut Viewport<B>,
    template: &HelmetTemplate,
    positioned: &IndexedMesh,
    chin_enabled: bool,
    artifact: Option<&FinalArtifact>,
) {
    let (head, chin) = match artifact {
        Some(artifact) => (&artifact.helmet, artifact.chin.as_ref()),
        None => (positioned, template.chin.as_ref().filter(|_| chin_enabled)),
    };
    viewport.redraw(&Scene {
        helmet: &template.helmet,
        head,
        chin,
    });
}

impl Session<RecordingBackend> {
    /// Start a session with a recording viewport.
    ///
    /// # Errors
    ///
    /// See [`Session::with_backend`].
    pub fn new(config: HelmetFitConfig, template: HelmetTemplate, head: IndexedMesh) -> HelmetFitResult<Self> {
        Self::with_backend(config, template, head, RecordingBackend::default())
    }

    /// Segment the skin from a CT volume and start a session on it.
    ///
    /// # Errors
    ///
    /// Returns [`HelmetFitError::Volume`] if segmentation fails, otherwise
    /// see [`Session::with_backend`].
    pub fn from_volume(config: HelmetFitConfig, template: HelmetTemplate, grid: VoxelGrid) -> HelmetFitResult<Self> {
        let (head, summary) = segment_skin(&grid, &config.segmentation)?;
        info!(%summary, "segmented head from volume");
        let mut session = Self::new(config, template, head)?;
        session.volume = Some(grid);
        Ok(session)
    }
}

impl<B: RenderBackend> Session<B> {
    /// Start a session drawing into `backend`.
    ///
    /// The head is prepared, pre-aligned against the template helmet and
    /// frozen as the base mesh. The template helmet is re-centered in the
    /// process. The chin toggle starts on when the template has a chin
    /// piece.
    ///
    /// # Errors
    ///
    /// Returns [`HelmetFitError::EmptyMesh`] if the head or helmet has no
    /// faces, or [`HelmetFitError::Compositor`] if preparation fails.
    pub fn with_backend(
        config: HelmetFitConfig,
        mut template: HelmetTemplate,
        mut head: IndexedMesh,
        backend: B,
    ) -> HelmetFitResult<Self> {
        if head.faces.is_empty() {
            return Err(HelmetFitError::EmptyMesh { what: "head" });
        }
        if template.helmet.faces.is_empty() {
            return Err(HelmetFitError::EmptyMesh { what: "helmet" });
        }

        let prepare_summary = prepare_head(&mut head, &config.prepare)?;
        prealign_head(&mut head, &mut template.helmet, &config.prealign);

        let pose = Pose::from_counts(Default::default(), template.smoothing_percent, &config.steps);
        let positioned = pose.apply(&head);
        let chin_enabled = template.chin.is_some();

        let mut session = Self {
            config,
            volume: None,
            base: head,
            positioned,
            template,
            pose,
            chin_enabled,
            artifact: None,
            prepare_summary,
            viewport: Viewport::new(backend),
        };
        session.redraw();
        Ok(session)
    }

    fn redraw(&mut self) {
        draw(
            &mut self.viewport,
            &self.template,
            &self.positioned,
            self.chin_enabled,
            self.artifact.as_ref(),
        );
    }

    /// Apply one action, recompute the head from the base and redraw.
    ///
    /// Any committed artifact is discarded since it no longer matches the
    /// pose.
    pub fn apply_action(&mut self, action: PoseAction) -> &IndexedMesh {
        let next = action.apply(&self.pose, &self.config.steps);
        if next != self.pose {
            self.pose = next;
            self.positioned = self.pose.apply(&self.base);
            self.artifact = None;
        }
        self.redraw();
        &self.positioned
    }

    /// Apply several actions in order.
    pub fn apply_actions(&mut self, actions: impl IntoIterator<Item = PoseAction>) -> &IndexedMesh {
        for action in actions {
            self.apply_action(action);
        }
        &self.positioned
    }

    /// Turn chin piece subtraction on or off.
    ///
    /// Enabling it on a template without a chin piece is ignored.
    pub fn set_chin_enabled(&mut self, enabled: bool) {
        if enabled && self.template.chin.is_none() {
            warn!(kind = %self.template.kind, "template has no chin piece");
            return;
        }
        if self.chin_enabled != enabled {
            self.chin_enabled = enabled;
            self.artifact = None;
        }
        self.redraw();
    }

    /// Carve the helmet around the positioned head.
    ///
    /// # Errors
    ///
    /// Returns [`HelmetFitError::Compositor`] if carving fails. The session
    /// is unchanged in that case.
    pub fn commit(&mut self) -> HelmetFitResult<&FinalArtifact> {
        let artifact = compose(
            &self.template,
            &self.positioned,
            self.pose,
            self.chin_enabled,
            &self.config.compositor,
        )?;
        let artifact = &*self.artifact.insert(artifact);
        draw(
            &mut self.viewport,
            &self.template,
            &self.positioned,
            self.chin_enabled,
            Some(artifact),
        );
        Ok(artifact)
    }

    /// Save the committed artifact.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NothingToSave`] before a commit and other
    /// [`PersistenceError`]s on I/O failure. The artifact stays in the
    /// session either way.
    pub fn save(&self, target: &SaveTarget) -> HelmetFitResult<SaveReport> {
        let artifact = self.artifact.as_ref().ok_or(PersistenceError::NothingToSave)?;
        Ok(save_artifact(artifact, target)?)
    }

    /// Head at the current pose.
    pub fn positioned_head(&self) -> &IndexedMesh {
        &self.positioned
    }

    /// Pre-aligned head every pose is applied to.
    pub fn base_head(&self) -> &IndexedMesh {
        &self.base
    }

    /// Current pose.
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Step sizes in use.
    pub fn steps(&self) -> &StepSizes {
        &self.config.steps
    }

    /// Whether the chin piece will be carved.
    pub fn chin_enabled(&self) -> bool {
        self.chin_enabled
    }

    /// Committed artifact, if any.
    pub fn artifact(&self) -> Option<&FinalArtifact> {
        self.artifact.as_ref()
    }

    /// Template in use.
    pub fn template(&self) -> &HelmetTemplate {
        &self.template
    }

    /// Volume the head was segmented from, if any.
    pub fn volume(&self) -> Option<&VoxelGrid> {
        self.volume.as_ref()
    }

    /// What preparation did to the head.
    pub fn prepare_summary(&self) -> &PrepareSummary {
        &self.prepare_summary
    }

    /// Configuration.
    pub fn config(&self) -> &HelmetFitConfig {
        &self.config
    }

    /// Viewport.
    pub fn viewport(&self) -> &Viewport<B> {
        &self.viewport
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::action::Direction;
    use crate::pose::PrealignParams;
    use crate::template::TemplateKind;
    use crate::viewport::Layer;
    use mesh_transform::Axis;
    use mesh_types::{cuboid, Point3};

    fn session(chin: bool) -> Session {
        let helmet = cuboid(Point3::new(-30.0, -30.0, -30.0), Point3::new(30.0, 30.0, 30.0));
        let chin = chin.then(|| cuboid(Point3::origin(), Point3::new(4.0, 4.0, 4.0)));
        let template = HelmetTemplate::from_meshes(TemplateKind::Flat, helmet, chin);
        let head = cuboid(Point3::origin(), Point3::new(20.0, 20.0, 20.0));
        let config = HelmetFitConfig::default()
            .with_prealign(PrealignParams::default().with_back_offset(5.0));
        Session::new(config, template, head).unwrap()
    }

    #[test]
    fn actions_replay_from_base() {
        let mut s = session(false);
        let up = PoseAction::Translate { axis: Axis::X, direction: Direction::Increase };
        let down = PoseAction::Translate { axis: Axis::X, direction: Direction::Decrease };
        s.apply_action(up);
        s.apply_action(down);
        assert_eq!(s.positioned_head(), s.base_head());
        assert_eq!(s.viewport().redraw_count(), 3);
    }

    #[test]
    fn chin_toggle_follows_template() {
        let mut s = session(false);
        assert!(!s.chin_enabled());
        s.set_chin_enabled(true);
        assert!(!s.chin_enabled());

        let mut s = session(true);
        assert!(s.chin_enabled());
        assert_eq!(s.viewport().backend().layers(), vec![Layer::Helmet, Layer::Head, Layer::Chin]);
        s.set_chin_enabled(false);
        assert_eq!(s.viewport().backend().layers(), vec![Layer::Helmet, Layer::Head]);
    }

    #[test]
    fn save_before_commit_fails() {
        let s = session(false);
        let err = s.save(&SaveTarget::new("unused", "x")).unwrap_err();
        assert!(matches!(err, HelmetFitError::Persistence(PersistenceError::NothingToSave)));
    }

    #[test]
    fn failed_commit_leaves_state() {
        let mut s = session(true);
        s.commit().unwrap();
        assert!(s.artifact().is_some());

        // A head five times larger swallows the chin piece whole
        for _ in 0..400 {
            s.apply_action(PoseAction::Scale { direction: Direction::Increase });
        }
        assert!(s.artifact().is_none());
        let grown = *s.pose();
        assert_eq!(grown.scale(), 5.0);
        let err = s.commit().unwrap_err();
        assert!(matches!(err, HelmetFitError::Compositor(_)));
        assert!(s.artifact().is_none());
        assert_eq!(*s.pose(), grown);
    }

    #[test]
    fn empty_head_is_rejected() {
        let helmet = cuboid(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let template = HelmetTemplate::from_meshes(TemplateKind::Flat, helmet, None);
        let err = Session::new(HelmetFitConfig::default(), template, IndexedMesh::new()).unwrap_err();
        assert!(matches!(err, HelmetFitError::EmptyMesh { what: "head" }));
    }
}
