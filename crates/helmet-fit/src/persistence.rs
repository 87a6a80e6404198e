//! Writing the committed helmet to disk.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use mesh_io::{save_mesh, MeshFormat};
use tracing::info;

use crate::artifact::FinalArtifact;
use crate::error::{PersistenceError, PersistenceResult};
use crate::pose::Pose;

/// Output file locations for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Carved helmet.
    pub helmet: PathBuf,
    /// Chin piece.
    pub chin: PathBuf,
}

impl ArtifactPaths {
    /// Paths for a helmet saved to `helmet`. The chin piece goes next to it
    /// as `{stem}_chinpiece.{ext}`.
    ///
    /// # Example
    ///
    /// ```
    /// use helmet_fit::ArtifactPaths;
    ///
    /// let paths = ArtifactPaths::beside("out/fit.ply");
    /// assert_eq!(paths.chin.to_str(), Some("out/fit_chinpiece.ply"));
    /// ```
    pub fn beside(helmet: impl Into<PathBuf>) -> Self {
        let helmet = helmet.into();
        let stem = helmet.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned());
        let chin_name = match helmet.extension() {
            Some(ext) => format!("{stem}_chinpiece.{}", ext.to_string_lossy()),
            None => format!("{stem}_chinpiece"),
        };
        let chin = helmet.with_file_name(chin_name);
        Self { helmet, chin }
    }

    /// Same paths with a different extension.
    #[must_use]
    pub fn with_format(self, format: MeshFormat) -> Self {
        Self {
            helmet: self.helmet.with_extension(format.extension()),
            chin: self.chin.with_extension(format.extension()),
        }
    }
}

/// Format a value the way the file names have always shown it: integral
/// values keep one decimal place (`3.0`), others print in full.
fn format_offset(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// File names for an artifact fitted under `pose`.
///
/// The helmet is `{date}_{subject}_offset{S}_DV{dv}.stl`, where `S` is
/// ten times the scale truncated to an integer and `dv` is the translation
/// along Z. The chin piece is `{date}_{subject}_chinpiece.stl`.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use helmet_fit::{artifact_paths, Pose, StepCounts, StepSizes};
///
/// let counts = StepCounts { scale: 12, translation: [0, 0, 6], ..StepCounts::default() };
/// let pose = Pose::from_counts(counts, 0, &StepSizes::default());
/// let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
/// let paths = artifact_paths("helmets", date, "m12", &pose);
/// assert_eq!(paths.helmet.to_str(), Some("helmets/2024-03-09_m12_offset11_DV3.0.stl"));
/// assert_eq!(paths.chin.to_str(), Some("helmets/2024-03-09_m12_chinpiece.stl"));
/// ```
pub fn artifact_paths(dir: impl AsRef<Path>, date: NaiveDate, subject: &str, pose: &Pose) -> ArtifactPaths {
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: intended, the name carries the integer part only.
    let scale_tag = (pose.scale() * 10.0).trunc() as i64;
    let dv = format_offset(pose.translation().z);
    let dir = dir.as_ref();
    ArtifactPaths {
        helmet: dir.join(format!("{date}_{subject}_offset{scale_tag}_DV{dv}.stl")),
        chin: dir.join(format!("{date}_{subject}_chinpiece.stl")),
    }
}

/// Where and under which name to save.
///
/// Names are derived from the date, subject and pose unless explicit paths
/// are set with [`with_output`](Self::with_output) or
/// [`with_output_paths`](Self::with_output_paths).
///
/// # Example
///
/// ```
/// use helmet_fit::{Pose, SaveTarget};
/// use mesh_io::MeshFormat;
///
/// let target = SaveTarget::new("out", "subject7").with_format(MeshFormat::Ply);
/// assert_eq!(target.subject, "subject7");
/// assert_eq!(target.format, MeshFormat::Ply);
///
/// let chosen = target.with_output("fits/left.stl");
/// assert_eq!(chosen.paths(&Pose::default()).helmet.to_str(), Some("fits/left.stl"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTarget {
    /// Output directory, created if missing.
    pub dir: PathBuf,
    /// Subject identifier used in the file names.
    pub subject: String,
    /// Date used in the file names.
    ///
    /// Default: today, local time
    pub date: NaiveDate,
    /// Output format of derived names. Explicit paths keep their own
    /// extension.
    ///
    /// Default: `MeshFormat::Stl`
    pub format: MeshFormat,
    /// User-chosen paths, replacing the derived names.
    ///
    /// Default: `None`
    pub output: Option<ArtifactPaths>,
}

impl SaveTarget {
    /// Target in `dir` for `subject`, dated today.
    pub fn new(dir: impl Into<PathBuf>, subject: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            subject: subject.into(),
            date: Local::now().date_naive(),
            format: MeshFormat::Stl,
            output: None,
        }
    }

    /// Save the helmet to `helmet` and the chin piece beside it.
    #[must_use]
    pub fn with_output(self, helmet: impl Into<PathBuf>) -> Self {
        self.with_output_paths(ArtifactPaths::beside(helmet))
    }

    /// Save both pieces to explicit paths.
    #[must_use]
    pub fn with_output_paths(mut self, paths: ArtifactPaths) -> Self {
        self.output = Some(paths);
        self
    }

    /// Set the date.
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: MeshFormat) -> Self {
        self.format = format;
        self
    }

    /// Paths an artifact with `pose` would be written to.
    pub fn paths(&self, pose: &Pose) -> ArtifactPaths {
        match &self.output {
            Some(paths) => paths.clone(),
            None => artifact_paths(&self.dir, self.date, &self.subject, pose).with_format(self.format),
        }
    }
}

/// What was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Helmet file.
    pub helmet: PathBuf,
    /// Chin piece file, if one was written.
    pub chin: Option<PathBuf>,
}

impl SaveReport {
    /// Status line for the user.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SaveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.chin.is_some() {
            write!(f, "{} and chinpiece successfully saved!", self.helmet.display())
        } else {
            write!(f, "{} successfully saved!", self.helmet.display())
        }
    }
}

fn write(mesh: &mesh_types::IndexedMesh, path: &Path) -> PersistenceResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| PersistenceError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    save_mesh(mesh, path).map_err(|source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the helmet and, if present, the chin piece. Missing parent
/// directories are created.
///
/// # Errors
///
/// Returns [`PersistenceError::CreateDir`] if a directory cannot be
/// created and [`PersistenceError::Write`] if a file cannot be written.
pub fn save_artifact(artifact: &FinalArtifact, target: &SaveTarget) -> PersistenceResult<SaveReport> {
    let paths = target.paths(&artifact.pose);
    write(&artifact.helmet, &paths.helmet)?;
    let chin = match &artifact.chin {
        Some(chin) => {
            write(chin, &paths.chin)?;
            Some(paths.chin)
        }
        None => None,
    };

    let report = SaveReport {
        helmet: paths.helmet,
        chin,
    };
    info!("{report}");
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::action::StepSizes;
    use crate::pose::StepCounts;
    use mesh_io::load_mesh;
    use mesh_types::unit_cube;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
    }

    fn pose(scale: i32, dv: i32) -> Pose {
        let counts = StepCounts {
            scale,
            translation: [0, 0, dv],
            ..StepCounts::default()
        };
        Pose::from_counts(counts, 0, &StepSizes::default())
    }

    #[test]
    fn offsets_format_like_the_legacy_names() {
        assert_eq!(format_offset(0.0), "0.0");
        assert_eq!(format_offset(-3.0), "-3.0");
        assert_eq!(format_offset(2.5), "2.5");
        assert_eq!(format_offset(-0.5), "-0.5");
    }

    #[test]
    fn scale_tag_truncates() {
        let paths = artifact_paths("h", date(), "a", &pose(0, 0));
        assert!(paths.helmet.ends_with("2024-01-31_a_offset10_DV0.0.stl"));
        let paths = artifact_paths("h", date(), "a", &pose(-7, -3));
        assert!(paths.helmet.ends_with("2024-01-31_a_offset9_DV-1.5.stl"));
        let paths = artifact_paths("h", date(), "a", &pose(50, 0));
        assert!(paths.helmet.ends_with("2024-01-31_a_offset15_DV0.0.stl"));
    }

    #[test]
    fn saves_helmet_and_chin() {
        let dir = tempfile::tempdir().unwrap();
        let target = SaveTarget::new(dir.path().join("helmets"), "m1").with_date(date());
        let artifact = FinalArtifact {
            helmet: unit_cube(),
            chin: Some(unit_cube()),
            pose: Pose::default(),
        };

        let report = save_artifact(&artifact, &target).unwrap();
        assert!(report.message().ends_with("and chinpiece successfully saved!"));
        assert_eq!(load_mesh(&report.helmet).unwrap().faces.len(), 12);
        assert!(report.chin.unwrap().is_file());
    }

    #[test]
    fn helmet_only_message() {
        let dir = tempfile::tempdir().unwrap();
        let target = SaveTarget::new(dir.path(), "m2")
            .with_date(date())
            .with_format(MeshFormat::Vtk);
        let artifact = FinalArtifact {
            helmet: unit_cube(),
            chin: None,
            pose: Pose::default(),
        };
        let report = save_artifact(&artifact, &target).unwrap();
        assert_eq!(report.helmet.extension().and_then(|e| e.to_str()), Some("vtk"));
        assert_eq!(report.message(), format!("{} successfully saved!", report.helmet.display()));
    }

    #[test]
    fn explicit_paths_replace_derived_names() {
        let dir = tempfile::tempdir().unwrap();
        let chosen = dir.path().join("picked").join("left fit.ply");
        let target = SaveTarget::new(dir.path().join("helmets"), "m4")
            .with_date(date())
            .with_output(&chosen);
        let artifact = FinalArtifact {
            helmet: unit_cube(),
            chin: Some(unit_cube()),
            pose: pose(5, 2),
        };

        let report = save_artifact(&artifact, &target).unwrap();
        assert_eq!(report.helmet, chosen);
        assert_eq!(report.chin.as_deref(), Some(dir.path().join("picked/left fit_chinpiece.ply").as_path()));
        assert_eq!(load_mesh(&chosen).unwrap().faces.len(), 12);
        // Nothing lands under the derived directory
        assert!(!dir.path().join("helmets").exists());

        let split = ArtifactPaths {
            helmet: dir.path().join("a.stl"),
            chin: dir.path().join("other/b.vtk"),
        };
        let target = SaveTarget::new(dir.path(), "m4").with_output_paths(split.clone());
        let report = save_artifact(&artifact, &target).unwrap();
        assert_eq!(report.chin, Some(split.chin));
        assert!(split.helmet.is_file());
    }

    #[test]
    fn unwritable_dir_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let target = SaveTarget::new(blocker.join("sub"), "m3");
        let artifact = FinalArtifact {
            helmet: unit_cube(),
            chin: None,
            pose: Pose::default(),
        };
        let err = save_artifact(&artifact, &target).unwrap_err();
        assert!(matches!(err, PersistenceError::CreateDir { .. }));
    }
}
