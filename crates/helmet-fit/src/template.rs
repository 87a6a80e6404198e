//! Helmet templates and their chin pieces.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use mesh_io::load_mesh;
use mesh_types::{IndexedMesh, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HelmetFitError, HelmetFitResult};

/// Available helmet shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Flat-backed helmet.
    #[default]
    Flat,
    /// Helmet with side wings.
    Winged,
}

impl TemplateKind {
    /// Both kinds.
    pub const ALL: [Self; 2] = [Self::Flat, Self::Winged];

    /// Helmet asset file name.
    pub const fn helmet_file(self) -> &'static str {
        match self {
            Self::Flat => "Flat_helmet.STL",
            Self::Winged => "Winged_helmet.STL",
        }
    }

    /// Chin piece asset file name.
    pub const fn chin_file(self) -> &'static str {
        match self {
            Self::Flat => "FlatChinPiece.stl",
            Self::Winged => "WingedChinPiece.stl",
        }
    }

    /// Where the centered chin piece sits relative to the centered helmet.
    pub fn chin_offset(self) -> Vector3<f64> {
        match self {
            Self::Flat => Vector3::new(0.0, 7.4, -25.5),
            Self::Winged => Vector3::new(0.0, 6.0, -22.3),
        }
    }

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Winged => "winged",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = HelmetFitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "winged" => Ok(Self::Winged),
            _ => Err(HelmetFitError::Config {
                path: PathBuf::new(),
                message: format!("unknown template '{s}', expected flat or winged"),
            }),
        }
    }
}

/// A loaded helmet template.
#[derive(Debug, Clone)]
pub struct HelmetTemplate {
    /// Template shape.
    pub kind: TemplateKind,
    /// Helmet mesh, centered at the origin.
    pub helmet: IndexedMesh,
    /// Chin piece placed at the kind's offset, if the asset exists.
    pub chin: Option<IndexedMesh>,
    /// Smoothing slider applied when the template is selected, 0 to 100.
    pub smoothing_percent: u8,
}

impl HelmetTemplate {
    /// Build a template from meshes already in memory.
    ///
    /// The helmet is centered. The chin piece is centered and then moved to
    /// the kind's chin offset.
    #[must_use]
    pub fn from_meshes(kind: TemplateKind, mut helmet: IndexedMesh, chin: Option<IndexedMesh>) -> Self {
        helmet.center_at_origin();
        let chin = chin.map(|mut c| {
            c.center_at_origin();
            c.translate(kind.chin_offset());
            c
        });
        Self {
            kind,
            helmet,
            chin,
            smoothing_percent: 0,
        }
    }

    /// Set the initial smoothing slider.
    #[must_use]
    pub fn with_smoothing_percent(mut self, percent: u8) -> Self {
        self.smoothing_percent = percent.min(100);
        self
    }
}

/// Template assets on disk.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    dir: PathBuf,
}

impl TemplateCatalog {
    /// Catalog rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Asset directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Kinds whose helmet asset is present.
    pub fn available(&self) -> Vec<TemplateKind> {
        TemplateKind::ALL
            .into_iter()
            .filter(|k| self.dir.join(k.helmet_file()).is_file())
            .collect()
    }

    /// Load a template.
    ///
    /// # Errors
    ///
    /// Returns [`HelmetFitError::MissingAsset`] if the helmet file is absent
    /// and [`HelmetFitError::Load`] if it cannot be parsed. A chin piece that
    /// fails to load is skipped with a warning.
    pub fn load(&self, kind: TemplateKind) -> HelmetFitResult<HelmetTemplate> {
        let helmet_path = self.dir.join(kind.helmet_file());
        if !helmet_path.is_file() {
            return Err(HelmetFitError::MissingAsset { path: helmet_path });
        }
        let helmet = load_mesh(&helmet_path).map_err(|source| HelmetFitError::Load {
            path: helmet_path.clone(),
            source,
        })?;
        if helmet.faces.is_empty() {
            return Err(HelmetFitError::EmptyMesh { what: "helmet" });
        }

        let chin_path = self.dir.join(kind.chin_file());
        let chin = if chin_path.is_file() {
            match load_mesh(&chin_path) {
                Ok(mesh) if !mesh.faces.is_empty() => Some(mesh),
                Ok(_) => {
                    warn!(path = %chin_path.display(), "chin piece is empty, skipping");
                    None
                }
                Err(err) => {
                    warn!(path = %chin_path.display(), error = %err, "cannot read chin piece, skipping");
                    None
                }
            }
        } else {
            None
        };

        info!(
            kind = %kind,
            helmet_faces = helmet.faces.len(),
            chin = chin.is_some(),
            "loaded helmet template"
        );
        Ok(HelmetTemplate::from_meshes(kind, helmet, chin))
    }
}
