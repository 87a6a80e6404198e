//! TOML configuration.
//!
//! Every section is optional; missing keys take their defaults.
//!
//! ```toml
//! [steps]
//! rotation_deg = 1.0
//!
//! [compositor]
//! clip_margin = 2.0
//! post_fill_hole_size = 30.0
//!
//! [paths]
//! templates = "assets"
//! output = "helmets"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use mesh_volume::SegmentationParams;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::StepSizes;
use crate::compositor::{CompositorConfig, PrepareParams};
use crate::error::{HelmetFitError, HelmetFitResult};
use crate::pose::PrealignParams;

/// Asset and output directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the helmet and chin piece assets.
    ///
    /// Default: `assets`
    pub templates: PathBuf,

    /// Directory saved artifacts go to.
    ///
    /// Default: `helmets`
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            templates: PathBuf::from("assets"),
            output: PathBuf::from("helmets"),
        }
    }
}

/// Complete session configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelmetFitConfig {
    /// Step sizes for the stepped controls.
    pub steps: StepSizes,
    /// Head preparation.
    pub prepare: PrepareParams,
    /// Initial head placement.
    pub prealign: PrealignParams,
    /// Boolean carving and post-processing.
    pub compositor: CompositorConfig,
    /// Skin segmentation from CT volumes.
    pub segmentation: SegmentationParams,
    /// Directories.
    pub paths: PathsConfig,
}

impl HelmetFitConfig {
    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`HelmetFitError::Config`] if the file cannot be read or is
    /// not valid TOML for this schema.
    pub fn load(path: impl AsRef<Path>) -> HelmetFitResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| HelmetFitError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            HelmetFitError::Config { message, .. } => HelmetFitError::Config {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`HelmetFitError::Config`] if the text is not valid.
    pub fn from_toml(text: &str) -> HelmetFitResult<Self> {
        toml::from_str(text).map_err(|e| HelmetFitError::Config {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`HelmetFitError::Config`] if a value cannot be represented.
    pub fn to_toml(&self) -> HelmetFitResult<String> {
        toml::to_string_pretty(self).map_err(|e| HelmetFitError::Config {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Set the step sizes.
    #[must_use]
    pub fn with_steps(mut self, steps: StepSizes) -> Self {
        self.steps = steps;
        self
    }

    /// Set the compositor configuration.
    #[must_use]
    pub fn with_compositor(mut self, compositor: CompositorConfig) -> Self {
        self.compositor = compositor;
        self
    }

    /// Set the head preparation.
    #[must_use]
    pub fn with_prepare(mut self, prepare: PrepareParams) -> Self {
        self.prepare = prepare;
        self
    }

    /// Set the initial placement.
    #[must_use]
    pub fn with_prealign(mut self, prealign: PrealignParams) -> Self {
        self.prealign = prealign;
        self
    }

    /// Set the segmentation parameters.
    #[must_use]
    pub fn with_segmentation(mut self, segmentation: SegmentationParams) -> Self {
        self.segmentation = segmentation;
        self
    }
}
