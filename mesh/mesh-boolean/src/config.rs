//! Configuration and presets for boolean operations.
//!
//! This module provides [`BooleanConfig`] for controlling boolean operation behavior,
//! including tolerance settings and result cleanup options.
//!
//! # Presets
//!
//! - [`BooleanConfig::default()`] - Balanced settings for general use
//! - [`BooleanConfig::for_scans()`] - Looser tolerances for segmented CT surfaces
//! - [`BooleanConfig::strict()`] - Tightest settings, for exact synthetic geometry
//!
//! # Example
//!
//! ```
//! use mesh_boolean::{BooleanConfig, CleanupLevel};
//!
//! let config = BooleanConfig::for_scans()
//!     .with_cleanup(CleanupLevel::Full)
//!     .with_parallel(false);
//! assert!(!config.parallel);
//! ```

use std::fmt;

/// Level of cleanup to apply to boolean operation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CleanupLevel {
    /// No cleanup: cut vertices from the two operands stay separate where
    /// they coincide.
    None,

    /// Weld vertices within tolerance and remove degenerate triangles.
    #[default]
    Fast,

    /// [`CleanupLevel::Fast`] plus duplicate face removal.
    Full,
}

/// Configuration for boolean operations.
///
/// Tolerances are relative: they are multiplied by the largest extent of
/// the combined bounding box, so the same config works in millimeters or
/// meters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BooleanConfig {
    /// Relative tolerance for plane-side and on-edge tests.
    pub epsilon: f64,

    /// Relative tolerance for vertex welding during cleanup.
    pub vertex_weld_tolerance: f64,

    /// Level of cleanup to apply to results.
    pub cleanup: CleanupLevel,

    /// Whether to use parallel processing (requires the `parallel` feature).
    pub parallel: bool,

    /// Maximum leaf size for BVH construction.
    pub bvh_leaf_size: usize,
}

impl Default for BooleanConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-10,
            vertex_weld_tolerance: 1e-9,
            cleanup: CleanupLevel::default(),
            parallel: true,
            bvh_leaf_size: 8,
        }
    }
}

impl BooleanConfig {
    /// Create configuration for segmented scan surfaces.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_boolean::BooleanConfig;
    ///
    /// let config = BooleanConfig::for_scans();
    /// assert!(config.vertex_weld_tolerance > BooleanConfig::default().vertex_weld_tolerance);
    /// ```
    #[must_use]
    pub fn for_scans() -> Self {
        Self {
            epsilon: 1e-9,
            vertex_weld_tolerance: 1e-7,
            cleanup: CleanupLevel::Full,
            ..Self::default()
        }
    }

    /// Create strict configuration with the tightest tolerances.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            epsilon: 1e-12,
            vertex_weld_tolerance: 1e-12,
            cleanup: CleanupLevel::Fast,
            bvh_leaf_size: 4,
            ..Self::default()
        }
    }

    /// Set the cleanup level.
    #[must_use]
    pub fn with_cleanup(mut self, level: CleanupLevel) -> Self {
        self.cleanup = level;
        self
    }

    /// Enable or disable parallel processing.
    ///
    /// Results are identical either way; only the BVH build and face
    /// classification are spread over threads.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the relative geometric tolerance.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon.abs();
        self
    }

    /// Set the relative vertex weld tolerance.
    #[must_use]
    pub fn with_vertex_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.vertex_weld_tolerance = tolerance.abs();
        self
    }

    /// Set the BVH leaf size.
    #[must_use]
    pub fn with_bvh_leaf_size(mut self, size: usize) -> Self {
        self.bvh_leaf_size = size.max(1);
        self
    }

    /// Whether parallel code paths are both requested and compiled in.
    pub(crate) fn use_parallel(&self) -> bool {
        cfg!(feature = "parallel") && self.parallel
    }
}

/// Boolean operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOp {
    /// Union: A ∪ B
    ///
    /// All of A outside B, plus all of B outside A.
    Union,

    /// Difference: A - B
    ///
    /// All of A outside B, plus all of B inside A with reversed winding.
    Difference,

    /// Intersection: A ∩ B
    ///
    /// All of A inside B, plus all of B inside A.
    Intersection,
}

impl BooleanOp {
    /// Whether faces of A inside B are kept (otherwise those outside are).
    pub(crate) const fn keeps_a_inside(self) -> bool {
        matches!(self, Self::Intersection)
    }

    /// Whether faces of B inside A are kept (otherwise those outside are).
    pub(crate) const fn keeps_b_inside(self) -> bool {
        matches!(self, Self::Difference | Self::Intersection)
    }

    /// Whether kept faces of B have their winding reversed.
    pub(crate) const fn inverts_b(self) -> bool {
        matches!(self, Self::Difference)
    }
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Union => write!(f, "union (A ∪ B)"),
            Self::Difference => write!(f, "difference (A - B)"),
            Self::Intersection => write!(f, "intersection (A ∩ B)"),
        }
    }
}
