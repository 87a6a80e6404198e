//! The committed fit.

use std::fmt;

use mesh_types::{IndexedMesh, MeshTopology};

use crate::pose::Pose;

/// Helmet carved around the head, with the optional chin piece and the pose
/// it was produced under.
#[derive(Debug, Clone)]
pub struct FinalArtifact {
    /// Helmet after subtraction and post-processing.
    pub helmet: IndexedMesh,
    /// Chin piece minus the head, when chin subtraction was enabled.
    pub chin: Option<IndexedMesh>,
    /// Pose the head had at commit time.
    pub pose: Pose,
}

impl FinalArtifact {
    /// True if a chin piece was produced.
    pub fn has_chin(&self) -> bool {
        self.chin.is_some()
    }
}

impl fmt::Display for FinalArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "helmet: {} vertices, {} faces, volume {:.1} mm^3",
            self.helmet.vertex_count(),
            self.helmet.face_count(),
            self.helmet.volume()
        )?;
        if let Some(chin) = &self.chin {
            write!(f, "; chin piece: {} faces", chin.face_count())?;
        }
        write!(f, " (scale {:.2})", self.pose.scale())
    }
}
