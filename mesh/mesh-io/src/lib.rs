//! Surface mesh file I/O.
//!
//! Loading and saving of triangle meshes in the three formats the helmet
//! workflow exchanges with other tools:
//!
//! - **STL** (Stereolithography) - Binary and ASCII
//! - **PLY** (Polygon File Format) - Binary and ASCII
//! - **VTK** (legacy polydata) - Binary (big-endian) and ASCII
//!
//! All three are readable and writable interchangeably; the format is picked
//! from the file suffix by [`load_mesh`] and [`save_mesh`].
//!
//! # Layer 0 Crate
//!
//! No rendering or UI dependencies.
//!
//! # Example
//!
//! ```no_run
//! use mesh_io::{load_mesh, save_mesh};
//!
//! let mesh = load_mesh("head.stl").unwrap();
//! save_mesh(&mesh, "head.vtk").unwrap();
//! ```
//!
//! # Precision
//!
//! STL and the binary PLY writer store `f32` coordinates, so round trips
//! through them lose precision beyond ~7 significant digits. VTK is written
//! with `double` points and is lossless.
//!
//! # Quality Standards
//!
//! - Zero clippy/doc warnings
//! - Zero `unwrap`/`expect` in library code

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod ply;
mod stl;
mod vtk;

pub use error::{IoError, IoResult};
pub use ply::{load_ply, save_ply};
pub use stl::{load_stl, save_stl};
pub use vtk::{load_vtk, save_vtk};

use std::path::Path;

use mesh_types::IndexedMesh;
use tracing::debug;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// STL, binary or ASCII.
    Stl,
    /// PLY, binary or ASCII.
    Ply,
    /// Legacy VTK polydata, binary or ASCII.
    Vtk,
}

impl MeshFormat {
    /// Detect format from the file extension, case-insensitively.
    ///
    /// Returns `None` if the extension is missing or not recognized.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "stl" => Some(Self::Stl),
            "ply" => Some(Self::Ply),
            "vtk" => Some(Self::Vtk),
            _ => None,
        }
    }

    /// Canonical file extension.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Stl => "stl",
            Self::Ply => "ply",
            Self::Vtk => "vtk",
        }
    }
}

fn format_for(path: &Path) -> IoResult<MeshFormat> {
    MeshFormat::from_path(path).ok_or_else(|| IoError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a mesh, detecting the format from the extension.
///
/// # Errors
///
/// Returns an error if:
/// - The extension is not `.stl`, `.ply` or `.vtk`
/// - The file cannot be read
/// - The content is invalid for the detected format
pub fn load_mesh<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let format = format_for(path)?;
    debug!(path = %path.display(), ?format, "Loading mesh");
    match format {
        MeshFormat::Stl => load_stl(path),
        MeshFormat::Ply => load_ply(path),
        MeshFormat::Vtk => load_vtk(path),
    }
}

/// Save a mesh, detecting the format from the extension.
///
/// Binary encodings are used for all three formats.
///
/// # Errors
///
/// Returns an error if the extension is unknown or the file cannot be
/// written.
pub fn save_mesh<P: AsRef<Path>>(mesh: &IndexedMesh, path: P) -> IoResult<()> {
    let path = path.as_ref();
    let format = format_for(path)?;
    debug!(path = %path.display(), ?format, faces = mesh.faces.len(), "Saving mesh");
    match format {
        MeshFormat::Stl => save_stl(mesh, path, true),
        MeshFormat::Ply => save_ply(mesh, path, true),
        MeshFormat::Vtk => save_vtk(mesh, path, true),
    }
}

/// Open a file for reading, mapping "not found" to [`IoError::FileNotFound`].
pub(crate) fn open_file(path: &Path) -> IoResult<std::fs::File> {
    std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IoError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IoError::Io(e)
        }
    })
}
