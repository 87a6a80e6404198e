//! Format dispatch for volume loading.

use std::path::Path;

use crate::error::{VolumeError, VolumeResult};
use crate::grid::VoxelGrid;
use crate::nifti::load_nifti;

/// Volume formats recognised from a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    /// Single-file NIfTI-1 (`.nii`).
    Nifti,
    /// Gzip-compressed NIfTI-1 (`.nii.gz`).
    NiftiGz,
    /// DICOM series: a `.dcm` file or a directory of slices.
    Dicom,
}

impl VolumeFormat {
    /// Detect the format from a path.
    ///
    /// Directories are DICOM series. Otherwise the extension decides,
    /// case-insensitively.
    ///
    /// ```
    /// use mesh_volume::VolumeFormat;
    ///
    /// assert_eq!(VolumeFormat::from_path("scan.NII.GZ"), Some(VolumeFormat::NiftiGz));
    /// assert_eq!(VolumeFormat::from_path("scan.nii"), Some(VolumeFormat::Nifti));
    /// assert_eq!(VolumeFormat::from_path("scan.stl"), None);
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Some(Self::Dicom);
        }
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".nii.gz") {
            Some(Self::NiftiGz)
        } else if name.ends_with(".nii") {
            Some(Self::Nifti)
        } else if name.ends_with(".dcm") {
            Some(Self::Dicom)
        } else {
            None
        }
    }
}

/// Load a CT volume, choosing the reader from the path.
///
/// The grid is returned as stored; call
/// [`reorient_to_lps`](crate::reorient_to_lps) to align the index axes with
/// the patient frame.
///
/// # Errors
///
/// Returns [`VolumeError::FileNotFound`] if the path does not exist,
/// [`VolumeError::UnsupportedFormat`] for unknown extensions (and for DICOM
/// when built without the `dicom` feature), and any reader error.
pub fn load_volume<P: AsRef<Path>>(path: P) -> VolumeResult<VoxelGrid> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VolumeError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match VolumeFormat::from_path(path) {
        Some(VolumeFormat::Nifti | VolumeFormat::NiftiGz) => load_nifti(path),
        #[cfg(feature = "dicom")]
        Some(VolumeFormat::Dicom) => crate::series::load_dicom_series(path),
        _ => Err(VolumeError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_dicom() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(VolumeFormat::from_path(dir.path()), Some(VolumeFormat::Dicom));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_volume("/nonexistent/scan.nii").unwrap_err();
        assert!(matches!(err, VolumeError::FileNotFound { .. }));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.raw");
        std::fs::write(&path, [0u8; 16]).unwrap();
        let err = load_volume(&path).unwrap_err();
        assert!(matches!(err, VolumeError::UnsupportedFormat { .. }));
    }

    #[cfg(not(feature = "dicom"))]
    #[test]
    fn dicom_needs_feature() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_volume(dir.path()),
            Err(VolumeError::UnsupportedFormat { .. })
        ));
    }
}
