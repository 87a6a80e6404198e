//! DICOM series reader (requires the `dicom` feature).
//!
//! Reads every slice of a series directory, orders slices along the slice
//! normal and stacks them into one grid. DICOM patient coordinates are
//! already LPS.

use std::path::{Path, PathBuf};

use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};
use mesh_types::{Matrix3, Point3, Vector3};
use tracing::{debug, info, warn};

use crate::error::{VolumeError, VolumeResult};
use crate::grid::VoxelGrid;

struct Slice {
    position: Vector3<f64>,
    rows: usize,
    columns: usize,
    values: Vec<f32>,
}

struct SeriesGeometry {
    row_dir: Vector3<f64>,
    col_dir: Vector3<f64>,
    pixel_spacing: [f64; 2],
}

fn dicom_error(path: &Path, err: impl std::fmt::Display) -> VolumeError {
    VolumeError::Dicom {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn floats(obj: &DefaultDicomObject, tag: dicom::core::Tag, path: &Path) -> VolumeResult<Vec<f64>> {
    obj.element(tag)
        .map_err(|e| dicom_error(path, e))?
        .to_multi_float64()
        .map_err(|e| dicom_error(path, e))
}

fn optional_float(obj: &DefaultDicomObject, tag: dicom::core::Tag, default: f64) -> f64 {
    obj.element_opt(tag)
        .ok()
        .flatten()
        .and_then(|e| e.to_float64().ok())
        .unwrap_or(default)
}

fn read_slice(path: &Path) -> VolumeResult<(Slice, SeriesGeometry)> {
    let obj = open_file(path).map_err(|e| dicom_error(path, e))?;

    let int = |tag| -> VolumeResult<usize> {
        obj.element(tag)
            .map_err(|e| dicom_error(path, e))?
            .to_int::<u32>()
            .map_err(|e| dicom_error(path, e))
            .map(|v| v as usize)
    };
    let rows = int(tags::ROWS)?;
    let columns = int(tags::COLUMNS)?;
    let bits = int(tags::BITS_ALLOCATED)?;
    let signed = int(tags::PIXEL_REPRESENTATION).unwrap_or(0) == 1;

    let orientation = floats(&obj, tags::IMAGE_ORIENTATION_PATIENT, path)?;
    let position = floats(&obj, tags::IMAGE_POSITION_PATIENT, path)?;
    let spacing = floats(&obj, tags::PIXEL_SPACING, path)?;
    if orientation.len() < 6 || position.len() < 3 || spacing.len() < 2 {
        return Err(VolumeError::invalid_header(format!(
            "{}: incomplete patient geometry",
            path.display()
        )));
    }

    let slope = optional_float(&obj, tags::RESCALE_SLOPE, 1.0);
    let intercept = optional_float(&obj, tags::RESCALE_INTERCEPT, 0.0);

    let pixel_data = obj
        .element(tags::PIXEL_DATA)
        .map_err(|e| dicom_error(path, e))?
        .to_bytes()
        .map_err(|e| dicom_error(path, e))?;
    let count = rows * columns;
    let bytes_per = bits / 8;
    if bytes_per != 1 && bytes_per != 2 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        // Truncation: bits allocated is a small DICOM enumeration
        let code = bits as i16;
        return Err(VolumeError::UnsupportedDatatype { code });
    }
    if pixel_data.len() < count * bytes_per {
        return Err(VolumeError::Truncated {
            expected: count * bytes_per,
            got: pixel_data.len(),
        });
    }

    #[allow(clippy::cast_possible_truncation)]
    // Truncation: rescaled CT values fit f32
    let values = (0..count)
        .map(|n| {
            let raw = match (bytes_per, signed) {
                (1, false) => f64::from(pixel_data[n]),
                (1, true) => f64::from(i8::from_le_bytes([pixel_data[n]])),
                (_, false) => f64::from(u16::from_le_bytes([pixel_data[2 * n], pixel_data[2 * n + 1]])),
                (_, true) => f64::from(i16::from_le_bytes([pixel_data[2 * n], pixel_data[2 * n + 1]])),
            };
            (raw * slope + intercept) as f32
        })
        .collect();

    let slice = Slice {
        position: Vector3::new(position[0], position[1], position[2]),
        rows,
        columns,
        values,
    };
    let geometry = SeriesGeometry {
        row_dir: Vector3::new(orientation[0], orientation[1], orientation[2]),
        col_dir: Vector3::new(orientation[3], orientation[4], orientation[5]),
        // PixelSpacing is (between rows, between columns)
        pixel_spacing: [spacing[1], spacing[0]],
    };
    Ok((slice, geometry))
}

fn series_files(path: &Path) -> VolumeResult<Vec<PathBuf>> {
    let dir = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or_else(|| Path::new("."))
    };
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && (path.is_dir()
                    || p.extension().is_some_and(|e| e.eq_ignore_ascii_case("dcm")))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Read a DICOM series from a directory, or from the directory holding the
/// given `.dcm` file.
///
/// Slices are ordered by `ImagePositionPatient` projected on the slice
/// normal; `RescaleSlope`/`RescaleIntercept` are applied. Files that are not
/// DICOM are skipped with a warning.
///
/// # Errors
///
/// Returns [`VolumeError::FileNotFound`] for a missing path,
/// [`VolumeError::InvalidHeader`] when no readable slices remain or slice
/// sizes differ, and [`VolumeError::Dicom`] for reader errors.
pub fn load_dicom_series<P: AsRef<Path>>(path: P) -> VolumeResult<VoxelGrid> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VolumeError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut slices = Vec::new();
    let mut geometry = None;
    for file in series_files(path)? {
        match read_slice(&file) {
            Ok((slice, g)) => {
                geometry.get_or_insert(g);
                slices.push(slice);
            }
            Err(err) => warn!(file = %file.display(), %err, "skipping unreadable slice"),
        }
    }
    let geometry = geometry.ok_or_else(|| VolumeError::invalid_header("no readable DICOM slices"))?;

    let normal = geometry.row_dir.cross(&geometry.col_dir);
    slices.sort_by(|a, b| a.position.dot(&normal).total_cmp(&b.position.dot(&normal)));

    let (rows, columns) = (slices[0].rows, slices[0].columns);
    if slices.iter().any(|s| s.rows != rows || s.columns != columns) {
        return Err(VolumeError::invalid_header("slices differ in size"));
    }

    let slice_spacing = if slices.len() > 1 {
        (slices[1].position - slices[0].position).dot(&normal).abs()
    } else {
        1.0
    };
    let slice_spacing = if slice_spacing > 0.0 { slice_spacing } else { 1.0 };

    let dims = [columns, rows, slices.len()];
    let origin = Point3::from(slices[0].position);
    let data: Vec<f32> = slices.into_iter().flat_map(|s| s.values).collect();
    let direction = Matrix3::from_columns(&[geometry.row_dir, geometry.col_dir, normal]);

    debug!(?dims, slice_spacing, "stacked DICOM series");
    let grid = VoxelGrid::new(dims, data)?
        .with_spacing(Vector3::new(
            geometry.pixel_spacing[0],
            geometry.pixel_spacing[1],
            slice_spacing,
        ))
        .with_origin(origin)
        .with_direction(direction);
    info!(path = %path.display(), ?dims, "loaded DICOM series");
    Ok(grid)
}
