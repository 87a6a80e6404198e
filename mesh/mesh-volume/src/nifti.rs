//! NIfTI-1 reader.
//!
//! Reads single-file NIfTI (`.nii`), optionally gzip-compressed
//! (`.nii.gz`). Geometry comes from the sform when present, else the qform
//! quaternion, else the pixdim diagonal. NIfTI world coordinates are RAS;
//! they are converted to LPS on load so every volume in the pipeline shares
//! one patient frame.

use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use mesh_types::{Matrix3, Point3, Vector3};
use tracing::{debug, info};

use crate::error::{VolumeError, VolumeResult};
use crate::grid::VoxelGrid;

/// Size of the NIfTI-1 header in bytes.
pub const HEADER_SIZE: usize = 348;

const DIM: usize = 40;
const DATATYPE: usize = 70;
const BITPIX: usize = 72;
const PIXDIM: usize = 76;
const VOX_OFFSET: usize = 108;
const SCL_SLOPE: usize = 112;
const SCL_INTER: usize = 116;
const QFORM_CODE: usize = 252;
const SFORM_CODE: usize = 254;
const QUATERN_B: usize = 256;
const QOFFSET_X: usize = 268;
const SROW_X: usize = 280;
const MAGIC: usize = 344;

/// Voxel datatypes the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Datatype {
    U8,
    I16,
    I32,
    F32,
    F64,
    I8,
    U16,
    U32,
}

impl Datatype {
    fn from_code(code: i16) -> VolumeResult<Self> {
        Ok(match code {
            2 => Self::U8,
            4 => Self::I16,
            8 => Self::I32,
            16 => Self::F32,
            64 => Self::F64,
            256 => Self::I8,
            512 => Self::U16,
            768 => Self::U32,
            _ => return Err(VolumeError::UnsupportedDatatype { code }),
        })
    }

    fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// Little helper for endian-aware reads at fixed offsets.
struct Fields<'a> {
    bytes: &'a [u8],
    big_endian: bool,
}

impl Fields<'_> {
    fn array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[offset..offset + N]);
        if self.big_endian {
            out.reverse();
        }
        out
    }

    fn i16(&self, offset: usize) -> i16 {
        i16::from_le_bytes(self.array(offset))
    }

    fn f32(&self, offset: usize) -> f32 {
        f32::from_le_bytes(self.array(offset))
    }

    fn f32s<const N: usize>(&self, offset: usize) -> [f32; N] {
        std::array::from_fn(|i| self.f32(offset + 4 * i))
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss
    )]
    // Truncation: only called for in-range datatypes, values become f32 intensities
    fn voxel(&self, offset: usize, datatype: Datatype) -> f32 {
        match datatype {
            Datatype::U8 => f32::from(self.bytes[offset]),
            Datatype::I8 => f32::from(self.bytes[offset] as i8),
            Datatype::I16 => f32::from(i16::from_le_bytes(self.array(offset))),
            Datatype::U16 => f32::from(u16::from_le_bytes(self.array(offset))),
            Datatype::I32 => i32::from_le_bytes(self.array(offset)) as f32,
            Datatype::U32 => u32::from_le_bytes(self.array(offset)) as f32,
            Datatype::F32 => f32::from_le_bytes(self.array(offset)),
            Datatype::F64 => f64::from_le_bytes(self.array(offset)) as f32,
        }
    }
}

/// Rotation from the NIfTI quaternion `(b, c, d)`; `a` is implied.
fn quaternion_rotation(b: f64, c: f64, d: f64) -> Matrix3<f64> {
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    Matrix3::new(
        a * a + b * b - c * c - d * d,
        2.0 * (b * c - a * d),
        2.0 * (b * d + a * c),
        2.0 * (b * c + a * d),
        a * a + c * c - b * b - d * d,
        2.0 * (c * d - a * b),
        2.0 * (b * d - a * c),
        2.0 * (c * d + a * b),
        a * a + d * d - c * c - b * b,
    )
}

/// Read a NIfTI-1 volume from disk, gunzipping `.gz` files.
///
/// # Errors
///
/// Returns [`VolumeError::FileNotFound`] for a missing file and any error
/// from [`parse_nifti`].
pub fn load_nifti<P: AsRef<Path>>(path: P) -> VolumeResult<VoxelGrid> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VolumeError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let raw = std::fs::read(path)?;
    let gzipped = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"));
    let bytes = if gzipped {
        let mut out = Vec::new();
        GzDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
        out
    } else {
        raw
    };
    let grid = parse_nifti(&bytes)?;
    info!(path = %path.display(), dims = ?grid.dims(), "loaded NIfTI volume");
    Ok(grid)
}

/// Parse an in-memory single-file NIfTI-1 image.
///
/// Only the first 3D volume of a 4D series is read.
///
/// # Errors
///
/// Returns [`VolumeError::InvalidHeader`] for a bad size field, magic or
/// dimension, [`VolumeError::UnsupportedDatatype`] for unknown voxel types
/// and [`VolumeError::Truncated`] when the data is short.
pub fn parse_nifti(bytes: &[u8]) -> VolumeResult<VoxelGrid> {
    if bytes.len() < HEADER_SIZE {
        return Err(VolumeError::Truncated {
            expected: HEADER_SIZE,
            got: bytes.len(),
        });
    }
    let mut sizeof_hdr = [0u8; 4];
    sizeof_hdr.copy_from_slice(&bytes[0..4]);
    #[allow(clippy::cast_possible_wrap)]
    // Wrap: compared against a small positive constant
    let expected = HEADER_SIZE as i32;
    let big_endian = if i32::from_le_bytes(sizeof_hdr) == expected {
        false
    } else if i32::from_be_bytes(sizeof_hdr) == expected {
        true
    } else {
        return Err(VolumeError::invalid_header("sizeof_hdr is not 348"));
    };
    let fields = Fields { bytes, big_endian };

    let magic = &bytes[MAGIC..MAGIC + 4];
    if magic != b"n+1\0" && magic != b"ni1\0" {
        return Err(VolumeError::invalid_header("missing NIfTI-1 magic"));
    }

    let ndim = fields.i16(DIM);
    if !(1..=7).contains(&ndim) {
        return Err(VolumeError::invalid_header(format!("dim[0] = {ndim}")));
    }
    let mut dims = [1usize; 3];
    for (axis, dim) in dims.iter_mut().enumerate() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        // Truncation: axis is 0..3
        let stored_axis = axis as i16;
        if stored_axis < ndim {
            let n = fields.i16(DIM + 2 * (axis + 1));
            *dim = usize::try_from(n)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| VolumeError::invalid_header(format!("dim[{}] = {n}", axis + 1)))?;
        }
    }

    let datatype = Datatype::from_code(fields.i16(DATATYPE))?;
    let bitpix = fields.i16(BITPIX);
    if usize::try_from(bitpix).ok() != Some(datatype.size() * 8) {
        debug!(bitpix, "bitpix disagrees with datatype; trusting datatype");
    }

    let vox_offset = fields.f32(VOX_OFFSET);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    // Truncation: vox_offset is a whole byte offset stored as float
    let data_start = if vox_offset >= HEADER_SIZE as f32 {
        vox_offset as usize
    } else {
        352
    };

    let count: usize = dims.iter().product();
    let needed = data_start + count * datatype.size();
    if bytes.len() < needed {
        return Err(VolumeError::Truncated {
            expected: needed,
            got: bytes.len(),
        });
    }

    let slope = fields.f32(SCL_SLOPE);
    let inter = fields.f32(SCL_INTER);
    let scaled = slope != 0.0 && slope.is_finite() && inter.is_finite();
    let data: Vec<f32> = (0..count)
        .map(|n| {
            let v = fields.voxel(data_start + n * datatype.size(), datatype);
            if scaled {
                v * slope + inter
            } else {
                v
            }
        })
        .collect();

    let pixdim: [f32; 8] = fields.f32s(PIXDIM);
    let pixel_spacing = Vector3::new(
        f64::from(pixdim[1].abs()),
        f64::from(pixdim[2].abs()),
        f64::from(pixdim[3].abs()),
    )
    .map(|s| if s > 0.0 { s } else { 1.0 });

    let (spacing, origin, direction) = if fields.i16(SFORM_CODE) > 0 {
        let rows: [[f32; 4]; 3] = [
            fields.f32s(SROW_X),
            fields.f32s(SROW_X + 16),
            fields.f32s(SROW_X + 32),
        ];
        let linear = Matrix3::from_fn(|r, c| f64::from(rows[r][c]));
        let spacing = Vector3::from_fn(|c, _| linear.column(c).norm());
        let direction = Matrix3::from_fn(|r, c| {
            if spacing[c] > 0.0 {
                linear[(r, c)] / spacing[c]
            } else {
                f64::from(u8::from(r == c))
            }
        });
        let origin = Point3::new(
            f64::from(rows[0][3]),
            f64::from(rows[1][3]),
            f64::from(rows[2][3]),
        );
        (spacing.map(|s| if s > 0.0 { s } else { 1.0 }), origin, direction)
    } else if fields.i16(QFORM_CODE) > 0 {
        let [b, c, d]: [f32; 3] = fields.f32s(QUATERN_B);
        let offset: [f32; 3] = fields.f32s(QOFFSET_X);
        let qfac = if pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let rotation = quaternion_rotation(f64::from(b), f64::from(c), f64::from(d));
        let direction = rotation * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, qfac));
        let origin = Point3::new(
            f64::from(offset[0]),
            f64::from(offset[1]),
            f64::from(offset[2]),
        );
        (pixel_spacing, origin, direction)
    } else {
        (pixel_spacing, Point3::origin(), Matrix3::identity())
    };

    // RAS to LPS
    let flip = Matrix3::from_diagonal(&Vector3::new(-1.0, -1.0, 1.0));
    let grid = VoxelGrid::new(dims, data)?
        .with_spacing(spacing)
        .with_origin(Point3::from(flip * origin.coords))
        .with_direction(flip * direction);

    debug!(?dims, ?datatype, big_endian, "parsed NIfTI header");
    Ok(grid)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Minimal little-endian header for a 2x2x2 i16 image.
    fn header(datatype: i16, bitpix: i16) -> Vec<u8> {
        let mut h = vec![0u8; 352];
        h[0..4].copy_from_slice(&348i32.to_le_bytes());
        for (i, d) in [3i16, 2, 2, 2, 1, 1, 1, 1].iter().enumerate() {
            h[DIM + 2 * i..DIM + 2 * i + 2].copy_from_slice(&d.to_le_bytes());
        }
        h[DATATYPE..DATATYPE + 2].copy_from_slice(&datatype.to_le_bytes());
        h[BITPIX..BITPIX + 2].copy_from_slice(&bitpix.to_le_bytes());
        for (i, p) in [1.0f32, 0.5, 0.5, 2.0].iter().enumerate() {
            h[PIXDIM + 4 * i..PIXDIM + 4 * i + 4].copy_from_slice(&p.to_le_bytes());
        }
        h[VOX_OFFSET..VOX_OFFSET + 4].copy_from_slice(&352f32.to_le_bytes());
        h[MAGIC..MAGIC + 4].copy_from_slice(b"n+1\0");
        h
    }

    #[test]
    fn reads_i16_with_pixdim_geometry() {
        let mut bytes = header(4, 16);
        for v in 0i16..8 {
            bytes.extend_from_slice(&(v * 100 - 300).to_le_bytes());
        }
        let grid = parse_nifti(&bytes).unwrap();
        assert_eq!(grid.dims(), [2, 2, 2]);
        assert_eq!(grid.get(1, 1, 1), Some(400.0));
        assert_relative_eq!(grid.spacing(), Vector3::new(0.5, 0.5, 2.0));
        // Identity RAS becomes LPS: x and y flip
        assert_relative_eq!(grid.world_position(1.0, 1.0, 1.0), Point3::new(-0.5, -0.5, 2.0));
    }

    #[test]
    fn applies_scaling() {
        let mut bytes = header(2, 8);
        bytes[SCL_SLOPE..SCL_SLOPE + 4].copy_from_slice(&2.0f32.to_le_bytes());
        bytes[SCL_INTER..SCL_INTER + 4].copy_from_slice(&(-10.0f32).to_le_bytes());
        bytes.extend_from_slice(&[0, 1, 2, 3, 4, 5, 6, 255]);
        let grid = parse_nifti(&bytes).unwrap();
        assert_eq!(grid.get(0, 0, 0), Some(-10.0));
        assert_eq!(grid.get(1, 1, 1), Some(500.0));
    }

    #[test]
    fn reads_big_endian() {
        let mut bytes = header(16, 32);
        // Swap every multi-byte field we set
        bytes[0..4].copy_from_slice(&348i32.to_be_bytes());
        for (i, d) in [3i16, 2, 2, 2, 1, 1, 1, 1].iter().enumerate() {
            bytes[DIM + 2 * i..DIM + 2 * i + 2].copy_from_slice(&d.to_be_bytes());
        }
        bytes[DATATYPE..DATATYPE + 2].copy_from_slice(&16i16.to_be_bytes());
        bytes[BITPIX..BITPIX + 2].copy_from_slice(&32i16.to_be_bytes());
        for i in 0..4 {
            bytes[PIXDIM + 4 * i..PIXDIM + 4 * i + 4].copy_from_slice(&1.0f32.to_be_bytes());
        }
        bytes[VOX_OFFSET..VOX_OFFSET + 4].copy_from_slice(&352f32.to_be_bytes());
        for v in 0..8 {
            #[allow(clippy::cast_precision_loss)]
            let value = v as f32 * 0.5;
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        let grid = parse_nifti(&bytes).unwrap();
        assert_eq!(grid.get(1, 1, 1), Some(3.5));
    }

    #[test]
    fn sform_takes_precedence() {
        let mut bytes = header(2, 8);
        bytes[SFORM_CODE..SFORM_CODE + 2].copy_from_slice(&1i16.to_le_bytes());
        let rows = [
            [0.0f32, -3.0, 0.0, 10.0],
            [2.0, 0.0, 0.0, 20.0],
            [0.0, 0.0, 4.0, 30.0],
        ];
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                let at = SROW_X + 16 * r + 4 * c;
                bytes[at..at + 4].copy_from_slice(&v.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&[0; 8]);
        let grid = parse_nifti(&bytes).unwrap();
        assert_relative_eq!(grid.spacing(), Vector3::new(2.0, 3.0, 4.0));
        assert_relative_eq!(grid.origin(), Point3::new(-10.0, -20.0, 30.0));
        // Index i runs along RAS +y, which is LPS -y
        assert_relative_eq!(grid.world_position(1.0, 0.0, 0.0), Point3::new(-10.0, -22.0, 30.0));
    }

    #[test]
    fn quaternion_identity() {
        assert_relative_eq!(quaternion_rotation(0.0, 0.0, 0.0), Matrix3::identity());
        // 180 degrees about z
        let r = quaternion_rotation(0.0, 0.0, 1.0);
        assert_relative_eq!(r * Vector3::x(), -Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse_nifti(&[0u8; 10]), Err(VolumeError::Truncated { .. })));

        let mut bad_magic = header(4, 16);
        bad_magic[MAGIC] = b'x';
        assert!(matches!(parse_nifti(&bad_magic), Err(VolumeError::InvalidHeader { .. })));

        let unknown = header(1, 1);
        assert!(matches!(
            parse_nifti(&unknown),
            Err(VolumeError::UnsupportedDatatype { code: 1 })
        ));

        // Header promises 8 voxels of i16, data has 3 bytes
        let mut short = header(4, 16);
        short.extend_from_slice(&[0, 0, 0]);
        assert!(matches!(parse_nifti(&short), Err(VolumeError::Truncated { .. })));
    }
}
