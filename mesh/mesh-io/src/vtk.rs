//! Legacy VTK polydata support.
//!
//! Reads and writes the simple `.vtk` container used by VTK-based tools for
//! surface meshes:
//!
//! ```text
//! # vtk DataFile Version 4.2
//! <title>
//! ASCII | BINARY
//! DATASET POLYDATA
//! POINTS <n> float|double
//! <3n values>
//! POLYGONS <cells> <size>
//! <count i0 i1 ...> per cell
//! ```
//!
//! Binary payloads are big-endian. Files written by VTK 9 use the 5.1 cell
//! layout (`OFFSETS` / `CONNECTIVITY` arrays), which is also understood.
//! Polygons are fan-triangulated and triangle strips are unrolled. Point and
//! cell data sections after the geometry are ignored.
//!
//! Points are written as `double`, so VTK round trips are lossless.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use mesh_types::{IndexedMesh, Vertex};
use tracing::debug;

use crate::error::{IoError, IoResult};
use crate::open_file;

/// Byte cursor over a legacy VTK file.
///
/// Header keywords are whitespace-separated ASCII tokens; in binary files
/// each data block starts right after the newline ending its keyword line.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    binary: bool,
}

impl<'a> Cursor<'a> {
    fn line(&mut self) -> IoResult<&'a str> {
        let rest = &self.bytes[self.pos..];
        if rest.is_empty() {
            return Err(IoError::invalid_content("unexpected end of VTK header"));
        }
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        self.pos += (end + 1).min(rest.len());
        std::str::from_utf8(&rest[..end])
            .map(|s| s.trim_end_matches('\r'))
            .map_err(|_| IoError::invalid_content("VTK header is not ASCII"))
    }

    fn skip_whitespace(&mut self) {
        while self.bytes.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    fn token(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| !b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()
    }

    fn expect_token(&mut self, what: &str) -> IoResult<&'a str> {
        self.token()
            .ok_or_else(|| IoError::invalid_content(format!("VTK file ended before {what}")))
    }

    fn count(&mut self, what: &str) -> IoResult<usize> {
        Ok(self.expect_token(what)?.parse()?)
    }

    /// Move past the end of the current keyword line before a binary block.
    fn start_block(&mut self) {
        if !self.binary {
            return;
        }
        while let Some(&b) = self.bytes.get(self.pos) {
            self.pos += 1;
            if b == b'\n' {
                break;
            }
        }
    }

    fn starts_with_keyword(&mut self, keyword: &str) -> bool {
        let save = self.pos;
        self.skip_whitespace();
        let hit = self.bytes[self.pos..].starts_with(keyword.as_bytes());
        self.pos = save;
        hit
    }

    fn take(&mut self, n: usize, section: &'static str) -> IoResult<&'a [u8]> {
        let available = self.bytes.len() - self.pos;
        if available < n {
            return Err(IoError::Truncated {
                section,
                expected: n,
                got: available,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn reals(&mut self, n: usize, ty: &str) -> IoResult<Vec<f64>> {
        if !self.binary {
            return (0..n)
                .map(|_| -> IoResult<f64> { Ok(self.expect_token("point coordinates")?.parse()?) })
                .collect();
        }
        match ty {
            "float" => Ok(self
                .take(n * 4, "VTK points")?
                .chunks_exact(4)
                .map(|c| f64::from(f32::from_be_bytes([c[0], c[1], c[2], c[3]])))
                .collect()),
            "double" => Ok(self
                .take(n * 8, "VTK points")?
                .chunks_exact(8)
                .map(|c| f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect()),
            other => Err(IoError::invalid_content(format!(
                "unsupported VTK point type '{other}'"
            ))),
        }
    }

    /// Read `n` integers. Binary width comes from the type name; negative
    /// values map to `u64::MAX` so they fail later bounds checks.
    fn integers(&mut self, n: usize, ty: &str) -> IoResult<Vec<u64>> {
        let signed = |v: i64| u64::try_from(v).unwrap_or(u64::MAX);
        if !self.binary {
            return (0..n)
                .map(|_| -> IoResult<u64> { Ok(signed(self.expect_token("cell indices")?.parse()?)) })
                .collect();
        }
        match ty {
            "int" | "vtktypeint32" => Ok(self
                .take(n * 4, "VTK cells")?
                .chunks_exact(4)
                .map(|c| signed(i64::from(i32::from_be_bytes([c[0], c[1], c[2], c[3]]))))
                .collect()),
            "vtkIdType" | "long" | "vtktypeint64" => Ok(self
                .take(n * 8, "VTK cells")?
                .chunks_exact(8)
                .map(|c| signed(i64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])))
                .collect()),
            other => Err(IoError::invalid_content(format!(
                "unsupported VTK index type '{other}'"
            ))),
        }
    }

    /// Read one cell section in either the legacy or the 5.1 layout.
    fn cells(&mut self) -> IoResult<Vec<Vec<u64>>> {
        let n = self.count("cell count")?;
        let size = self.count("cell size")?;

        if self.starts_with_keyword("OFFSETS") {
            self.token();
            let offset_ty = self.expect_token("offset type")?;
            self.start_block();
            let offsets = self.integers(n, offset_ty)?;
            if self.expect_token("CONNECTIVITY")? != "CONNECTIVITY" {
                return Err(IoError::invalid_content("expected CONNECTIVITY after OFFSETS"));
            }
            let conn_ty = self.expect_token("connectivity type")?;
            self.start_block();
            let conn = self.integers(size, conn_ty)?;
            return offsets
                .windows(2)
                .map(|w| {
                    let (a, b) = (to_usize(w[0])?, to_usize(w[1])?);
                    conn.get(a..b)
                        .map(<[u64]>::to_vec)
                        .ok_or_else(|| IoError::invalid_content("VTK offsets exceed connectivity"))
                })
                .collect();
        }

        self.start_block();
        let flat = self.integers(size, "int")?;
        let mut cells = Vec::with_capacity(n);
        let mut i = 0;
        while cells.len() < n {
            let len = to_usize(*flat.get(i).ok_or_else(|| {
                IoError::invalid_content("VTK cell list shorter than declared")
            })?)?;
            let cell = flat
                .get(i + 1..i + 1 + len)
                .ok_or_else(|| IoError::invalid_content("VTK cell list shorter than declared"))?;
            cells.push(cell.to_vec());
            i += 1 + len;
        }
        Ok(cells)
    }
}

fn to_usize(v: u64) -> IoResult<usize> {
    usize::try_from(v).map_err(|_| IoError::invalid_content("VTK index out of range"))
}

/// Load a mesh from a legacy VTK polydata file.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The dataset is not `POLYDATA`
/// - A section is malformed or truncated
/// - A cell references a missing point
pub fn load_vtk<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    open_file(path)?.read_to_end(&mut bytes)?;
    let mesh = parse_vtk(&bytes)?;
    debug!(
        path = %path.display(),
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "Loaded VTK"
    );
    Ok(mesh)
}

pub(crate) fn parse_vtk(bytes: &[u8]) -> IoResult<IndexedMesh> {
    let mut cursor = Cursor {
        bytes,
        pos: 0,
        binary: false,
    };

    if !cursor.line()?.starts_with("# vtk DataFile") {
        return Err(IoError::invalid_content("missing '# vtk DataFile' signature"));
    }
    let _title = cursor.line()?;
    cursor.binary = match cursor.line()?.trim() {
        "ASCII" => false,
        "BINARY" => true,
        other => {
            return Err(IoError::invalid_content(format!(
                "unknown VTK encoding '{other}'"
            )))
        }
    };
    if cursor.expect_token("DATASET")? != "DATASET" || cursor.expect_token("dataset type")? != "POLYDATA" {
        return Err(IoError::invalid_content("only DATASET POLYDATA is supported"));
    }

    let mut mesh = IndexedMesh::new();
    while let Some(keyword) = cursor.token() {
        match keyword {
            "POINTS" => {
                let n = cursor.count("point count")?;
                let ty = cursor.expect_token("point type")?;
                cursor.start_block();
                let coords = cursor.reals(n * 3, ty)?;
                mesh.vertices = coords
                    .chunks_exact(3)
                    .map(|c| Vertex::from_coords(c[0], c[1], c[2]))
                    .collect();
            }
            "POLYGONS" => {
                for cell in cursor.cells()? {
                    push_fan(&mut mesh, &cell)?;
                }
            }
            "TRIANGLE_STRIPS" => {
                for cell in cursor.cells()? {
                    push_strip(&mut mesh, &cell)?;
                }
            }
            "VERTICES" | "LINES" => {
                cursor.cells()?;
            }
            // Attribute sections follow the geometry
            "POINT_DATA" | "CELL_DATA" | "METADATA" | "FIELD" => break,
            other => {
                return Err(IoError::invalid_content(format!(
                    "unexpected VTK keyword '{other}'"
                )))
            }
        }
    }
    Ok(mesh)
}

fn checked_index(mesh: &IndexedMesh, index: u64) -> IoResult<u32> {
    let vertex_count = mesh.vertices.len();
    match u32::try_from(index) {
        Ok(i) if (i as usize) < vertex_count => Ok(i),
        _ => Err(IoError::IndexOutOfRange {
            face: mesh.faces.len(),
            index,
            vertex_count,
        }),
    }
}

fn push_fan(mesh: &mut IndexedMesh, cell: &[u64]) -> IoResult<()> {
    for i in 1..cell.len().saturating_sub(1) {
        let face = [
            checked_index(mesh, cell[0])?,
            checked_index(mesh, cell[i])?,
            checked_index(mesh, cell[i + 1])?,
        ];
        mesh.faces.push(face);
    }
    Ok(())
}

fn push_strip(mesh: &mut IndexedMesh, cell: &[u64]) -> IoResult<()> {
    for (k, w) in cell.windows(3).enumerate() {
        let (a, b, c) = (
            checked_index(mesh, w[0])?,
            checked_index(mesh, w[1])?,
            checked_index(mesh, w[2])?,
        );
        // Odd triangles of a strip have reversed winding
        mesh.faces.push(if k % 2 == 0 { [a, b, c] } else { [b, a, c] });
    }
    Ok(())
}

/// Save a mesh as legacy VTK polydata.
///
/// `binary` selects big-endian binary, otherwise ASCII.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_vtk<P: AsRef<Path>>(mesh: &IndexedMesh, path: P, binary: bool) -> IoResult<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "# vtk DataFile Version 4.2")?;
    writeln!(w, "helmet-fit mesh")?;
    writeln!(w, "{}", if binary { "BINARY" } else { "ASCII" })?;
    writeln!(w, "DATASET POLYDATA")?;

    writeln!(w, "POINTS {} double", mesh.vertices.len())?;
    for v in &mesh.vertices {
        let p = v.position;
        if binary {
            for c in [p.x, p.y, p.z] {
                w.write_all(&c.to_be_bytes())?;
            }
        } else {
            writeln!(w, "{} {} {}", p.x, p.y, p.z)?;
        }
    }
    if binary {
        writeln!(w)?;
    }

    writeln!(w, "POLYGONS {} {}", mesh.faces.len(), mesh.faces.len() * 4)?;
    for face in &mesh.faces {
        if binary {
            w.write_all(&3i32.to_be_bytes())?;
            for &i in face {
                let i = i32::try_from(i)
                    .map_err(|_| IoError::invalid_content("vertex index exceeds VTK int range"))?;
                w.write_all(&i.to_be_bytes())?;
            }
        } else {
            writeln!(w, "3 {} {} {}", face[0], face[1], face[2])?;
        }
    }
    if binary {
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}
