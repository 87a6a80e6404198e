//! STL (Stereolithography) file format support.
//!
//! Both the ASCII and the binary encoding are supported.
//!
//! # Format Detection
//!
//! A file is binary when its size is exactly `84 + 50 * n` for the triangle
//! count `n` stored at byte 80. Otherwise it is parsed as ASCII if it starts
//! with `solid`. Size is checked first because many binary exporters write
//! `solid` into the 80-byte header.
//!
//! # Indexing
//!
//! STL stores a triangle soup. On load, corners with bit-identical
//! coordinates are merged into one vertex so the result is an indexed mesh
//! with shared edges. Nearly-coincident corners are left alone; welding with
//! a tolerance is a repair step, not a parsing step.
//!
//! # Binary Layout
//!
//! ```text
//! UINT8[80]    – Header
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Normal vector
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count
//! end
//! ```

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use hashbrown::HashMap;
use mesh_types::{IndexedMesh, MeshTopology, Vertex};
use tracing::debug;

use crate::error::{IoError, IoResult};
use crate::open_file;

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one triangle record in binary STL.
const TRIANGLE_SIZE: usize = 50;

/// Merges corners with identical coordinates while building a mesh.
struct SoupIndexer {
    mesh: IndexedMesh,
    lookup: HashMap<[u64; 3], u32>,
}

impl SoupIndexer {
    fn with_capacity(faces: usize) -> Self {
        Self {
            mesh: IndexedMesh::with_capacity(faces / 2 + 3, faces),
            lookup: HashMap::with_capacity(faces / 2 + 3),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    // Truncation: mesh indices are u32, meshes with >4B vertices are unsupported
    fn vertex(&mut self, p: [f64; 3]) -> u32 {
        // Normalize -0.0 so it shares a vertex with 0.0
        let key = p.map(|c| if c == 0.0 { 0_u64 } else { c.to_bits() });
        let next = self.mesh.vertices.len() as u32;
        *self.lookup.entry(key).or_insert_with(|| {
            self.mesh.vertices.push(Vertex::from_coords(p[0], p[1], p[2]));
            next
        })
    }

    fn triangle(&mut self, corners: [[f64; 3]; 3]) {
        let face = corners.map(|c| self.vertex(c));
        self.mesh.faces.push(face);
    }

    fn finish(self) -> IndexedMesh {
        self.mesh
    }
}

/// Load a mesh from an STL file.
///
/// Detects ASCII vs binary automatically and merges identical corners.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid STL.
///
/// # Example
///
/// ```no_run
/// use mesh_io::load_stl;
///
/// let mesh = load_stl("FlatChinPiece.stl").unwrap();
/// println!("Loaded {} faces", mesh.faces.len());
/// ```
pub fn load_stl<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    open_file(path)?.read_to_end(&mut bytes)?;
    let mesh = parse_stl(&bytes)?;
    debug!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Loaded STL"
    );
    Ok(mesh)
}

/// Parse STL content from memory.
pub(crate) fn parse_stl(bytes: &[u8]) -> IoResult<IndexedMesh> {
    if bytes.len() < 6 {
        return Err(IoError::invalid_content("file too small to be valid STL"));
    }
    if is_binary_stl(bytes) {
        return parse_binary(bytes);
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(HEADER_SIZE)]);
    if head.trim_start().starts_with("solid") {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| IoError::invalid_content(format!("ASCII STL is not UTF-8: {e}")))?;
        parse_ascii(text)
    } else {
        parse_binary(bytes)
    }
}

fn stored_face_count(bytes: &[u8]) -> Option<usize> {
    let raw = bytes.get(HEADER_SIZE..HEADER_SIZE + 4)?;
    let count = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    usize::try_from(count).ok()
}

fn is_binary_stl(bytes: &[u8]) -> bool {
    stored_face_count(bytes)
        .and_then(|n| n.checked_mul(TRIANGLE_SIZE))
        .and_then(|n| n.checked_add(HEADER_SIZE + 4))
        .is_some_and(|expected| expected == bytes.len())
}

fn parse_binary(bytes: &[u8]) -> IoResult<IndexedMesh> {
    let face_count = stored_face_count(bytes).ok_or(IoError::Truncated {
        section: "STL header",
        expected: HEADER_SIZE + 4,
        got: bytes.len(),
    })?;
    let body = &bytes[HEADER_SIZE + 4..];
    let expected = face_count.saturating_mul(TRIANGLE_SIZE);
    if body.len() < expected {
        return Err(IoError::Truncated {
            section: "STL triangles",
            expected,
            got: body.len(),
        });
    }

    let mut indexer = SoupIndexer::with_capacity(face_count);
    for record in body.chunks_exact(TRIANGLE_SIZE).take(face_count) {
        // Skip the stored normal, it is recomputed from winding when needed
        indexer.triangle([
            read_point(&record[12..24]),
            read_point(&record[24..36]),
            read_point(&record[36..48]),
        ]);
    }
    Ok(indexer.finish())
}

fn read_point(buf: &[u8]) -> [f64; 3] {
    let f = |o: usize| f64::from(f32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]));
    [f(0), f(4), f(8)]
}

fn parse_ascii(text: &str) -> IoResult<IndexedMesh> {
    let mut indexer = SoupIndexer::with_capacity(text.len() / 200);
    let mut corners: Vec<[f64; 3]> = Vec::with_capacity(3);
    let mut in_loop = false;

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        match keyword.to_ascii_lowercase().as_str() {
            "outer" => {
                in_loop = true;
                corners.clear();
            }
            "vertex" if in_loop => {
                let mut coord = [0.0; 3];
                for c in &mut coord {
                    *c = parts
                        .next()
                        .ok_or_else(|| IoError::invalid_content("vertex line with fewer than 3 coordinates"))?
                        .parse()?;
                }
                corners.push(coord);
            }
            "endloop" => {
                in_loop = false;
                // Polygons with more than three corners are fanned
                for i in 1..corners.len().saturating_sub(1) {
                    indexer.triangle([corners[0], corners[i], corners[i + 1]]);
                }
            }
            "endsolid" => break,
            _ => {}
        }
    }
    Ok(indexer.finish())
}

/// Save a mesh to an STL file, binary or ASCII.
///
/// Face normals are computed from the winding. Degenerate faces get a zero
/// normal.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_stl<P: AsRef<Path>>(mesh: &IndexedMesh, path: P, binary: bool) -> IoResult<()> {
    let writer = BufWriter::new(File::create(path)?);
    if binary {
        write_binary(mesh, writer)
    } else {
        write_ascii(mesh, writer)
    }
}

fn write_binary<W: Write>(mesh: &IndexedMesh, mut writer: W) -> IoResult<()> {
    let mut header = [b' '; HEADER_SIZE];
    let text = b"binary STL written by helmet-fit mesh-io";
    header[..text.len()].copy_from_slice(text);
    writer.write_all(&header)?;

    let triangles: Vec<_> = mesh.triangles().collect();
    let count = u32::try_from(triangles.len())
        .map_err(|_| IoError::invalid_content("too many faces for binary STL"))?;
    writer.write_all(&count.to_le_bytes())?;

    for tri in &triangles {
        let n = tri.normal().unwrap_or_else(mesh_types::Vector3::zeros);
        write_f32_triple(&mut writer, [n.x, n.y, n.z])?;
        for p in tri.vertices() {
            write_f32_triple(&mut writer, [p.x, p.y, p.z])?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

fn write_f32_triple<W: Write>(writer: &mut W, v: [f64; 3]) -> IoResult<()> {
    for c in v {
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: STL stores single precision
        let c = c as f32;
        writer.write_all(&c.to_le_bytes())?;
    }
    Ok(())
}

fn write_ascii<W: Write>(mesh: &IndexedMesh, mut writer: W) -> IoResult<()> {
    writeln!(writer, "solid helmet")?;
    for tri in mesh.triangles() {
        let n = tri.normal().unwrap_or_else(mesh_types::Vector3::zeros);
        writeln!(writer, "  facet normal {:.6e} {:.6e} {:.6e}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for p in tri.vertices() {
            writeln!(writer, "      vertex {:.9e} {:.9e} {:.9e}", p.x, p.y, p.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid helmet")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::unnecessary_raw_string_hashes
)]
mod tests {
    use super::*;
    use mesh_types::unit_cube;

    #[test]
    fn roundtrip_binary_reindexes_soup() {
        let cube = unit_cube();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        save_stl(&cube, &path, true).unwrap();

        let size = std::fs::metadata(&path).unwrap().len();
        assert_eq!(size, 84 + 50 * 12);

        let loaded = load_stl(&path).unwrap();
        assert_eq!(loaded.face_count(), 12);
        assert_eq!(loaded.vertex_count(), 8);
        assert!((loaded.signed_volume() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn roundtrip_ascii() {
        let cube = unit_cube();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube_ascii.stl");
        save_stl(&cube, &path, false).unwrap();

        let loaded = load_stl(&path).unwrap();
        assert_eq!(loaded.face_count(), 12);
        assert_eq!(loaded.vertex_count(), 8);
    }

    #[test]
    fn binary_header_starting_with_solid() {
        let mut bytes = vec![b' '; HEADER_SIZE];
        bytes[..5].copy_from_slice(b"solid");
        bytes.extend_from_slice(&1u32.to_le_bytes());
        let mut record = vec![0u8; TRIANGLE_SIZE];
        record[24..28].copy_from_slice(&1.0f32.to_le_bytes());
        record[40..44].copy_from_slice(&1.0f32.to_le_bytes());
        bytes.extend_from_slice(&record);

        let mesh = parse_stl(&bytes).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn ascii_quad_is_fanned() {
        let text = br#"solid quad
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 1 1 0
      vertex 0 1 0
    endloop
  endfacet
endsolid quad"#;
        let mesh = parse_stl(text).unwrap();
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn truncated_binary_is_error() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 60]);
        assert!(matches!(parse_stl(&bytes), Err(IoError::Truncated { .. })));
    }

    #[test]
    fn load_nonexistent_file() {
        let result = load_stl("nonexistent_file_12345.stl");
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }
}
