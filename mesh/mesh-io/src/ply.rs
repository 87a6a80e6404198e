//! PLY (Polygon File Format) support.
//!
//! Reading goes through `ply-rs` and accepts ASCII, binary little-endian and
//! binary big-endian files. Polygon faces are fan-triangulated. A per-vertex
//! `scalar` (or `intensity`) property is carried into
//! [`VertexAttributes::scalar`](mesh_types::VertexAttributes).
//!
//! Binary output is written by hand: the `ply-rs` binary writer encodes
//! list lengths incorrectly.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use mesh_types::{IndexedMesh, Vertex};
use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use tracing::debug;

use crate::error::{IoError, IoResult};
use crate::open_file;

/// Load a mesh from a PLY file.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The header or payload is malformed
/// - A face references a vertex that does not exist
pub fn load_ply<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let mut reader = BufReader::new(open_file(path)?);

    let parser = Parser::<DefaultElement>::new();
    let header = parser
        .read_header(&mut reader)
        .map_err(|e| IoError::invalid_content(format!("failed to parse PLY header: {e}")))?;
    let payload = parser
        .read_payload(&mut reader, &header)
        .map_err(|e| IoError::invalid_content(format!("failed to read PLY payload: {e}")))?;

    let mut mesh = IndexedMesh::new();
    if let Some(elements) = payload.get("vertex") {
        mesh.vertices.reserve(elements.len());
        for element in elements {
            let coord = |key: &str| {
                scalar_property(element, key)
                    .ok_or_else(|| IoError::invalid_content(format!("vertex missing '{key}'")))
            };
            let mut vertex = Vertex::from_coords(coord("x")?, coord("y")?, coord("z")?);
            #[allow(clippy::cast_possible_truncation)]
            // Truncation: attribute scalars are stored as f32
            {
                vertex.attributes.scalar = scalar_property(element, "scalar")
                    .or_else(|| scalar_property(element, "intensity"))
                    .map(|s| s as f32);
            }
            mesh.vertices.push(vertex);
        }
    }

    let vertex_count = mesh.vertices.len();
    if let Some(elements) = payload.get("face") {
        mesh.faces.reserve(elements.len());
        for (face, element) in elements.iter().enumerate() {
            let indices = index_list(element);
            if let Some(&bad) = indices.iter().find(|&&i| i >= vertex_count as u64) {
                return Err(IoError::IndexOutOfRange {
                    face,
                    index: bad,
                    vertex_count,
                });
            }
            #[allow(clippy::cast_possible_truncation)]
            // Truncation: indices were bounds-checked against a u32-sized vertex array
            for i in 1..indices.len().saturating_sub(1) {
                mesh.faces.push([
                    indices[0] as u32,
                    indices[i] as u32,
                    indices[i + 1] as u32,
                ]);
            }
        }
    }

    debug!(
        path = %path.display(),
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "Loaded PLY"
    );
    Ok(mesh)
}

/// Numeric scalar property as f64, whatever its stored width.
fn scalar_property(element: &DefaultElement, key: &str) -> Option<f64> {
    Some(match element.get(key)? {
        Property::Float(v) => f64::from(*v),
        Property::Double(v) => *v,
        Property::Char(v) => f64::from(*v),
        Property::UChar(v) => f64::from(*v),
        Property::Short(v) => f64::from(*v),
        Property::UShort(v) => f64::from(*v),
        Property::Int(v) => f64::from(*v),
        Property::UInt(v) => f64::from(*v),
        _ => return None,
    })
}

/// Face index list under either of the common property names.
///
/// Negative indices map to `u64::MAX` so they fail the bounds check.
fn index_list(element: &DefaultElement) -> Vec<u64> {
    let signed = |v: i64| u64::try_from(v).unwrap_or(u64::MAX);
    for key in ["vertex_indices", "vertex_index"] {
        let Some(prop) = element.get(key) else {
            continue;
        };
        return match prop {
            Property::ListInt(v) => v.iter().map(|&i| signed(i64::from(i))).collect(),
            Property::ListUInt(v) => v.iter().map(|&i| u64::from(i)).collect(),
            Property::ListShort(v) => v.iter().map(|&i| signed(i64::from(i))).collect(),
            Property::ListUShort(v) => v.iter().map(|&i| u64::from(i)).collect(),
            Property::ListChar(v) => v.iter().map(|&i| signed(i64::from(i))).collect(),
            Property::ListUChar(v) => v.iter().map(|&i| u64::from(i)).collect(),
            _ => continue,
        };
    }
    Vec::new()
}

/// Save a mesh to a PLY file.
///
/// `binary` selects binary little-endian, otherwise ASCII.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_ply<P: AsRef<Path>>(mesh: &IndexedMesh, path: P, binary: bool) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    if binary {
        write_binary(mesh, &mut writer)?;
    } else {
        write_ascii(mesh, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_binary<W: Write>(mesh: &IndexedMesh, writer: &mut W) -> IoResult<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format binary_little_endian 1.0")?;
    writeln!(writer, "comment written by helmet-fit mesh-io")?;
    writeln!(writer, "element vertex {}", mesh.vertices.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "element face {}", mesh.faces.len())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    for v in &mesh.vertices {
        for c in [v.position.x, v.position.y, v.position.z] {
            #[allow(clippy::cast_possible_truncation)]
            // Truncation: binary PLY output is single precision
            let c = c as f32;
            writer.write_all(&c.to_le_bytes())?;
        }
    }
    for face in &mesh.faces {
        writer.write_all(&[3u8])?;
        for &i in face {
            #[allow(clippy::cast_possible_wrap)]
            // Wrap: indices are below i32::MAX for any mesh that fits in memory
            let i = i as i32;
            writer.write_all(&i.to_le_bytes())?;
        }
    }
    Ok(())
}

fn write_ascii<W: Write>(mesh: &IndexedMesh, writer: &mut W) -> IoResult<()> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    ply.header
        .comments
        .push("written by helmet-fit mesh-io".to_string());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for axis in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            axis.to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }
    vertex_def.count = mesh.vertices.len();
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::UInt),
    ));
    face_def.count = mesh.faces.len();
    ply.header.elements.add(face_def);

    let vertices = mesh
        .vertices
        .iter()
        .map(|v| {
            let mut element = DefaultElement::new();
            element.insert("x".to_string(), Property::Double(v.position.x));
            element.insert("y".to_string(), Property::Double(v.position.y));
            element.insert("z".to_string(), Property::Double(v.position.z));
            element
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);

    let faces = mesh
        .faces
        .iter()
        .map(|f| {
            let mut element = DefaultElement::new();
            element.insert("vertex_indices".to_string(), Property::ListUInt(f.to_vec()));
            element
        })
        .collect();
    ply.payload.insert("face".to_string(), faces);

    Writer::new()
        .write_ply(writer, &mut ply)
        .map_err(|e| IoError::invalid_content(format!("failed to write PLY: {e}")))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use mesh_types::{cuboid, MeshTopology, Point3};

    fn sample() -> IndexedMesh {
        cuboid(Point3::new(-1.5, 0.25, 2.0), Point3::new(3.0, 4.0, 5.5))
    }

    #[test]
    fn roundtrip_binary() {
        let original = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.ply");
        save_ply(&original, &path, true).unwrap();

        let loaded = load_ply(&path).unwrap();
        assert_eq!(loaded.vertex_count(), original.vertex_count());
        assert_eq!(loaded.faces, original.faces);
        for (a, b) in original.vertices.iter().zip(&loaded.vertices) {
            assert!((a.position - b.position).norm() < 1e-5);
        }
    }

    #[test]
    fn roundtrip_ascii_is_exact() {
        let original = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box_ascii.ply");
        save_ply(&original, &path, false).unwrap();

        let loaded = load_ply(&path).unwrap();
        assert_eq!(loaded.faces, original.faces);
        assert_eq!(loaded.vertices[7].position, original.vertices[7].position);
    }

    #[test]
    fn quad_faces_are_fanned_and_scalars_kept() {
        let text = "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\nproperty float z\nproperty float scalar\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0 1\n1 0 0 2\n1 1 0 3\n0 1 0 4\n4 0 1 2 3\n";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.ply");
        std::fs::write(&path, text).unwrap();

        let mesh = load_ply(&path).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.vertices[2].attributes.scalar, Some(3.0));
    }

    #[test]
    fn out_of_range_index_is_error() {
        let text = "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 7\n";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ply");
        std::fs::write(&path, text).unwrap();

        let err = load_ply(&path).unwrap_err();
        assert!(matches!(err, IoError::IndexOutOfRange { index: 7, .. }));
    }

    #[test]
    fn load_nonexistent_file() {
        assert!(matches!(
            load_ply("nonexistent_file_12345.ply"),
            Err(IoError::FileNotFound { .. })
        ));
    }
}
