//! STL (Stereolithography) encode and decode.
//!
//! # Binary Format
//!
//! ```text
//! UINT8[80]    – Header (ignored)
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Normal vector
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (0)
//! end
//! ```
//!
//! Decoding welds bit-identical corners, so a closed solid written as STL
//! comes back as a closed indexed mesh. A file with zero facets is valid in
//! both directions; rejecting empty geometry is the caller's decision.

use super::{ensure_indices, CodecError, CodecResult};
use crate::mesh::{face_normal, Mesh};
use std::io::Write;

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
const TRIANGLE_SIZE: usize = 50;

const HEADER_TEXT: &[u8] = b"Binary STL generated by step2mesh";

/// Decode STL bytes, detecting binary vs ASCII.
///
/// A file is binary when its length matches the triangle count in the
/// header exactly; many binary exporters start their header with "solid",
/// so the keyword alone is not trusted.
pub fn decode(bytes: &[u8]) -> CodecResult<Mesh> {
    if bytes.len() >= HEADER_SIZE + 4 {
        let count = u32::from_le_bytes([
            bytes[HEADER_SIZE],
            bytes[HEADER_SIZE + 1],
            bytes[HEADER_SIZE + 2],
            bytes[HEADER_SIZE + 3],
        ]) as usize;
        if HEADER_SIZE + 4 + count * TRIANGLE_SIZE == bytes.len() {
            return decode_binary(&bytes[HEADER_SIZE + 4..], count);
        }
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|e| CodecError::invalid(format!("not binary STL and not UTF-8 text: {e}")))?;
    if !text.trim_start().starts_with("solid") {
        return Err(CodecError::invalid(
            "not a binary STL and missing 'solid' keyword",
        ));
    }
    decode_ascii(text)
}

fn decode_binary(body: &[u8], count: usize) -> CodecResult<Mesh> {
    let triangles = body.chunks_exact(TRIANGLE_SIZE).take(count).map(|tri| {
        [
            read_vertex(&tri[12..24]),
            read_vertex(&tri[24..36]),
            read_vertex(&tri[36..48]),
        ]
    });
    Ok(Mesh::weld_triangles(triangles))
}

fn read_vertex(buf: &[u8]) -> [f64; 3] {
    let f = |i: usize| f32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
    [f64::from(f(0)), f64::from(f(4)), f64::from(f(8))]
}

fn decode_ascii(text: &str) -> CodecResult<Mesh> {
    let mut triangles: Vec<[[f64; 3]; 3]> = Vec::new();
    let mut corners: Vec<[f64; 3]> = Vec::with_capacity(3);
    let mut in_loop = false;

    for (line_no, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword.to_lowercase().as_str() {
            "outer" => {
                in_loop = true;
                corners.clear();
            }
            "vertex" if in_loop => {
                let mut coord = [0.0f64; 3];
                for c in coord.iter_mut() {
                    let token = parts.next().ok_or_else(|| {
                        CodecError::invalid(format!("line {}: vertex needs 3 coordinates", line_no + 1))
                    })?;
                    *c = token.parse().map_err(|e| {
                        CodecError::invalid(format!("line {}: bad coordinate '{token}': {e}", line_no + 1))
                    })?;
                }
                corners.push(coord);
            }
            "endloop" => in_loop = false,
            "endfacet" => {
                if corners.len() != 3 {
                    return Err(CodecError::invalid(format!(
                        "line {}: facet has {} vertices, expected 3",
                        line_no + 1,
                        corners.len()
                    )));
                }
                triangles.push([corners[0], corners[1], corners[2]]);
                corners.clear();
            }
            "endsolid" => break,
            _ => {}
        }
    }

    Ok(Mesh::weld_triangles(triangles))
}

/// Encode as binary STL.
pub fn encode_binary<W: Write>(mesh: &Mesh, writer: &mut W) -> CodecResult<()> {
    ensure_indices(mesh)?;
    let face_count = u32::try_from(mesh.faces.len())
        .map_err(|_| CodecError::TooLarge(format!("{} faces", mesh.faces.len())))?;

    let mut header = [b' '; HEADER_SIZE];
    header[..HEADER_TEXT.len()].copy_from_slice(HEADER_TEXT);
    writer.write_all(&header)?;
    writer.write_all(&face_count.to_le_bytes())?;

    for tri in mesh.triangles() {
        write_vec3(writer, face_normal(tri))?;
        for corner in tri {
            write_vec3(writer, corner)?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

fn write_vec3<W: Write>(writer: &mut W, v: [f64; 3]) -> CodecResult<()> {
    for c in v {
        writer.write_all(&(c as f32).to_le_bytes())?;
    }
    Ok(())
}

/// Encode as ASCII STL.
pub fn encode_ascii<W: Write>(mesh: &Mesh, writer: &mut W, name: &str) -> CodecResult<()> {
    ensure_indices(mesh)?;
    let name = if name.trim().is_empty() { "mesh" } else { name.trim() };

    writeln!(writer, "solid {name}")?;
    for tri in mesh.triangles() {
        let [nx, ny, nz] = face_normal(tri);
        writeln!(writer, "  facet normal {nx:e} {ny:e} {nz:e}")?;
        writeln!(writer, "    outer loop")?;
        for [x, y, z] in tri {
            writeln!(writer, "      vertex {x:e} {y:e} {z:e}")?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid {name}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::cuboid;

    #[test]
    fn binary_round_trip_keeps_counts() {
        let cube = cuboid([0.0; 3], [10.0; 3]);
        let mut buf = Vec::new();
        encode_binary(&cube, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 4 + 12 * TRIANGLE_SIZE);

        let back = decode(&buf).unwrap();
        assert_eq!(back.vertex_count(), 8);
        assert_eq!(back.face_count(), 12);
        assert!(back.is_watertight());
    }

    #[test]
    fn ascii_round_trip_keeps_counts() {
        let cube = cuboid([0.0; 3], [2.5; 3]);
        let mut buf = Vec::new();
        encode_ascii(&cube, &mut buf, "cube").unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("solid cube\n"));
        assert!(text.trim_end().ends_with("endsolid cube"));

        let back = decode(&buf).unwrap();
        assert_eq!(back.vertex_count(), 8);
        assert_eq!(back.face_count(), 12);
        assert!((back.signed_volume() - 2.5f64.powi(3)).abs() < 1e-9);
    }

    #[test]
    fn binary_header_starting_with_solid_is_still_binary() {
        let cube = cuboid([0.0; 3], [1.0; 3]);
        let mut buf = Vec::new();
        encode_binary(&cube, &mut buf).unwrap();
        buf[..5].copy_from_slice(b"solid");
        assert_eq!(decode(&buf).unwrap().face_count(), 12);
    }

    #[test]
    fn empty_mesh_survives_both_encodings() {
        let mut buf = Vec::new();
        encode_binary(&Mesh::new(), &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 4);
        assert!(decode(&buf).unwrap().is_empty());

        let mut buf = Vec::new();
        encode_ascii(&Mesh::new(), &mut buf, "").unwrap();
        assert!(decode(&buf).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let broken = Mesh::from_parts(vec![[0.0; 3]; 2], vec![[0, 1, 2]]);
        let mut buf = Vec::new();
        assert!(matches!(
            encode_binary(&broken, &mut buf),
            Err(CodecError::InvalidContent(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode(b"\x00\x01\x02 definitely not stl").is_err());
    }

    #[test]
    fn truncated_facet_is_rejected() {
        let text = "solid t\n facet normal 0 0 1\n outer loop\n vertex 0 0 0\n vertex 1 0 0\n endloop\n endfacet\nendsolid t\n";
        assert!(decode(text.as_bytes()).is_err());
    }
}
