//! PLY (Polygon File Format) encoder, binary little-endian.
//!
//! The header is described and written with `ply-rs`. The element payload is
//! packed directly after it: the `ply-rs` binary writer emits the element
//! count where a list length belongs.

use super::{ensure_encodable, CodecError, CodecResult};
use crate::mesh::Mesh;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Header, PropertyDef, PropertyType, ScalarType,
};
use ply_rs::writer::Writer;
use std::io::Write;

const COMMENT: &str = "Generated by step2mesh";

fn header(mesh: &Mesh) -> Header {
    let mut header = Header::new();
    header.encoding = Encoding::BinaryLittleEndian;
    header.comments.push(COMMENT.to_string());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for axis in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            axis.to_string(),
            PropertyType::Scalar(ScalarType::Float),
        ));
    }
    vertex_def.count = mesh.vertices.len();
    header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    face_def.count = mesh.faces.len();
    header.elements.add(face_def);

    header
}

pub fn encode<W: Write>(mesh: &Mesh, writer: &mut W) -> CodecResult<()> {
    ensure_encodable(mesh)?;
    if mesh.vertices.len() > i32::MAX as usize {
        return Err(CodecError::TooLarge(format!(
            "{} vertices exceed PLY int indices",
            mesh.vertices.len()
        )));
    }

    Writer::<DefaultElement>::new().write_header(writer, &header(mesh))?;

    for v in &mesh.vertices {
        for c in v {
            writer.write_all(&(*c as f32).to_le_bytes())?;
        }
    }
    for face in &mesh.faces {
        writer.write_all(&[3u8])?;
        for &i in face {
            writer.write_all(&(i as i32).to_le_bytes())?;
        }
    }
    Ok(())
}
