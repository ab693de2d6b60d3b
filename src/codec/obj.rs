//! Wavefront OBJ encoder.

use super::{ensure_encodable, CodecResult};
use crate::mesh::Mesh;
use std::io::Write;

/// Encode as OBJ with one object named `name`. Indices are 1-based.
pub fn encode<W: Write>(mesh: &Mesh, writer: &mut W, name: &str) -> CodecResult<()> {
    ensure_encodable(mesh)?;

    writeln!(writer, "# step2mesh")?;
    writeln!(writer, "# {} vertices, {} faces", mesh.vertex_count(), mesh.face_count())?;
    writeln!(writer, "o {}", if name.is_empty() { "mesh" } else { name })?;
    for [x, y, z] in &mesh.vertices {
        writeln!(writer, "v {x} {y} {z}")?;
    }
    for [a, b, c] in &mesh.faces {
        writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    Ok(())
}
