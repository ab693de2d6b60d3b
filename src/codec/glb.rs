//! Binary glTF 2.0 (GLB) encoder.
//!
//! ```text
//! header   magic "glTF" | version 2 | total length
//! chunk 0  JSON  scene / mesh / accessor description (space padded)
//! chunk 1  BIN   f32 positions followed by u32 indices (zero padded)
//! ```
//!
//! Coordinates are written as they come out of the tessellator; no axis swap
//! or unit scaling is applied.

use super::{ensure_encodable, CodecError, CodecResult};
use crate::mesh::Mesh;
use serde_json::json;
use std::io::Write;

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

pub fn encode<W: Write>(mesh: &Mesh, writer: &mut W, name: &str) -> CodecResult<()> {
    ensure_encodable(mesh)?;

    let mut bin: Vec<u8> = Vec::with_capacity(mesh.vertices.len() * 12 + mesh.faces.len() * 12);
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for v in &mesh.vertices {
        for axis in 0..3 {
            let c = v[axis] as f32;
            min[axis] = min[axis].min(c);
            max[axis] = max[axis].max(c);
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    let positions_len = bin.len();
    for face in &mesh.faces {
        for &i in face {
            bin.extend_from_slice(&i.to_le_bytes());
        }
    }
    let indices_len = bin.len() - positions_len;
    pad_to_four(&mut bin, 0);

    let document = json!({
        "asset": { "version": "2.0", "generator": "step2mesh" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "mesh": 0, "name": name } ],
        "meshes": [ {
            "name": name,
            "primitives": [ {
                "attributes": { "POSITION": 0 },
                "indices": 1,
                "mode": MODE_TRIANGLES
            } ]
        } ],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": COMPONENT_FLOAT,
                "count": mesh.vertices.len(),
                "type": "VEC3",
                "min": min,
                "max": max
            },
            {
                "bufferView": 1,
                "componentType": COMPONENT_UNSIGNED_INT,
                "count": mesh.faces.len() * 3,
                "type": "SCALAR"
            }
        ],
        "bufferViews": [
            {
                "buffer": 0,
                "byteOffset": 0,
                "byteLength": positions_len,
                "target": TARGET_ARRAY_BUFFER
            },
            {
                "buffer": 0,
                "byteOffset": positions_len,
                "byteLength": indices_len,
                "target": TARGET_ELEMENT_ARRAY_BUFFER
            }
        ],
        "buffers": [ { "byteLength": bin.len() } ]
    });

    let mut json_bytes = serde_json::to_vec(&document).map_err(CodecError::writer)?;
    pad_to_four(&mut json_bytes, b' ');

    let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
    let total = u32::try_from(total)
        .map_err(|_| CodecError::TooLarge(format!("GLB of {total} bytes exceeds 4 GiB")))?;

    writer.write_all(&GLB_MAGIC.to_le_bytes())?;
    writer.write_all(&GLB_VERSION.to_le_bytes())?;
    writer.write_all(&total.to_le_bytes())?;

    writer.write_all(&(json_bytes.len() as u32).to_le_bytes())?;
    writer.write_all(&CHUNK_JSON.to_le_bytes())?;
    writer.write_all(&json_bytes)?;

    writer.write_all(&(bin.len() as u32).to_le_bytes())?;
    writer.write_all(&CHUNK_BIN.to_le_bytes())?;
    writer.write_all(&bin)?;
    Ok(())
}

fn pad_to_four(buf: &mut Vec<u8>, fill: u8) {
    while buf.len() % 4 != 0 {
        buf.push(fill);
    }
}
