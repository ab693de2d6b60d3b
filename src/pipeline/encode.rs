//! Transcoding: canonical mesh → bytes of the requested format.
//!
//! STL normally never reaches this stage (the tessellator writes it
//! directly), but both STL variants are handled so callers can re-encode an
//! existing mesh. Everything is encoded into memory: results are returned as
//! bytes, not files.

use crate::codec::{amf, glb, obj, ply, stl, threemf, CodecError};
use crate::error::ConvertError;
use crate::format::MeshFormat;
use crate::mesh::Mesh;
use crate::units::LengthUnit;
use std::io::Cursor;
use tracing::debug;

/// Encode `mesh` as `format`.
///
/// `name` labels the object inside formats that carry one (OBJ, GLB, 3MF,
/// AMF, ASCII STL). `unit` is written into formats that declare a unit
/// (3MF, AMF). Failures map to [`ConvertError::Encoding`].
pub fn transcode(
    mesh: &Mesh,
    format: MeshFormat,
    name: &str,
    unit: LengthUnit,
) -> Result<Vec<u8>, ConvertError> {
    let mut buf = Vec::new();
    let result = match format {
        MeshFormat::StlBinary => stl::encode_binary(mesh, &mut buf),
        MeshFormat::StlAscii => stl::encode_ascii(mesh, &mut buf, name),
        MeshFormat::Obj => obj::encode(mesh, &mut buf, name),
        MeshFormat::Glb => glb::encode(mesh, &mut buf, name),
        MeshFormat::Ply => ply::encode(mesh, &mut buf),
        MeshFormat::Amf => amf::encode(mesh, &mut buf, name, unit),
        MeshFormat::ThreeMf => {
            let mut cursor = Cursor::new(&mut buf);
            threemf::encode(mesh, &mut cursor, name, unit)
        }
    };
    result.map_err(|e| encoding_error(format, e))?;

    debug!("Encoded {} faces as {} → {} bytes", mesh.face_count(), format, buf.len());
    Ok(buf)
}

fn encoding_error(format: MeshFormat, e: CodecError) -> ConvertError {
    ConvertError::Encoding {
        format,
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::cuboid;

    #[test]
    fn every_format_encodes_a_cube() {
        let cube = cuboid([0.0; 3], [10.0; 3]);
        for format in MeshFormat::ALL {
            let bytes = transcode(&cube, format, "cube", LengthUnit::Millimeter).unwrap();
            assert!(!bytes.is_empty(), "{format} produced no bytes");
        }
    }

    #[test]
    fn magic_bytes_match_format() {
        let cube = cuboid([0.0; 3], [1.0; 3]);
        let enc = |f| transcode(&cube, f, "c", LengthUnit::Millimeter).unwrap();
        assert_eq!(&enc(MeshFormat::Glb)[..4], b"glTF");
        assert_eq!(&enc(MeshFormat::ThreeMf)[..2], b"PK");
        assert!(enc(MeshFormat::Ply).starts_with(b"ply\n"));
        assert!(enc(MeshFormat::StlAscii).starts_with(b"solid c"));
        assert!(enc(MeshFormat::Amf).starts_with(b"<?xml"));
    }

    #[test]
    fn empty_mesh_maps_to_encoding_error() {
        let err = transcode(&Mesh::new(), MeshFormat::ThreeMf, "x", LengthUnit::Millimeter)
            .unwrap_err();
        match err {
            ConvertError::Encoding { format, detail } => {
                assert_eq!(format, MeshFormat::ThreeMf);
                assert!(detail.contains("no faces"), "got: {detail}");
            }
            other => panic!("expected Encoding, got {other:?}"),
        }
    }
}
