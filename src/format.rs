//! Output mesh formats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every format a conversion can produce.
///
/// The two STL variants are written directly by the tessellator; every other
/// format is transcoded from the canonical mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeshFormat {
    /// Binary STL. (default)
    #[default]
    #[serde(rename = "stl")]
    StlBinary,
    /// ASCII STL.
    StlAscii,
    /// Wavefront OBJ.
    Obj,
    /// Binary glTF 2.0.
    Glb,
    /// 3D Manufacturing Format (zip + XML).
    #[serde(rename = "3mf")]
    ThreeMf,
    /// Binary little-endian PLY.
    Ply,
    /// Additive Manufacturing File Format (XML).
    Amf,
}

impl MeshFormat {
    /// All formats, in the order the CLI lists them.
    pub const ALL: [MeshFormat; 7] = [
        MeshFormat::StlBinary,
        MeshFormat::StlAscii,
        MeshFormat::Obj,
        MeshFormat::Glb,
        MeshFormat::ThreeMf,
        MeshFormat::Ply,
        MeshFormat::Amf,
    ];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            MeshFormat::StlBinary | MeshFormat::StlAscii => "stl",
            MeshFormat::Obj => "obj",
            MeshFormat::Glb => "glb",
            MeshFormat::ThreeMf => "3mf",
            MeshFormat::Ply => "ply",
            MeshFormat::Amf => "amf",
        }
    }

    /// MIME type for download responses.
    pub fn content_type(self) -> &'static str {
        match self {
            MeshFormat::StlBinary | MeshFormat::StlAscii => "model/stl",
            MeshFormat::Obj => "model/obj",
            MeshFormat::Glb => "model/gltf-binary",
            MeshFormat::ThreeMf => "model/3mf",
            MeshFormat::Ply => "application/octet-stream",
            MeshFormat::Amf => "application/x-amf",
        }
    }

    /// `true` when the tessellator can emit this format without re-encoding.
    pub fn is_native(self) -> bool {
        matches!(self, MeshFormat::StlBinary | MeshFormat::StlAscii)
    }

    /// Suggested download name: source stem plus this format's extension.
    pub fn output_filename(self, stem: &str) -> String {
        let stem = if stem.is_empty() { "model" } else { stem };
        format!("{}.{}", stem, self.extension())
    }

    /// Short identifier accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            MeshFormat::StlBinary => "stl",
            MeshFormat::StlAscii => "stl-ascii",
            MeshFormat::Obj => "obj",
            MeshFormat::Glb => "glb",
            MeshFormat::ThreeMf => "3mf",
            MeshFormat::Ply => "ply",
            MeshFormat::Amf => "amf",
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised format name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat(pub String);

impl fmt::Display for UnknownFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown mesh format '{}' (expected one of: stl, stl-ascii, obj, glb, 3mf, ply, amf)",
            self.0
        )
    }
}

impl std::error::Error for UnknownFormat {}

impl FromStr for MeshFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "stl" | "stl-binary" => Ok(MeshFormat::StlBinary),
            "stl-ascii" | "ascii-stl" => Ok(MeshFormat::StlAscii),
            "obj" => Ok(MeshFormat::Obj),
            "glb" => Ok(MeshFormat::Glb),
            "3mf" => Ok(MeshFormat::ThreeMf),
            "ply" => Ok(MeshFormat::Ply),
            "amf" => Ok(MeshFormat::Amf),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}
