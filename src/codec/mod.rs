//! Mesh file encoders.
//!
//! Each submodule turns a validated [`crate::mesh::Mesh`] into the bytes of
//! one file format. Encoders write into any `std::io::Write`, so the pipeline
//! can target an in-memory buffer while tests can inspect the output
//! directly. STL also has a decoder: the tessellator hands its result over
//! as an STL file, and the pipeline reloads it into the canonical mesh.
//!
//! | Module      | Format            | Notes                              |
//! |-------------|-------------------|------------------------------------|
//! | [`stl`]     | STL binary/ASCII  | decode + encode, vertex welding    |
//! | [`obj`]     | Wavefront OBJ     | 1-based indices                    |
//! | [`ply`]     | PLY               | binary little-endian               |
//! | [`glb`]     | glTF 2.0 binary   | JSON chunk via `serde_json`        |
//! | [`threemf`] | 3MF               | zip container + `quick-xml` model  |
//! | [`amf`]     | AMF               | plain XML via `quick-xml`          |

pub mod amf;
pub mod glb;
pub mod obj;
pub mod ply;
pub mod stl;
pub mod threemf;

use thiserror::Error;

/// Result type for encoders and decoders.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding a mesh file.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The mesh has no faces; no format can represent it meaningfully.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// Mesh is too large for the format's index or size fields.
    #[error("mesh too large for format: {0}")]
    TooLarge(String),

    /// Invalid file content (parse error).
    #[error("invalid file content: {0}")]
    InvalidContent(String),

    /// Container or XML writer failure.
    #[error("writer error: {0}")]
    Writer(String),

    /// I/O error from the underlying writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidContent(message.into())
    }

    pub(crate) fn writer(e: impl std::fmt::Display) -> Self {
        Self::Writer(e.to_string())
    }
}

/// Reject meshes no encoder can represent.
pub(crate) fn ensure_encodable(mesh: &crate::mesh::Mesh) -> CodecResult<()> {
    if mesh.faces.is_empty() {
        return Err(CodecError::EmptyMesh);
    }
    ensure_indices(mesh)
}

/// Index check only. STL can carry zero facets, so its writers use this.
pub(crate) fn ensure_indices(mesh: &crate::mesh::Mesh) -> CodecResult<()> {
    mesh.validate()
        .map_err(|e| CodecError::invalid(e.to_string()))
}
