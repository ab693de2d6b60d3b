//! Error types for the step2mesh library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`]: **Fatal**: the conversion cannot produce a result
//!   (unparseable STEP data, an encoder rejected the mesh, scratch space
//!   could not be created). Returned as `Err(ConvertError)` from the
//!   top-level `convert*` functions. No partial result is ever returned.
//!
//! * [`SinkError`]: **Never fatal**: the optional metadata store could not
//!   record the asset. The pipeline logs it and carries on; it is exposed
//!   only to callers that talk to a [`crate::sink::MetadataSink`] directly.

use crate::format::MeshFormat;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the step2mesh library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request itself is unusable (empty source, bad tolerance).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input file was not found at the given path.
    #[error("STEP file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    // ── Geometry errors ───────────────────────────────────────────────────
    /// The source could not be parsed as a boundary representation, or the
    /// solid is degenerate. The user has to supply a different file.
    #[error("Tessellation failed for '{source_name}': {detail}\nThe file is corrupt, uses unsupported entities, or contains no solid geometry.")]
    Tessellation { source_name: String, detail: String },

    /// The mesh is valid but the target encoder rejected it.
    #[error("Encoding to {format} failed: {detail}\nTry a different output format.")]
    Encoding { format: MeshFormat, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Scratch space could not be created, written or read.
    #[error("Scratch storage error: {context}: {source}")]
    Scratch {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output mesh file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub(crate) fn scratch(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Scratch {
            context: context.into(),
            source,
        }
    }

    /// `true` for the two user-facing geometry failures.
    pub fn is_geometry_error(&self) -> bool {
        matches!(self, Self::Tessellation { .. } | Self::Encoding { .. })
    }
}

/// Failure to record an asset in the metadata store.
///
/// Persistence is best-effort: the pipeline logs these at `warn` and never
/// surfaces them to the end user.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Credentials or endpoint are missing.
    #[error("Metadata sink is not configured: {0}")]
    NotConfigured(String),

    /// The store could not be reached.
    #[error("Metadata sink unreachable: {0}")]
    Request(String),

    /// The store answered with a non-success status.
    #[error("Metadata sink rejected the record (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tessellation_display_carries_diagnostic() {
        let e = ConvertError::Tessellation {
            source_name: "bracket.step".into(),
            detail: "unexpected token at line 12".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("bracket.step"), "got: {msg}");
        assert!(msg.contains("unexpected token at line 12"), "got: {msg}");
        assert!(e.is_geometry_error());
    }

    #[test]
    fn encoding_display_names_format() {
        let e = ConvertError::Encoding {
            format: MeshFormat::ThreeMf,
            detail: "mesh has no faces".into(),
        };
        assert!(e.to_string().contains("3mf"));
        assert!(e.to_string().contains("no faces"));
    }

    #[test]
    fn scratch_error_is_not_geometry() {
        let e = ConvertError::scratch(
            "create scratch dir",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!e.is_geometry_error());
        assert!(e.to_string().contains("create scratch dir"));
    }

    #[test]
    fn sink_rejected_display() {
        let e = SinkError::Rejected {
            status: 401,
            body: "invalid api key".into(),
        };
        assert!(e.to_string().contains("401"));
        assert!(e.to_string().contains("invalid api key"));
    }
}
