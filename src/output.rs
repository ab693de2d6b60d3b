//! Output types returned by the conversion entry points.

use crate::format::MeshFormat;
use crate::mesh::Mesh;
use crate::pipeline::measure::{DfmAdvisory, MetricSnapshot};
use serde::{Deserialize, Serialize};

/// A finished conversion.
///
/// Serialising a result yields its report (name, format, metrics,
/// advisories, timings); the file bytes and the mesh are skipped.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    /// Encoded file content.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub format: MeshFormat,
    /// Suggested download name: `{source stem}.{extension}`.
    pub filename: String,
    pub content_type: &'static str,
    /// Canonical mesh the metrics were computed from.
    #[serde(skip)]
    pub mesh: Mesh,
    pub metrics: MetricSnapshot,
    pub advisories: Vec<DfmAdvisory>,
    pub stats: ConversionStats,
}

/// Timing and size statistics for one conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Tessellation plus STL reload.
    pub tessellate_ms: u64,
    /// Transcoding; near zero for native STL output.
    pub encode_ms: u64,
    pub total_ms: u64,
    pub output_bytes: usize,
}
