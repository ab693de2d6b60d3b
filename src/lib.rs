//! # step2mesh
//!
//! Convert STEP solid models to triangle meshes and report what came out.
//!
//! ## Why this crate?
//!
//! Printers, slicers and web viewers want triangles; CAD tools hand out
//! boundary representations. This crate tessellates a STEP upload once,
//! writes it in the format the user asked for, and measures the very mesh it
//! returns: vertex and face counts, volume in cm³, watertightness and a few
//! printability hints.
//!
//! ## Pipeline Overview
//!
//! ```text
//! STEP bytes
//!  │
//!  ├─ 1. Input       validate, write into a private scratch directory
//!  ├─ 2. Tessellate  B-rep → STL in scratch (truck, or any Tessellator)
//!  ├─ 3. Reload      STL → canonical indexed mesh (vertex welding)
//!  ├─ 4. Encode      native STL bytes, or transcode to OBJ/GLB/3MF/PLY/AMF
//!  ├─ 5. Measure     counts, volume, surface, bounds, watertight, advisories
//!  ├─ 6. Persist     optional, best-effort metadata sink append
//!  └─ 7. Output      bytes + filename + content type + metrics
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use step2mesh::{convert, ConversionConfig, ConversionRequest, MeshFormat, SourceDocument};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = SourceDocument::from_path("bracket.step")?;
//!     let request = ConversionRequest::new(source, MeshFormat::ThreeMf).with_material("PLA");
//!     let result = convert(&request, &ConversionConfig::default())?;
//!
//!     std::fs::write(&result.filename, &result.bytes)?;
//!     eprintln!(
//!         "{} faces, {}, watertight: {}",
//!         result.metrics.face_count, result.metrics.volume, result.metrics.watertight
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `step2mesh` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! step2mesh = { version = "0.1", default-features = false }
//! ```
//!
//! ## Output Formats
//!
//! | Format      | Extension | Content type               | Produced by      |
//! |-------------|-----------|----------------------------|------------------|
//! | `stl`       | `.stl`    | `model/stl`                | tessellator      |
//! | `stl-ascii` | `.stl`    | `model/stl`                | tessellator      |
//! | `obj`       | `.obj`    | `model/obj`                | [`codec::obj`]   |
//! | `glb`       | `.glb`    | `model/gltf-binary`        | [`codec::glb`]   |
//! | `3mf`       | `.3mf`    | `model/3mf`                | [`codec::threemf`] |
//! | `ply`       | `.ply`    | `application/octet-stream` | [`codec::ply`]   |
//! | `amf`       | `.amf`    | `application/x-amf`        | [`codec::amf`]   |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod mesh;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod sink;
pub mod stream;
pub mod units;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ConversionRequest};
pub use convert::{convert, convert_async, convert_file, convert_to_file, inspect};
pub use error::{ConvertError, SinkError};
pub use format::MeshFormat;
pub use mesh::Mesh;
pub use output::{ConversionResult, ConversionStats};
pub use pipeline::header::StepHeader;
pub use pipeline::input::SourceDocument;
pub use pipeline::measure::{Axis, BoundingBox, DfmAdvisory, MetricSnapshot};
pub use pipeline::tessellate::{
    StlEncoding, StlJob, TessellateError, Tessellator, Tolerance, TruckTessellator,
};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use sink::{AssetRecord, MemorySink, MetadataSink, RestMetadataSink};
pub use stream::{convert_batch, convert_stream, BatchOutcome, ConversionStream};
pub use units::{LengthUnit, Volume};
