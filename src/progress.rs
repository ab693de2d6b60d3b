//! Progress-callback trait for per-stage conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves a document through its stages.
//!
//! Every event carries the source name, so one callback can follow several
//! documents converted concurrently by [`crate::stream::convert_stream`].
//!
//! # Example
//!
//! ```rust
//! use step2mesh::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter {
//!     finished: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for StageCounter {
//!     fn on_stage_complete(&self, source: &str, stage: Stage, elapsed_ms: u64) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{source}: {stage} took {elapsed_ms} ms");
//!     }
//! }
//!
//! let counter = Arc::new(StageCounter { finished: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::format::MeshFormat;
use std::fmt;
use std::sync::Arc;

/// Pipeline stage reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Scratch space is created and the source written into it.
    Ingest,
    /// The tessellator emits STL and the pipeline reloads it.
    Tessellate,
    /// The mesh is transcoded (or the native STL is taken as is).
    Encode,
    /// Metrics and advisories are computed.
    Measure,
    /// The asset record is appended to the metadata sink.
    Persist,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Tessellate => "tessellate",
            Stage::Encode => "encode",
            Stage::Measure => "measure",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the conversion pipeline as it processes a document.
///
/// Implementations must be `Send + Sync`: conversions run on blocking
/// threads and a batch may drive several at once. All methods have default
/// no-op implementations so callers only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any stage runs.
    fn on_conversion_start(&self, source: &str, format: MeshFormat) {
        let _ = (source, format);
    }

    fn on_stage_start(&self, source: &str, stage: Stage) {
        let _ = (source, stage);
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, source: &str, stage: Stage, elapsed_ms: u64) {
        let _ = (source, stage, elapsed_ms);
    }

    /// Called once when the result is ready.
    ///
    /// # Arguments
    /// * `output_bytes`: size of the encoded file
    fn on_conversion_complete(&self, source: &str, output_bytes: usize) {
        let _ = (source, output_bytes);
    }

    /// Called once when the conversion fails; no further events follow.
    fn on_conversion_error(&self, source: &str, error: &str) {
        let _ = (source, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
