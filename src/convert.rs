//! Conversion entry points.
//!
//! [`convert`] is the core: one request in, one [`ConversionResult`] out,
//! blocking the calling thread. Everything else wraps it:
//!
//! | Function            | Adds                                          |
//! |---------------------|-----------------------------------------------|
//! | [`convert_file`]    | reads the source from disk                    |
//! | [`convert_to_file`] | atomic write of the output (temp + rename)    |
//! | [`convert_async`]   | runs on tokio's blocking pool                 |
//! | [`inspect`]         | header only, no tessellation                  |
//!
//! Batches go through [`crate::stream::convert_stream`].

use crate::codec::stl;
use crate::config::{ConversionConfig, ConversionRequest};
use crate::error::ConvertError;
use crate::format::MeshFormat;
use crate::output::{ConversionResult, ConversionStats};
use crate::pipeline::encode;
use crate::pipeline::header::{self, StepHeader};
use crate::pipeline::input::{ScratchSpace, SourceDocument};
use crate::pipeline::measure::{self, MetricSnapshot};
use crate::pipeline::tessellate::{StlEncoding, StlJob};
use crate::progress::{ProgressCallback, Stage};
use crate::sink::{self, AssetRecord};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

const SOURCE_FILE: &str = "input.step";
const STL_FILE: &str = "output.stl";

/// Convert one STEP document.
///
/// Blocks while tessellating; from async code use [`convert_async`].
///
/// # Errors
/// - [`ConvertError::InvalidInput`]: invalid tolerance
/// - [`ConvertError::Tessellation`]: not STEP data, or the kernel failed
/// - [`ConvertError::Encoding`]: zero faces, or the encoder rejected the mesh
/// - [`ConvertError::Scratch`]: scratch space could not be used
///
/// A failing metadata sink is never an error. No partial result is returned.
pub fn convert(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConvertError> {
    let name = request.source.name.as_str();
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(name, request.format);
    }

    let result = run_pipeline(request, config);

    match &result {
        Ok(output) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_complete(name, output.bytes.len());
            }
        }
        Err(e) => {
            warn!("Conversion of '{}' failed: {}", name, e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_error(name, &e.to_string());
            }
        }
    }
    result
}

fn run_pipeline(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConvertError> {
    let total_start = Instant::now();
    let source = &request.source;
    let format = request.format;
    let stem = match source.stem() {
        "" => "model",
        s => s,
    };
    info!("Starting conversion: {} → {}", source.name, format);

    // ── Step 1: Validate ─────────────────────────────────────────────────
    request.validate()?;
    if !source.has_step_magic() {
        return Err(ConvertError::Tessellation {
            source_name: source.name.clone(),
            detail: "missing ISO-10303-21 signature; not a STEP Part 21 file".to_string(),
        });
    }

    // ── Step 2: Scratch space ────────────────────────────────────────────
    let timer = StageTimer::start(config, &source.name, Stage::Ingest);
    let scratch = ScratchSpace::create(config.scratch_dir.as_deref())?;
    let source_path = scratch.write(SOURCE_FILE, &source.bytes)?;
    timer.finish();

    // ── Step 3: Tessellate to STL ────────────────────────────────────────
    let timer = StageTimer::start(config, &source.name, Stage::Tessellate);
    let stl_path = scratch.file(STL_FILE);
    let job = StlJob {
        source: &source_path,
        dest: &stl_path,
        tolerance: request.tolerance,
        encoding: match format {
            MeshFormat::StlAscii => StlEncoding::Ascii,
            _ => StlEncoding::Binary,
        },
        solid_name: stem,
    };
    config
        .tessellator
        .write_stl(&job)
        .map_err(|e| ConvertError::Tessellation {
            source_name: source.name.clone(),
            detail: e.to_string(),
        })?;

    // ── Step 4: Reload canonical mesh ────────────────────────────────────
    let stl_bytes = scratch.read(STL_FILE)?;
    drop(scratch);

    let mesh = stl::decode(&stl_bytes).map_err(|e| ConvertError::Tessellation {
        source_name: source.name.clone(),
        detail: format!("{} tessellator wrote unreadable STL: {e}", config.tessellator.name()),
    })?;
    mesh.validate().map_err(|e| ConvertError::Encoding {
        format,
        detail: e.to_string(),
    })?;
    if mesh.is_empty() {
        return Err(ConvertError::Encoding {
            format,
            detail: "tessellation produced zero faces".to_string(),
        });
    }
    let tessellate_ms = timer.finish();
    debug!(
        "Tessellated '{}': {} vertices, {} faces",
        source.name,
        mesh.vertex_count(),
        mesh.face_count()
    );

    // ── Step 5: Native output or transcode ───────────────────────────────
    let timer = StageTimer::start(config, &source.name, Stage::Encode);
    let bytes = if format.is_native() {
        stl_bytes
    } else {
        encode::transcode(&mesh, format, stem, config.model_unit)?
    };
    let encode_ms = timer.finish();

    // ── Step 6: Metrics ──────────────────────────────────────────────────
    let timer = StageTimer::start(config, &source.name, Stage::Measure);
    let metrics = MetricSnapshot::measure(&mesh, config.model_unit);
    let advisories = measure::advise(&metrics, config.nozzle_diameter_mm);
    timer.finish();

    // ── Step 7: Best-effort persistence ──────────────────────────────────
    if let Some(ref target) = config.sink {
        let timer = StageTimer::start(config, &source.name, Stage::Persist);
        let record = AssetRecord {
            name: stem.to_string(),
            material: request.material.clone(),
            format,
            vertex_count: metrics.vertex_count,
            face_count: metrics.face_count,
            volume_cm3: metrics.volume.cubic_centimeters(),
            watertight: metrics.watertight,
        };
        sink::persist(target.as_ref(), &record);
        timer.finish();
    }

    // ── Step 8: Result ───────────────────────────────────────────────────
    let stats = ConversionStats {
        tessellate_ms,
        encode_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
        output_bytes: bytes.len(),
    };

    info!(
        "Conversion complete: {} → {} ({} faces, {}, watertight: {}) in {}ms",
        source.name,
        format.output_filename(stem),
        metrics.face_count,
        metrics.volume,
        metrics.watertight,
        stats.total_ms
    );

    Ok(ConversionResult {
        bytes,
        format,
        filename: format.output_filename(stem),
        content_type: format.content_type(),
        mesh,
        metrics,
        advisories,
        stats,
    })
}

/// Convert a STEP file on disk with the default tolerance.
pub fn convert_file(
    path: impl AsRef<Path>,
    format: MeshFormat,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConvertError> {
    let source = SourceDocument::from_path(path)?;
    convert(&ConversionRequest::new(source, format), config)
}

/// Convert and write the output directly to a file.
///
/// Uses atomic write (temp file + rename) so readers never see a partial
/// mesh file.
pub fn convert_to_file(
    request: &ConversionRequest,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, ConvertError> {
    let output = convert(request, config)?;
    let path = output_path.as_ref();
    let write_err = |e| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", output.format.extension()));
    std::fs::write(&tmp_path, &output.bytes).map_err(write_err)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(write_err(e));
    }

    debug!("Wrote {} bytes to {}", output.bytes.len(), path.display());
    Ok(output.stats)
}

/// Run [`convert`] on tokio's blocking thread pool.
///
/// Tessellation is CPU-bound and synchronous; this keeps it off the async
/// worker threads. The config is cloned (cheap: `Arc`s inside).
pub async fn convert_async(
    request: ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConvertError> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || convert(&request, &config))
        .await
        .map_err(|e| ConvertError::Internal(format!("Conversion task panicked: {}", e)))?
}

/// Read the STEP header without tessellating.
pub fn inspect(bytes: &[u8]) -> Result<StepHeader, ConvertError> {
    header::parse_header(bytes)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Times one stage and reports it to the progress callback.
struct StageTimer<'a> {
    callback: Option<&'a ProgressCallback>,
    source: &'a str,
    stage: Stage,
    started: Instant,
}

impl<'a> StageTimer<'a> {
    fn start(config: &'a ConversionConfig, source: &'a str, stage: Stage) -> Self {
        let callback = config.progress_callback.as_ref();
        if let Some(cb) = callback {
            cb.on_stage_start(source, stage);
        }
        Self {
            callback,
            source,
            stage,
            started: Instant::now(),
        }
    }

    /// Report completion and return the elapsed milliseconds.
    fn finish(self) -> u64 {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        debug!("Stage {} for '{}' took {}ms", self.stage, self.source, elapsed_ms);
        if let Some(cb) = self.callback {
            cb.on_stage_complete(self.source, self.stage, elapsed_ms);
        }
        elapsed_ms
    }
}
