//! Configuration types for STEP-to-mesh conversion.
//!
//! Everything that stays the same across conversions lives in
//! [`ConversionConfig`], built via its [`ConversionConfigBuilder`]. What
//! changes per upload (the file, the target format, the tolerance, the
//! material tag) lives in a [`ConversionRequest`].
//!
//! A config is cheap to clone: the tessellator, sink and progress callback
//! are shared behind `Arc`s, so one config can serve every request of a
//! batch.

use crate::error::ConvertError;
use crate::format::MeshFormat;
use crate::pipeline::input::SourceDocument;
use crate::pipeline::tessellate::{Tessellator, Tolerance, TruckTessellator};
use crate::progress::ProgressCallback;
use crate::sink::MetadataSink;
use crate::units::LengthUnit;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Smallest accepted nozzle diameter in millimetres.
pub const MIN_NOZZLE_MM: f64 = 0.2;
/// Largest accepted nozzle diameter in millimetres.
pub const MAX_NOZZLE_MM: f64 = 1.2;

/// Configuration shared by conversions.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use step2mesh::{ConversionConfig, LengthUnit};
///
/// let config = ConversionConfig::builder()
///     .model_unit(LengthUnit::Inch)
///     .nozzle_diameter_mm(0.6)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// B-rep kernel. Default: [`TruckTessellator`].
    pub tessellator: Arc<dyn Tessellator>,

    /// Optional metadata store. `None` skips persistence.
    pub sink: Option<Arc<dyn MetadataSink>>,

    /// Unit the STEP coordinates are in. Default: millimetres.
    ///
    /// Tessellation output carries no unit, so metrics rely on this to report
    /// millimetres and cubic centimetres.
    pub model_unit: LengthUnit,

    /// FDM nozzle diameter used for thin-feature advisories. Range: 0.2–1.2.
    /// Default: 0.4.
    pub nozzle_diameter_mm: f64,

    /// Directory under which per-call scratch directories are created.
    /// `None` uses the system temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Conversions in flight at once in [`crate::stream::convert_stream`].
    /// Default: 4.
    ///
    /// Tessellation is CPU-bound, so values above the core count only add
    /// memory pressure.
    pub concurrency: usize,

    /// Receives per-stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            tessellator: Arc::new(TruckTessellator),
            sink: None,
            model_unit: LengthUnit::default(),
            nozzle_diameter_mm: 0.4,
            scratch_dir: None,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("tessellator", &self.tessellator.name())
            .field("sink", &self.sink.as_ref().map(|_| "<dyn MetadataSink>"))
            .field("model_unit", &self.model_unit)
            .field("nozzle_diameter_mm", &self.nozzle_diameter_mm)
            .field("scratch_dir", &self.scratch_dir)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn tessellator(mut self, tessellator: Arc<dyn Tessellator>) -> Self {
        self.config.tessellator = tessellator;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn MetadataSink>) -> Self {
        self.config.sink = Some(sink);
        self
    }

    /// Set or clear the sink, e.g. with the result of
    /// [`crate::sink::RestMetadataSink::from_env`].
    pub fn maybe_sink(mut self, sink: Option<Arc<dyn MetadataSink>>) -> Self {
        self.config.sink = sink;
        self
    }

    pub fn model_unit(mut self, unit: LengthUnit) -> Self {
        self.config.model_unit = unit;
        self
    }

    pub fn nozzle_diameter_mm(mut self, mm: f64) -> Self {
        // NaN passes through clamp and is rejected by build()
        self.config.nozzle_diameter_mm = mm.clamp(MIN_NOZZLE_MM, MAX_NOZZLE_MM);
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if !(MIN_NOZZLE_MM..=MAX_NOZZLE_MM).contains(&c.nozzle_diameter_mm) {
            return Err(ConvertError::InvalidConfig(format!(
                "Nozzle diameter must be {MIN_NOZZLE_MM}–{MAX_NOZZLE_MM} mm, got {}",
                c.nozzle_diameter_mm
            )));
        }
        if c.concurrency == 0 {
            return Err(ConvertError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if let Some(dir) = &c.scratch_dir {
            if !dir.is_dir() {
                return Err(ConvertError::InvalidConfig(format!(
                    "Scratch directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Per-call request ─────────────────────────────────────────────────────

/// One conversion: which document, into what, at what tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub source: SourceDocument,
    pub format: MeshFormat,
    pub tolerance: Tolerance,
    /// Free-form material tag recorded with the asset (e.g. "PLA").
    pub material: Option<String>,
}

impl ConversionRequest {
    /// Request with the default tolerance and no material.
    pub fn new(source: SourceDocument, format: MeshFormat) -> Self {
        Self {
            source,
            format,
            tolerance: Tolerance::default(),
            material: None,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        let material = material.into();
        self.material = (!material.trim().is_empty()).then_some(material);
        self
    }

    /// Check everything that can be checked without touching geometry.
    pub fn validate(&self) -> Result<(), ConvertError> {
        self.tolerance.validate()?;
        if self.source.is_empty() {
            return Err(ConvertError::Tessellation {
                source_name: self.source.name.clone(),
                detail: "source is empty".into(),
            });
        }
        Ok(())
    }
}
