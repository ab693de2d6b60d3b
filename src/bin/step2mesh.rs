//! CLI binary for step2mesh.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` / `ConversionRequest` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use step2mesh::{
    convert_stream, inspect, ConversionConfig, ConversionProgressCallback, ConversionRequest,
    ConversionResult, LengthUnit, MeshFormat, MetadataSink, ProgressCallback, RestMetadataSink,
    SourceDocument, Stage, StepHeader, Tolerance,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar counting finished documents, with the
/// current stage of the most recently active document as its message.
/// Documents may finish out of order in batch mode.
struct CliProgressCallback {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = if total > 1 {
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:32.green/238}] {pos:>3}/{len} files  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
        } else {
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
        };

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style.tick_strings(TICKS));
        bar.set_prefix("Converting");
        bar.set_message("Preparing…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed: AtomicUsize::new(0),
        })
    }

    fn finish(&self, total: usize) {
        self.bar.finish_and_clear();
        let failed = self.failed.load(Ordering::SeqCst);
        let ok = total.saturating_sub(failed);
        if failed == 0 {
            eprintln!(
                "{} {} converted successfully",
                green("✔"),
                bold(&plural(ok, "file"))
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if failed == total { red("✘") } else { yellow("⚠") },
                bold(&ok.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, source: &str, stage: Stage) {
        self.bar.set_message(format!("{source}  {}", dim(stage.as_str())));
    }

    fn on_conversion_complete(&self, source: &str, output_bytes: usize) {
        self.bar.println(format!(
            "  {} {:<32}  {}",
            green("✓"),
            source,
            dim(&human_bytes(output_bytes)),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_error(&self, source: &str, error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar
            .println(format!("  {} {:<32}  {}", red("✗"), source, red(&msg)));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Binary STL next to the input (bracket.stl)
  step2mesh bracket.step

  # 3MF for a slicer, tagged with a material
  step2mesh --format 3mf --material PETG bracket.step -o out/bracket.3mf

  # Finer tessellation
  step2mesh --tolerance 0.002 --format glb housing.stp

  # Model authored in inches
  step2mesh --unit in --format obj fixture.step

  # Batch: every input converted into one directory, 8 at a time
  step2mesh -c 8 --format ply parts/*.step -o meshes/

  # Header only (no tessellation)
  step2mesh --inspect bracket.step

  # Machine-readable report
  step2mesh --json --format amf bracket.step > report.json

FORMATS:
  Name        Extension  Content type
  ─────────   ─────────  ────────────────────────
  stl         .stl       model/stl              (binary, default)
  stl-ascii   .stl       model/stl
  obj         .obj       model/obj
  glb         .glb       model/gltf-binary
  3mf         .3mf       model/3mf
  ply         .ply       application/octet-stream
  amf         .amf       application/x-amf

METRICS:
  Volume is reported in cm³ and assumes the model unit given by --unit.
  Watertight means every edge is shared by exactly two triangles.
  Thin-extent advisories fire below two nozzle widths (--nozzle).

ENVIRONMENT VARIABLES:
  STEP2MESH_SINK_URL      Base URL of a PostgREST-style metadata store
  STEP2MESH_SINK_KEY      API key for the metadata store
  STEP2MESH_SINK_TABLE    Target table (default: assets)

  When URL and key are set, one asset record is appended per successful
  conversion. Store failures are logged and never fail a conversion.
"#;

/// Convert STEP solid models to triangle meshes.
#[derive(Parser, Debug)]
#[command(
    name = "step2mesh",
    version,
    about = "Convert STEP solid models to triangle meshes",
    long_about = "Tessellate STEP (ISO 10303-21) solid models into triangle meshes and write \
them as STL, OBJ, GLB, 3MF, PLY or AMF. Reports vertex and face counts, volume, \
watertightness and printability advisories for every converted file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// STEP files to convert.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Output format: stl, stl-ascii, obj, glb, 3mf, ply, amf.
    #[arg(short, long, env = "STEP2MESH_FORMAT", default_value = "stl")]
    format: MeshFormat,

    /// Output file (one input) or directory (several inputs).
    /// Default: next to each input.
    #[arg(short, long, env = "STEP2MESH_OUTPUT")]
    output: Option<PathBuf>,

    /// Linear tessellation tolerance in model units.
    #[arg(long, env = "STEP2MESH_TOLERANCE", default_value_t = 0.01)]
    tolerance: f64,

    /// Angular tessellation tolerance in radians.
    #[arg(long, env = "STEP2MESH_ANGULAR_TOLERANCE", default_value_t = 0.1)]
    angular_tolerance: f64,

    /// Unit of the model coordinates: mm, cm, m, in.
    #[arg(long, env = "STEP2MESH_UNIT", default_value = "mm")]
    unit: LengthUnit,

    /// FDM nozzle diameter in mm for thin-feature advisories (0.2–1.2).
    #[arg(long, env = "STEP2MESH_NOZZLE", default_value_t = 0.4)]
    nozzle: f64,

    /// Material tag recorded with each asset (e.g. PLA).
    #[arg(long, env = "STEP2MESH_MATERIAL")]
    material: Option<String>,

    /// Directory for per-conversion scratch space. Default: system temp dir.
    #[arg(long, env = "STEP2MESH_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Number of files converted at once.
    #[arg(short, long, env = "STEP2MESH_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Print the STEP header only, no conversion.
    #[arg(long)]
    inspect: bool,

    /// Print a JSON report instead of text.
    #[arg(long, env = "STEP2MESH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "STEP2MESH_NO_PROGRESS")]
    no_progress: bool,

    /// Skip the metadata store even when configured.
    #[arg(long, env = "STEP2MESH_NO_SINK")]
    no_sink: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STEP2MESH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STEP2MESH_QUIET")]
    quiet: bool,
}

/// JSON report line for one input.
#[derive(Serialize)]
struct FileReport<'a> {
    input: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ConversionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides the feedback that matters; library INFO
    // logs would only interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect {
        return run_inspect(&cli).await;
    }

    // ── Build config and requests ────────────────────────────────────────
    let total = cli.inputs.len();
    let progress = show_progress.then(|| CliProgressCallback::new(total));
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )?;
    let requests = build_requests(&cli).await?;
    let destinations = requests
        .iter()
        .zip(&cli.inputs)
        .map(|(req, input)| destination(&cli, input, req))
        .collect::<Vec<_>>();

    if total > 1 {
        if let Some(ref dir) = cli.output {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        }
    }

    // ── Run conversions ──────────────────────────────────────────────────
    let mut outcomes = Vec::with_capacity(total);
    let mut stream = convert_stream(requests, &config);
    while let Some(outcome) = stream.next().await {
        let written = match outcome.result {
            Ok(ref result) => {
                let dest = &destinations[outcome.index];
                write_output(dest, &result.bytes).await.map(|_| dest)
            }
            Err(ref e) => Err(anyhow::anyhow!("{e}")),
        };
        outcomes.push((outcome, written.cloned()));
    }
    outcomes.sort_by_key(|(o, _)| o.index);

    if let Some(ref cb) = progress {
        cb.finish(total);
    }

    // ── Report ───────────────────────────────────────────────────────────
    let mut failed = 0;
    if cli.json {
        let reports = outcomes
            .iter()
            .map(|(o, written)| FileReport {
                input: &cli.inputs[o.index],
                output: written.as_ref().ok().map(PathBuf::as_path),
                result: o.result.as_ref().ok(),
                error: written.as_ref().err().map(|e| format!("{e:#}")),
            })
            .collect::<Vec<_>>();
        failed = reports.iter().filter(|r| r.error.is_some()).count();
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise report")?
        );
    } else {
        for (outcome, written) in &outcomes {
            match (&outcome.result, written) {
                (Ok(result), Ok(path)) => {
                    if !cli.quiet {
                        print_summary(result, path);
                    }
                }
                (result, written) => {
                    failed += 1;
                    // the progress bar already printed conversion errors
                    if !show_progress || result.is_ok() {
                        if let Err(e) = written {
                            eprintln!("{} {}: {e:#}", red("✗"), outcome.source_name);
                        }
                    }
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} conversions failed");
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .model_unit(cli.unit)
        .nozzle_diameter_mm(cli.nozzle)
        .concurrency(cli.concurrency);

    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_dir(dir);
    }
    if !cli.no_sink {
        let sink = RestMetadataSink::from_env().map(|s| {
            tracing::debug!("Metadata sink enabled: {}", s.endpoint());
            Arc::new(s) as Arc<dyn MetadataSink>
        });
        builder = builder.maybe_sink(sink);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Read every input and attach the per-request settings.
async fn build_requests(cli: &Cli) -> Result<Vec<ConversionRequest>> {
    let tolerance =
        Tolerance::new(cli.tolerance, cli.angular_tolerance).context("Invalid tolerance")?;

    let mut requests = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let source = read_source(input).await?;
        let mut request = ConversionRequest::new(source, cli.format).with_tolerance(tolerance);
        if let Some(ref material) = cli.material {
            request = request.with_material(material.as_str());
        }
        requests.push(request);
    }
    Ok(requests)
}

async fn read_source(input: &Path) -> Result<SourceDocument> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    Ok(SourceDocument::from_bytes(name, bytes))
}

/// Where the converted file for `input` goes.
fn destination(cli: &Cli, input: &Path, request: &ConversionRequest) -> PathBuf {
    let stem = match request.source.stem() {
        "" => "model",
        s => s,
    };
    let filename = cli.format.output_filename(stem);
    match (&cli.output, cli.inputs.len()) {
        (Some(path), 1) if !path.is_dir() => path.clone(),
        (Some(dir), _) => dir.join(filename),
        (None, _) => input
            .parent()
            .map(|p| p.join(&filename))
            .unwrap_or_else(|| PathBuf::from(&filename)),
    }
}

/// Atomic write: temp file + rename.
async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("Failed to write {}", path.display()));
    }
    Ok(())
}

fn print_summary(result: &ConversionResult, path: &Path) {
    let m = &result.metrics;
    eprintln!(
        "{}  {}  →  {}  {}",
        cyan("◆"),
        result.format,
        bold(&path.display().to_string()),
        dim(&format!(
            "{}, {}ms",
            human_bytes(result.stats.output_bytes),
            result.stats.total_ms
        )),
    );
    eprintln!(
        "   {} vertices  /  {} faces  /  {}  /  {:.1} × {:.1} × {:.1} mm  /  watertight: {}",
        m.vertex_count,
        m.face_count,
        m.volume,
        m.bounds.x_mm,
        m.bounds.y_mm,
        m.bounds.z_mm,
        if m.watertight { green("yes") } else { red("no") },
    );
    for advisory in &result.advisories {
        eprintln!("   {} {}", yellow("⚠"), advisory);
    }
}

async fn run_inspect(cli: &Cli) -> Result<()> {
    let mut headers: Vec<(&Path, StepHeader)> = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let bytes = tokio::fs::read(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let header = inspect(&bytes)
            .with_context(|| format!("Failed to inspect {}", input.display()))?;
        headers.push((input.as_path(), header));
    }

    if cli.json {
        #[derive(Serialize)]
        struct InspectReport<'a> {
            input: &'a Path,
            #[serde(flatten)]
            header: &'a StepHeader,
            application_protocol: Option<&'static str>,
        }
        let reports = headers
            .iter()
            .map(|(input, header)| InspectReport {
                input,
                header,
                application_protocol: header.application_protocol(),
            })
            .collect::<Vec<_>>();
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialize header")?
        );
        return Ok(());
    }

    for (input, header) in &headers {
        println!("File:         {}", input.display());
        if let Some(ref n) = header.file_name {
            println!("Name:         {}", n);
        }
        if let Some(ref s) = header.schema {
            match header.application_protocol() {
                Some(ap) => println!("Schema:       {} ({})", s, ap),
                None => println!("Schema:       {}", s),
            }
        }
        if let Some(ref o) = header.originating_system {
            println!("System:       {}", o);
        }
        if let Some(ref t) = header.timestamp {
            println!("Timestamp:    {}", t);
        }
        println!("Entities:     {}", header.entity_count);
        if headers.len() > 1 {
            println!();
        }
    }
    Ok(())
}

fn human_bytes(n: usize) -> String {
    match n {
        n if n >= 1 << 20 => format!("{:.1} MiB", n as f64 / (1 << 20) as f64),
        n if n >= 1 << 10 => format!("{:.1} KiB", n as f64 / (1 << 10) as f64),
        n => format!("{n} B"),
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}
