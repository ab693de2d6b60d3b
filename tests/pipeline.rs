//! Integration tests for the conversion pipeline.
//!
//! The B-rep kernel is replaced by small fake tessellators so every stage
//! after tessellation runs for real: scratch handling, STL reload, encoders,
//! metrics, the sink and progress events.
//!
//! Run with:
//!   cargo test --test pipeline

use std::path::Path;
use std::sync::{Arc, Mutex};

use step2mesh::mesh::cuboid;
use step2mesh::{
    convert, convert_async, convert_batch, convert_file, convert_stream, convert_to_file, inspect,
    AssetRecord, ConversionConfig, ConversionProgressCallback, ConversionRequest, ConvertError,
    DfmAdvisory, MemorySink, Mesh, MeshFormat, MetadataSink, SinkError, SourceDocument, Stage,
    Tessellator, TessellateError, Tolerance,
};
use tokio_stream::StreamExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

const STEP_STUB: &[u8] = b"ISO-10303-21;\n\
HEADER;\n\
FILE_DESCRIPTION((''),'2;1');\n\
FILE_NAME('bracket','2024-03-01T10:00:00',(''),(''),'','FakeCAD 1.0','');\n\
FILE_SCHEMA(('AUTOMOTIVE_DESIGN { 1 0 10303 214 1 1 1 1 }'));\n\
ENDSEC;\n\
DATA;\n\
#1 = CARTESIAN_POINT('',(0.,0.,0.));\n\
ENDSEC;\n\
END-ISO-10303-21;\n";

/// Emits a fixed mesh regardless of the input, recording the tolerance it
/// was called with.
struct FixedTessellator {
    mesh: Mesh,
    seen: Mutex<Vec<Tolerance>>,
}

impl FixedTessellator {
    fn new(mesh: Mesh) -> Arc<Self> {
        Arc::new(Self {
            mesh,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Closed 10 mm cube.
    fn cube() -> Arc<Self> {
        Self::new(cuboid([0.0; 3], [10.0; 3]))
    }

    /// 10 mm cube with one triangle missing.
    fn gapped_cube() -> Arc<Self> {
        let mut mesh = cuboid([0.0; 3], [10.0; 3]);
        mesh.faces.pop();
        Self::new(mesh)
    }

    fn empty() -> Arc<Self> {
        Self::new(Mesh::new())
    }
}

impl Tessellator for FixedTessellator {
    fn name(&self) -> &str {
        "fixed"
    }

    fn tessellate(&self, _source: &Path, tolerance: &Tolerance) -> Result<Mesh, TessellateError> {
        self.seen.lock().unwrap().push(*tolerance);
        Ok(self.mesh.clone())
    }
}

struct FailingTessellator;

impl Tessellator for FailingTessellator {
    fn name(&self) -> &str {
        "failing"
    }

    fn tessellate(&self, _source: &Path, _tolerance: &Tolerance) -> Result<Mesh, TessellateError> {
        Err("unsupported entity ADVANCED_FACE #42".into())
    }
}

struct DownSink;

impl MetadataSink for DownSink {
    fn append(&self, _record: &AssetRecord) -> Result<(), SinkError> {
        Err(SinkError::Request("connection refused".into()))
    }
}

#[derive(Default)]
struct StageRecorder {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for StageRecorder {
    fn on_conversion_start(&self, source: &str, format: MeshFormat) {
        self.events.lock().unwrap().push(format!("start {source} {format}"));
    }

    fn on_stage_complete(&self, _source: &str, stage: Stage, _elapsed_ms: u64) {
        self.events.lock().unwrap().push(stage.to_string());
    }

    fn on_conversion_complete(&self, _source: &str, _output_bytes: usize) {
        self.events.lock().unwrap().push("complete".into());
    }

    fn on_conversion_error(&self, _source: &str, _error: &str) {
        self.events.lock().unwrap().push("error".into());
    }
}

fn request(name: &str, format: MeshFormat) -> ConversionRequest {
    ConversionRequest::new(SourceDocument::from_bytes(name, STEP_STUB.to_vec()), format)
}

fn config_with(tessellator: Arc<dyn Tessellator>, scratch: &Path) -> ConversionConfig {
    ConversionConfig::builder()
        .tessellator(tessellator)
        .scratch_dir(scratch)
        .build()
        .unwrap()
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[test]
fn cube_to_3mf_reports_one_cubic_centimetre() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());

    let result = convert(&request("bracket.step", MeshFormat::ThreeMf), &config).unwrap();

    assert_eq!(result.filename, "bracket.3mf");
    assert_eq!(result.content_type, "model/3mf");
    assert_eq!(result.format, MeshFormat::ThreeMf);
    assert!(result.bytes.starts_with(b"PK"));
    assert_eq!(result.metrics.vertex_count, 8);
    assert_eq!(result.metrics.face_count, 12);
    assert!((result.metrics.volume.cubic_centimeters() - 1.0).abs() < 1e-9);
    assert!(result.metrics.watertight);
    assert!(result.advisories.is_empty());
    assert_eq!(result.stats.output_bytes, result.bytes.len());
    assert!(result.stats.total_ms >= result.stats.tessellate_ms);
}

#[test]
fn counts_match_the_returned_mesh() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());

    for format in MeshFormat::ALL {
        let result = convert(&request("part.step", format), &config).unwrap();
        assert_eq!(result.metrics.vertex_count, result.mesh.vertex_count(), "{format}");
        assert_eq!(result.metrics.face_count, result.mesh.face_count(), "{format}");
        assert_eq!(result.filename, format!("part.{}", format.extension()));
        assert!(result.mesh.validate().is_ok());
    }
}

#[test]
fn native_binary_stl_is_passed_through() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());

    let result = convert(&request("part.step", MeshFormat::StlBinary), &config).unwrap();
    // 80-byte header + count + 50 bytes per triangle
    assert_eq!(result.bytes.len(), 84 + 50 * 12);
    assert_eq!(u32::from_le_bytes(result.bytes[80..84].try_into().unwrap()), 12);
}

#[test]
fn ascii_stl_is_emitted_by_the_tessellator() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());

    let result = convert(&request("part.step", MeshFormat::StlAscii), &config).unwrap();
    let text = String::from_utf8(result.bytes).unwrap();
    assert!(text.starts_with("solid"));
    assert_eq!(text.matches("facet normal").count(), 12);
    assert_eq!(result.filename, "part.stl");
    assert_eq!(result.metrics.face_count, 12);
}

#[test]
fn metrics_are_idempotent() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());
    let req = request("part.step", MeshFormat::Obj);

    let a = convert(&req, &config).unwrap();
    let b = convert(&req, &config).unwrap();
    assert_eq!(a.metrics, b.metrics);
    assert_eq!(a.advisories, b.advisories);
    assert_eq!(a.bytes, b.bytes);
}

#[test]
fn tolerance_reaches_the_tessellator() {
    let scratch = tempfile::tempdir().unwrap();
    let tess = FixedTessellator::cube();
    let config = config_with(tess.clone(), scratch.path());
    let tolerance = Tolerance::new(0.002, 0.25).unwrap();

    convert(&request("part.step", MeshFormat::Ply).with_tolerance(tolerance), &config).unwrap();
    assert_eq!(*tess.seen.lock().unwrap(), vec![tolerance]);
}

#[test]
fn thin_part_gets_an_advisory() {
    let scratch = tempfile::tempdir().unwrap();
    let tess = FixedTessellator::new(cuboid([0.0; 3], [20.0, 20.0, 0.5]));
    let config = ConversionConfig::builder()
        .tessellator(tess)
        .scratch_dir(scratch.path())
        .nozzle_diameter_mm(0.4)
        .build()
        .unwrap();

    let result = convert(&request("shim.step", MeshFormat::Glb), &config).unwrap();
    assert!(result.metrics.watertight);
    assert!(matches!(
        result.advisories.as_slice(),
        [DfmAdvisory::ThinExtent { size_mm, .. }] if (*size_mm - 0.5).abs() < 1e-9
    ));
}

// ── Degenerate geometry ──────────────────────────────────────────────────────

#[test]
fn gapped_solid_is_not_watertight_but_still_exports() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::gapped_cube(), scratch.path());

    let result = convert(&request("gap.step", MeshFormat::ThreeMf), &config).unwrap();
    assert!(!result.metrics.watertight);
    assert_eq!(result.metrics.face_count, 11);
    assert!(!result.bytes.is_empty());
    assert!(result.advisories.contains(&DfmAdvisory::NotWatertight));
}

#[test]
fn zero_faces_is_an_encoding_error() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::empty(), scratch.path());

    for format in [MeshFormat::StlBinary, MeshFormat::ThreeMf] {
        let err = convert(&request("empty.step", format), &config).unwrap_err();
        assert!(
            matches!(err, ConvertError::Encoding { format: f, .. } if f == format),
            "{format}: {err}"
        );
    }
    assert_eq!(entries(scratch.path()), 0);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[test]
fn malformed_bytes_fail_tessellation_and_leave_no_scratch() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());

    let cases: [(&str, Vec<u8>); 2] = [
        ("notes.step", b"this is not a step file".to_vec()),
        ("blank.step", Vec::new()),
    ];
    for (name, bytes) in cases {
        let req = ConversionRequest::new(SourceDocument::from_bytes(name, bytes), MeshFormat::Obj);
        let err = convert(&req, &config).unwrap_err();
        assert!(
            matches!(err, ConvertError::Tessellation { ref source_name, .. } if source_name == name),
            "{name}: {err}"
        );
        assert!(err.is_geometry_error());
        assert_eq!(entries(scratch.path()), 0, "{name}");
    }

    let req = ConversionRequest::new(SourceDocument::from_bytes("blank.step", Vec::new()), MeshFormat::Obj);
    match convert(&req, &config).unwrap_err() {
        ConvertError::Tessellation { detail, .. } => assert_eq!(detail, "source is empty"),
        other => panic!("expected Tessellation, got {other:?}"),
    }
}

#[test]
fn kernel_failure_carries_its_diagnostic() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(Arc::new(FailingTessellator), scratch.path());

    let err = convert(&request("bad.step", MeshFormat::Obj), &config).unwrap_err();
    match err {
        ConvertError::Tessellation { detail, .. } => assert!(detail.contains("ADVANCED_FACE #42")),
        other => panic!("expected Tessellation, got {other:?}"),
    }
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn scratch_is_released_after_success() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());

    convert(&request("a.step", MeshFormat::Amf), &config).unwrap();
    convert(&request("b.step", MeshFormat::StlAscii), &config).unwrap();
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn invalid_tolerance_is_rejected_before_tessellation() {
    let scratch = tempfile::tempdir().unwrap();
    let tess = FixedTessellator::cube();
    let config = config_with(tess.clone(), scratch.path());
    let req = request("a.step", MeshFormat::Obj).with_tolerance(Tolerance {
        linear: f64::NAN,
        angular: 0.1,
    });

    assert!(matches!(convert(&req, &config), Err(ConvertError::InvalidInput(_))));
    assert!(tess.seen.lock().unwrap().is_empty());
}

#[test]
fn missing_file_is_reported() {
    let err = convert_file(
        "/definitely/not/here.step",
        MeshFormat::Obj,
        &ConversionConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ConvertError::FileNotFound { .. }));
}

// ── Metadata sink ────────────────────────────────────────────────────────────

#[test]
fn sink_receives_one_record_per_conversion() {
    let scratch = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let config = ConversionConfig::builder()
        .tessellator(FixedTessellator::cube())
        .scratch_dir(scratch.path())
        .sink(sink.clone())
        .build()
        .unwrap();

    let req = request("bracket.step", MeshFormat::ThreeMf).with_material("PLA");
    convert(&req, &config).unwrap();

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.name, "bracket");
    assert_eq!(r.material.as_deref(), Some("PLA"));
    assert_eq!(r.format, MeshFormat::ThreeMf);
    assert_eq!(r.vertex_count, 8);
    assert_eq!(r.face_count, 12);
    assert!((r.volume_cm3 - 1.0).abs() < 1e-9);
    assert!(r.watertight);
}

#[test]
fn failed_conversion_records_nothing() {
    let scratch = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let config = ConversionConfig::builder()
        .tessellator(Arc::new(FailingTessellator))
        .scratch_dir(scratch.path())
        .sink(sink.clone())
        .build()
        .unwrap();

    assert!(convert(&request("bad.step", MeshFormat::Obj), &config).is_err());
    assert!(sink.records().is_empty());
}

#[test]
fn sink_failure_does_not_fail_the_conversion() {
    let scratch = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .tessellator(FixedTessellator::cube())
        .scratch_dir(scratch.path())
        .sink(Arc::new(DownSink))
        .build()
        .unwrap();

    let result = convert(&request("part.step", MeshFormat::Obj), &config).unwrap();
    assert_eq!(result.metrics.face_count, 12);
}

// ── Progress events ──────────────────────────────────────────────────────────

#[test]
fn progress_reports_every_stage_in_order() {
    let scratch = tempfile::tempdir().unwrap();
    let recorder = Arc::new(StageRecorder::default());
    let config = ConversionConfig::builder()
        .tessellator(FixedTessellator::cube())
        .scratch_dir(scratch.path())
        .sink(Arc::new(MemorySink::new()))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    convert(&request("part.step", MeshFormat::Obj), &config).unwrap();
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start part.step obj",
            "ingest",
            "tessellate",
            "encode",
            "measure",
            "persist",
            "complete"
        ]
    );
}

#[test]
fn progress_reports_errors_once() {
    let scratch = tempfile::tempdir().unwrap();
    let recorder = Arc::new(StageRecorder::default());
    let config = ConversionConfig::builder()
        .tessellator(Arc::new(FailingTessellator))
        .scratch_dir(scratch.path())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    convert(&request("part.step", MeshFormat::Obj), &config).unwrap_err();
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start part.step obj", "ingest", "error"]
    );
}

// ── File output ──────────────────────────────────────────────────────────────

#[test]
fn convert_to_file_writes_atomically() {
    let scratch = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());
    let target = out_dir.path().join("nested").join("part.obj");

    let stats = convert_to_file(&request("part.step", MeshFormat::Obj), &target, &config).unwrap();

    let written = std::fs::read(&target).unwrap();
    assert_eq!(written.len(), stats.output_bytes);
    assert!(String::from_utf8(written).unwrap().contains("\nf "));
    assert_eq!(entries(target.parent().unwrap()), 1);
}

#[test]
fn convert_file_reads_from_disk() {
    let scratch = tempfile::tempdir().unwrap();
    let input_dir = tempfile::tempdir().unwrap();
    let input = input_dir.path().join("flange.stp");
    std::fs::write(&input, STEP_STUB).unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());

    let result = convert_file(&input, MeshFormat::Glb, &config).unwrap();
    assert_eq!(result.filename, "flange.glb");
    assert!(result.bytes.starts_with(b"glTF"));
}

// ── Inspection ───────────────────────────────────────────────────────────────

#[test]
fn inspect_reads_the_header_without_tessellating() {
    let header = inspect(STEP_STUB).unwrap();
    assert_eq!(header.file_name.as_deref(), Some("bracket"));
    assert_eq!(header.originating_system.as_deref(), Some("FakeCAD 1.0"));
    assert_eq!(header.application_protocol(), Some("AP214"));
    assert_eq!(header.entity_count, 1);
}

// ── Async entry points ───────────────────────────────────────────────────────

#[tokio::test]
async fn convert_async_runs_off_the_runtime() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());

    let result = convert_async(request("part.step", MeshFormat::Ply), &config)
        .await
        .unwrap();
    assert_eq!(result.filename, "part.ply");
    assert!(result.bytes.starts_with(b"ply\n"));
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn batch_keeps_going_past_failures() {
    let scratch = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let config = ConversionConfig::builder()
        .tessellator(FixedTessellator::cube())
        .scratch_dir(scratch.path())
        .sink(sink.clone())
        .concurrency(2)
        .build()
        .unwrap();

    let requests = vec![
        request("a.step", MeshFormat::Obj),
        ConversionRequest::new(
            SourceDocument::from_bytes("junk.step", b"GIF89a".to_vec()),
            MeshFormat::Obj,
        ),
        request("c.step", MeshFormat::ThreeMf),
    ];

    let outcomes = convert_batch(requests, &config).await;
    assert_eq!(outcomes.len(), 3);
    assert_eq!(
        outcomes.iter().map(|o| o.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert!(outcomes[0].result.is_ok());
    assert!(matches!(
        outcomes[1].result,
        Err(ConvertError::Tessellation { .. })
    ));
    assert_eq!(outcomes[1].source_name, "junk.step");
    assert_eq!(outcomes[2].result.as_ref().unwrap().filename, "c.3mf");

    assert_eq!(sink.records().len(), 2);
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn stream_yields_every_request() {
    let scratch = tempfile::tempdir().unwrap();
    let config = config_with(FixedTessellator::cube(), scratch.path());
    let requests = (0..5)
        .map(|i| request(&format!("part{i}.step"), MeshFormat::StlBinary))
        .collect::<Vec<_>>();

    let mut stream = convert_stream(requests, &config);
    let mut seen = Vec::new();
    while let Some(outcome) = stream.next().await {
        assert!(outcome.result.is_ok());
        seen.push(outcome.index);
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}
