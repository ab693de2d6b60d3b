//! Tessellation: STEP boundary representation to triangles.
//!
//! The B-rep kernel sits behind the [`Tessellator`] trait so the pipeline can
//! be driven by a different kernel, or by a fake in tests. The default
//! [`TruckTessellator`] uses `truck-stepio` to read the Part 21 data and
//! `truck-meshalgo` to triangulate every shell it finds.
//!
//! Tessellators work on files. The pipeline writes the upload into scratch,
//! asks the tessellator to emit STL next to it, and reloads that STL as the
//! canonical mesh, so the metrics describe exactly what the user downloads.

use crate::codec::stl;
use crate::error::ConvertError;
use crate::mesh::Mesh;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};
use truck_meshalgo::prelude::*;
use truck_stepio::r#in::Table;

/// Error type returned by tessellator implementations.
///
/// The pipeline wraps it into [`ConvertError::Tessellation`] with the
/// source name attached.
pub type TessellateError = Box<dyn std::error::Error + Send + Sync>;

/// Chordal and angular deviation bounds for tessellation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Maximum distance between the surface and a triangle, in model units.
    pub linear: f64,
    /// Maximum angle between adjacent facet normals, in radians.
    pub angular: f64,
}

impl Tolerance {
    pub const DEFAULT_LINEAR: f64 = 0.01;
    pub const DEFAULT_ANGULAR: f64 = 0.1;

    /// Build a tolerance, rejecting non-finite or non-positive values.
    pub fn new(linear: f64, angular: f64) -> Result<Self, ConvertError> {
        let tolerance = Self { linear, angular };
        tolerance.validate()?;
        Ok(tolerance)
    }

    pub fn validate(&self) -> Result<(), ConvertError> {
        for (label, value) in [("linear", self.linear), ("angular", self.angular)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConvertError::InvalidInput(format!(
                    "{label} tolerance must be a finite number > 0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            linear: Self::DEFAULT_LINEAR,
            angular: Self::DEFAULT_ANGULAR,
        }
    }
}

/// STL flavour the tessellator should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StlEncoding {
    #[default]
    Binary,
    Ascii,
}

/// One STL emission job inside a scratch directory.
#[derive(Debug, Clone, Copy)]
pub struct StlJob<'a> {
    /// STEP file to read.
    pub source: &'a Path,
    /// STL file to create.
    pub dest: &'a Path,
    pub tolerance: Tolerance,
    pub encoding: StlEncoding,
    /// Solid name for ASCII output.
    pub solid_name: &'a str,
}

/// A B-rep kernel able to turn a STEP file into triangles.
///
/// Implementations must be `Send + Sync`: one instance is shared by every
/// conversion, including concurrent ones from
/// [`crate::stream::convert_stream`].
pub trait Tessellator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Tessellate the STEP file at `source`.
    ///
    /// A file that parses but holds no faces yields an empty mesh, not an
    /// error; the pipeline decides what an empty mesh means.
    fn tessellate(&self, source: &Path, tolerance: &Tolerance) -> Result<Mesh, TessellateError>;

    /// Write the tessellation of `job.source` to `job.dest` as STL.
    ///
    /// The default encodes [`Tessellator::tessellate`] output with the
    /// crate's STL writer. Kernels with their own exporter can override it.
    fn write_stl(&self, job: &StlJob<'_>) -> Result<(), TessellateError> {
        let mesh = self.tessellate(job.source, &job.tolerance)?;
        let mut writer = BufWriter::new(File::create(job.dest)?);
        match job.encoding {
            StlEncoding::Binary => stl::encode_binary(&mesh, &mut writer)?,
            StlEncoding::Ascii => stl::encode_ascii(&mesh, &mut writer, job.solid_name)?,
        }
        writer.flush()?;
        Ok(())
    }
}

/// Default tessellator backed by the truck CAD kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruckTessellator;

impl Tessellator for TruckTessellator {
    fn name(&self) -> &str {
        "truck"
    }

    fn tessellate(&self, source: &Path, tolerance: &Tolerance) -> Result<Mesh, TessellateError> {
        let text = std::fs::read_to_string(source)?;

        let exchange = truck_stepio::r#in::ruststep::parser::parse(&text)
            .map_err(|e| format!("failed to parse STEP data: {e}"))?;
        let data = exchange
            .data
            .first()
            .ok_or("STEP file contains no DATA section")?;
        let table = Table::from_data_section(data);

        // truck bounds chordal deviation only
        debug!(
            linear = tolerance.linear,
            angular = tolerance.angular,
            "truck tessellation ignores the angular bound"
        );

        let mut entries: Vec<_> = table.shell.iter().collect();
        entries.sort_by_key(|(id, _)| *id);
        let shells = entries.into_iter().map(|(&id, holder)| {
            let triangles = table
                .to_compressed_shell(holder)
                .map(|shell| {
                    polygon_triangles(&shell.robust_triangulation(tolerance.linear).to_polygon())
                });
            (id, triangles)
        });
        let soup = merge_shells(shells)?;

        debug!(
            shells = table.shell.len(),
            triangles = soup.len(),
            "truck tessellation finished"
        );
        Ok(Mesh::weld_triangles(soup))
    }
}

type Triangle = [[f64; 3]; 3];

fn polygon_triangles(poly: &PolygonMesh) -> Vec<Triangle> {
    let positions = poly.positions();
    let at = |i: usize| {
        let p = positions[i];
        [p.x, p.y, p.z]
    };

    let mut soup = Vec::new();
    for tri in poly.tri_faces() {
        soup.push([at(tri[0].pos), at(tri[1].pos), at(tri[2].pos)]);
    }
    for quad in poly.quad_faces() {
        soup.push([at(quad[0].pos), at(quad[1].pos), at(quad[2].pos)]);
        soup.push([at(quad[0].pos), at(quad[2].pos), at(quad[3].pos)]);
    }
    soup
}

/// Concatenate per-shell triangles. A shell that cannot be built fails the
/// whole tessellation; a partial part would pass for a complete one.
fn merge_shells<E: std::fmt::Debug>(
    shells: impl IntoIterator<Item = (u64, Result<Vec<Triangle>, E>)>,
) -> Result<Vec<Triangle>, TessellateError> {
    let mut soup = Vec::new();
    for (id, triangles) in shells {
        match triangles {
            Ok(triangles) => soup.extend(triangles),
            Err(e) => {
                warn!(shell = id, "truck cannot build shell: {e:?}");
                return Err(format!("shell #{id} could not be built: {e:?}").into());
            }
        }
    }
    Ok(soup)
}
