//! Metrics and printability advisories computed from the canonical mesh.
//!
//! All lengths in a [`MetricSnapshot`] are millimetres and volumes are
//! tracked by [`Volume`], so consumers never guess the unit. The model's own
//! unit is supplied through configuration, since STL carries none.

use crate::mesh::Mesh;
use crate::units::{LengthUnit, Volume};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounding box extents in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_mm: f64,
    pub y_mm: f64,
    pub z_mm: f64,
}

impl BoundingBox {
    pub fn as_array(&self) -> [f64; 3] {
        [self.x_mm, self.y_mm, self.z_mm]
    }
}

/// Geometric summary of a converted mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub vertex_count: usize,
    pub face_count: usize,
    /// Enclosed volume. Only meaningful when `watertight` is true; for open
    /// meshes it is whatever the signed-tetrahedron sum yields.
    pub volume: Volume,
    pub surface_area_mm2: f64,
    pub bounds: BoundingBox,
    pub watertight: bool,
}

impl MetricSnapshot {
    /// Measure `mesh`, whose coordinates are in `unit`.
    pub fn measure(mesh: &Mesh, unit: LengthUnit) -> Self {
        let scale = unit.to_mm();
        let bounds = mesh
            .bounds()
            .map(|b| {
                let [x, y, z] = b.extents();
                BoundingBox {
                    x_mm: x * scale,
                    y_mm: y * scale,
                    z_mm: z * scale,
                }
            })
            .unwrap_or_default();

        Self {
            vertex_count: mesh.vertex_count(),
            face_count: mesh.face_count(),
            volume: Volume::from_model_units(mesh.signed_volume(), unit),
            surface_area_mm2: mesh.surface_area() * scale * scale,
            bounds,
            watertight: mesh.is_watertight(),
        }
    }
}

/// Bounding box axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        })
    }
}

/// Design-for-manufacturing hint for FDM printing.
///
/// Advisories are informational; they never fail a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DfmAdvisory {
    /// Some edge is not shared by exactly two faces; slicers may misprint.
    NotWatertight,
    /// The enclosed volume is negative: faces are wound inward.
    InvertedNormals,
    /// An extent is thinner than two nozzle widths.
    ThinExtent { axis: Axis, size_mm: f64, min_mm: f64 },
}

impl fmt::Display for DfmAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DfmAdvisory::NotWatertight => {
                f.write_str("mesh is not watertight; repair it before slicing")
            }
            DfmAdvisory::InvertedNormals => {
                f.write_str("faces are wound inward (negative volume); flip normals")
            }
            DfmAdvisory::ThinExtent {
                axis,
                size_mm,
                min_mm,
            } => write!(
                f,
                "{axis} extent {size_mm:.2} mm is below {min_mm:.2} mm (two nozzle widths)"
            ),
        }
    }
}

/// Printability hints for `metrics` given a nozzle diameter in millimetres.
pub fn advise(metrics: &MetricSnapshot, nozzle_diameter_mm: f64) -> Vec<DfmAdvisory> {
    let mut advisories = Vec::new();
    if metrics.face_count == 0 {
        return advisories;
    }

    if !metrics.watertight {
        advisories.push(DfmAdvisory::NotWatertight);
    } else if metrics.volume.cubic_millimeters() < 0.0 {
        advisories.push(DfmAdvisory::InvertedNormals);
    }

    let min_mm = 2.0 * nozzle_diameter_mm;
    for (axis, size_mm) in [Axis::X, Axis::Y, Axis::Z]
        .into_iter()
        .zip(metrics.bounds.as_array())
    {
        if size_mm < min_mm {
            advisories.push(DfmAdvisory::ThinExtent {
                axis,
                size_mm,
                min_mm,
            });
        }
    }
    advisories
}
