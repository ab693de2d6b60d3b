//! Length units and unit-tracked volume.
//!
//! Tessellation output is in whatever unit the STEP model was authored in.
//! Metrics are always reported in millimetre-based units, so the conversion
//! factor is carried explicitly instead of being assumed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit of the model coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// (default)
    #[default]
    Millimeter,
    Centimeter,
    Meter,
    Inch,
}

impl LengthUnit {
    /// Millimetres per model unit.
    pub fn to_mm(self) -> f64 {
        match self {
            LengthUnit::Millimeter => 1.0,
            LengthUnit::Centimeter => 10.0,
            LengthUnit::Meter => 1000.0,
            LengthUnit::Inch => 25.4,
        }
    }

    /// Unit name as spelled by the 3MF and AMF `unit` attributes.
    pub fn xml_name(self) -> &'static str {
        match self {
            LengthUnit::Millimeter => "millimeter",
            LengthUnit::Centimeter => "centimeter",
            LengthUnit::Meter => "meter",
            LengthUnit::Inch => "inch",
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LengthUnit::Millimeter => "mm",
            LengthUnit::Centimeter => "cm",
            LengthUnit::Meter => "m",
            LengthUnit::Inch => "in",
        })
    }
}

impl FromStr for LengthUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mm" | "millimeter" | "millimetre" => Ok(LengthUnit::Millimeter),
            "cm" | "centimeter" | "centimetre" => Ok(LengthUnit::Centimeter),
            "m" | "meter" | "metre" => Ok(LengthUnit::Meter),
            "in" | "inch" => Ok(LengthUnit::Inch),
            other => Err(format!("unknown length unit '{other}' (mm, cm, m, in)")),
        }
    }
}

/// A volume, stored in cubic millimetres.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Volume {
    cubic_mm: f64,
}

impl Volume {
    pub fn from_cubic_mm(cubic_mm: f64) -> Self {
        Self { cubic_mm }
    }

    /// Convert a volume measured in `unit`³ into a tracked volume.
    pub fn from_model_units(value: f64, unit: LengthUnit) -> Self {
        Self::from_cubic_mm(value * unit.to_mm().powi(3))
    }

    pub fn cubic_millimeters(self) -> f64 {
        self.cubic_mm
    }

    /// 1 cm³ = 1000 mm³.
    pub fn cubic_centimeters(self) -> f64 {
        self.cubic_mm / 1000.0
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} cm³", self.cubic_centimeters())
    }
}
