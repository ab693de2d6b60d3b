//! STEP header inspection without tessellation.
//!
//! A Part 21 file opens with a `HEADER;` section holding three records:
//!
//! ```text
//! FILE_DESCRIPTION(('...'), '2;1');
//! FILE_NAME('name', 'timestamp', ('author'), ('org'), 'preprocessor',
//!           'originating system', 'authorization');
//! FILE_SCHEMA(('AUTOMOTIVE_DESIGN { 1 0 10303 214 1 1 1 1 }'));
//! ```
//!
//! Reading these is cheap and needs no B-rep kernel, so callers can show
//! what an upload is before paying for a conversion.

use crate::error::ConvertError;
use crate::pipeline::input::has_step_magic;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bFILE_NAME\s*\((.*?)\)\s*;").unwrap());

static RE_FILE_SCHEMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bFILE_SCHEMA\s*\((.*?)\)\s*;").unwrap());

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*#\d+\s*=").unwrap());

static RE_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'((?:[^']|'')*)'").unwrap());

/// Summary of a STEP file's header section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepHeader {
    /// Name recorded by the exporting system (not the upload name).
    pub file_name: Option<String>,
    /// Schema identifier, e.g. `AUTOMOTIVE_DESIGN { 1 0 10303 214 1 1 1 1 }`.
    pub schema: Option<String>,
    /// CAD system that wrote the file.
    pub originating_system: Option<String>,
    pub timestamp: Option<String>,
    /// Number of `#n = ...` instances in the data section.
    pub entity_count: usize,
}

impl StepHeader {
    /// Application protocol implied by the schema, when recognisable.
    pub fn application_protocol(&self) -> Option<&'static str> {
        let schema = self.schema.as_deref()?.to_ascii_uppercase();
        if schema.contains("AP242") {
            Some("AP242")
        } else if schema.contains("AUTOMOTIVE_DESIGN") {
            Some("AP214")
        } else if schema.contains("CONFIG_CONTROL_DESIGN") || schema.contains("AP203") {
            Some("AP203")
        } else {
            None
        }
    }
}

/// Parse the header of a STEP file.
///
/// Fails with [`ConvertError::InvalidInput`] when the bytes are not a Part 21
/// file. Missing header records leave the matching fields `None`.
pub fn parse_header(bytes: &[u8]) -> Result<StepHeader, ConvertError> {
    if !has_step_magic(bytes) {
        return Err(ConvertError::InvalidInput(
            "not a STEP file (missing ISO-10303-21 signature)".to_string(),
        ));
    }
    let text = String::from_utf8_lossy(bytes);

    let mut header = StepHeader {
        entity_count: RE_ENTITY.find_iter(&text).count(),
        ..StepHeader::default()
    };

    if let Some(caps) = RE_FILE_NAME.captures(&text) {
        let args = split_top_level(&caps[1]);
        let field = |i: usize| args.get(i).and_then(|a| unquote(a));
        header.file_name = field(0);
        header.timestamp = field(1);
        header.originating_system = field(5);
    }

    if let Some(caps) = RE_FILE_SCHEMA.captures(&text) {
        header.schema = RE_QUOTED
            .captures(&caps[1])
            .map(|q| unescape(&q[1]).trim().to_string())
            .filter(|s| !s.is_empty());
    }

    Ok(header)
}

/// Split a parameter list on commas that are outside quotes and parentheses.
fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth -= 1,
            ',' if !in_quote && depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(args[start..].trim());
    parts
}

/// A single quoted STEP string, or `None` for `$`, lists and empty strings.
fn unquote(arg: &str) -> Option<String> {
    let inner = arg.strip_prefix('\'')?.strip_suffix('\'')?;
    let value = unescape(inner).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn unescape(s: &str) -> String {
    s.replace("''", "'")
}
