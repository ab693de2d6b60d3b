//! Input handling: the uploaded STEP document and per-call scratch space.
//!
//! ## Why a scratch directory?
//!
//! The tessellator works on files: it reads the STEP source from a path and
//! emits STL to a path. Every call gets its own randomized `TempDir`, so
//! concurrent conversions never see each other's files, and cleanup happens
//! automatically when [`ScratchSpace`] is dropped, on success, on error and
//! on panic alike.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Every STEP Part 21 file opens with this token.
pub const STEP_MAGIC: &[u8] = b"ISO-10303-21";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// An uploaded STEP file: its original name and raw content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a STEP file from disk, keeping its file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConvertError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => ConvertError::InvalidInput(format!("cannot read '{}': {e}", path.display())),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model.step".to_string());
        Ok(Self { name, bytes })
    }

    /// File name without its extension, e.g. `bracket` for `bracket.step`.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `true` when the content starts with the STEP magic, ignoring a UTF-8
    /// byte order mark and leading whitespace.
    pub fn has_step_magic(&self) -> bool {
        has_step_magic(&self.bytes)
    }
}

pub(crate) fn has_step_magic(bytes: &[u8]) -> bool {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    body[start..].starts_with(STEP_MAGIC)
}

/// A call-private scratch directory, removed on drop.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a fresh `step2mesh-XXXXXX` directory under `root`, or under the
    /// system temp dir when `root` is `None`.
    pub fn create(root: Option<&Path>) -> Result<Self, ConvertError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("step2mesh-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| ConvertError::scratch("creating scratch directory", e))?;
        debug!("Scratch directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the scratch directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `bytes` to `name` inside scratch and return the full path.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ConvertError> {
        let path = self.file(name);
        std::fs::write(&path, bytes)
            .map_err(|e| ConvertError::scratch(format!("writing {name}"), e))?;
        Ok(path)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>, ConvertError> {
        std::fs::read(self.file(name))
            .map_err(|e| ConvertError::scratch(format!("reading {name}"), e))
    }
}
