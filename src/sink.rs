//! Best-effort metadata persistence.
//!
//! After a successful conversion the pipeline can append one [`AssetRecord`]
//! to a remote store. The append is fire-and-forget from the user's point of
//! view: failures are logged at `warn` and never change the conversion
//! result.
//!
//! [`RestMetadataSink`] talks to a PostgREST-style endpoint
//! (`POST {base_url}/rest/v1/{table}`) with API-key and bearer headers.
//! Any other store can be plugged in by implementing [`MetadataSink`].

use crate::error::SinkError;
use crate::format::MeshFormat;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable holding the store's base URL.
pub const ENV_SINK_URL: &str = "STEP2MESH_SINK_URL";
/// Environment variable holding the store's API key.
pub const ENV_SINK_KEY: &str = "STEP2MESH_SINK_KEY";
/// Environment variable overriding the target table.
pub const ENV_SINK_TABLE: &str = "STEP2MESH_SINK_TABLE";

const DEFAULT_TABLE: &str = "assets";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One row describing a converted asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Source file stem.
    pub name: String,
    pub material: Option<String>,
    pub format: MeshFormat,
    pub vertex_count: usize,
    pub face_count: usize,
    pub volume_cm3: f64,
    pub watertight: bool,
}

/// Destination for asset records.
///
/// Called from the conversion thread, so implementations may block.
pub trait MetadataSink: Send + Sync {
    fn append(&self, record: &AssetRecord) -> Result<(), SinkError>;
}

/// Append `record`, logging and swallowing any failure.
///
/// Returns `true` when the record was stored.
pub fn persist(sink: &dyn MetadataSink, record: &AssetRecord) -> bool {
    match sink.append(record) {
        Ok(()) => {
            debug!("Recorded asset '{}' in metadata sink", record.name);
            true
        }
        Err(e) => {
            warn!("Metadata sink append failed for '{}': {}", record.name, e);
            false
        }
    }
}

// ── REST sink ────────────────────────────────────────────────────────────────

/// Appends records to a PostgREST table over HTTPS.
pub struct RestMetadataSink {
    endpoint: String,
    api_key: String,
    // Built on first use: a blocking client must not be created on an async
    // runtime thread, and appends always run on a blocking thread.
    client: OnceCell<reqwest::blocking::Client>,
}

impl RestMetadataSink {
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        table: impl AsRef<str>,
    ) -> Result<Self, SinkError> {
        let base_url = base_url.as_ref().trim().trim_end_matches('/');
        let table = table.as_ref().trim();
        let api_key = api_key.into();

        if base_url.is_empty() {
            return Err(SinkError::NotConfigured("base URL is empty".to_string()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SinkError::NotConfigured(format!(
                "base URL must start with http:// or https://, got '{base_url}'"
            )));
        }
        if api_key.trim().is_empty() {
            return Err(SinkError::NotConfigured("API key is empty".to_string()));
        }
        if table.is_empty() {
            return Err(SinkError::NotConfigured("table name is empty".to_string()));
        }

        Ok(Self {
            endpoint: format!("{base_url}/rest/v1/{table}"),
            api_key,
            client: OnceCell::new(),
        })
    }

    /// Build from `STEP2MESH_SINK_URL`, `STEP2MESH_SINK_KEY` and optional
    /// `STEP2MESH_SINK_TABLE`. Returns `None` when URL or key is unset.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var(ENV_SINK_URL).ok().filter(|s| !s.is_empty())?;
        let key = std::env::var(ENV_SINK_KEY).ok().filter(|s| !s.is_empty())?;
        let table = std::env::var(ENV_SINK_TABLE)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());

        match Self::new(url, key, table) {
            Ok(sink) => Some(sink),
            Err(e) => {
                warn!("Ignoring metadata sink environment: {e}");
                None
            }
        }
    }

    /// Full URL records are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, SinkError> {
        self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .user_agent(concat!("step2mesh/", env!("CARGO_PKG_VERSION")))
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| SinkError::Request(e.to_string()))
        })
    }
}

impl std::fmt::Debug for RestMetadataSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestMetadataSink")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl MetadataSink for RestMetadataSink {
    fn append(&self, record: &AssetRecord) -> Result<(), SinkError> {
        let response = self
            .client()?
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .map_err(|e| SinkError::Request(format!("POST {}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

// ── In-memory sink ───────────────────────────────────────────────────────────

/// Keeps records in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AssetRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record appended so far.
    pub fn records(&self) -> Vec<AssetRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MetadataSink for MemorySink {
    fn append(&self, record: &AssetRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Request("memory sink lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}
