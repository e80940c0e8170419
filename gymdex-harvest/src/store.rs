//! Record persistence seam
//!
//! The engine reads the previous record set before a run and writes the
//! fused set back afterwards. Storage details stay behind the
//! [`RecordStore`] trait so the engine never couples to a backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gymdex_common::error::{Error, Result};
use gymdex_common::records::FacilityRecord;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Where canonical records live between runs
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load the stored record set, empty when nothing was stored yet
    async fn read(&self) -> Result<Vec<FacilityRecord>>;

    /// Replace the stored record set
    async fn write(&self, records: &[FacilityRecord]) -> Result<()>;
}

/// Single-document JSON store
///
/// The whole record set lives in one file, rewritten on every save.
/// Concurrent writers are last-writer-wins; the engine's non-reentrancy
/// guard keeps one process from racing itself.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn read(&self) -> Result<Vec<FacilityRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(body) => {
                let records: Vec<FacilityRecord> = serde_json::from_str(&body)?;
                debug!(
                    path = %self.path.display(),
                    records = records.len(),
                    "Loaded record set"
                );
                Ok(records)
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored record set yet");
                Ok(Vec::new())
            }
            Err(source) => Err(Error::Io(source)),
        }
    }

    async fn write(&self, records: &[FacilityRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, body).await?;
        info!(
            path = %self.path.display(),
            records = records.len(),
            "Record set written"
        );
        Ok(())
    }
}

/// Volatile store for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<FacilityRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record set
    pub fn with_records(records: Vec<FacilityRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self) -> Result<Vec<FacilityRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn write(&self, records: &[FacilityRecord]) -> Result<()> {
        *self.records.write().await = records.to_vec();
        Ok(())
    }
}
