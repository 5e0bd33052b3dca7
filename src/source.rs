//! Record source abstraction for production and downtime-reason rows.
//!
//! The core never performs I/O; everything it consumes comes through this
//! trait. Implementations: JSON files on disk (refreshed externally by upsert
//! jobs) and in-memory vectors (tests, CLI piping).

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{DateRange, DowntimeReasonRecord, RawDayRecord};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {err}", path = .0.display(), err = .1)]
    Io(PathBuf, std::io::Error),

    #[error("Malformed records in {path}: {err}", path = .0.display(), err = .1)]
    Decode(PathBuf, serde_json::Error),

    #[error("Record source unavailable: {0}")]
    Unavailable(String),
}

/// Trait abstracting where daily rows come from.
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    /// Production rows dated inside `range`, deduplicated on
    /// (date, machine, material) with the first row kept.
    async fn day_records(&self, range: DateRange) -> Result<Vec<RawDayRecord>, SourceError>;

    /// Reason rows dated inside `range`, never deduplicated.
    async fn downtime_reasons(&self, range: DateRange) -> Result<Vec<DowntimeReasonRecord>, SourceError>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

/// Keep the first row per (date, machine, material) inside `range`.
pub fn first_seen(records: impl IntoIterator<Item = RawDayRecord>, range: DateRange) -> Vec<RawDayRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| range.contains(r.date))
        .filter(|r| {
            let key = (r.date, r.machine.clone(), r.material.clone());
            let fresh = seen.insert(key);
            if !fresh {
                tracing::debug!(
                    date = %r.date,
                    machine = %r.machine,
                    material = ?r.material,
                    "Duplicate production row dropped, keeping first seen"
                );
            }
            fresh
        })
        .collect()
}

// ============================================================================
// JSON File Source
// ============================================================================

/// Reads two JSON arrays from disk on every call.
///
/// A missing reasons file is treated as "no reasons recorded"; any other
/// failure to read it is an error.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    records_path: PathBuf,
    reasons_path: Option<PathBuf>,
}

impl JsonFileSource {
    pub fn new(records_path: impl Into<PathBuf>, reasons_path: Option<PathBuf>) -> Self {
        Self {
            records_path: records_path.into(),
            reasons_path,
        }
    }

    async fn read_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, SourceError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::Io(path.to_path_buf(), e))?;
        serde_json::from_str(&contents).map_err(|e| SourceError::Decode(path.to_path_buf(), e))
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn day_records(&self, range: DateRange) -> Result<Vec<RawDayRecord>, SourceError> {
        let all: Vec<RawDayRecord> = Self::read_array(&self.records_path).await?;
        let total = all.len();
        let kept = first_seen(all, range);
        tracing::debug!(path = %self.records_path.display(), total, kept = kept.len(), %range, "Loaded production rows");
        Ok(kept)
    }

    async fn downtime_reasons(&self, range: DateRange) -> Result<Vec<DowntimeReasonRecord>, SourceError> {
        let Some(path) = &self.reasons_path else {
            return Ok(Vec::new());
        };
        let all: Vec<DowntimeReasonRecord> = match Self::read_array(path).await {
            Ok(all) => all,
            Err(SourceError::Io(_, e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Reasons file absent, no reasons recorded");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        Ok(all.into_iter().filter(|r| range.contains(r.date)).collect())
    }

    fn source_name(&self) -> &str {
        "json-file"
    }
}

// ============================================================================
// In-Memory Source
// ============================================================================

/// Rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<RawDayRecord>,
    reasons: Vec<DowntimeReasonRecord>,
}

impl InMemorySource {
    pub fn new(records: Vec<RawDayRecord>, reasons: Vec<DowntimeReasonRecord>) -> Self {
        Self { records, reasons }
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    async fn day_records(&self, range: DateRange) -> Result<Vec<RawDayRecord>, SourceError> {
        Ok(first_seen(self.records.iter().cloned(), range))
    }

    async fn downtime_reasons(&self, range: DateRange) -> Result<Vec<DowntimeReasonRecord>, SourceError> {
        Ok(self.reasons.iter().filter(|r| range.contains(r.date)).cloned().collect())
    }

    fn source_name(&self) -> &str {
        "in-memory"
    }
}
