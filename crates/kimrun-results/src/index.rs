//! Result index trait.
//!
//! The index mirrors the result tree into a store keyed by job id so that
//! results can be queried without walking the filesystem. Backends:
//! - `SurrealResultIndex` (SurrealDB, in-memory or on-disk)
//! - `fakes::MemoryResultIndex` (tests)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::kind::ResultKind;

/// Result type for index operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// One indexed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Job id (primary key).
    pub job_id: String,
    /// Result kind of the job.
    pub kind: ResultKind,
    /// Location of the job's output in the result tree.
    pub path: String,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl IndexEntry {
    pub fn new(job_id: impl Into<String>, kind: ResultKind, path: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            path: path.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Keyed index of persisted results.
///
/// Guarantees:
/// - `record` replaces any previous entry with the same `job_id`.
/// - `get` returns the latest recorded entry for a job id.
/// - `list` returns entries of one kind ordered by `job_id`.
#[async_trait]
pub trait ResultIndex: Send + Sync {
    /// Insert or replace the entry for `entry.job_id`.
    async fn record(&self, entry: IndexEntry) -> IndexResult<()>;

    /// Look up a job by id.
    async fn get(&self, job_id: &str) -> IndexResult<Option<IndexEntry>>;

    /// All entries of a given kind, ordered by job id.
    async fn list(&self, kind: ResultKind) -> IndexResult<Vec<IndexEntry>>;
}
