//! SurrealDB-backed result index.
//!
//! Stores one row per job in the `job_results` table, keyed by `job_id`.
//! Connects to any URL `surrealdb::engine::any` understands: `mem://` for a
//! per-process index, `surrealkv://<path>` for an on-disk one, or a remote
//! `ws://` endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::IndexError;
use crate::index::{IndexEntry, IndexResult, ResultIndex};
use crate::kind::ResultKind;

const NAMESPACE: &str = "kimrun";
const DATABASE: &str = "results";

/// SurrealDB implementation of [`ResultIndex`].
#[derive(Clone)]
pub struct SurrealResultIndex {
    db: Surreal<Any>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbIndexEntry {
    job_id: String,
    kind: ResultKind,
    path: String,
    recorded_at: SurrealDatetime,
}

impl DbIndexEntry {
    fn into_entry(self) -> IndexEntry {
        IndexEntry {
            job_id: self.job_id,
            kind: self.kind,
            path: self.path,
            recorded_at: DateTime::<Utc>::from(self.recorded_at),
        }
    }
}

impl From<IndexEntry> for DbIndexEntry {
    fn from(entry: IndexEntry) -> Self {
        Self {
            job_id: entry.job_id,
            kind: entry.kind,
            path: entry.path,
            recorded_at: SurrealDatetime::from(entry.recorded_at),
        }
    }
}

impl SurrealResultIndex {
    /// Connect to an in-memory index.
    pub async fn in_memory() -> IndexResult<Self> {
        Self::connect("mem://").await
    }

    /// Connect to `url`, select the kimrun namespace, and set up the schema.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn connect(url: &str) -> IndexResult<Self> {
        info!("Connecting result index");

        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| IndexError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;

        let index = Self { db };
        index.init_schema().await?;
        Ok(index)
    }

    async fn init_schema(&self) -> IndexResult<()> {
        debug!("Initializing result index schema");

        let schema = r#"
            DEFINE TABLE IF NOT EXISTS job_results SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS idx_job_id ON TABLE job_results COLUMNS job_id UNIQUE;
            DEFINE INDEX IF NOT EXISTS idx_kind ON TABLE job_results COLUMNS kind;
        "#;

        self.db
            .query(schema)
            .await
            .and_then(|response| response.check())
            .map_err(|e| IndexError::SchemaSetup(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ResultIndex for SurrealResultIndex {
    #[instrument(skip(self, entry), fields(job_id = %entry.job_id, kind = %entry.kind))]
    async fn record(&self, entry: IndexEntry) -> IndexResult<()> {
        let job_id = entry.job_id.clone();

        self.db
            .query("DELETE job_results WHERE job_id = $job_id")
            .bind(("job_id", job_id))
            .await?
            .check()?;

        let created: Option<DbIndexEntry> = self
            .db
            .create("job_results")
            .content(DbIndexEntry::from(entry))
            .await?;

        created
            .map(|_| ())
            .ok_or_else(|| IndexError::Backend("failed to create index entry".to_string()))
    }

    #[instrument(skip(self))]
    async fn get(&self, job_id: &str) -> IndexResult<Option<IndexEntry>> {
        let job_id_owned = job_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM job_results WHERE job_id = $job_id LIMIT 1")
            .bind(("job_id", job_id_owned))
            .await?;

        let rows: Vec<DbIndexEntry> = result.take(0)?;
        Ok(rows.into_iter().next().map(DbIndexEntry::into_entry))
    }

    #[instrument(skip(self))]
    async fn list(&self, kind: ResultKind) -> IndexResult<Vec<IndexEntry>> {
        let mut result = self
            .db
            .query("SELECT * FROM job_results WHERE kind = $kind ORDER BY job_id")
            .bind(("kind", kind.to_string()))
            .await?;

        let rows: Vec<DbIndexEntry> = result.take(0)?;
        Ok(rows.into_iter().map(DbIndexEntry::into_entry).collect())
    }
}
