//! In-memory fakes for the result index (testing only)

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::index::{IndexEntry, IndexResult, ResultIndex};
use crate::kind::ResultKind;

/// In-memory index backed by a `BTreeMap<job_id, entry>`.
#[derive(Debug, Default)]
pub struct MemoryResultIndex {
    entries: Mutex<BTreeMap<String, IndexEntry>>,
}

impl MemoryResultIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed jobs.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultIndex for MemoryResultIndex {
    async fn record(&self, entry: IndexEntry) -> IndexResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(entry.job_id.clone(), entry);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> IndexResult<Option<IndexEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(job_id).cloned())
    }

    async fn list(&self, kind: ResultKind) -> IndexResult<Vec<IndexEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.values().filter(|e| e.kind == kind).cloned().collect())
    }
}
