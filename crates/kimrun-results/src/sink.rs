//! Filesystem result tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::SinkError;
use crate::kind::ResultKind;

/// Directory-backed result store.
///
/// Layout: `<root>/<area>/<job id>/...` where `<area>` is
/// `test-results`, `verification-results` or `errors`.
#[derive(Debug, Clone)]
pub struct ResultSink {
    root: PathBuf,
}

impl ResultSink {
    /// Create a sink rooted at `root`, creating every result area.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SinkError> {
        let root = root.as_ref().to_path_buf();
        for kind in ResultKind::ALL {
            fs::create_dir_all(root.join(kind.area()))?;
        }
        Ok(Self { root })
    }

    /// Root directory of the result tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a job with this id and kind is (or would be) stored.
    pub fn location(&self, job_id: &str, kind: ResultKind) -> PathBuf {
        self.root.join(kind.area()).join(job_id)
    }

    /// Move every entry of `source` into the location for `job_id`.
    ///
    /// An existing entry with the same id is replaced. `source` itself is
    /// left in place (empty) so that its owner can release it.
    pub fn persist(
        &self,
        job_id: &str,
        kind: ResultKind,
        source: &Path,
    ) -> Result<PathBuf, SinkError> {
        if job_id.is_empty() || job_id.contains(['/', '\\']) || job_id.starts_with('.') {
            return Err(SinkError::InvalidJobId(job_id.to_string()));
        }
        if !source.is_dir() {
            return Err(SinkError::SourceMissing(source.to_path_buf()));
        }

        let dest = self.location(job_id, kind);
        if dest.exists() {
            warn!(job_id = %job_id, path = %dest.display(), "replacing existing result");
            fs::remove_dir_all(&dest)?;
        }
        fs::create_dir_all(&dest)?;

        for entry in fs::read_dir(source)? {
            let entry = entry?;
            let from = entry.path();
            let to = dest.join(entry.file_name());
            move_entry(&from, &to)?;
        }

        info!(job_id = %job_id, kind = %kind, path = %dest.display(), "result persisted");
        Ok(dest)
    }

    /// Job ids currently stored under `kind`, sorted.
    pub fn list(&self, kind: ResultKind) -> Result<Vec<String>, SinkError> {
        let area = self.root.join(kind.area());
        let mut ids = Vec::new();
        if !area.is_dir() {
            return Ok(ids);
        }
        for entry in fs::read_dir(&area)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Rename, falling back to copy + remove when rename is not possible
/// (e.g. the scratch directory lives on another filesystem).
fn move_entry(from: &Path, to: &Path) -> Result<(), SinkError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    debug!(from = %from.display(), "rename failed, copying instead");

    let relocation = |source: std::io::Error| SinkError::Relocation {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    copy_recursive(from, to).map_err(relocation)?;
    if from.is_dir() {
        fs::remove_dir_all(from).map_err(relocation)?;
    } else {
        fs::remove_file(from).map_err(relocation)?;
    }
    Ok(())
}

fn copy_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    if from.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        fs::copy(from, to)?;
    }
    Ok(())
}
