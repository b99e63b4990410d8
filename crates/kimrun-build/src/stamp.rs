//! Build stamps and source hashing.
//!
//! A successful build leaves `.kimrun/build.json` in the item directory,
//! holding a digest of the item's files as they were right after the build.
//! While that digest still matches, the item counts as built and is not
//! rebuilt. A failed build leaves `.kimrun/build-failed` with the reason.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::Result;

const STAMP_DIR: &str = ".kimrun";
const STAMP_FILE: &str = "build.json";
const FAILED_FILE: &str = "build-failed";

/// Top-level entries a run leaves behind in the item directory.
pub const RUN_OUTPUTS: [&str; 4] = [
    "output",
    "pipeline.stdout",
    "pipeline.stderr",
    "pipeline.json",
];

/// Build state of an item as recorded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Unbuilt,
    Built,
    BuildFailed,
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BuildState::Unbuilt => "unbuilt",
            BuildState::Built => "built",
            BuildState::BuildFailed => "build-failed",
        };
        f.write_str(s)
    }
}

/// Contents of `.kimrun/build.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStamp {
    /// Digest of the item directory right after the build.
    pub digest: String,
    /// When the build finished.
    pub built_at: DateTime<Utc>,
}

fn stamp_path(item_dir: &Path) -> PathBuf {
    item_dir.join(STAMP_DIR).join(STAMP_FILE)
}

fn failed_path(item_dir: &Path) -> PathBuf {
    item_dir.join(STAMP_DIR).join(FAILED_FILE)
}

/// Hash the item directory: every non-hidden file, in sorted path order,
/// minus the top-level [`RUN_OUTPUTS`].
pub fn source_digest(item_dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    hash_directory_recursive(item_dir, &mut hasher, true)?;
    let hash = hex::encode(hasher.finalize());
    debug!("Source digest for {:?}: {}", item_dir, &hash[..12]);
    Ok(hash)
}

fn hash_directory_recursive(dir: &Path, hasher: &mut Sha256, top_level: bool) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        // Stamps, VCS metadata and editor files never count as sources
        if name.starts_with('.') {
            continue;
        }
        if top_level && RUN_OUTPUTS.contains(&&*name) {
            continue;
        }

        hasher.update(name.as_bytes());
        hasher.update(b"\0");

        if path.is_file() {
            let content = std::fs::read(&path)?;
            hasher.update(&content);
            hasher.update(b"\0");
        } else if path.is_dir() {
            hash_directory_recursive(&path, hasher, false)?;
        }
    }

    Ok(())
}

/// Read the stamp, if any.
pub fn read_stamp(item_dir: &Path) -> Option<BuildStamp> {
    let raw = std::fs::read(stamp_path(item_dir)).ok()?;
    serde_json::from_slice(&raw).ok()
}

/// Record a successful build, clearing any failure marker.
pub fn write_stamp(item_dir: &Path) -> Result<BuildStamp> {
    let stamp = BuildStamp {
        digest: source_digest(item_dir)?,
        built_at: Utc::now(),
    };
    std::fs::create_dir_all(item_dir.join(STAMP_DIR))?;
    std::fs::write(stamp_path(item_dir), serde_json::to_vec_pretty(&stamp)?)?;

    let failed = failed_path(item_dir);
    if failed.exists() {
        std::fs::remove_file(failed)?;
    }
    Ok(stamp)
}

/// Record a failed build, dropping any previous stamp.
pub fn write_failure(item_dir: &Path, reason: &str) -> Result<()> {
    std::fs::create_dir_all(item_dir.join(STAMP_DIR))?;
    std::fs::write(failed_path(item_dir), reason)?;

    let stamp = stamp_path(item_dir);
    if stamp.exists() {
        std::fs::remove_file(stamp)?;
    }
    Ok(())
}

/// The stamp, if it is still valid for the current directory contents.
pub fn current_stamp(item_dir: &Path) -> Result<Option<BuildStamp>> {
    match read_stamp(item_dir) {
        Some(stamp) if stamp.digest == source_digest(item_dir)? => Ok(Some(stamp)),
        _ => Ok(None),
    }
}

/// Build state of an item directory as recorded on disk.
pub fn build_state(item_dir: &Path) -> BuildState {
    if failed_path(item_dir).exists() {
        return BuildState::BuildFailed;
    }
    match current_stamp(item_dir) {
        Ok(Some(_)) => BuildState::Built,
        _ => BuildState::Unbuilt,
    }
}
