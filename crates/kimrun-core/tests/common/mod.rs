//! Shared fixtures: a throwaway repository on disk.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kimrun_build::fakes::RecordingBuilder;
use kimrun_build::Builder;
use kimrun_core::domain::METADATA_FILE;
use kimrun_core::{Identifier, Registry};
use serde_json::Value;
use tempfile::TempDir;

pub struct Repo {
    dir: TempDir,
}

impl Repo {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create an item directory in its own storage area.
    pub fn add(&self, id: &str, metadata: Value) -> PathBuf {
        let kind = Identifier::parse(id).unwrap().kind();
        let dir = self.root().join(kind.storage_dir()).join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(METADATA_FILE), metadata.to_string()).unwrap();
        dir
    }

    /// Create a runner whose `runner` executable is the given shell script.
    #[cfg(unix)]
    pub fn add_runner(&self, id: &str, metadata: Value, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dir = self.add(id, metadata);
        let path = dir.join("runner");
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        dir
    }

    pub fn registry(&self) -> Registry {
        self.registry_with(Arc::new(RecordingBuilder::new()))
    }

    pub fn registry_with(&self, builder: Arc<dyn Builder>) -> Registry {
        Registry::open(self.root(), builder).unwrap()
    }
}

/// Runner script that reads the subject from stdin and writes valid results.
pub const SUCCESS_SCRIPT: &str = r#"read subject
mkdir -p output
printf '{"subject": "%s", "subject_path": "%s"}\n' "$subject" "$KIMRUN_SUBJECT_PATH" > output/results.json
echo "computed for $subject""#;

/// Runner script that fails with a computational error.
pub const FAILING_SCRIPT: &str = r#"echo "diverged" >&2
exit 4"#;

pub fn id(text: &str) -> Identifier {
    Identifier::parse(text).unwrap()
}
