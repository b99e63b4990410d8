//! Live probe of a subject's native compute interface.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::error::{MatchError, Result};
use crate::domain::Item;

/// Log file a probe program leaves in its scratch directory.
pub const PROBE_LOG: &str = "kim.log";

/// A loaded subject, ready to be probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeHandle {
    pub subject: String,
    pub path: PathBuf,
}

/// Result of a trial initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Compatible,
    Incompatible { summary: String, log: String },
}

/// Native compute interface of subjects.
///
/// Errors returned from either method mean the probe could not be
/// attempted, which is fatal. An incompatible subject is reported through
/// [`ProbeOutcome::Incompatible`].
#[async_trait]
pub trait NativeInterface: Send + Sync {
    async fn load(&self, subject: &Item) -> Result<NativeHandle>;

    async fn probe(
        &self,
        handle: &NativeHandle,
        runner: &Item,
        scratch: &Path,
    ) -> Result<ProbeOutcome>;
}

/// Treats declared metadata as authoritative; every probe passes.
#[derive(Debug, Clone, Default)]
pub struct DeclaredOnly;

#[async_trait]
impl NativeInterface for DeclaredOnly {
    async fn load(&self, subject: &Item) -> Result<NativeHandle> {
        Ok(NativeHandle {
            subject: subject.id.format(),
            path: subject.path.clone(),
        })
    }

    async fn probe(
        &self,
        handle: &NativeHandle,
        runner: &Item,
        _scratch: &Path,
    ) -> Result<ProbeOutcome> {
        debug!(subject = %handle.subject, runner = %runner.id, "no probe program, declared metadata accepted");
        Ok(ProbeOutcome::Compatible)
    }
}

/// Runs an external probe program: `<program> <subject-id> <runner-path>`
/// with the scratch directory as working directory.
#[derive(Debug, Clone)]
pub struct ProcessInterface {
    program: PathBuf,
}

impl ProcessInterface {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl NativeInterface for ProcessInterface {
    async fn load(&self, subject: &Item) -> Result<NativeHandle> {
        if !subject.path.is_dir() {
            return Err(MatchError::Probe {
                subject: subject.id.format(),
                reason: format!("item directory {} is missing", subject.path.display()),
            });
        }
        if !subject.is_built() {
            return Err(MatchError::Probe {
                subject: subject.id.format(),
                reason: format!("subject is {}, not built", subject.build_state),
            });
        }
        Ok(NativeHandle {
            subject: subject.id.format(),
            path: subject.path.clone(),
        })
    }

    #[instrument(skip(self, handle, runner), fields(subject = %handle.subject, runner = %runner.id))]
    async fn probe(
        &self,
        handle: &NativeHandle,
        runner: &Item,
        scratch: &Path,
    ) -> Result<ProbeOutcome> {
        let output = Command::new(&self.program)
            .arg(&handle.subject)
            .arg(&runner.path)
            .current_dir(scratch)
            .env("KIMRUN_SUBJECT_PATH", &handle.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MatchError::Probe {
                subject: handle.subject.clone(),
                reason: format!("cannot launch {}: {}", self.program.display(), e),
            })?;

        if output.status.success() {
            debug!("probe passed");
            return Ok(ProbeOutcome::Compatible);
        }

        let log_path = scratch.join(PROBE_LOG);
        let log = match tokio::fs::read_to_string(&log_path).await {
            Ok(text) if !text.trim().is_empty() => text,
            _ => String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        let summary = match output.status.code() {
            Some(code) => format!(
                "{} failed to initialize against {} (probe exit code {})",
                handle.subject, runner.id, code
            ),
            None => format!(
                "{} failed to initialize against {} (probe terminated by signal)",
                handle.subject, runner.id
            ),
        };
        Ok(ProbeOutcome::Incompatible { summary, log })
    }
}
