//! Matching Engine: decides whether a runner can be run against a subject.
//!
//! Declared constraints are checked first (see [`checks`]); a Test paired
//! with a Model is then probed live through a [`NativeInterface`] inside a
//! scratch directory that is removed on every exit path.

pub mod checks;
mod error;
pub mod probe;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

pub use checks::{MatchContext, MatchRule, MatchViolation};
pub use error::{MatchError, Result};
pub use probe::{DeclaredOnly, NativeHandle, NativeInterface, ProbeOutcome, ProcessInterface};

use crate::domain::{Item, ItemKind};
use crate::obs;
use crate::registry::Registry;

/// Why a pair was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostic {
    Message(String),
    /// Only produced by the live probe.
    MessageWithLog { message: String, log: String },
}

impl Diagnostic {
    pub fn message(&self) -> &str {
        match self {
            Diagnostic::Message(message) | Diagnostic::MessageWithLog { message, .. } => message,
        }
    }

    pub fn log(&self) -> Option<&str> {
        match self {
            Diagnostic::Message(_) => None,
            Diagnostic::MessageWithLog { log, .. } => Some(log),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// A runner/subject pair accepted by [`MatchEngine::valid_match`].
///
/// Only the engine can construct one, so holding a `MatchedPair` proves the
/// pair was checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    runner: Item,
    subject: Item,
}

impl MatchedPair {
    pub fn runner(&self) -> &Item {
        &self.runner
    }

    pub fn subject(&self) -> &Item {
        &self.subject
    }

    pub fn into_parts(self) -> (Item, Item) {
        (self.runner, self.subject)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Match(MatchedPair),
    Mismatch(Diagnostic),
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Match(_))
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            MatchResult::Match(_) => None,
            MatchResult::Mismatch(diagnostic) => Some(diagnostic),
        }
    }
}

pub struct MatchEngine {
    interface: Arc<dyn NativeInterface>,
    scratch_root: PathBuf,
}

impl MatchEngine {
    pub fn new(interface: Arc<dyn NativeInterface>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            interface,
            scratch_root: scratch_root.into(),
        }
    }

    /// Engine that trusts declared metadata and never probes.
    pub fn declared_only(scratch_root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(DeclaredOnly), scratch_root)
    }

    /// Decide whether `runner` may be run against `subject`.
    ///
    /// Returns `Err` only when the live probe cannot be attempted.
    #[instrument(skip_all, fields(runner = %runner.id, subject = %subject.id))]
    pub async fn valid_match(
        &self,
        registry: &Registry,
        runner: &Item,
        subject: &Item,
    ) -> Result<MatchResult> {
        let ctx = MatchContext {
            registry,
            runner,
            subject,
        };

        let result = match checks::first_violation(&ctx) {
            Some(violation) => MatchResult::Mismatch(Diagnostic::Message(violation.reason)),
            None if runner.kind() == ItemKind::Test && subject.kind() == ItemKind::Model => {
                self.probe(runner, subject).await?
            }
            None => MatchResult::Match(MatchedPair {
                runner: runner.clone(),
                subject: subject.clone(),
            }),
        };

        let runner_id = runner.id.format();
        let subject_id = subject.id.format();
        obs::emit_match_evaluated(
            &runner_id,
            &subject_id,
            result.is_match(),
            result.diagnostic().map(Diagnostic::message),
        );
        Ok(result)
    }

    async fn probe(&self, runner: &Item, subject: &Item) -> Result<MatchResult> {
        let handle = self.interface.load(subject).await?;

        std::fs::create_dir_all(&self.scratch_root)?;
        let scratch = tempfile::Builder::new()
            .prefix("kimrun-probe-")
            .tempdir_in(&self.scratch_root)?;

        let outcome = self.interface.probe(&handle, runner, scratch.path()).await?;
        Ok(match outcome {
            ProbeOutcome::Compatible => MatchResult::Match(MatchedPair {
                runner: runner.clone(),
                subject: subject.clone(),
            }),
            ProbeOutcome::Incompatible { summary, log } => {
                MatchResult::Mismatch(Diagnostic::MessageWithLog {
                    message: summary,
                    log,
                })
            }
        })
    }
}
