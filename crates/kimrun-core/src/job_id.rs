//! Content-addressed job identifiers.
//!
//! `<runner short>-and-<subject short>-<digest>-<token>` where `digest` is
//! the first 12 hex characters of SHA-256 over the two formatted
//! identifiers, NUL-separated, runner first.

use std::fmt;

use kimrun_results::ResultKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::{Identifier, ItemKind};

const DIGEST_CHARS: usize = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobIdError {
    #[error("Invalid pairing: {runner} is a {kind}, not a test or verification-check")]
    InvalidPairing { runner: String, kind: ItemKind },
}

/// Result kind a successful run of this runner kind produces.
pub fn expected_kind(runner: ItemKind) -> Option<ResultKind> {
    match runner {
        ItemKind::Test => Some(ResultKind::TestResult),
        ItemKind::VerificationCheck => Some(ResultKind::VerificationResult),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId {
    stem: String,
    kind: ResultKind,
}

impl JobId {
    /// Identifier for running `runner` against `subject`, suffixed with the
    /// result kind a successful run would produce.
    pub fn new(runner: &Identifier, subject: &Identifier) -> Result<Self, JobIdError> {
        let kind = expected_kind(runner.kind()).ok_or_else(|| JobIdError::InvalidPairing {
            runner: runner.format(),
            kind: runner.kind(),
        })?;

        let mut hasher = Sha256::new();
        hasher.update(runner.format().as_bytes());
        hasher.update([0u8]);
        hasher.update(subject.format().as_bytes());
        let digest = hex::encode(hasher.finalize());

        Ok(Self {
            stem: format!(
                "{}-and-{}-{}",
                runner.short(),
                subject.short(),
                &digest[..DIGEST_CHARS]
            ),
            kind,
        })
    }

    /// The same job re-suffixed with the kind actually produced.
    pub fn with_kind(&self, kind: ResultKind) -> Self {
        Self {
            stem: self.stem.clone(),
            kind,
        }
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    /// Everything but the kind token.
    pub fn stem(&self) -> &str {
        &self.stem
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.stem, self.kind.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(text: &str) -> Identifier {
        Identifier::parse(text).unwrap()
    }

    #[test]
    fn test_job_id_format() {
        let job = JobId::new(
            &id("Lattice_Al__TE_000000000001_002"),
            &id("EAM_Al__MO_000000000002_000"),
        )
        .unwrap();
        let text = job.to_string();
        assert!(text.starts_with("TE_000000000001_002-and-MO_000000000002_000-"));
        assert!(text.ends_with("-tr"));
        let digest = text.split('-').nth(2).unwrap();
        assert_eq!(digest.len(), 12);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_job_id_is_stable() {
        let r = id("VC_000000000001_000");
        let s = id("SM_000000000002_000");
        assert_eq!(JobId::new(&r, &s).unwrap(), JobId::new(&r, &s).unwrap());
        assert!(JobId::new(&r, &s).unwrap().to_string().ends_with("-vr"));
    }

    #[test]
    fn test_job_id_is_order_sensitive() {
        let a = id("A__TE_000000000001_000");
        let b = id("B__TE_000000000002_000");
        assert_ne!(
            JobId::new(&a, &b).unwrap().to_string(),
            JobId::new(&b, &a).unwrap().to_string()
        );
    }

    #[test]
    fn test_name_changes_digest() {
        let s = id("MO_000000000002_000");
        let plain = JobId::new(&id("TE_000000000001_000"), &s).unwrap();
        let named = JobId::new(&id("Named__TE_000000000001_000"), &s).unwrap();
        assert_ne!(plain.stem(), named.stem());
    }

    #[test]
    fn test_with_kind() {
        let job = JobId::new(&id("TE_000000000001_000"), &id("MO_000000000002_000")).unwrap();
        let failed = job.with_kind(ResultKind::Error);
        assert_eq!(failed.stem(), job.stem());
        assert!(failed.to_string().ends_with("-er"));
    }

    #[test]
    fn test_non_runner_rejected() {
        let err = JobId::new(&id("MO_000000000002_000"), &id("TE_000000000001_000")).unwrap_err();
        assert!(matches!(err, JobIdError::InvalidPairing { .. }));
    }
}
