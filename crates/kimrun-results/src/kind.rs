//! Result kinds and their storage areas.

use serde::{Deserialize, Serialize};

/// Classification of a finished job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    /// A Test ran to completion and produced well-formed output.
    TestResult,
    /// A Verification Check ran to completion and produced well-formed output.
    VerificationResult,
    /// The pair ran but produced a computational error.
    Error,
}

impl ResultKind {
    pub const ALL: [ResultKind; 3] = [
        ResultKind::TestResult,
        ResultKind::VerificationResult,
        ResultKind::Error,
    ];

    /// Two-letter token used as the trailing segment of job ids.
    pub fn token(&self) -> &'static str {
        match self {
            ResultKind::TestResult => "tr",
            ResultKind::VerificationResult => "vr",
            ResultKind::Error => "er",
        }
    }

    /// Parse a job-id token back into a kind.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "tr" => Some(ResultKind::TestResult),
            "vr" => Some(ResultKind::VerificationResult),
            "er" => Some(ResultKind::Error),
            _ => None,
        }
    }

    /// Directory (relative to the results root) holding this kind.
    pub fn area(&self) -> &'static str {
        match self {
            ResultKind::TestResult => "test-results",
            ResultKind::VerificationResult => "verification-results",
            ResultKind::Error => "errors",
        }
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResultKind::TestResult => "test-result",
            ResultKind::VerificationResult => "verification-result",
            ResultKind::Error => "error",
        };
        f.write_str(name)
    }
}
