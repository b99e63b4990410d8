//! kimrun-build: turning item directories into invocable artifacts
//!
//! The pipeline treats compilation as an opaque step: hand over an item
//! directory, get back "built" or a [`BuildError`]. This crate provides the
//! [`Builder`] seam, the default [`MakeBuilder`], and the on-disk build
//! stamps that make repeated builds of unchanged items free.
//!
//! ## Layer 1 - Environment/Tooling
//!
//! Focus: idempotent builds and actionable failure reasons.

mod error;
pub mod fakes;
mod make;
pub mod stamp;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::BuildError;
pub use make::MakeBuilder;
pub use stamp::{BuildStamp, BuildState};

/// Result type for build operations
pub type Result<T> = std::result::Result<T, BuildError>;

/// What to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Formatted identifier of the item (for messages and logs).
    pub id: String,
    /// Item directory.
    pub path: PathBuf,
    /// Files (relative to `path`) that must exist after a successful build.
    pub artifacts: Vec<String>,
}

impl BuildRequest {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
        self.artifacts = artifacts;
        self
    }
}

/// How a build request was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The build command ran and succeeded.
    Built(BuildStamp),
    /// A valid stamp already existed; nothing ran.
    UpToDate(BuildStamp),
}

impl BuildOutcome {
    pub fn stamp(&self) -> &BuildStamp {
        match self {
            BuildOutcome::Built(stamp) | BuildOutcome::UpToDate(stamp) => stamp,
        }
    }
}

/// Build collaborator.
///
/// Implementations must be idempotent: building an item whose previous
/// build is still valid returns [`BuildOutcome::UpToDate`] without work.
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<BuildOutcome>;
}
