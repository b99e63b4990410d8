//! On-disk items.

use std::path::{Path, PathBuf};

use kimrun_build::{BuildRequest, BuildState};
use serde::Serialize;

use super::identifier::Identifier;
use super::kind::ItemKind;
use super::metadata::ItemMetadata;

/// An item resolved from the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: Identifier,
    pub path: PathBuf,
    pub metadata: ItemMetadata,
    pub build_state: BuildState,
}

impl Item {
    pub fn new(id: Identifier, path: impl Into<PathBuf>, metadata: ItemMetadata) -> Self {
        Self {
            id,
            path: path.into(),
            metadata,
            build_state: BuildState::Unbuilt,
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.id.kind()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_built(&self) -> bool {
        self.build_state == BuildState::Built
    }

    /// Request handed to the build collaborator for this item.
    pub fn build_request(&self) -> BuildRequest {
        BuildRequest::new(self.id.format(), &self.path)
            .with_artifacts(self.metadata.artifacts.clone())
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
