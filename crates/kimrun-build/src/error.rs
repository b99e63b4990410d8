//! Error types for kimrun-build

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building an item
#[derive(Error, Debug)]
pub enum BuildError {
    /// Item directory does not exist
    #[error("Item directory not found for {id}: {path}")]
    ItemMissing { id: String, path: PathBuf },

    /// Build command could not be started
    #[error("Build command `{command}` could not be started for {id}: {reason}")]
    CommandUnavailable {
        id: String,
        command: String,
        reason: String,
    },

    /// Build command exited with a failure status
    #[error("Build of {id} failed (exit code {code:?}): {reason}")]
    CommandFailed {
        id: String,
        code: Option<i32>,
        reason: String,
    },

    /// Build finished but declared artifacts are missing
    #[error("Build of {id} is missing artifacts: {}", missing.join(", "))]
    MissingArtifacts { id: String, missing: Vec<String> },

    /// Empty build command configured
    #[error("Build command is empty")]
    EmptyCommand,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (build stamp)
    #[error("Build stamp error: {0}")]
    Json(#[from] serde_json::Error),
}
