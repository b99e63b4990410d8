//! Error types for kimrun-results

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while relocating a job's output into the result tree.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The job's working directory does not exist
    #[error("Source directory missing: {0}")]
    SourceMissing(PathBuf),

    /// Job id cannot be used as a directory name
    #[error("Invalid job id for result path: {0}")]
    InvalidJobId(String),

    /// Moving an entry into the result tree failed
    #[error("Failed to move {from} to {to}: {source}")]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by result index backends.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Database connection error
    #[error("Index connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Index schema setup failed: {0}")]
    SchemaSetup(String),

    /// Backend query or write failure
    #[error("Index backend error: {0}")]
    Backend(String),
}

impl From<surrealdb::Error> for IndexError {
    fn from(err: surrealdb::Error) -> Self {
        IndexError::Backend(err.to_string())
    }
}
