//! Executor error types. A computational failure is not an error; it is
//! persisted as an `Error` result.

use kimrun_results::{IndexError, SinkError};
use thiserror::Error;

use crate::job_id::JobIdError;
use crate::registry::RegistryError;

#[derive(Error, Debug)]
pub enum ExecError {
    /// Building the runner, subject, or a driver failed
    #[error(transparent)]
    Build(RegistryError),

    #[error(transparent)]
    JobId(#[from] JobIdError),

    /// Moving the working directory into the result tree failed
    #[error("Relocation failed: {0}")]
    Relocation(#[from] SinkError),

    /// Recording the result in the index failed
    #[error("Index update failed: {0}")]
    Index(#[from] IndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job record error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExecError>;
