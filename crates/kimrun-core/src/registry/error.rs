//! Registry error types.

use thiserror::Error;

use crate::domain::MalformedIdentifier;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Identifier(#[from] MalformedIdentifier),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid metadata for {id}: {reason}")]
    InvalidMetadata { id: String, reason: String },

    #[error("Driver {driver} of {id} not found")]
    DriverMissing { id: String, driver: String },

    #[error(transparent)]
    Build(#[from] kimrun_build::BuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
