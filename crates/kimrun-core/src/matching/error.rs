//! Fatal matching errors. A mismatch is not an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    /// The live probe could not even be attempted.
    #[error("Probe of {subject} failed to run: {reason}")]
    Probe { subject: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MatchError>;
