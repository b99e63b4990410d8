//! kimrun-results: where finished jobs land.
//!
//! This crate is the persistence layer of the kimrun pipeline. Every job
//! resolves to one of three result kinds, and its working directory is
//! relocated into the matching area of the result tree. Test results can
//! additionally be mirrored into a queryable index.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: never losing a job's output.
//!
//! ## Key Components
//!
//! - `ResultKind`: `tr` / `vr` / `er` classification and its storage area
//! - `ResultSink`: directory tree keyed by result kind and job id
//! - `ResultIndex`: keyed index of persisted jobs (`SurrealResultIndex`, fakes)

mod error;
pub mod fakes;
mod index;
mod kind;
mod sink;
mod surreal_index;

pub use error::{IndexError, SinkError};
pub use index::{IndexEntry, IndexResult, ResultIndex};
pub use kind::ResultKind;
pub use sink::ResultSink;
pub use surreal_index::SurrealResultIndex;
