//! kimrun Core Library
//!
//! Pairs runners (Tests and Verification Checks) with subjects (Models and
//! Simulator Models), decides whether each pair is a valid match, and runs
//! accepted pairs as build-and-run jobs whose output lands in the result
//! tree.
//!
//! ## Layer 2 - Domain/Orchestration
//!
//! Control flow: [`Registry`] resolves identifiers, every involved item is
//! built, [`MatchEngine`] filters the candidate pairs, and [`Executor`]
//! runs each accepted pair under a [`JobId`].

pub mod config;
pub mod domain;
pub mod executor;
pub mod job_id;
pub mod matching;
pub mod obs;
pub mod pipeline;
pub mod registry;
pub mod telemetry;

pub use config::{ConfigError, KimConfig};
pub use domain::{
    strip_version, Identifier, Item, ItemKind, ItemMetadata, Lineage, MalformedIdentifier,
    MetadataError, SimulatorConstraint, Version, VersionConstraint,
};
pub use executor::{ExecError, ExecOptions, Executor, Job, JobRecord, JobState};
pub use job_id::{JobId, JobIdError};
pub use matching::{
    DeclaredOnly, Diagnostic, MatchEngine, MatchError, MatchResult, MatchedPair, NativeInterface,
    ProbeOutcome, ProcessInterface,
};
pub use obs::{
    emit_build_finished, emit_job_finished, emit_job_transition, emit_match_evaluated, JobSpan,
};
pub use pipeline::{MatchReport, Mismatch, Pipeline, PipelineError, RunReport};
pub use registry::{Registry, RegistryError};
pub use telemetry::init_tracing;

pub use kimrun_build::{BuildError, BuildState, Builder, MakeBuilder};
pub use kimrun_results::{ResultIndex, ResultKind, ResultSink, SurrealResultIndex};
