//! Job state and the `pipeline.json` record.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use kimrun_results::ResultKind;
use serde::{Deserialize, Serialize};

use crate::domain::Identifier;
use crate::job_id::JobId;
use crate::obs;

/// Lifecycle of a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Building,
    Running,
    Classifying,
    Persisted,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Persisted | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Building => "building",
            JobState::Running => "running",
            JobState::Classifying => "classifying",
            JobState::Persisted => "persisted",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of a runner against a subject.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub runner: Identifier,
    pub subject: Identifier,
    /// Expected-kind id until classification, actual-kind id afterwards.
    pub job_id: JobId,
    pub result_kind: Option<ResultKind>,
    pub runtime_seconds: f64,
    pub output_path: Option<PathBuf>,
    pub state: JobState,
}

impl Job {
    pub(crate) fn new(runner: Identifier, subject: Identifier, job_id: JobId) -> Self {
        Self {
            runner,
            subject,
            job_id,
            result_kind: None,
            runtime_seconds: 0.0,
            output_path: None,
            state: JobState::Pending,
        }
    }

    pub(crate) fn transition(&mut self, to: JobState) {
        obs::emit_job_transition(&self.job_id.to_string(), self.state.as_str(), to.as_str());
        self.state = to;
    }
}

/// Contents of `pipeline.json`, written next to every job's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub runner: String,
    pub subject: String,
    pub job_id: String,
    pub result_kind: ResultKind,
    pub runtime_seconds: f64,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Why the job was classified as an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
