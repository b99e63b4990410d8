//! Computation Executor: runs matched pairs and files their output.
//!
//! A job moves `Pending -> Building -> Running -> Classifying` and ends
//! `Persisted` or `Failed`. Computational failures of the runner end
//! `Persisted` with an `Error` result kind; only infrastructure failures
//! (builds, relocation, index writes) end `Failed` and surface as
//! [`ExecError`].

mod error;
mod job;
mod process;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use kimrun_results::{IndexEntry, ResultIndex, ResultKind, ResultSink};
use tracing::{debug, Instrument};

pub use error::{ExecError, Result};
pub use job::{Job, JobRecord, JobState};

use crate::domain::Item;
use crate::job_id::JobId;
use crate::matching::MatchedPair;
use crate::obs::{self, JobSpan};
use crate::registry::Registry;
use process::{ProcessOutput, ProcessSpec};

/// Where a successful runner leaves its results, relative to its cwd.
pub const RESULTS_FILE: &str = "output/results.json";
pub const STDOUT_FILE: &str = "pipeline.stdout";
pub const STDERR_FILE: &str = "pipeline.stderr";
pub const RECORD_FILE: &str = "pipeline.json";

/// Directory names never copied into a job's working directory.
const SKIP_ON_COPY: [&str; 1] = [".kimrun"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    /// Parent of per-job working directories.
    pub scratch_root: PathBuf,
    /// Echo runner output while capturing it.
    pub verbose: bool,
    /// Run inside the runner's own directory and skip the result tree.
    pub inplace: bool,
    /// 0 = unbounded.
    pub timeout_secs: u64,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir(),
            verbose: false,
            inplace: false,
            timeout_secs: 0,
        }
    }
}

pub struct Executor {
    sink: ResultSink,
    index: Option<Arc<dyn ResultIndex>>,
    options: ExecOptions,
}

impl Executor {
    pub fn new(sink: ResultSink, options: ExecOptions) -> Self {
        Self {
            sink,
            index: None,
            options,
        }
    }

    /// Mirror test results into `index`.
    pub fn with_index(mut self, index: Arc<dyn ResultIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn options(&self) -> &ExecOptions {
        &self.options
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    /// Build, run, classify and persist one matched pair.
    pub async fn execute(&self, registry: &mut Registry, pair: MatchedPair) -> Result<Job> {
        let (runner, subject) = pair.into_parts();
        let job_id = JobId::new(&runner.id, &subject.id)?;
        let mut job = Job::new(runner.id.clone(), subject.id.clone(), job_id.clone());

        let outcome = self
            .run_stages(registry, &mut job, runner, subject)
            .instrument(obs::job_span(&job_id.to_string()))
            .await;

        match outcome {
            Ok(()) => Ok(job),
            Err(e) => {
                job.transition(JobState::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        registry: &mut Registry,
        job: &mut Job,
        runner: Item,
        subject: Item,
    ) -> Result<()> {
        job.transition(JobState::Building);
        let runner = registry.build(&runner.id).await.map_err(ExecError::Build)?;
        let subject = registry.build(&subject.id).await.map_err(ExecError::Build)?;

        job.transition(JobState::Running);
        let scratch = if self.options.inplace {
            None
        } else {
            fs::create_dir_all(&self.options.scratch_root)?;
            let dir = tempfile::Builder::new()
                .prefix("kimrun-job-")
                .tempdir_in(&self.options.scratch_root)?;
            copy_tree(&runner.path, dir.path())?;
            Some(dir)
        };
        let workdir = match &scratch {
            Some(dir) => fs::canonicalize(dir.path())?,
            None => fs::canonicalize(&runner.path)?,
        };
        clear_results(&workdir)?;

        let started_at = Utc::now();
        let output = process::run(ProcessSpec {
            program: workdir.join(runner.metadata.executable()),
            cwd: workdir.clone(),
            stdin: format!("{}\n", subject.id),
            env: vec![
                ("KIMRUN_SUBJECT", subject.id.format()),
                ("KIMRUN_SUBJECT_PATH", absolute(&subject.path)),
                ("KIMRUN_RUNNER_PATH", absolute(&runner.path)),
            ],
            echo: self.options.verbose,
            timeout_secs: self.options.timeout_secs,
        })
        .await;
        let finished_at = Utc::now();
        job.runtime_seconds = output.elapsed.as_secs_f64();

        job.transition(JobState::Classifying);
        let failure = classify(&output, &workdir, self.options.timeout_secs);
        let kind = match &failure {
            None => job.job_id.kind(),
            Some(reason) => {
                debug!(reason = %reason, "classified as error");
                ResultKind::Error
            }
        };
        job.result_kind = Some(kind);
        job.job_id = job.job_id.with_kind(kind);

        let record = JobRecord {
            runner: runner.id.format(),
            subject: subject.id.format(),
            job_id: job.job_id.to_string(),
            result_kind: kind,
            runtime_seconds: job.runtime_seconds,
            exit_code: output.exit_code,
            started_at,
            finished_at,
            error: failure,
        };
        write_capture(&workdir, &output, &record)?;

        let destination = if self.options.inplace {
            workdir
        } else {
            let job_key = job.job_id.to_string();
            let destination = self.sink.persist(&job_key, kind, &workdir)?;
            if kind == ResultKind::TestResult {
                if let Some(index) = &self.index {
                    let entry =
                        IndexEntry::new(job_key, kind, destination.display().to_string());
                    index.record(entry).await?;
                }
            }
            destination
        };

        obs::emit_job_finished(
            &job.job_id.to_string(),
            &kind.to_string(),
            job.runtime_seconds,
            &destination.display().to_string(),
        );
        job.output_path = Some(destination);
        job.transition(JobState::Persisted);
        Ok(())
    }
}

/// `None` when the run counts as a success, otherwise the reason it does not.
fn classify(output: &ProcessOutput, workdir: &Path, timeout_secs: u64) -> Option<String> {
    if let Some(reason) = &output.spawn_error {
        return Some(reason.clone());
    }
    if output.timed_out {
        return Some(format!("runner timed out after {timeout_secs} seconds"));
    }
    if !output.success {
        return Some(match output.exit_code {
            Some(code) => format!("runner exited with code {code}"),
            None => "runner terminated by signal".to_string(),
        });
    }
    let text = match fs::read_to_string(workdir.join(RESULTS_FILE)) {
        Ok(text) => text,
        Err(_) => return Some(format!("{RESULTS_FILE} was not produced")),
    };
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(_) => None,
        Err(e) => Some(format!("{RESULTS_FILE} is not valid JSON: {e}")),
    }
}

fn write_capture(workdir: &Path, output: &ProcessOutput, record: &JobRecord) -> Result<()> {
    let _span = JobSpan::enter(&record.job_id);

    let mut stderr = output.stderr.clone();
    if let Some(reason) = &output.spawn_error {
        stderr.push_str(reason);
        stderr.push('\n');
    }
    fs::write(workdir.join(STDOUT_FILE), &output.stdout)?;
    fs::write(workdir.join(STDERR_FILE), stderr)?;
    fs::write(workdir.join(RECORD_FILE), serde_json::to_string_pretty(record)?)?;
    debug!(workdir = %workdir.display(), "captured output written");
    Ok(())
}

/// Leave an empty `output/` so only this run can produce the results file.
fn clear_results(workdir: &Path) -> std::io::Result<()> {
    let results = workdir.join(RESULTS_FILE);
    if results.is_file() {
        debug!(path = %results.display(), "removing results left by an earlier run");
        fs::remove_file(&results)?;
    }
    if let Some(parent) = results.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn absolute(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Copy the contents of `from` into the existing directory `to`.
fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if SKIP_ON_COPY.iter().any(|skip| name == *skip) {
            continue;
        }
        let source = entry.path();
        let target = to.join(&name);
        if source.is_dir() {
            fs::create_dir_all(&target)?;
            copy_tree(&source, &target)?;
        } else {
            fs::copy(&source, &target)?;
        }
    }
    Ok(())
}
