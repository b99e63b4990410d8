//! End-to-end runs: build, run, classify, persist.
#![cfg(unix)]

mod common;

use std::fs;
use std::sync::Arc;

use common::{id, Repo, FAILING_SCRIPT, SUCCESS_SCRIPT};
use kimrun_core::executor::{RECORD_FILE, RESULTS_FILE, STDERR_FILE, STDOUT_FILE};
use kimrun_core::{
    ExecOptions, Executor, JobRecord, JobState, MatchEngine, MatchResult, MatchedPair, Registry,
    ResultKind, ResultSink,
};
use kimrun_results::fakes::MemoryResultIndex;
use kimrun_results::ResultIndex;
use serde_json::json;
use tempfile::TempDir;

struct Fixture {
    repo: Repo,
    results: TempDir,
    scratch: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let repo = Repo::new();
        repo.add("EAM_Al__MO_000000000002_000", json!({"species": ["Al"]}));
        Self {
            repo,
            results: TempDir::new().unwrap(),
            scratch: TempDir::new().unwrap(),
        }
    }

    fn executor(&self, options: ExecOptions) -> Executor {
        let sink = ResultSink::new(self.results.path()).unwrap();
        Executor::new(
            sink,
            ExecOptions {
                scratch_root: self.scratch.path().to_path_buf(),
                ..options
            },
        )
    }

    async fn pair(&self, registry: &Registry, runner: &str, subject: &str) -> MatchedPair {
        let engine = MatchEngine::declared_only(self.scratch.path());
        let runner = registry.get(&id(runner)).unwrap().clone();
        let subject = registry.get(&id(subject)).unwrap().clone();
        match engine.valid_match(registry, &runner, &subject).await.unwrap() {
            MatchResult::Match(pair) => pair,
            MatchResult::Mismatch(d) => panic!("unexpected mismatch: {d}"),
        }
    }
}

#[tokio::test]
async fn test_successful_test_run_is_a_test_result() {
    let fx = Fixture::new();
    fx.repo.add_runner(
        "Lattice_Al__TE_000000000001_000",
        json!({"species": ["Al"]}),
        SUCCESS_SCRIPT,
    );
    let mut registry = fx.repo.registry();
    let pair = fx
        .pair(
            &registry,
            "Lattice_Al__TE_000000000001_000",
            "EAM_Al__MO_000000000002_000",
        )
        .await;

    let job = fx
        .executor(ExecOptions::default())
        .execute(&mut registry, pair)
        .await
        .unwrap();

    assert_eq!(job.state, JobState::Persisted);
    assert_eq!(job.result_kind, Some(ResultKind::TestResult));
    assert!(job.runtime_seconds > 0.0);

    let output = job.output_path.clone().unwrap();
    assert!(output.starts_with(fx.results.path().join("test-results")));
    assert!(job.job_id.to_string().ends_with("-tr"));
    assert_eq!(
        output.file_name().unwrap().to_str().unwrap(),
        job.job_id.to_string()
    );

    let results = fs::read_to_string(output.join(RESULTS_FILE)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&results).unwrap();
    assert_eq!(value["subject"], "EAM_Al__MO_000000000002_000");
    assert!(value["subject_path"]
        .as_str()
        .unwrap()
        .ends_with("EAM_Al__MO_000000000002_000"));

    let stdout = fs::read_to_string(output.join(STDOUT_FILE)).unwrap();
    assert!(stdout.contains("computed for EAM_Al__MO_000000000002_000"));

    let record: JobRecord =
        serde_json::from_str(&fs::read_to_string(output.join(RECORD_FILE)).unwrap()).unwrap();
    assert_eq!(record.result_kind, ResultKind::TestResult);
    assert_eq!(record.exit_code, Some(0));
    assert!(record.error.is_none());
    assert!(record.finished_at >= record.started_at);

    // The runner's own directory is untouched.
    let runner_dir = fx
        .repo
        .root()
        .join("tests")
        .join("Lattice_Al__TE_000000000001_000");
    assert!(!runner_dir.join("output").exists());
    // Scratch working directories are cleaned up.
    assert_eq!(fs::read_dir(fx.scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failing_runner_is_persisted_as_error() {
    let fx = Fixture::new();
    fx.repo.add_runner(
        "Broken__TE_000000000001_000",
        json!({}),
        FAILING_SCRIPT,
    );
    let mut registry = fx.repo.registry();
    let pair = fx
        .pair(
            &registry,
            "Broken__TE_000000000001_000",
            "EAM_Al__MO_000000000002_000",
        )
        .await;

    let job = fx
        .executor(ExecOptions::default())
        .execute(&mut registry, pair)
        .await
        .unwrap();

    assert_eq!(job.result_kind, Some(ResultKind::Error));
    assert_eq!(job.state, JobState::Persisted);
    assert!(job.job_id.to_string().ends_with("-er"));
    let output = job.output_path.unwrap();
    assert!(output.starts_with(fx.results.path().join("errors")));

    let stderr = fs::read_to_string(output.join(STDERR_FILE)).unwrap();
    assert!(stderr.contains("diverged"));
    let record: JobRecord =
        serde_json::from_str(&fs::read_to_string(output.join(RECORD_FILE)).unwrap()).unwrap();
    assert_eq!(record.exit_code, Some(4));
    assert_eq!(record.error.as_deref(), Some("runner exited with code 4"));
}

#[tokio::test]
async fn test_missing_results_is_error() {
    let fx = Fixture::new();
    fx.repo.add_runner("Quiet__TE_000000000001_000", json!({}), "exit 0");
    let mut registry = fx.repo.registry();
    let pair = fx
        .pair(&registry, "Quiet__TE_000000000001_000", "EAM_Al__MO_000000000002_000")
        .await;

    let job = fx
        .executor(ExecOptions::default())
        .execute(&mut registry, pair)
        .await
        .unwrap();
    assert_eq!(job.result_kind, Some(ResultKind::Error));
}

#[tokio::test]
async fn test_missing_executable_is_error() {
    let fx = Fixture::new();
    fx.repo.add(
        "NoExe__TE_000000000001_000",
        json!({"executable": "does-not-exist"}),
    );
    let mut registry = fx.repo.registry();
    let pair = fx
        .pair(&registry, "NoExe__TE_000000000001_000", "EAM_Al__MO_000000000002_000")
        .await;

    let job = fx
        .executor(ExecOptions::default())
        .execute(&mut registry, pair)
        .await
        .unwrap();
    assert_eq!(job.result_kind, Some(ResultKind::Error));
    let stderr = fs::read_to_string(job.output_path.unwrap().join(STDERR_FILE)).unwrap();
    assert!(stderr.contains("cannot start"));
}

#[tokio::test]
async fn test_timeout_is_error() {
    let fx = Fixture::new();
    fx.repo.add_runner("Slow__TE_000000000001_000", json!({}), "exec sleep 30");
    let mut registry = fx.repo.registry();
    let pair = fx
        .pair(&registry, "Slow__TE_000000000001_000", "EAM_Al__MO_000000000002_000")
        .await;

    let job = fx
        .executor(ExecOptions {
            timeout_secs: 1,
            ..ExecOptions::default()
        })
        .execute(&mut registry, pair)
        .await
        .unwrap();
    assert_eq!(job.result_kind, Some(ResultKind::Error));
    assert!(job.runtime_seconds < 10.0);
}

#[tokio::test]
async fn test_verification_check_is_a_verification_result() {
    let fx = Fixture::new();
    fx.repo.add_runner("Memory__VC_000000000005_000", json!({}), SUCCESS_SCRIPT);
    let mut registry = fx.repo.registry();
    let pair = fx
        .pair(&registry, "Memory__VC_000000000005_000", "EAM_Al__MO_000000000002_000")
        .await;

    let job = fx
        .executor(ExecOptions::default())
        .execute(&mut registry, pair)
        .await
        .unwrap();
    assert_eq!(job.result_kind, Some(ResultKind::VerificationResult));
    assert!(job.job_id.to_string().ends_with("-vr"));
    assert!(job
        .output_path
        .unwrap()
        .starts_with(fx.results.path().join("verification-results")));
}

#[tokio::test]
async fn test_inplace_run_skips_result_tree() {
    let fx = Fixture::new();
    let runner_dir = fx.repo.add_runner(
        "Lattice_Al__TE_000000000001_000",
        json!({}),
        SUCCESS_SCRIPT,
    );
    let mut registry = fx.repo.registry();
    let pair = fx
        .pair(
            &registry,
            "Lattice_Al__TE_000000000001_000",
            "EAM_Al__MO_000000000002_000",
        )
        .await;

    let job = fx
        .executor(ExecOptions {
            inplace: true,
            ..ExecOptions::default()
        })
        .execute(&mut registry, pair)
        .await
        .unwrap();

    assert_eq!(job.result_kind, Some(ResultKind::TestResult));
    assert_eq!(
        job.output_path.unwrap(),
        fs::canonicalize(&runner_dir).unwrap()
    );
    assert!(runner_dir.join(RESULTS_FILE).is_file());
    assert!(runner_dir.join(RECORD_FILE).is_file());
    assert_eq!(
        fs::read_dir(fx.results.path().join("test-results"))
            .unwrap()
            .count(),
        0
    );
}

#[tokio::test]
async fn test_test_results_are_indexed_and_rerun_replaces() {
    let fx = Fixture::new();
    fx.repo.add_runner(
        "Lattice_Al__TE_000000000001_000",
        json!({}),
        SUCCESS_SCRIPT,
    );
    let mut registry = fx.repo.registry();
    let index = Arc::new(MemoryResultIndex::new());
    let executor = fx
        .executor(ExecOptions::default())
        .with_index(index.clone());

    for _ in 0..2 {
        let pair = fx
            .pair(
                &registry,
                "Lattice_Al__TE_000000000001_000",
                "EAM_Al__MO_000000000002_000",
            )
            .await;
        executor.execute(&mut registry, pair).await.unwrap();
    }

    assert_eq!(index.len(), 1);
    let entries = index.list(ResultKind::TestResult).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].job_id.ends_with("-tr"));
    assert_eq!(
        fs::read_dir(fx.results.path().join("test-results"))
            .unwrap()
            .count(),
        1
    );
}

#[tokio::test]
async fn test_build_failure_fails_job() {
    let fx = Fixture::new();
    fx.repo.add_runner(
        "Lattice_Al__TE_000000000001_000",
        json!({}),
        SUCCESS_SCRIPT,
    );
    let builder = Arc::new(
        kimrun_build::fakes::RecordingBuilder::new().fail_on("EAM_Al__MO_000000000002_000"),
    );
    let mut registry = fx.repo.registry_with(builder);
    let pair = fx
        .pair(
            &registry,
            "Lattice_Al__TE_000000000001_000",
            "EAM_Al__MO_000000000002_000",
        )
        .await;

    let err = fx
        .executor(ExecOptions::default())
        .execute(&mut registry, pair)
        .await
        .unwrap_err();
    assert!(matches!(err, kimrun_core::ExecError::Build(_)));
}

#[tokio::test]
async fn test_non_utf8_runner_output_is_a_test_result() {
    let fx = Fixture::new();
    fx.repo.add_runner(
        "Lattice_Al__TE_000000000001_000",
        json!({}),
        r#"printf 'energy \351V\n'
i=0
while [ $i -lt 20000 ]; do echo "step $i"; i=$((i+1)); done
mkdir -p output
echo '{"energy": -3.36}' > output/results.json
echo DONE"#,
    );
    let mut registry = fx.repo.registry();
    let pair = fx
        .pair(
            &registry,
            "Lattice_Al__TE_000000000001_000",
            "EAM_Al__MO_000000000002_000",
        )
        .await;

    let job = fx
        .executor(ExecOptions::default())
        .execute(&mut registry, pair)
        .await
        .unwrap();

    assert_eq!(job.result_kind, Some(ResultKind::TestResult));
    let stdout = fs::read_to_string(job.output_path.unwrap().join(STDOUT_FILE)).unwrap();
    assert!(stdout.starts_with("energy \u{FFFD}V\n"));
    assert!(stdout.contains("step 19999\n"));
    assert!(stdout.ends_with("DONE\n"));
}

#[tokio::test]
async fn test_leftover_results_do_not_count() {
    for inplace in [false, true] {
        let fx = Fixture::new();
        let runner_dir =
            fx.repo
                .add_runner("Idle__TE_000000000001_000", json!({}), "echo nothing to do");
        fs::create_dir_all(runner_dir.join("output")).unwrap();
        fs::write(runner_dir.join(RESULTS_FILE), r#"{"stale": true}"#).unwrap();

        let mut registry = fx.repo.registry();
        let pair = fx
            .pair(&registry, "Idle__TE_000000000001_000", "EAM_Al__MO_000000000002_000")
            .await;
        let job = fx
            .executor(ExecOptions {
                inplace,
                ..ExecOptions::default()
            })
            .execute(&mut registry, pair)
            .await
            .unwrap();

        assert_eq!(job.result_kind, Some(ResultKind::Error), "inplace = {inplace}");
        let record: JobRecord = serde_json::from_str(
            &fs::read_to_string(job.output_path.unwrap().join(RECORD_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(
            record.error.as_deref(),
            Some("output/results.json was not produced")
        );
    }
}
