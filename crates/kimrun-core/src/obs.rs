//! Structured observability hooks for matching, builds and job lifecycle.
//!
//! Events are emitted at `info!` level with an `event` field naming them,
//! so they can be filtered with `RUST_LOG` and parsed from JSON output.

use tracing::info;

/// RAII guard that enters a job-scoped tracing span.
///
/// ```ignore
/// let _span = JobSpan::enter("TE_000000000001_000-and-MO_000000000002_000-0a1b2c3d4e5f-tr");
/// // every event until drop carries job_id
/// ```
pub struct JobSpan {
    _span: tracing::span::EnteredSpan,
}

impl JobSpan {
    pub fn enter(job_id: &str) -> Self {
        Self {
            _span: job_span(job_id).entered(),
        }
    }
}

/// Job-scoped span, for instrumenting futures that cross await points.
pub fn job_span(job_id: &str) -> tracing::Span {
    tracing::info_span!("kimrun.job", job_id = %job_id)
}

/// Emit event: a runner/subject pair was evaluated.
pub fn emit_match_evaluated(runner: &str, subject: &str, matched: bool, reason: Option<&str>) {
    info!(
        event = "match.evaluated",
        runner = %runner,
        subject = %subject,
        matched = matched,
        reason = reason.unwrap_or(""),
    );
}

/// Emit event: a job moved between states.
pub fn emit_job_transition(job_id: &str, from: &str, to: &str) {
    info!(event = "job.transition", job_id = %job_id, from = %from, to = %to);
}

/// Emit event: a job reached a terminal state.
pub fn emit_job_finished(job_id: &str, result_kind: &str, runtime_seconds: f64, output: &str) {
    info!(
        event = "job.finished",
        job_id = %job_id,
        result_kind = %result_kind,
        runtime_seconds = runtime_seconds,
        output = %output,
    );
}

/// Emit event: an item build completed. `ran` is false when a valid build
/// stamp made the build a no-op.
pub fn emit_build_finished(item: &str, duration_ms: u64, ran: bool, success: bool) {
    if success {
        info!(event = "build.finished", item = %item, duration_ms = duration_ms, ran = ran, success = true);
    } else {
        tracing::warn!(event = "build.finished", item = %item, duration_ms = duration_ms, ran = ran, success = false);
    }
}
