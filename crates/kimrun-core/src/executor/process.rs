//! Running a runner executable with captured (and optionally echoed) output.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Grace period for output readers once a timed-out child has been killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

pub(crate) struct ProcessSpec {
    pub program: PathBuf,
    pub cwd: PathBuf,
    pub stdin: String,
    pub env: Vec<(&'static str, String)>,
    pub echo: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Default)]
pub(crate) struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// Set when the process could not be started at all.
    pub spawn_error: Option<String>,
    pub elapsed: Duration,
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Read `reader` to EOF, line by line as raw bytes, so output that is not
/// UTF-8 never closes the pipe early.
fn capture<R>(reader: Option<R>, stream: Stream, echo: bool) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(reader) = reader else {
            return String::new();
        };
        let mut reader = BufReader::new(reader);
        let mut captured = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if echo {
                        let text = String::from_utf8_lossy(&line);
                        let text = text.trim_end_matches('\n');
                        match stream {
                            Stream::Stdout => println!("{text}"),
                            Stream::Stderr => eprintln!("{text}"),
                        }
                    }
                    captured.extend_from_slice(&line);
                }
                Err(e) => {
                    debug!(error = %e, "output stream closed");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&captured).into_owned()
    })
}

async fn drain(mut handle: JoinHandle<String>, bounded: bool) -> String {
    if !bounded {
        return handle.await.unwrap_or_default();
    }
    match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

pub(crate) async fn run(spec: ProcessSpec) -> ProcessOutput {
    let start = Instant::now();

    let mut command = Command::new(&spec.program);
    command
        .current_dir(&spec.cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ProcessOutput {
                spawn_error: Some(format!("cannot start {}: {}", spec.program.display(), e)),
                elapsed: start.elapsed(),
                ..ProcessOutput::default()
            }
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(spec.stdin.as_bytes()).await {
            debug!(error = %e, "runner did not read stdin");
        }
    }

    let stdout = capture(child.stdout.take(), Stream::Stdout, spec.echo);
    let stderr = capture(child.stderr.take(), Stream::Stderr, spec.echo);

    let waited = if spec.timeout_secs > 0 {
        match tokio::time::timeout(Duration::from_secs(spec.timeout_secs), child.wait()).await {
            Ok(status) => Some(status),
            Err(_) => {
                warn!(timeout_secs = spec.timeout_secs, "runner timed out, killing");
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "kill after timeout failed");
                }
                None
            }
        }
    } else {
        Some(child.wait().await)
    };

    let timed_out = waited.is_none();
    let stdout = drain(stdout, timed_out).await;
    let stderr = drain(stderr, timed_out).await;
    let elapsed = start.elapsed();

    match waited {
        Some(Ok(status)) => ProcessOutput {
            exit_code: status.code(),
            success: status.success(),
            stdout,
            stderr,
            timed_out: false,
            spawn_error: None,
            elapsed,
        },
        Some(Err(e)) => ProcessOutput {
            stdout,
            stderr,
            spawn_error: Some(format!("waiting for {} failed: {}", spec.program.display(), e)),
            elapsed,
            ..ProcessOutput::default()
        },
        None => ProcessOutput {
            stdout,
            stderr,
            timed_out: true,
            elapsed,
            ..ProcessOutput::default()
        },
    }
}
