//! `make`-driven builder.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::error::BuildError;
use crate::stamp;
use crate::{BuildOutcome, BuildRequest, Builder, Result};

/// Files whose presence means the item has something to compile.
const BUILD_FILES: [&str; 4] = ["Makefile", "makefile", "GNUmakefile", "CMakeLists.txt"];

/// Lines of stderr kept in a failure reason.
const REASON_TAIL_LINES: usize = 20;

/// Runs a build command (default `make`) inside the item directory.
///
/// Items without any build file are considered built once their declared
/// artifacts are present.
#[derive(Debug, Clone)]
pub struct MakeBuilder {
    command: Vec<String>,
}

impl Default for MakeBuilder {
    fn default() -> Self {
        Self {
            command: vec!["make".to_string()],
        }
    }
}

impl MakeBuilder {
    /// Create a builder running `command` (first element is the executable).
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(BuildError::EmptyCommand);
        }
        Ok(Self { command })
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    async fn run_command(&self, request: &BuildRequest) -> Result<()> {
        let exe = &self.command[0];
        let args = &self.command[1..];

        let output = Command::new(exe)
            .args(args)
            .current_dir(&request.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BuildError::CommandUnavailable {
                id: request.id.clone(),
                command: self.command.join(" "),
                reason: e.to_string(),
            })?;

        debug!(
            id = %request.id,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "build command finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = tail(&stderr, REASON_TAIL_LINES);
            let reason = if reason.is_empty() {
                "build command reported failure".to_string()
            } else {
                reason
            };
            return Err(BuildError::CommandFailed {
                id: request.id.clone(),
                code: output.status.code(),
                reason,
            });
        }
        Ok(())
    }

    fn check_artifacts(request: &BuildRequest) -> Result<()> {
        let missing: Vec<String> = request
            .artifacts
            .iter()
            .filter(|artifact| !request.path.join(artifact).exists())
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BuildError::MissingArtifacts {
                id: request.id.clone(),
                missing,
            })
        }
    }
}

fn has_build_file(dir: &Path) -> bool {
    BUILD_FILES.iter().any(|name| dir.join(name).is_file())
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[async_trait]
impl Builder for MakeBuilder {
    #[instrument(skip(self, request), fields(id = %request.id))]
    async fn build(&self, request: &BuildRequest) -> Result<BuildOutcome> {
        if !request.path.is_dir() {
            return Err(BuildError::ItemMissing {
                id: request.id.clone(),
                path: request.path.clone(),
            });
        }

        if let Some(existing) = stamp::current_stamp(&request.path)? {
            debug!("build stamp still valid, skipping");
            return Ok(BuildOutcome::UpToDate(existing));
        }

        let result = if has_build_file(&request.path) {
            info!(command = %self.command.join(" "), "building item");
            self.run_command(request).await
        } else {
            debug!("no build file, checking artifacts only");
            Ok(())
        }
        .and_then(|_| Self::check_artifacts(request));

        match result {
            Ok(()) => {
                let stamp = stamp::write_stamp(&request.path)?;
                info!(digest = %&stamp.digest[..12], "item built");
                Ok(BuildOutcome::Built(stamp))
            }
            Err(err) => {
                warn!(error = %err, "build failed");
                stamp::write_failure(&request.path, &err.to_string())?;
                Err(err)
            }
        }
    }
}
