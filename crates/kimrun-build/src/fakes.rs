//! In-memory fake builder (testing only)
//!
//! `RecordingBuilder` never runs a command. It records every request in
//! order, fails for ids registered with [`RecordingBuilder::fail_on`], and
//! otherwise reports the item as built.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::BuildError;
use crate::{BuildOutcome, BuildRequest, BuildStamp, Builder, Result};

#[derive(Debug, Default)]
pub struct RecordingBuilder {
    requests: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every build of `id` fail.
    pub fn fail_on(self, id: impl Into<String>) -> Self {
        self.failing.lock().unwrap().insert(id.into());
        self
    }

    /// Ids built so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Builder for RecordingBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<BuildOutcome> {
        self.requests.lock().unwrap().push(request.id.clone());

        if self.failing.lock().unwrap().contains(&request.id) {
            return Err(BuildError::CommandFailed {
                id: request.id.clone(),
                code: Some(2),
                reason: "forced failure".to_string(),
            });
        }

        Ok(BuildOutcome::Built(BuildStamp {
            digest: "0".repeat(64),
            built_at: Utc::now(),
        }))
    }
}
