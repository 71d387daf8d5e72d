// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job records: bounded-retry wrappers around run attempts

use crate::agent::{AgentId, ProviderKind};
use crate::define_id;
use crate::records::RecordError;
use crate::run::RunId;
use serde::{Deserialize, Serialize};
use std::path::Path;

define_id! {
    /// Job identifier (`job-` prefix).
    pub struct JobId("job-");
}

/// Maximum number of run attempts per job.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Execution,
    Heartbeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Canceled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Running,
    Succeeded,
    Failed,
    Canceled,
}

/// What the job is asked to accomplish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub goal: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deliverables: Vec<String>,
    /// Required provider family for the worker (e.g. "claude", "cmd").
    pub worker_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_agent_id: Option<AgentId>,
    #[serde(default)]
    pub permission_level: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_refs: Vec<String>,
    pub job_kind: JobKind,
}

/// One run attempt inside a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based, contiguous.
    pub number: u32,
    pub run_id: RunId,
    pub provider: ProviderKind,
    /// `provider_schema` or `prompt_only`.
    pub output_format: String,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    pub status: AttemptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Persisted `job.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub spec: JobSpec,
    pub status: JobStatus,
    #[serde(default)]
    pub cancellation_requested: bool,
    #[serde(default)]
    pub current_attempt: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_result_relpath: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

impl JobRecord {
    pub fn new(job_id: JobId, spec: JobSpec, created_at: String) -> Self {
        Self {
            job_id,
            spec,
            status: JobStatus::Queued,
            cancellation_requested: false,
            current_attempt: 0,
            attempts: Vec::new(),
            final_result_relpath: None,
            created_at,
            ended_at: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RecordError::io(path, e))?;
        serde_yaml::from_str(&text).map_err(|e| RecordError::yaml(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<(), RecordError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RecordError::io(path, e))?;
        }
        let text = serde_yaml::to_string(self).map_err(|e| RecordError::yaml(path, e))?;
        std::fs::write(path, text).map_err(|e| RecordError::io(path, e))
    }

    /// Begin the next attempt. Returns the attempt number, or `None` when
    /// the job is terminal or the attempt cap is reached.
    pub fn begin_attempt(
        &mut self,
        run_id: RunId,
        provider: ProviderKind,
        output_format: &str,
        started_at: String,
    ) -> Option<u32> {
        if self.status.is_terminal() || self.attempts.len() as u32 >= MAX_ATTEMPTS {
            return None;
        }
        let number = self.attempts.len() as u32 + 1;
        self.attempts.push(AttemptRecord {
            number,
            run_id,
            provider,
            output_format: output_format.to_string(),
            started_at,
            ended_at: None,
            status: AttemptStatus::Running,
            error: None,
        });
        self.current_attempt = number;
        self.status = JobStatus::Running;
        Some(number)
    }

    /// Close the current attempt with a terminal attempt status.
    pub fn end_attempt(&mut self, status: AttemptStatus, error: Option<String>, ended_at: String) {
        if let Some(attempt) = self.attempts.last_mut() {
            attempt.status = status;
            attempt.error = error;
            attempt.ended_at = Some(ended_at);
        }
    }

    /// Finalize the job. A terminal job never re-enters.
    pub fn finalize(
        &mut self,
        status: JobStatus,
        final_result_relpath: String,
        ended_at: String,
    ) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        debug_assert!(status.is_terminal());
        self.status = status;
        self.final_result_relpath = Some(final_result_relpath);
        self.ended_at = Some(ended_at);
        true
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
