// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run records: one subprocess invocation with its own journal

use crate::agent::{AgentId, ProviderKind};
use crate::define_id;
use crate::records::RecordError;
use crate::usage::UsageSummary;
use crate::workspace::ProjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

define_id! {
    /// Run identifier (`run-` prefix).
    pub struct RunId("run-");
}

define_id! {
    /// Context-pack identifier (`ctx-` prefix).
    pub struct ContextPackId("ctx-");
}

/// Run lifecycle status. Transitions are monotonic: `Running` moves to
/// exactly one terminal state; the only post-terminal change allowed is
/// the budget promotion `Ended -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Ended,
    Failed,
    Stopped,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Whether the transition `self -> to` is permitted.
    pub fn can_transition(&self, to: RunStatus) -> bool {
        match (self, to) {
            (RunStatus::Running, _) => true,
            // Budget hard-exceed promotion only.
            (RunStatus::Ended, RunStatus::Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Ended => "ended",
            RunStatus::Failed => "failed",
            RunStatus::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// What the run executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunSpec {
    /// Spawn `argv[0]` with `argv[1..]` directly.
    Command {
        argv: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workdir_rel: Option<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        env: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stdin: Option<String>,
    },
    /// Drive a provider app-server with a prompt.
    Prompt {
        text: String,
        model: String,
        #[serde(default)]
        worktree: bool,
    },
}

/// Persisted `run.yaml`: the durable record of one subprocess invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub project_id: ProjectId,
    pub run_id: RunId,
    pub provider: ProviderKind,
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_pack_id: Option<ContextPackId>,
    pub status: RunStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    pub spec: RunSpec,
    /// Final usage, set at finalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageSummary>,
    /// Context-cycle signal kinds observed during the run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_cycles: Vec<String>,
    /// Journal path relative to the project directory.
    pub events_relpath: String,
}

impl RunRecord {
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

    /// Apply a status transition, enforcing monotonicity.
    ///
    /// Returns `false` (and leaves the record untouched) when the
    /// transition is not permitted.
    pub fn transition(&mut self, to: RunStatus, ended_at: Option<String>) -> bool {
        if !self.status.can_transition(to) {
            return false;
        }
        self.status = to;
        if to.is_terminal() {
            if let Some(ts) = ended_at {
                self.ended_at = Some(ts);
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
