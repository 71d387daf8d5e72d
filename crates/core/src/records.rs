// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Front-matter and YAML records scanned from the workspace

use crate::define_name;
use crate::envelope::Visibility;
use crate::run::RunId;
use crate::workspace::ProjectId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

define_name! {
    /// Artifact identifier from front-matter.
    pub struct ArtifactId;
}

define_name! {
    /// Review identifier (`inbox/reviews/<id>.yaml`).
    pub struct ReviewId;
}

define_name! {
    /// Help-request identifier (`inbox/help_requests/<id>.md`).
    pub struct HelpRequestId;
}

define_name! {
    /// Task identifier from task front-matter.
    pub struct TaskId;
}

/// Errors loading or parsing workspace records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("yaml error at {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("missing front-matter in {path}")]
    MissingFrontMatter { path: String },
}

impl RecordError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), source }
    }

    pub fn yaml(path: &Path, source: serde_yaml::Error) -> Self {
        Self::Yaml { path: path.display().to_string(), source }
    }
}

/// Split a markdown document into `(front_matter_yaml, body)`.
///
/// Front matter is delimited by a leading `---` line and a closing `---`
/// line. Returns `None` when the document carries no front matter.
pub fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("---")?;
    let rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n"))?;
    let end = rest.find("\n---")?;
    let yaml = &rest[..end];
    let body = rest[end + 4..].trim_start_matches(['\r', '\n']);
    Some((yaml, body))
}

/// Front-matter of `work/projects/<pid>/artifacts/<art>.md`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactFrontMatter {
    pub artifact_id: ArtifactId,
    #[serde(rename = "type")]
    pub artifact_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produced_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_pack_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ArtifactFrontMatter {
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let text = std::fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
        let (yaml, _) = split_front_matter(&text)
            .ok_or_else(|| RecordError::MissingFrontMatter { path: path.display().to_string() })?;
        serde_yaml::from_str(yaml).map_err(|e| RecordError::yaml(path, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Denied,
}

/// Parsed `inbox/reviews/<id>.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub review_id: ReviewId,
    pub created_at: String,
    pub decision: ReviewDecision,
    pub actor_id: String,
    pub actor_role: String,
    pub subject_kind: String,
    pub subject_artifact_id: ArtifactId,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ReviewRecord {
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let text = std::fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
        serde_yaml::from_str(&text).map_err(|e| RecordError::yaml(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<(), RecordError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RecordError::io(path, e))?;
        }
        let text = serde_yaml::to_string(self).map_err(|e| RecordError::yaml(path, e))?;
        std::fs::write(path, text).map_err(|e| RecordError::io(path, e))
    }
}

/// Front-matter of `inbox/help_requests/<id>.md`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpRequestFrontMatter {
    pub help_request_id: HelpRequestId,
    pub created_at: String,
    pub title: String,
    pub visibility: Visibility,
    pub requester: String,
    pub target_manager: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_pack_id: Option<String>,
}

impl HelpRequestFrontMatter {
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let text = std::fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
        let (yaml, _) = split_front_matter(&text)
            .ok_or_else(|| RecordError::MissingFrontMatter { path: path.display().to_string() })?;
        serde_yaml::from_str(yaml).map_err(|e| RecordError::yaml(path, e))
    }
}

/// Front-matter of `work/projects/<pid>/tasks/<task>.md`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFrontMatter {
    pub task_id: TaskId,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_task_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone_kind: Option<String>,
    #[serde(default)]
    pub requires_worktree_isolation: bool,
}

fn default_task_status() -> String {
    "open".to_string()
}

impl TaskFrontMatter {
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let text = std::fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
        let (yaml, _) = split_front_matter(&text)
            .ok_or_else(|| RecordError::MissingFrontMatter { path: path.display().to_string() })?;
        serde_yaml::from_str(yaml).map_err(|e| RecordError::yaml(path, e))
    }

    /// Worktree isolation is required for coding milestones or when the
    /// task opts in explicitly.
    pub fn needs_worktree(&self) -> bool {
        self.requires_worktree_isolation
            || self.milestone_kind.as_deref() == Some("coding")
    }
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
