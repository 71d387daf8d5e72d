// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace filesystem layout
//!
//! The filesystem owns truth; every other store is derived. This module is
//! the single place that knows where things live under a workspace root.

use crate::define_name;
use crate::job::JobId;
use crate::run::{ContextPackId, RunId};
use std::path::{Path, PathBuf};

define_name! {
    /// Project identifier: the directory name under `work/projects/`.
    pub struct ProjectId;
}

/// Typed path composition for a single workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // -- company / org --

    pub fn company_yaml(&self) -> PathBuf {
        self.root.join("company").join("company.yaml")
    }

    pub fn policy_yaml(&self) -> PathBuf {
        self.root.join("company").join("policy.yaml")
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("org").join("agents")
    }

    pub fn agent_yaml(&self, agent_id: &str) -> PathBuf {
        self.agents_dir().join(agent_id).join("agent.yaml")
    }

    // -- projects --

    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("work").join("projects")
    }

    pub fn project_dir(&self, project: &ProjectId) -> PathBuf {
        self.projects_dir().join(project.as_str())
    }

    pub fn project_yaml(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join("project.yaml")
    }

    pub fn tasks_dir(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join("tasks")
    }

    pub fn artifacts_dir(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join("artifacts")
    }

    pub fn artifact_md(&self, project: &ProjectId, artifact: &str) -> PathBuf {
        self.artifacts_dir(project).join(format!("{artifact}.md"))
    }

    pub fn context_pack_manifest(&self, project: &ProjectId, pack: &ContextPackId) -> PathBuf {
        self.project_dir(project)
            .join("context_packs")
            .join(pack.as_str())
            .join("manifest.yaml")
    }

    // -- runs --

    pub fn runs_dir(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join("runs")
    }

    pub fn run_dir(&self, project: &ProjectId, run: &RunId) -> PathBuf {
        self.runs_dir(project).join(run.as_str())
    }

    pub fn run_yaml(&self, project: &ProjectId, run: &RunId) -> PathBuf {
        self.run_dir(project, run).join("run.yaml")
    }

    pub fn events_jsonl(&self, project: &ProjectId, run: &RunId) -> PathBuf {
        self.run_dir(project, run).join("events.jsonl")
    }

    pub fn run_outputs_dir(&self, project: &ProjectId, run: &RunId) -> PathBuf {
        self.run_dir(project, run).join("outputs")
    }

    pub fn stop_flag(&self, project: &ProjectId, run: &RunId) -> PathBuf {
        self.run_outputs_dir(project, run).join("stop_requested.flag")
    }

    // -- jobs --

    pub fn jobs_dir(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join("jobs")
    }

    pub fn job_dir(&self, project: &ProjectId, job: &JobId) -> PathBuf {
        self.jobs_dir(project).join(job.as_str())
    }

    pub fn job_yaml(&self, project: &ProjectId, job: &JobId) -> PathBuf {
        self.job_dir(project, job).join("job.yaml")
    }

    pub fn job_result_json(&self, project: &ProjectId, job: &JobId) -> PathBuf {
        self.job_dir(project, job).join("result.json")
    }

    pub fn job_manager_digest_json(&self, project: &ProjectId, job: &JobId) -> PathBuf {
        self.job_dir(project, job).join("manager_digest.json")
    }

    pub fn job_heartbeat_report_json(&self, project: &ProjectId, job: &JobId) -> PathBuf {
        self.job_dir(project, job).join("heartbeat_report.json")
    }

    // -- inbox --

    pub fn reviews_dir(&self) -> PathBuf {
        self.root.join("inbox").join("reviews")
    }

    pub fn help_requests_dir(&self) -> PathBuf {
        self.root.join("inbox").join("help_requests")
    }

    // -- conversations --

    pub fn conversations_dir(&self) -> PathBuf {
        self.root.join("conversations")
    }

    // -- machine-local state --

    pub fn local_dir(&self) -> PathBuf {
        self.root.join(".local")
    }

    pub fn machine_yaml(&self) -> PathBuf {
        self.local_dir().join("machine.yaml")
    }

    pub fn index_sqlite(&self) -> PathBuf {
        self.local_dir().join("index.sqlite")
    }

    pub fn daemon_lock(&self) -> PathBuf {
        self.local_dir().join("daemon.lock")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.local_dir().join("logs")
    }

    pub fn heartbeat_config_yaml(&self) -> PathBuf {
        self.local_dir().join("heartbeat").join("config.yaml")
    }

    pub fn heartbeat_state_yaml(&self) -> PathBuf {
        self.local_dir().join("heartbeat").join("state.yaml")
    }

    pub fn worktree_dir(&self, project: &ProjectId, task: &str, run: &RunId) -> PathBuf {
        self.local_dir()
            .join("worktrees")
            .join(project.as_str())
            .join(task)
            .join(run.as_str())
    }

    // -- reverse mappings --

    /// Map an `events.jsonl` path back to its `(project, run)` key.
    ///
    /// Accepts any path of the shape `…/work/projects/<pid>/runs/<run>/events.jsonl`.
    pub fn events_path_to_run(path: &Path) -> Option<(ProjectId, RunId)> {
        if path.file_name()?.to_str()? != "events.jsonl" {
            return None;
        }
        let run_dir = path.parent()?;
        let runs_dir = run_dir.parent()?;
        if runs_dir.file_name()?.to_str()? != "runs" {
            return None;
        }
        let project_dir = runs_dir.parent()?;
        let projects_dir = project_dir.parent()?;
        if projects_dir.file_name()?.to_str()? != "projects" {
            return None;
        }
        let run = RunId::from_string(run_dir.file_name()?.to_str()?);
        let project = ProjectId::new(project_dir.file_name()?.to_str()?);
        Some((project, run))
    }

    /// Walk up from an `events.jsonl` path to the workspace root
    /// (`…/<ws>/work/projects/<pid>/runs/<run>/events.jsonl`).
    pub fn workspace_root_for_events_path(path: &Path) -> Option<PathBuf> {
        let (_, _) = Self::events_path_to_run(path)?;
        // events.jsonl -> <run> -> runs -> <pid> -> projects -> work -> <ws>
        let mut cursor = path.parent()?;
        for _ in 0..5 {
            cursor = cursor.parent()?;
        }
        Some(cursor.to_path_buf())
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
