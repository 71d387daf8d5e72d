// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wake-score computation for the heartbeat tick

use ac_core::records::{ArtifactFrontMatter, ReviewRecord, TaskFrontMatter};
use ac_core::{
    AgentProfile, AgentRole, HeartbeatConfig, HeartbeatState, JobRecord, JobStatus,
    WorkspaceLayout,
};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Raw activity signals for one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WakeSignals {
    pub due_tasks: u32,
    pub overdue_tasks: u32,
    pub stuck_jobs: u32,
    pub pending_approvals: u32,
    pub pending_help_requests: u32,
    pub new_run_events: u64,
    pub last_report_not_ok: bool,
}

impl WakeSignals {
    /// Scalar wake score. Overdue work and stuck jobs weigh double.
    pub fn score(&self) -> u32 {
        self.due_tasks
            + self.overdue_tasks * 2
            + self.stuck_jobs * 2
            + self.pending_approvals
            + self.pending_help_requests
            + u32::from(self.new_run_events > 0)
            + u32::from(self.last_report_not_ok)
    }
}

/// One triaged worker.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub agent_id: String,
    pub score: u32,
    pub context_hash: String,
    pub signals: WakeSignals,
    /// Project that contributed signals (where a wake job is filed).
    pub home_project: Option<String>,
    /// Fresh run cursors observed while scoring.
    pub run_cursors: HashMap<String, u64>,
}

/// Hash of the worker's observable context: work-state signal counts and
/// run cursors. Report status is deliberately excluded; an ok report
/// against an unchanged hash is exactly what suppression looks for.
pub fn context_hash(agent_id: &str, signals: &WakeSignals, cursors: &HashMap<String, u64>) -> String {
    let mut sorted: Vec<(&String, &u64)> = cursors.iter().collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    hasher.update(agent_id.as_bytes());
    hasher.update(format!(
        "|d{}|o{}|s{}|a{}|h{}",
        signals.due_tasks,
        signals.overdue_tasks,
        signals.stuck_jobs,
        signals.pending_approvals,
        signals.pending_help_requests,
    ));
    for (run, seq) in sorted {
        hasher.update(format!("|{run}:{seq}"));
    }
    format!("{:x}", hasher.finalize())
}

/// Rank by score desc, tie-break by agent id asc; keep the top `k` at or
/// above `min_score`.
pub fn rank(mut candidates: Vec<Candidate>, top_k: usize, min_score: u32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });
    candidates.retain(|c| c.score >= min_score);
    candidates.truncate(top_k);
    candidates
}

fn parse_epoch_ms(text: &str) -> Option<u64> {
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp_millis() as u64)
}

fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    paths
}

/// Gather the wake signals for one worker across every project.
pub fn gather_signals(
    layout: &WorkspaceLayout,
    profile: &AgentProfile,
    state: &HeartbeatState,
    config: &HeartbeatConfig,
    now_ms: u64,
) -> Candidate {
    let agent = profile.agent_id.as_str();
    let mut signals = WakeSignals::default();
    let mut run_cursors: HashMap<String, u64> = HashMap::new();
    let mut home_project: Option<String> = None;
    let mut first_project: Option<String> = None;

    let horizon_ms = now_ms as i64 + config.due_horizon_minutes * 60_000;
    let stuck_cutoff = now_ms.saturating_sub(config.stuck_job_running_minutes * 60_000);

    for project_dir in dir_entries(&layout.projects_dir()) {
        if !project_dir.is_dir() {
            continue;
        }
        let Some(project) = project_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if first_project.is_none() {
            first_project = Some(project.to_string());
        }
        let mut contributed = false;

        // Due / overdue tasks assigned to this worker.
        for task_path in dir_entries(&project_dir.join("tasks")) {
            if task_path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Ok(task) = TaskFrontMatter::load(&task_path) else {
                continue;
            };
            if task.assignee.as_deref() != Some(agent) || task.status == "done" {
                continue;
            }
            if let Some(due_ms) = task.due_at.as_deref().and_then(parse_epoch_ms) {
                if due_ms < now_ms {
                    signals.overdue_tasks += 1;
                    contributed = true;
                } else if (due_ms as i64) <= horizon_ms {
                    signals.due_tasks += 1;
                    contributed = true;
                }
            }
        }

        // Jobs running too long for this worker.
        for job_dir in dir_entries(&project_dir.join("jobs")) {
            let Ok(job) = JobRecord::load(&job_dir.join("job.yaml")) else {
                continue;
            };
            if job.status != JobStatus::Running {
                continue;
            }
            if job.spec.worker_agent_id.as_ref().map(|a| a.as_str()) != Some(agent) {
                continue;
            }
            if parse_epoch_ms(&job.created_at).is_some_and(|t| t < stuck_cutoff) {
                signals.stuck_jobs += 1;
                contributed = true;
            }
        }

        // Artifacts produced by this worker still awaiting a decision.
        let reviewed: Vec<String> = dir_entries(&layout.reviews_dir())
            .iter()
            .filter_map(|p| ReviewRecord::load(p).ok())
            .map(|r| r.subject_artifact_id.to_string())
            .collect();
        for artifact_path in dir_entries(&project_dir.join("artifacts")) {
            if artifact_path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Ok(fm) = ArtifactFrontMatter::load(&artifact_path) else {
                continue;
            };
            if fm.produced_by.as_deref() == Some(agent)
                && !reviewed.contains(&fm.artifact_id.to_string())
            {
                signals.pending_approvals += 1;
                contributed = true;
            }
        }

        // New journal activity since the per-run cursors.
        for run_dir in dir_entries(&project_dir.join("runs")) {
            let events = run_dir.join("events.jsonl");
            if !events.is_file() {
                continue;
            }
            let Some(run_id) = run_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let lines = ac_journal::count_lines(&events).unwrap_or(0);
            let seen = state.run_event_cursors.get(run_id).copied().unwrap_or(0);
            if lines > seen {
                signals.new_run_events += lines - seen;
                contributed = true;
            }
            run_cursors.insert(run_id.to_string(), lines);
        }

        if contributed && home_project.is_none() {
            home_project = Some(project.to_string());
        }
    }

    // Help requests targeting this agent (managers mostly).
    for help_path in dir_entries(&layout.help_requests_dir()) {
        if help_path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        if let Ok(fm) = ac_core::records::HelpRequestFrontMatter::load(&help_path) {
            if fm.target_manager == agent {
                signals.pending_help_requests += 1;
            }
        }
    }

    // Managers also carry the whole pending-review queue.
    if profile.role == AgentRole::Manager {
        signals.pending_approvals += pending_review_count(layout);
    }

    let pulse = state.workers.get(agent);
    signals.last_report_not_ok = !matches!(
        pulse.and_then(|p| p.last_report_status),
        Some(ac_core::ReportStatus::Ok)
    );

    let score = signals.score();
    let hash = context_hash(agent, &signals, &run_cursors);
    Candidate {
        agent_id: agent.to_string(),
        score,
        context_hash: hash,
        signals,
        home_project: home_project.or(first_project),
        run_cursors,
    }
}

fn pending_review_count(layout: &WorkspaceLayout) -> u32 {
    let reviewed: Vec<String> = dir_entries(&layout.reviews_dir())
        .iter()
        .filter_map(|p| ReviewRecord::load(p).ok())
        .map(|r| r.subject_artifact_id.to_string())
        .collect();
    let mut pending = 0u32;
    for project_dir in dir_entries(&layout.projects_dir()) {
        for artifact_path in dir_entries(&project_dir.join("artifacts")) {
            if artifact_path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            if let Ok(fm) = ArtifactFrontMatter::load(&artifact_path) {
                if !reviewed.contains(&fm.artifact_id.to_string()) {
                    pending += 1;
                }
            }
        }
    }
    pending
}

#[cfg(test)]
#[path = "triage_tests.rs"]
mod tests;
