// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace walker: discovers the files the index is derived from

use crate::store::{ArtifactRow, HelpRequestRow, IndexError, ReviewRow, RunRow};
use ac_core::records::{ArtifactFrontMatter, HelpRequestFrontMatter, ReviewRecord};
use ac_core::{ReviewDecision, RunRecord, WorkspaceLayout};
use std::path::{Path, PathBuf};

/// One discovered run: its index row plus the journal path to sync from.
#[derive(Debug, Clone)]
pub struct ScannedRun {
    pub row: RunRow,
    pub events_path: PathBuf,
}

/// Everything a single workspace pass discovered.
#[derive(Debug, Default)]
pub struct ScannedWorkspace {
    pub runs: Vec<ScannedRun>,
    pub artifacts: Vec<ArtifactRow>,
    pub reviews: Vec<ReviewRow>,
    pub help_requests: Vec<HelpRequestRow>,
    /// Files that failed to parse and were skipped (never aborts a pass).
    pub skipped: u64,
}

fn decision_str(decision: ReviewDecision) -> &'static str {
    match decision {
        ReviewDecision::Approved => "approved",
        ReviewDecision::Denied => "denied",
    }
}

fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    paths
}

/// Walk a workspace and collect index-relevant rows.
///
/// Malformed files are logged and counted, never fatal: the index must
/// converge on whatever is parseable.
pub fn scan_workspace(layout: &WorkspaceLayout) -> Result<ScannedWorkspace, IndexError> {
    let mut scanned = ScannedWorkspace::default();

    for project_dir in dir_entries(&layout.projects_dir()) {
        if !project_dir.is_dir() {
            continue;
        }
        let project_id = match project_dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        // runs/<run>/run.yaml
        for run_dir in dir_entries(&project_dir.join("runs")) {
            let run_yaml = run_dir.join("run.yaml");
            if !run_yaml.is_file() {
                continue;
            }
            match RunRecord::load(&run_yaml) {
                Ok(record) => {
                    let events_path = run_dir.join("events.jsonl");
                    scanned.runs.push(ScannedRun {
                        row: RunRow {
                            project_id: project_id.clone(),
                            run_id: record.run_id.to_string(),
                            created_at: Some(record.created_at.clone()),
                            status: record.status.to_string(),
                            provider: record.provider.as_str().to_string(),
                            agent_id: Some(record.agent_id.to_string()),
                            context_pack_id: record.context_pack_id.map(|c| c.to_string()),
                            events_relpath: Some(record.events_relpath.clone()),
                        },
                        events_path,
                    });
                }
                Err(e) => {
                    tracing::warn!(path = %run_yaml.display(), error = %e, "skipping malformed run.yaml");
                    scanned.skipped += 1;
                }
            }
        }

        // artifacts/<art>.md
        for artifact_path in dir_entries(&project_dir.join("artifacts")) {
            if artifact_path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            match ArtifactFrontMatter::load(&artifact_path) {
                Ok(fm) => {
                    let file_name = artifact_path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    scanned.artifacts.push(ArtifactRow {
                        project_id: project_id.clone(),
                        artifact_id: fm.artifact_id.to_string(),
                        artifact_type: fm.artifact_type,
                        title: fm.title,
                        visibility: fm.visibility.map(|v| v.as_str().to_string()),
                        produced_by: fm.produced_by,
                        run_id: fm.run_id.map(|r| r.to_string()),
                        context_pack_id: fm.context_pack_id,
                        created_at: fm.created_at,
                        relpath: format!("artifacts/{file_name}"),
                    });
                }
                Err(e) => {
                    tracing::warn!(path = %artifact_path.display(), error = %e, "skipping malformed artifact");
                    scanned.skipped += 1;
                }
            }
        }
    }

    // inbox/reviews/<id>.yaml
    for review_path in dir_entries(&layout.reviews_dir()) {
        if review_path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        match ReviewRecord::load(&review_path) {
            Ok(review) => scanned.reviews.push(ReviewRow {
                review_id: review.review_id.to_string(),
                created_at: review.created_at,
                decision: decision_str(review.decision).to_string(),
                actor_id: review.actor_id,
                actor_role: review.actor_role,
                subject_kind: review.subject_kind,
                subject_artifact_id: review.subject_artifact_id.to_string(),
                project_id: review.project_id.to_string(),
                notes: review.notes,
            }),
            Err(e) => {
                tracing::warn!(path = %review_path.display(), error = %e, "skipping malformed review");
                scanned.skipped += 1;
            }
        }
    }

    // inbox/help_requests/<id>.md
    for help_path in dir_entries(&layout.help_requests_dir()) {
        if help_path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        match HelpRequestFrontMatter::load(&help_path) {
            Ok(fm) => scanned.help_requests.push(HelpRequestRow {
                help_request_id: fm.help_request_id.to_string(),
                created_at: fm.created_at,
                title: fm.title,
                visibility: fm.visibility.as_str().to_string(),
                requester: fm.requester,
                target_manager: fm.target_manager,
                project_id: fm.project_id.map(|p| p.to_string()),
                share_pack_id: fm.share_pack_id,
            }),
            Err(e) => {
                tracing::warn!(path = %help_path.display(), error = %e, "skipping malformed help request");
                scanned.skipped += 1;
            }
        }
    }

    Ok(scanned)
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
