// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Review inbox: artifacts awaiting a decision plus recent decisions

use ac_index::{HelpRequestRow, IndexError, IndexStore, ReviewRow};
use serde::Serialize;
use std::collections::HashSet;

/// Artifact types that never need a human decision.
const UNREVIEWABLE_TYPES: &[&str] = &["repo_dirty_patch"];

#[derive(Debug, Clone, Serialize)]
pub struct PendingReview {
    pub project_id: String,
    pub artifact_id: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub title: Option<String>,
    pub produced_by: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboxSnapshot {
    pub pending: Vec<PendingReview>,
    pub recent_decisions: Vec<ReviewRow>,
    pub help_requests: Vec<HelpRequestRow>,
}

/// Pending = artifacts left-anti-joined against reviews on artifact id.
pub fn inbox_snapshot(store: &IndexStore, project: Option<&str>) -> Result<InboxSnapshot, IndexError> {
    let reviews = store.list_reviews(project)?;
    let decided: HashSet<&str> = reviews.iter().map(|r| r.subject_artifact_id.as_str()).collect();

    let pending = store
        .list_artifacts(project, None)?
        .into_iter()
        .filter(|a| !UNREVIEWABLE_TYPES.contains(&a.artifact_type.as_str()))
        .filter(|a| !decided.contains(a.artifact_id.as_str()))
        .map(|a| PendingReview {
            project_id: a.project_id,
            artifact_id: a.artifact_id,
            artifact_type: a.artifact_type,
            title: a.title,
            produced_by: a.produced_by,
            created_at: a.created_at,
        })
        .collect();

    let mut recent_decisions = reviews;
    recent_decisions.truncate(20);

    Ok(InboxSnapshot {
        pending,
        recent_decisions,
        help_requests: store.list_help_requests(None)?,
    })
}

#[cfg(test)]
#[path = "inbox_tests.rs"]
mod tests;
