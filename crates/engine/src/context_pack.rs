// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context-pack snapshot: record what the run was given

use crate::git::{diff_head, head_sha, is_dirty, GitError};
use ac_core::{ContextPackId, ProjectId, RunId, WorkspaceLayout};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextPackError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Persisted `context_packs/<ctx>/manifest.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPackManifest {
    pub context_pack_id: ContextPackId,
    pub run_id: RunId,
    pub repo_head: String,
    pub repo_dirty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirty_patch_artifact_id: Option<String>,
    pub created_at: String,
}

/// Snapshot the repo state for a run: HEAD SHA, dirty flag, and (when
/// dirty) the uncommitted diff as a `repo_dirty_patch` artifact referenced
/// from the manifest.
pub async fn snapshot_context_pack(
    layout: &WorkspaceLayout,
    project: &ProjectId,
    pack_id: &ContextPackId,
    run_id: &RunId,
    repo_root: &Path,
    created_at: String,
) -> Result<ContextPackManifest, ContextPackError> {
    let head = head_sha(repo_root).await?;
    let dirty = is_dirty(repo_root).await?;

    let mut manifest = ContextPackManifest {
        context_pack_id: *pack_id,
        run_id: *run_id,
        repo_head: head,
        repo_dirty: dirty,
        dirty_patch_artifact_id: None,
        created_at: created_at.clone(),
    };

    if dirty {
        let patch = diff_head(repo_root).await?;
        let artifact_id = format!("art-dirty-{}", run_id.suffix());
        let artifact_path = layout.artifact_md(project, &artifact_id);
        if let Some(parent) = artifact_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ContextPackError::Io {
                path: artifact_path.display().to_string(),
                source: e,
            })?;
        }
        let body = format!(
            "---\nartifact_id: {artifact_id}\ntype: repo_dirty_patch\ntitle: Uncommitted changes at run start\nvisibility: team\nrun_id: {run_id}\ncontext_pack_id: {pack_id}\ncreated_at: {created_at}\n---\n```diff\n{patch}```\n"
        );
        std::fs::write(&artifact_path, body).map_err(|e| ContextPackError::Io {
            path: artifact_path.display().to_string(),
            source: e,
        })?;
        manifest.dirty_patch_artifact_id = Some(artifact_id);
    }

    let manifest_path = layout.context_pack_manifest(project, pack_id);
    if let Some(parent) = manifest_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ContextPackError::Io {
            path: manifest_path.display().to_string(),
            source: e,
        })?;
    }
    let text = serde_yaml::to_string(&manifest)?;
    std::fs::write(&manifest_path, text).map_err(|e| ContextPackError::Io {
        path: manifest_path.display().to_string(),
        source: e,
    })?;

    Ok(manifest)
}

#[cfg(test)]
#[path = "context_pack_tests.rs"]
mod tests;
