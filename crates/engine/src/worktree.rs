// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree isolation for coding runs

use crate::git::{run_git, GitError};
use ac_core::{ProjectId, RunId};
use std::path::Path;

/// Branch name for an isolated run: `ac/<project>/<task>/<run>`.
pub fn branch_name(project: &ProjectId, task: &str, run: &RunId) -> String {
    format!("ac/{project}/{task}/{run}")
}

/// Create a fresh worktree at `worktree_abs` on a new branch from HEAD.
///
/// The caller picks the path (under `.local/worktrees/...`) and uses it
/// as the run's execution cwd.
pub async fn prepare_worktree(
    repo_root: &Path,
    branch: &str,
    worktree_abs: &Path,
) -> Result<(), GitError> {
    if let Some(parent) = worktree_abs.parent() {
        std::fs::create_dir_all(parent).map_err(GitError::Spawn)?;
    }
    let worktree_str = worktree_abs.display().to_string();
    run_git(
        repo_root,
        &["worktree", "add", "-b", branch, &worktree_str, "HEAD"],
    )
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
