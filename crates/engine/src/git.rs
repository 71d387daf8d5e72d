// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin async wrapper around the `git` binary
//!
//! Non-zero exits are wrapped with their stderr text so callers surface
//! actionable external-command failures.

use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to spawn git: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("git {args} failed ({code}): {stderr}")]
    Failed {
        args: String,
        code: i32,
        stderr: String,
    },
}

#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `git -C <repo> <args...>` and capture output.
pub async fn run_git(repo: &Path, args: &[&str]) -> Result<GitOutput, GitError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .await?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(GitError::Failed {
            args: args.join(" "),
            code: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(GitOutput { stdout, stderr })
}

/// HEAD commit SHA of a repository.
pub async fn head_sha(repo: &Path) -> Result<String, GitError> {
    let out = run_git(repo, &["rev-parse", "HEAD"]).await?;
    Ok(out.stdout.trim().to_string())
}

/// True when the working tree differs from HEAD (tracked or untracked).
pub async fn is_dirty(repo: &Path) -> Result<bool, GitError> {
    let out = run_git(repo, &["status", "--porcelain"]).await?;
    Ok(!out.stdout.trim().is_empty())
}

/// `git diff HEAD` text (tracked changes only).
pub async fn diff_head(repo: &Path) -> Result<String, GitError> {
    let out = run_git(repo, &["diff", "HEAD"]).await?;
    Ok(out.stdout)
}
