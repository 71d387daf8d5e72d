// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flat per-subject comment log backing `/api/comments`

use ac_core::{RecordError, WorkspaceLayout};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: String,
    /// Opaque subject key (e.g. `artifact:art-1`, `run:run-2`).
    pub subject: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
}

/// Append-only comment store under `<ws>/conversations/comments.jsonl`.
#[derive(Clone)]
pub struct CommentStore {
    layout: WorkspaceLayout,
}

impl CommentStore {
    pub fn new(layout: WorkspaceLayout) -> Self {
        Self { layout }
    }

    fn path(&self) -> PathBuf {
        self.layout.conversations_dir().join("comments.jsonl")
    }

    pub fn add(
        &self,
        subject: &str,
        author: &str,
        body: &str,
        created_at: String,
    ) -> Result<Comment, RecordError> {
        let comment = Comment {
            comment_id: format!("cmt-{}", nanoid::nanoid!(19)),
            subject: subject.to_string(),
            author: author.to_string(),
            body: body.to_string(),
            created_at,
        };
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RecordError::io(&path, e))?;
        }
        let mut line = serde_json::to_string(&comment)
            .map_err(|e| RecordError::io(&path, std::io::Error::other(e)))?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RecordError::io(&path, e))?;
        file.write_all(line.as_bytes()).map_err(|e| RecordError::io(&path, e))?;
        Ok(comment)
    }

    /// Comments for one subject (or all), in insertion order.
    pub fn list(&self, subject: Option<&str>) -> Vec<Comment> {
        let Ok(text) = std::fs::read_to_string(self.path()) else {
            return Vec::new();
        };
        text.lines()
            .filter(|l| !l.is_empty())
            .filter_map(|l| serde_json::from_str::<Comment>(l).ok())
            .filter(|c| subject.is_none_or(|s| c.subject == s))
            .collect()
    }
}

#[cfg(test)]
#[path = "comments_tests.rs"]
mod tests;
