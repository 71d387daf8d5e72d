// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversations: channels and DMs with append-only message logs
//!
//! Keyed by `(scope, project_id?, conversation_id)`. Each conversation is
//! a directory under `<ws>/conversations/` holding a `meta.yaml` and an
//! append-only `messages.jsonl`; messages are never reordered.

use ac_core::{ProjectId, RecordError, WorkspaceLayout};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationScope {
    Workspace,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Channel,
    Dm,
}

/// `meta.yaml` of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub conversation_id: String,
    pub scope: ConversationScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    pub kind: ConversationKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub members: Vec<String>,
    pub created_at: String,
}

/// One line of `messages.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub sender: String,
    pub sent_at: String,
    pub body: String,
}

/// Filesystem-backed conversation store.
#[derive(Clone)]
pub struct ConversationStore {
    layout: WorkspaceLayout,
}

impl ConversationStore {
    pub fn new(layout: WorkspaceLayout) -> Self {
        Self { layout }
    }

    fn conversation_dir(&self, conversation_id: &str) -> PathBuf {
        self.layout.conversations_dir().join(conversation_id)
    }

    fn meta_path(&self, conversation_id: &str) -> PathBuf {
        self.conversation_dir(conversation_id).join("meta.yaml")
    }

    fn messages_path(&self, conversation_id: &str) -> PathBuf {
        self.conversation_dir(conversation_id).join("messages.jsonl")
    }

    pub fn create(&self, meta: ConversationMeta) -> Result<ConversationMeta, ConversationError> {
        let path = self.meta_path(&meta.conversation_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RecordError::io(&path, e))?;
        }
        let text = serde_yaml::to_string(&meta).map_err(|e| RecordError::yaml(&path, e))?;
        std::fs::write(&path, text).map_err(|e| RecordError::io(&path, e))?;
        Ok(meta)
    }

    pub fn get(&self, conversation_id: &str) -> Result<ConversationMeta, ConversationError> {
        let path = self.meta_path(conversation_id);
        if !path.exists() {
            return Err(ConversationError::NotFound(conversation_id.to_string()));
        }
        let text = std::fs::read_to_string(&path).map_err(|e| RecordError::io(&path, e))?;
        Ok(serde_yaml::from_str(&text).map_err(|e| RecordError::yaml(&path, e))?)
    }

    /// All conversations, optionally filtered by scope key.
    pub fn list(
        &self,
        scope: Option<ConversationScope>,
        project: Option<&ProjectId>,
    ) -> Vec<ConversationMeta> {
        let Ok(entries) = std::fs::read_dir(self.layout.conversations_dir()) else {
            return Vec::new();
        };
        let mut metas: Vec<ConversationMeta> = entries
            .flatten()
            .filter_map(|e| {
                let text = std::fs::read_to_string(e.path().join("meta.yaml")).ok()?;
                serde_yaml::from_str(&text).ok()
            })
            .filter(|m: &ConversationMeta| {
                scope.is_none_or(|s| m.scope == s)
                    && (project.is_none() || m.project_id.as_ref() == project)
            })
            .collect();
        metas.sort_by(|a, b| a.conversation_id.cmp(&b.conversation_id));
        metas
    }

    /// Append a message. Messages are immutable once written and never
    /// reordered.
    pub fn send(
        &self,
        conversation_id: &str,
        sender: &str,
        body: &str,
        sent_at: String,
    ) -> Result<Message, ConversationError> {
        self.get(conversation_id)?;
        let message = Message {
            message_id: format!("msg-{}", nanoid()),
            sender: sender.to_string(),
            sent_at,
            body: body.to_string(),
        };
        let path = self.messages_path(conversation_id);
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RecordError::io(&path, e))?;
        file.write_all(line.as_bytes()).map_err(|e| RecordError::io(&path, e))?;
        Ok(message)
    }

    /// Messages in append order.
    pub fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ConversationError> {
        self.get(conversation_id)?;
        let path = self.messages_path(conversation_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path).map_err(|e| RecordError::io(&path, e))?;
        Ok(text
            .lines()
            .filter(|l| !l.is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }

    /// Replace the member list (channel membership sync).
    pub fn sync_members(
        &self,
        conversation_id: &str,
        members: Vec<String>,
    ) -> Result<ConversationMeta, ConversationError> {
        let mut meta = self.get(conversation_id)?;
        meta.members = members;
        self.create(meta)
    }
}

fn nanoid() -> String {
    nanoid::nanoid!(19)
}

#[cfg(test)]
#[path = "conversation_tests.rs"]
mod tests;
