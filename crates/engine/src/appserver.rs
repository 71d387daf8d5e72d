// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! App-server protocol session (JSON-RPC over child stdio)
//!
//! Pure state machine: the executor feeds it complete stdout lines and
//! performs the actions it returns. Keeps the protocol testable without
//! a subprocess.

use ac_core::{ProviderKind, UsageSummary};
use serde_json::{json, Value};
use std::collections::HashSet;

/// What the executor should do in response to a protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Write this JSON-RPC message to the child's stdin.
    Send(Value),
    /// Append to the assistant message buffer.
    AssistantDelta(String),
    /// A provider-reported usage record to ingest.
    UsageReported(UsageSummary),
    /// The turn finished with this status (completed|interrupted|failed).
    Completed(String),
    /// Provider-reported error text to record.
    ErrorNote(String),
    /// A context-cycle signal kind seen for the first time this run.
    ContextCycle(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitInitialize,
    AwaitThreadStart,
    AwaitTurnStart,
    Turning,
    Done,
}

const INITIALIZE_ID: u64 = 1;
const THREAD_START_ID: u64 = 2;
const TURN_START_ID: u64 = 3;

/// One prompt-driven turn against a provider app-server.
pub struct AppServerSession {
    prompt: String,
    model: String,
    phase: Phase,
    thread_id: Option<String>,
    turn_id: Option<String>,
    completion: Option<String>,
    seen_cycle_kinds: HashSet<String>,
}

impl AppServerSession {
    /// Create the session and the `initialize` request that opens it.
    pub fn start(prompt: impl Into<String>, model: impl Into<String>) -> (Self, Value) {
        let session = Self {
            prompt: prompt.into(),
            model: model.into(),
            phase: Phase::AwaitInitialize,
            thread_id: None,
            turn_id: None,
            completion: None,
            seen_cycle_kinds: HashSet::new(),
        };
        let request = json!({
            "jsonrpc": "2.0",
            "id": INITIALIZE_ID,
            "method": "initialize",
            "params": {"clientInfo": {"name": "agentcompany", "version": env!("CARGO_PKG_VERSION")}},
        });
        (session, request)
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn completion_status(&self) -> Option<&str> {
        self.completion.as_deref()
    }

    /// The `turn/interrupt` request for the current turn, when known.
    pub fn interrupt_request(&self) -> Option<Value> {
        let thread_id = self.thread_id.as_deref()?;
        Some(json!({
            "jsonrpc": "2.0",
            "id": 99,
            "method": "turn/interrupt",
            "params": {"threadId": thread_id, "turnId": self.turn_id},
        }))
    }

    /// Process one complete stdout line. Non-JSON lines are ignored (the
    /// tee still records them verbatim).
    pub fn on_line(&mut self, line: &str, provider: &ProviderKind) -> Vec<SessionAction> {
        let Ok(message) = serde_json::from_str::<Value>(line) else {
            return Vec::new();
        };
        if !message.is_object() {
            return Vec::new();
        }

        let id = message.get("id").and_then(|v| v.as_u64());
        let method = message.get("method").and_then(|v| v.as_str());

        match (id, method) {
            // Server-initiated request: reject.
            (Some(id), Some(method)) => vec![SessionAction::Send(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("method not supported: {method}")},
            }))],
            // Response to one of our requests.
            (Some(id), None) => self.on_response(id, &message),
            // Notification.
            (None, Some(method)) => self.on_notification(method, &message, provider),
            (None, None) => Vec::new(),
        }
    }

    fn on_response(&mut self, id: u64, message: &Value) -> Vec<SessionAction> {
        if let Some(error) = message.get("error") {
            let note = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("app-server error")
                .to_string();
            self.phase = Phase::Done;
            self.completion = Some("failed".to_string());
            return vec![
                SessionAction::ErrorNote(note),
                SessionAction::Completed("failed".to_string()),
            ];
        }
        let result = message.get("result").cloned().unwrap_or(Value::Null);

        match (self.phase, id) {
            (Phase::AwaitInitialize, INITIALIZE_ID) => {
                self.phase = Phase::AwaitThreadStart;
                vec![SessionAction::Send(json!({
                    "jsonrpc": "2.0",
                    "id": THREAD_START_ID,
                    "method": "thread/start",
                    "params": {},
                }))]
            }
            (Phase::AwaitThreadStart, THREAD_START_ID) => {
                self.thread_id = string_at(&result, &["threadId", "thread_id"]);
                self.phase = Phase::AwaitTurnStart;
                vec![SessionAction::Send(json!({
                    "jsonrpc": "2.0",
                    "id": TURN_START_ID,
                    "method": "turn/start",
                    "params": {
                        "threadId": self.thread_id,
                        "input": self.prompt,
                        "model": self.model,
                    },
                }))]
            }
            (Phase::AwaitTurnStart, TURN_START_ID) => {
                self.turn_id = string_at(&result, &["turnId", "turn_id"]);
                self.phase = Phase::Turning;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_notification(
        &mut self,
        method: &str,
        message: &Value,
        provider: &ProviderKind,
    ) -> Vec<SessionAction> {
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let mut actions = Vec::new();

        if let Some(kind) = context_cycle_kind(method, &params) {
            if self.seen_cycle_kinds.insert(kind.clone()) {
                actions.push(SessionAction::ContextCycle(kind));
            }
        }

        match method {
            "item/agentMessage/delta" => {
                if let Some(delta) = string_at(&params, &["delta", "text"]) {
                    actions.push(SessionAction::AssistantDelta(delta));
                }
            }
            "thread/tokenUsage/updated" => {
                if let Some(usage) = token_usage_summary(&params, provider) {
                    actions.push(SessionAction::UsageReported(usage));
                }
            }
            "turn/completed" => {
                let status = params
                    .get("turn")
                    .and_then(|t| t.get("status"))
                    .or_else(|| params.get("status"))
                    .and_then(|s| s.as_str())
                    .unwrap_or("completed")
                    .to_string();
                self.phase = Phase::Done;
                self.completion = Some(status.clone());
                actions.push(SessionAction::Completed(status));
            }
            "error" => {
                let note = string_at(&params, &["message", "error"])
                    .unwrap_or_else(|| "app-server error".to_string());
                actions.push(SessionAction::ErrorNote(note));
            }
            _ => {}
        }
        actions
    }
}

fn string_at(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(k).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

fn u64_at(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| value.get(k).and_then(|v| v.as_u64()))
}

/// Provider-reported "compaction" signals, one kind per detection rule.
fn context_cycle_kind(method: &str, params: &Value) -> Option<String> {
    if method.contains("compact") {
        return Some(method.to_string());
    }
    let item_type = params
        .get("item")
        .and_then(|i| i.get("type"))
        .and_then(|t| t.as_str());
    if item_type == Some("compaction") {
        return Some("item.compaction".to_string());
    }
    None
}

fn token_usage_summary(params: &Value, provider: &ProviderKind) -> Option<UsageSummary> {
    let usage = params
        .get("tokenUsage")
        .or_else(|| params.get("token_usage"))
        .or_else(|| params.get("usage"))?;
    let input = u64_at(usage, &["input_tokens", "inputTokens"]);
    let cached = u64_at(usage, &["cached_input_tokens", "cachedInputTokens"]);
    let output = u64_at(usage, &["output_tokens", "outputTokens"]);
    let reasoning = u64_at(usage, &["reasoning_output_tokens", "reasoningOutputTokens"]);
    let total = u64_at(usage, &["total_tokens", "totalTokens"]);
    if input.is_none() && output.is_none() && total.is_none() {
        return None;
    }
    Some(UsageSummary::provider_reported(
        provider.clone(),
        input,
        cached,
        output,
        reasoning,
        total,
    ))
}

#[cfg(test)]
#[path = "appserver_tests.rs"]
mod tests;
