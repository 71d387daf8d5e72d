// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed RPC surface: method -> (validated params -> result)
//!
//! Every method name in the table is part of the contract. Parameters are
//! validated against per-method structs (`deny_unknown_fields`); failures
//! become the user-error kind, never a 500.

mod handlers;

use crate::controller::{Controller, ControllerError};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Malformed parameters, unknown method, missing required context.
    #[error("user error: {0}")]
    User(String),
    /// State precondition failed (already terminal, locked, ...).
    #[error("state error: {0}")]
    State(String),
    /// The method belongs to an external collaborator that is not wired
    /// into this process.
    #[error("external collaborator not wired: {0}")]
    External(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RpcError {
    pub fn http_status(&self) -> u16 {
        match self {
            RpcError::User(_) => 400,
            RpcError::State(_) => 409,
            RpcError::External(_) => 502,
            RpcError::Internal(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::User(_) => "user",
            RpcError::State(_) => "state",
            RpcError::External(_) => "external",
            RpcError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::User(format!("invalid params: {e}"))
    }
}

impl From<ControllerError> for RpcError {
    fn from(e: ControllerError) -> Self {
        match e {
            ControllerError::RunNotFound(_) | ControllerError::AgentNotFound(_) => {
                RpcError::User(e.to_string())
            }
            ControllerError::NotAWorkspace(_) => RpcError::User(e.to_string()),
            ControllerError::Locked(_) => RpcError::State(e.to_string()),
            other => RpcError::Internal(other.to_string()),
        }
    }
}

impl From<ac_index::IndexError> for RpcError {
    fn from(e: ac_index::IndexError) -> Self {
        RpcError::Internal(e.to_string())
    }
}

impl From<ac_engine::JobError> for RpcError {
    fn from(e: ac_engine::JobError) -> Self {
        match e {
            ac_engine::JobError::NotFound(id) => RpcError::User(format!("job not found: {id}")),
            other => RpcError::Internal(other.to_string()),
        }
    }
}

impl From<ac_engine::HeartbeatError> for RpcError {
    fn from(e: ac_engine::HeartbeatError) -> Self {
        RpcError::Internal(e.to_string())
    }
}

impl From<crate::conversation::ConversationError> for RpcError {
    fn from(e: crate::conversation::ConversationError) -> Self {
        match e {
            crate::conversation::ConversationError::NotFound(id) => {
                RpcError::User(format!("conversation not found: {id}"))
            }
            other => RpcError::Internal(other.to_string()),
        }
    }
}

impl From<ac_core::RecordError> for RpcError {
    fn from(e: ac_core::RecordError) -> Self {
        RpcError::State(e.to_string())
    }
}

/// The full method surface.
pub const METHODS: &[&str] = &[
    "workspace.open",
    "workspace.init",
    "workspace.validate",
    "workspace.doctor",
    "workspace.diagnostics",
    "workspace.migrate",
    "workspace.export",
    "workspace.import",
    "workspace.projects.list",
    "project.create",
    "run.create",
    "run.list",
    "run.replay",
    "session.launch",
    "session.poll",
    "session.collect",
    "session.stop",
    "session.list",
    "job.submit",
    "job.poll",
    "job.collect",
    "job.cancel",
    "job.list",
    "heartbeat.status",
    "heartbeat.tick",
    "heartbeat.config.get",
    "heartbeat.config.set",
    "index.rebuild",
    "index.sync",
    "index.stats",
    "index.list_runs",
    "index.list_events",
    "index.list_event_parse_errors",
    "index.list_reviews",
    "index.list_help_requests",
    "index.sync_worker_status",
    "index.sync_worker_flush",
    "monitor.snapshot",
    "inbox.snapshot",
    "inbox.list_reviews",
    "inbox.list_help_requests",
    "inbox.resolve",
    "ui.snapshot",
    "ui.resolve",
    "memory.propose_delta",
    "memory.approve_delta",
    "memory.list_deltas",
    "milestone.approve",
    "agent.profile.snapshot",
    "agent.record_mistake",
    "agent.self_improve_cycle",
    "agent.refresh_context",
    "artifact.read",
    "comment.add",
    "comment.list",
    "conversation.list",
    "conversation.create_channel",
    "conversation.create_dm",
    "conversation.messages.list",
    "conversation.message.send",
    "conversation.members.sync",
    "pm.snapshot",
    "pm.recommend_allocations",
    "pm.apply_allocations",
    "task.list",
    "task.update_plan",
    "resources.snapshot",
    "desktop.bootstrap.snapshot",
    "system.capabilities",
];

/// Dispatch one method call.
pub async fn dispatch(
    controller: &Arc<Controller>,
    method: &str,
    params: Value,
) -> Result<Value, RpcError> {
    use self::handlers as h;
    match method {
        "workspace.open" => h::workspace_open(controller),
        "workspace.init" => h::workspace_init(controller, params),
        "workspace.validate" => h::workspace_validate(controller),
        "workspace.projects.list" => h::projects_list(controller),
        "project.create" => h::project_create(controller, params),

        "run.create" | "session.launch" => h::run_create(controller, params),
        "run.list" | "session.list" => h::run_list(controller, params),
        "run.replay" => h::run_replay(controller, params),
        "session.poll" => h::session_poll(controller, params),
        "session.collect" => h::session_collect(controller, params),
        "session.stop" => h::session_stop(controller, params),

        "job.submit" => h::job_submit(controller, params),
        "job.poll" => h::job_poll(controller, params),
        "job.collect" => h::job_collect(controller, params),
        "job.cancel" => h::job_cancel(controller, params),
        "job.list" => h::job_list(controller, params),

        "heartbeat.status" => Ok(controller.heartbeat.status()),
        "heartbeat.tick" => h::heartbeat_tick(controller).await,
        "heartbeat.config.get" => h::heartbeat_config_get(controller),
        "heartbeat.config.set" => h::heartbeat_config_set(controller, params),

        "index.rebuild" => h::index_rebuild(controller),
        "index.sync" => h::index_sync(controller),
        "index.stats" => h::index_stats(controller),
        "index.list_runs" => h::index_list_runs(controller, params),
        "index.list_events" => h::index_list_events(controller, params),
        "index.list_event_parse_errors" => h::index_list_parse_errors(controller, params),
        "index.list_reviews" => h::index_list_reviews(controller, params),
        "index.list_help_requests" => h::index_list_help_requests(controller, params),
        "index.sync_worker_status" => h::sync_worker_status(controller),
        "index.sync_worker_flush" => h::sync_worker_flush(controller).await,

        "monitor.snapshot" => h::monitor_snapshot_rpc(controller, params),
        "inbox.snapshot" => h::inbox_snapshot_rpc(controller, params),
        "inbox.list_reviews" => h::index_list_reviews(controller, params),
        "inbox.list_help_requests" => h::index_list_help_requests(controller, params),
        "inbox.resolve" | "ui.resolve" => h::inbox_resolve(controller, params),
        "ui.snapshot" => h::ui_snapshot(controller, params),

        "agent.profile.snapshot" => h::agent_profile_snapshot(controller, params),
        "artifact.read" => h::artifact_read(controller, params),

        "comment.add" => h::comment_add(controller, params),
        "comment.list" => h::comment_list(controller, params),

        "conversation.list" => h::conversation_list(controller, params),
        "conversation.create_channel" => h::conversation_create_channel(controller, params),
        "conversation.create_dm" => h::conversation_create_dm(controller, params),
        "conversation.messages.list" => h::conversation_messages(controller, params),
        "conversation.message.send" => h::conversation_send(controller, params),
        "conversation.members.sync" => h::conversation_members_sync(controller, params),

        "pm.snapshot" => h::pm_snapshot_rpc(controller, params),
        "task.list" => h::task_list(controller, params),
        "task.update_plan" => h::task_update_plan(controller, params),
        "resources.snapshot" => h::resources_snapshot_rpc(controller, params),
        "desktop.bootstrap.snapshot" => h::bootstrap_snapshot(controller, params),
        "system.capabilities" => h::system_capabilities(),

        // Contracts owned by external collaborators (doctor, export,
        // memory curation, self-improvement, allocation planning).
        "workspace.doctor" | "workspace.diagnostics" | "workspace.migrate"
        | "workspace.export" | "workspace.import" | "memory.propose_delta"
        | "memory.approve_delta" | "memory.list_deltas" | "milestone.approve"
        | "agent.record_mistake" | "agent.self_improve_cycle" | "agent.refresh_context"
        | "pm.recommend_allocations" | "pm.apply_allocations" => {
            Err(RpcError::External(method.to_string()))
        }

        unknown => Err(RpcError::User(format!("unknown method: {unknown}"))),
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
