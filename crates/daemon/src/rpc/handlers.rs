// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC handlers and their parameter schemas

use super::RpcError;
use crate::controller::Controller;
use crate::conversation::{ConversationKind, ConversationMeta, ConversationScope};
use crate::snapshot;
use ac_core::records::{split_front_matter, ArtifactId, ReviewDecision, ReviewRecord, ReviewId};
use ac_core::{AgentId, Clock, HeartbeatConfig, JobId, JobSpec, ProjectId, RunId, RunSpec};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

type RpcResult = Result<Value, RpcError>;

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    Ok(serde_json::from_value(params)?)
}

fn ok<T: serde::Serialize>(value: &T) -> RpcResult {
    serde_json::to_value(value).map_err(|e| RpcError::Internal(e.to_string()))
}

/// Best-effort index freshening before a read. Failures are logged and
/// never surfaced: the snapshot still composes from the last good index.
fn sync_best_effort(controller: &Arc<Controller>) {
    if let Err(e) = controller.sync_index() {
        tracing::warn!(error = %e, "best-effort index sync failed");
    }
}

// -- workspace --

pub fn workspace_open(controller: &Arc<Controller>) -> RpcResult {
    let company = controller.company()?;
    Ok(json!({
        "root": controller.layout.root().display().to_string(),
        "company": company,
        "issues": controller.validate(),
    }))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct InitParams {
    name: String,
}

pub fn workspace_init(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: InitParams = parse(params)?;
    Controller::init_workspace(controller.layout.root(), &p.name)?;
    Ok(json!({"initialized": true}))
}

pub fn workspace_validate(controller: &Arc<Controller>) -> RpcResult {
    let issues = controller.validate();
    Ok(json!({"ok": issues.is_empty(), "issues": issues}))
}

pub fn projects_list(controller: &Arc<Controller>) -> RpcResult {
    Ok(json!({"projects": controller.list_projects()}))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectParams {
    project: ProjectId,
}

pub fn project_create(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectParams = parse(params)?;
    controller.create_project(&p.project)?;
    Ok(json!({"project": p.project}))
}

// -- runs / sessions --

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RunCreateParams {
    project: ProjectId,
    agent_id: AgentId,
    spec: RunSpec,
    #[serde(default)]
    task_id: Option<String>,
}

pub fn run_create(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: RunCreateParams = parse(params)?;
    let run_id = controller.create_run(p.project, p.agent_id, p.spec, p.task_id)?;
    Ok(json!({"run_id": run_id}))
}

pub fn run_list(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectParams = parse(params)?;
    let runs = controller.list_runs(&p.project);
    ok(&json!({"runs": runs}))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RunParams {
    project: ProjectId,
    run_id: RunId,
}

pub fn run_replay(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: RunParams = parse(params)?;
    let path = controller.layout.events_jsonl(&p.project, &p.run_id);
    if !path.exists() {
        return Err(RpcError::User(format!("no journal for run {}", p.run_id)));
    }
    let entries = ac_journal::read_entries(&path)
        .map_err(|e| RpcError::Internal(e.to_string()))?;
    let events: Vec<Value> = entries
        .into_iter()
        .map(|entry| match entry.parsed {
            Ok(envelope) => json!({
                "seq": entry.seq,
                "event": serde_json::to_value(&envelope).unwrap_or(Value::Null),
            }),
            Err(failure) => json!({
                "seq": entry.seq,
                "parse_error": failure.error,
                "raw_line": entry.raw_line,
            }),
        })
        .collect();
    Ok(json!({"events": events}))
}

pub fn session_poll(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: RunParams = parse(params)?;
    ok(&controller.run_record(&p.project, &p.run_id)?)
}

pub fn session_collect(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: RunParams = parse(params)?;
    Ok(controller.collect_run(&p.project, &p.run_id)?)
}

pub fn session_stop(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: RunParams = parse(params)?;
    controller.stop_run(&p.project, &p.run_id)?;
    Ok(json!({"stopping": true}))
}

// -- jobs --

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JobSubmitParams {
    project: ProjectId,
    spec: JobSpec,
    #[serde(default)]
    job_id: Option<JobId>,
}

pub fn job_submit(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: JobSubmitParams = parse(params)?;
    let outcome = match p.job_id {
        Some(job_id) => controller.runner.submit_with_id(p.project, job_id, p.spec)?,
        None => controller.runner.submit(p.project, p.spec)?,
    };
    match outcome {
        ac_engine::SubmitOutcome::Started(id) => Ok(json!({"job_id": id, "started": true})),
        ac_engine::SubmitOutcome::AlreadyActive(id, status) => {
            Ok(json!({"job_id": id, "started": false, "status": status.to_string()}))
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JobParams {
    project: ProjectId,
    job_id: JobId,
}

pub fn job_poll(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: JobParams = parse(params)?;
    ok(&controller.runner.poll(&p.project, &p.job_id)?)
}

pub fn job_collect(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: JobParams = parse(params)?;
    let (record, result) = controller.runner.collect(&p.project, &p.job_id)?;
    Ok(json!({
        "job": serde_json::to_value(&record).map_err(|e| RpcError::Internal(e.to_string()))?,
        "result": result,
    }))
}

pub fn job_cancel(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: JobParams = parse(params)?;
    let requested = controller.runner.cancel(&p.project, &p.job_id)?;
    Ok(json!({"cancellation_requested": requested}))
}

pub fn job_list(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectParams = parse(params)?;
    ok(&json!({"jobs": controller.runner.list(&p.project)}))
}

// -- heartbeat --

pub async fn heartbeat_tick(controller: &Arc<Controller>) -> RpcResult {
    let summary = controller
        .heartbeat
        .tick(&controller.cancel.child_token())
        .await?;
    ok(&summary)
}

pub fn heartbeat_config_get(controller: &Arc<Controller>) -> RpcResult {
    ok(&controller.heartbeat.config())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HeartbeatConfigParams {
    config: HeartbeatConfig,
}

pub fn heartbeat_config_set(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: HeartbeatConfigParams = parse(params)?;
    controller.heartbeat.set_config(p.config)?;
    ok(&controller.heartbeat.config())
}

// -- index --

pub fn index_rebuild(controller: &Arc<Controller>) -> RpcResult {
    ok(&controller.rebuild_index()?)
}

pub fn index_sync(controller: &Arc<Controller>) -> RpcResult {
    ok(&controller.sync_index()?)
}

pub fn index_stats(controller: &Arc<Controller>) -> RpcResult {
    ok(&controller.index_store()?.stats()?)
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ProjectFilterParams {
    #[serde(default)]
    project: Option<String>,
}

pub fn index_list_runs(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectFilterParams = parse(params)?;
    ok(&json!({"runs": controller.index_store()?.list_runs(p.project.as_deref())?}))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListEventsParams {
    project: String,
    run_id: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    limit: Option<u64>,
}

pub fn index_list_events(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ListEventsParams = parse(params)?;
    let events = controller.index_store()?.list_events(
        &p.project,
        &p.run_id,
        p.kind.as_deref(),
        p.limit,
    )?;
    ok(&json!({"events": events}))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RunKeyParams {
    project: String,
    run_id: String,
}

pub fn index_list_parse_errors(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: RunKeyParams = parse(params)?;
    ok(&json!({
        "parse_errors": controller.index_store()?.list_parse_errors(&p.project, &p.run_id)?,
    }))
}

pub fn index_list_reviews(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectFilterParams = parse(params)?;
    ok(&json!({"reviews": controller.index_store()?.list_reviews(p.project.as_deref())?}))
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct HelpRequestFilterParams {
    #[serde(default)]
    target_manager: Option<String>,
}

pub fn index_list_help_requests(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: HelpRequestFilterParams = parse(params)?;
    ok(&json!({
        "help_requests": controller
            .index_store()?
            .list_help_requests(p.target_manager.as_deref())?,
    }))
}

pub fn sync_worker_status(controller: &Arc<Controller>) -> RpcResult {
    ok(&controller.sync_worker.status())
}

pub async fn sync_worker_flush(controller: &Arc<Controller>) -> RpcResult {
    controller.sync_worker.notify(controller.layout.root());
    controller.sync_worker.flush().await;
    ok(&controller.sync_worker.status())
}

// -- snapshots --

pub fn monitor_snapshot_rpc(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectFilterParams = parse(params)?;
    sync_best_effort(controller);
    ok(&snapshot::monitor_snapshot(&controller.index_store()?, p.project.as_deref())?)
}

pub fn inbox_snapshot_rpc(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectFilterParams = parse(params)?;
    sync_best_effort(controller);
    ok(&snapshot::inbox_snapshot(&controller.index_store()?, p.project.as_deref())?)
}

pub fn pm_snapshot_rpc(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectFilterParams = parse(params)?;
    ok(&snapshot::pm_snapshot(
        &controller.layout,
        p.project.as_deref(),
        controller.clock.epoch_ms(),
    ))
}

pub fn resources_snapshot_rpc(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectFilterParams = parse(params)?;
    sync_best_effort(controller);
    ok(&snapshot::resources_snapshot(
        &controller.index_store()?,
        &controller.layout,
        p.project.as_deref(),
    )?)
}

pub fn ui_snapshot(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectFilterParams = parse(params)?;
    sync_best_effort(controller);
    let store = controller.index_store()?;
    let monitor = snapshot::monitor_snapshot(&store, p.project.as_deref())?;
    let inbox = snapshot::inbox_snapshot(&store, p.project.as_deref())?;
    let full = json!({
        "pm": snapshot::pm_snapshot(&controller.layout, p.project.as_deref(), controller.clock.epoch_ms()),
        "resources": snapshot::resources_snapshot(&store, &controller.layout, p.project.as_deref())?,
    });
    Ok(snapshot::merge(&monitor, &inbox, Some(&full)))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BootstrapParams {
    scope: String,
    #[serde(default)]
    project_id: Option<String>,
    view: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

pub fn bootstrap_snapshot(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: BootstrapParams = parse(params)?;
    if p.scope == "project" && p.project_id.is_none() {
        return Err(RpcError::User("project_id required when scope=project".to_string()));
    }
    sync_best_effort(controller);
    let store = controller.index_store()?;
    let project = p.project_id.as_deref();

    let conversation = match &p.conversation_id {
        Some(id) => Some(json!({
            "meta": serde_json::to_value(controller.conversations.get(id)?)
                .map_err(|e| RpcError::Internal(e.to_string()))?,
            "messages": controller.conversations.messages(id)?,
        })),
        None => None,
    };

    ok(&snapshot::BootstrapSnapshot {
        scope: p.scope,
        project_id: p.project_id.clone(),
        view: p.view,
        generated_at: controller.clock.wallclock_iso(),
        monitor: snapshot::monitor_snapshot(&store, project)?,
        inbox: snapshot::inbox_snapshot(&store, project)?,
        pm: snapshot::pm_snapshot(&controller.layout, project, controller.clock.epoch_ms()),
        resources: snapshot::resources_snapshot(&store, &controller.layout, project)?,
        conversation,
    })
}

// -- inbox resolution --

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ResolveParams {
    project: ProjectId,
    subject_artifact_id: ArtifactId,
    decision: ReviewDecision,
    actor_id: String,
    #[serde(default)]
    actor_role: Option<String>,
    #[serde(default)]
    subject_kind: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

pub fn inbox_resolve(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ResolveParams = parse(params)?;
    let review = ReviewRecord {
        review_id: ReviewId::new(format!("rev-{}", nanoid::nanoid!(19))),
        created_at: controller.clock.wallclock_iso(),
        decision: p.decision,
        actor_id: p.actor_id,
        actor_role: p.actor_role.unwrap_or_else(|| "manager".to_string()),
        subject_kind: p.subject_kind.unwrap_or_else(|| "artifact".to_string()),
        subject_artifact_id: p.subject_artifact_id,
        project_id: p.project,
        notes: p.notes,
    };
    let path = controller
        .layout
        .reviews_dir()
        .join(format!("{}.yaml", review.review_id));
    review.save(&path)?;
    sync_best_effort(controller);
    ok(&review)
}

// -- agents / artifacts --

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentParams {
    agent_id: String,
}

pub fn agent_profile_snapshot(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: AgentParams = parse(params)?;
    let profile = controller.agent_profile(&p.agent_id)?;
    let store = controller.index_store()?;
    let runs: Vec<_> = store
        .list_runs(None)?
        .into_iter()
        .filter(|r| r.agent_id.as_deref() == Some(p.agent_id.as_str()))
        .take(20)
        .collect();
    Ok(json!({"profile": profile, "recent_runs": runs}))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactReadParams {
    project: ProjectId,
    artifact_id: String,
}

pub fn artifact_read(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ArtifactReadParams = parse(params)?;
    let path = controller.layout.artifact_md(&p.project, &p.artifact_id);
    let text = std::fs::read_to_string(&path)
        .map_err(|_| RpcError::User(format!("artifact not found: {}", p.artifact_id)))?;
    let (front_matter, body) = split_front_matter(&text)
        .ok_or_else(|| RpcError::State(format!("artifact has no front matter: {}", p.artifact_id)))?;
    let front: Value = serde_yaml::from_str(front_matter)
        .map_err(|e| RpcError::State(format!("malformed front matter: {e}")))?;
    Ok(json!({"front_matter": front, "body": body}))
}

// -- comments --

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CommentAddParams {
    subject: String,
    author: String,
    body: String,
}

pub fn comment_add(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: CommentAddParams = parse(params)?;
    let comment = controller
        .comments
        .add(&p.subject, &p.author, &p.body, controller.clock.wallclock_iso())?;
    ok(&comment)
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CommentListParams {
    #[serde(default)]
    subject: Option<String>,
}

pub fn comment_list(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: CommentListParams = parse(params)?;
    ok(&json!({"comments": controller.comments.list(p.subject.as_deref())}))
}

// -- conversations --

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConversationListParams {
    #[serde(default)]
    scope: Option<ConversationScope>,
    #[serde(default)]
    project: Option<ProjectId>,
}

pub fn conversation_list(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ConversationListParams = parse(params)?;
    ok(&json!({
        "conversations": controller.conversations.list(p.scope, p.project.as_ref()),
    }))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateChannelParams {
    title: String,
    #[serde(default)]
    scope: Option<ConversationScope>,
    #[serde(default)]
    project_id: Option<ProjectId>,
    #[serde(default)]
    members: Vec<String>,
}

pub fn conversation_create_channel(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: CreateChannelParams = parse(params)?;
    let scope = p.scope.unwrap_or(ConversationScope::Workspace);
    if scope == ConversationScope::Project && p.project_id.is_none() {
        return Err(RpcError::User("project_id required when scope=project".to_string()));
    }
    let meta = controller.conversations.create(ConversationMeta {
        conversation_id: format!("cnv-{}", nanoid::nanoid!(19)),
        scope,
        project_id: p.project_id,
        kind: ConversationKind::Channel,
        title: p.title,
        members: p.members,
        created_at: controller.clock.wallclock_iso(),
    })?;
    ok(&meta)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateDmParams {
    members: Vec<String>,
}

pub fn conversation_create_dm(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: CreateDmParams = parse(params)?;
    if p.members.len() < 2 {
        return Err(RpcError::User("a DM needs at least two members".to_string()));
    }
    let meta = controller.conversations.create(ConversationMeta {
        conversation_id: format!("cnv-{}", nanoid::nanoid!(19)),
        scope: ConversationScope::Workspace,
        project_id: None,
        kind: ConversationKind::Dm,
        title: p.members.join(", "),
        members: p.members,
        created_at: controller.clock.wallclock_iso(),
    })?;
    ok(&meta)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConversationParams {
    conversation_id: String,
}

pub fn conversation_messages(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ConversationParams = parse(params)?;
    ok(&json!({"messages": controller.conversations.messages(&p.conversation_id)?}))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SendMessageParams {
    conversation_id: String,
    sender: String,
    body: String,
}

pub fn conversation_send(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: SendMessageParams = parse(params)?;
    let message = controller.conversations.send(
        &p.conversation_id,
        &p.sender,
        &p.body,
        controller.clock.wallclock_iso(),
    )?;
    ok(&message)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MembersSyncParams {
    conversation_id: String,
    members: Vec<String>,
}

pub fn conversation_members_sync(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: MembersSyncParams = parse(params)?;
    ok(&controller.conversations.sync_members(&p.conversation_id, p.members)?)
}

// -- tasks --

pub fn task_list(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: ProjectParams = parse(params)?;
    let tasks_dir = controller.layout.tasks_dir(&p.project);
    let Ok(entries) = std::fs::read_dir(&tasks_dir) else {
        return Ok(json!({"tasks": []}));
    };
    let mut tasks: Vec<Value> = entries
        .flatten()
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("md"))
        .filter_map(|e| {
            let task = ac_core::records::TaskFrontMatter::load(&e.path()).ok()?;
            serde_json::to_value(&task).ok()
        })
        .collect();
    tasks.sort_by_key(|t| t["task_id"].as_str().map(|s| s.to_string()));
    Ok(json!({"tasks": tasks}))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskUpdateParams {
    project: ProjectId,
    task_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    due_at: Option<String>,
}

/// Rewrite selected front-matter fields, preserving the task body.
pub fn task_update_plan(controller: &Arc<Controller>, params: Value) -> RpcResult {
    let p: TaskUpdateParams = parse(params)?;
    let path = controller
        .layout
        .tasks_dir(&p.project)
        .join(format!("{}.md", p.task_id));
    let text = std::fs::read_to_string(&path)
        .map_err(|_| RpcError::User(format!("task not found: {}", p.task_id)))?;
    let (front, body) = split_front_matter(&text)
        .ok_or_else(|| RpcError::State(format!("task has no front matter: {}", p.task_id)))?;
    let mut task: ac_core::records::TaskFrontMatter = serde_yaml::from_str(front)
        .map_err(|e| RpcError::State(format!("malformed task front matter: {e}")))?;

    if let Some(status) = p.status {
        task.status = status;
    }
    if let Some(assignee) = p.assignee {
        task.assignee = Some(assignee);
    }
    if let Some(due_at) = p.due_at {
        task.due_at = Some(due_at);
    }

    let front_text = serde_yaml::to_string(&task)
        .map_err(|e| RpcError::Internal(e.to_string()))?;
    std::fs::write(&path, format!("---\n{front_text}---\n{body}"))
        .map_err(|e| RpcError::Internal(e.to_string()))?;
    ok(&task)
}

// -- system --

pub fn system_capabilities() -> RpcResult {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "methods": super::METHODS,
    }))
}
