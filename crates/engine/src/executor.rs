// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution engine: one subprocess invocation, one journal, one record
//!
//! Both variants (command and app-server) share the skeleton: prepare the
//! run directory and journal, snapshot context, spawn, tee stdio into the
//! journal while parsing provider lines live, honor stop/abort, then
//! finalize with usage, cost, budget, and exactly one terminal event.

use crate::appserver::{AppServerSession, SessionAction};
use crate::budget::{evaluate_budget, BudgetVerdict};
use crate::context_pack::{snapshot_context_pack, ContextPackError};
use crate::git::GitError;
use crate::lines::LineSplitter;
use crate::usage_ext::{ExtractorSet, UsageDeduper, UsageExtractor};
use crate::worktree::{branch_name, prepare_worktree};
use ac_core::{
    AgentId, Clock, ContextPackId, CostSource, EventEnvelope, EventKind, MachineConfig,
    PolicyConfig, ProjectId, ProviderKind, RecordError, RunId, RunRecord, RunSpec, RunStatus,
    TaskFrontMatter, UsageSource, UsageSummary, WorkspaceLayout,
};
use ac_journal::{EventBus, JournalError, JournalWriter};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Grace period between SIGTERM and SIGKILL.
const KILL_AFTER: Duration = Duration::from_millis(1500);
/// App-server mode: delay between `turn/interrupt` and SIGTERM.
const TERM_AFTER_INTERRUPT: Duration = Duration::from_millis(100);
/// Stop-flag file poll cadence.
const STOP_FLAG_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("no binary configured for provider {0}")]
    MissingBinary(String),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    ContextPack(#[from] ContextPackError),
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_err(path: &std::path::Path, source: std::io::Error) -> EngineError {
    EngineError::Io { path: path.display().to_string(), source }
}

/// Everything the engine needs from its process.
pub struct EngineDeps<C: Clock> {
    pub layout: WorkspaceLayout,
    pub machine: MachineConfig,
    pub policy: PolicyConfig,
    pub bus: EventBus,
    pub clock: C,
}

/// One requested subprocess invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub project: ProjectId,
    pub run_id: RunId,
    pub agent_id: AgentId,
    pub provider: ProviderKind,
    pub session_ref: String,
    pub spec: RunSpec,
    /// Task front-matter, when the run serves a task (worktree policy).
    pub task: Option<TaskFrontMatter>,
    /// Repository root for context-pack snapshot and worktree isolation.
    pub repo_root: Option<PathBuf>,
}

/// What the engine hands back after finalization.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub usage: UsageSummary,
    /// Validation input for the job runner: the assistant message in
    /// app-server mode, stdout in command mode.
    pub raw_output: String,
    pub stderr_tail: String,
    pub error: Option<String>,
    pub budget_exceeded: bool,
}

enum StreamMsg {
    Chunk { is_stdout: bool, text: String },
    Closed { is_stdout: bool },
}

#[derive(Clone, Copy, PartialEq)]
enum StopPhase {
    Running,
    Interrupted,
    Termed,
    Killed,
}

/// The engine itself. Cheap to clone; per-run state lives on the stack of
/// `execute`.
#[derive(Clone)]
pub struct ExecutionEngine<C: Clock> {
    deps: Arc<EngineDeps<C>>,
}

impl<C: Clock> ExecutionEngine<C> {
    pub fn new(deps: EngineDeps<C>) -> Self {
        Self { deps: Arc::new(deps) }
    }

    pub fn deps(&self) -> &EngineDeps<C> {
        &self.deps
    }

    /// Run one subprocess to completion (or stop/abort) and finalize.
    pub async fn execute(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let deps = &self.deps;
        let layout = &deps.layout;
        let clock = &deps.clock;
        let started = clock.now();

        let outputs_dir = layout.run_outputs_dir(&request.project, &request.run_id);
        std::fs::create_dir_all(&outputs_dir).map_err(|e| io_err(&outputs_dir, e))?;

        let mut record = RunRecord {
            project_id: request.project.clone(),
            run_id: request.run_id,
            provider: request.provider.clone(),
            agent_id: request.agent_id.clone(),
            context_pack_id: None,
            status: RunStatus::Running,
            created_at: clock.wallclock_iso(),
            ended_at: None,
            spec: request.spec.clone(),
            usage: None,
            context_cycles: Vec::new(),
            events_relpath: format!("runs/{}/events.jsonl", request.run_id),
        };
        record.save(&layout.run_yaml(&request.project, &request.run_id))?;

        let mut journal = JournalWriter::open(layout.events_jsonl(&request.project, &request.run_id))?
            .with_bus(deps.bus.clone());

        let mono = |clock: &C| clock.now().duration_since(started).as_millis() as u64;
        let mut emit_now = |journal: &mut JournalWriter,
                            kind: EventKind,
                            payload: serde_json::Value|
         -> Result<u64, JournalError> {
            let envelope = EventEnvelope::system(
                request.run_id,
                request.session_ref.clone(),
                kind,
                payload,
                clock.wallclock_iso(),
            )
            .with_monotonic_ms(mono(clock));
            journal.append_now(&envelope)
        };

        emit_now(
            &mut journal,
            EventKind::RunStarted,
            json!({
                "provider": request.provider.as_str(),
                "agent_id": request.agent_id.as_str(),
            }),
        )?;

        // Resolve the execution cwd, isolating into a worktree when the
        // task demands it.
        let project_dir = layout.project_dir(&request.project);
        let mut exec_cwd = project_dir.clone();
        let needs_worktree = request.task.as_ref().is_some_and(|t| t.needs_worktree())
            || matches!(request.spec, RunSpec::Prompt { worktree: true, .. });
        if needs_worktree {
            if let Some(repo_root) = &request.repo_root {
                let task_name = request
                    .task
                    .as_ref()
                    .map(|t| t.task_id.to_string())
                    .unwrap_or_else(|| "adhoc".to_string());
                let branch = branch_name(&request.project, &task_name, &request.run_id);
                let worktree_abs =
                    layout.worktree_dir(&request.project, &task_name, &request.run_id);
                prepare_worktree(repo_root, &branch, &worktree_abs).await?;
                emit_now(
                    &mut journal,
                    EventKind::WorktreePrepared,
                    json!({
                        "branch": branch,
                        "path": worktree_abs.display().to_string(),
                    }),
                )?;
                exec_cwd = worktree_abs;
            }
        }
        if let RunSpec::Command { workdir_rel: Some(rel), .. } = &request.spec {
            exec_cwd = exec_cwd.join(rel);
        }

        // Context-pack snapshot is best-effort observability: a failure
        // is recorded, never fatal to the run.
        if let Some(repo_root) = &request.repo_root {
            let pack_id = ContextPackId::generate();
            match snapshot_context_pack(
                layout,
                &request.project,
                &pack_id,
                &request.run_id,
                repo_root,
                clock.wallclock_iso(),
            )
            .await
            {
                Ok(manifest) => {
                    record.context_pack_id = Some(pack_id);
                    emit_now(
                        &mut journal,
                        EventKind::ContextPackSnapshotWritten,
                        json!({
                            "context_pack_id": pack_id.as_str(),
                            "repo_head": manifest.repo_head,
                            "repo_dirty": manifest.repo_dirty,
                            "dirty_patch_artifact_id": manifest.dirty_patch_artifact_id,
                        }),
                    )?;
                }
                Err(e) => {
                    tracing::warn!(run = %request.run_id, error = %e, "context pack snapshot failed");
                    emit_now(
                        &mut journal,
                        EventKind::ContextPackSnapshotFailed,
                        json!({"error": e.to_string()}),
                    )?;
                }
            }
        }

        emit_now(&mut journal, EventKind::RunExecuting, json!({}))?;

        let run = RunLoop {
            deps: Arc::clone(&self.deps),
            request: &request,
            outputs_dir: outputs_dir.clone(),
            exec_cwd,
            started,
        };
        let loop_outcome = run.drive(&mut journal, cancel).await?;

        self.finalize(&request, record, journal, loop_outcome, started)
    }

    fn finalize(
        &self,
        request: &RunRequest,
        mut record: RunRecord,
        mut journal: JournalWriter,
        lo: LoopOutcome,
        started: std::time::Instant,
    ) -> Result<RunOutcome, EngineError> {
        let deps = &self.deps;
        let clock = &deps.clock;
        let layout = &deps.layout;
        let mono = clock.now().duration_since(started).as_millis() as u64;

        let mut emit = |journal: &mut JournalWriter,
                        kind: EventKind,
                        payload: serde_json::Value|
         -> Result<u64, JournalError> {
            let envelope = EventEnvelope::system(
                request.run_id,
                request.session_ref.clone(),
                kind,
                payload,
                clock.wallclock_iso(),
            )
            .with_monotonic_ms(mono);
            journal.append_now(&envelope)
        };

        // Usage: prefer the largest provider-reported record (providers
        // report cumulatively), else estimate from characters.
        let mut usage = lo
            .reported_usages
            .iter()
            .max_by_key(|u| u.total_tokens)
            .cloned()
            .unwrap_or_else(|| {
                UsageSummary::estimated_from_chars(
                    request.provider.clone(),
                    lo.stdin_chars,
                    lo.stdout_chars,
                    lo.stderr_chars,
                )
            });
        if usage.source == UsageSource::EstimatedChars {
            emit(&mut journal, EventKind::UsageEstimated, serde_json::to_value(&usage)?)?;
        }
        if let Some(card) = deps.machine.rate_card_for(&request.provider) {
            usage.cost_usd = Some(card.price(&usage));
            usage.cost_source = CostSource::RateCard;
            usage.rate_card_provider = Some(request.provider.as_str().to_string());
            emit(&mut journal, EventKind::UsageCostComputed, serde_json::to_value(&usage)?)?;
        }

        let token_usage_path = layout
            .run_outputs_dir(&request.project, &request.run_id)
            .join("token_usage.json");
        std::fs::write(&token_usage_path, serde_json::to_vec_pretty(&usage)?)
            .map_err(|e| io_err(&token_usage_path, e))?;

        // Provisional terminal status. The stop marker wins regardless of
        // exit code.
        let stop_flag = layout.stop_flag(&request.project, &request.run_id);
        let provisional = if stop_flag.exists() {
            RunStatus::Stopped
        } else if lo.success {
            RunStatus::Ended
        } else {
            RunStatus::Failed
        };

        // Budget hook: hard exceed promotes ended -> failed.
        let limits = deps.policy.limits_for(&request.provider);
        let verdict = evaluate_budget(usage.total_tokens, &limits);
        let mut budget_exceeded = false;
        match verdict {
            BudgetVerdict::Within => {}
            BudgetVerdict::SoftExceeded => {
                emit(
                    &mut journal,
                    EventKind::BudgetAlert,
                    json!({
                        "total_tokens": usage.total_tokens,
                        "soft_limit_tokens": limits.soft_limit_tokens,
                    }),
                )?;
            }
            BudgetVerdict::HardExceeded => {
                budget_exceeded = true;
                emit(
                    &mut journal,
                    EventKind::BudgetExceeded,
                    json!({
                        "total_tokens": usage.total_tokens,
                        "hard_limit_tokens": limits.hard_limit_tokens,
                    }),
                )?;
            }
        }
        let final_status = if budget_exceeded && provisional == RunStatus::Ended {
            RunStatus::Failed
        } else {
            provisional
        };
        if limits.soft_limit_tokens.is_some() || limits.hard_limit_tokens.is_some() {
            emit(
                &mut journal,
                EventKind::BudgetDecision,
                json!({
                    "verdict": verdict.as_str(),
                    "promoted": budget_exceeded && provisional == RunStatus::Ended,
                }),
            )?;
        }

        record.usage = Some(usage.clone());
        record.context_cycles = lo.context_cycles.clone();
        record.transition(final_status, Some(clock.wallclock_iso()));
        record.save(&layout.run_yaml(&request.project, &request.run_id))?;

        let terminal_kind = match final_status {
            RunStatus::Stopped => EventKind::RunStopped,
            RunStatus::Failed => EventKind::RunFailed,
            _ => EventKind::RunEnded,
        };
        let mut payload = json!({
            "exit_code": lo.exit_code,
            "status": final_status.to_string(),
        });
        if final_status == RunStatus::Stopped {
            payload["stopped"] = json!(true);
        }
        if budget_exceeded {
            payload["budget_exceeded"] = json!(true);
        }
        if let Some(error) = &lo.error {
            payload["error"] = json!(error);
        }
        emit(&mut journal, terminal_kind, payload)?;
        journal.flush()?;

        Ok(RunOutcome {
            run_id: request.run_id,
            status: final_status,
            exit_code: lo.exit_code,
            usage,
            raw_output: lo.raw_output,
            stderr_tail: lo.stderr_tail,
            error: lo.error,
            budget_exceeded,
        })
    }
}

struct LoopOutcome {
    success: bool,
    exit_code: Option<i32>,
    reported_usages: Vec<UsageSummary>,
    context_cycles: Vec<String>,
    raw_output: String,
    stderr_tail: String,
    stdin_chars: u64,
    stdout_chars: u64,
    stderr_chars: u64,
    error: Option<String>,
}

struct RunLoop<'a, C: Clock> {
    deps: Arc<EngineDeps<C>>,
    request: &'a RunRequest,
    outputs_dir: PathBuf,
    exec_cwd: PathBuf,
    started: std::time::Instant,
}

impl<C: Clock> RunLoop<'_, C> {
    async fn drive(
        &self,
        journal: &mut JournalWriter,
        cancel: CancellationToken,
    ) -> Result<LoopOutcome, EngineError> {
        match &self.request.spec {
            RunSpec::Command { argv, env, stdin, .. } => {
                self.drive_command(journal, cancel, argv, env, stdin.as_deref()).await
            }
            RunSpec::Prompt { text, model, .. } => {
                self.drive_app_server(journal, cancel, text, model).await
            }
        }
    }

    fn spawn_pumps(
        child: &mut Child,
    ) -> (mpsc::Receiver<StreamMsg>, Option<tokio::process::ChildStdin>) {
        let (tx, rx) = mpsc::channel::<StreamMsg>(64);
        let stdin = child.stdin.take();

        if let Some(mut stdout) = child.stdout.take() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                loop {
                    match stdout.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                            if tx.send(StreamMsg::Chunk { is_stdout: true, text }).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = tx.send(StreamMsg::Closed { is_stdout: true }).await;
            });
        }
        if let Some(mut stderr) = child.stderr.take() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                loop {
                    match stderr.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                            if tx.send(StreamMsg::Chunk { is_stdout: false, text }).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = tx.send(StreamMsg::Closed { is_stdout: false }).await;
            });
        }
        (rx, stdin)
    }

    fn emit(
        &self,
        journal: &mut JournalWriter,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Result<(), JournalError> {
        let clock = &self.deps.clock;
        let envelope = EventEnvelope::system(
            self.request.run_id,
            self.request.session_ref.clone(),
            kind,
            payload,
            clock.wallclock_iso(),
        )
        .with_monotonic_ms(clock.now().duration_since(self.started).as_millis() as u64);
        journal.append(&envelope)?;
        if journal.needs_flush() {
            journal.flush()?;
        }
        Ok(())
    }

    /// Write the stop marker (idempotent) and return whether it was new.
    fn raise_stop_marker(&self) -> bool {
        let flag = self
            .deps
            .layout
            .stop_flag(&self.request.project, &self.request.run_id);
        if flag.exists() {
            return false;
        }
        let _ = std::fs::write(&flag, self.deps.clock.wallclock_iso());
        true
    }

    fn send_sigterm(child: &Child) {
        if let Some(pid) = child.id() {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            );
        }
    }

    async fn drive_command(
        &self,
        journal: &mut JournalWriter,
        cancel: CancellationToken,
        argv: &[String],
        env: &std::collections::HashMap<String, String>,
        stdin_text: Option<&str>,
    ) -> Result<LoopOutcome, EngineError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(EngineError::Spawn("empty argv".to_string()));
        };
        std::fs::create_dir_all(&self.exec_cwd).map_err(|e| io_err(&self.exec_cwd, e))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&self.exec_cwd)
            .envs(env)
            .stdin(if stdin_text.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command.spawn().map_err(|e| EngineError::Spawn(e.to_string()))?;

        let (rx, stdin) = Self::spawn_pumps(&mut child);
        let mut stdin_chars = 0u64;
        if let (Some(mut stdin), Some(text)) = (stdin, stdin_text) {
            stdin_chars = text.len() as u64;
            let stdin_path = self.outputs_dir.join("stdin.txt");
            std::fs::write(&stdin_path, text).map_err(|e| io_err(&stdin_path, e))?;
            let owned = text.to_string();
            tokio::spawn(async move {
                let _ = stdin.write_all(owned.as_bytes()).await;
                // Dropping closes the pipe so line-reading children finish.
            });
        }

        let mut tee = Tee::open(&self.outputs_dir)?;
        tee.stdin_chars = stdin_chars;
        let exit = self
            .pump_until_exit(journal, cancel, &mut child, rx, &mut tee, None)
            .await?;

        Ok(tee.into_outcome(exit, None))
    }

    async fn drive_app_server(
        &self,
        journal: &mut JournalWriter,
        cancel: CancellationToken,
        prompt: &str,
        model: &str,
    ) -> Result<LoopOutcome, EngineError> {
        let provider = &self.request.provider;
        let binary = self
            .deps
            .machine
            .binary_for(provider)
            .ok_or_else(|| EngineError::MissingBinary(provider.as_str().to_string()))?
            .clone();

        let mut command = Command::new(&binary.bin);
        command
            .args(&binary.args)
            .current_dir(&self.exec_cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        std::fs::create_dir_all(&self.exec_cwd).map_err(|e| io_err(&self.exec_cwd, e))?;
        let mut child = command.spawn().map_err(|e| EngineError::Spawn(e.to_string()))?;

        let (rx, stdin) = Self::spawn_pumps(&mut child);
        let mut stdin = stdin.ok_or_else(|| EngineError::Spawn("no stdin pipe".to_string()))?;

        let (mut session, init) = AppServerSession::start(prompt, model);
        write_rpc(&mut stdin, &init).await?;

        let mut tee = Tee::open(&self.outputs_dir)?;
        let exit = self
            .pump_until_exit(journal, cancel, &mut child, rx, &mut tee, Some((&mut session, &mut stdin)))
            .await?;

        // Persist the accumulated assistant message.
        if !tee.assistant.is_empty() {
            let path = self.outputs_dir.join("last_message.md");
            std::fs::write(&path, &tee.assistant).map_err(|e| io_err(&path, e))?;
        }

        let completion = session.completion_status().map(|s| s.to_string());
        Ok(tee.into_outcome(exit, completion))
    }

    /// Shared pump: tee chunks, parse lines, watch stop signals, escalate
    /// interrupt -> SIGTERM -> SIGKILL, and wait for process close.
    async fn pump_until_exit(
        &self,
        journal: &mut JournalWriter,
        cancel: CancellationToken,
        child: &mut Child,
        mut rx: mpsc::Receiver<StreamMsg>,
        tee: &mut Tee,
        mut appserver: Option<(&mut AppServerSession, &mut tokio::process::ChildStdin)>,
    ) -> Result<Option<i32>, EngineError> {
        let stop_flag = self
            .deps
            .layout
            .stop_flag(&self.request.project, &self.request.run_id);
        let is_appserver = appserver.is_some();

        let mut phase = StopPhase::Running;
        let mut next_escalation: Option<tokio::time::Instant> = None;
        let mut poll = tokio::time::interval(STOP_FLAG_POLL);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut streams_open = 2u8;

        // Phase 1: drain stdio until both pumps close (pipes close when
        // the child exits or is killed).
        while streams_open > 0 {
            tokio::select! {
                biased;

                _ = cancel.cancelled(), if phase == StopPhase::Running => {
                    phase = self.begin_stop(child, &mut appserver, is_appserver).await;
                    next_escalation = Some(tokio::time::Instant::now() + if is_appserver {
                        TERM_AFTER_INTERRUPT
                    } else {
                        KILL_AFTER
                    });
                }

                _ = poll.tick() => {
                    if phase == StopPhase::Running && stop_flag.exists() {
                        phase = self.begin_stop(child, &mut appserver, is_appserver).await;
                        next_escalation = Some(tokio::time::Instant::now() + if is_appserver {
                            TERM_AFTER_INTERRUPT
                        } else {
                            KILL_AFTER
                        });
                    } else {
                        Self::escalate_if_due(child, &mut phase, &mut next_escalation);
                    }
                }

                msg = rx.recv() => {
                    match msg {
                        Some(StreamMsg::Chunk { is_stdout, text }) => {
                            self.on_chunk(journal, tee, is_stdout, &text, &mut appserver).await?;
                        }
                        Some(StreamMsg::Closed { .. }) => streams_open -= 1,
                        None => streams_open = 0,
                    }
                }
            }
        }

        // Phase 2: wait for process close, still escalating a pending
        // stop so an ignoring child cannot wedge finalization.
        loop {
            match tokio::time::timeout(STOP_FLAG_POLL, child.wait()).await {
                Ok(status) => {
                    let code = status.ok().and_then(|s| s.code());
                    journal.flush()?;
                    return Ok(code);
                }
                Err(_) => {
                    if phase == StopPhase::Running && (cancel.is_cancelled() || stop_flag.exists()) {
                        phase = self.begin_stop(child, &mut appserver, is_appserver).await;
                        next_escalation = Some(tokio::time::Instant::now() + if is_appserver {
                            TERM_AFTER_INTERRUPT
                        } else {
                            KILL_AFTER
                        });
                    }
                    Self::escalate_if_due(child, &mut phase, &mut next_escalation);
                }
            }
        }
    }

    fn escalate_if_due(
        child: &mut Child,
        phase: &mut StopPhase,
        next_escalation: &mut Option<tokio::time::Instant>,
    ) {
        let Some(at) = *next_escalation else { return };
        if tokio::time::Instant::now() < at {
            return;
        }
        match *phase {
            StopPhase::Interrupted => {
                Self::send_sigterm(child);
                *phase = StopPhase::Termed;
                *next_escalation = Some(tokio::time::Instant::now() + KILL_AFTER);
            }
            StopPhase::Termed => {
                let _ = child.start_kill();
                *phase = StopPhase::Killed;
                *next_escalation = None;
            }
            _ => *next_escalation = None,
        }
    }

    async fn begin_stop(
        &self,
        child: &Child,
        appserver: &mut Option<(&mut AppServerSession, &mut tokio::process::ChildStdin)>,
        is_appserver: bool,
    ) -> StopPhase {
        self.raise_stop_marker();
        if is_appserver {
            if let Some((session, stdin)) = appserver {
                if let Some(interrupt) = session.interrupt_request() {
                    let _ = write_rpc(stdin, &interrupt).await;
                }
            }
            StopPhase::Interrupted
        } else {
            Self::send_sigterm(child);
            StopPhase::Termed
        }
    }

    async fn on_chunk(
        &self,
        journal: &mut JournalWriter,
        tee: &mut Tee,
        is_stdout: bool,
        text: &str,
        appserver: &mut Option<(&mut AppServerSession, &mut tokio::process::ChildStdin)>,
    ) -> Result<(), EngineError> {
        tee.write_raw(is_stdout, text)?;
        self.emit(
            journal,
            EventKind::ProviderRaw,
            json!({
                "stream": if is_stdout { "stdout" } else { "stderr" },
                "text": text,
            }),
        )?;

        let lines = if is_stdout {
            tee.stdout_lines.feed(text)
        } else {
            tee.stderr_lines.feed(text)
        };
        for line in lines {
            for usage in tee.extractor.extract(&line, &self.request.provider) {
                if tee.deduper.admit(&usage) {
                    self.emit(journal, EventKind::UsageReported, serde_json::to_value(&usage)?)?;
                    tee.reported.push(usage);
                }
            }
            if is_stdout {
                if let Some((session, stdin)) = appserver {
                    for action in session.on_line(&line, &self.request.provider) {
                        match action {
                            SessionAction::Send(message) => {
                                let _ = write_rpc(stdin, &message).await;
                            }
                            SessionAction::AssistantDelta(delta) => tee.assistant.push_str(&delta),
                            SessionAction::UsageReported(usage) => {
                                if tee.deduper.admit(&usage) {
                                    self.emit(
                                        journal,
                                        EventKind::UsageReported,
                                        serde_json::to_value(&usage)?,
                                    )?;
                                    tee.reported.push(usage);
                                }
                            }
                            SessionAction::Completed(_) => {
                                // Close stdin so the server exits its loop.
                                let _ = stdin.shutdown().await;
                            }
                            SessionAction::ErrorNote(note) => tee.error = Some(note),
                            SessionAction::ContextCycle(kind) => {
                                self.emit(
                                    journal,
                                    EventKind::ContextCycleDetected,
                                    json!({"kind": kind}),
                                )?;
                                tee.context_cycles.push(kind);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

async fn write_rpc(
    stdin: &mut tokio::process::ChildStdin,
    message: &serde_json::Value,
) -> Result<(), EngineError> {
    let mut line = message.to_string();
    line.push('\n');
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| EngineError::Spawn(format!("app-server stdin write: {e}")))?;
    Ok(())
}

/// Verbatim stream capture plus live-parse state.
struct Tee {
    stdout_file: std::fs::File,
    stderr_file: std::fs::File,
    stdout_lines: LineSplitter,
    stderr_lines: LineSplitter,
    extractor: ExtractorSet,
    deduper: UsageDeduper,
    reported: Vec<UsageSummary>,
    context_cycles: Vec<String>,
    assistant: String,
    stdout_text: String,
    stderr_text: String,
    stdin_chars: u64,
    stdout_chars: u64,
    stderr_chars: u64,
    error: Option<String>,
}

impl Tee {
    fn open(outputs_dir: &std::path::Path) -> Result<Self, EngineError> {
        let stdout_path = outputs_dir.join("stdout.txt");
        let stderr_path = outputs_dir.join("stderr.txt");
        Ok(Self {
            stdout_file: std::fs::File::create(&stdout_path)
                .map_err(|e| io_err(&stdout_path, e))?,
            stderr_file: std::fs::File::create(&stderr_path)
                .map_err(|e| io_err(&stderr_path, e))?,
            stdout_lines: LineSplitter::new(),
            stderr_lines: LineSplitter::new(),
            extractor: ExtractorSet::standard(),
            deduper: UsageDeduper::new(),
            reported: Vec::new(),
            context_cycles: Vec::new(),
            assistant: String::new(),
            stdout_text: String::new(),
            stderr_text: String::new(),
            stdin_chars: 0,
            stdout_chars: 0,
            stderr_chars: 0,
            error: None,
        })
    }

    fn write_raw(&mut self, is_stdout: bool, text: &str) -> Result<(), EngineError> {
        let (file, chars, buffer) = if is_stdout {
            (&mut self.stdout_file, &mut self.stdout_chars, &mut self.stdout_text)
        } else {
            (&mut self.stderr_file, &mut self.stderr_chars, &mut self.stderr_text)
        };
        file.write_all(text.as_bytes())
            .map_err(|e| EngineError::Spawn(format!("output tee write: {e}")))?;
        *chars += text.len() as u64;
        buffer.push_str(text);
        Ok(())
    }

    fn into_outcome(self, exit_code: Option<i32>, completion: Option<String>) -> LoopOutcome {
        let success = match &completion {
            Some(status) => status == "completed",
            None => exit_code == Some(0),
        };
        let raw_output = if self.assistant.is_empty() {
            self.stdout_text.clone()
        } else {
            self.assistant.clone()
        };
        let stderr_tail: String = {
            let text = &self.stderr_text;
            let start = text.len().saturating_sub(2000);
            text[start..].to_string()
        };
        LoopOutcome {
            success,
            exit_code,
            reported_usages: self.reported,
            context_cycles: self.context_cycles,
            raw_output,
            stderr_tail,
            stdin_chars: self.stdin_chars,
            stdout_chars: self.stdout_chars,
            stderr_chars: self.stderr_chars,
            error: self.error,
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
