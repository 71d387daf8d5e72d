// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job runner: bounded-retry wrapper around execution
//!
//! Attempt 1 runs the configured worker with the initial prompt; attempt 2
//! repairs malformed output with a strict-JSON prompt; attempt 3 hands the
//! raw output to a cross-provider reformatter. After three failures the
//! job completes with a `needs_input` fallback result.

use crate::classify::classify_failure;
use crate::executor::{EngineError, ExecutionEngine, RunRequest};
use crate::lane::{LaneGate, LaneKey};
use crate::prompts::{initial_prompt, reformat_prompt, repair_prompt};
use ac_core::{
    validate_heartbeat_report, validate_result, AgentId, AgentProfile, AttemptStatus, Clock,
    ContractMode, HeartbeatReport, JobId, JobKind, JobRecord, JobSpec, JobStatus, ProjectId,
    ProviderKind, ResultError, ResultSpec, ResultStatus, RunId, RunSpec, RunStatus,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Record(#[from] ac_core::RecordError),
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of a submit call.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Started(JobId),
    /// The key was already active; no new attempt was created.
    AlreadyActive(JobId, JobStatus),
}

impl SubmitOutcome {
    pub fn job_id(&self) -> JobId {
        match self {
            SubmitOutcome::Started(id) | SubmitOutcome::AlreadyActive(id, _) => *id,
        }
    }
}

/// Broadcast to interested parties (heartbeat service) when a job
/// reaches a terminal state.
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub project: ProjectId,
    pub job_id: JobId,
    pub job_kind: JobKind,
    pub agent_id: Option<AgentId>,
    pub status: JobStatus,
    pub result_status: ResultStatus,
    pub report: Option<HeartbeatReport>,
}

struct ActiveSlot {
    cancel: CancellationToken,
}

struct Inner<C: Clock> {
    engine: ExecutionEngine<C>,
    gate: LaneGate,
    /// (project, job) -> live slot. Mutated only by the owning job task
    /// and submit/cancel.
    active: Mutex<HashMap<(String, String), ActiveSlot>>,
    completions: broadcast::Sender<JobCompletion>,
}

/// Cheap-to-clone handle; one per workspace.
#[derive(Clone)]
pub struct JobRunner<C: Clock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> JobRunner<C> {
    pub fn new(engine: ExecutionEngine<C>, gate: LaneGate) -> Self {
        let (completions, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner { engine, gate, active: Mutex::new(HashMap::new()), completions }),
        }
    }

    pub fn subscribe_completions(&self) -> broadcast::Receiver<JobCompletion> {
        self.inner.completions.subscribe()
    }

    pub fn deps(&self) -> &crate::executor::EngineDeps<C> {
        self.inner.engine.deps()
    }

    pub fn gate(&self) -> &LaneGate {
        &self.inner.gate
    }

    /// Submit a new job under a fresh id.
    pub fn submit(&self, project: ProjectId, spec: JobSpec) -> Result<SubmitOutcome, JobError> {
        self.submit_with_id(project, JobId::generate(), spec)
    }

    /// Submit under a caller-chosen id. Re-submission of an active key
    /// returns the live status without creating a new attempt.
    pub fn submit_with_id(
        &self,
        project: ProjectId,
        job_id: JobId,
        spec: JobSpec,
    ) -> Result<SubmitOutcome, JobError> {
        let key = (project.to_string(), job_id.to_string());
        {
            let active = self.inner.active.lock();
            if active.contains_key(&key) {
                let record = self.poll(&project, &job_id)?;
                return Ok(SubmitOutcome::AlreadyActive(job_id, record.status));
            }
        }

        let deps = self.inner.engine.deps();
        let record = JobRecord::new(job_id, spec.clone(), deps.clock.wallclock_iso());
        record.save(&deps.layout.job_yaml(&project, &job_id))?;

        let cancel = CancellationToken::new();
        self.inner
            .active
            .lock()
            .insert(key, ActiveSlot { cancel: cancel.clone() });

        let runner = self.clone();
        tokio::spawn(async move {
            if let Err(e) = run_job(runner.clone(), project.clone(), job_id, spec, cancel).await {
                tracing::error!(job = %job_id, error = %e, "job task failed");
            }
            runner
                .inner
                .active
                .lock()
                .remove(&(project.to_string(), job_id.to_string()));
        });
        Ok(SubmitOutcome::Started(job_id))
    }

    /// Request cancellation; the running attempt is aborted and the job
    /// finalizes as canceled at the next attempt boundary.
    pub fn cancel(&self, project: &ProjectId, job_id: &JobId) -> Result<bool, JobError> {
        let deps = self.inner.engine.deps();
        let path = deps.layout.job_yaml(project, job_id);
        let mut record = JobRecord::load(&path).map_err(|_| JobError::NotFound(job_id.to_string()))?;
        if record.status.is_terminal() {
            return Ok(false);
        }
        record.cancellation_requested = true;
        record.save(&path)?;

        let key = (project.to_string(), job_id.to_string());
        if let Some(slot) = self.inner.active.lock().get(&key) {
            slot.cancel.cancel();
        }
        Ok(true)
    }

    pub fn poll(&self, project: &ProjectId, job_id: &JobId) -> Result<JobRecord, JobError> {
        let deps = self.inner.engine.deps();
        JobRecord::load(&deps.layout.job_yaml(project, job_id))
            .map_err(|_| JobError::NotFound(job_id.to_string()))
    }

    /// Job record plus its final result JSON, once completed.
    pub fn collect(
        &self,
        project: &ProjectId,
        job_id: &JobId,
    ) -> Result<(JobRecord, Option<serde_json::Value>), JobError> {
        let record = self.poll(project, job_id)?;
        let deps = self.inner.engine.deps();
        let result_path = deps.layout.job_result_json(project, job_id);
        let result = if result_path.exists() {
            let text = std::fs::read_to_string(&result_path)
                .map_err(|e| ac_core::RecordError::io(&result_path, e))?;
            Some(serde_json::from_str(&text)?)
        } else {
            None
        };
        Ok((record, result))
    }

    pub fn list(&self, project: &ProjectId) -> Vec<JobRecord> {
        let deps = self.inner.engine.deps();
        let jobs_dir = deps.layout.jobs_dir(project);
        let Ok(entries) = std::fs::read_dir(&jobs_dir) else {
            return Vec::new();
        };
        let mut jobs: Vec<JobRecord> = entries
            .flatten()
            .filter_map(|e| JobRecord::load(&e.path().join("job.yaml")).ok())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }
}

/// Load agent profiles from `org/agents/*/agent.yaml`, sorted by id.
fn load_profiles(layout: &ac_core::WorkspaceLayout) -> Vec<AgentProfile> {
    let Ok(entries) = std::fs::read_dir(layout.agents_dir()) else {
        return Vec::new();
    };
    let mut profiles: Vec<AgentProfile> = entries
        .flatten()
        .filter_map(|e| {
            let path = e.path().join("agent.yaml");
            let text = std::fs::read_to_string(path).ok()?;
            serde_yaml::from_str(&text).ok()
        })
        .collect();
    profiles.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
    profiles
}

struct ResolvedWorker {
    agent_id: AgentId,
    provider: ProviderKind,
    model: String,
    team: String,
}

/// Worker resolution. Attempts 1-2 use the configured worker (or a
/// first-fit provider match); attempt 3 prefers a codex-family
/// reformatter, falling back to claude-family, then the primary.
fn resolve_worker(profiles: &[AgentProfile], spec: &JobSpec, attempt: u32) -> ResolvedWorker {
    let primary = spec
        .worker_agent_id
        .as_ref()
        .and_then(|id| profiles.iter().find(|p| &p.agent_id == id))
        .or_else(|| {
            profiles
                .iter()
                .find(|p| p.provider.as_str() == spec.worker_kind)
        });

    let chosen = if attempt >= 3 {
        profiles
            .iter()
            .find(|p| p.provider.is_codex_family())
            .or_else(|| profiles.iter().find(|p| p.provider.is_claude_family()))
            .or(primary)
    } else {
        primary
    };

    match chosen {
        Some(profile) => ResolvedWorker {
            agent_id: profile.agent_id.clone(),
            provider: profile.provider.clone(),
            model: profile.model.clone().unwrap_or_else(|| "default".to_string()),
            team: profile.team_id.clone().unwrap_or_default(),
        },
        None => ResolvedWorker {
            agent_id: spec
                .worker_agent_id
                .clone()
                .unwrap_or_else(|| AgentId::new(format!("{}-worker", spec.worker_kind))),
            provider: ProviderKind::parse(&spec.worker_kind),
            model: "default".to_string(),
            team: String::new(),
        },
    }
}

enum Disposition {
    Valid(ResultSpec, Option<HeartbeatReport>),
    Fallback,
    Blocked,
    Canceled,
}

async fn run_job<C: Clock>(
    runner: JobRunner<C>,
    project: ProjectId,
    job_id: JobId,
    spec: JobSpec,
    cancel: CancellationToken,
) -> Result<(), JobError> {
    let inner = &runner.inner;
    let deps = inner.engine.deps();
    let layout = &deps.layout;
    let clock = &deps.clock;
    let job_path = layout.job_yaml(&project, &job_id);

    let mut job = JobRecord::load(&job_path)?;
    let profiles = load_profiles(layout);

    let mut last_raw = String::new();
    let mut accumulated: Vec<String> = Vec::new();
    let mut last_agent: Option<AgentId> = None;
    let mut disposition = Disposition::Fallback;

    'attempts: for attempt_no in 1..=ac_core::job::MAX_ATTEMPTS {
        if cancel.is_cancelled() {
            disposition = Disposition::Canceled;
            break;
        }

        let worker = resolve_worker(&profiles, &spec, attempt_no);
        last_agent = Some(worker.agent_id.clone());

        // Preflight: an unverified subscription blocks immediately.
        if let Some(binary) = deps.machine.binary_for(&worker.provider) {
            if binary.subscription_verified == Some(false) {
                accumulated.push(format!(
                    "subscription_unverified: provider {} is not verified on this machine",
                    worker.provider
                ));
                disposition = Disposition::Blocked;
                break;
            }
        }

        let mode = deps.machine.contract_modes.mode_for(&worker.provider);
        let mode_str = match mode {
            ContractMode::ProviderSchema => "provider_schema",
            ContractMode::PromptOnly => "prompt_only",
        };
        let prompt = match attempt_no {
            1 => initial_prompt(&spec, mode),
            2 => repair_prompt(&spec, &last_raw, &accumulated),
            _ => reformat_prompt(&spec, &last_raw, &accumulated),
        };

        let run_id = RunId::generate();
        let run_spec = match (&worker.provider, deps.machine.binary_for(&worker.provider)) {
            (ProviderKind::Codex | ProviderKind::Claude, Some(_)) => RunSpec::Prompt {
                text: prompt.clone(),
                model: worker.model.clone(),
                worktree: false,
            },
            (_, Some(binary)) => {
                let mut argv = vec![binary.bin.clone()];
                argv.extend(binary.args.iter().cloned());
                RunSpec::Command {
                    argv,
                    workdir_rel: None,
                    env: HashMap::new(),
                    stdin: Some(prompt.clone()),
                }
            }
            (provider, None) => {
                accumulated.push(format!("no binary configured for provider {provider}"));
                job.begin_attempt(run_id, worker.provider.clone(), mode_str, clock.wallclock_iso());
                job.end_attempt(
                    AttemptStatus::Failed,
                    Some("provider binary missing".to_string()),
                    clock.wallclock_iso(),
                );
                job.save(&job_path)?;
                continue;
            }
        };

        let lane = LaneKey::new("normal", worker.provider.as_str(), worker.team.clone());
        let permit = inner.gate.admit(&lane).await;

        job.begin_attempt(run_id, worker.provider.clone(), mode_str, clock.wallclock_iso());
        job.save(&job_path)?;

        let request = RunRequest {
            project: project.clone(),
            run_id,
            agent_id: worker.agent_id.clone(),
            provider: worker.provider.clone(),
            session_ref: format!("job:{job_id}:attempt:{attempt_no}"),
            spec: run_spec,
            task: None,
            repo_root: None,
        };
        let outcome = inner.engine.execute(request, cancel.child_token()).await;
        drop(permit);

        match outcome {
            Err(e) => {
                let text = e.to_string();
                let class = classify_failure(&text);
                inner.gate.report_backpressure(worker.provider.as_str(), class);
                accumulated.push(format!("attempt {attempt_no}: {text}"));
                job.end_attempt(AttemptStatus::Failed, Some(text), clock.wallclock_iso());
                job.save(&job_path)?;
            }
            Ok(out) => {
                if cancel.is_cancelled() || out.status == RunStatus::Stopped {
                    job.end_attempt(AttemptStatus::Canceled, None, clock.wallclock_iso());
                    job.save(&job_path)?;
                    disposition = Disposition::Canceled;
                    break 'attempts;
                }
                if out.status == RunStatus::Failed {
                    let text = out
                        .error
                        .clone()
                        .unwrap_or_else(|| format!("exit code {:?}", out.exit_code));
                    let class = classify_failure(&format!("{} {}", out.stderr_tail, text));
                    inner.gate.report_backpressure(worker.provider.as_str(), class);
                    accumulated.push(format!("attempt {attempt_no}: run failed: {text}"));
                    job.end_attempt(AttemptStatus::Failed, Some(text), clock.wallclock_iso());
                    job.save(&job_path)?;
                    continue;
                }

                // Run ended cleanly: validate the structured output.
                let validation = match spec.job_kind {
                    JobKind::Execution => {
                        validate_result(&out.raw_output).map(|result| (result, None))
                    }
                    JobKind::Heartbeat => validate_heartbeat_report(&out.raw_output)
                        .map(|report| (report_to_result(&report), Some(report))),
                };
                match validation {
                    Ok((result, report)) => {
                        job.end_attempt(AttemptStatus::Succeeded, None, clock.wallclock_iso());
                        job.save(&job_path)?;
                        disposition = Disposition::Valid(result, report);
                        break 'attempts;
                    }
                    Err(errors) => {
                        last_raw = out.raw_output.clone();
                        accumulated.extend(errors);
                        job.end_attempt(
                            AttemptStatus::Failed,
                            Some("output validation failed".to_string()),
                            clock.wallclock_iso(),
                        );
                        job.save(&job_path)?;
                    }
                }
            }
        }
    }

    finalize_job(
        &runner,
        &project,
        &job_id,
        &mut job,
        &spec,
        disposition,
        accumulated,
        last_agent,
    )
}

fn report_to_result(report: &HeartbeatReport) -> ResultSpec {
    let mut result = ResultSpec::bare(ResultStatus::Succeeded, report.summary.clone());
    result.next_actions = report.actions.iter().map(|a| a.title.clone()).collect();
    result
}

/// Compact digest for managers: statuses and counts, not transcripts.
fn manager_digest(result: &ResultSpec) -> serde_json::Value {
    json!({
        "status": result.status,
        "summary": result.summary,
        "files_changed": result.files_changed.len(),
        "commands_run": result.commands_run.len(),
        "artifacts": result.artifacts.len(),
        "errors": result.errors.len(),
        "next_actions": result.next_actions,
    })
}

#[allow(clippy::too_many_arguments)]
fn finalize_job<C: Clock>(
    runner: &JobRunner<C>,
    project: &ProjectId,
    job_id: &JobId,
    job: &mut JobRecord,
    spec: &JobSpec,
    disposition: Disposition,
    accumulated: Vec<String>,
    last_agent: Option<AgentId>,
) -> Result<(), JobError> {
    let deps = runner.inner.engine.deps();
    let layout = &deps.layout;
    let clock = &deps.clock;
    let job_path = layout.job_yaml(project, job_id);

    let (job_status, result, report) = match disposition {
        Disposition::Valid(result, report) => (JobStatus::Completed, result, report),
        Disposition::Canceled => {
            // The cancel() call races our periodic saves; make the flag
            // durable with the terminal record.
            job.cancellation_requested = true;
            (
                JobStatus::Canceled,
                ResultSpec::bare(ResultStatus::Canceled, "job canceled"),
                None,
            )
        }
        Disposition::Blocked => {
            let mut result = ResultSpec::bare(
                ResultStatus::Blocked,
                "provider preflight failed: subscription unverified",
            );
            result.errors = vec![ResultError::new(
                "subscription_unverified",
                accumulated.last().cloned().unwrap_or_default(),
            )];
            (JobStatus::Completed, result, None)
        }
        Disposition::Fallback => {
            let mut result = ResultSpec::bare(
                ResultStatus::NeedsInput,
                "no valid structured output after 3 attempts; operator input needed",
            );
            result.errors = accumulated
                .iter()
                .map(|message| {
                    let code = if message.starts_with("result_schema_invalid") {
                        "result_schema_invalid"
                    } else if message.starts_with("result_unparseable") {
                        "result_unparseable"
                    } else {
                        "attempt_failed"
                    };
                    ResultError::new(code, message.clone())
                })
                .collect();
            (JobStatus::Completed, result, None)
        }
    };

    let result_path = layout.job_result_json(project, job_id);
    std::fs::write(&result_path, serde_json::to_vec_pretty(&result)?)
        .map_err(|e| ac_core::RecordError::io(&result_path, e))?;
    let digest_path = layout.job_manager_digest_json(project, job_id);
    std::fs::write(&digest_path, serde_json::to_vec_pretty(&manager_digest(&result))?)
        .map_err(|e| ac_core::RecordError::io(&digest_path, e))?;
    if let Some(report) = &report {
        let report_path = layout.job_heartbeat_report_json(project, job_id);
        std::fs::write(&report_path, serde_json::to_vec_pretty(report)?)
            .map_err(|e| ac_core::RecordError::io(&report_path, e))?;
    }

    job.finalize(
        job_status,
        format!("jobs/{job_id}/result.json"),
        clock.wallclock_iso(),
    );
    job.save(&job_path)?;

    let _ = runner.inner.completions.send(JobCompletion {
        project: project.clone(),
        job_id: *job_id,
        job_kind: spec.job_kind,
        agent_id: last_agent,
        status: job_status,
        result_status: result.status,
        report,
    });
    Ok(())
}

#[cfg(test)]
#[path = "job_runner_tests.rs"]
mod tests;
