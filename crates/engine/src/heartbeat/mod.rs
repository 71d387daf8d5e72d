// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat scheduler: periodic triage, top-K wake, report ingestion
//!
//! One cooperative task per workspace runs the tick loop. Ticks never
//! overlap: a tick gate serializes the loop against manual
//! `heartbeat.tick` calls, and every tick checks for cancellation
//! between steps.

pub mod triage;

use crate::job_runner::{JobCompletion, JobError, JobRunner};
use ac_core::{
    AgentId, AgentProfile, Clock, HeartbeatConfig, HeartbeatState, JobId, JobKind, JobSpec,
    ProjectId, RecordError, ReportStatus, WorkspaceLayout,
};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use self::triage::{gather_signals, rank, Candidate};

#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Job(#[from] JobError),
}

/// What one tick did, for `heartbeat.status` and tests.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TickSummary {
    pub considered: usize,
    pub woken: Vec<String>,
    pub suppressed: Vec<String>,
    pub dropped_quiet: Vec<String>,
    pub enqueued_jobs: Vec<JobId>,
}

/// Per-workspace heartbeat scheduler.
pub struct HeartbeatService<C: Clock> {
    runner: JobRunner<C>,
    layout: WorkspaceLayout,
    clock: C,
    config: Mutex<HeartbeatConfig>,
    state: Mutex<HeartbeatState>,
    /// Serializes whole ticks. The background loop is not the only
    /// caller (`heartbeat.tick` is also an RPC method); without this
    /// gate two ticks could interleave their state reads, double-wake
    /// the same candidates, and race the state-file write.
    tick_gate: tokio::sync::Mutex<()>,
}

impl<C: Clock> HeartbeatService<C> {
    /// Load config and state from `.local/heartbeat/` and wire into the
    /// job runner's completion stream.
    pub fn new(runner: JobRunner<C>) -> Result<Arc<Self>, HeartbeatError> {
        let deps = runner.deps();
        let layout = deps.layout.clone();
        let clock = deps.clock.clone();
        let config = HeartbeatConfig::load(&layout.heartbeat_config_yaml())?;
        let state = HeartbeatState::load(&layout.heartbeat_state_yaml())?;
        let service = Arc::new(Self {
            runner,
            layout,
            clock,
            config: Mutex::new(config),
            state: Mutex::new(state),
            tick_gate: tokio::sync::Mutex::new(()),
        });
        Self::spawn_report_listener(&service);
        Ok(service)
    }

    fn spawn_report_listener(service: &Arc<Self>) {
        let mut completions = service.runner.subscribe_completions();
        let weak = Arc::downgrade(service);
        tokio::spawn(async move {
            while let Ok(completion) = completions.recv().await {
                let Some(service) = weak.upgrade() else { break };
                if completion.job_kind == JobKind::Heartbeat {
                    if let Err(e) = service.ingest_completion(&completion) {
                        tracing::warn!(error = %e, "heartbeat report ingestion failed");
                    }
                }
            }
        });
    }

    pub fn config(&self) -> HeartbeatConfig {
        self.config.lock().clone()
    }

    pub fn set_config(&self, config: HeartbeatConfig) -> Result<(), HeartbeatError> {
        let path = self.layout.heartbeat_config_yaml();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RecordError::io(&path, e))?;
        }
        let text = serde_yaml::to_string(&config).map_err(|e| RecordError::yaml(&path, e))?;
        std::fs::write(&path, text).map_err(|e| RecordError::io(&path, e))?;
        *self.config.lock() = config;
        Ok(())
    }

    pub fn status(&self) -> serde_json::Value {
        let config = self.config.lock().clone();
        let state = self.state.lock();
        serde_json::json!({
            "enabled": config.enabled,
            "tick_interval_minutes": config.tick_interval_minutes,
            "top_k_workers": config.top_k_workers,
            "ticks": state.ticks,
            "wakes": state.wakes,
            "suppressions": state.suppressions,
            "workers": state.workers.len(),
        })
    }

    fn load_profiles(&self) -> Vec<AgentProfile> {
        let Ok(entries) = std::fs::read_dir(self.layout.agents_dir()) else {
            return Vec::new();
        };
        let mut profiles: Vec<AgentProfile> = entries
            .flatten()
            .filter_map(|e| {
                let text = std::fs::read_to_string(e.path().join("agent.yaml")).ok()?;
                serde_yaml::from_str(&text).ok()
            })
            .collect();
        profiles.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        profiles
    }

    /// One triage pass. Cancellable between steps; a mid-tick abort
    /// abandons the tick without persisting partial state.
    ///
    /// Whole ticks are serialized by the tick gate, so the background
    /// loop and manual `heartbeat.tick` calls can never interleave.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, HeartbeatError> {
        let _tick = self.tick_gate.lock().await;
        let config = self.config();
        let now_ms = self.clock.epoch_ms();
        let mut summary = TickSummary::default();

        // 1. Enumerate workers and score them.
        let profiles = self.load_profiles();
        summary.considered = profiles.len();
        let mut candidates: Vec<Candidate> = Vec::new();
        {
            let state = self.state.lock();
            for profile in &profiles {
                candidates.push(gather_signals(&self.layout, profile, &state, &config, now_ms));
            }
        }
        if cancel.is_cancelled() {
            return Ok(summary);
        }

        // 2. Quiet hours drop low-scoring candidates.
        let hour = ac_core::clock::local_hour(now_ms);
        if config.in_quiet_hours(hour) {
            let (kept, dropped): (Vec<_>, Vec<_>) = candidates
                .into_iter()
                .partition(|c| c.score >= config.quiet_hours_min_score);
            summary.dropped_quiet = dropped.into_iter().map(|c| c.agent_id).collect();
            candidates = kept;
        }

        // 3. Suppression: ok-report + unchanged context + active window.
        {
            let state = self.state.lock();
            let (kept, suppressed): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|c| {
                let Some(pulse) = state.workers.get(&c.agent_id) else {
                    return true;
                };
                let suppressed = pulse.last_report_status == Some(ReportStatus::Ok)
                    && pulse.last_context_hash.as_deref() == Some(c.context_hash.as_str())
                    && pulse.suppressed_until.is_some_and(|until| now_ms < until);
                !suppressed
            });
            summary.suppressed = suppressed.into_iter().map(|c| c.agent_id).collect();
            candidates = kept;
        }
        if cancel.is_cancelled() {
            return Ok(summary);
        }

        // 4. Rank and wake the top K.
        let chosen = rank(candidates, config.top_k_workers, config.min_wake_score);
        for candidate in &chosen {
            if cancel.is_cancelled() {
                return Ok(summary);
            }
            let Some(project) = &candidate.home_project else {
                continue;
            };
            if config.jitter_max_seconds > 0 {
                let jitter_ms = rand::thread_rng().gen_range(0..=config.jitter_max_seconds * 1000);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            }
            let job_id = self
                .runner
                .submit(
                    ProjectId::new(project.clone()),
                    heartbeat_job_spec(&candidate.agent_id),
                )?
                .job_id();
            summary.enqueued_jobs.push(job_id);
            summary.woken.push(candidate.agent_id.clone());
        }

        // 5. Persist cursors, hashes, and counters.
        {
            let mut state = self.state.lock();
            state.ticks += 1;
            state.wakes += summary.woken.len() as u64;
            state.suppressions += summary.suppressed.len() as u64;
            for candidate in &chosen {
                state.pulse_mut(&candidate.agent_id).last_context_hash =
                    Some(candidate.context_hash.clone());
                for (run, seq) in &candidate.run_cursors {
                    state.run_event_cursors.insert(run.clone(), *seq);
                }
            }
            state.save(&self.layout.heartbeat_state_yaml())?;
        }

        Ok(summary)
    }

    /// Tick loop. Exits on cancellation. Manual `heartbeat.tick` calls
    /// share the tick gate with this loop, so ticks on one workspace
    /// never overlap.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let config = self.config();
            let interval = Duration::from_secs(config.tick_interval_minutes.max(1) * 60);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if !self.config().enabled {
                continue;
            }
            match self.tick(&cancel).await {
                Ok(summary) => {
                    tracing::info!(
                        woken = summary.woken.len(),
                        suppressed = summary.suppressed.len(),
                        "heartbeat tick"
                    );
                }
                Err(e) => tracing::warn!(error = %e, "heartbeat tick failed"),
            }
        }
    }

    fn ingest_completion(&self, completion: &JobCompletion) -> Result<(), HeartbeatError> {
        let Some(agent_id) = &completion.agent_id else {
            return Ok(());
        };
        let Some(report) = &completion.report else {
            return Ok(());
        };
        self.ingest_report(agent_id, report, &completion.project)
    }

    /// Apply a worker's structured heartbeat report.
    pub fn ingest_report(
        &self,
        agent_id: &AgentId,
        report: &ac_core::HeartbeatReport,
        project: &ProjectId,
    ) -> Result<(), HeartbeatError> {
        let config = self.config();
        let now_ms = self.clock.epoch_ms();

        match report.status {
            ReportStatus::Ok => {
                let mut state = self.state.lock();
                let pulse = state.pulse_mut(agent_id.as_str());
                pulse.last_ok_at = Some(now_ms);
                pulse.suppressed_until = Some(now_ms + config.ok_suppression_minutes * 60_000);
                pulse.last_report_status = Some(ReportStatus::Ok);
                state.save(&self.layout.heartbeat_state_yaml())?;
            }
            ReportStatus::Actions => {
                {
                    let mut state = self.state.lock();
                    let pulse = state.pulse_mut(agent_id.as_str());
                    pulse.last_report_status = Some(ReportStatus::Actions);
                }
                let mut enqueued_this_tick = 0usize;
                for action in &report.actions {
                    if enqueued_this_tick >= config.max_auto_actions_per_tick {
                        tracing::info!(agent = %agent_id, "per-tick auto-action cap reached");
                        break;
                    }
                    {
                        let mut state = self.state.lock();
                        if state.auto_actions_last_hour(now_ms) >= config.max_auto_actions_per_hour {
                            tracing::info!(agent = %agent_id, "per-hour auto-action cap reached");
                            break;
                        }
                        state.auto_action_stamps.push(now_ms);
                    }
                    let goal = match &action.detail {
                        Some(detail) => format!("{}: {}", action.title, detail),
                        None => action.title.clone(),
                    };
                    self.runner.submit(
                        project.clone(),
                        JobSpec {
                            goal,
                            constraints: Vec::new(),
                            deliverables: Vec::new(),
                            worker_kind: "claude".to_string(),
                            worker_agent_id: Some(agent_id.clone()),
                            permission_level: "standard".to_string(),
                            context_refs: action.task_id.iter().map(|t| format!("task:{t}")).collect(),
                            job_kind: JobKind::Execution,
                        },
                    )?;
                    enqueued_this_tick += 1;
                }
                let state = self.state.lock();
                state.save(&self.layout.heartbeat_state_yaml())?;
            }
        }
        Ok(())
    }
}

fn heartbeat_job_spec(agent_id: &str) -> JobSpec {
    JobSpec {
        goal: "Review your assigned tasks, runs, and inbox items; report status.".to_string(),
        constraints: Vec::new(),
        deliverables: Vec::new(),
        worker_kind: "claude".to_string(),
        worker_agent_id: Some(AgentId::new(agent_id)),
        permission_level: "standard".to_string(),
        context_refs: Vec::new(),
        job_kind: JobKind::Heartbeat,
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
