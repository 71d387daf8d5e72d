// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller: explicit process-wide state, built once at startup
//!
//! Everything RPC handlers touch hangs off this struct (no globals). One
//! controller owns one workspace; the `.local/daemon.lock` advisory lock
//! enforces the single-owner contract across processes.

use crate::comments::CommentStore;
use crate::conversation::ConversationStore;
use ac_core::records::TaskFrontMatter;
use ac_core::{
    AgentId, AgentProfile, Clock, MachineConfig, PolicyConfig, ProjectId, ProviderKind,
    RecordError, RunId, RunRecord, RunSpec, RunStatus, SystemClock, WorkspaceLayout,
};
use ac_engine::{
    EngineDeps, EngineError, ExecutionEngine, HeartbeatError, HeartbeatService, JobRunner, LaneGate,
    RunRequest,
};
use ac_index::{
    rebuild_workspace, sync_workspace, IndexError, IndexStore, IndexSyncWorker, RebuildCounts,
    SyncCounts, WorkspaceLocks,
};
use ac_journal::EventBus;
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("not a workspace (missing company/company.yaml): {0}")]
    NotAWorkspace(String),
    #[error("workspace already owned by another process: {0}")]
    Locked(String),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Heartbeat(#[from] HeartbeatError),
    #[error(transparent)]
    Job(#[from] ac_engine::JobError),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("run not found: {0}")]
    RunNotFound(String),
    #[error("agent not found: {0}")]
    AgentNotFound(String),
}

fn io_err(path: &Path, source: std::io::Error) -> ControllerError {
    ControllerError::Io { path: path.display().to_string(), source }
}

/// Parsed `company/company.yaml`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompanyConfig {
    pub name: String,
    pub created_at: String,
}

pub struct Controller {
    pub layout: WorkspaceLayout,
    pub bus: EventBus,
    pub locks: WorkspaceLocks,
    pub sync_worker: IndexSyncWorker,
    pub engine: ExecutionEngine<SystemClock>,
    pub runner: JobRunner<SystemClock>,
    pub heartbeat: Arc<HeartbeatService<SystemClock>>,
    pub conversations: ConversationStore,
    pub comments: CommentStore,
    pub clock: SystemClock,
    pub cancel: CancellationToken,
    active_runs: Arc<Mutex<HashMap<String, CancellationToken>>>,
    /// Held for the controller's lifetime; releasing it frees the
    /// workspace for the next owner.
    _owner_lock: std::fs::File,
}

impl Controller {
    /// Initialize a fresh workspace skeleton at `root`.
    pub fn init_workspace(root: &Path, name: &str) -> Result<(), ControllerError> {
        let layout = WorkspaceLayout::new(root);
        for dir in [
            layout.company_yaml().parent().map(Path::to_path_buf).unwrap_or_default(),
            layout.agents_dir(),
            layout.projects_dir(),
            layout.reviews_dir(),
            layout.help_requests_dir(),
            layout.conversations_dir(),
            layout.local_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
        let company = CompanyConfig {
            name: name.to_string(),
            created_at: SystemClock.wallclock_iso(),
        };
        let path = layout.company_yaml();
        let text = serde_yaml::to_string(&company).map_err(|e| RecordError::yaml(&path, e))?;
        std::fs::write(&path, text).map_err(|e| io_err(&path, e))?;

        let policy_path = layout.policy_yaml();
        if !policy_path.exists() {
            std::fs::write(&policy_path, "budget: {}\n").map_err(|e| io_err(&policy_path, e))?;
        }
        Ok(())
    }

    /// Open an existing workspace and wire up the long-lived tasks.
    /// Must run inside a tokio runtime.
    pub fn open(root: &Path) -> Result<Arc<Self>, ControllerError> {
        let layout = WorkspaceLayout::new(root);
        if !layout.company_yaml().exists() {
            return Err(ControllerError::NotAWorkspace(root.display().to_string()));
        }
        std::fs::create_dir_all(layout.local_dir())
            .map_err(|e| io_err(&layout.local_dir(), e))?;

        let lock_path = layout.daemon_lock();
        let owner_lock = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| io_err(&lock_path, e))?;
        owner_lock
            .try_lock_exclusive()
            .map_err(|_| ControllerError::Locked(root.display().to_string()))?;

        let machine = MachineConfig::load(&layout.machine_yaml())?;
        let policy = PolicyConfig::load(&layout.policy_yaml())?;
        let bus = EventBus::new();
        let locks = WorkspaceLocks::new();

        let engine = ExecutionEngine::new(EngineDeps {
            layout: layout.clone(),
            machine,
            policy,
            bus: bus.clone(),
            clock: SystemClock,
        });
        let runner = JobRunner::new(engine.clone(), LaneGate::new());
        let heartbeat = HeartbeatService::new(runner.clone())?;

        let sync_worker = IndexSyncWorker::spawn(locks.clone());
        sync_worker.attach_to_bus(&bus);

        let cancel = CancellationToken::new();
        let controller = Arc::new(Self {
            conversations: ConversationStore::new(layout.clone()),
            comments: CommentStore::new(layout.clone()),
            layout,
            bus,
            locks,
            sync_worker,
            engine,
            runner,
            heartbeat: Arc::clone(&heartbeat),
            clock: SystemClock,
            cancel: cancel.clone(),
            active_runs: Arc::new(Mutex::new(HashMap::new())),
            _owner_lock: owner_lock,
        });

        tokio::spawn(heartbeat.run(cancel));
        Ok(controller)
    }

    /// Structural validation: required directories and config files.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let checks = [
            (self.layout.company_yaml(), "company/company.yaml"),
            (self.layout.agents_dir(), "org/agents"),
            (self.layout.projects_dir(), "work/projects"),
            (self.layout.reviews_dir(), "inbox/reviews"),
            (self.layout.help_requests_dir(), "inbox/help_requests"),
        ];
        for (path, name) in checks {
            if !path.exists() {
                issues.push(format!("missing {name}"));
            }
        }
        issues
    }

    pub fn company(&self) -> Result<CompanyConfig, ControllerError> {
        let path = self.layout.company_yaml();
        let text = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(serde_yaml::from_str(&text).map_err(|e| RecordError::yaml(&path, e))?)
    }

    // -- projects --

    pub fn create_project(&self, project: &ProjectId) -> Result<(), ControllerError> {
        let path = self.layout.project_yaml(project);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(&path, e))?;
        }
        let text = format!(
            "project_id: {}\ncreated_at: {}\n",
            project,
            self.clock.wallclock_iso()
        );
        std::fs::write(&path, text).map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    pub fn list_projects(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.layout.projects_dir()) else {
            return Vec::new();
        };
        let mut projects: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().join("project.yaml").exists())
            .filter_map(|e| e.file_name().to_str().map(|s| s.to_string()))
            .collect();
        projects.sort();
        projects
    }

    // -- agents --

    pub fn agent_profile(&self, agent_id: &str) -> Result<AgentProfile, ControllerError> {
        let path = self.layout.agent_yaml(agent_id);
        let text = std::fs::read_to_string(&path)
            .map_err(|_| ControllerError::AgentNotFound(agent_id.to_string()))?;
        Ok(serde_yaml::from_str(&text).map_err(|e| RecordError::yaml(&path, e))?)
    }

    // -- runs / sessions --

    /// Create and launch a run. Returns immediately; the execution engine
    /// task owns the journal until the run terminates.
    pub fn create_run(
        &self,
        project: ProjectId,
        agent_id: AgentId,
        spec: RunSpec,
        task_id: Option<String>,
    ) -> Result<RunId, ControllerError> {
        let provider = self
            .agent_profile(agent_id.as_str())
            .map(|p| p.provider)
            .unwrap_or(ProviderKind::Cmd);
        let run_id = RunId::generate();

        let task: Option<TaskFrontMatter> = task_id.and_then(|tid| {
            TaskFrontMatter::load(&self.layout.tasks_dir(&project).join(format!("{tid}.md"))).ok()
        });
        let repo_root = self.repo_root_for(&project);

        // Pre-write the record so `run.list` sees the run before the
        // engine task gets scheduled.
        let record = RunRecord {
            project_id: project.clone(),
            run_id,
            provider: provider.clone(),
            agent_id: agent_id.clone(),
            context_pack_id: None,
            status: RunStatus::Running,
            created_at: self.clock.wallclock_iso(),
            ended_at: None,
            spec: spec.clone(),
            usage: None,
            context_cycles: Vec::new(),
            events_relpath: format!("runs/{run_id}/events.jsonl"),
        };
        record.save(&self.layout.run_yaml(&project, &run_id))?;

        let cancel = self.cancel.child_token();
        self.active_runs.lock().insert(run_id.to_string(), cancel.clone());

        let engine = self.engine.clone();
        let request = RunRequest {
            project,
            run_id,
            agent_id,
            provider,
            session_ref: format!("session:{run_id}"),
            spec,
            task,
            repo_root,
        };
        let active_runs = Arc::clone(&self.active_runs);
        tokio::spawn(async move {
            if let Err(e) = engine.execute(request, cancel).await {
                tracing::error!(run = %run_id, error = %e, "run execution failed");
            }
            active_runs.lock().remove(run_id.as_str());
        });
        Ok(run_id)
    }

    fn repo_root_for(&self, project: &ProjectId) -> Option<PathBuf> {
        let dir = self.layout.project_dir(project);
        dir.join(".git").exists().then_some(dir)
    }

    pub fn run_record(&self, project: &ProjectId, run_id: &RunId) -> Result<RunRecord, ControllerError> {
        RunRecord::load(&self.layout.run_yaml(project, run_id))
            .map_err(|_| ControllerError::RunNotFound(run_id.to_string()))
    }

    pub fn list_runs(&self, project: &ProjectId) -> Vec<RunRecord> {
        let Ok(entries) = std::fs::read_dir(self.layout.runs_dir(project)) else {
            return Vec::new();
        };
        let mut runs: Vec<RunRecord> = entries
            .flatten()
            .filter_map(|e| RunRecord::load(&e.path().join("run.yaml")).ok())
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs
    }

    /// Stop a run: cancel its token when this process owns it, and raise
    /// the stop marker either way.
    pub fn stop_run(&self, project: &ProjectId, run_id: &RunId) -> Result<(), ControllerError> {
        let record = self.run_record(project, run_id)?;
        if record.status.is_terminal() {
            return Ok(());
        }
        let flag = self.layout.stop_flag(project, run_id);
        if let Some(parent) = flag.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(&flag, e))?;
        }
        std::fs::write(&flag, self.clock.wallclock_iso()).map_err(|e| io_err(&flag, e))?;
        if let Some(token) = self.active_runs.lock().get(run_id.as_str()) {
            token.cancel();
        }
        Ok(())
    }

    /// Run outputs for `session.collect`.
    pub fn collect_run(
        &self,
        project: &ProjectId,
        run_id: &RunId,
    ) -> Result<serde_json::Value, ControllerError> {
        let record = self.run_record(project, run_id)?;
        let outputs = self.layout.run_outputs_dir(project, run_id);
        let read = |name: &str| std::fs::read_to_string(outputs.join(name)).ok();
        Ok(serde_json::json!({
            "run": serde_json::to_value(&record).unwrap_or_default(),
            "stdout": read("stdout.txt"),
            "stderr": read("stderr.txt"),
            "last_message": read("last_message.md"),
            "token_usage": read("token_usage.json")
                .and_then(|t| serde_json::from_str::<serde_json::Value>(&t).ok()),
        }))
    }

    // -- index --

    pub fn index_store(&self) -> Result<IndexStore, ControllerError> {
        Ok(IndexStore::open(&self.layout.index_sqlite())?)
    }

    pub fn sync_index(&self) -> Result<SyncCounts, ControllerError> {
        let layout = self.layout.clone();
        Ok(self
            .locks
            .with_lock(self.layout.root(), || sync_workspace(&layout))?)
    }

    pub fn rebuild_index(&self) -> Result<RebuildCounts, ControllerError> {
        let layout = self.layout.clone();
        Ok(self
            .locks
            .with_lock(self.layout.root(), || rebuild_workspace(&layout))?)
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.sync_worker.shutdown();
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
