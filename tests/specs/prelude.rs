// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for the integration specs

#![allow(dead_code)]

use ac_daemon::{dispatch, Controller};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct Ws {
    dir: TempDir,
    pub controller: Arc<Controller>,
}

impl Ws {
    /// Init workspace "Acme" with project "Proj" and open a controller.
    pub async fn new() -> Self {
        Self::with_setup(|_| {}).await
    }

    /// Like `new`, but runs `setup(root)` between init and open so tests
    /// can drop machine/policy config the controller loads at startup.
    pub async fn with_setup(setup: impl FnOnce(&std::path::Path)) -> Self {
        let dir = TempDir::new().unwrap();
        Controller::init_workspace(dir.path(), "Acme").unwrap();
        setup(dir.path());
        let controller = Controller::open(dir.path()).unwrap();
        controller
            .create_project(&ac_core::ProjectId::new("Proj"))
            .unwrap();
        Self { dir, controller }
    }

    pub fn root(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub async fn rpc(&self, method: &str, params: Value) -> Value {
        dispatch(&self.controller, method, params)
            .await
            .unwrap_or_else(|e| panic!("rpc {method} failed: {e}"))
    }

    pub async fn rpc_err(&self, method: &str, params: Value) -> ac_daemon::RpcError {
        match dispatch(&self.controller, method, params).await {
            Ok(value) => panic!("rpc {method} unexpectedly succeeded: {value}"),
            Err(e) => e,
        }
    }

    /// Write `org/agents/<id>/agent.yaml`.
    pub fn agent(&self, agent_id: &str, role: &str, provider: &str) {
        let path = self.controller.layout.agent_yaml(agent_id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            format!("agent_id: {agent_id}\nname: {agent_id}\nrole: {role}\nprovider: {provider}\n"),
        )
        .unwrap();
    }

    /// Write an executable shell script under `.local/`.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = self.controller.layout.local_dir().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).unwrap();
        path
    }

    /// Poll a run until it leaves `running` (or time out).
    pub async fn wait_run_terminal(&self, run_id: &str) -> Value {
        for _ in 0..300 {
            let record = self
                .rpc("session.poll", serde_json::json!({"project": "Proj", "run_id": run_id}))
                .await;
            if record["status"] != "running" {
                return record;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("run {run_id} did not terminate");
    }

    /// Poll a job until terminal (or time out).
    pub async fn wait_job_terminal(&self, job_id: &str) -> Value {
        for _ in 0..300 {
            let record = self
                .rpc("job.poll", serde_json::json!({"project": "Proj", "job_id": job_id}))
                .await;
            if record["status"] == "completed" || record["status"] == "canceled" {
                return record;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("job {job_id} did not terminate");
    }

    /// Journal entries of one run, as (seq, type) pairs.
    pub fn journal_kinds(&self, run_id: &str) -> Vec<(u64, String)> {
        let path = self.controller.layout.events_jsonl(
            &ac_core::ProjectId::new("Proj"),
            &ac_core::RunId::from_string(run_id),
        );
        ac_journal::read_entries(&path)
            .unwrap()
            .into_iter()
            .filter_map(|e| e.parsed.ok().map(|env| (e.seq, env.kind.as_str().to_string())))
            .collect()
    }
}

/// Machine config YAML pointing the given provider at a script.
pub fn machine_yaml(provider: &str, script: &std::path::Path) -> String {
    format!("providers:\n  {provider}:\n    bin: {}\n", script.display())
}

/// Write an executable script before the controller opens (for provider
/// binaries referenced from machine.yaml).
pub fn write_script(root: &std::path::Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let local = root.join(".local");
    std::fs::create_dir_all(&local).unwrap();
    let path = local.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}
