// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests

use crate::executor::{EngineDeps, ExecutionEngine};
use ac_core::{MachineConfig, PolicyConfig, SystemClock, WorkspaceLayout};
use ac_journal::EventBus;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct EngineFixture {
    _dir: TempDir,
    pub layout: WorkspaceLayout,
    pub bus: EventBus,
}

impl EngineFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());
        std::fs::create_dir_all(layout.projects_dir()).unwrap();
        std::fs::create_dir_all(layout.local_dir()).unwrap();
        Self { _dir: dir, layout, bus: EventBus::new() }
    }

    pub fn engine(&self) -> ExecutionEngine<SystemClock> {
        self.engine_with(MachineConfig::default(), PolicyConfig::default())
    }

    pub fn engine_with(
        &self,
        machine: MachineConfig,
        policy: PolicyConfig,
    ) -> ExecutionEngine<SystemClock> {
        ExecutionEngine::new(EngineDeps {
            layout: self.layout.clone(),
            machine,
            policy,
            bus: self.bus.clone(),
            clock: SystemClock,
        })
    }

    /// Write an executable shell script and return its path.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.layout.local_dir().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        make_executable(&path);
        path
    }

    pub fn agent_profile(&self, agent_id: &str, role: &str, provider: &str) {
        let path = self.layout.agent_yaml(agent_id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            format!("agent_id: {agent_id}\nname: {agent_id}\nrole: {role}\nprovider: {provider}\n"),
        )
        .unwrap();
    }

    pub fn task(&self, project: &str, task_id: &str, front_matter_extra: &str) {
        let dir = self.layout.projects_dir().join(project).join("tasks");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{task_id}.md")),
            format!("---\ntask_id: {task_id}\ntitle: {task_id}\n{front_matter_extra}---\nbody\n"),
        )
        .unwrap();
    }
}

pub fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions).unwrap();
}
