// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace fixtures for index tests

use ac_core::test_support::{envelope, run_record};
use ac_core::{EventKind, ProjectId, RunId, WorkspaceLayout};
use ac_journal::JournalWriter;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct FixtureWorkspace {
    // Held for the lifetime of the fixture; deletes on drop.
    _dir: TempDir,
    pub layout: WorkspaceLayout,
}

impl FixtureWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());
        std::fs::create_dir_all(layout.projects_dir()).unwrap();
        std::fs::create_dir_all(layout.local_dir()).unwrap();
        Self { _dir: dir, layout }
    }

    /// Write a run.yaml plus a journal of `kinds` events. Returns the
    /// journal path.
    pub fn add_run(&self, project: &str, run: &str, kinds: &[EventKind]) -> PathBuf {
        let project_id = ProjectId::new(project);
        let run_id = RunId::from_string(run);
        let record = run_record(&project_id, &run_id);
        record.save(&self.layout.run_yaml(&project_id, &run_id)).unwrap();

        let events_path = self.layout.events_jsonl(&project_id, &run_id);
        let mut writer = JournalWriter::open(&events_path).unwrap();
        for kind in kinds {
            writer.append(&envelope(&run_id, kind.clone(), serde_json::json!({}))).unwrap();
        }
        writer.flush().unwrap();
        events_path
    }

    pub fn add_artifact(&self, project: &str, artifact: &str) {
        let project_id = ProjectId::new(project);
        let path = self.layout.artifact_md(&project_id, artifact);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            format!(
                "---\nartifact_id: {artifact}\ntype: report\ntitle: Title of {artifact}\nvisibility: team\ncreated_at: 2026-01-01T00:00:00Z\n---\nbody\n"
            ),
        )
        .unwrap();
    }

    pub fn add_review(&self, review: &str, subject_artifact: &str, project: &str) {
        let path = self.layout.reviews_dir().join(format!("{review}.yaml"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            format!(
                "review_id: {review}\ncreated_at: 2026-01-02T00:00:00Z\ndecision: approved\nactor_id: agt-m\nactor_role: manager\nsubject_kind: artifact\nsubject_artifact_id: {subject_artifact}\nproject_id: {project}\n"
            ),
        )
        .unwrap();
    }

    pub fn add_help_request(&self, id: &str, target: &str) {
        let path = self.layout.help_requests_dir().join(format!("{id}.md"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            format!(
                "---\nhelp_request_id: {id}\ncreated_at: 2026-01-02T00:00:00Z\ntitle: Help\nvisibility: managers\nrequester: agt-w\ntarget_manager: {target}\n---\nbody\n"
            ),
        )
        .unwrap();
    }

    /// Truncate a run's journal to its first `keep` lines.
    pub fn truncate_journal(&self, project: &str, run: &str, keep: usize) {
        let path = self
            .layout
            .events_jsonl(&ProjectId::new(project), &RunId::from_string(run));
        let text = std::fs::read_to_string(&path).unwrap();
        let kept: String = text.lines().take(keep).map(|l| format!("{l}\n")).collect();
        std::fs::write(&path, kept).unwrap();
    }
}
