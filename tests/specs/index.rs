// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Index specs: round trips, idempotence, truncation recovery

use ac_core::test_support::{envelope, run_record};
use ac_core::{EventKind, ProjectId, RunId, WorkspaceLayout};
use ac_index::{sync_workspace, IndexStore};
use ac_journal::JournalWriter;
use tempfile::TempDir;

struct IndexWs {
    _dir: TempDir,
    layout: WorkspaceLayout,
}

impl IndexWs {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let layout = WorkspaceLayout::new(dir.path());
        std::fs::create_dir_all(layout.projects_dir()).unwrap();
        std::fs::create_dir_all(layout.local_dir()).unwrap();
        Self { _dir: dir, layout }
    }

    fn seed_run(&self, run: &str, kinds: &[EventKind]) {
        let project = ProjectId::new("Proj");
        let run_id = RunId::from_string(run);
        run_record(&project, &run_id)
            .save(&self.layout.run_yaml(&project, &run_id))
            .unwrap();
        let mut writer = JournalWriter::open(self.layout.events_jsonl(&project, &run_id)).unwrap();
        for kind in kinds {
            writer.append(&envelope(&run_id, kind.clone(), serde_json::json!({}))).unwrap();
        }
        writer.flush().unwrap();
    }
}

/// R1: append N envelopes, sync, and read them back by seq.
#[test]
fn journal_to_index_round_trip() {
    let ws = IndexWs::new();
    let kinds = vec![
        EventKind::RunStarted,
        EventKind::RunExecuting,
        EventKind::ProviderRaw,
        EventKind::UsageReported,
        EventKind::RunEnded,
    ];
    ws.seed_run("run-r1", &kinds);
    sync_workspace(&ws.layout).unwrap();

    let store = IndexStore::open(&ws.layout.index_sqlite()).unwrap();
    let events = store.list_events("Proj", "run-r1", None, None).unwrap();
    assert_eq!(events.len(), kinds.len());
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.seq, i as u64 + 1);
        assert_eq!(event.kind, kinds[i].as_str());
    }
}

/// R2: a written artifact front-matter comes back as exactly one row.
#[test]
fn artifact_front_matter_round_trip() {
    let ws = IndexWs::new();
    ws.seed_run("run-a", &[]);
    let artifact_path = ws
        .layout
        .artifact_md(&ProjectId::new("Proj"), "art-notes");
    std::fs::create_dir_all(artifact_path.parent().unwrap()).unwrap();
    std::fs::write(
        &artifact_path,
        "---\nartifact_id: art-notes\ntype: notes\ntitle: Sprint notes\nvisibility: team\nproduced_by: Worker\ncreated_at: 2026-02-01T10:00:00Z\n---\n# Notes\n",
    )
    .unwrap();

    sync_workspace(&ws.layout).unwrap();
    let store = IndexStore::open(&ws.layout.index_sqlite()).unwrap();
    let artifacts = store.list_artifacts(Some("Proj"), None).unwrap();
    assert_eq!(artifacts.len(), 1);
    let row = &artifacts[0];
    assert_eq!(row.artifact_id, "art-notes");
    assert_eq!(row.artifact_type, "notes");
    assert_eq!(row.title.as_deref(), Some("Sprint notes"));
    assert_eq!(row.visibility.as_deref(), Some("team"));
    assert_eq!(row.produced_by.as_deref(), Some("Worker"));
    assert_eq!(row.created_at.as_deref(), Some("2026-02-01T10:00:00Z"));
}

/// Scenario: write 5 events, sync, truncate to 2 lines, sync again. The
/// second sync deletes all five rows for the run and re-indexes two.
#[test]
fn truncation_recovery() {
    let ws = IndexWs::new();
    ws.seed_run(
        "run-t",
        &[
            EventKind::RunStarted,
            EventKind::RunExecuting,
            EventKind::ProviderRaw,
            EventKind::ProviderRaw,
            EventKind::RunEnded,
        ],
    );
    let first = sync_workspace(&ws.layout).unwrap();
    assert_eq!(first.events_indexed, 5);

    let events_path = ws
        .layout
        .events_jsonl(&ProjectId::new("Proj"), &RunId::from_string("run-t"));
    let text = std::fs::read_to_string(&events_path).unwrap();
    let kept: String = text.lines().take(2).map(|l| format!("{l}\n")).collect();
    std::fs::write(&events_path, kept).unwrap();

    let second = sync_workspace(&ws.layout).unwrap();
    assert_eq!(second.events_deleted, 5);
    assert_eq!(second.events_indexed, 2);
    assert_eq!(second.truncated_runs, 1);

    let store = IndexStore::open(&ws.layout.index_sqlite()).unwrap();
    let events = store.list_events("Proj", "run-t", None, None).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
}

/// P7: sync is idempotent; P8: rebuild then sync is a fixed point.
#[test]
fn sync_idempotence_and_rebuild_fixed_point() {
    let ws = IndexWs::new();
    ws.seed_run("run-x", &[EventKind::RunStarted, EventKind::RunEnded]);
    ws.seed_run("run-y", &[EventKind::RunStarted]);

    let rebuild = ac_index::rebuild_workspace(&ws.layout).unwrap();
    assert_eq!(rebuild.runs, 2);
    assert_eq!(rebuild.events, 3);

    let sync = sync_workspace(&ws.layout).unwrap();
    assert!(sync.is_noop(), "sync after rebuild changes nothing: {sync:?}");
    let again = sync_workspace(&ws.layout).unwrap();
    assert!(again.is_noop(), "repeated sync changes nothing: {again:?}");

    let store = IndexStore::open(&ws.layout.index_sqlite()).unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.runs, 2);
    assert_eq!(stats.events, 3);
}
