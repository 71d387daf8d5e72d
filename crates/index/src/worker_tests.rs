// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::IndexStore;
use crate::test_fixtures::FixtureWorkspace;
use ac_core::EventKind;
use ac_journal::EventBus;

#[tokio::test]
async fn notify_then_flush_syncs_the_workspace() {
    let ws = FixtureWorkspace::new();
    ws.add_run("proj", "run-1", &[EventKind::RunStarted, EventKind::RunEnded]);

    let worker = IndexSyncWorker::spawn_with(WorkspaceLocks::new(), 10, 50);
    worker.notify(ws.layout.root());
    worker.flush().await;

    let status = worker.status();
    assert_eq!(status.syncs, 1);
    assert_eq!(status.pending, 0);
    assert!(status.last_error.is_none());

    let store = IndexStore::open(&ws.layout.index_sqlite()).unwrap();
    assert_eq!(store.list_events("proj", "run-1", None, None).unwrap().len(), 2);
}

#[tokio::test]
async fn debounce_batches_a_burst_of_notifications() {
    let ws = FixtureWorkspace::new();
    ws.add_run("proj", "run-1", &[EventKind::RunStarted]);

    let worker = IndexSyncWorker::spawn_with(WorkspaceLocks::new(), 20, 10);
    for _ in 0..10 {
        worker.notify(ws.layout.root());
    }
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let status = worker.status();
    assert_eq!(status.syncs, 1, "burst collapses into one sync: {status:?}");
    assert_eq!(status.pending, 0);
}

#[tokio::test]
async fn failed_sync_keeps_workspace_dirty_and_records_error() {
    let dir = tempfile::tempdir().unwrap();
    // A workspace whose .local is a *file* forces the sqlite open to fail.
    let ws_root = dir.path().join("ws");
    std::fs::create_dir_all(ws_root.join("work/projects")).unwrap();
    std::fs::write(ws_root.join(".local"), "not a dir").unwrap();

    let worker = IndexSyncWorker::spawn_with(WorkspaceLocks::new(), 10, 10);
    worker.notify(&ws_root);
    worker.flush().await;

    let status = worker.status();
    assert_eq!(status.sync_errors, 1);
    assert_eq!(status.pending, 1, "failed workspace stays dirty");
    assert!(status.last_error.is_some());
}

#[tokio::test]
async fn bus_notifications_reach_the_worker() {
    let ws = FixtureWorkspace::new();
    let events_path = ws.add_run("proj", "run-1", &[EventKind::RunStarted]);

    let bus = EventBus::new();
    let worker = IndexSyncWorker::spawn_with(WorkspaceLocks::new(), 10, 10);
    worker.attach_to_bus(&bus);

    bus.publish(&events_path);
    worker.flush().await;

    assert_eq!(worker.status().syncs, 1);
}

#[tokio::test]
async fn min_interval_defers_hot_workspace() {
    let ws = FixtureWorkspace::new();
    ws.add_run("proj", "run-1", &[EventKind::RunStarted]);

    // Long min interval: the second notify within the window must not
    // trigger a second sync from the debounce path.
    let worker = IndexSyncWorker::spawn_with(WorkspaceLocks::new(), 10, 10_000);
    worker.notify(ws.layout.root());
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(worker.status().syncs, 1);

    worker.notify(ws.layout.root());
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let status = worker.status();
    assert_eq!(status.syncs, 1);
    assert_eq!(status.pending, 1, "deferred workspace stays dirty");
}
