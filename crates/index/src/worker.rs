// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debounced, serialized index sync worker
//!
//! A single long-lived task owns a worklist of dirty workspaces. Journal
//! writers notify it (directly or via the runtime event bus); it batches
//! notifications with a debounce window and enforces a minimum interval
//! per workspace so hot journals cannot monopolize the writer.

use crate::lock::WorkspaceLocks;
use crate::sync::sync_workspace;
use ac_core::WorkspaceLayout;
use ac_journal::EventBus;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

pub const DEFAULT_DEBOUNCE_MS: u64 = 250;
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1000;

/// Counters exposed through `/api/sync_worker_status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncWorkerStatus {
    pub pending: usize,
    pub batches: u64,
    pub syncs: u64,
    pub sync_errors: u64,
    pub last_error: Option<String>,
}

enum Command {
    Notify(PathBuf),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Handle to the background sync task.
#[derive(Clone)]
pub struct IndexSyncWorker {
    tx: mpsc::UnboundedSender<Command>,
    status: Arc<Mutex<SyncWorkerStatus>>,
}

impl IndexSyncWorker {
    /// Spawn the worker task with default timing.
    pub fn spawn(locks: WorkspaceLocks) -> Self {
        Self::spawn_with(locks, DEFAULT_DEBOUNCE_MS, DEFAULT_MIN_INTERVAL_MS)
    }

    pub fn spawn_with(locks: WorkspaceLocks, debounce_ms: u64, min_interval_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(SyncWorkerStatus::default()));
        let loop_status = Arc::clone(&status);
        tokio::spawn(run_loop(
            rx,
            locks,
            loop_status,
            Duration::from_millis(debounce_ms),
            Duration::from_millis(min_interval_ms),
        ));
        Self { tx, status }
    }

    /// Mark a workspace dirty; a batch is scheduled if none is pending.
    pub fn notify(&self, workspace: &Path) {
        let _ = self.tx.send(Command::Notify(workspace.to_path_buf()));
    }

    /// Force an immediate batch over everything dirty, bypassing the
    /// debounce and minimum interval; resolves when the batch completes.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }

    pub fn status(&self) -> SyncWorkerStatus {
        self.status.lock().clone()
    }

    /// Subscribe to a runtime event bus: journal paths are mapped back to
    /// their workspace root and marked dirty.
    pub fn attach_to_bus(&self, bus: &EventBus) {
        let worker = self.clone();
        bus.subscribe(move |events_path| {
            if let Some(root) = WorkspaceLayout::workspace_root_for_events_path(events_path) {
                worker.notify(&root);
            }
        });
    }
}

async fn run_loop(
    mut rx: mpsc::UnboundedReceiver<Command>,
    locks: WorkspaceLocks,
    status: Arc<Mutex<SyncWorkerStatus>>,
    debounce: Duration,
    min_interval: Duration,
) {
    let mut dirty: HashSet<PathBuf> = HashSet::new();
    let mut last_synced: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        let command = if dirty.is_empty() {
            // Nothing pending: block until the next command.
            match rx.recv().await {
                Some(cmd) => Some(cmd),
                None => break,
            }
        } else {
            // Debounce window: collect more notifications, then batch.
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(cmd)) => Some(cmd),
                Ok(None) => break,
                Err(_) => None,
            }
        };

        match command {
            Some(Command::Notify(ws)) => {
                dirty.insert(ws);
                status.lock().pending = dirty.len();
            }
            Some(Command::Flush(ack)) => {
                run_batch(&mut dirty, &mut last_synced, &locks, &status, None).await;
                let _ = ack.send(());
            }
            Some(Command::Shutdown) => break,
            None => {
                // Debounce elapsed with work pending.
                run_batch(&mut dirty, &mut last_synced, &locks, &status, Some(min_interval)).await;
            }
        }
    }
}

async fn run_batch(
    dirty: &mut HashSet<PathBuf>,
    last_synced: &mut HashMap<PathBuf, Instant>,
    locks: &WorkspaceLocks,
    status: &Arc<Mutex<SyncWorkerStatus>>,
    min_interval: Option<Duration>,
) {
    status.lock().batches += 1;
    let candidates: Vec<PathBuf> = dirty.iter().cloned().collect();
    for ws in candidates {
        if let Some(interval) = min_interval {
            if last_synced.get(&ws).is_some_and(|t| t.elapsed() < interval) {
                continue; // stays dirty; retried next window
            }
        }
        let locks = locks.clone();
        let ws_for_task = ws.clone();
        let result = tokio::task::spawn_blocking(move || {
            let layout = WorkspaceLayout::new(&ws_for_task);
            locks.with_lock(&ws_for_task, || sync_workspace(&layout))
        })
        .await;

        let mut st = status.lock();
        match result {
            Ok(Ok(_counts)) => {
                st.syncs += 1;
                st.last_error = None;
                drop(st);
                dirty.remove(&ws);
                last_synced.insert(ws, Instant::now());
            }
            Ok(Err(e)) => {
                st.sync_errors += 1;
                st.last_error = Some(e.to_string());
                tracing::warn!(workspace = %ws.display(), error = %e, "index sync failed");
            }
            Err(join_err) => {
                st.sync_errors += 1;
                st.last_error = Some(join_err.to_string());
            }
        }
    }
    status.lock().pending = dirty.len();
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
