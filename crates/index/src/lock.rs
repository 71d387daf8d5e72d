// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace write locks for index mutation
//!
//! Rebuild, sync, and any helper that touches `.local/index.sqlite` must
//! run under the workspace's lock. Locks are keyed by absolute workspace
//! path so callers on unrelated workspaces never contend.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registry of write locks, one per workspace path.
///
/// Owned by the controller and passed to index callers explicitly; this
/// is deliberately not a global.
#[derive(Clone, Default)]
pub struct WorkspaceLocks {
    locks: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, workspace: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(workspace.to_path_buf()).or_default())
    }

    /// Run `f` while holding the workspace's write lock, blocking until it
    /// is available.
    pub fn with_lock<T>(&self, workspace: &Path, f: impl FnOnce() -> T) -> T {
        let entry = self.entry(workspace);
        let _guard = entry.lock();
        f()
    }

    /// Run `f` if the lock is free, else return `None` without blocking.
    pub fn try_with_lock<T>(&self, workspace: &Path, f: impl FnOnce() -> T) -> Option<T> {
        let entry = self.entry(workspace);
        let guard = entry.try_lock()?;
        let out = f();
        drop(guard);
        Some(out)
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
