// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process publish/subscribe of "journal changed" notifications
//!
//! The bus is memoryless: no buffering across subscribers, and a message
//! published while nobody listens is simply dropped. The index sync worker
//! compensates with its minimum-interval retry timer.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Callback = Arc<dyn Fn(&Path) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback)>>,
}

/// Process-wide fan-out of `{events_file_path}` messages.
///
/// Delivery is synchronous on the publisher's thread; ordering within a
/// single publisher is preserved. Callbacks must be cheap; subscribers
/// that need to do work should forward into a channel.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&Path) + Send + Sync + 'static) -> SubscriberId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        SubscriberId(id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.subscribers.lock().retain(|(sid, _)| *sid != id.0);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Publish a journal path to all current subscribers.
    ///
    /// The subscriber list is snapshotted under the lock and callbacks run
    /// outside it, so a callback may subscribe/unsubscribe freely.
    pub fn publish(&self, path: &Path) {
        let snapshot: Vec<Callback> = {
            let subs = self.inner.subscribers.lock();
            subs.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for cb in snapshot {
            cb(path);
        }
    }

    /// Publish an owned path (convenience for async contexts).
    pub fn publish_owned(&self, path: PathBuf) {
        self.publish(&path);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
