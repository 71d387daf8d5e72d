// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lane admission: one execution per (priority, provider, team) at a time
//!
//! The job runner's failure classifier reports backpressure here; admission
//! slows down for providers that recently pushed back.

use crate::classify::FailureClass;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Backpressure reports older than this stop counting.
const PRESSURE_WINDOW: Duration = Duration::from_secs(60);
/// Admission delay per recent backpressure report, capped.
const DELAY_PER_REPORT: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Admission class for execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LaneKey {
    pub priority: String,
    pub provider: String,
    pub team: String,
}

impl LaneKey {
    pub fn new(
        priority: impl Into<String>,
        provider: impl Into<String>,
        team: impl Into<String>,
    ) -> Self {
        Self { priority: priority.into(), provider: provider.into(), team: team.into() }
    }
}

#[derive(Default)]
struct GateState {
    lanes: HashMap<LaneKey, Arc<Semaphore>>,
    /// provider -> recent backpressure report stamps
    pressure: HashMap<String, Vec<Instant>>,
}

/// Process-wide lane gate, owned by the controller.
#[derive(Clone, Default)]
pub struct LaneGate {
    state: Arc<Mutex<GateState>>,
}

impl LaneGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lane's single slot, after any backpressure delay for
    /// the lane's provider.
    pub async fn admit(&self, key: &LaneKey) -> OwnedSemaphorePermit {
        let delay = self.current_delay(&key.provider);
        if !delay.is_zero() {
            tracing::debug!(provider = %key.provider, ?delay, "lane admission delayed by backpressure");
            tokio::time::sleep(delay).await;
        }
        let semaphore = {
            let mut state = self.state.lock();
            Arc::clone(
                state
                    .lanes
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Semaphore::new(1))),
            )
        };
        // The semaphore is never closed.
        match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("lane semaphore closed"),
        }
    }

    /// Record a classified failure from the job runner. Auth failures are
    /// ignored: waiting cannot fix them.
    pub fn report_backpressure(&self, provider: &str, class: FailureClass) {
        if !class.is_backpressure() {
            return;
        }
        let mut state = self.state.lock();
        let stamps = state.pressure.entry(provider.to_string()).or_default();
        let now = Instant::now();
        stamps.retain(|t| now.duration_since(*t) < PRESSURE_WINDOW);
        stamps.push(now);
    }

    /// Recent backpressure report count for a provider.
    pub fn pressure(&self, provider: &str) -> usize {
        let mut state = self.state.lock();
        let now = Instant::now();
        match state.pressure.get_mut(provider) {
            Some(stamps) => {
                stamps.retain(|t| now.duration_since(*t) < PRESSURE_WINDOW);
                stamps.len()
            }
            None => 0,
        }
    }

    fn current_delay(&self, provider: &str) -> Duration {
        let count = self.pressure(provider) as u32;
        (DELAY_PER_REPORT * count).min(MAX_DELAY)
    }
}

#[cfg(test)]
#[path = "lane_tests.rs"]
mod tests;
