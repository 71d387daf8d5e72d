// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat configuration and persisted triage state

use crate::contract::ReportStatus;
use crate::records::RecordError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Tuning knobs for the periodic triage loop.
///
/// Loaded from `.local/heartbeat/config.yaml`; every field has a default
/// so a missing or partial file still yields a working scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub tick_interval_minutes: u64,
    pub top_k_workers: usize,
    pub min_wake_score: u32,
    pub ok_suppression_minutes: u64,
    pub due_horizon_minutes: i64,
    pub max_auto_actions_per_tick: usize,
    pub max_auto_actions_per_hour: usize,
    /// Quiet window [start, end) in local hours; `start == end` disables it.
    pub quiet_hours_start_hour: u32,
    pub quiet_hours_end_hour: u32,
    /// During quiet hours, candidates below this score are dropped.
    pub quiet_hours_min_score: u32,
    pub stuck_job_running_minutes: u64,
    pub idempotency_ttl_days: u64,
    pub jitter_max_seconds: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_minutes: 15,
            top_k_workers: 3,
            min_wake_score: 1,
            ok_suppression_minutes: 60,
            due_horizon_minutes: 24 * 60,
            max_auto_actions_per_tick: 3,
            max_auto_actions_per_hour: 10,
            quiet_hours_start_hour: 0,
            quiet_hours_end_hour: 0,
            quiet_hours_min_score: 3,
            stuck_job_running_minutes: 90,
            idempotency_ttl_days: 7,
            jitter_max_seconds: 30,
        }
    }
}

impl HeartbeatConfig {
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
        serde_yaml::from_str(&text).map_err(|e| RecordError::yaml(path, e))
    }

    /// Whether `hour` falls inside the quiet window.
    ///
    /// The window may wrap midnight (`start > end`). `start == end` means
    /// no quiet window at all.
    pub fn in_quiet_hours(&self, hour: u32) -> bool {
        let (start, end) = (self.quiet_hours_start_hour, self.quiet_hours_end_hour);
        if start == end {
            return false;
        }
        if start < end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }
}

/// Per-worker triage memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerPulse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ok_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_context_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppressed_until: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_report_status: Option<ReportStatus>,
}

/// Per-workspace heartbeat state, persisted at
/// `.local/heartbeat/state.yaml` and reloaded on process start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatState {
    pub workers: HashMap<String, WorkerPulse>,
    /// run_id -> last seen journal seq.
    pub run_event_cursors: HashMap<String, u64>,
    pub ticks: u64,
    pub wakes: u64,
    pub suppressions: u64,
    /// Epoch-ms stamps of auto-enqueued actions within the last hour,
    /// pruned on each cap check.
    pub auto_action_stamps: Vec<u64>,
}

impl HeartbeatState {
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
        serde_yaml::from_str(&text).map_err(|e| RecordError::yaml(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<(), RecordError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RecordError::io(path, e))?;
        }
        let text = serde_yaml::to_string(self).map_err(|e| RecordError::yaml(path, e))?;
        std::fs::write(path, text).map_err(|e| RecordError::io(path, e))
    }

    pub fn pulse_mut(&mut self, agent_id: &str) -> &mut WorkerPulse {
        self.workers.entry(agent_id.to_string()).or_default()
    }

    /// Count auto actions in the trailing hour, pruning older stamps.
    pub fn auto_actions_last_hour(&mut self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(60 * 60 * 1000);
        self.auto_action_stamps.retain(|&ts| ts >= cutoff);
        self.auto_action_stamps.len()
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
