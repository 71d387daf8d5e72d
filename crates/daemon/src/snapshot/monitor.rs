// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run monitor snapshot: live status, last events, governance counters

use ac_index::{IndexError, IndexStore};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LastEvent {
    pub seq: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub ts_wallclock: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMonitorEntry {
    pub project_id: String,
    pub run_id: String,
    pub status: String,
    pub provider: String,
    pub agent_id: Option<String>,
    pub created_at: Option<String>,
    pub last_event: Option<LastEvent>,
    pub parse_errors: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GovernanceCounters {
    pub policy_denials: u64,
    pub budget_alerts: u64,
    pub budget_exceeded: u64,
    pub budget_decisions: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub runs: Vec<RunMonitorEntry>,
    pub governance: GovernanceCounters,
}

/// Compose the monitor view, optionally scoped to one project.
pub fn monitor_snapshot(
    store: &IndexStore,
    project: Option<&str>,
) -> Result<MonitorSnapshot, IndexError> {
    let mut runs = Vec::new();
    for row in store.list_runs(project)? {
        let last_event = store.last_event(&row.project_id, &row.run_id)?.map(|e| LastEvent {
            seq: e.seq,
            kind: e.kind,
            ts_wallclock: e.ts_wallclock,
        });
        let parse_errors = store.count_parse_errors(&row.project_id, &row.run_id)?;
        runs.push(RunMonitorEntry {
            project_id: row.project_id,
            run_id: row.run_id,
            status: row.status,
            provider: row.provider,
            agent_id: row.agent_id,
            created_at: row.created_at,
            last_event,
            parse_errors,
        });
    }

    let governance = GovernanceCounters {
        policy_denials: store.count_events_of_kind(project, "policy.denied")?,
        budget_alerts: store.count_events_of_kind(project, "budget.alert")?,
        budget_exceeded: store.count_events_of_kind(project, "budget.exceeded")?,
        budget_decisions: store.count_events_of_kind(project, "budget.decision")?,
    };

    Ok(MonitorSnapshot { runs, governance })
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
