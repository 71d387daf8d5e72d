// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixture helpers shared by other crates' tests

use crate::agent::{AgentId, ProviderKind};
use crate::envelope::{EventEnvelope, EventKind};
use crate::run::{RunId, RunRecord, RunSpec, RunStatus};
use crate::workspace::ProjectId;

/// A system envelope with a fixed wallclock, convenient for journal and
/// index tests.
pub fn envelope(run_id: &RunId, kind: EventKind, payload: serde_json::Value) -> EventEnvelope {
    EventEnvelope::system(
        *run_id,
        "sess-test",
        kind,
        payload,
        "2026-01-01T00:00:00.000Z".to_string(),
    )
}

/// A minimal command-mode run record in `Running` state.
pub fn run_record(project: &ProjectId, run_id: &RunId) -> RunRecord {
    RunRecord {
        project_id: project.clone(),
        run_id: *run_id,
        provider: ProviderKind::Cmd,
        agent_id: AgentId::new("agt-test"),
        context_pack_id: None,
        status: RunStatus::Running,
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
        ended_at: None,
        spec: RunSpec::Command {
            argv: vec!["true".to_string()],
            workdir_rel: None,
            env: Default::default(),
            stdin: None,
        },
        usage: None,
        context_cycles: Vec::new(),
        events_relpath: format!("runs/{run_id}/events.jsonl"),
    }
}
