// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ac_core::test_support::run_record;
use ac_core::{ProviderKind, RunStatus, UsageSummary};
use ac_index::RunRow;

fn indexed_run(layout: &WorkspaceLayout, store: &IndexStore, project: &str, run: &str, tokens: u64) {
    let project_id = ProjectId::new(project);
    let run_id = RunId::from_string(run);
    let mut record = run_record(&project_id, &run_id);
    record.status = RunStatus::Ended;
    let mut usage =
        UsageSummary::provider_reported(ProviderKind::Cmd, Some(tokens / 2), None, Some(tokens / 2), None, Some(tokens));
    usage.cost_usd = Some(tokens as f64 / 1000.0);
    record.usage = Some(usage);
    record.save(&layout.run_yaml(&project_id, &run_id)).unwrap();

    store
        .upsert_run(&RunRow {
            project_id: project.to_string(),
            run_id: run.to_string(),
            created_at: Some(record.created_at.clone()),
            status: "ended".to_string(),
            provider: "cmd".to_string(),
            agent_id: None,
            context_pack_id: None,
            events_relpath: None,
        })
        .unwrap();
}

#[test]
fn rollup_sums_tokens_and_cost_per_provider() {
    let dir = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(dir.path());
    let store = IndexStore::open_in_memory().unwrap();

    indexed_run(&layout, &store, "p", "run-1", 1000);
    indexed_run(&layout, &store, "p", "run-2", 3000);

    let snapshot = resources_snapshot(&store, &layout, Some("p")).unwrap();
    assert_eq!(snapshot.providers.len(), 1);
    let rollup = &snapshot.providers[0];
    assert_eq!(rollup.provider, "cmd");
    assert_eq!(rollup.runs, 2);
    assert_eq!(rollup.total_tokens, 4000);
    assert!((rollup.cost_usd - 4.0).abs() < 1e-9);
}

#[test]
fn runs_without_usage_still_counted() {
    let dir = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(dir.path());
    let store = IndexStore::open_in_memory().unwrap();

    let project_id = ProjectId::new("p");
    let run_id = RunId::from_string("run-1");
    run_record(&project_id, &run_id)
        .save(&layout.run_yaml(&project_id, &run_id))
        .unwrap();
    store
        .upsert_run(&RunRow {
            project_id: "p".to_string(),
            run_id: "run-1".to_string(),
            created_at: None,
            status: "running".to_string(),
            provider: "cmd".to_string(),
            agent_id: None,
            context_pack_id: None,
            events_relpath: None,
        })
        .unwrap();

    let snapshot = resources_snapshot(&store, &layout, None).unwrap();
    assert_eq!(snapshot.providers[0].runs, 1);
    assert_eq!(snapshot.providers[0].total_tokens, 0);
}

#[test]
fn context_cycles_counted_from_events() {
    let dir = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(dir.path());
    let store = IndexStore::open_in_memory().unwrap();
    store
        .insert_event(&ac_index::EventRow {
            project_id: "p".to_string(),
            run_id: "run-1".to_string(),
            seq: 1,
            kind: "context.cycle.detected".to_string(),
            ts_wallclock: None,
            ts_monotonic_ms: None,
            actor: None,
            session_ref: None,
            visibility: None,
            payload_json: "{}".to_string(),
            raw_json: "{}".to_string(),
        })
        .unwrap();

    let snapshot = resources_snapshot(&store, &layout, None).unwrap();
    assert_eq!(snapshot.context_cycles, 1);
}
