// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution specs: happy path and budget enforcement

use crate::prelude::*;
use serde_json::json;

/// Scenario: init "Acme", project "Proj", agent "Worker" (cmd), run a
/// command, rebuild the index, and find the `run.started` event.
#[tokio::test]
async fn happy_path_execution() {
    let ws = Ws::new().await;
    ws.agent("Worker", "worker", "cmd");

    let created = ws
        .rpc(
            "run.create",
            json!({
                "project": "Proj",
                "agent_id": "Worker",
                "spec": {"mode": "command", "argv": ["sh", "-c", "echo working"]},
            }),
        )
        .await;
    let run_id = created["run_id"].as_str().unwrap().to_string();

    let listed = ws.rpc("run.list", json!({"project": "Proj"})).await;
    assert!(
        listed["runs"].as_array().unwrap().iter().any(|r| r["run_id"] == run_id.as_str()),
        "run.list includes the new run"
    );

    let record = ws.wait_run_terminal(&run_id).await;
    assert_eq!(record["status"], "ended");

    ws.rpc("index.rebuild", json!({})).await;
    let events = ws
        .rpc(
            "index.list_events",
            json!({"project": "Proj", "run_id": run_id, "type": "run.started"}),
        )
        .await;
    assert!(
        !events["events"].as_array().unwrap().is_empty(),
        "at least one run.started event is indexed"
    );
}

/// Scenario: a command that exits 0 but reports token usage far past the
/// hard limit finishes as `failed`, with `budget.exceeded` before
/// `run.failed` in the journal.
#[tokio::test]
async fn budget_hard_exceed_promotes_success_to_failed() {
    let ws = Ws::with_setup(|root| {
        std::fs::write(
            root.join("company").join("policy.yaml"),
            "budget:\n  hard_limit_tokens: 10\n",
        )
        .unwrap();
    })
    .await;
    // The claude extractor parses the usage line; the agent's provider
    // routes it there.
    ws.agent("Worker", "worker", "claude");

    let usage_line = r#"{"usage":{"input_tokens":900000,"output_tokens":100000}}"#;
    let created = ws
        .rpc(
            "run.create",
            json!({
                "project": "Proj",
                "agent_id": "Worker",
                "spec": {"mode": "command", "argv": ["sh", "-c", format!("echo '{usage_line}'")]},
            }),
        )
        .await;
    let run_id = created["run_id"].as_str().unwrap().to_string();

    let record = ws.wait_run_terminal(&run_id).await;
    assert_eq!(record["status"], "failed");

    let kinds: Vec<String> = ws.journal_kinds(&run_id).into_iter().map(|(_, k)| k).collect();
    let exceeded = kinds.iter().position(|k| k == "budget.exceeded").expect("budget.exceeded");
    let failed = kinds.iter().position(|k| k == "run.failed").expect("run.failed");
    assert!(exceeded < failed, "budget.exceeded comes before run.failed");
}

/// Stopping a session raises the marker and lands `run.stopped` with
/// `stopped=true` regardless of what the subprocess would have exited.
#[tokio::test]
async fn session_stop_produces_stopped_run() {
    let ws = Ws::new().await;
    ws.agent("Worker", "worker", "cmd");

    let created = ws
        .rpc(
            "run.create",
            json!({
                "project": "Proj",
                "agent_id": "Worker",
                "spec": {"mode": "command", "argv": ["sh", "-c", "sleep 30"]},
            }),
        )
        .await;
    let run_id = created["run_id"].as_str().unwrap().to_string();

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    ws.rpc("session.stop", json!({"project": "Proj", "run_id": run_id})).await;

    let record = ws.wait_run_terminal(&run_id).await;
    assert_eq!(record["status"], "stopped");

    let kinds: Vec<String> = ws.journal_kinds(&run_id).into_iter().map(|(_, k)| k).collect();
    assert_eq!(kinds.last().map(String::as_str), Some("run.stopped"));
}

/// `run.replay` returns the journal in seq order.
#[tokio::test]
async fn run_replay_returns_ordered_events() {
    let ws = Ws::new().await;
    ws.agent("Worker", "worker", "cmd");

    let created = ws
        .rpc(
            "run.create",
            json!({
                "project": "Proj",
                "agent_id": "Worker",
                "spec": {"mode": "command", "argv": ["sh", "-c", "echo one; echo two"]},
            }),
        )
        .await;
    let run_id = created["run_id"].as_str().unwrap().to_string();
    ws.wait_run_terminal(&run_id).await;

    let replay = ws
        .rpc("run.replay", json!({"project": "Proj", "run_id": run_id}))
        .await;
    let events = replay["events"].as_array().unwrap();
    assert!(events.len() >= 3);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["seq"], (i as u64) + 1);
    }
    assert_eq!(events[0]["event"]["type"], "run.started");
}
