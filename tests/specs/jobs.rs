// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job runner specs: retry-to-fallback and cancellation

use crate::prelude::*;
use serde_json::json;

fn job_spec(goal: &str) -> serde_json::Value {
    json!({
        "goal": goal,
        "worker_kind": "cmd",
        "permission_level": "standard",
        "job_kind": "execution",
    })
}

/// Scenario: a worker that returns `not-json` on every attempt. After 3
/// attempts the job completes with a `needs_input` fallback result whose
/// errors carry the validation codes.
#[tokio::test]
async fn retry_to_fallback_after_three_bad_attempts() {
    let ws = Ws::with_setup(|root| {
        let script = write_script(root, "worker.sh", "cat >/dev/null\necho 'not-json'\n");
        std::fs::write(root.join(".local").join("machine.yaml"), machine_yaml("cmd", &script))
            .unwrap();
    })
    .await;
    ws.agent("Worker", "worker", "cmd");

    let submitted = ws
        .rpc("job.submit", json!({"project": "Proj", "spec": job_spec("do a thing")}))
        .await;
    let job_id = submitted["job_id"].as_str().unwrap().to_string();

    let record = ws.wait_job_terminal(&job_id).await;
    assert_eq!(record["status"], "completed");
    assert_eq!(record["attempts"].as_array().unwrap().len(), 3);

    let collected = ws
        .rpc("job.collect", json!({"project": "Proj", "job_id": job_id}))
        .await;
    let result = &collected["result"];
    assert_eq!(result["status"], "needs_input");
    assert!(result["errors"].as_array().unwrap().iter().any(|e| {
        e["code"] == "result_unparseable" || e["code"] == "result_schema_invalid"
    }));
}

/// Scenario: cancel a long-running job. The job finalizes as canceled,
/// the result says canceled, and the aborted run's journal ends with a
/// `run.stopped` event carrying `stopped=true`.
#[tokio::test]
async fn cancellation_lands_canceled_result_and_stopped_run() {
    let ws = Ws::with_setup(|root| {
        let script = write_script(root, "worker.sh", "sleep 30\n");
        std::fs::write(root.join(".local").join("machine.yaml"), machine_yaml("cmd", &script))
            .unwrap();
    })
    .await;
    ws.agent("Worker", "worker", "cmd");

    let submitted = ws
        .rpc("job.submit", json!({"project": "Proj", "spec": job_spec("long haul")}))
        .await;
    let job_id = submitted["job_id"].as_str().unwrap().to_string();

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    let cancel = ws
        .rpc("job.cancel", json!({"project": "Proj", "job_id": job_id}))
        .await;
    assert_eq!(cancel["cancellation_requested"], true);

    let record = ws.wait_job_terminal(&job_id).await;
    assert_eq!(record["status"], "canceled");

    let collected = ws
        .rpc("job.collect", json!({"project": "Proj", "job_id": job_id}))
        .await;
    assert_eq!(collected["result"]["status"], "canceled");

    let run_id = record["attempts"].as_array().unwrap().last().unwrap()["run_id"]
        .as_str()
        .unwrap()
        .to_string();
    let path = ws.controller.layout.events_jsonl(
        &ac_core::ProjectId::new("Proj"),
        &ac_core::RunId::from_string(&run_id),
    );
    let entries = ac_journal::read_entries(&path).unwrap();
    let last = entries.last().unwrap().parsed.as_ref().unwrap().clone();
    assert_eq!(last.kind.as_str(), "run.stopped");
    assert_eq!(last.payload["stopped"], json!(true));
}

/// A worker that produces a valid result on the first try completes with
/// one attempt and a digest alongside the result.
#[tokio::test]
async fn valid_result_completes_first_try() {
    let ws = Ws::with_setup(|root| {
        let script = write_script(
            root,
            "worker.sh",
            "cat >/dev/null\necho '{\"status\":\"succeeded\",\"summary\":\"done\",\"commands_run\":[\"make test\"]}'\n",
        );
        std::fs::write(root.join(".local").join("machine.yaml"), machine_yaml("cmd", &script))
            .unwrap();
    })
    .await;
    ws.agent("Worker", "worker", "cmd");

    let submitted = ws
        .rpc("job.submit", json!({"project": "Proj", "spec": job_spec("quick win")}))
        .await;
    let job_id = submitted["job_id"].as_str().unwrap().to_string();

    let record = ws.wait_job_terminal(&job_id).await;
    assert_eq!(record["status"], "completed");
    assert_eq!(record["attempts"].as_array().unwrap().len(), 1);
    assert_eq!(
        record["final_result_relpath"],
        format!("jobs/{job_id}/result.json")
    );

    let digest_path = ws.controller.layout.job_manager_digest_json(
        &ac_core::ProjectId::new("Proj"),
        &ac_core::JobId::from_string(&job_id),
    );
    let digest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(digest_path).unwrap()).unwrap();
    assert_eq!(digest["status"], "succeeded");
    assert_eq!(digest["commands_run"], 1);
}
