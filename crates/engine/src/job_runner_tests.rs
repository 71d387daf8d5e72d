// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lane::LaneGate;
use crate::test_support::EngineFixture;
use ac_core::{MachineConfig, PolicyConfig, ProviderBinary, SystemClock};
use std::time::Duration;

fn machine_with_cmd(fx: &EngineFixture, script_body: &str) -> MachineConfig {
    let script = fx.script("worker.sh", script_body);
    let mut machine = MachineConfig::default();
    machine.providers.insert(
        "cmd".to_string(),
        ProviderBinary {
            bin: script.display().to_string(),
            args: vec![],
            subscription_verified: None,
        },
    );
    machine
}

fn runner_with(fx: &EngineFixture, machine: MachineConfig) -> JobRunner<SystemClock> {
    let engine = fx.engine_with(machine, PolicyConfig::default());
    JobRunner::new(engine, LaneGate::new())
}

fn execution_spec() -> JobSpec {
    JobSpec {
        goal: "produce a status report".to_string(),
        constraints: vec![],
        deliverables: vec![],
        worker_kind: "cmd".to_string(),
        worker_agent_id: None,
        permission_level: "standard".to_string(),
        context_refs: vec![],
        job_kind: JobKind::Execution,
    }
}

async fn wait_completion(
    completions: &mut tokio::sync::broadcast::Receiver<JobCompletion>,
    job_id: JobId,
) -> JobCompletion {
    loop {
        let completion = tokio::time::timeout(Duration::from_secs(30), completions.recv())
            .await
            .expect("job did not complete in time")
            .expect("completion channel closed");
        if completion.job_id == job_id {
            return completion;
        }
    }
}

#[tokio::test]
async fn valid_output_completes_on_first_attempt() {
    let fx = EngineFixture::new();
    let machine = machine_with_cmd(
        &fx,
        "cat >/dev/null\necho '{\"status\":\"succeeded\",\"summary\":\"all good\",\"files_changed\":[\"a.rs\"]}'\n",
    );
    let runner = runner_with(&fx, machine);
    let mut completions = runner.subscribe_completions();

    let project = ProjectId::new("proj");
    let job_id = runner.submit(project.clone(), execution_spec()).unwrap().job_id();
    let completion = wait_completion(&mut completions, job_id).await;

    assert_eq!(completion.status, JobStatus::Completed);
    assert_eq!(completion.result_status, ResultStatus::Succeeded);

    let (record, result) = runner.collect(&project, &job_id).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.attempts.len(), 1);
    assert_eq!(record.attempts[0].status, AttemptStatus::Succeeded);
    assert_eq!(record.final_result_relpath.as_deref(), Some(&*format!("jobs/{job_id}/result.json")));

    let result = result.unwrap();
    assert_eq!(result["status"], "succeeded");
    assert_eq!(result["summary"], "all good");

    // Digest sits alongside the result.
    let digest_path = fx.layout.job_manager_digest_json(&project, &job_id);
    let digest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(digest_path).unwrap()).unwrap();
    assert_eq!(digest["files_changed"], 1);
}

#[tokio::test]
async fn unparseable_output_falls_back_to_needs_input_after_three_attempts() {
    let fx = EngineFixture::new();
    let machine = machine_with_cmd(&fx, "cat >/dev/null\necho 'not-json'\n");
    let runner = runner_with(&fx, machine);
    let mut completions = runner.subscribe_completions();

    let project = ProjectId::new("proj");
    let job_id = runner.submit(project.clone(), execution_spec()).unwrap().job_id();
    let completion = wait_completion(&mut completions, job_id).await;

    assert_eq!(completion.status, JobStatus::Completed);
    assert_eq!(completion.result_status, ResultStatus::NeedsInput);

    let (record, result) = runner.collect(&project, &job_id).unwrap();
    assert_eq!(record.attempts.len(), 3);
    let numbers: Vec<u32> = record.attempts.iter().map(|a| a.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);

    let result = result.unwrap();
    assert_eq!(result["status"], "needs_input");
    let errors = result["errors"].as_array().unwrap();
    assert!(errors
        .iter()
        .any(|e| e["code"] == "result_unparseable" || e["code"] == "result_schema_invalid"));
}

#[tokio::test]
async fn cancel_finalizes_as_canceled_with_stopped_run() {
    let fx = EngineFixture::new();
    let machine = machine_with_cmd(&fx, "sleep 30\n");
    let runner = runner_with(&fx, machine);
    let mut completions = runner.subscribe_completions();

    let project = ProjectId::new("proj");
    let job_id = runner.submit(project.clone(), execution_spec()).unwrap().job_id();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(runner.cancel(&project, &job_id).unwrap());

    let completion = wait_completion(&mut completions, job_id).await;
    assert_eq!(completion.status, JobStatus::Canceled);
    assert_eq!(completion.result_status, ResultStatus::Canceled);

    let (record, result) = runner.collect(&project, &job_id).unwrap();
    assert!(record.cancellation_requested);
    assert_eq!(result.unwrap()["status"], "canceled");

    // The aborted attempt's run journal records the stop.
    let run_id = record.attempts.last().unwrap().run_id;
    let entries = ac_journal::read_entries(&fx.layout.events_jsonl(&project, &run_id)).unwrap();
    let last = entries.last().unwrap().parsed.as_ref().unwrap().clone();
    assert_eq!(last.kind.as_str(), "run.stopped");
    assert_eq!(last.payload["stopped"], serde_json::json!(true));
}

#[tokio::test]
async fn unverified_subscription_blocks_immediately() {
    let fx = EngineFixture::new();
    let mut machine = machine_with_cmd(&fx, "echo unused\n");
    if let Some(binary) = machine.providers.get_mut("cmd") {
        binary.subscription_verified = Some(false);
    }
    let runner = runner_with(&fx, machine);
    let mut completions = runner.subscribe_completions();

    let project = ProjectId::new("proj");
    let job_id = runner.submit(project.clone(), execution_spec()).unwrap().job_id();
    let completion = wait_completion(&mut completions, job_id).await;

    assert_eq!(completion.result_status, ResultStatus::Blocked);
    let (record, result) = runner.collect(&project, &job_id).unwrap();
    assert!(record.attempts.is_empty(), "preflight failure burns no attempts");
    assert_eq!(result.unwrap()["errors"][0]["code"], "subscription_unverified");
}

#[tokio::test]
async fn resubmission_of_active_key_returns_existing_status() {
    let fx = EngineFixture::new();
    let machine = machine_with_cmd(&fx, "sleep 5\n");
    let runner = runner_with(&fx, machine);
    let mut completions = runner.subscribe_completions();

    let project = ProjectId::new("proj");
    let job_id = JobId::generate();
    let first = runner
        .submit_with_id(project.clone(), job_id, execution_spec())
        .unwrap();
    assert!(matches!(first, SubmitOutcome::Started(_)));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let second = runner
        .submit_with_id(project.clone(), job_id, execution_spec())
        .unwrap();
    assert!(matches!(second, SubmitOutcome::AlreadyActive(_, _)));

    runner.cancel(&project, &job_id).unwrap();
    wait_completion(&mut completions, job_id).await;
}

#[tokio::test]
async fn heartbeat_job_validates_report_contract() {
    let fx = EngineFixture::new();
    let machine = machine_with_cmd(
        &fx,
        "cat >/dev/null\necho '{\"status\":\"ok\",\"summary\":\"quiet shift\"}'\n",
    );
    let runner = runner_with(&fx, machine);
    let mut completions = runner.subscribe_completions();

    let project = ProjectId::new("proj");
    let mut spec = execution_spec();
    spec.job_kind = JobKind::Heartbeat;
    let job_id = runner.submit(project.clone(), spec).unwrap().job_id();
    let completion = wait_completion(&mut completions, job_id).await;

    assert_eq!(completion.status, JobStatus::Completed);
    let report = completion.report.unwrap();
    assert_eq!(report.status, ac_core::ReportStatus::Ok);
    assert_eq!(report.summary, "quiet shift");
    assert!(fx.layout.job_heartbeat_report_json(&project, &job_id).exists());
}

#[tokio::test]
async fn transient_failures_feed_backpressure() {
    let fx = EngineFixture::new();
    let machine = machine_with_cmd(&fx, "echo 'rate limit reached' >&2\nexit 1\n");
    let runner = runner_with(&fx, machine);
    let mut completions = runner.subscribe_completions();

    let project = ProjectId::new("proj");
    let job_id = runner.submit(project.clone(), execution_spec()).unwrap().job_id();
    wait_completion(&mut completions, job_id).await;

    assert!(runner.gate().pressure("cmd") >= 1);
}
