// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn spec(kind: JobKind) -> JobSpec {
    JobSpec {
        goal: "triage the flaky test".to_string(),
        constraints: vec!["no force pushes".to_string()],
        deliverables: vec!["fix.patch".to_string()],
        worker_kind: "claude".to_string(),
        worker_agent_id: None,
        permission_level: "standard".to_string(),
        context_refs: vec!["tasks/flaky.md".to_string()],
        job_kind: kind,
    }
}

#[test]
fn initial_prompt_includes_goal_constraints_deliverables() {
    let prompt = initial_prompt(&spec(JobKind::Execution), ContractMode::PromptOnly);
    assert!(prompt.contains("triage the flaky test"));
    assert!(prompt.contains("- no force pushes"));
    assert!(prompt.contains("- fix.patch"));
    assert!(prompt.contains("- tasks/flaky.md"));
    assert!(prompt.contains("\"succeeded\""), "prompt-only mode embeds the contract");
}

#[test]
fn provider_schema_mode_omits_contract_text() {
    let prompt = initial_prompt(&spec(JobKind::Execution), ContractMode::ProviderSchema);
    assert!(!prompt.contains("\"succeeded\""));
}

#[test]
fn heartbeat_initial_prompt_uses_report_contract() {
    let prompt = initial_prompt(&spec(JobKind::Heartbeat), ContractMode::PromptOnly);
    assert!(prompt.contains("periodic triage check"));
    assert!(prompt.contains("\"ok\" | \"actions\""));
    assert!(!prompt.contains("needs_input"));
}

#[test]
fn repair_prompt_carries_previous_output_and_errors() {
    let prompt = repair_prompt(
        &spec(JobKind::Execution),
        "definitely not json",
        &["result_unparseable: no JSON object found in output".to_string()],
    );
    assert!(prompt.contains("definitely not json"));
    assert!(prompt.contains("result_unparseable"));
    assert!(prompt.contains("Return ONLY the corrected JSON object"));
}

#[test]
fn heartbeat_repair_restates_report_contract() {
    let prompt = repair_prompt(&spec(JobKind::Heartbeat), "raw", &["bad".to_string()]);
    assert!(prompt.contains("\"ok\" | \"actions\""));
}

#[test]
fn reformat_prompt_forbids_redoing_work() {
    let prompt = reformat_prompt(&spec(JobKind::Execution), "half-done output", &[]);
    assert!(prompt.contains("Do not redo the work"));
    assert!(prompt.contains("half-done output"));
}

#[test]
fn long_previous_output_is_truncated() {
    let long = "x".repeat(10_000);
    let prompt = repair_prompt(&spec(JobKind::Execution), &long, &[]);
    assert!(prompt.contains("[truncated]"));
    assert!(prompt.len() < 8_000);
}
