// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attempt-level prompt shaping for the job runner

use ac_core::{ContractMode, JobKind, JobSpec};

const RESULT_CONTRACT: &str = r#"Respond with a single JSON object and nothing else:
{
  "status": "succeeded" | "failed" | "blocked" | "needs_input" | "canceled",
  "summary": "one paragraph",
  "files_changed": [], "commands_run": [], "artifacts": [], "next_actions": [],
  "errors": [{"code": "...", "message": "..."}]
}"#;

const HEARTBEAT_CONTRACT: &str = r#"Respond with a single JSON object and nothing else:
{
  "status": "ok" | "actions",
  "summary": "one sentence",
  "actions": [{"kind": "...", "title": "...", "task_id": "...", "detail": "..."}]
}"#;

fn contract_for(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Execution => RESULT_CONTRACT,
        JobKind::Heartbeat => HEARTBEAT_CONTRACT,
    }
}

/// Attempt 1: the job's goal, constraints, and deliverables.
pub fn initial_prompt(spec: &JobSpec, mode: ContractMode) -> String {
    let mut prompt = String::new();
    if spec.job_kind == JobKind::Heartbeat {
        prompt.push_str(
            "You are being woken for a periodic triage check. Review your assigned work and report.\n\n",
        );
    }
    prompt.push_str("## Goal\n");
    prompt.push_str(&spec.goal);
    prompt.push('\n');
    if !spec.constraints.is_empty() {
        prompt.push_str("\n## Constraints\n");
        for c in &spec.constraints {
            prompt.push_str(&format!("- {c}\n"));
        }
    }
    if !spec.deliverables.is_empty() {
        prompt.push_str("\n## Deliverables\n");
        for d in &spec.deliverables {
            prompt.push_str(&format!("- {d}\n"));
        }
    }
    if !spec.context_refs.is_empty() {
        prompt.push_str("\n## Context\n");
        for r in &spec.context_refs {
            prompt.push_str(&format!("- {r}\n"));
        }
    }
    if mode == ContractMode::PromptOnly {
        prompt.push('\n');
        prompt.push_str(contract_for(spec.job_kind));
        prompt.push('\n');
    }
    prompt
}

/// Attempt 2: strict-JSON repair with the previous raw output and its
/// validation errors. Heartbeat jobs get their own contract restated.
pub fn repair_prompt(spec: &JobSpec, previous_raw: &str, errors: &[String]) -> String {
    let mut prompt = String::new();
    prompt.push_str("Your previous response was not a valid structured result.\n\n");
    prompt.push_str("## Validation errors\n");
    for e in errors {
        prompt.push_str(&format!("- {e}\n"));
    }
    prompt.push_str("\n## Your previous response\n");
    prompt.push_str(&truncate(previous_raw, 6000));
    prompt.push_str("\n\n## Required format\n");
    prompt.push_str(contract_for(spec.job_kind));
    prompt.push_str("\nReturn ONLY the corrected JSON object, no prose, no code fences.\n");
    prompt
}

/// Attempt 3: a cross-provider reformatter receives the raw output and
/// must emit the contract without re-doing the work.
pub fn reformat_prompt(spec: &JobSpec, previous_raw: &str, errors: &[String]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Another model produced the output below but failed to format it as required. \
         Do not redo the work: extract what it did and express it in the required format.\n\n",
    );
    prompt.push_str("## Raw output\n");
    prompt.push_str(&truncate(previous_raw, 6000));
    prompt.push_str("\n\n## Known validation errors\n");
    for e in errors {
        prompt.push_str(&format!("- {e}\n"));
    }
    prompt.push_str("\n## Required format\n");
    prompt.push_str(contract_for(spec.job_kind));
    prompt.push_str("\nReturn ONLY the JSON object.\n");
    prompt
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…[truncated]", &text[..end])
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;
