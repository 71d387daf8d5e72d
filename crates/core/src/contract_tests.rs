// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn extracts_bare_object() {
    let raw = r#"{"status": "succeeded", "summary": "done"}"#;
    assert_eq!(extract_json_candidate(raw).as_deref(), Some(raw));
}

#[test]
fn extracts_from_code_fence() {
    let raw = "Here is the result:\n```json\n{\"status\": \"succeeded\"}\n```\nthanks";
    assert_eq!(extract_json_candidate(raw).as_deref(), Some("{\"status\": \"succeeded\"}"));
}

#[test]
fn extracts_balanced_object_from_prose() {
    let raw = "I did the thing. {\"status\": \"failed\", \"detail\": {\"nested\": true}} trailing";
    let candidate = extract_json_candidate(raw).unwrap();
    assert_eq!(candidate, "{\"status\": \"failed\", \"detail\": {\"nested\": true}}");
}

#[test]
fn brace_matching_ignores_braces_in_strings() {
    let raw = r#"note {"summary": "has a } inside", "status": "succeeded"} end"#;
    let candidate = extract_json_candidate(raw).unwrap();
    let value: serde_json::Value = serde_json::from_str(&candidate).unwrap();
    assert_eq!(value["summary"], "has a } inside");
}

#[test]
fn no_object_returns_none() {
    assert!(extract_json_candidate("not-json").is_none());
    assert!(extract_json_candidate("[1, 2, 3]").is_none());
    assert!(extract_json_candidate("{never closed").is_none());
}

#[test]
fn validates_well_formed_result() {
    let raw = r#"{"status": "succeeded", "summary": "did it", "files_changed": ["a.rs"]}"#;
    let result = validate_result(raw).unwrap();
    assert_eq!(result.status, ResultStatus::Succeeded);
    assert_eq!(result.files_changed, vec!["a.rs".to_string()]);
}

#[test]
fn rejects_unknown_status() {
    let raw = r#"{"status": "maybe", "summary": "?"}"#;
    let errors = validate_result(raw).unwrap_err();
    assert!(errors[0].starts_with("result_schema_invalid"));
}

#[test]
fn rejects_non_json() {
    let errors = validate_result("not-json").unwrap_err();
    assert!(errors[0].starts_with("result_unparseable"));
}

#[test]
fn rejects_missing_status() {
    let errors = validate_result(r#"{"summary": "no status"}"#).unwrap_err();
    assert!(errors[0].contains("missing string field"));
}

#[test]
fn result_errors_deserialize() {
    let raw = r#"{"status": "needs_input", "errors": [{"code": "ask", "message": "which file?"}]}"#;
    let result = validate_result(raw).unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, "ask");
}

#[test]
fn validates_heartbeat_ok_report() {
    let raw = r#"{"status": "ok", "summary": "all quiet"}"#;
    let report = validate_heartbeat_report(raw).unwrap();
    assert_eq!(report.status, ReportStatus::Ok);
    assert!(report.actions.is_empty());
}

#[test]
fn validates_heartbeat_actions_report() {
    let raw = r#"{"status": "actions", "summary": "two things", "actions": [
        {"kind": "job", "title": "fix the build"},
        {"kind": "escalate", "title": "flaky test", "task_id": "task-9"}
    ]}"#;
    let report = validate_heartbeat_report(raw).unwrap();
    assert_eq!(report.status, ReportStatus::Actions);
    assert_eq!(report.actions.len(), 2);
    assert_eq!(report.actions[1].task_id.as_deref(), Some("task-9"));
}

#[test]
fn heartbeat_report_rejects_result_status() {
    let errors = validate_heartbeat_report(r#"{"status": "succeeded"}"#).unwrap_err();
    assert!(errors[0].starts_with("result_schema_invalid"));
}
