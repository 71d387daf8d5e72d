// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured output contracts for worker results and heartbeat reports

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Succeeded,
    Failed,
    Blocked,
    NeedsInput,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultError {
    pub code: String,
    pub message: String,
}

impl ResultError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// The structured result every execution job must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSpec {
    pub status: ResultStatus,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_changed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands_run: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ResultError>,
}

impl ResultSpec {
    /// Minimal result with just a status and summary.
    pub fn bare(status: ResultStatus, summary: impl Into<String>) -> Self {
        Self {
            status,
            summary: summary.into(),
            files_changed: Vec::new(),
            commands_run: Vec::new(),
            artifacts: Vec::new(),
            next_actions: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    Actions,
}

/// An action a heartbeat worker asks the runner to take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportAction {
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The structured report every heartbeat job must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatReport {
    pub status: ReportStatus,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ReportAction>,
}

/// Pull a JSON object candidate out of raw provider text.
///
/// Tries, in order: the whole trimmed text, the contents of the first
/// fenced code block, and the first balanced `{...}` span (brace matching
/// that respects string literals and escapes). Returns `None` when no
/// object-shaped candidate exists.
pub fn extract_json_candidate(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed.to_string());
    }

    if let Some(fenced) = extract_fenced_block(trimmed) {
        let inner = fenced.trim();
        if inner.starts_with('{') {
            return Some(inner.to_string());
        }
    }

    extract_balanced_object(trimmed)
}

fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag up to the first newline.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn extract_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Validate raw provider text against the execution result contract.
///
/// Returns the parsed result or a list of human-readable validation
/// errors that feed the job runner's repair prompts.
pub fn validate_result(raw: &str) -> Result<ResultSpec, Vec<String>> {
    let value = parse_candidate(raw)?;
    check_enum_field(
        &value,
        "status",
        &["succeeded", "failed", "blocked", "needs_input", "canceled"],
    )?;
    serde_json::from_value::<ResultSpec>(value)
        .map_err(|e| vec![format!("result_schema_invalid: {e}")])
}

/// Validate raw provider text against the heartbeat report contract.
pub fn validate_heartbeat_report(raw: &str) -> Result<HeartbeatReport, Vec<String>> {
    let value = parse_candidate(raw)?;
    check_enum_field(&value, "status", &["ok", "actions"])?;
    serde_json::from_value::<HeartbeatReport>(value)
        .map_err(|e| vec![format!("report_schema_invalid: {e}")])
}

fn parse_candidate(raw: &str) -> Result<serde_json::Value, Vec<String>> {
    let candidate = extract_json_candidate(raw)
        .ok_or_else(|| vec!["result_unparseable: no JSON object found in output".to_string()])?;
    let value: serde_json::Value = serde_json::from_str(&candidate)
        .map_err(|e| vec![format!("result_unparseable: {e}")])?;
    if !value.is_object() {
        return Err(vec!["result_unparseable: top-level value is not an object".to_string()]);
    }
    Ok(value)
}

fn check_enum_field(
    value: &serde_json::Value,
    field: &str,
    allowed: &[&str],
) -> Result<(), Vec<String>> {
    match value.get(field).and_then(|v| v.as_str()) {
        Some(s) if allowed.contains(&s) => Ok(()),
        Some(s) => Err(vec![format!(
            "result_schema_invalid: {field} {s:?} not one of {allowed:?}"
        )]),
        None => Err(vec![format!("result_schema_invalid: missing string field {field:?}")]),
    }
}

#[cfg(test)]
#[path = "contract_tests.rs"]
mod tests;
