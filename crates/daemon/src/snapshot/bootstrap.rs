// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desktop bootstrap: one round trip for the whole UI

use crate::snapshot::{InboxSnapshot, MonitorSnapshot, PmSnapshot, ResourcesSnapshot};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapSnapshot {
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub view: String,
    pub generated_at: String,
    pub monitor: MonitorSnapshot,
    pub inbox: InboxSnapshot,
    pub pm: PmSnapshot,
    pub resources: ResourcesSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Value>,
}

/// Merge thin snapshots into one UI payload.
///
/// Total by construction: every argument combination yields an object;
/// `full` (when present) contributes its extra sections without clobbering
/// the always-fresh monitor and inbox parts.
pub fn merge(monitor: &MonitorSnapshot, inbox: &InboxSnapshot, full: Option<&Value>) -> Value {
    let mut merged = match full {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        // A non-object full snapshot contributes nothing.
        _ => json!({}),
    };
    if let Value::Object(map) = &mut merged {
        map.insert("monitor".to_string(), serde_json::to_value(monitor).unwrap_or(Value::Null));
        map.insert("inbox".to_string(), serde_json::to_value(inbox).unwrap_or(Value::Null));
    }
    merged
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
