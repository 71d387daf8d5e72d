// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource rollups: token and cost totals per provider/model

use ac_core::{ProjectId, RunId, RunRecord, RunSpec, WorkspaceLayout};
use ac_index::{IndexError, IndexStore};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderRollup {
    pub provider: String,
    pub model: String,
    pub runs: u64,
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourcesSnapshot {
    pub providers: Vec<ProviderRollup>,
    pub context_cycles: u64,
}

/// Sum final usage per (provider, model) across the indexed runs, reading
/// each run's durable record for its usage summary.
pub fn resources_snapshot(
    store: &IndexStore,
    layout: &WorkspaceLayout,
    project: Option<&str>,
) -> Result<ResourcesSnapshot, IndexError> {
    let mut rollups: HashMap<(String, String), ProviderRollup> = HashMap::new();

    for row in store.list_runs(project)? {
        let run_yaml = layout.run_yaml(
            &ProjectId::new(row.project_id.clone()),
            &RunId::from_string(&row.run_id),
        );
        let Ok(record) = RunRecord::load(&run_yaml) else {
            continue;
        };
        let model = match &record.spec {
            RunSpec::Prompt { model, .. } => model.clone(),
            RunSpec::Command { .. } => String::new(),
        };
        let key = (row.provider.clone(), model.clone());
        let rollup = rollups.entry(key).or_insert_with(|| ProviderRollup {
            provider: row.provider.clone(),
            model,
            ..Default::default()
        });
        rollup.runs += 1;
        if let Some(usage) = &record.usage {
            rollup.total_tokens += usage.total_tokens;
            rollup.input_tokens += usage.input_tokens.unwrap_or(0);
            rollup.output_tokens += usage.output_tokens.unwrap_or(0);
            rollup.cost_usd += usage.cost_usd.unwrap_or(0.0);
        }
    }

    let mut providers: Vec<ProviderRollup> = rollups.into_values().collect();
    providers.sort_by(|a, b| (a.provider.clone(), a.model.clone()).cmp(&(b.provider.clone(), b.model.clone())));

    Ok(ResourcesSnapshot {
        providers,
        context_cycles: store.count_events_of_kind(project, "context.cycle.detected")?,
    })
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod tests;
