// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine and policy configuration consumed at the engine boundary

use crate::agent::{ContractModeTable, ProviderKind};
use crate::records::RecordError;
use crate::usage::UsageSummary;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Where a provider's binary lives and how it is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderBinary {
    pub bin: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Set by the doctor after a subscription probe; `Some(false)` fails
    /// job preflight with `subscription_unverified`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_verified: Option<bool>,
}

/// USD rates per million tokens for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateCard {
    pub input_per_mtok: f64,
    pub cached_input_per_mtok: f64,
    pub output_per_mtok: f64,
    pub reasoning_output_per_mtok: f64,
}

impl RateCard {
    /// Price a usage summary. Reasoning tokens fall back to the output
    /// rate when no reasoning rate is configured.
    pub fn price(&self, usage: &UsageSummary) -> f64 {
        let reasoning_rate = if self.reasoning_output_per_mtok > 0.0 {
            self.reasoning_output_per_mtok
        } else {
            self.output_per_mtok
        };
        let per_tok = |tokens: Option<u64>, rate: f64| {
            tokens.unwrap_or(0) as f64 * rate / 1_000_000.0
        };
        per_tok(usage.input_tokens, self.input_per_mtok)
            + per_tok(usage.cached_input_tokens, self.cached_input_per_mtok)
            + per_tok(usage.output_tokens, self.output_per_mtok)
            + per_tok(usage.reasoning_output_tokens, reasoning_rate)
    }
}

/// Parsed `.local/machine.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub providers: HashMap<String, ProviderBinary>,
    pub rate_cards: HashMap<String, RateCard>,
    pub contract_modes: ContractModeTable,
}

impl MachineConfig {
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
        serde_yaml::from_str(&text).map_err(|e| RecordError::yaml(path, e))
    }

    pub fn rate_card_for(&self, provider: &ProviderKind) -> Option<&RateCard> {
        self.rate_cards.get(provider.as_str())
    }

    pub fn binary_for(&self, provider: &ProviderKind) -> Option<&ProviderBinary> {
        self.providers.get(provider.as_str())
    }
}

/// Token budget limits for one provider (or the workspace default).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_limit_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hard_limit_tokens: Option<u64>,
}

/// Budget section of `company/policy.yaml`. Everything else in the policy
/// file belongs to the policy engine and is ignored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub budget: BudgetLimits,
    /// Per-provider overrides; fall back to `budget` when absent.
    pub provider_budgets: HashMap<String, BudgetLimits>,
}

impl PolicyConfig {
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
        serde_yaml::from_str(&text).map_err(|e| RecordError::yaml(path, e))
    }

    pub fn limits_for(&self, provider: &ProviderKind) -> BudgetLimits {
        let fallback = &self.budget;
        match self.provider_budgets.get(provider.as_str()) {
            Some(limits) => BudgetLimits {
                soft_limit_tokens: limits.soft_limit_tokens.or(fallback.soft_limit_tokens),
                hard_limit_tokens: limits.hard_limit_tokens.or(fallback.hard_limit_tokens),
            },
            None => fallback.clone(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
