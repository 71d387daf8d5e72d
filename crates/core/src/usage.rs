// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token usage summaries and dedup keys

use crate::agent::ProviderKind;
use serde::{Deserialize, Serialize};

/// Rough chars-per-token divisor used by the fallback estimator.
const CHARS_PER_TOKEN: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    ProviderReported,
    EstimatedChars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    RateCard,
    None,
}

/// Dedup tuple for usage records within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsageKey {
    pub source: UsageSource,
    pub provider: String,
    pub input: u64,
    pub cached: u64,
    pub output: u64,
    pub reasoning: u64,
    pub total: u64,
}

/// Final or in-flight usage for a run.
///
/// Invariants: `total_tokens >= 0` always; `source == ProviderReported`
/// implies `confidence == High` (enforced by the constructors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub source: UsageSource,
    pub confidence: Confidence,
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_output_tokens: Option<u64>,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    pub cost_source: CostSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_card_provider: Option<String>,
}

impl UsageSummary {
    /// Usage as reported by the provider itself. Confidence is always high.
    pub fn provider_reported(
        provider: ProviderKind,
        input_tokens: Option<u64>,
        cached_input_tokens: Option<u64>,
        output_tokens: Option<u64>,
        reasoning_output_tokens: Option<u64>,
        total_tokens: Option<u64>,
    ) -> Self {
        let total = total_tokens.unwrap_or_else(|| {
            input_tokens.unwrap_or(0)
                + output_tokens.unwrap_or(0)
                + reasoning_output_tokens.unwrap_or(0)
        });
        Self {
            source: UsageSource::ProviderReported,
            confidence: Confidence::High,
            provider,
            input_tokens,
            cached_input_tokens,
            output_tokens,
            reasoning_output_tokens,
            total_tokens: total,
            cost_usd: None,
            cost_source: CostSource::None,
            rate_card_provider: None,
        }
    }

    /// Character-count fallback when the provider reported nothing.
    pub fn estimated_from_chars(
        provider: ProviderKind,
        stdin_chars: u64,
        stdout_chars: u64,
        stderr_chars: u64,
    ) -> Self {
        let input = stdin_chars / CHARS_PER_TOKEN;
        let output = (stdout_chars + stderr_chars) / CHARS_PER_TOKEN;
        Self {
            source: UsageSource::EstimatedChars,
            confidence: Confidence::Low,
            provider,
            input_tokens: Some(input),
            cached_input_tokens: None,
            output_tokens: Some(output),
            reasoning_output_tokens: None,
            total_tokens: input + output,
            cost_usd: None,
            cost_source: CostSource::None,
            rate_card_provider: None,
        }
    }

    /// The dedup tuple: `(source, provider, input, cached, output,
    /// reasoning, total)`.
    pub fn dedup_key(&self) -> UsageKey {
        UsageKey {
            source: self.source,
            provider: self.provider.as_str().to_string(),
            input: self.input_tokens.unwrap_or(0),
            cached: self.cached_input_tokens.unwrap_or(0),
            output: self.output_tokens.unwrap_or(0),
            reasoning: self.reasoning_output_tokens.unwrap_or(0),
            total: self.total_tokens,
        }
    }
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
