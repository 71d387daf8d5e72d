// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider-specific usage extraction from output lines
//!
//! Kept behind a small trait so new providers plug in without touching
//! the engine loop.

use ac_core::{ProviderKind, UsageKey, UsageSummary};
use regex::Regex;
use std::collections::HashSet;

/// Extract zero or more usage records from one complete output line.
pub trait UsageExtractor: Send + Sync {
    fn extract(&self, line: &str, provider: &ProviderKind) -> Vec<UsageSummary>;
}

/// Claude stream-json: lines carrying a `usage` object with
/// `input_tokens` / `output_tokens` / cache fields.
pub struct ClaudeExtractor;

impl UsageExtractor for ClaudeExtractor {
    fn extract(&self, line: &str, provider: &ProviderKind) -> Vec<UsageSummary> {
        if !provider.is_claude_family() || !line.contains("\"usage\"") {
            return Vec::new();
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            return Vec::new();
        };
        let Some(usage) = find_usage_object(&value) else {
            return Vec::new();
        };
        let get = |key: &str| usage.get(key).and_then(|v| v.as_u64());
        let input = get("input_tokens");
        let output = get("output_tokens");
        if input.is_none() && output.is_none() {
            return Vec::new();
        }
        let cached = get("cache_read_input_tokens");
        vec![UsageSummary::provider_reported(
            provider.clone(),
            input,
            cached,
            output,
            None,
            None,
        )]
    }
}

/// A `usage` object may sit at the top level or nested under `message`.
fn find_usage_object(value: &serde_json::Value) -> Option<&serde_json::Value> {
    value
        .get("usage")
        .or_else(|| value.get("message").and_then(|m| m.get("usage")))
        .filter(|u| u.is_object())
}

/// Codex: JSON `token_usage` objects or a plain `tokens used: N` summary
/// line.
pub struct CodexExtractor {
    tokens_used: Regex,
}

impl CodexExtractor {
    pub fn new() -> Self {
        Self {
            // e.g. "tokens used: 12345"
            tokens_used: Regex::new(r"(?i)tokens used:\s*([0-9][0-9,]*)")
                .unwrap_or_else(|_| unreachable!("static regex")),
        }
    }
}

impl Default for CodexExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageExtractor for CodexExtractor {
    fn extract(&self, line: &str, provider: &ProviderKind) -> Vec<UsageSummary> {
        if !provider.is_codex_family() {
            return Vec::new();
        }
        if line.contains("\"token_usage\"") {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                if let Some(tu) = value.get("token_usage").filter(|t| t.is_object()) {
                    let get = |key: &str| tu.get(key).and_then(|v| v.as_u64());
                    return vec![UsageSummary::provider_reported(
                        provider.clone(),
                        get("input_tokens"),
                        get("cached_input_tokens"),
                        get("output_tokens"),
                        get("reasoning_output_tokens"),
                        get("total_tokens"),
                    )];
                }
            }
        }
        if let Some(caps) = self.tokens_used.captures(line) {
            let digits: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
            if let Ok(total) = digits.parse::<u64>() {
                return vec![UsageSummary::provider_reported(
                    provider.clone(),
                    None,
                    None,
                    None,
                    None,
                    Some(total),
                )];
            }
        }
        Vec::new()
    }
}

/// The engine's default extractor chain.
pub struct ExtractorSet {
    extractors: Vec<Box<dyn UsageExtractor>>,
}

impl ExtractorSet {
    pub fn standard() -> Self {
        Self {
            extractors: vec![Box::new(ClaudeExtractor), Box::new(CodexExtractor::new())],
        }
    }

    pub fn with(extractors: Vec<Box<dyn UsageExtractor>>) -> Self {
        Self { extractors }
    }
}

impl UsageExtractor for ExtractorSet {
    fn extract(&self, line: &str, provider: &ProviderKind) -> Vec<UsageSummary> {
        self.extractors
            .iter()
            .flat_map(|e| e.extract(line, provider))
            .collect()
    }
}

/// Per-run dedup of usage records by their dedup tuple.
///
/// The first occurrence passes through (emitted as `usage.reported`);
/// duplicates are suppressed.
#[derive(Default)]
pub struct UsageDeduper {
    seen: HashSet<UsageKey>,
}

impl UsageDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this record is new for the run.
    pub fn admit(&mut self, usage: &UsageSummary) -> bool {
        self.seen.insert(usage.dedup_key())
    }
}

#[cfg(test)]
#[path = "usage_ext_tests.rs"]
mod tests;
