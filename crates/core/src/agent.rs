// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identities, provider kinds, and output-contract modes

use crate::define_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

define_name! {
    /// Agent identifier, taken from `org/agents/<aid>/agent.yaml`.
    pub struct AgentId;
}

/// Organizational role. Only workers and managers are triaged by the
/// heartbeat scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Worker,
    Manager,
}

/// Worker provider. Known families get variants; anything else rides in
/// `Other` and is treated as a plain command provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Codex,
    Claude,
    Cmd,
    Other(String),
}

impl ProviderKind {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderKind::Codex => "codex",
            ProviderKind::Claude => "claude",
            ProviderKind::Cmd => "cmd",
            ProviderKind::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "codex" => ProviderKind::Codex,
            "claude" => ProviderKind::Claude,
            "cmd" => ProviderKind::Cmd,
            other => ProviderKind::Other(other.to_string()),
        }
    }

    /// True when this provider belongs to the codex family (primary
    /// reformatter choice for third attempts).
    pub fn is_codex_family(&self) -> bool {
        matches!(self, ProviderKind::Codex)
    }

    pub fn is_claude_family(&self) -> bool {
        matches!(self, ProviderKind::Claude)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ProviderKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProviderKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ProviderKind::parse(&s))
    }
}

/// How the structured-result contract is communicated to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractMode {
    /// Provider natively supports structured output schemas.
    ProviderSchema,
    /// Contract is stated in the prompt only.
    PromptOnly,
}

/// Per-provider contract-mode table.
///
/// The two known families default to `provider_schema`; everything else to
/// `prompt_only`. Deployments override per provider via machine config
/// instead of code changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractModeTable {
    #[serde(default)]
    pub overrides: HashMap<String, ContractMode>,
}

impl ContractModeTable {
    pub fn mode_for(&self, provider: &ProviderKind) -> ContractMode {
        if let Some(mode) = self.overrides.get(provider.as_str()) {
            return *mode;
        }
        match provider {
            ProviderKind::Codex | ProviderKind::Claude => ContractMode::ProviderSchema,
            _ => ContractMode::PromptOnly,
        }
    }
}

/// Parsed `org/agents/<aid>/agent.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: AgentId,
    #[serde(default)]
    pub name: String,
    pub role: AgentRole,
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_level: Option<String>,
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
