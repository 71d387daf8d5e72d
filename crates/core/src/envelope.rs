// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event envelope written into a run's append-only journal

use crate::agent::AgentId;
use crate::run::RunId;
use serde::{Deserialize, Serialize};

/// Journal schema version stamped into every envelope.
pub const SCHEMA_VERSION: u32 = 1;

/// Who produced an event: the daemon itself or a specific agent.
///
/// Serializes as the bare string `"system"` or the agent id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    System,
    Agent(AgentId),
}

impl Actor {
    pub fn as_str(&self) -> &str {
        match self {
            Actor::System => "system",
            Actor::Agent(id) => id.as_str(),
        }
    }
}

impl Serialize for Actor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Actor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(if s == "system" { Actor::System } else { Actor::Agent(AgentId::new(s)) })
    }
}

/// Who may read an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    PrivateAgent,
    Team,
    Managers,
    Org,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::PrivateAgent => "private_agent",
            Visibility::Team => "team",
            Visibility::Managers => "managers",
            Visibility::Org => "org",
        }
    }
}

macro_rules! event_kinds {
    ( $( $variant:ident => $tag:literal ),+ $(,)? ) => {
        /// Event type tag.
        ///
        /// Known kinds get variants; anything else is carried through intact
        /// as `Other` so future consumers can still upgrade old journals.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum EventKind {
            $( $variant, )+
            Other(String),
        }

        impl EventKind {
            pub fn as_str(&self) -> &str {
                match self {
                    $( EventKind::$variant => $tag, )+
                    EventKind::Other(s) => s,
                }
            }

            pub fn parse(s: &str) -> Self {
                match s {
                    $( $tag => EventKind::$variant, )+
                    other => EventKind::Other(other.to_string()),
                }
            }
        }
    };
}

event_kinds! {
    RunStarted => "run.started",
    RunExecuting => "run.executing",
    ProviderRaw => "provider.raw",
    UsageReported => "usage.reported",
    UsageEstimated => "usage.estimated",
    UsageCostComputed => "usage.cost_computed",
    BudgetAlert => "budget.alert",
    BudgetExceeded => "budget.exceeded",
    BudgetDecision => "budget.decision",
    RunEnded => "run.ended",
    RunFailed => "run.failed",
    RunStopped => "run.stopped",
    WorktreePrepared => "worktree.prepared",
    ContextPackSnapshotWritten => "context_pack.snapshot_written",
    ContextPackSnapshotFailed => "context_pack.snapshot_failed",
    ArtifactProduced => "artifact.produced",
    ContextCycleDetected => "context.cycle.detected",
    MemoryCandidatesGenerated => "memory.candidates.generated",
    PolicyDenied => "policy.denied",
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EventKind::parse(&s))
    }
}

/// One newline-delimited record in a run's journal.
///
/// Immutable once flushed. `seq` is not a field: it is the record's
/// 1-based line position in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub schema_version: u32,
    /// ISO-8601 UTC timestamp.
    pub ts_wallclock: String,
    /// Monotonic milliseconds since run start, for ordering within a run
    /// when wallclocks skew.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_monotonic_ms: Option<u64>,
    pub run_id: RunId,
    pub session_ref: String,
    pub actor: Actor,
    pub visibility: Visibility,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// System-actored envelope with team visibility (the common case for
    /// engine-emitted lifecycle events).
    pub fn system(
        run_id: RunId,
        session_ref: impl Into<String>,
        kind: EventKind,
        payload: serde_json::Value,
        ts_wallclock: String,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            ts_wallclock,
            ts_monotonic_ms: None,
            run_id,
            session_ref: session_ref.into(),
            actor: Actor::System,
            visibility: Visibility::Team,
            kind,
            payload,
        }
    }

    pub fn with_monotonic_ms(mut self, ms: u64) -> Self {
        self.ts_monotonic_ms = Some(ms);
        self
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
