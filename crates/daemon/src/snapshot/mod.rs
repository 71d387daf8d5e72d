// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot composers: pure read-model views over index + filesystem
//!
//! All snapshots are read-only and idempotent given the same underlying
//! state; none of them mutate the index.

pub mod bootstrap;
pub mod inbox;
pub mod monitor;
pub mod pm;
pub mod resources;

pub use bootstrap::{merge, BootstrapSnapshot};
pub use inbox::{inbox_snapshot, InboxSnapshot, PendingReview};
pub use monitor::{monitor_snapshot, GovernanceCounters, MonitorSnapshot, RunMonitorEntry};
pub use pm::{pm_snapshot, CpmSummary, GanttSpan, PmSnapshot, ProjectSummary};
pub use resources::{resources_snapshot, ProviderRollup, ResourcesSnapshot};
