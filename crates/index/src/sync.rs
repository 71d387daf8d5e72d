// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rebuild (destructive) and sync (convergent) of the index
//!
//! Callers must hold the workspace write lock (`WorkspaceLocks`) around
//! both entry points; the workspace is single-owner by contract so no
//! cross-process locking exists.

use crate::scan::{scan_workspace, ScannedRun};
use crate::store::{EventRow, IndexError, IndexStore, ParseErrorRow};
use ac_core::WorkspaceLayout;
use ac_journal::{count_lines, read_entries_after, JournalEntry};
use std::collections::HashSet;

/// Counts returned by a destructive rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RebuildCounts {
    pub runs: u64,
    pub events: u64,
    pub event_parse_errors: u64,
    pub artifacts: u64,
    pub reviews: u64,
    pub help_requests: u64,
    pub skipped_files: u64,
}

/// Counts returned by a convergent sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncCounts {
    pub runs_upserted: u64,
    pub runs_deleted: u64,
    pub events_indexed: u64,
    pub events_deleted: u64,
    pub parse_errors_indexed: u64,
    pub parse_errors_deleted: u64,
    pub artifacts_upserted: u64,
    pub artifacts_deleted: u64,
    pub reviews_upserted: u64,
    pub reviews_deleted: u64,
    pub help_requests_upserted: u64,
    pub help_requests_deleted: u64,
    /// Runs whose journal appeared truncated and were re-indexed from seq 1.
    pub truncated_runs: u64,
    pub skipped_files: u64,
}

impl SyncCounts {
    /// True when the pass changed nothing (idempotence check).
    pub fn is_noop(&self) -> bool {
        let Self {
            runs_upserted,
            runs_deleted,
            events_indexed,
            events_deleted,
            parse_errors_indexed,
            parse_errors_deleted,
            artifacts_upserted,
            artifacts_deleted,
            reviews_upserted,
            reviews_deleted,
            help_requests_upserted,
            help_requests_deleted,
            truncated_runs,
            skipped_files: _,
        } = self;
        *runs_upserted == 0
            && *runs_deleted == 0
            && *events_indexed == 0
            && *events_deleted == 0
            && *parse_errors_indexed == 0
            && *parse_errors_deleted == 0
            && *artifacts_upserted == 0
            && *artifacts_deleted == 0
            && *reviews_upserted == 0
            && *reviews_deleted == 0
            && *help_requests_upserted == 0
            && *help_requests_deleted == 0
            && *truncated_runs == 0
    }
}

fn event_row_from_entry(project: &str, run: &str, entry: &JournalEntry) -> EventRow {
    // Only called for parsed entries.
    let envelope = match &entry.parsed {
        Ok(e) => e,
        Err(_) => unreachable!("event_row_from_entry on failed parse"),
    };
    EventRow {
        project_id: project.to_string(),
        run_id: run.to_string(),
        seq: entry.seq,
        kind: envelope.kind.as_str().to_string(),
        ts_wallclock: Some(envelope.ts_wallclock.clone()),
        ts_monotonic_ms: envelope.ts_monotonic_ms,
        actor: Some(envelope.actor.as_str().to_string()),
        session_ref: Some(envelope.session_ref.clone()),
        visibility: Some(envelope.visibility.as_str().to_string()),
        payload_json: envelope.payload.to_string(),
        raw_json: entry.raw_line.clone(),
    }
}

/// Drop every row and re-index the workspace from scratch, inside a
/// single transaction. The journal files are never touched.
pub fn rebuild_workspace(layout: &WorkspaceLayout) -> Result<RebuildCounts, IndexError> {
    // Drop the database file itself so schema drift cannot survive.
    let db_path = layout.index_sqlite();
    if db_path.exists() {
        std::fs::remove_file(&db_path)
            .map_err(|e| IndexError::Io { path: db_path.display().to_string(), source: e })?;
    }
    let store = IndexStore::open(&db_path)?;
    let scanned = scan_workspace(layout)?;

    store.with_write_tx(|tx| {
        let mut counts = RebuildCounts { skipped_files: scanned.skipped, ..Default::default() };

        for ScannedRun { row, events_path } in &scanned.runs {
            tx.upsert_run(row)?;
            counts.runs += 1;
            if !events_path.exists() {
                continue;
            }
            for entry in read_entries_after(events_path, 0)? {
                match &entry.parsed {
                    Ok(_) => {
                        tx.insert_event(&event_row_from_entry(&row.project_id, &row.run_id, &entry))?;
                        counts.events += 1;
                    }
                    Err(failure) => {
                        tx.insert_parse_error(&ParseErrorRow {
                            project_id: row.project_id.clone(),
                            run_id: row.run_id.clone(),
                            seq: entry.seq,
                            error: failure.error.clone(),
                            raw_line: entry.raw_line.clone(),
                        })?;
                        counts.event_parse_errors += 1;
                    }
                }
            }
        }
        for artifact in &scanned.artifacts {
            tx.upsert_artifact(artifact)?;
            counts.artifacts += 1;
        }
        for review in &scanned.reviews {
            tx.upsert_review(review)?;
            counts.reviews += 1;
        }
        for help in &scanned.help_requests {
            tx.upsert_help_request(help)?;
            counts.help_requests += 1;
        }
        Ok(counts)
    })
}

/// Converge the index on the current filesystem state, incrementally,
/// inside a single write transaction.
pub fn sync_workspace(layout: &WorkspaceLayout) -> Result<SyncCounts, IndexError> {
    let store = IndexStore::open(&layout.index_sqlite())?;
    let scanned = scan_workspace(layout)?;

    store.with_write_tx(|tx| {
        let mut counts = SyncCounts { skipped_files: scanned.skipped, ..Default::default() };

        // Key sets as of the start of the pass, for vanished-key deletion.
        let initial_runs: HashSet<(String, String)> = tx.run_keys()?.into_iter().collect();
        let initial_artifacts: HashSet<(String, String)> =
            tx.artifact_keys()?.into_iter().collect();
        let initial_reviews: HashSet<String> = tx.review_keys()?.into_iter().collect();
        let initial_help: HashSet<String> = tx.help_request_keys()?.into_iter().collect();

        let mut seen_runs = HashSet::new();
        for ScannedRun { row, events_path } in &scanned.runs {
            seen_runs.insert((row.project_id.clone(), row.run_id.clone()));
            if tx.upsert_run(row)? {
                counts.runs_upserted += 1;
            }

            let tail_len = if events_path.exists() { count_lines(events_path)? } else { 0 };
            let mut max_indexed = tx.max_indexed_seq(&row.project_id, &row.run_id)?;

            if max_indexed > tail_len {
                // Journal truncated: restart this run's rows from seq 1.
                let (events, errors) = tx.delete_events_for_run(&row.project_id, &row.run_id)?;
                counts.events_deleted += events;
                counts.parse_errors_deleted += errors;
                counts.truncated_runs += 1;
                max_indexed = 0;
            }

            if tail_len == 0 || max_indexed >= tail_len {
                continue;
            }
            for entry in read_entries_after(events_path, max_indexed)? {
                match &entry.parsed {
                    Ok(_) => {
                        // A seq that previously failed to parse now parses.
                        if tx.delete_parse_error_row(&row.project_id, &row.run_id, entry.seq)? {
                            counts.parse_errors_deleted += 1;
                        }
                        tx.insert_event(&event_row_from_entry(&row.project_id, &row.run_id, &entry))?;
                        counts.events_indexed += 1;
                    }
                    Err(failure) => {
                        if tx.delete_event_row(&row.project_id, &row.run_id, entry.seq)? {
                            counts.events_deleted += 1;
                        }
                        tx.insert_parse_error(&ParseErrorRow {
                            project_id: row.project_id.clone(),
                            run_id: row.run_id.clone(),
                            seq: entry.seq,
                            error: failure.error.clone(),
                            raw_line: entry.raw_line.clone(),
                        })?;
                        counts.parse_errors_indexed += 1;
                    }
                }
            }
        }

        let mut seen_artifacts = HashSet::new();
        for artifact in &scanned.artifacts {
            seen_artifacts.insert((artifact.project_id.clone(), artifact.artifact_id.clone()));
            if tx.upsert_artifact(artifact)? {
                counts.artifacts_upserted += 1;
            }
        }

        let mut seen_reviews = HashSet::new();
        for review in &scanned.reviews {
            seen_reviews.insert(review.review_id.clone());
            if tx.upsert_review(review)? {
                counts.reviews_upserted += 1;
            }
        }

        let mut seen_help = HashSet::new();
        for help in &scanned.help_requests {
            seen_help.insert(help.help_request_id.clone());
            if tx.upsert_help_request(help)? {
                counts.help_requests_upserted += 1;
            }
        }

        // Anything indexed at the start and not seen this pass is gone
        // from the filesystem; delete it (runs cascade to event rows).
        for (project, run) in initial_runs.difference(&seen_runs) {
            let (deleted, events, errors) = tx.delete_run(project, run)?;
            if deleted {
                counts.runs_deleted += 1;
            }
            counts.events_deleted += events;
            counts.parse_errors_deleted += errors;
        }
        for (project, artifact) in initial_artifacts.difference(&seen_artifacts) {
            if tx.delete_artifact(project, artifact)? {
                counts.artifacts_deleted += 1;
            }
        }
        for review in initial_reviews.difference(&seen_reviews) {
            if tx.delete_review(review)? {
                counts.reviews_deleted += 1;
            }
        }
        for help in initial_help.difference(&seen_help) {
            if tx.delete_help_request(help)? {
                counts.help_requests_deleted += 1;
            }
        }

        Ok(counts)
    })
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
