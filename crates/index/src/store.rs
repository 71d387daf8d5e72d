// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed index store
//!
//! Schema and indexes are authoritative here. Rows are plain strings:
//! the index is a derived cache, not the typed domain model.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("journal error: {0}")]
    Journal(#[from] ac_journal::JournalError),
    #[error("record error: {0}")]
    Record(#[from] ac_core::RecordError),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    project_id      TEXT NOT NULL,
    run_id          TEXT NOT NULL,
    created_at      TEXT,
    status          TEXT NOT NULL,
    provider        TEXT NOT NULL,
    agent_id        TEXT,
    context_pack_id TEXT,
    events_relpath  TEXT,
    PRIMARY KEY (project_id, run_id)
);
CREATE INDEX IF NOT EXISTS idx_runs_created_at ON runs(created_at DESC);

CREATE TABLE IF NOT EXISTS events (
    project_id      TEXT NOT NULL,
    run_id          TEXT NOT NULL,
    seq             INTEGER NOT NULL,
    type            TEXT NOT NULL,
    ts_wallclock    TEXT,
    ts_monotonic_ms INTEGER,
    actor           TEXT,
    session_ref     TEXT,
    visibility      TEXT,
    payload_json    TEXT NOT NULL,
    raw_json        TEXT NOT NULL,
    PRIMARY KEY (project_id, run_id, seq)
);
CREATE INDEX IF NOT EXISTS idx_events_type ON events(type);
CREATE INDEX IF NOT EXISTS idx_events_ts_wallclock ON events(ts_wallclock DESC);

CREATE TABLE IF NOT EXISTS event_parse_errors (
    project_id TEXT NOT NULL,
    run_id     TEXT NOT NULL,
    seq        INTEGER NOT NULL,
    error      TEXT NOT NULL,
    raw_line   TEXT NOT NULL,
    PRIMARY KEY (project_id, run_id, seq)
);

CREATE TABLE IF NOT EXISTS artifacts (
    project_id      TEXT NOT NULL,
    artifact_id     TEXT NOT NULL,
    type            TEXT NOT NULL,
    title           TEXT,
    visibility      TEXT,
    produced_by     TEXT,
    run_id          TEXT,
    context_pack_id TEXT,
    created_at      TEXT,
    relpath         TEXT NOT NULL,
    PRIMARY KEY (project_id, artifact_id)
);
CREATE INDEX IF NOT EXISTS idx_artifacts_type ON artifacts(type);
CREATE INDEX IF NOT EXISTS idx_artifacts_created_at ON artifacts(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_artifacts_run_id ON artifacts(run_id);

CREATE TABLE IF NOT EXISTS reviews (
    review_id           TEXT PRIMARY KEY,
    created_at          TEXT NOT NULL,
    decision            TEXT NOT NULL,
    actor_id            TEXT NOT NULL,
    actor_role          TEXT NOT NULL,
    subject_kind        TEXT NOT NULL,
    subject_artifact_id TEXT NOT NULL,
    project_id          TEXT NOT NULL,
    notes               TEXT
);
CREATE INDEX IF NOT EXISTS idx_reviews_created_at ON reviews(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_reviews_project ON reviews(project_id);

CREATE TABLE IF NOT EXISTS help_requests (
    help_request_id TEXT PRIMARY KEY,
    created_at      TEXT NOT NULL,
    title           TEXT NOT NULL,
    visibility      TEXT NOT NULL,
    requester       TEXT NOT NULL,
    target_manager  TEXT NOT NULL,
    project_id      TEXT,
    share_pack_id   TEXT
);
CREATE INDEX IF NOT EXISTS idx_help_requests_created_at ON help_requests(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_help_requests_target ON help_requests(target_manager);
"#;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RunRow {
    pub project_id: String,
    pub run_id: String,
    pub created_at: Option<String>,
    pub status: String,
    pub provider: String,
    pub agent_id: Option<String>,
    pub context_pack_id: Option<String>,
    pub events_relpath: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EventRow {
    pub project_id: String,
    pub run_id: String,
    pub seq: u64,
    pub kind: String,
    pub ts_wallclock: Option<String>,
    pub ts_monotonic_ms: Option<u64>,
    pub actor: Option<String>,
    pub session_ref: Option<String>,
    pub visibility: Option<String>,
    pub payload_json: String,
    pub raw_json: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParseErrorRow {
    pub project_id: String,
    pub run_id: String,
    pub seq: u64,
    pub error: String,
    pub raw_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ArtifactRow {
    pub project_id: String,
    pub artifact_id: String,
    pub artifact_type: String,
    pub title: Option<String>,
    pub visibility: Option<String>,
    pub produced_by: Option<String>,
    pub run_id: Option<String>,
    pub context_pack_id: Option<String>,
    pub created_at: Option<String>,
    pub relpath: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReviewRow {
    pub review_id: String,
    pub created_at: String,
    pub decision: String,
    pub actor_id: String,
    pub actor_role: String,
    pub subject_kind: String,
    pub subject_artifact_id: String,
    pub project_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HelpRequestRow {
    pub help_request_id: String,
    pub created_at: String,
    pub title: String,
    pub visibility: String,
    pub requester: String,
    pub target_manager: String,
    pub project_id: Option<String>,
    pub share_pack_id: Option<String>,
}

/// Row counts per table, for `index.stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub runs: u64,
    pub events: u64,
    pub event_parse_errors: u64,
    pub artifacts: u64,
    pub reviews: u64,
    pub help_requests: u64,
}

/// Handle on `.local/index.sqlite`.
pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    /// Open (or create) the index database and apply the schema.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| IndexError::Io { path: path.display().to_string(), source: e })?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Destroy all rows (rebuild's first step).
    pub fn clear_all(&self) -> Result<(), IndexError> {
        self.conn.execute_batch(
            "DELETE FROM events; DELETE FROM event_parse_errors; DELETE FROM runs;
             DELETE FROM artifacts; DELETE FROM reviews; DELETE FROM help_requests;",
        )?;
        Ok(())
    }

    /// Run `f` inside a single write transaction.
    pub fn with_write_tx<T>(
        &self,
        f: impl FnOnce(&Self) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    // -- runs --

    /// Insert or update a run row. Returns true when the stored row
    /// actually changed (drives idempotent sync counts).
    pub fn upsert_run(&self, row: &RunRow) -> Result<bool, IndexError> {
        let existing = self
            .conn
            .query_row(
                "SELECT project_id, run_id, created_at, status, provider, agent_id,
                        context_pack_id, events_relpath
                 FROM runs WHERE project_id = ?1 AND run_id = ?2",
                params![row.project_id, row.run_id],
                run_row_from,
            )
            .optional()?;
        if existing.as_ref() == Some(row) {
            return Ok(false);
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO runs
             (project_id, run_id, created_at, status, provider, agent_id, context_pack_id, events_relpath)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.project_id,
                row.run_id,
                row.created_at,
                row.status,
                row.provider,
                row.agent_id,
                row.context_pack_id,
                row.events_relpath,
            ],
        )?;
        Ok(true)
    }

    /// Delete a run and its dependent event rows.
    /// Returns (run_deleted, events_deleted, parse_errors_deleted).
    pub fn delete_run(&self, project: &str, run: &str) -> Result<(bool, u64, u64), IndexError> {
        let (events, errors) = self.delete_events_for_run(project, run)?;
        let deleted = self.conn.execute(
            "DELETE FROM runs WHERE project_id = ?1 AND run_id = ?2",
            params![project, run],
        )?;
        Ok((deleted > 0, events, errors))
    }

    pub fn run_keys(&self) -> Result<Vec<(String, String)>, IndexError> {
        let mut stmt = self.conn.prepare("SELECT project_id, run_id FROM runs")?;
        let keys = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn get_run(&self, project: &str, run: &str) -> Result<Option<RunRow>, IndexError> {
        Ok(self
            .conn
            .query_row(
                "SELECT project_id, run_id, created_at, status, provider, agent_id,
                        context_pack_id, events_relpath
                 FROM runs WHERE project_id = ?1 AND run_id = ?2",
                params![project, run],
                run_row_from,
            )
            .optional()?)
    }

    pub fn list_runs(&self, project: Option<&str>) -> Result<Vec<RunRow>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, run_id, created_at, status, provider, agent_id,
                    context_pack_id, events_relpath
             FROM runs
             WHERE (?1 IS NULL OR project_id = ?1)
             ORDER BY created_at DESC, run_id DESC",
        )?;
        let rows = stmt
            .query_map(params![project], run_row_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- events --

    pub fn insert_event(&self, row: &EventRow) -> Result<(), IndexError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO events
             (project_id, run_id, seq, type, ts_wallclock, ts_monotonic_ms, actor,
              session_ref, visibility, payload_json, raw_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.project_id,
                row.run_id,
                row.seq,
                row.kind,
                row.ts_wallclock,
                row.ts_monotonic_ms,
                row.actor,
                row.session_ref,
                row.visibility,
                row.payload_json,
                row.raw_json,
            ],
        )?;
        Ok(())
    }

    pub fn insert_parse_error(&self, row: &ParseErrorRow) -> Result<(), IndexError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO event_parse_errors
             (project_id, run_id, seq, error, raw_line)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![row.project_id, row.run_id, row.seq, row.error, row.raw_line],
        )?;
        Ok(())
    }

    pub fn delete_event_row(&self, project: &str, run: &str, seq: u64) -> Result<bool, IndexError> {
        let n = self.conn.execute(
            "DELETE FROM events WHERE project_id = ?1 AND run_id = ?2 AND seq = ?3",
            params![project, run, seq],
        )?;
        Ok(n > 0)
    }

    pub fn delete_parse_error_row(
        &self,
        project: &str,
        run: &str,
        seq: u64,
    ) -> Result<bool, IndexError> {
        let n = self.conn.execute(
            "DELETE FROM event_parse_errors WHERE project_id = ?1 AND run_id = ?2 AND seq = ?3",
            params![project, run, seq],
        )?;
        Ok(n > 0)
    }

    /// Highest seq present for the run across both event tables (0 when
    /// nothing is indexed).
    pub fn max_indexed_seq(&self, project: &str, run: &str) -> Result<u64, IndexError> {
        let max: Option<u64> = self.conn.query_row(
            "SELECT MAX(seq) FROM (
                 SELECT seq FROM events WHERE project_id = ?1 AND run_id = ?2
                 UNION ALL
                 SELECT seq FROM event_parse_errors WHERE project_id = ?1 AND run_id = ?2
             )",
            params![project, run],
            |r| r.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    /// Delete every event row for a run (truncation recovery).
    pub fn delete_events_for_run(&self, project: &str, run: &str) -> Result<(u64, u64), IndexError> {
        let events = self.conn.execute(
            "DELETE FROM events WHERE project_id = ?1 AND run_id = ?2",
            params![project, run],
        )? as u64;
        let errors = self.conn.execute(
            "DELETE FROM event_parse_errors WHERE project_id = ?1 AND run_id = ?2",
            params![project, run],
        )? as u64;
        Ok((events, errors))
    }

    pub fn list_events(
        &self,
        project: &str,
        run: &str,
        kind: Option<&str>,
        limit: Option<u64>,
    ) -> Result<Vec<EventRow>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, run_id, seq, type, ts_wallclock, ts_monotonic_ms, actor,
                    session_ref, visibility, payload_json, raw_json
             FROM events
             WHERE project_id = ?1 AND run_id = ?2 AND (?3 IS NULL OR type = ?3)
             ORDER BY seq ASC
             LIMIT ?4",
        )?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt
            .query_map(params![project, run, kind, limit], event_row_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Events of the given kinds across the workspace, newest first.
    pub fn events_of_kinds(
        &self,
        project: Option<&str>,
        kinds: &[&str],
    ) -> Result<Vec<EventRow>, IndexError> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> =
            (0..kinds.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "SELECT project_id, run_id, seq, type, ts_wallclock, ts_monotonic_ms, actor,
                    session_ref, visibility, payload_json, raw_json
             FROM events
             WHERE (?1 IS NULL OR project_id = ?1) AND type IN ({})
             ORDER BY ts_wallclock DESC, seq DESC",
            placeholders.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut params_vec: Vec<&dyn rusqlite::ToSql> = vec![&project];
        for kind in kinds {
            params_vec.push(kind);
        }
        let rows = stmt
            .query_map(params_vec.as_slice(), event_row_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn last_event(&self, project: &str, run: &str) -> Result<Option<EventRow>, IndexError> {
        Ok(self
            .conn
            .query_row(
                "SELECT project_id, run_id, seq, type, ts_wallclock, ts_monotonic_ms, actor,
                        session_ref, visibility, payload_json, raw_json
                 FROM events WHERE project_id = ?1 AND run_id = ?2
                 ORDER BY seq DESC LIMIT 1",
                params![project, run],
                event_row_from,
            )
            .optional()?)
    }

    pub fn list_parse_errors(
        &self,
        project: &str,
        run: &str,
    ) -> Result<Vec<ParseErrorRow>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, run_id, seq, error, raw_line
             FROM event_parse_errors
             WHERE project_id = ?1 AND run_id = ?2
             ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![project, run], |r| {
                Ok(ParseErrorRow {
                    project_id: r.get(0)?,
                    run_id: r.get(1)?,
                    seq: r.get(2)?,
                    error: r.get(3)?,
                    raw_line: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_parse_errors(&self, project: &str, run: &str) -> Result<u64, IndexError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM event_parse_errors WHERE project_id = ?1 AND run_id = ?2",
            params![project, run],
            |r| r.get(0),
        )?)
    }

    pub fn count_events_of_kind(
        &self,
        project: Option<&str>,
        kind: &str,
    ) -> Result<u64, IndexError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM events
             WHERE (?1 IS NULL OR project_id = ?1) AND type = ?2",
            params![project, kind],
            |r| r.get(0),
        )?)
    }

    // -- artifacts --

    pub fn upsert_artifact(&self, row: &ArtifactRow) -> Result<bool, IndexError> {
        let existing = self
            .conn
            .query_row(
                "SELECT project_id, artifact_id, type, title, visibility, produced_by,
                        run_id, context_pack_id, created_at, relpath
                 FROM artifacts WHERE project_id = ?1 AND artifact_id = ?2",
                params![row.project_id, row.artifact_id],
                artifact_row_from,
            )
            .optional()?;
        if existing.as_ref() == Some(row) {
            return Ok(false);
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO artifacts
             (project_id, artifact_id, type, title, visibility, produced_by, run_id,
              context_pack_id, created_at, relpath)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                row.project_id,
                row.artifact_id,
                row.artifact_type,
                row.title,
                row.visibility,
                row.produced_by,
                row.run_id,
                row.context_pack_id,
                row.created_at,
                row.relpath,
            ],
        )?;
        Ok(true)
    }

    pub fn delete_artifact(&self, project: &str, artifact: &str) -> Result<bool, IndexError> {
        let n = self.conn.execute(
            "DELETE FROM artifacts WHERE project_id = ?1 AND artifact_id = ?2",
            params![project, artifact],
        )?;
        Ok(n > 0)
    }

    pub fn artifact_keys(&self) -> Result<Vec<(String, String)>, IndexError> {
        let mut stmt = self.conn.prepare("SELECT project_id, artifact_id FROM artifacts")?;
        let keys = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn list_artifacts(
        &self,
        project: Option<&str>,
        artifact_type: Option<&str>,
    ) -> Result<Vec<ArtifactRow>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, artifact_id, type, title, visibility, produced_by,
                    run_id, context_pack_id, created_at, relpath
             FROM artifacts
             WHERE (?1 IS NULL OR project_id = ?1) AND (?2 IS NULL OR type = ?2)
             ORDER BY created_at DESC, artifact_id DESC",
        )?;
        let rows = stmt
            .query_map(params![project, artifact_type], artifact_row_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- reviews --

    pub fn upsert_review(&self, row: &ReviewRow) -> Result<bool, IndexError> {
        let existing = self
            .conn
            .query_row(
                "SELECT review_id, created_at, decision, actor_id, actor_role, subject_kind,
                        subject_artifact_id, project_id, notes
                 FROM reviews WHERE review_id = ?1",
                params![row.review_id],
                review_row_from,
            )
            .optional()?;
        if existing.as_ref() == Some(row) {
            return Ok(false);
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO reviews
             (review_id, created_at, decision, actor_id, actor_role, subject_kind,
              subject_artifact_id, project_id, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.review_id,
                row.created_at,
                row.decision,
                row.actor_id,
                row.actor_role,
                row.subject_kind,
                row.subject_artifact_id,
                row.project_id,
                row.notes,
            ],
        )?;
        Ok(true)
    }

    pub fn delete_review(&self, review: &str) -> Result<bool, IndexError> {
        let n = self
            .conn
            .execute("DELETE FROM reviews WHERE review_id = ?1", params![review])?;
        Ok(n > 0)
    }

    pub fn review_keys(&self) -> Result<Vec<String>, IndexError> {
        let mut stmt = self.conn.prepare("SELECT review_id FROM reviews")?;
        let keys = stmt.query_map([], |r| r.get(0))?.collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn list_reviews(&self, project: Option<&str>) -> Result<Vec<ReviewRow>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT review_id, created_at, decision, actor_id, actor_role, subject_kind,
                    subject_artifact_id, project_id, notes
             FROM reviews
             WHERE (?1 IS NULL OR project_id = ?1)
             ORDER BY created_at DESC, review_id DESC",
        )?;
        let rows = stmt
            .query_map(params![project], review_row_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- help requests --

    pub fn upsert_help_request(&self, row: &HelpRequestRow) -> Result<bool, IndexError> {
        let existing = self
            .conn
            .query_row(
                "SELECT help_request_id, created_at, title, visibility, requester,
                        target_manager, project_id, share_pack_id
                 FROM help_requests WHERE help_request_id = ?1",
                params![row.help_request_id],
                help_request_row_from,
            )
            .optional()?;
        if existing.as_ref() == Some(row) {
            return Ok(false);
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO help_requests
             (help_request_id, created_at, title, visibility, requester, target_manager,
              project_id, share_pack_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.help_request_id,
                row.created_at,
                row.title,
                row.visibility,
                row.requester,
                row.target_manager,
                row.project_id,
                row.share_pack_id,
            ],
        )?;
        Ok(true)
    }

    pub fn delete_help_request(&self, id: &str) -> Result<bool, IndexError> {
        let n = self.conn.execute(
            "DELETE FROM help_requests WHERE help_request_id = ?1",
            params![id],
        )?;
        Ok(n > 0)
    }

    pub fn help_request_keys(&self) -> Result<Vec<String>, IndexError> {
        let mut stmt = self.conn.prepare("SELECT help_request_id FROM help_requests")?;
        let keys = stmt.query_map([], |r| r.get(0))?.collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn list_help_requests(
        &self,
        target_manager: Option<&str>,
    ) -> Result<Vec<HelpRequestRow>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT help_request_id, created_at, title, visibility, requester,
                    target_manager, project_id, share_pack_id
             FROM help_requests
             WHERE (?1 IS NULL OR target_manager = ?1)
             ORDER BY created_at DESC, help_request_id DESC",
        )?;
        let rows = stmt
            .query_map(params![target_manager], help_request_row_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- stats --

    pub fn stats(&self) -> Result<IndexStats, IndexError> {
        let count = |table: &str| -> Result<u64, rusqlite::Error> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        };
        Ok(IndexStats {
            runs: count("runs")?,
            events: count("events")?,
            event_parse_errors: count("event_parse_errors")?,
            artifacts: count("artifacts")?,
            reviews: count("reviews")?,
            help_requests: count("help_requests")?,
        })
    }
}

fn run_row_from(r: &Row<'_>) -> Result<RunRow, rusqlite::Error> {
    Ok(RunRow {
        project_id: r.get(0)?,
        run_id: r.get(1)?,
        created_at: r.get(2)?,
        status: r.get(3)?,
        provider: r.get(4)?,
        agent_id: r.get(5)?,
        context_pack_id: r.get(6)?,
        events_relpath: r.get(7)?,
    })
}

fn event_row_from(r: &Row<'_>) -> Result<EventRow, rusqlite::Error> {
    Ok(EventRow {
        project_id: r.get(0)?,
        run_id: r.get(1)?,
        seq: r.get(2)?,
        kind: r.get(3)?,
        ts_wallclock: r.get(4)?,
        ts_monotonic_ms: r.get(5)?,
        actor: r.get(6)?,
        session_ref: r.get(7)?,
        visibility: r.get(8)?,
        payload_json: r.get(9)?,
        raw_json: r.get(10)?,
    })
}

fn artifact_row_from(r: &Row<'_>) -> Result<ArtifactRow, rusqlite::Error> {
    Ok(ArtifactRow {
        project_id: r.get(0)?,
        artifact_id: r.get(1)?,
        artifact_type: r.get(2)?,
        title: r.get(3)?,
        visibility: r.get(4)?,
        produced_by: r.get(5)?,
        run_id: r.get(6)?,
        context_pack_id: r.get(7)?,
        created_at: r.get(8)?,
        relpath: r.get(9)?,
    })
}

fn review_row_from(r: &Row<'_>) -> Result<ReviewRow, rusqlite::Error> {
    Ok(ReviewRow {
        review_id: r.get(0)?,
        created_at: r.get(1)?,
        decision: r.get(2)?,
        actor_id: r.get(3)?,
        actor_role: r.get(4)?,
        subject_kind: r.get(5)?,
        subject_artifact_id: r.get(6)?,
        project_id: r.get(7)?,
        notes: r.get(8)?,
    })
}

fn help_request_row_from(r: &Row<'_>) -> Result<HelpRequestRow, rusqlite::Error> {
    Ok(HelpRequestRow {
        help_request_id: r.get(0)?,
        created_at: r.get(1)?,
        title: r.get(2)?,
        visibility: r.get(3)?,
        requester: r.get(4)?,
        target_manager: r.get(5)?,
        project_id: r.get(6)?,
        share_pack_id: r.get(7)?,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
