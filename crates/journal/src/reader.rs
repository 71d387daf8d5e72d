// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-side of the journal: entries with per-line parse outcomes

use crate::writer::JournalError;
use ac_core::EventEnvelope;
use std::io::Read;
use std::path::Path;

/// One journal line. `seq` is the 1-based position among non-empty lines.
///
/// `raw_line` is kept verbatim for both outcomes so the index can retain
/// the exact bytes (unknown event kinds and payloads survive consumers
/// that predate them).
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub seq: u64,
    pub raw_line: String,
    pub parsed: Result<EventEnvelope, ParseFailure>,
}

/// A failed line parse, destined for the parse-error index table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub error: String,
}

fn io_err(path: &Path, source: std::io::Error) -> JournalError {
    JournalError::Io { path: path.display().to_string(), source }
}

/// Read every entry of a journal.
///
/// Malformed lines become `Err(ParseFailure)` entries; processing always
/// continues to the end of the file. A trailing line without `\n` (a
/// crashed writer) is recorded as a parse failure for its seq; its
/// content is never guessed at. Empty lines are skipped without
/// consuming a seq.
pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>, JournalError> {
    let mut raw = Vec::new();
    std::fs::File::open(path)
        .and_then(|mut f| f.read_to_end(&mut raw))
        .map_err(|e| io_err(path, e))?;

    let mut entries = Vec::new();
    let mut seq = 0u64;
    let mut offset = 0usize;
    while offset < raw.len() {
        let (line_end, terminated) = match raw[offset..].iter().position(|&b| b == b'\n') {
            Some(rel) => (offset + rel, true),
            None => (raw.len(), false),
        };
        let line_bytes = &raw[offset..line_end];
        offset = line_end + 1;
        if line_bytes.is_empty() {
            continue;
        }
        seq += 1;

        let raw_line = String::from_utf8_lossy(line_bytes).into_owned();

        let parsed = if std::str::from_utf8(line_bytes).is_err() {
            Err(ParseFailure { error: "invalid utf-8".to_string() })
        } else if !terminated {
            Err(ParseFailure { error: "unterminated trailing line".to_string() })
        } else {
            serde_json::from_str::<EventEnvelope>(&raw_line)
                .map_err(|e| ParseFailure { error: e.to_string() })
        };

        let stop = !terminated;
        entries.push(JournalEntry { seq, raw_line, parsed });
        if stop {
            break;
        }
    }
    Ok(entries)
}

/// Entries with `seq > after_seq`, for incremental index sync.
pub fn read_entries_after(path: &Path, after_seq: u64) -> Result<Vec<JournalEntry>, JournalError> {
    let mut entries = read_entries(path)?;
    entries.retain(|e| e.seq > after_seq);
    Ok(entries)
}

/// Count the journal's non-empty lines (`L` in the sync contract).
pub fn count_lines(path: &Path) -> Result<u64, JournalError> {
    let mut raw = Vec::new();
    std::fs::File::open(path)
        .and_then(|mut f| f.read_to_end(&mut raw))
        .map_err(|e| io_err(path, e))?;
    let mut count = 0u64;
    for line in raw.split(|&b| b == b'\n') {
        if !line.is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
