// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::writer::JournalWriter;
use ac_core::test_support::envelope;
use ac_core::{EventKind, RunId};
use std::io::Write;
use tempfile::tempdir;

fn write_journal(path: &std::path::Path, kinds: &[EventKind]) {
    let run = RunId::from_string("run-r");
    let mut writer = JournalWriter::open(path).unwrap();
    for kind in kinds {
        writer.append(&envelope(&run, kind.clone(), serde_json::json!({}))).unwrap();
    }
    writer.flush().unwrap();
}

#[test]
fn reads_back_written_entries_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    write_journal(&path, &[EventKind::RunStarted, EventKind::RunExecuting, EventKind::RunEnded]);

    let entries = read_entries(&path).unwrap();
    assert_eq!(entries.len(), 3);
    let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(entries[2].parsed.as_ref().unwrap().kind, EventKind::RunEnded);
}

#[test]
fn raw_line_is_kept_verbatim_for_ok_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    write_journal(&path, &[EventKind::RunStarted]);

    let text = std::fs::read_to_string(&path).unwrap();
    let entries = read_entries(&path).unwrap();
    assert_eq!(entries[0].raw_line, text.trim_end_matches('\n'));
}

#[test]
fn malformed_line_becomes_parse_failure_and_processing_continues() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    write_journal(&path, &[EventKind::RunStarted]);
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"not-json\n").unwrap();
    }
    write_journal(&path, &[EventKind::RunEnded]);

    let entries = read_entries(&path).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries[0].parsed.is_ok());
    assert!(entries[1].parsed.is_err());
    assert_eq!(entries[1].raw_line, "not-json");
    assert!(entries[2].parsed.is_ok());
}

#[test]
fn unterminated_trailing_line_is_parse_failure() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    write_journal(&path, &[EventKind::RunStarted]);
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        // A torn write: valid JSON prefix, no newline.
        f.write_all(b"{\"type\":\"run.en").unwrap();
    }

    let entries = read_entries(&path).unwrap();
    assert_eq!(entries.len(), 2);
    let failure = entries[1].parsed.as_ref().unwrap_err();
    assert_eq!(failure.error, "unterminated trailing line");
    assert_eq!(entries[1].raw_line, "{\"type\":\"run.en");
}

#[test]
fn binary_garbage_is_parse_failure_not_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    std::fs::write(&path, b"\x80\x81\xff\n").unwrap();

    let entries = read_entries(&path).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].parsed.as_ref().unwrap_err().error.contains("invalid utf-8"));
}

#[test]
fn empty_lines_do_not_consume_seqs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    write_journal(&path, &[EventKind::RunStarted]);
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"\n\n").unwrap();
    }
    write_journal(&path, &[EventKind::RunEnded]);

    let entries = read_entries(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].seq, 2);
    assert_eq!(count_lines(&path).unwrap(), 2);
}

#[test]
fn entries_after_filters_by_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    write_journal(
        &path,
        &[EventKind::RunStarted, EventKind::RunExecuting, EventKind::ProviderRaw, EventKind::RunEnded],
    );

    let tail = read_entries_after(&path, 2).unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].seq, 3);
    assert_eq!(tail[1].seq, 4);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    assert!(read_entries(&dir.path().join("absent.jsonl")).is_err());
}
