// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Buffered append-only writer for a run's `events.jsonl`

use crate::bus::EventBus;
use ac_core::EventEnvelope;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Flush when this many records are buffered.
const FLUSH_RECORD_THRESHOLD: usize = 64;

/// Flush when the oldest buffered record is this old.
const FLUSH_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("journal serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl JournalError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), source }
    }
}

/// Single writer for one journal file.
///
/// One writer exists per journal at a time; callers must not open two
/// writers for the same path in one process. Appends are serialized in
/// insertion order and each record is one UTF-8 JSON line terminated by
/// `\n`, written with a single pre-composed `write` so a torn line can
/// only come from a crash mid-syscall, never from interleaving.
pub struct JournalWriter {
    path: PathBuf,
    file: BufWriter<File>,
    next_seq: u64,
    buffered: usize,
    oldest_buffered_at: Option<Instant>,
    bus: Option<EventBus>,
}

impl JournalWriter {
    /// Open (or create) the journal, seeding the sequence counter from the
    /// existing line count so appends continue after a restart.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| JournalError::io(&path, e))?;
        }
        let existing = if path.exists() { crate::reader::count_lines(&path)? } else { 0 };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| JournalError::io(&path, e))?;
        // A crash can leave a torn trailing line. Seal it with a newline so
        // it stays one parse-error seq and new appends land on fresh lines.
        let len = file
            .metadata()
            .map_err(|e| JournalError::io(&path, e))?
            .len();
        if len > 0 && !ends_with_newline(&path)? {
            file.write_all(b"\n").map_err(|e| JournalError::io(&path, e))?;
            file.sync_data().map_err(|e| JournalError::io(&path, e))?;
        }
        Ok(Self {
            path,
            file: BufWriter::new(file),
            next_seq: existing + 1,
            buffered: 0,
            oldest_buffered_at: None,
            bus: None,
        })
    }

    /// Attach a bus; `flush` publishes the journal path after durability.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number the next append will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Append one envelope. Returns its 1-based seq.
    ///
    /// Write errors propagate and are not retried; the caller decides
    /// whether the run can continue without its journal.
    pub fn append(&mut self, envelope: &EventEnvelope) -> Result<u64, JournalError> {
        let mut line = serde_json::to_string(envelope)?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .map_err(|e| JournalError::io(&self.path, e))?;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.buffered += 1;
        if self.oldest_buffered_at.is_none() {
            self.oldest_buffered_at = Some(Instant::now());
        }
        Ok(seq)
    }

    /// Append and immediately flush. Used for lifecycle events where
    /// consumers should react promptly.
    pub fn append_now(&mut self, envelope: &EventEnvelope) -> Result<u64, JournalError> {
        let seq = self.append(envelope)?;
        self.flush()?;
        Ok(seq)
    }

    /// True when buffered records should be flushed (count or age
    /// threshold reached).
    pub fn needs_flush(&self) -> bool {
        if self.buffered == 0 {
            return false;
        }
        self.buffered >= FLUSH_RECORD_THRESHOLD
            || self
                .oldest_buffered_at
                .is_some_and(|t| t.elapsed() >= FLUSH_INTERVAL)
    }

    /// Drain the buffer and make all bytes durable, then notify the bus.
    ///
    /// Bus publication is best-effort and happens only after the bytes are
    /// on disk; a lost notification is tolerated because the sync worker
    /// also retries on a timer.
    pub fn flush(&mut self) -> Result<(), JournalError> {
        self.file.flush().map_err(|e| JournalError::io(&self.path, e))?;
        self.file
            .get_ref()
            .sync_data()
            .map_err(|e| JournalError::io(&self.path, e))?;
        self.buffered = 0;
        self.oldest_buffered_at = None;
        if let Some(bus) = &self.bus {
            bus.publish(&self.path);
        }
        Ok(())
    }
}

fn ends_with_newline(path: &Path) -> Result<bool, JournalError> {
    use std::io::{Read, Seek, SeekFrom};
    let mut f = File::open(path).map_err(|e| JournalError::io(path, e))?;
    let len = f.metadata().map_err(|e| JournalError::io(path, e))?.len();
    if len == 0 {
        return Ok(true);
    }
    f.seek(SeekFrom::End(-1)).map_err(|e| JournalError::io(path, e))?;
    let mut last = [0u8; 1];
    f.read_exact(&mut last).map_err(|e| JournalError::io(path, e))?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
