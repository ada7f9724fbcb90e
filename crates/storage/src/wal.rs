// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log of store operations.
//!
//! One JSON object per line: `{"seq": N, "op": {...}}`. Sequence numbers
//! start at 1 and increase by one per append. A corrupt tail (torn write,
//! binary garbage) is moved aside to a `.bak` file on open and the valid
//! prefix is kept.

use crate::error::WalError;
use crate::state::StoreOp;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Number of `.bak` generations kept after corrupt opens
const MAX_BACKUPS: usize = 3;

/// Appends beyond this many buffered entries should be flushed
const FLUSH_THRESHOLD: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub op: StoreOp,
}

#[derive(Serialize)]
struct WalEntryRef<'a> {
    seq: u64,
    op: &'a StoreOp,
}

pub struct Wal {
    path: PathBuf,
    file: File,
    write_seq: u64,
    buffer: Vec<u8>,
    buffered: usize,
}

impl Wal {
    /// Open (or create) the log at `path`.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let mut write_seq = 0;
        if path.exists() {
            let (entries, corrupt) = read_valid(path)?;
            write_seq = entries.last().map(|e| e.seq).unwrap_or(0);
            if corrupt {
                tracing::warn!(
                    path = %path.display(),
                    valid_entries = entries.len(),
                    "corrupt wal tail, rotating to backup"
                );
                rotate_backups(path)?;
                let mut clean = File::create(path)?;
                for entry in &entries {
                    serde_json::to_writer(&mut clean, entry)?;
                    clean.write_all(b"\n")?;
                }
                clean.sync_all()?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { path: path.to_path_buf(), file, write_seq, buffer: Vec::new(), buffered: 0 })
    }

    /// Buffer one operation and return its sequence number.
    pub fn append(&mut self, op: &StoreOp) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        serde_json::to_writer(&mut self.buffer, &WalEntryRef { seq, op })?;
        self.buffer.push(b'\n');
        self.write_seq = seq;
        self.buffered += 1;
        Ok(seq)
    }

    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.file.write_all(&self.buffer)?;
        self.file.sync_data()?;
        self.buffer.clear();
        self.buffered = 0;
        Ok(())
    }

    pub fn needs_flush(&self) -> bool {
        self.buffered > FLUSH_THRESHOLD
    }

    /// Flushed entries with `seq > after`, stopping at the first corrupt line.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let (entries, _) = read_valid(&self.path)?;
        Ok(entries.into_iter().filter(|e| e.seq > after).collect())
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse lines up to the first one that fails. Returns whether anything
/// after the valid prefix was discarded.
fn read_valid(path: &Path) -> Result<(Vec<WalEntry>, bool), WalError> {
    let bytes = std::fs::read(path)?;
    let mut entries = Vec::new();
    for line in bytes.split(|b| *b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<WalEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(_) => return Ok((entries, true)),
        }
    }
    Ok((entries, false))
}

fn backup_path(path: &Path, generation: usize) -> PathBuf {
    match generation {
        1 => path.with_extension("bak"),
        n => path.with_extension(format!("bak.{n}")),
    }
}

/// Shift `.bak` -> `.bak.2` -> ... and move `path` to `.bak`.
fn rotate_backups(path: &Path) -> Result<(), WalError> {
    let oldest = backup_path(path, MAX_BACKUPS);
    if oldest.exists() {
        std::fs::remove_file(&oldest)?;
    }
    for generation in (1..MAX_BACKUPS).rev() {
        let from = backup_path(path, generation);
        if from.exists() {
            std::fs::rename(&from, backup_path(path, generation + 1))?;
        }
    }
    std::fs::rename(path, backup_path(path, 1))?;
    Ok(())
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
