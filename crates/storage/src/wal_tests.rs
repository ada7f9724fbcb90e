// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kiln_core::BuildId;
use std::io::Write;
use tempfile::tempdir;

fn tracked(tracker: &str) -> StoreOp {
    StoreOp::BuildTracked { id: BuildId::from_string("bld-1"), tracker: tracker.to_string() }
}

fn tracker_of(entry: &WalEntry) -> &str {
    match &entry.op {
        StoreOp::BuildTracked { tracker, .. } => tracker,
        other => panic!("unexpected op {other:?}"),
    }
}

#[test]
fn test_open_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("builds.wal");

    let wal = Wal::open(&path).unwrap();

    assert!(path.exists());
    assert_eq!(wal.write_seq(), 0);
}

#[test]
fn test_append_and_flush() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("builds.wal");

    let mut wal = Wal::open(&path).unwrap();

    assert_eq!(wal.append(&tracked("a")).unwrap(), 1);
    assert_eq!(wal.append(&tracked("b")).unwrap(), 2);

    // Nothing reaches disk before flush
    assert!(wal.entries_after(0).unwrap().is_empty());

    wal.flush().unwrap();
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(tracker_of(&entries[0]), "a");
    assert_eq!(tracker_of(&entries[1]), "b");
}

#[test]
fn test_entries_after() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("builds.wal");

    let mut wal = Wal::open(&path).unwrap();
    for name in ["a", "b", "c"] {
        wal.append(&tracked(name)).unwrap();
    }
    wal.flush().unwrap();

    let entries = wal.entries_after(1).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 2);
    assert_eq!(entries[1].seq, 3);
}

#[test]
fn test_reopen_continues_sequence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("builds.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&tracked("a")).unwrap();
        wal.append(&tracked("b")).unwrap();
        wal.flush().unwrap();
    }

    let mut wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 2);
    assert_eq!(wal.append(&tracked("c")).unwrap(), 3);
}

#[test]
fn test_needs_flush_threshold() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("builds.wal");

    let mut wal = Wal::open(&path).unwrap();
    assert!(!wal.needs_flush());

    for i in 0..=FLUSH_THRESHOLD {
        wal.append(&tracked(&format!("t{i}"))).unwrap();
    }
    assert!(wal.needs_flush());

    wal.flush().unwrap();
    assert!(!wal.needs_flush());
}

#[test]
fn test_open_corrupt_wal_creates_bak_and_preserves_valid_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("builds.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&tracked("a")).unwrap();
        wal.append(&tracked("b")).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"seq\":3,\"op\":{\"op\":\"build_tr").unwrap();
    }

    let wal = Wal::open(&path).unwrap();

    assert_eq!(wal.write_seq(), 2);
    assert!(path.with_extension("bak").exists());
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn test_open_corrupt_wal_rotates_bak_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("builds.wal");

    for i in 1..=4u8 {
        std::fs::write(&path, [i; 8]).unwrap();
        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.write_seq(), 0);
    }

    assert_eq!(std::fs::read(path.with_extension("bak")).unwrap(), vec![4u8; 8]);
    assert_eq!(std::fs::read(path.with_extension("bak.2")).unwrap(), vec![3u8; 8]);
    assert_eq!(std::fs::read(path.with_extension("bak.3")).unwrap(), vec![2u8; 8]);
    assert!(!path.with_extension("bak.4").exists());
}

#[test]
fn test_entries_after_stops_at_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("builds.wal");

    let mut wal = Wal::open(&path).unwrap();
    wal.append(&tracked("a")).unwrap();
    wal.flush().unwrap();
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"post-open-corruption\n").unwrap();
    }
    wal.append(&tracked("b")).unwrap();
    wal.flush().unwrap();

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(tracker_of(&entries[0]), "a");
}

#[test]
fn test_blank_lines_are_ignored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("builds.wal");

    let mut wal = Wal::open(&path).unwrap();
    wal.append(&tracked("a")).unwrap();
    wal.flush().unwrap();
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"\n\n").unwrap();
    }
    drop(wal);

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 1);
    assert!(!path.with_extension("bak").exists());
}
