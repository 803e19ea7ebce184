//! Tests for the WAL
//!
//! These tests verify:
//! - Writing batch records and LSN sequencing
//! - Reading records back with all their operations
//! - Recovery from clean, empty, torn and corrupted logs
//! - Verify mode (stats only, file untouched)
//! - Truncation and re-creation

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use kvshrink::batch::Operation;
use kvshrink::config::WalSyncStrategy;
use kvshrink::wal::{WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

fn del(key: &str) -> Operation {
    Operation::Delete {
        key: key.as_bytes().to_vec(),
    }
}

/// Write `count` single-put records through WalWriter
fn write_records(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(vec![put(&format!("key{}", i), &format!("value{}", i))], false)
            .unwrap();
    }
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_write_single_record() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let lsn = writer.append(vec![put("key1", "value1")], true).unwrap();

    assert_eq!(lsn, 1);
    assert_eq!(writer.current_lsn(), 2);
    assert_eq!(writer.len(), fs::metadata(&wal_path).unwrap().len());
}

#[test]
fn test_lsn_sequential() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let lsns: Vec<u64> = (0..5)
        .map(|i| writer.append(vec![put(&format!("k{}", i), "v")], false).unwrap())
        .collect();

    assert_eq!(lsns, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_reopen_continues_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    write_records(&wal_path, 3);

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 4);
    assert_eq!(writer.append(vec![del("key0")], true).unwrap(), 4);
}

#[test]
fn test_every_n_writes_strategy_still_writes_everything() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer =
            WalWriter::open(&wal_path, WalSyncStrategy::EveryNWrites { count: 3 }).unwrap();
        for i in 0..7 {
            writer.append(vec![put(&format!("k{}", i), "v")], false).unwrap();
        }
        writer.sync().unwrap();
    }

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 7);
    assert_eq!(result.last_lsn, 7);
}

#[test]
fn test_truncate_empties_log_and_keeps_lsn() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(vec![put("a", "1")], true).unwrap();
    writer.append(vec![put("b", "2")], true).unwrap();

    writer.truncate().unwrap();

    assert!(writer.is_empty());
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);
    assert_eq!(writer.append(vec![put("c", "3")], true).unwrap(), 3);
}

#[test]
fn test_create_discards_previous_content() {
    let (_temp, wal_path) = setup_temp_wal();
    write_records(&wal_path, 4);

    let writer = WalWriter::create(&wal_path, 10, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.current_lsn(), 10);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);
}

// =============================================================================
// Record Format / Reader Tests
// =============================================================================

#[test]
fn test_serialized_header_layout() {
    let entry = WalEntry::new(42, vec![put("k", "v")]);
    let bytes = entry.serialize().unwrap();

    assert!(bytes.len() > HEADER_SIZE);
    assert_eq!(&bytes[0..8], &42u64.to_le_bytes());

    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    assert_eq!(bytes.len(), HEADER_SIZE + len);
}

#[test]
fn test_reader_returns_whole_batches_in_order() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer
            .append(vec![put("a", "1"), put("b", "2"), del("c")], true)
            .unwrap();
        writer.append(vec![del("a")], true).unwrap();
    }

    let entries: Vec<WalEntry> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].lsn, 1);
    assert_eq!(
        entries[0].operations,
        vec![put("a", "1"), put("b", "2"), del("c")]
    );
    assert_eq!(entries[1].lsn, 2);
    assert_eq!(entries[1].operations, vec![del("a")]);
}

#[test]
fn test_reader_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 0);
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_clean_log() {
    let (_temp, wal_path) = setup_temp_wal();
    write_records(&wal_path, 5);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 5);
    assert_eq!(result.entries_recovered, 5);
    assert_eq!(result.last_lsn, 5);
    assert_eq!(result.valid_len, fs::metadata(&wal_path).unwrap().len());
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_torn_tail_is_truncated() {
    let (_temp, wal_path) = setup_temp_wal();
    write_records(&wal_path, 3);
    let clean_len = fs::metadata(&wal_path).unwrap().len();

    // Half a record, as left by a crash mid-append
    let partial = WalEntry::new(4, vec![put("torn", "write")]).serialize().unwrap();
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&partial[..partial.len() / 2]).unwrap();
    file.sync_all().unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), clean_len);
}

#[test]
fn test_recover_short_header() {
    let (_temp, wal_path) = setup_temp_wal();
    write_records(&wal_path, 2);

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[1, 2, 3]).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 2);
    assert!(result.was_truncated);
}

#[test]
fn test_recover_stops_at_crc_mismatch() {
    let (_temp, wal_path) = setup_temp_wal();

    let first = WalEntry::new(1, vec![put("a", "1")]).serialize().unwrap();
    let mut second = WalEntry::new(2, vec![put("b", "2")]).serialize().unwrap();
    let third = WalEntry::new(3, vec![put("c", "3")]).serialize().unwrap();

    // Flip a payload byte of the second record
    let last = second.len() - 1;
    second[last] ^= 0xFF;

    let mut file = File::create(&wal_path).unwrap();
    file.write_all(&first).unwrap();
    file.write_all(&second).unwrap();
    file.write_all(&third).unwrap();
    file.sync_all().unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 1);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 1);
    assert_eq!(
        fs::metadata(&wal_path).unwrap().len(),
        first.len() as u64
    );
}

#[test]
fn test_recover_rejects_out_of_order_lsn() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut file = File::create(&wal_path).unwrap();
    for lsn in [1u64, 2, 2, 3] {
        let bytes = WalEntry::new(lsn, vec![put("k", "v")]).serialize().unwrap();
        file.write_all(&bytes).unwrap();
    }
    file.sync_all().unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.last_lsn, 2);
    assert!(result.was_truncated);
}

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_records(&wal_path, 2);

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xAB; 7]).unwrap();
    file.sync_all().unwrap();
    let len_before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), len_before);
}

#[test]
fn test_writer_open_cuts_torn_tail_before_appending() {
    let (_temp, wal_path) = setup_temp_wal();
    write_records(&wal_path, 2);

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xCD; 5]).unwrap();
    drop(file);

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        assert_eq!(writer.append(vec![put("after", "tear")], true).unwrap(), 3);
    }

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(entries[2].operations, vec![put("after", "tear")]);
}
