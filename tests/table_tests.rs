//! Tests for Table
//!
//! These tests verify:
//! - Creating and reopening tables
//! - Pending buffer and duplicate key policy
//! - Append flushes and full rewrite flushes
//! - Failed opens and flushes, and retrying a failed flush
//! - Lazy reads through the offset index
//! - Read-only tables, deletion and tail repair on open
//! - Concurrent adds, flushes and reads

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use authzdb::datalog::{self, WriteOptions};
use authzdb::index;
use authzdb::{
    AuthzRecord, DbError, LoadStrategy, Record, SyncStrategy, Table, TableConfig, TableMode,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_table() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("users.db");
    (temp_dir, path)
}

fn test_config() -> TableConfig {
    TableConfig::builder().sync_strategy(SyncStrategy::Never).build()
}

fn open(path: &Path) -> Table<AuthzRecord> {
    Table::open_with_config(path, test_config()).unwrap()
}

fn open_read_only(path: &Path) -> authzdb::Result<Table<AuthzRecord>> {
    Table::open_with_config(path, TableConfig::builder().read_only(true).build())
}

fn index_path(path: &Path) -> PathBuf {
    test_config().index_path_for(path)
}

fn key(name: &str) -> String {
    name.to_string()
}

/// Write a data file with no index next to it
fn write_bare_data_file(path: &Path, names: &[&str]) -> Vec<(String, u64)> {
    let records: Vec<AuthzRecord> = names.iter().map(|n| AuthzRecord::create(n, "baz")).collect();
    let options = WriteOptions {
        sync: false,
        ..WriteOptions::default()
    };
    datalog::write_fresh(path, &records, options).unwrap().offsets
}

fn populated_table(path: &Path, names: &[&str]) -> Table<AuthzRecord> {
    let table = open(path);
    for name in names {
        table.add_record(AuthzRecord::create(name, "baz")).unwrap();
    }
    table.flush().unwrap();
    table
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

// =============================================================================
// Open/Create Tests
// =============================================================================

#[test]
fn test_open_creates_both_files() {
    let (_temp, path) = setup_temp_table();

    let table = open(&path);

    assert!(path.exists());
    assert!(index_path(&path).exists());
    assert!(table.files_exist());
    assert_eq!(table.mode(), TableMode::Indexed);
    assert_eq!(table.record_count(), 0);
    assert_eq!(table.data_size().unwrap(), 0);
    assert_eq!(table.index_path(), index_path(&path).as_path());
}

#[test]
fn test_open_creates_parent_dirs() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("dir").join("users.db");

    let table = open(&path);

    assert!(table.files_exist());
}

#[test]
fn test_open_under_a_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();

    let result = Table::<AuthzRecord>::open_with_config(blocker.join("sub").join("users.db"), test_config());

    assert!(matches!(result, Err(DbError::Storage { .. })));
}

#[test]
fn test_open_without_create_dirs_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing").join("users.db");
    let config = TableConfig::builder()
        .sync_strategy(SyncStrategy::Never)
        .create_dirs(false)
        .build();

    let result = Table::<AuthzRecord>::open_with_config(&path, config);

    assert!(matches!(result, Err(DbError::Storage { .. })));
    assert!(!path.exists());
}

#[test]
fn test_custom_index_extension() {
    let (_temp, path) = setup_temp_table();
    let config = TableConfig::builder()
        .sync_strategy(SyncStrategy::Never)
        .index_extension("offsets")
        .build();

    let table = Table::<AuthzRecord>::open_with_config(&path, config).unwrap();

    assert_eq!(table.index_path(), path.with_extension("db.offsets").as_path());
    assert!(table.index_path().exists());
}

#[test]
fn test_invalid_config_rejected() {
    let (_temp, path) = setup_temp_table();
    let config = TableConfig::builder().index_extension("").build();

    let result = Table::<AuthzRecord>::open_with_config(&path, config);

    assert!(matches!(result, Err(DbError::Config(_))));
    assert!(!path.exists());
}

#[test]
fn test_stale_index_is_reset() {
    let (_temp, path) = setup_temp_table();
    drop(populated_table(&path, &["andrew", "dean"]));
    fs::remove_file(&path).unwrap();

    let table = open(&path);

    assert_eq!(table.index_size(), 0);
    assert_eq!(fs::metadata(index_path(&path)).unwrap().len(), 0);
    assert!(table.get_record_lazily(&key("andrew")).unwrap().is_none());
}

// =============================================================================
// Pending Buffer Tests
// =============================================================================

#[test]
fn test_add_then_get_pending() {
    let (_temp, path) = setup_temp_table();
    let table = open(&path);
    let record = AuthzRecord::create("andrew", "bar");

    table.add_record(record.clone()).unwrap();

    assert_eq!(table.get_record(&key("andrew")), Some(record.clone()));
    assert_eq!(table.get_record_lazily(&key("andrew")).unwrap(), Some(record));
    assert_eq!(table.pending_count(), 1);
    assert_eq!(table.record_count(), 1);
    assert_eq!(table.data_size().unwrap(), 0);
}

#[test]
fn test_get_missing_key() {
    let (_temp, path) = setup_temp_table();
    let table = populated_table(&path, &["andrew"]);

    assert!(table.get_record(&key("nobody")).is_none());
    assert!(table.get_record_lazily(&key("nobody")).unwrap().is_none());
}

#[test]
fn test_duplicate_pending_key_rejected() {
    let (_temp, path) = setup_temp_table();
    let table = open(&path);
    table.add_record(AuthzRecord::create("andrew", "bar")).unwrap();

    let result = table.add_record(AuthzRecord::create("andrew", "other"));

    assert!(matches!(result, Err(DbError::DuplicateKey(_))));
    assert_eq!(
        table.get_record(&key("andrew")).unwrap().password_hash(),
        AuthzRecord::create("andrew", "bar").password_hash()
    );
}

#[test]
fn test_duplicate_persisted_key_rejected() {
    let (_temp, path) = setup_temp_table();
    drop(populated_table(&path, &["andrew"]));

    let table = open(&path);
    let result = table.add_record(AuthzRecord::create("andrew", "other"));

    assert!(matches!(result, Err(DbError::DuplicateKey(_))));
    assert_eq!(table.pending_count(), 0);
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_moves_pending_to_index() {
    let (_temp, path) = setup_temp_table();
    let table = open(&path);
    let records = [AuthzRecord::create("andrew", "bar"), AuthzRecord::create("nicholas", "bar")];
    for record in &records {
        table.add_record(record.clone()).unwrap();
    }

    let stats = table.flush().unwrap();

    let expected: u64 = records.iter().map(|r| 4 + r.encoded_len() as u64).sum();
    assert_eq!(stats.records, 2);
    assert_eq!(stats.bytes_written, expected);
    assert_eq!(stats.data_size, expected);
    assert!(!stats.rewrote);
    assert_eq!(table.pending_count(), 0);
    assert_eq!(table.index_size(), 2);
    assert_eq!(table.record_count(), 2);
    assert_eq!(table.data_size().unwrap(), expected);
    assert!(table.get_record(&key("andrew")).is_none());
}

#[test]
fn test_flush_with_nothing_pending() {
    let (_temp, path) = setup_temp_table();
    let table = populated_table(&path, &["andrew"]);
    let size = table.data_size().unwrap();

    let stats = table.flush().unwrap();

    assert_eq!(stats.records, 0);
    assert_eq!(stats.bytes_written, 0);
    assert_eq!(stats.data_size, size);
    assert_eq!(table.data_size().unwrap(), size);
}

#[test]
fn test_failed_flush_keeps_pending() {
    let (_temp, path) = setup_temp_table();
    let table = open(&path);
    table.add_record(AuthzRecord::create("andrew", "bar")).unwrap();
    fs::remove_file(&path).unwrap();

    let result = table.flush();

    assert!(matches!(result, Err(DbError::Storage { .. })));
    assert_eq!(table.pending_count(), 1);
    assert_eq!(table.index_size(), 0);
    assert!(table.get_record(&key("andrew")).is_some());

    // Once the file is back the same records go out exactly once
    fs::File::create(&path).unwrap();
    let stats = table.flush().unwrap();
    assert_eq!(stats.records, 1);
    assert_eq!(table.pending_count(), 0);

    let on_disk: Vec<_> = datalog::read_all::<AuthzRecord>(&path).unwrap().collect();
    assert_eq!(on_disk.len(), 1);
}

#[test]
fn test_failed_index_append_rolls_back_data() {
    let (_temp, path) = setup_temp_table();
    let table = open(&path);
    table.add_record(AuthzRecord::create("andrew", "bar")).unwrap();
    table.add_record(AuthzRecord::create("dean", "ruby")).unwrap();
    fs::remove_file(index_path(&path)).unwrap();

    let result = table.flush();

    assert!(matches!(result, Err(DbError::Storage { .. })));
    assert_eq!(table.data_size().unwrap(), 0);
    assert_eq!(table.pending_count(), 2);
    assert_eq!(table.index_size(), 0);

    fs::File::create(index_path(&path)).unwrap();
    let stats = table.flush().unwrap();
    assert_eq!(stats.records, 2);
    assert_eq!(table.data_size().unwrap(), stats.bytes_written);
    drop(table);

    let on_disk: Vec<String> = datalog::read_all::<AuthzRecord>(&path)
        .unwrap()
        .map(|r| r.unwrap().0.key())
        .collect();
    assert_eq!(on_disk, vec!["andrew", "dean"]);

    let reopened = open(&path);
    assert_eq!(reopened.index_size(), 2);
    assert!(reopened.get_record_lazily(&key("dean")).unwrap().is_some());
}

#[test]
fn test_successive_flushes_append() {
    let (_temp, path) = setup_temp_table();
    let table = populated_table(&path, &["andrew", "nicholas"]);
    let first_size = table.data_size().unwrap();

    table.add_record(AuthzRecord::create("michael", "baz")).unwrap();
    let stats = table.flush().unwrap();

    assert_eq!(stats.data_size, first_size + stats.bytes_written);
    assert_eq!(index::read_index::<String>(&index_path(&path)).unwrap().len(), 3);
}

// =============================================================================
// Lazy Read Tests
// =============================================================================

#[test]
fn test_reopen_reads_lazily() {
    let (_temp, path) = setup_temp_table();
    drop(populated_table(&path, &["andrew", "nicholas", "michael"]));

    let table = open(&path);

    assert_eq!(table.mode(), TableMode::Indexed);
    assert_eq!(table.index_size(), 3);
    assert_eq!(table.pending_count(), 0);
    assert_eq!(table.cached_count(), 0);
    assert!(table.get_record(&key("andrew")).is_none());

    let record = table.get_record_lazily(&key("nicholas")).unwrap().unwrap();
    assert_eq!(record, AuthzRecord::create("nicholas", "baz"));
    assert_eq!(table.cached_count(), 1);

    // Cached lookups do not grow the cache
    table.get_record_lazily(&key("nicholas")).unwrap();
    assert_eq!(table.cached_count(), 1);
}

#[test]
fn test_lazy_read_sees_pending_and_persisted() {
    let (_temp, path) = setup_temp_table();
    let table = populated_table(&path, &["andrew"]);
    table.add_record(AuthzRecord::create("dean", "baz")).unwrap();

    assert!(table.get_record_lazily(&key("andrew")).unwrap().is_some());
    assert!(table.get_record_lazily(&key("dean")).unwrap().is_some());
    assert_eq!(table.cached_count(), 1);
}

#[test]
fn test_index_pointing_at_other_key() {
    let (_temp, path) = setup_temp_table();
    let offsets = write_bare_data_file(&path, &["andrew", "dean"]);
    let dean_offset = offsets[1].1;

    let andrew = key("andrew");
    let dean = key("dean");
    let wrong = [(&andrew, dean_offset), (&dean, dean_offset)];
    index::write_index(&index_path(&path), wrong, WriteOptions::default()).unwrap();

    let table = open(&path);

    let result = table.get_record_lazily(&andrew);
    assert!(matches!(result, Err(DbError::RecordNotFound { offset }) if offset == dean_offset));
    assert!(table.get_record_lazily(&dean).unwrap().is_some());
}

#[test]
fn test_index_pointing_past_end() {
    let (_temp, path) = setup_temp_table();
    write_bare_data_file(&path, &["andrew"]);

    let andrew = key("andrew");
    index::write_index(&index_path(&path), [(&andrew, 9_999)], WriteOptions::default()).unwrap();

    let table = open(&path);

    assert!(matches!(
        table.get_record_lazily(&andrew),
        Err(DbError::RecordNotFound { offset: 9_999 })
    ));
}

#[test]
fn test_scan_yields_persisted_records() {
    let (_temp, path) = setup_temp_table();
    let table = populated_table(&path, &["andrew", "nicholas"]);
    table.add_record(AuthzRecord::create("dean", "baz")).unwrap();

    let names: Vec<String> = table.scan().unwrap().map(|r| r.unwrap().0.key()).collect();

    assert_eq!(names, vec!["andrew", "nicholas"]);
}

// =============================================================================
// Eager Mode Tests
// =============================================================================

#[test]
fn test_data_without_index_loads_eagerly() {
    let (_temp, path) = setup_temp_table();
    write_bare_data_file(&path, &["andrew", "nicholas"]);

    let table = open(&path);

    assert_eq!(table.mode(), TableMode::Eager);
    assert_eq!(table.pending_count(), 2);
    assert_eq!(table.record_count(), 2);
    assert!(table.get_record(&key("andrew")).is_some());
    assert!(table.get_record_lazily(&key("nicholas")).unwrap().is_some());
    assert!(!index_path(&path).exists());
}

#[test]
fn test_eager_flush_rewrites_and_indexes() {
    let (_temp, path) = setup_temp_table();
    write_bare_data_file(&path, &["andrew", "nicholas"]);

    let table = open(&path);
    table.add_record(AuthzRecord::create("dean", "baz")).unwrap();
    let stats = table.flush().unwrap();

    assert!(stats.rewrote);
    assert_eq!(stats.records, 3);
    assert_eq!(table.mode(), TableMode::Indexed);
    assert_eq!(table.pending_count(), 0);
    assert_eq!(table.index_size(), 3);
    assert_eq!(index::read_index::<String>(&index_path(&path)).unwrap().len(), 3);

    for name in ["andrew", "nicholas", "dean"] {
        assert_eq!(
            table.get_record_lazily(&key(name)).unwrap(),
            Some(AuthzRecord::create(name, "baz"))
        );
    }

    // Next flush appends
    table.add_record(AuthzRecord::create("michael", "baz")).unwrap();
    assert!(!table.flush().unwrap().rewrote);
}

#[test]
fn test_eager_duplicate_rejected() {
    let (_temp, path) = setup_temp_table();
    write_bare_data_file(&path, &["andrew"]);

    let table = open(&path);

    assert!(matches!(
        table.add_record(AuthzRecord::create("andrew", "x")),
        Err(DbError::DuplicateKey(_))
    ));
}

#[test]
fn test_eager_flush_drops_incomplete_tail() {
    let (_temp, path) = setup_temp_table();
    write_bare_data_file(&path, &["andrew"]);
    let clean_size = fs::metadata(&path).unwrap().len();
    append_raw(&path, &[0, 0, 0, 40, 1, 2]);

    let table = open(&path);
    assert_eq!(table.mode(), TableMode::Eager);
    let stats = table.flush().unwrap();

    assert!(stats.rewrote);
    assert_eq!(table.data_size().unwrap(), clean_size);
}

#[test]
fn test_empty_data_without_index_starts_indexed() {
    let (_temp, path) = setup_temp_table();
    fs::File::create(&path).unwrap();

    let table = open(&path);

    assert_eq!(table.mode(), TableMode::Indexed);
    assert!(index_path(&path).exists());
}

#[test]
fn test_rebuild_index_strategy() {
    let (_temp, path) = setup_temp_table();
    let offsets = write_bare_data_file(&path, &["andrew", "nicholas", "dean"]);
    let config = TableConfig::builder()
        .sync_strategy(SyncStrategy::Never)
        .load_strategy(LoadStrategy::RebuildIndex)
        .build();

    let table = Table::<AuthzRecord>::open_with_config(&path, config).unwrap();

    assert_eq!(table.mode(), TableMode::Indexed);
    assert_eq!(table.pending_count(), 0);
    assert_eq!(table.index_size(), 3);
    assert_eq!(index::read_index::<String>(&index_path(&path)).unwrap().len(), offsets.len());
    assert!(table.get_record_lazily(&key("dean")).unwrap().is_some());
}

// =============================================================================
// Tail Repair Tests
// =============================================================================

#[test]
fn test_open_truncates_unindexed_frames() {
    let (_temp, path) = setup_temp_table();
    let committed = populated_table(&path, &["andrew"]).data_size().unwrap();

    // A flush that died between the data append and the index append
    let orphan = [AuthzRecord::create("dean", "baz")];
    let options = WriteOptions {
        sync: false,
        ..WriteOptions::default()
    };
    datalog::append_records(&path, &orphan, options).unwrap();
    // Key length and one byte of an index entry
    append_raw(&index_path(&path), &[0, 0, 0, 4, b'd']);

    let table = open(&path);

    assert_eq!(table.data_size().unwrap(), committed);
    assert_eq!(table.index_size(), 1);
    assert!(table.get_record_lazily(&key("dean")).unwrap().is_none());

    // The key is free again
    table.add_record(AuthzRecord::create("dean", "baz")).unwrap();
    table.flush().unwrap();
    assert!(table.get_record_lazily(&key("dean")).unwrap().is_some());
}

#[test]
fn test_open_without_repair_leaves_tail() {
    let (_temp, path) = setup_temp_table();
    let committed = populated_table(&path, &["andrew"]).data_size().unwrap();
    append_raw(&path, &[9, 9, 9]);

    let config = TableConfig::builder()
        .sync_strategy(SyncStrategy::Never)
        .repair_tail(false)
        .build();
    let table = Table::<AuthzRecord>::open_with_config(&path, config).unwrap();

    assert_eq!(table.data_size().unwrap(), committed + 3);
    assert!(table.get_record_lazily(&key("andrew")).unwrap().is_some());
}

// =============================================================================
// Read-Only Tests
// =============================================================================

#[test]
fn test_read_only_rejects_writes() {
    let (_temp, path) = setup_temp_table();
    drop(populated_table(&path, &["andrew"]));

    let table = open_read_only(&path).unwrap();

    assert!(matches!(
        table.add_record(AuthzRecord::create("dean", "baz")),
        Err(DbError::ReadOnly)
    ));
    assert!(table.get_record_lazily(&key("andrew")).unwrap().is_some());
    assert!(matches!(table.delete(), Err(DbError::ReadOnly)));
    assert!(path.exists());
}

#[test]
fn test_read_only_missing_table() {
    let (_temp, path) = setup_temp_table();

    let result = open_read_only(&path);

    assert!(matches!(result, Err(DbError::Storage { .. })));
    assert!(!path.exists());
}

#[test]
fn test_read_only_never_writes_index() {
    let (_temp, path) = setup_temp_table();
    write_bare_data_file(&path, &["andrew"]);

    let table = open_read_only(&path).unwrap();

    assert_eq!(table.mode(), TableMode::Eager);
    assert!(table.get_record_lazily(&key("andrew")).unwrap().is_some());
    assert!(!index_path(&path).exists());
}

#[test]
fn test_read_only_flush_leaves_files_alone() {
    let (_temp, path) = setup_temp_table();
    write_bare_data_file(&path, &["andrew", "dean"]);
    let before = fs::read(&path).unwrap();

    let table = open_read_only(&path).unwrap();
    assert_eq!(table.mode(), TableMode::Eager);

    assert!(matches!(table.flush(), Err(DbError::ReadOnly)));
    assert_eq!(table.mode(), TableMode::Eager);
    assert_eq!(table.pending_count(), 2);
    assert!(!index_path(&path).exists());
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_read_only_indexed_flush_rejected() {
    let (_temp, path) = setup_temp_table();
    drop(populated_table(&path, &["andrew"]));
    let data_before = fs::read(&path).unwrap();
    let index_before = fs::read(index_path(&path)).unwrap();

    let table = open_read_only(&path).unwrap();

    assert!(matches!(table.flush(), Err(DbError::ReadOnly)));
    assert_eq!(fs::read(&path).unwrap(), data_before);
    assert_eq!(fs::read(index_path(&path)).unwrap(), index_before);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_removes_files() {
    let (_temp, path) = setup_temp_table();
    let table = populated_table(&path, &["andrew"]);

    table.delete().unwrap();

    assert!(!path.exists());
    assert!(!index_path(&path).exists());
}

#[test]
fn test_delete_without_index() {
    let (_temp, path) = setup_temp_table();
    let table = populated_table(&path, &["andrew"]);
    fs::remove_file(index_path(&path)).unwrap();

    table.delete().unwrap();

    assert!(!path.exists());
}

#[test]
fn test_delete_missing_data_file_fails() {
    let (_temp, path) = setup_temp_table();
    let table = open(&path);
    fs::remove_file(&path).unwrap();

    assert!(matches!(table.delete(), Err(DbError::Storage { .. })));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_adds_and_flushes() {
    let (_temp, path) = setup_temp_table();
    let table = open(&path);

    crossbeam::scope(|s| {
        for t in 0..4 {
            let table = &table;
            s.spawn(move |_| {
                for i in 0..50 {
                    let name = format!("user-{}-{}", t, i);
                    table.add_record(AuthzRecord::create(&name, "pw")).unwrap();
                    if i % 10 == 9 {
                        table.flush().unwrap();
                    }
                }
            });
        }
    })
    .unwrap();
    table.flush().unwrap();

    assert_eq!(table.index_size(), 200);
    assert_eq!(table.pending_count(), 0);
    drop(table);

    let reopened = open(&path);
    assert_eq!(reopened.index_size(), 200);
    for t in 0..4 {
        for i in 0..50 {
            let name = format!("user-{}-{}", t, i);
            assert_eq!(reopened.get_record_lazily(&name).unwrap().unwrap().username(), name);
        }
    }
}

#[test]
fn test_concurrent_duplicate_adds() {
    let (_temp, path) = setup_temp_table();
    let table = open(&path);

    let results: Vec<bool> = crossbeam::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = &table;
                s.spawn(move |_| table.add_record(AuthzRecord::create("andrew", "bar")).is_ok())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(table.pending_count(), 1);
}

#[test]
fn test_reads_during_flushes_never_miss() {
    let (_temp, path) = setup_temp_table();
    let table = populated_table(&path, &["andrew", "nicholas"]);

    crossbeam::scope(|s| {
        let writer = &table;
        s.spawn(move |_| {
            for i in 0..100 {
                writer
                    .add_record(AuthzRecord::create(&format!("bulk{}", i), "pw"))
                    .unwrap();
                writer.flush().unwrap();
            }
        });

        for _ in 0..3 {
            let reader = &table;
            s.spawn(move |_| {
                for _ in 0..200 {
                    assert!(reader.get_record_lazily(&key("andrew")).unwrap().is_some());
                    assert!(reader.get_record_lazily(&key("nicholas")).unwrap().is_some());
                }
            });
        }
    })
    .unwrap();

    assert_eq!(table.index_size(), 102);
}

#[test]
fn test_reads_during_eager_rewrite() {
    let (_temp, path) = setup_temp_table();
    let names: Vec<String> = (0..50).map(|i| format!("user{:02}", i)).collect();
    let refs: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
    write_bare_data_file(&path, &refs);

    let table = open(&path);
    assert_eq!(table.mode(), TableMode::Eager);

    crossbeam::scope(|s| {
        let writer = &table;
        s.spawn(move |_| {
            writer.add_record(AuthzRecord::create("late", "pw")).unwrap();
            writer.flush().unwrap();
        });

        let reader = &table;
        let names = &names;
        s.spawn(move |_| {
            for name in names {
                assert_eq!(reader.get_record_lazily(name).unwrap().unwrap().username(), name);
            }
        });
    })
    .unwrap();

    assert_eq!(table.mode(), TableMode::Indexed);
    assert_eq!(table.index_size(), 51);
}
