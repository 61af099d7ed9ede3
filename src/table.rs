//! Table Module
//!
//! A keyed record store over one data file and one index file.
//!
//! ## Responsibilities
//! - Create or open the data/index pair for a record type
//! - Buffer added records until flush
//! - Flush by appending to both files, or by a full atomic rewrite when the
//!   table was loaded from a data file that had no index
//! - Point lookups that fault records in from disk on demand
//!
//! ## Open Modes
//! ```text
//!   data? index?
//!   ──────────────────────────────────────────────────────────────
//!    no    no     create both empty                   → Indexed
//!    yes   no     scan everything into memory         → Eager
//!                 (or rebuild the index from key peeks → Indexed)
//!    yes   yes    load the index only                 → Indexed
//!    no    yes    stale index, reset both             → Indexed
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::config::{LoadStrategy, TableConfig};
use crate::datalog::{self, parent_dir, truncate_file, DataReader, TailStatus, WriteOptions};
use crate::error::{DbError, Result};
use crate::index;
use crate::record::{KeyCodec, Record};

/// How the table persists its next flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    /// Every record is held in memory; the next flush rewrites the data file
    /// and writes a fresh index
    Eager,

    /// Backed by an index; flushes append to both files
    Indexed,
}

impl fmt::Display for TableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableMode::Eager => f.write_str("eager"),
            TableMode::Indexed => f.write_str("indexed"),
        }
    }
}

/// Outcome of a flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Records written
    pub records: usize,
    /// Bytes written to the data file
    pub bytes_written: u64,
    /// Data file size afterwards
    pub data_size: u64,
    /// Whether the data file was rewritten rather than appended to
    pub rewrote: bool,
}

/// A table of `R` records keyed by `R::Key`
///
/// ## Concurrency:
/// - `pending`, `offsets`, `cache`: each behind its own RwLock
/// - `flush_lock`: at most one flush in flight; adds during a flush land in
///   the next one
/// - `io_lock`: lazy reads hold it shared; replacing the data file holds it
///   exclusive so no read pairs a stale offset with a new file
/// - Lock order: flush_lock → io_lock → pending → offsets → cache
/// - All methods use `&self` except `delete`, which consumes the table
pub struct Table<R: Record> {
    data_path: PathBuf,
    index_path: PathBuf,
    config: TableConfig,

    /// Added since the last flush
    pending: RwLock<BTreeMap<R::Key, R>>,

    /// Frame offsets of persisted records
    offsets: RwLock<HashMap<R::Key, u64>>,

    /// Records faulted in by lazy reads (never evicted)
    cache: RwLock<HashMap<R::Key, R>>,

    mode: RwLock<TableMode>,
    flush_lock: Mutex<()>,
    io_lock: RwLock<()>,
}

impl<R: Record> Table<R> {
    /// Open or create a table at `path` with the default config
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, TableConfig::default())
    }

    /// Open or create a table at `path`
    ///
    /// The index lives at `{path}.{index_extension}`.
    pub fn open_with_config(path: impl AsRef<Path>, config: TableConfig) -> Result<Self> {
        config.validate()?;

        let data_path = path.as_ref().to_path_buf();
        let index_path = config.index_path_for(&data_path);

        if config.create_dirs && !config.read_only {
            let dir = parent_dir(&data_path);
            fs::create_dir_all(dir).map_err(|e| DbError::storage(dir, e))?;
        }

        let data_exists = data_path.exists();
        let index_exists = index_path.exists();

        let mut table = Self {
            data_path,
            index_path,
            config,
            pending: RwLock::new(BTreeMap::new()),
            offsets: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            mode: RwLock::new(TableMode::Indexed),
            flush_lock: Mutex::new(()),
            io_lock: RwLock::new(()),
        };

        match (data_exists, index_exists) {
            (false, false) => table.create_files()?,
            (false, true) => table.reset_stale_index()?,
            (true, false) => match table.config.load_strategy {
                LoadStrategy::Eager => table.load_eager()?,
                LoadStrategy::RebuildIndex => table.load_rebuilt()?,
            },
            (true, true) => table.load_indexed()?,
        }

        tracing::info!(
            "Opened {} table {} ({} mode, {} records, {} keys)",
            R::KIND,
            table.data_path.display(),
            table.mode(),
            table.record_count(),
            <R::Key as KeyCodec>::KIND
        );

        Ok(table)
    }

    // =========================================================================
    // Open Helpers
    // =========================================================================

    fn create_files(&mut self) -> Result<()> {
        if self.config.read_only {
            return Err(DbError::storage(
                &self.data_path,
                io::Error::new(io::ErrorKind::NotFound, "data file does not exist"),
            ));
        }

        for path in [&self.data_path, &self.index_path] {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|e| DbError::storage(path, e))?;
        }
        *self.mode.get_mut() = TableMode::Indexed;
        Ok(())
    }

    /// Index without data: the offsets point nowhere
    fn reset_stale_index(&mut self) -> Result<()> {
        if self.config.read_only {
            return Err(DbError::storage(
                &self.data_path,
                io::Error::new(io::ErrorKind::NotFound, "index exists but data file does not"),
            ));
        }

        tracing::warn!(
            "Index {} has no data file, resetting both",
            self.index_path.display()
        );
        fs::File::create(&self.index_path).map_err(|e| DbError::storage(&self.index_path, e))?;
        self.create_files()
    }

    /// Materialize the whole data file
    fn load_eager(&mut self) -> Result<()> {
        let mut reader: DataReader<R> = datalog::read_all(&self.data_path)?;

        let pending = self.pending.get_mut();
        let offsets = self.offsets.get_mut();
        for item in reader.by_ref() {
            let (record, offset) = item?;
            let key = record.key();
            offsets.insert(key.clone(), offset);
            pending.insert(key, record);
        }

        let truncated = reader.was_truncated();
        if truncated {
            tracing::warn!(
                "Data file {} ends with an incomplete frame after offset {}; it is dropped on the next flush",
                self.data_path.display(),
                reader.position()
            );
        }

        if pending.is_empty() && !truncated && !self.config.read_only {
            // Nothing to rewrite, so start indexed right away
            index::write_index::<R::Key, _>(&self.index_path, std::iter::empty(), self.write_options())?;
            *self.mode.get_mut() = TableMode::Indexed;
        } else {
            *self.mode.get_mut() = TableMode::Eager;
        }
        Ok(())
    }

    /// Build an index from key peeks, then open lazily
    fn load_rebuilt(&mut self) -> Result<()> {
        if !self.config.read_only {
            index::rebuild_index::<R>(&self.data_path, &self.index_path, self.config.sync_strategy.should_sync())?;
            return self.load_indexed();
        }

        // Read-only: keep the rebuilt offsets in memory
        let offsets = self.offsets.get_mut();
        for item in datalog::scan_keys::<R>(&self.data_path)? {
            let (key, offset) = item?;
            offsets.insert(key, offset);
        }
        *self.mode.get_mut() = TableMode::Indexed;
        Ok(())
    }

    /// Load the index and drop anything a crashed flush left behind
    fn load_indexed(&mut self) -> Result<()> {
        let contents = index::load_index::<R::Key>(&self.index_path)?;
        let repair = self.config.repair_tail && !self.config.read_only;

        if contents.was_truncated() {
            let trailing = contents.file_len - contents.valid_len;
            if repair {
                truncate_file(&self.index_path, contents.valid_len)?;
                tracing::warn!(
                    "Truncated {} incomplete trailing bytes from index {}",
                    trailing,
                    self.index_path.display()
                );
            } else {
                tracing::warn!(
                    "Index {} has {} incomplete trailing bytes",
                    self.index_path.display(),
                    trailing
                );
            }
        }

        match datalog::repair_tail(&self.data_path, contents.max_offset(), repair)? {
            TailStatus::Clean => {}
            TailStatus::Truncated { removed } => tracing::warn!(
                "Truncated {} uncommitted bytes from data file {}",
                removed,
                self.data_path.display()
            ),
            TailStatus::Dirty { uncommitted } => tracing::warn!(
                "Data file {} has {} uncommitted trailing bytes",
                self.data_path.display(),
                uncommitted
            ),
            TailStatus::Unverifiable { offset } => tracing::warn!(
                "Index {} points at offset {} which holds no complete frame",
                self.index_path.display(),
                offset
            ),
        }

        *self.offsets.get_mut() = contents.entries;
        *self.mode.get_mut() = TableMode::Indexed;
        Ok(())
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            sync: self.config.sync_strategy.should_sync(),
            buffer_size: self.config.write_buffer_size,
        }
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Add a record to the pending buffer.
    ///
    /// Keys already persisted or pending are rejected with `DuplicateKey`;
    /// adds never overwrite.
    pub fn add_record(&self, record: R) -> Result<()> {
        if self.config.read_only {
            return Err(DbError::ReadOnly);
        }

        let key = record.key();
        let mut pending = self.pending.write();
        if pending.contains_key(&key) || self.offsets.read().contains_key(&key) {
            return Err(DbError::DuplicateKey(format!("{:?}", key)));
        }
        pending.insert(key, record);
        Ok(())
    }

    /// A record added since the last flush
    pub fn get_record(&self, key: &R::Key) -> Option<R> {
        self.pending.read().get(key).cloned()
    }

    /// Look up a record anywhere: cache, then disk via the offset index, then
    /// the pending buffer
    pub fn get_record_lazily(&self, key: &R::Key) -> Result<Option<R>> {
        if let Some(record) = self.cache.read().get(key) {
            return Ok(Some(record.clone()));
        }

        let _io = self.io_lock.read();

        // Snapshot both maps together so a concurrent flush moving the key
        // from pending to offsets cannot hide it
        let (offset, unflushed) = {
            let pending = self.pending.read();
            match self.offsets.read().get(key) {
                Some(&offset) => (Some(offset), None),
                None => (None, pending.get(key).cloned()),
            }
        };

        let offset = match offset {
            Some(offset) => offset,
            None => return Ok(unflushed),
        };

        let record: R = datalog::read_at(&self.data_path, offset)?;
        if record.key() != *key {
            tracing::warn!(
                "Index entry for {:?} points at a frame keyed {:?}",
                key,
                record.key()
            );
            return Err(DbError::RecordNotFound { offset });
        }

        self.cache.write().insert(key.clone(), record.clone());
        Ok(Some(record))
    }

    /// Iterate every persisted record straight from the data file
    pub fn scan(&self) -> Result<DataReader<R>> {
        datalog::read_all(&self.data_path)
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Persist everything pending
    ///
    /// Safe to call with nothing pending. On error the pending records stay
    /// in memory and the next flush retries them. Read-only tables always
    /// fail with `ReadOnly`, even when loaded eagerly.
    pub fn flush(&self) -> Result<FlushStats> {
        if self.config.read_only {
            return Err(DbError::ReadOnly);
        }

        let _flush_guard = self.flush_lock.lock();

        let batch: Vec<R> = self.pending.read().values().cloned().collect();
        if batch.is_empty() {
            tracing::debug!("Flush of {} skipped, nothing pending", self.data_path.display());
            return Ok(FlushStats {
                data_size: self.data_size()?,
                ..FlushStats::default()
            });
        }

        let mode = *self.mode.read();
        let stats = match mode {
            TableMode::Indexed => self.flush_append(&batch)?,
            TableMode::Eager => {
                let stats = self.flush_rewrite(&batch)?;
                *self.mode.write() = TableMode::Indexed;
                stats
            }
        };

        tracing::debug!(
            "Flushed {} records ({} bytes, rewrite={}) to {}",
            stats.records,
            stats.bytes_written,
            stats.rewrote,
            self.data_path.display()
        );
        Ok(stats)
    }

    /// Append the batch to the data file, then its offsets to the index
    fn flush_append(&self, batch: &[R]) -> Result<FlushStats> {
        let options = self.write_options();
        let appended = datalog::append_records(&self.data_path, batch, options)?;

        let indexed = index::append_index(
            &self.index_path,
            appended.offsets.iter().map(|(key, offset)| (key, *offset)),
            options,
        );
        if let Err(e) = indexed {
            // Frames without index entries are uncommitted
            let start = appended.end_offset - appended.bytes_written;
            if let Err(cleanup) = truncate_file(&self.data_path, start) {
                tracing::warn!(
                    "Failed to roll back unindexed frames in {}: {}",
                    self.data_path.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        let stats = FlushStats {
            records: appended.offsets.len(),
            bytes_written: appended.bytes_written,
            data_size: appended.end_offset,
            rewrote: false,
        };
        self.publish(appended.offsets);
        Ok(stats)
    }

    /// Rewrite the whole data file through a temp file, then write a fresh index
    fn flush_rewrite(&self, batch: &[R]) -> Result<FlushStats> {
        let options = self.write_options();
        let staged = datalog::stage_fresh(&self.data_path, batch, options)?;

        let written = {
            let _io = self.io_lock.write();
            let written = staged.commit(&self.data_path)?;
            // Old offsets are meaningless against the new file
            *self.offsets.write() = written.offsets.iter().cloned().collect();
            written
        };

        // If this fails the data is safe and pending still holds every
        // record, so the next flush rewrites again
        index::write_index(
            &self.index_path,
            written.offsets.iter().map(|(key, offset)| (key, *offset)),
            options,
        )?;

        let stats = FlushStats {
            records: written.offsets.len(),
            bytes_written: written.bytes_written,
            data_size: written.end_offset,
            rewrote: true,
        };
        self.publish(written.offsets);
        Ok(stats)
    }

    /// Move flushed keys from pending into the offset map
    fn publish(&self, flushed: Vec<(R::Key, u64)>) {
        let mut pending = self.pending.write();
        let mut offsets = self.offsets.write();
        for (key, offset) in flushed {
            pending.remove(&key);
            offsets.insert(key, offset);
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Remove the data file and the index file
    ///
    /// Failing to remove either file is an error; a missing index is not.
    pub fn delete(self) -> Result<()> {
        if self.config.read_only {
            return Err(DbError::ReadOnly);
        }

        fs::remove_file(&self.data_path).map_err(|e| DbError::storage(&self.data_path, e))?;

        match fs::remove_file(&self.index_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(DbError::storage(&self.index_path, e)),
        }

        tracing::info!("Deleted table {}", self.data_path.display());
        Ok(())
    }

    // =========================================================================
    // Accessors (for diagnostics and testing)
    // =========================================================================

    /// Pending count if anything is pending, else the index size.
    /// An approximation, not a transactional count.
    pub fn record_count(&self) -> usize {
        let pending = self.pending.read().len();
        if pending > 0 {
            pending
        } else {
            self.offsets.read().len()
        }
    }

    /// Number of keys with a known offset
    pub fn index_size(&self) -> usize {
        self.offsets.read().len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Data file size in bytes
    pub fn data_size(&self) -> Result<u64> {
        let meta = fs::metadata(&self.data_path).map_err(|e| DbError::storage(&self.data_path, e))?;
        Ok(meta.len())
    }

    pub fn mode(&self) -> TableMode {
        *self.mode.read()
    }

    /// Whether both files are present and the data file is writable
    pub fn files_exist(&self) -> bool {
        let writable = fs::metadata(&self.data_path)
            .map(|m| !m.permissions().readonly())
            .unwrap_or(false);
        writable && self.index_path.exists()
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }
}
