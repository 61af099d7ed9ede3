//! Configuration for authzdb tables
//!
//! Centralized configuration with sensible defaults.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{DbError, Result};

/// Configuration for a single [`Table`](crate::Table)
#[derive(Debug, Clone)]
pub struct TableConfig {
    // -------------------------------------------------------------------------
    // Durability
    // -------------------------------------------------------------------------
    /// When to fsync data and index files
    pub sync_strategy: SyncStrategy,

    /// Truncate uncommitted bytes at the tail of the data and index files on open.
    /// Data past the last indexed frame belongs to a flush that never finished.
    pub repair_tail: bool,

    // -------------------------------------------------------------------------
    // Open Behavior
    // -------------------------------------------------------------------------
    /// What to do when a data file exists without an index
    pub load_strategy: LoadStrategy,

    /// Reject all writes; never create or repair files
    pub read_only: bool,

    /// Create missing parent directories on open
    pub create_dirs: bool,

    /// Extension appended to the data path to name the index file.
    /// Layout:
    ///   {path}         (data file)
    ///   {path}.{ext}   (index file)
    pub index_extension: String,

    // -------------------------------------------------------------------------
    // I/O
    // -------------------------------------------------------------------------
    /// Buffer size for frame writers (in bytes)
    pub write_buffer_size: usize,
}

/// fsync strategy for flushes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync data and index at the end of every flush (safest)
    EveryFlush,

    /// Leave syncing to the OS (fastest, for tests and bulk loads)
    Never,
}

impl SyncStrategy {
    pub(crate) fn should_sync(self) -> bool {
        matches!(self, SyncStrategy::EveryFlush)
    }
}

/// Open behavior for a data file that has no index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Materialize every record into memory; the first flush rewrites the
    /// data file and writes a fresh index
    Eager,

    /// Peek keys out of the data file and write an index, then open lazily
    RebuildIndex,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            sync_strategy: SyncStrategy::EveryFlush,
            repair_tail: true,
            load_strategy: LoadStrategy::Eager,
            read_only: false,
            create_dirs: true,
            index_extension: "idx".to_string(),
            write_buffer_size: 64 * 1024, // 64 KB
        }
    }
}

impl TableConfig {
    /// Create a new config builder
    pub fn builder() -> TableConfigBuilder {
        TableConfigBuilder::default()
    }

    /// Check the config for values that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.index_extension.is_empty() {
            return Err(DbError::Config("index extension must not be empty".to_string()));
        }
        if self.write_buffer_size == 0 {
            return Err(DbError::Config("write buffer size must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Path of the index file that belongs to `data_path`
    pub fn index_path_for(&self, data_path: &Path) -> PathBuf {
        let mut name: OsString = data_path.as_os_str().to_owned();
        name.push(".");
        name.push(&self.index_extension);
        PathBuf::from(name)
    }
}

/// Builder for TableConfig
#[derive(Default)]
pub struct TableConfigBuilder {
    config: TableConfig,
}

impl TableConfigBuilder {
    /// Set the fsync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Enable or disable tail repair on open
    pub fn repair_tail(mut self, repair: bool) -> Self {
        self.config.repair_tail = repair;
        self
    }

    /// Set the strategy for data files without an index
    pub fn load_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.config.load_strategy = strategy;
        self
    }

    /// Open the table read-only
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Create missing parent directories on open
    pub fn create_dirs(mut self, create: bool) -> Self {
        self.config.create_dirs = create;
        self
    }

    /// Set the index file extension
    pub fn index_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.index_extension = ext.into();
        self
    }

    /// Set the write buffer size (in bytes)
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.config.write_buffer_size = size;
        self
    }

    pub fn build(self) -> TableConfig {
        self.config
    }
}
