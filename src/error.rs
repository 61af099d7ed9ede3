//! Error types for authzdb
//!
//! Provides a unified error type for all table operations.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using DbError
pub type Result<T> = std::result::Result<T, DbError>;

/// Unified error type for authzdb operations
#[derive(Debug, Error)]
pub enum DbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A create/open/rename/delete of a table file failed
    #[error("Storage error on {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// The index points at an offset that holds no complete frame
    #[error("Record not found at offset {offset}")]
    RecordNotFound { offset: u64 },

    /// A record or key longer than a `u32` length prefix can describe
    #[error("Too large: {0}")]
    TooLarge(String),

    // -------------------------------------------------------------------------
    // Table Errors
    // -------------------------------------------------------------------------
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Table is read-only")]
    ReadOnly,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Wrap an I/O error with the path it happened on
    pub fn storage(path: impl AsRef<Path>, source: io::Error) -> Self {
        DbError::Storage {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        DbError::CorruptRecord(msg.into())
    }
}
