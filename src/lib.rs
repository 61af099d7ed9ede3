//! # authzdb
//!
//! An embedded keyed record store for authorization credentials with:
//! - An append-only data file of length-prefixed frames
//! - A secondary offset index for lazy point lookups
//! - Crash-tolerant flushes (incomplete tails are ignored and repaired)
//! - Internally locked state, safe to share across threads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Table                                │
//! │        (pending buffer, offset map, lazy read cache)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Data Log   │          │    Index    │
//!   │  (Frames)   │          │ (Key → Off) │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │   Record    │
//!   │  (Fields)   │
//!   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use authzdb::{AuthzRecord, Table};
//!
//! let table = Table::<AuthzRecord>::open("/var/lib/authz/users.db").unwrap();
//! table.add_record(AuthzRecord::create("andrew", "bar")).unwrap();
//! table.flush().unwrap();
//!
//! let record = table.get_record_lazily(&"andrew".to_string()).unwrap();
//! assert!(record.is_some());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod hash;

pub mod datalog;
pub mod index;
pub mod record;
pub mod table;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{LoadStrategy, SyncStrategy, TableConfig};
pub use error::{DbError, Result};
pub use hash::{PasswordHasher, Sha256Hasher};
pub use record::{AnyRecord, AuthzRecord, Record, RecordKind};
pub use table::{FlushStats, Table, TableMode};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of authzdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
