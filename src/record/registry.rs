//! Record registry
//!
//! The closed set of record kinds this crate knows how to store, and
//! dispatch from a runtime [`RecordKind`] to the typed implementation.
//! Generic code should use [`Record`] directly; this is for tools that pick
//! the kind at runtime (e.g. the CLI).

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;

use crate::datalog;
use crate::error::{DbError, Result};
use crate::index;

use super::key::{KeyCodec, KeyKind};
use super::{AuthzRecord, Record};

/// Every record kind known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// [`AuthzRecord`]: username → password hash
    Authz,
}

impl RecordKind {
    pub const ALL: &'static [RecordKind] = &[RecordKind::Authz];

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Authz => "authz",
        }
    }

    /// Encoding used by this kind's key
    pub fn key_kind(self) -> KeyKind {
        match self {
            RecordKind::Authz => <<AuthzRecord as Record>::Key as KeyCodec>::KIND,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecordKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        RecordKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DbError::Config(format!("unknown record kind: {}", s)))
    }
}

/// A decoded record of any registered kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyRecord {
    Authz(AuthzRecord),
}

impl AnyRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            AnyRecord::Authz(_) => RecordKind::Authz,
        }
    }

    /// The record's key in its index encoding
    pub fn key_bytes(&self) -> Vec<u8> {
        match self {
            AnyRecord::Authz(r) => r.key().encode_key().into_owned(),
        }
    }

    pub fn serialize(&self) -> Bytes {
        match self {
            AnyRecord::Authz(r) => r.serialize(),
        }
    }
}

/// Decode `bytes` as a record of `kind`
pub fn decode(kind: RecordKind, bytes: &[u8]) -> Result<AnyRecord> {
    match kind {
        RecordKind::Authz => AuthzRecord::decode(bytes).map(AnyRecord::Authz),
    }
}

/// Extract the encoded key of a `kind` record without decoding the rest
pub fn peek_key(kind: RecordKind, bytes: &[u8]) -> Result<Vec<u8>> {
    match kind {
        RecordKind::Authz => {
            let key = AuthzRecord::peek_key(bytes)?;
            Ok(key.encode_key().into_owned())
        }
    }
}

/// Iterate every complete record in a data file of `kind`
pub fn read_all(
    kind: RecordKind,
    path: &Path,
) -> Result<Box<dyn Iterator<Item = Result<(AnyRecord, u64)>>>> {
    match kind {
        RecordKind::Authz => {
            let reader = datalog::read_all::<AuthzRecord>(path)?;
            Ok(Box::new(reader.map(|item| {
                item.map(|(record, offset)| (AnyRecord::Authz(record), offset))
            })))
        }
    }
}

/// Rebuild the index of a `kind` data file; returns the entry count
pub fn rebuild_index(
    kind: RecordKind,
    data_path: &Path,
    index_path: &Path,
    sync: bool,
) -> Result<usize> {
    match kind {
        RecordKind::Authz => index::rebuild_index::<AuthzRecord>(data_path, index_path, sync),
    }
}
