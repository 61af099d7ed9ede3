//! Key codecs
//!
//! Keys are written to the index file as raw bytes behind a `u32` length
//! prefix; the codec decides how a key type maps to those bytes.

use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::hash::Hash;

use crate::error::{DbError, Result};

/// Encodings a key type can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// UTF-8 text
    Utf8,
    /// Opaque bytes
    Bytes,
    /// 8-byte big-endian integer
    U64,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyKind::Utf8 => "utf8",
            KeyKind::Bytes => "bytes",
            KeyKind::U64 => "u64",
        };
        f.write_str(name)
    }
}

/// Converts a key to and from its index encoding
pub trait KeyCodec: Sized {
    const KIND: KeyKind;

    fn encode_key(&self) -> Cow<'_, [u8]>;

    fn decode_key(bytes: &[u8]) -> Result<Self>;
}

/// Everything a table needs from its key type
pub trait RecordKey: KeyCodec + Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {}

impl<T> RecordKey for T where T: KeyCodec + Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {}

impl KeyCodec for String {
    const KIND: KeyKind = KeyKind::Utf8;

    fn encode_key(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| DbError::corrupt(format!("key is not valid UTF-8: {}", e)))
    }
}

impl KeyCodec for Vec<u8> {
    const KIND: KeyKind = KeyKind::Bytes;

    fn encode_key(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_slice())
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl KeyCodec for u64 {
    const KIND: KeyKind = KeyKind::U64;

    fn encode_key(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_be_bytes().to_vec())
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| DbError::corrupt(format!("u64 key needs 8 bytes, got {}", bytes.len())))?;
        Ok(u64::from_be_bytes(raw))
    }
}
