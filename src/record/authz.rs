//! Credential record
//!
//! Username plus the hex digest of the password.

use bytes::BytesMut;

use crate::error::Result;
use crate::hash::{PasswordHasher, Sha256Hasher};

use super::field::{field_len, put_field, FieldReader};
use super::key::KeyCodec;
use super::{Record, RecordKind};

/// Authorization record: `(username, password_hash)`
///
/// Encoded as two length-prefixed UTF-8 fields in that order; the username
/// is the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzRecord {
    username: String,
    password_hash: String,
}

impl AuthzRecord {
    /// Build a record, hashing the password with SHA-256
    pub fn create(username: &str, password: &str) -> Self {
        Self::with_hasher(&Sha256Hasher, username, password)
    }

    /// Build a record, hashing the password with `hasher`
    pub fn with_hasher<H>(hasher: &H, username: &str, password: &str) -> Self
    where
        H: PasswordHasher + ?Sized,
    {
        Self {
            username: username.to_string(),
            password_hash: hasher.hex_digest(password),
        }
    }

    /// Build a record from an already-computed hash
    pub fn from_parts(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

impl Record for AuthzRecord {
    type Key = String;

    const KIND: RecordKind = RecordKind::Authz;

    fn key(&self) -> String {
        self.username.clone()
    }

    fn encoded_len(&self) -> usize {
        field_len(self.username.as_bytes()) + field_len(self.password_hash.as_bytes())
    }

    fn encode(&self, out: &mut BytesMut) {
        put_field(out, self.username.as_bytes());
        put_field(out, self.password_hash.as_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = FieldReader::new(bytes);
        let username = reader.read_str()?.to_string();
        let password_hash = reader.read_str()?.to_string();
        reader.finish()?;

        Ok(Self {
            username,
            password_hash,
        })
    }

    fn peek_key(bytes: &[u8]) -> Result<String> {
        // Username is field 0; the hash is never touched
        let mut reader = FieldReader::new(bytes);
        String::decode_key(reader.read_field()?)
    }
}
