//! Record Module
//!
//! Defines how one logical entity serializes to and from bytes.
//!
//! ## Responsibilities
//! - Deterministic, self-delimiting encoding of record fields
//! - Key access from a materialized record or straight from raw bytes
//! - A closed set of record kinds for runtime dispatch
//!
//! ## Record Encoding
//! ```text
//! ┌────────────┬──────────────┬────────────┬──────────────┬─────┐
//! │ Len A (4)  │ Field A      │ Len B (4)  │ Field B      │ ... │
//! └────────────┴──────────────┴────────────┴──────────────┴─────┘
//! ```
//! The record carries no total length; framing belongs to the data log.

mod authz;
mod field;
mod key;
pub mod registry;

use bytes::{Bytes, BytesMut};

use crate::error::Result;

pub use authz::AuthzRecord;
pub use field::{checked_len, field_len, put_field, FieldReader, LEN_PREFIX};
pub use key::{KeyCodec, KeyKind, RecordKey};
pub use registry::{AnyRecord, RecordKind};

/// A record that can be stored in a [`Table`](crate::Table)
///
/// `peek_key` must read the same fields, in the same order, as `key` reads
/// from a decoded record.
pub trait Record: Clone + Send + Sync + Sized + 'static {
    type Key: RecordKey;

    /// Kind tag used by the registry
    const KIND: RecordKind;

    /// The key that addresses this record
    fn key(&self) -> Self::Key;

    /// Exact number of bytes `encode` appends
    fn encoded_len(&self) -> usize;

    /// Append the field encoding to `out`
    fn encode(&self, out: &mut BytesMut);

    /// Reconstruct a record from exactly the bytes `encode` produced
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Extract only the key from encoded bytes
    fn peek_key(bytes: &[u8]) -> Result<Self::Key>;

    fn serialize(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut out);
        out.freeze()
    }
}
