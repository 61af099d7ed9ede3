//! Length-prefixed field primitives
//!
//! Every record is a concatenation of `[u32 len][len bytes]` fields read
//! positionally. Lengths are big-endian.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DbError, Result};

/// Size of a field's length prefix
pub const LEN_PREFIX: usize = 4;

/// Encoded size of a field holding `data`
pub fn field_len(data: &[u8]) -> usize {
    LEN_PREFIX + data.len()
}

/// `len` as a `u32` length prefix, or `TooLarge` naming `what`
pub fn checked_len(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        DbError::TooLarge(format!("{} of {} bytes exceeds the {} byte limit", what, len, u32::MAX))
    })
}

/// Append one length-prefixed field
pub fn put_field(out: &mut BytesMut, data: &[u8]) {
    out.reserve(field_len(data));
    out.put_u32(data.len() as u32);
    out.put_slice(data);
}

/// Positional reader over a record buffer.
///
/// Never reads past the end of the buffer: a length prefix that claims more
/// bytes than remain is reported as a corrupt record.
#[derive(Debug)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    field: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, field: 0 }
    }

    /// Read the next field's bytes
    pub fn read_field(&mut self) -> Result<&'a [u8]> {
        if self.buf.remaining() < LEN_PREFIX {
            return Err(DbError::corrupt(format!(
                "field {}: {} bytes left, need {} for length prefix",
                self.field,
                self.buf.remaining(),
                LEN_PREFIX
            )));
        }

        let len = self.buf.get_u32() as usize;
        if len > self.buf.len() {
            return Err(DbError::corrupt(format!(
                "field {}: declared length {} exceeds remaining {} bytes",
                self.field,
                len,
                self.buf.len()
            )));
        }

        let (data, rest) = self.buf.split_at(len);
        self.buf = rest;
        self.field += 1;
        Ok(data)
    }

    /// Read the next field as UTF-8 text
    pub fn read_str(&mut self) -> Result<&'a str> {
        let field = self.field;
        let data = self.read_field()?;
        std::str::from_utf8(data)
            .map_err(|e| DbError::corrupt(format!("field {}: invalid UTF-8: {}", field, e)))
    }

    /// Step over the next field without inspecting it
    pub fn skip_field(&mut self) -> Result<()> {
        self.read_field().map(|_| ())
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Index of the next field to be read
    pub fn position(&self) -> usize {
        self.field
    }

    /// Require that every byte was consumed
    pub fn finish(self) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(DbError::corrupt(format!(
                "{} trailing bytes after field {}",
                self.buf.len(),
                self.field
            )));
        }
        Ok(())
    }
}
