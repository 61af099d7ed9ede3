//! Index Module
//!
//! Persistent key → frame offset mapping kept next to the data file.
//!
//! ## Responsibilities
//! - Load the whole index into memory (keys and offsets only, never bodies)
//! - Append the offsets of each flushed batch in lock-step with the data file
//! - Replace the index atomically after a full data rewrite
//! - Rebuild an index by peeking keys out of a data file
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │ Entry (repeated)                               │
//! │ ┌──────────────┬────────────┬────────────────┐ │
//! │ │ KeyLen (4)   │ Key        │ Offset (8)     │ │
//! │ └──────────────┴────────────┴────────────────┘ │
//! └────────────────────────────────────────────────┘
//! ```
//! Integers are big-endian. An incomplete trailing entry is treated as end
//! of file. If a key appears twice, the later entry wins.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use bytes::{BufMut, BytesMut};
use tempfile::NamedTempFile;

use crate::datalog::{self, parent_dir, sync_dir, WriteOptions};
use crate::error::{DbError, Result};
use crate::record::{checked_len, KeyCodec, Record, RecordKey};

/// Size of an entry's key length prefix
pub const KEY_LEN_SIZE: u64 = 4;

/// Size of an entry's offset field
pub const OFFSET_SIZE: u64 = 8;

/// Everything read from an index file
#[derive(Debug, Clone)]
pub struct IndexContents<K> {
    /// Key → frame offset
    pub entries: HashMap<K, u64>,

    /// Complete entries read, duplicates included
    pub entries_read: usize,

    /// Bytes covered by complete entries
    pub valid_len: u64,

    /// Total file size
    pub file_len: u64,
}

impl<K> IndexContents<K> {
    /// Whether the file ends with an incomplete entry
    pub fn was_truncated(&self) -> bool {
        self.valid_len < self.file_len
    }

    /// Highest offset referenced by the index
    pub fn max_offset(&self) -> Option<u64> {
        self.entries.values().copied().max()
    }
}

/// Append one encoded entry to `out`
pub fn encode_entry<K: KeyCodec>(key: &K, offset: u64, out: &mut BytesMut) -> Result<()> {
    let key_bytes = key.encode_key();
    let key_len = checked_len(key_bytes.len(), "index key")?;

    out.reserve((KEY_LEN_SIZE + OFFSET_SIZE) as usize + key_bytes.len());
    out.put_u32(key_len);
    out.put_slice(&key_bytes);
    out.put_u64(offset);
    Ok(())
}

/// Read `buf.len()` bytes, or report that the file ended first
fn read_or_eof<Rd: Read>(reader: &mut Rd, buf: &mut [u8]) -> Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Load the whole index file
pub fn load_index<K: RecordKey>(path: &Path) -> Result<IndexContents<K>> {
    let file = File::open(path).map_err(|e| DbError::storage(path, e))?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut entries = HashMap::new();
    let mut entries_read = 0usize;
    let mut position = 0u64;
    let mut key_buf = Vec::new();

    loop {
        let remaining = file_len - position;
        if remaining < KEY_LEN_SIZE {
            break;
        }

        let mut len_buf = [0u8; KEY_LEN_SIZE as usize];
        if !read_or_eof(&mut reader, &mut len_buf)? {
            break;
        }
        let key_len = u32::from_be_bytes(len_buf) as u64;

        let entry_len = KEY_LEN_SIZE + key_len + OFFSET_SIZE;
        if remaining < entry_len {
            break;
        }

        key_buf.resize(key_len as usize, 0);
        let mut offset_buf = [0u8; OFFSET_SIZE as usize];
        if !read_or_eof(&mut reader, &mut key_buf)? || !read_or_eof(&mut reader, &mut offset_buf)? {
            break;
        }

        let key = K::decode_key(&key_buf)?;
        let offset = u64::from_be_bytes(offset_buf);
        entries.insert(key, offset);

        entries_read += 1;
        position += entry_len;
    }

    if position < file_len {
        tracing::debug!(
            "Index {} has {} trailing bytes after {} entries",
            path.display(),
            file_len - position,
            entries_read
        );
    }

    Ok(IndexContents {
        entries,
        entries_read,
        valid_len: position,
        file_len,
    })
}

/// Parse the full index file into a key → offset map
pub fn read_index<K: RecordKey>(path: &Path) -> Result<HashMap<K, u64>> {
    Ok(load_index(path)?.entries)
}

fn write_entries<'a, W, K, I>(writer: &mut W, entries: I) -> Result<(usize, u64)>
where
    W: Write,
    K: KeyCodec + 'a,
    I: IntoIterator<Item = (&'a K, u64)>,
{
    let mut buf = BytesMut::new();
    let mut count = 0usize;
    let mut written = 0u64;

    for (key, offset) in entries {
        buf.clear();
        encode_entry(key, offset, &mut buf)?;
        writer.write_all(&buf)?;
        written += buf.len() as u64;
        count += 1;
    }
    writer.flush()?;
    Ok((count, written))
}

/// Replace the index at `path` with `entries` (temp file + atomic rename).
/// Returns the bytes written.
pub fn write_index<'a, K, I>(path: &Path, entries: I, options: WriteOptions) -> Result<u64>
where
    K: KeyCodec + 'a,
    I: IntoIterator<Item = (&'a K, u64)>,
{
    let dir = parent_dir(path);
    let tmp = NamedTempFile::new_in(dir).map_err(|e| DbError::storage(dir, e))?;

    let mut writer = io::BufWriter::with_capacity(options.buffer_size, tmp.as_file());
    let (count, written) = write_entries(&mut writer, entries)?;
    drop(writer);
    if options.sync {
        tmp.as_file().sync_all()?;
    }

    tmp.persist(path).map_err(|e| DbError::storage(path, e.error))?;
    if options.sync {
        sync_dir(dir)?;
    }

    tracing::debug!(
        "Wrote index file {} with {} entries ({} bytes)",
        path.display(),
        count,
        written
    );
    Ok(written)
}

/// Append `entries` to the end of the index at `path`.
/// Returns the bytes written; on failure the file is cut back.
pub fn append_index<'a, K, I>(path: &Path, entries: I, options: WriteOptions) -> Result<u64>
where
    K: KeyCodec + 'a,
    I: IntoIterator<Item = (&'a K, u64)>,
{
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| DbError::storage(path, e))?;
    let start = file.metadata()?.len();

    let mut writer = io::BufWriter::with_capacity(options.buffer_size, &file);
    let appended = write_entries(&mut writer, entries).and_then(|(count, written)| {
        if options.sync {
            file.sync_data()?;
        }
        Ok((count, written))
    });
    drop(writer);

    match appended {
        Ok((count, written)) => {
            tracing::debug!(
                "Appended {} entries ({} bytes) to index {}",
                count,
                written,
                path.display()
            );
            Ok(written)
        }
        Err(e) => {
            if let Err(cleanup) = file.set_len(start) {
                tracing::warn!(
                    "Failed to roll back partial index append on {}: {}",
                    path.display(),
                    cleanup
                );
            }
            Err(e)
        }
    }
}

/// Build a fresh index for `data_path` from key peeks alone.
/// Returns the number of frames indexed.
pub fn rebuild_index<R: Record>(data_path: &Path, index_path: &Path, sync: bool) -> Result<usize> {
    let mut scanner = datalog::scan_keys::<R>(data_path)?;
    let mut entries = Vec::new();
    for item in scanner.by_ref() {
        entries.push(item?);
    }

    if scanner.was_truncated() {
        tracing::warn!(
            "Data file {} ends with an incomplete frame after offset {}",
            data_path.display(),
            scanner.position()
        );
    }

    let options = WriteOptions {
        sync,
        ..WriteOptions::default()
    };
    write_index(index_path, entries.iter().map(|(key, offset)| (key, *offset)), options)?;

    tracing::info!(
        "Rebuilt index {} from {} ({} frames)",
        index_path.display(),
        data_path.display(),
        entries.len()
    );
    Ok(entries.len())
}
