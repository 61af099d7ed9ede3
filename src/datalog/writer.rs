//! Frame writer
//!
//! Appends framed records to the live data file, or stages a full rewrite in
//! a temp file that replaces the data file atomically.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use bytes::{BufMut, BytesMut};
use tempfile::NamedTempFile;

use crate::error::{DbError, Result};
use crate::record::{checked_len, Record};

use super::FRAME_HEADER_SIZE;

/// Knobs for a batch of frame writes
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// fsync before returning
    pub sync: bool,
    /// BufWriter capacity (in bytes)
    pub buffer_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sync: true,
            buffer_size: 64 * 1024,
        }
    }
}

/// Result of writing a batch of frames
#[derive(Debug, Clone)]
pub struct AppendResult<K> {
    /// Frame-start offset of each record, in write order
    pub offsets: Vec<(K, u64)>,
    /// Bytes appended by this batch
    pub bytes_written: u64,
    /// File size after the batch
    pub end_offset: u64,
}

/// Writes frames to any sink while tracking the file offset
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
    /// Offset the next frame will start at
    offset: u64,
    /// Offset of the first frame
    start: u64,
    /// Reused encode buffer
    scratch: BytesMut,
}

impl<W: Write> FrameWriter<W> {
    /// `start_offset` is the sink's current length
    pub fn new(inner: W, start_offset: u64) -> Self {
        Self::with_capacity(64 * 1024, inner, start_offset)
    }

    pub fn with_capacity(capacity: usize, inner: W, start_offset: u64) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, inner),
            offset: start_offset,
            start: start_offset,
            scratch: BytesMut::new(),
        }
    }

    /// Write one frame; returns the offset of its length prefix
    pub fn write_record<R: Record>(&mut self, record: &R) -> Result<u64> {
        self.scratch.clear();
        self.scratch.reserve(FRAME_HEADER_SIZE as usize + record.encoded_len());
        self.scratch.put_u32(0); // patched below
        record.encode(&mut self.scratch);

        let body_len = self.scratch.len() - FRAME_HEADER_SIZE as usize;
        let frame_len = checked_len(body_len, "record")?;
        self.scratch[..FRAME_HEADER_SIZE as usize].copy_from_slice(&frame_len.to_be_bytes());

        self.writer.write_all(&self.scratch)?;

        let offset = self.offset;
        self.offset += self.scratch.len() as u64;
        Ok(offset)
    }

    /// Offset the next frame would start at
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn bytes_written(&self) -> u64 {
        self.offset - self.start
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the sink
    pub fn finish(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| DbError::Io(e.into_error()))
    }
}

fn write_frames<'a, W, R, I>(writer: &mut FrameWriter<W>, records: I) -> Result<Vec<(R::Key, u64)>>
where
    W: Write,
    R: Record,
    I: IntoIterator<Item = &'a R>,
{
    let mut offsets = Vec::new();
    for record in records {
        let offset = writer.write_record(record)?;
        let key = record.key();
        tracing::trace!("Setting offset for key {:?} to {}", key, offset);
        offsets.push((key, offset));
    }
    writer.flush()?;
    Ok(offsets)
}

/// Append records to the end of the data file at `path`.
///
/// On failure the file is cut back to its previous length so no partial
/// batch is left behind.
pub fn append_records<'a, R, I>(path: &Path, records: I, options: WriteOptions) -> Result<AppendResult<R::Key>>
where
    R: Record,
    I: IntoIterator<Item = &'a R>,
{
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| DbError::storage(path, e))?;
    let start = file.metadata()?.len();

    let mut writer = FrameWriter::with_capacity(options.buffer_size, &file, start);
    let written = write_frames(&mut writer, records).and_then(|offsets| {
        if options.sync {
            file.sync_data()?;
        }
        Ok(offsets)
    });
    let end_offset = writer.offset();
    drop(writer);

    match written {
        Ok(offsets) => Ok(AppendResult {
            offsets,
            bytes_written: end_offset - start,
            end_offset,
        }),
        Err(e) => {
            if let Err(cleanup) = file.set_len(start) {
                tracing::warn!(
                    "Failed to roll back partial append on {}: {}",
                    path.display(),
                    cleanup
                );
            }
            Err(e)
        }
    }
}

/// A full rewrite written to a temp file, waiting to replace the data file
pub struct StagedFile<K> {
    tmp: NamedTempFile,
    result: AppendResult<K>,
    sync: bool,
}

impl<K> StagedFile<K> {
    /// Offsets the records will have once committed
    pub fn result(&self) -> &AppendResult<K> {
        &self.result
    }

    /// Atomically rename the staged file over `path`
    pub fn commit(self, path: &Path) -> Result<AppendResult<K>> {
        self.tmp
            .persist(path)
            .map_err(|e| DbError::storage(path, e.error))?;
        if self.sync {
            sync_dir(parent_dir(path))?;
        }
        Ok(self.result)
    }
}

/// Write records from offset 0 into a temp file next to `path`
pub fn stage_fresh<'a, R, I>(path: &Path, records: I, options: WriteOptions) -> Result<StagedFile<R::Key>>
where
    R: Record,
    I: IntoIterator<Item = &'a R>,
{
    let dir = parent_dir(path);
    let tmp = NamedTempFile::new_in(dir).map_err(|e| DbError::storage(dir, e))?;

    let mut writer = FrameWriter::with_capacity(options.buffer_size, tmp.as_file(), 0);
    let offsets = write_frames(&mut writer, records)?;
    let end_offset = writer.offset();
    drop(writer);

    if options.sync {
        tmp.as_file().sync_all()?;
    }

    Ok(StagedFile {
        tmp,
        result: AppendResult {
            offsets,
            bytes_written: end_offset,
            end_offset,
        },
        sync: options.sync,
    })
}

/// Replace the data file at `path` with exactly `records`
pub fn write_fresh<'a, R, I>(path: &Path, records: I, options: WriteOptions) -> Result<AppendResult<R::Key>>
where
    R: Record,
    I: IntoIterator<Item = &'a R>,
{
    stage_fresh(path, records, options)?.commit(path)
}

/// Directory holding `path`; `.` for bare file names
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Make a rename in `dir` durable
pub(crate) fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::fs::File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| DbError::storage(dir, e))?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}
