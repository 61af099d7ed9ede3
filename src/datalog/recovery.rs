//! Data log recovery
//!
//! Handles partial writes left behind by a crash mid-flush, and offline
//! inspection of a data file.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{DbError, Result};

use super::{read_frame_header, FRAME_HEADER_SIZE};

/// Result of inspecting a data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFileReport {
    /// Number of complete frames
    pub frames: u64,

    /// Bytes covered by complete frames
    pub committed_len: u64,

    /// Total file size
    pub file_len: u64,

    /// Bytes after the last complete frame
    pub trailing_bytes: u64,

    /// CRC32 over the committed bytes
    pub crc32: u32,
}

impl DataFileReport {
    /// Whether the file ends with an incomplete frame
    pub fn was_truncated(&self) -> bool {
        self.trailing_bytes > 0
    }
}

/// What tail repair found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailStatus {
    /// File ends exactly at the last committed frame
    Clean,

    /// Uncommitted bytes were cut off
    Truncated { removed: u64 },

    /// Uncommitted bytes exist but repair was not requested
    Dirty { uncommitted: u64 },

    /// The last committed offset does not hold a complete frame; left untouched
    Unverifiable { offset: u64 },
}

/// End offset of the complete frame starting at `offset`, if there is one
pub fn frame_end(path: &Path, offset: u64) -> Result<Option<u64>> {
    let mut file = File::open(path).map_err(|e| DbError::storage(path, e))?;
    let len = file.metadata()?.len();
    if offset >= len {
        return Ok(None);
    }

    file.seek(SeekFrom::Start(offset))?;
    let end = read_frame_header(&mut file, len - offset)?
        .map(|body_len| offset + FRAME_HEADER_SIZE + body_len);
    Ok(end)
}

/// Bring the data file back to its last committed frame.
///
/// `last_committed` is the highest offset the index knows about (`None` for
/// an empty index). Anything past the end of that frame was written by a
/// flush that never reached the index.
pub fn repair_tail(path: &Path, last_committed: Option<u64>, truncate: bool) -> Result<TailStatus> {
    let committed_end = match last_committed {
        None => 0,
        Some(offset) => match frame_end(path, offset)? {
            Some(end) => end,
            None => return Ok(TailStatus::Unverifiable { offset }),
        },
    };

    let file_len = std::fs::metadata(path)
        .map_err(|e| DbError::storage(path, e))?
        .len();
    if file_len <= committed_end {
        return Ok(TailStatus::Clean);
    }

    let uncommitted = file_len - committed_end;
    if !truncate {
        return Ok(TailStatus::Dirty { uncommitted });
    }

    truncate_file(path, committed_end)?;
    Ok(TailStatus::Truncated { removed: uncommitted })
}

/// Cut `path` down to `len` bytes and sync
pub(crate) fn truncate_file(path: &Path, len: u64) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| DbError::storage(path, e))?;
    file.set_len(len).map_err(|e| DbError::storage(path, e))?;
    file.sync_all()?;
    Ok(())
}

/// Walk every frame of a data file without decoding records
pub fn inspect(path: &Path) -> Result<DataFileReport> {
    let file = File::open(path).map_err(|e| DbError::storage(path, e))?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut hasher = crc32fast::Hasher::new();
    let mut position = 0u64;
    let mut frames = 0u64;
    let mut body = Vec::new();

    while let Some(body_len) = read_frame_header(&mut reader, file_len - position)? {
        body.resize(body_len as usize, 0);
        reader.read_exact(&mut body)?;

        hasher.update(&(body_len as u32).to_be_bytes());
        hasher.update(&body);

        position += FRAME_HEADER_SIZE + body_len;
        frames += 1;
    }

    Ok(DataFileReport {
        frames,
        committed_len: position,
        file_len,
        trailing_bytes: file_len - position,
        crc32: hasher.finalize(),
    })
}
