//! Data log reader
//!
//! Lazy sequential scans and single-frame point reads.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::record::Record;

use super::{read_frame, FrameRead, FRAME_HEADER_SIZE};

/// Sequential frame cursor shared by the record and key iterators
struct FrameCursor {
    reader: BufReader<File>,
    /// Offset of the next frame
    position: u64,
    /// File length when the scan started
    len: u64,
    done: bool,
    truncated: bool,
}

impl FrameCursor {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| DbError::storage(path, e))?;
        let len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            len,
            done: false,
            truncated: false,
        })
    }

    /// Next complete frame body and its offset; `None` at EOF or incomplete tail
    fn next_frame(&mut self) -> Option<Result<(Vec<u8>, u64)>> {
        if self.done {
            return None;
        }

        let offset = self.position;
        match read_frame(&mut self.reader, self.len - self.position) {
            Ok(FrameRead::Complete(body)) => {
                self.position += FRAME_HEADER_SIZE + body.len() as u64;
                Some(Ok((body, offset)))
            }
            Ok(FrameRead::Incomplete) => {
                self.done = true;
                if self.position < self.len {
                    self.truncated = true;
                    tracing::debug!(
                        "Incomplete frame at offset {}, {} trailing bytes ignored",
                        offset,
                        self.len - offset
                    );
                }
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterator over `(record, offset)` in file order.
///
/// A complete frame whose body fails to decode yields `Err(CorruptRecord)`;
/// the scan continues with the next frame since framing is still intact.
pub struct DataReader<R> {
    cursor: FrameCursor,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> DataReader<R> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            cursor: FrameCursor::open(path)?,
            _record: PhantomData,
        })
    }

    /// Offset just past the last complete frame read so far
    pub fn position(&self) -> u64 {
        self.cursor.position
    }

    /// True once the scan stopped at an incomplete trailing frame
    pub fn was_truncated(&self) -> bool {
        self.cursor.truncated
    }
}

impl<R: Record> Iterator for DataReader<R> {
    type Item = Result<(R, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (body, offset) = match self.cursor.next_frame()? {
            Ok(frame) => frame,
            Err(e) => return Some(Err(e)),
        };
        Some(R::decode(&body).map(|record| (record, offset)))
    }
}

/// Iterator over `(key, offset)` that never materializes whole records
pub struct KeyScanner<R> {
    cursor: FrameCursor,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> KeyScanner<R> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            cursor: FrameCursor::open(path)?,
            _record: PhantomData,
        })
    }

    pub fn position(&self) -> u64 {
        self.cursor.position
    }

    pub fn was_truncated(&self) -> bool {
        self.cursor.truncated
    }
}

impl<R: Record> Iterator for KeyScanner<R> {
    type Item = Result<(R::Key, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (body, offset) = match self.cursor.next_frame()? {
            Ok(frame) => frame,
            Err(e) => return Some(Err(e)),
        };
        Some(R::peek_key(&body).map(|key| (key, offset)))
    }
}

/// Lazily read every complete record in the data file
pub fn read_all<R: Record>(path: &Path) -> Result<DataReader<R>> {
    DataReader::open(path)
}

/// Lazily read every complete record's key
pub fn scan_keys<R: Record>(path: &Path) -> Result<KeyScanner<R>> {
    KeyScanner::open(path)
}

/// Read the single frame starting at `offset`
pub fn read_at<R: Record>(path: &Path, offset: u64) -> Result<R> {
    let mut file = File::open(path).map_err(|e| DbError::storage(path, e))?;
    let len = file.metadata()?.len();
    if offset >= len {
        return Err(DbError::RecordNotFound { offset });
    }

    file.seek(SeekFrom::Start(offset))?;
    match read_frame(&mut file, len - offset)? {
        FrameRead::Complete(body) => R::decode(&body),
        FrameRead::Incomplete => Err(DbError::RecordNotFound { offset }),
    }
}
