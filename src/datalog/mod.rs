//! Data Log Module
//!
//! Append-only storage of framed records.
//!
//! ## Responsibilities
//! - Append frames at the end of the live data file
//! - Full rewrites through a temp file and atomic rename
//! - Lazy, in-order scans that stop at an incomplete tail
//! - Point reads at an indexed offset
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Frame 1                                 │
//! │ ┌──────────────┬──────────────────────┐ │
//! │ │ Len (4, BE)  │ Record (Len bytes)   │ │
//! │ └──────────────┴──────────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Frame 2                                 │
//! │ ┌──────────────┬──────────────────────┐ │
//! │ │ Len (4, BE)  │ Record (Len bytes)   │ │
//! │ └──────────────┴──────────────────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//! An offset always points at a frame's length prefix. Frames are never
//! rewritten in place; a crash mid-append can only leave an incomplete frame
//! at the very end, which readers treat as end of file.

mod reader;
mod recovery;
mod writer;

use std::io::{self, Read};

use crate::error::Result;

pub use reader::{read_all, read_at, scan_keys, DataReader, KeyScanner};
pub use recovery::{frame_end, inspect, repair_tail, DataFileReport, TailStatus};
pub use writer::{append_records, stage_fresh, write_fresh, AppendResult, FrameWriter, StagedFile, WriteOptions};

pub(crate) use recovery::truncate_file;
pub(crate) use writer::{parent_dir, sync_dir};

/// Size of a frame's length prefix
pub const FRAME_HEADER_SIZE: u64 = 4;

/// Outcome of reading one frame; `Incomplete` is end of stream, not an error
pub(crate) enum FrameRead {
    Complete(Vec<u8>),
    Incomplete,
}

/// Read the length prefix at the current position.
///
/// `remaining` is the number of file bytes from the current position to EOF.
/// Returns the body length only if the whole frame fits.
pub(crate) fn read_frame_header<Rd: Read>(reader: &mut Rd, remaining: u64) -> Result<Option<u64>> {
    if remaining < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let mut header = [0u8; FRAME_HEADER_SIZE as usize];
    if let Err(e) = reader.read_exact(&mut header) {
        return match e.kind() {
            io::ErrorKind::UnexpectedEof => Ok(None),
            _ => Err(e.into()),
        };
    }

    let body_len = u32::from_be_bytes(header) as u64;
    if remaining - FRAME_HEADER_SIZE < body_len {
        return Ok(None);
    }
    Ok(Some(body_len))
}

/// Read one whole frame at the current position
pub(crate) fn read_frame<Rd: Read>(reader: &mut Rd, remaining: u64) -> Result<FrameRead> {
    let body_len = match read_frame_header(reader, remaining)? {
        Some(len) => len,
        None => return Ok(FrameRead::Incomplete),
    };

    let mut body = vec![0u8; body_len as usize];
    if let Err(e) = reader.read_exact(&mut body) {
        return match e.kind() {
            io::ErrorKind::UnexpectedEof => Ok(FrameRead::Incomplete),
            _ => Err(e.into()),
        };
    }
    Ok(FrameRead::Complete(body))
}
