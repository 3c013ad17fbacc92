//! Typed errors for HPI parsing and decoding.
//!
//! These travel inside [`anyhow::Error`] through the rest of the crate; callers
//! that care about the category can recover them with `downcast_ref::<HpiError>()`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HpiError {
    #[error("Not an HPI archive: expected marker {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    #[error("Directory region {start:#x}..{end:#x} does not fit in archive of {archive_size} bytes")]
    DirectoryRegionOutOfRange {
        start: u32,
        end: u32,
        archive_size: u64,
    },

    #[error("Read of {len} bytes at {offset:#x} is past the end of the archive ({archive_size} bytes)")]
    ReadOutOfRange {
        offset: u64,
        len: u64,
        archive_size: u64,
    },

    #[error("Unexpected end of data at {offset:#x}, {missing} bytes missing")]
    UnexpectedEof { offset: u64, missing: u64 },

    #[error("Directory read of {len} bytes at {offset:#x} is outside the directory region")]
    DirectoryOutOfRange { offset: u64, len: u64 },

    #[error("Entry name at {offset:#x} has no terminating NUL")]
    UnterminatedName { offset: u32 },

    #[error("Invalid entry name {name:?} at {offset:#x}")]
    InvalidEntryName { name: String, offset: u32 },

    #[error("Directory node at {offset:#x} is referenced more than once")]
    DirectoryCycle { offset: u32 },

    #[error("Bad chunk marker {actual:#010x} at {offset:#x}")]
    InvalidChunkMarker { offset: u64, actual: u32 },

    #[error("Chunk {index} at {offset:#x} is truncated: expected {expected} bytes, got {actual}")]
    ShortChunk {
        index: usize,
        offset: u64,
        expected: u64,
        actual: u64,
    },

    #[error("Unknown compression method: {0:#04x}")]
    UnknownCompressionMethod(u8),

    #[error("LZ stream ended after {consumed} bytes without an end marker")]
    LzTruncated { consumed: u64 },

    #[error("Decoded output exceeds the declared size of {limit} bytes")]
    OutputOverrun { limit: usize },

    #[error("ZLib decompression failed: {0}")]
    Zlib(#[source] std::io::Error),
}
