//! Low-level HPI archive reader.
//!
//! ## Parsing Strategy
//!
//! 1. Read the 20-byte clear-text header and derive the cipher key
//! 2. Read the directory region (`start..directory_size`) in one request and
//!    decrypt it
//! 3. Walk the directory tree in memory to produce the file list
//! 4. For extraction, read each file's chunk size table and chunk region
//!
//! Every archive read goes through [`HpiParser::read_decrypted`] so the
//! keystream always sees the true archive offset.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

use crate::error::HpiError;
use crate::io::ReadAt;
use anyhow::Result;

use super::cipher::Keystream;
use super::directory::DirectoryRegion;
use super::structures::{HpiFileEntry, HpiHeader};

/// Low-level HPI parser over any [`ReadAt`] source.
pub struct HpiParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> HpiParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Read and validate the archive header.
    pub async fn read_header(&self) -> Result<HpiHeader> {
        let mut buf = [0u8; HpiHeader::SIZE];
        self.read_exact(0, &mut buf).await?;

        let header = HpiHeader::from_bytes(&buf)?;
        header.validate(self.size)?;

        debug!(
            directory_size = header.directory_size,
            start = header.start,
            key = header.derived_key(),
            saved_game = header.is_saved_game(),
            "read HPI header"
        );
        Ok(header)
    }

    /// Read `len` bytes at `offset` and remove the keystream.
    ///
    /// The range is checked against the archive size before any buffer is
    /// allocated, so lengths taken from corrupt tables fail cleanly.
    pub async fn read_decrypted(&self, keystream: Keystream, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let mut buf = vec![0u8; len as usize];
        self.read_exact(offset, &mut buf).await?;
        keystream.apply(&mut buf, offset);
        Ok(buf)
    }

    /// Read and decrypt the whole directory region.
    pub async fn read_directory(&self, header: &HpiHeader) -> Result<DirectoryRegion> {
        let keystream = Keystream::from_header(header);
        let bytes = self
            .read_decrypted(keystream, u64::from(header.start), u64::from(header.directory_len()))
            .await?;
        Ok(DirectoryRegion::new(header.start, bytes))
    }

    /// List every file in the archive, in directory order.
    pub async fn list_files(&self, header: &HpiHeader) -> Result<Vec<HpiFileEntry>> {
        let directory = self.read_directory(header).await?;
        let files = directory.walk(header.start)?;
        debug!(count = files.len(), "walked directory tree");
        Ok(files)
    }

    /// Read the chunk size table of a file: `chunk_count` little-endian u32s
    /// at the file's data offset.
    pub async fn read_chunk_sizes(&self, keystream: Keystream, entry: &HpiFileEntry) -> Result<Vec<u32>> {
        let count = entry.data.chunk_count();
        let table = self
            .read_decrypted(keystream, u64::from(entry.data.data_offset), count as u64 * 4)
            .await?;

        let mut cursor = Cursor::new(&table);
        let mut sizes = Vec::with_capacity(count);
        for _ in 0..count {
            sizes.push(cursor.read_u32::<LittleEndian>()?);
        }
        Ok(sizes)
    }

    /// Fail with [`HpiError::ReadOutOfRange`] unless `offset..offset + len`
    /// lies inside the archive.
    pub fn check_range(&self, offset: u64, len: u64) -> Result<(), HpiError> {
        if offset.checked_add(len).is_none_or(|end| end > self.size) {
            return Err(HpiError::ReadOutOfRange {
                offset,
                len,
                archive_size: self.size,
            });
        }
        Ok(())
    }

    async fn read_exact(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len() as u64)?;
        self.reader.read_exact_at(offset, buf).await
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}
