use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::io::ReadAt;
use anyhow::Result;

use super::chunk::Chunk;
use super::cipher::Keystream;
use super::parser::HpiParser;
use super::structures::{HpiFileEntry, HpiHeader};

/// Totals reported by [`HpiExtractor::extract_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub bytes: u64,
}

/// HPI archive extractor
pub struct HpiExtractor<R: ReadAt> {
    parser: HpiParser<R>,
    header: HpiHeader,
    keystream: Keystream,
}

impl<R: ReadAt> HpiExtractor<R> {
    /// Open an archive, reading and validating its header
    pub async fn open(reader: Arc<R>) -> Result<Self> {
        let parser = HpiParser::new(reader);
        let header = parser.read_header().await?;
        let keystream = Keystream::from_header(&header);
        Ok(Self {
            parser,
            header,
            keystream,
        })
    }

    pub fn header(&self) -> &HpiHeader {
        &self.header
    }

    pub fn keystream(&self) -> Keystream {
        self.keystream
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<HpiFileEntry>> {
        self.parser.list_files(&self.header).await
    }

    /// Decode a file chunk by chunk into `writer`, returning the bytes written.
    ///
    /// Chunks are written as soon as they decode, so a failure leaves the
    /// chunks before it in the sink.
    pub async fn extract_to_writer<W>(&self, entry: &HpiFileEntry, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let sizes = self.parser.read_chunk_sizes(self.keystream, entry).await?;
        let region_offset = u64::from(entry.data.data_offset) + 4 * sizes.len() as u64;
        let region_len: u64 = sizes.iter().map(|&s| u64::from(s)).sum();
        // size tables are untrusted; refuse regions past the end before buffering them
        self.parser.check_range(region_offset, region_len)?;

        let region = self
            .parser
            .read_decrypted(self.keystream, region_offset, region_len)
            .await?;
        let mut cursor = Cursor::new(&region[..]);

        let mut written = 0u64;
        for index in 0..sizes.len() {
            let chunk = Chunk::read_from(&mut cursor, index, region_offset)?;
            trace!(
                path = %entry.path,
                index,
                method = chunk.header.compression_method.name(),
                encrypted = chunk.header.is_encrypted(),
                compressed = chunk.header.compressed_size,
                "chunk"
            );
            let data = chunk.decode()?;
            writer.write_all(&data).await?;
            written += data.len() as u64;
        }
        writer.flush().await?;

        if written != u64::from(entry.data.file_size) {
            warn!(
                path = %entry.path,
                declared = entry.data.file_size,
                written,
                "decoded size differs from directory entry"
            );
        }
        Ok(written)
    }

    /// Extract file to disk
    pub async fn extract_to_file(&self, entry: &HpiFileEntry, output_path: &Path) -> Result<u64> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(output_path).await?;
        let result = self.extract_to_writer(entry, &mut file).await;
        // chunks decoded before a failure still reach the file
        let flushed = file.flush().await;
        let written = result?;
        flushed?;
        Ok(written)
    }

    /// Extract file to stdout
    pub async fn extract_to_stdout(&self, entry: &HpiFileEntry) -> Result<u64> {
        let mut stdout = tokio::io::stdout();
        self.extract_to_writer(entry, &mut stdout).await
    }

    /// Recreate the whole archive tree under `dest`.
    ///
    /// Stops at the first error; files extracted before it stay on disk.
    pub async fn extract_all(&self, dest: &Path) -> Result<ExtractSummary> {
        let mut summary = ExtractSummary::default();
        for entry in self.list_files().await? {
            let output_path = entry.output_path(dest);
            summary.bytes += self.extract_to_file(&entry, &output_path).await?;
            summary.files += 1;
        }
        debug!(files = summary.files, bytes = summary.bytes, "extracted archive");
        Ok(summary)
    }
}
