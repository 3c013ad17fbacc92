use flate2::read::ZlibDecoder;
use std::io::{Cursor, Read};
use tracing::trace;

use anyhow::Result;

use super::cipher::decrypt_chunk;
use super::lz;
use super::structures::{CHUNK_MAGIC, CHUNK_SIZE, ChunkHeader, CompressionMethod};
use crate::error::HpiError;

/// A framed chunk: header plus its compressed payload
#[derive(Debug, Clone)]
pub struct Chunk {
    pub header: ChunkHeader,
    pub data: Vec<u8>,
}

impl Chunk {
    /// Frame chunk `index` from a decrypted chunk region.
    ///
    /// `base` is the archive offset of the region, used only for error context.
    pub fn read_from(cursor: &mut Cursor<&[u8]>, index: usize, base: u64) -> Result<Self> {
        let offset = base + cursor.position();
        let mut raw = [0u8; ChunkHeader::SIZE];
        take_exact(cursor, &mut raw, index, offset)?;

        let header = ChunkHeader::from_bytes(&raw)?;
        if header.marker != CHUNK_MAGIC {
            return Err(HpiError::InvalidChunkMarker {
                offset,
                actual: header.marker,
            }
            .into());
        }

        let payload_offset = offset + ChunkHeader::SIZE as u64;
        ensure_available(cursor, u64::from(header.compressed_size), index, payload_offset)?;
        let mut data = vec![0u8; header.compressed_size as usize];
        cursor.read_exact(&mut data)?;

        Ok(Self { header, data })
    }

    /// Undo the payload transform if the header asks for it, then decompress.
    pub fn decode(mut self) -> Result<Vec<u8>> {
        if self.header.is_encrypted() {
            decrypt_chunk(&mut self.data);
        }
        decode_payload(
            self.header.compression_method,
            &self.data,
            self.header.decompressed_size as usize,
        )
    }
}

fn take_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8], index: usize, offset: u64) -> Result<()> {
    ensure_available(cursor, buf.len() as u64, index, offset)?;
    cursor.read_exact(buf)?;
    Ok(())
}

/// Short-read check, done before any payload buffer is allocated.
fn ensure_available(cursor: &Cursor<&[u8]>, wanted: u64, index: usize, offset: u64) -> Result<(), HpiError> {
    let available = (cursor.get_ref().len() as u64).saturating_sub(cursor.position());
    if wanted > available {
        return Err(HpiError::ShortChunk {
            index,
            offset,
            expected: wanted,
            actual: available,
        });
    }
    Ok(())
}

/// Decompress a (decrypted) chunk payload, producing at most `limit` bytes.
pub fn decode_payload(method: CompressionMethod, payload: &[u8], limit: usize) -> Result<Vec<u8>> {
    trace!(method = method.name(), len = payload.len(), limit, "decoding chunk");

    match method {
        CompressionMethod::None => {
            if payload.len() > limit {
                return Err(HpiError::OutputOverrun { limit }.into());
            }
            Ok(payload.to_vec())
        }
        CompressionMethod::Lz77 => Ok(lz::decompress(payload, limit)?),
        CompressionMethod::Zlib => {
            let mut out = Vec::with_capacity(limit.min(CHUNK_SIZE as usize));
            ZlibDecoder::new(payload)
                .take(limit as u64 + 1)
                .read_to_end(&mut out)
                .map_err(HpiError::Zlib)?;
            if out.len() > limit {
                return Err(HpiError::OutputOverrun { limit }.into());
            }
            Ok(out)
        }
        CompressionMethod::Unknown(v) => Err(HpiError::UnknownCompressionMethod(v).into()),
    }
}
