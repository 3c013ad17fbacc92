mod http;
mod local;
mod memory;

pub use http::{HttpOptions, HttpRangeReader};
pub use local::LocalFileReader;
pub use memory::MemoryReader;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::HpiError;

/// Trait for random access reading from an archive source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer, returning the
    /// number of bytes read. A short count is allowed.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill the whole buffer from `offset`, failing if the source ends first.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let pos = offset + filled as u64;
            let n = self.read_at(pos, &mut buf[filled..]).await?;
            if n == 0 {
                return Err(HpiError::UnexpectedEof {
                    offset: pos,
                    missing: (buf.len() - filled) as u64,
                }
                .into());
            }
            filled += n;
        }
        Ok(())
    }
}
