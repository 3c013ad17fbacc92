use super::ReadAt;
use anyhow::Result;
use async_trait::async_trait;

/// Archive held entirely in memory
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_read_at_tail() {
        let reader = MemoryReader::new(vec![1, 2, 3, 4]);
        let mut buf = [0u8; 8];
        assert_eq!(reader.read_at(2, &mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], &[3, 4]);
        assert_eq!(reader.read_at(9, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn read_exact_fails_past_end() {
        let reader = MemoryReader::new(vec![0; 10]);
        let mut buf = [0u8; 4];
        assert!(reader.read_exact_at(6, &mut buf).await.is_ok());
        let err = reader.read_exact_at(8, &mut buf).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::HpiError>(),
            Some(crate::HpiError::UnexpectedEof { offset: 10, missing: 2 })
        ));
    }
}
