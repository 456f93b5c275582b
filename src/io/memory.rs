use super::ReadAt;
use crate::error::{DecodeError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// In-memory reader over the immutable package buffer.
///
/// Cloning is cheap: clones share the same underlying bytes.
#[derive(Clone)]
pub struct MemoryReader {
    data: Arc<[u8]>,
}

impl MemoryReader {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// Borrow `len` bytes starting at `offset` without copying.
    pub fn slice(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let start = usize::try_from(offset)
            .map_err(|_| DecodeError::Container(format!("offset {offset} out of range")))?;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                DecodeError::Container(format!(
                    "read of {len} bytes at offset {offset} runs past end of archive ({} bytes)",
                    self.data.len()
                ))
            })?;
        Ok(&self.data[start..end])
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let src = self.slice(offset, buf.len())?;
        buf.copy_from_slice(src);
        Ok(buf.len())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
