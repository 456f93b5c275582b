//! Random-access byte sources for the container parser.

mod memory;

pub use memory::MemoryReader;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// Implementations fill `buf` completely or fail; a short read past the
    /// end of the source is an error, not a partial success.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}
