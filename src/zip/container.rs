use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DecodeError, Result};
use crate::io::{MemoryReader, ReadAt};

use super::extractor::ZipExtractor;
use super::structures::{EndOfCentralDirectory, LFH_SIGNATURE, ZipFileEntry};

/// An opened package archive.
///
/// The central directory is parsed once in [`Container::open`]; every later
/// lookup or [`Container::read`] works from that cached listing.
pub struct Container<R: ReadAt = MemoryReader> {
    extractor: ZipExtractor<R>,
    entries: Vec<ZipFileEntry>,
    by_name: HashMap<String, usize>,
}

impl Container<MemoryReader> {
    /// Open a package held entirely in memory.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::NotAContainer`] if the buffer does not begin with
    /// a ZIP signature or has no end-of-central-directory record.
    pub async fn open(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::open_with(bytes, None, true).await
    }

    pub async fn open_with(
        bytes: impl Into<Arc<[u8]>>,
        max_entry_size: Option<u64>,
        verify_crc: bool,
    ) -> Result<Self> {
        let reader = MemoryReader::new(bytes);
        let magic = reader.slice(0, 4).map_err(|_| DecodeError::NotAContainer)?;
        if magic != LFH_SIGNATURE && magic != EndOfCentralDirectory::SIGNATURE {
            return Err(DecodeError::NotAContainer);
        }
        let extractor = ZipExtractor::new(Arc::new(reader))
            .max_entry_size(max_entry_size)
            .verify_crc(verify_crc);
        Self::from_extractor(extractor).await
    }
}

impl<R: ReadAt> Container<R> {
    async fn from_extractor(extractor: ZipExtractor<R>) -> Result<Self> {
        let entries = extractor.list_files().await?;
        // Later duplicates shadow earlier ones, as with most unzip tools
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.file_name.clone(), i))
            .collect();
        log::debug!("Opened package container with {} entries", entries.len());
        Ok(Self {
            extractor,
            entries,
            by_name,
        })
    }

    /// All entries in central-directory order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&ZipFileEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Read and inflate the entry called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::EntryNotFound`] if the archive has no such entry.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(name)
            .ok_or_else(|| DecodeError::EntryNotFound(name.to_string()))?;
        self.extractor.extract_to_memory(entry).await
    }
}
