use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::error::{DecodeError, Result};
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Upper bound on preallocation for inflated data, relative to its compressed size.
const MAX_PREALLOC_RATIO: usize = 8;

/// ZIP entry extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
    max_entry_size: Option<u64>,
    verify_crc: bool,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
            max_entry_size: None,
            verify_crc: true,
        }
    }

    /// Refuse to inflate entries whose declared size exceeds `limit`.
    pub fn max_entry_size(mut self, limit: Option<u64>) -> Self {
        self.max_entry_size = limit;
        self
    }

    pub fn verify_crc(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Extract file data to memory, inflating DEFLATE entries.
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if entry.is_encrypted() {
            return Err(DecodeError::Container(format!(
                "entry {} is encrypted",
                entry.file_name
            )));
        }
        if let Some(limit) = self.max_entry_size {
            if entry.uncompressed_size > limit {
                return Err(DecodeError::Container(format!(
                    "entry {} declares {} bytes, above the {limit} byte limit",
                    entry.file_name, entry.uncompressed_size
                )));
            }
        }

        let data_offset = self.parser.get_data_offset(entry).await?;
        let end = data_offset.checked_add(entry.compressed_size);
        if end.is_none_or(|end| end > self.parser.reader().size()) {
            return Err(DecodeError::Container(format!(
                "entry {} extends past the end of the archive",
                entry.file_name
            )));
        }
        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser.reader().read_at(data_offset, &mut raw).await?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                // The declared size is untrusted; it only bounds the output
                let capacity = usize::try_from(entry.uncompressed_size)
                    .unwrap_or(usize::MAX)
                    .min(raw.len().saturating_mul(MAX_PREALLOC_RATIO));
                let mut out = Vec::with_capacity(capacity);
                // One extra byte lets an oversized stream show up as a size mismatch
                DeflateDecoder::new(&raw[..])
                    .take(entry.uncompressed_size.saturating_add(1))
                    .read_to_end(&mut out)
                    .map_err(|e| {
                        DecodeError::Container(format!(
                            "failed to inflate {}: {e}",
                            entry.file_name
                        ))
                    })?;
                out
            }
            CompressionMethod::Unknown(method) => {
                return Err(DecodeError::Container(format!(
                    "unsupported compression method {method} for {}",
                    entry.file_name
                )));
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            return Err(DecodeError::Container(format!(
                "size mismatch for {}: expected {} bytes, got {}",
                entry.file_name,
                entry.uncompressed_size,
                data.len()
            )));
        }

        if self.verify_crc {
            let mut crc = Crc::new();
            crc.update(&data);
            if crc.sum() != entry.crc32 {
                return Err(DecodeError::Container(format!(
                    "CRC mismatch for {}: expected {:#010x}, got {:#010x}",
                    entry.file_name,
                    entry.crc32,
                    crc.sum()
                )));
            }
        }

        Ok(data)
    }
}
