use serde::{Deserialize, Serialize};

/// Tuning knobs for [`decode_with`](crate::decode_with).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Upper bound on media entries extracted concurrently.
    pub media_concurrency: usize,
    /// Reject any single entry whose declared uncompressed size is larger.
    pub max_entry_size: Option<u64>,
    /// Check each entry's CRC-32 against the central directory.
    pub verify_crc: bool,
    /// When false, media is not extracted and `media_files` stays empty.
    pub resolve_media: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            media_concurrency: 4,
            max_entry_size: Some(512 * 1024 * 1024),
            verify_crc: true,
            resolve_media: true,
        }
    }
}
