//! Zstandard frame detection and decompression.
//!
//! Modern packages zstd-frame the collection, the media manifest and each
//! media payload independently; legacy packages store them plain. Callers
//! never assume either: [`maybe_decompress`] is applied to every payload.

use std::io::Read;

use crate::error::{DecodeError, Result};

/// The 4-byte magic number that opens every Zstandard frame.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

pub fn is_zstd_frame(bytes: &[u8]) -> bool {
    bytes.starts_with(&ZSTD_MAGIC)
}

/// Decompress `bytes` if they start with a Zstandard frame, otherwise return them unchanged.
///
/// # Errors
///
/// Returns [`DecodeError::DecompressionError`] only when the magic is present
/// but the frame is truncated or corrupt. Missing magic is never an error.
pub fn maybe_decompress(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if !is_zstd_frame(&bytes) {
        return Ok(bytes);
    }

    let mut out = Vec::with_capacity(bytes.len().saturating_mul(3));
    zstd::stream::read::Decoder::with_buffer(&bytes[..])
        .and_then(|mut dec| dec.read_to_end(&mut out))
        .map_err(|e| DecodeError::DecompressionError(e.to_string()))?;

    log::trace!("Decompressed zstd frame: {} -> {} bytes", bytes.len(), out.len());
    Ok(out)
}
