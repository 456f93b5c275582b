//! Manual decoder for the protobuf media manifest.
//!
//! No schema ships with packages for this message, so it is walked by hand:
//!
//! ```text
//! MediaEntries { repeated MediaEntry entries = 1; }
//! MediaEntry   { string name = 1; uint32 size = 2; bytes sha1 = 3;
//!                optional uint32 legacy_zip_filename = 255; }
//! ```
//!
//! Entry `n` in the buffer is stored in the archive as the entry named `"n"`.
//! Nothing in the format records this; indices are assigned by position, and
//! when an entry does carry `legacy_zip_filename` it must agree.

use serde::Serialize;

use super::wire::{self, Tag, WireError, WireType};
use crate::error::{DecodeError, Result};

const ENTRY_FIELD: u32 = 1;
const NAME_FIELD: u32 = 1;
const LEGACY_ZIP_FILENAME_FIELD: u32 = 255;

/// One manifest record: archive entry `index` holds the file `filename`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MediaManifestEntry {
    pub index: String,
    pub filename: String,
}

impl MediaManifestEntry {
    pub fn new(index: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            filename: filename.into(),
        }
    }
}

fn malformed(err: WireError) -> DecodeError {
    DecodeError::MalformedMediaManifest(err.to_string())
}

/// Decode a protobuf media manifest.
///
/// Decoding stops cleanly at end of buffer. Unknown fields at either nesting
/// level are skipped when varint or length-delimited, and rejected otherwise.
pub fn decode_media_manifest(buf: &[u8]) -> Result<Vec<MediaManifestEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0;
    let mut index = 0u64;

    while offset < buf.len() {
        let (tag, next) = wire::read_tag(buf, offset).map_err(malformed)?;
        offset = match (tag.field, tag.wire_type()) {
            (ENTRY_FIELD, Some(WireType::LengthDelimited)) => {
                let (payload, next) = wire::read_length_delimited(buf, next).map_err(malformed)?;
                match decode_entry(payload, index)? {
                    Some(filename) => {
                        entries.push(MediaManifestEntry::new(index.to_string(), filename))
                    }
                    None => log::warn!("Media manifest entry {index} has no filename"),
                }
                index += 1;
                next
            }
            _ => skip(buf, next, tag)?,
        };
    }

    log::debug!("Decoded protobuf media manifest with {} entries", entries.len());
    Ok(entries)
}

/// Decode one `MediaEntry`, returning its filename if it has one.
fn decode_entry(buf: &[u8], index: u64) -> Result<Option<String>> {
    let mut filename = None;
    let mut offset = 0;

    while offset < buf.len() {
        let (tag, next) = wire::read_tag(buf, offset).map_err(malformed)?;
        offset = match (tag.field, tag.wire_type()) {
            (NAME_FIELD, Some(WireType::LengthDelimited)) => {
                let (raw, next) = wire::read_length_delimited(buf, next).map_err(malformed)?;
                let name = std::str::from_utf8(raw).map_err(|_| {
                    DecodeError::MalformedMediaManifest(format!(
                        "filename of entry {index} is not UTF-8"
                    ))
                })?;
                filename = Some(name.to_string());
                next
            }
            (LEGACY_ZIP_FILENAME_FIELD, Some(WireType::Varint)) => {
                let (stored, next) = wire::read_varint(buf, next).map_err(malformed)?;
                check_index(stored, index)?;
                next
            }
            // size (2) and sha1 (3) are not needed; they fall through here too
            _ => skip(buf, next, tag)?,
        };
    }

    Ok(filename)
}

fn skip(buf: &[u8], offset: usize, tag: Tag) -> Result<usize> {
    wire::skip_field(buf, offset, tag).map_err(malformed)
}

fn check_index(stored: u64, assigned: u64) -> Result<()> {
    if stored != assigned {
        return Err(DecodeError::MalformedMediaManifest(format!(
            "entry {assigned} names archive entry {stored}; manifest order and archive numbering disagree"
        )));
    }
    Ok(())
}
