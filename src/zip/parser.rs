//! Central directory parsing.
//!
//! A package is read from its tail: the End of Central Directory record (or
//! its ZIP64 counterpart) says where the directory is, the directory lists
//! every entry, and each entry's local header says where its data begins.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::error::{DecodeError, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Largest archive comment the format can express.
const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

/// Reads ZIP structures from a [`ReadAt`] source.
///
/// Used through [`Container`](super::Container), which parses the directory
/// once and keeps the listing.
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    /// Find the central directory.
    ///
    /// The tail of the archive, long enough to hold the EOCD and the longest
    /// possible comment, is read once and searched from the end.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::NotAContainer`] if no EOCD record is present.
    pub async fn locate_directory(&self) -> Result<DirectoryLocation> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(DecodeError::NotAContainer);
        }

        let tail_len = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let tail_start = self.size - tail_len;
        let mut tail = vec![0u8; tail_len as usize];
        self.reader.read_at(tail_start, &mut tail).await?;

        let at = find_eocd(&tail).ok_or(DecodeError::NotAContainer)?;
        let eocd = EndOfCentralDirectory::from_bytes(&tail[at..])?;
        if !eocd.needs_zip64() {
            return Ok(eocd.location());
        }

        let eocd_offset = tail_start + at as u64;
        log::trace!("EOCD at {eocd_offset} defers to ZIP64 record");
        self.read_zip64_location(eocd_offset).await
    }

    async fn read_zip64_location(&self, eocd_offset: u64) -> Result<DirectoryLocation> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64Locator::SIZE as u64)
            .ok_or_else(|| DecodeError::Container("missing ZIP64 locator".into()))?;
        let mut locator = [0u8; Zip64Locator::SIZE];
        self.reader.read_at(locator_offset, &mut locator).await?;

        let record_offset = Zip64Locator::record_offset(&locator)?;
        let mut record = [0u8; Zip64EndOfCentralDirectory::MIN_SIZE];
        self.reader.read_at(record_offset, &mut record).await?;
        Zip64EndOfCentralDirectory::location(&record)
    }

    /// Read and parse the whole central directory.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Container`] if the directory lies outside the
    /// archive or any of its headers is damaged.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let location = self.locate_directory().await?;
        if location.offset.saturating_add(location.size) > self.size {
            return Err(DecodeError::Container(format!(
                "central directory ({} bytes at {}) exceeds archive size {}",
                location.size, location.offset, self.size
            )));
        }

        let mut directory = vec![0u8; location.size as usize];
        self.reader.read_at(location.offset, &mut directory).await?;

        // A lying entry count must not drive the allocation
        let capacity = usize::try_from(location.entries)
            .unwrap_or(usize::MAX)
            .min(directory.len() / CDFH_MIN_SIZE);
        let mut entries = Vec::with_capacity(capacity);
        let mut cursor = Cursor::new(directory.as_slice());
        for index in 0..location.entries {
            let entry = parse_directory_entry(&mut cursor).map_err(|e| match e {
                DecodeError::Io(io) => DecodeError::Container(format!(
                    "central directory truncated at entry {index}: {io}"
                )),
                other => other,
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Offset of an entry's data, past its local header.
    ///
    /// The local header repeats the name and may carry a different extra
    /// field than the directory, so its own lengths are used.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut header = [0u8; LFH_SIZE];
        self.reader.read_at(entry.lfh_offset, &mut header).await?;
        if &header[0..4] != LFH_SIGNATURE {
            return Err(DecodeError::Container(format!(
                "invalid local file header for {}",
                entry.file_name
            )));
        }

        let mut cursor = Cursor::new(&header[26..]);
        let name_len = u64::from(cursor.read_u16::<LittleEndian>()?);
        let extra_len = u64::from(cursor.read_u16::<LittleEndian>()?);
        Ok(entry.lfh_offset + LFH_SIZE as u64 + name_len + extra_len)
    }
}

/// Position of the EOCD record within `tail`, searching from the end.
///
/// A candidate only counts if its comment length accounts for exactly the
/// bytes that follow it.
fn find_eocd(tail: &[u8]) -> Option<usize> {
    let last = tail.len().checked_sub(EndOfCentralDirectory::SIZE)?;
    (0..=last).rev().find(|&i| {
        if &tail[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
            return false;
        }
        let comment_len = usize::from(u16::from_le_bytes([tail[i + 20], tail[i + 21]]));
        comment_len == tail.len() - i - EndOfCentralDirectory::SIZE
    })
}

fn parse_directory_entry(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(DecodeError::Container(format!(
            "invalid central directory header at offset {}",
            cursor.position() - 4
        )));
    }

    cursor.set_position(cursor.position() + 4); // versions
    let flags = cursor.read_u16::<LittleEndian>()?;
    let method = cursor.read_u16::<LittleEndian>()?;
    cursor.set_position(cursor.position() + 4); // modification time and date
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()?;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
    let name_len = cursor.read_u16::<LittleEndian>()? as usize;
    let extra_len = cursor.read_u16::<LittleEndian>()? as usize;
    let comment_len = cursor.read_u16::<LittleEndian>()? as u64;
    cursor.set_position(cursor.position() + 8); // disk start, attributes
    let lfh_offset = cursor.read_u32::<LittleEndian>()?;

    let mut name = vec![0u8; name_len];
    cursor.read_exact(&mut name)?;
    let mut extra = vec![0u8; extra_len];
    cursor.read_exact(&mut extra)?;
    cursor.set_position(cursor.position() + comment_len);

    // Lossy: package entry names are ASCII in practice
    let file_name = String::from_utf8_lossy(&name).into_owned();
    let mut entry = ZipFileEntry {
        is_directory: file_name.ends_with('/'),
        file_name,
        compression_method: CompressionMethod::from(method),
        compressed_size: u64::from(compressed_size),
        uncompressed_size: u64::from(uncompressed_size),
        crc32,
        lfh_offset: u64::from(lfh_offset),
        flags,
    };
    apply_zip64_extra(&extra, &mut entry)?;
    Ok(entry)
}

/// Replace saturated 32-bit fields with their ZIP64 extended values.
///
/// The block lists only the fields that overflowed, in a fixed order.
fn apply_zip64_extra(extra: &[u8], entry: &mut ZipFileEntry) -> Result<()> {
    let mut cursor = Cursor::new(extra);
    while (cursor.position() as usize) + 4 <= extra.len() {
        let id = cursor.read_u16::<LittleEndian>()?;
        let len = u64::from(cursor.read_u16::<LittleEndian>()?);
        let end = cursor.position() + len;
        if id == ZIP64_EXTRA_ID {
            let saturated = u64::from(u32::MAX);
            for field in [
                &mut entry.uncompressed_size,
                &mut entry.compressed_size,
                &mut entry.lfh_offset,
            ] {
                if *field == saturated && cursor.position() + 8 <= end {
                    *field = cursor.read_u64::<LittleEndian>()?;
                }
            }
        }
        cursor.set_position(end);
    }
    Ok(())
}
