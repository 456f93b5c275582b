//! Protocol Buffers wire-format primitives.
//!
//! Every reader is a pure function of `(buffer, offset)` returning the decoded
//! value together with the offset just past it. Nothing holds a cursor, so
//! each step can be tested in isolation and composed freely.

use thiserror::Error;

/// Longest legal varint encoding of a 64-bit value.
const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of buffer at offset {0}")]
    Truncated(usize),

    #[error("varint at offset {0} exceeds 64 bits")]
    VarintOverflow(usize),

    #[error("invalid field number 0 at offset {0}")]
    InvalidFieldNumber(usize),

    #[error("unsupported wire type {wire_type} for field {field} at offset {offset}")]
    UnsupportedWireType {
        field: u32,
        wire_type: u8,
        offset: usize,
    },
}

/// The wire types this crate accepts. Fixed-width and group encodings are
/// never produced by the messages found in packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    LengthDelimited,
}

/// A decoded field key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub field: u32,
    /// Raw 3-bit wire type; see [`Tag::wire_type`].
    pub raw_wire_type: u8,
}

impl Tag {
    pub fn wire_type(&self) -> Option<WireType> {
        match self.raw_wire_type {
            0 => Some(WireType::Varint),
            2 => Some(WireType::LengthDelimited),
            _ => None,
        }
    }
}

/// Read a base-128 varint starting at `offset`.
pub fn read_varint(buf: &[u8], offset: usize) -> Result<(u64, usize), WireError> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let pos = offset + i;
        let byte = *buf.get(pos).ok_or(WireError::Truncated(pos))?;
        if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return Err(WireError::VarintOverflow(offset));
        }
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, pos + 1));
        }
    }
    Err(WireError::VarintOverflow(offset))
}

/// Read a field key: wire type in the low 3 bits, field number above.
pub fn read_tag(buf: &[u8], offset: usize) -> Result<(Tag, usize), WireError> {
    let (key, next) = read_varint(buf, offset)?;
    let field = u32::try_from(key >> 3).map_err(|_| WireError::VarintOverflow(offset))?;
    if field == 0 {
        return Err(WireError::InvalidFieldNumber(offset));
    }
    let tag = Tag {
        field,
        raw_wire_type: (key & 0x07) as u8,
    };
    Ok((tag, next))
}

/// Read a length prefix and return the payload it covers.
pub fn read_length_delimited(buf: &[u8], offset: usize) -> Result<(&[u8], usize), WireError> {
    let (len, start) = read_varint(buf, offset)?;
    let end = usize::try_from(len)
        .ok()
        .and_then(|len| start.checked_add(len))
        .filter(|end| *end <= buf.len())
        .ok_or(WireError::Truncated(buf.len()))?;
    Ok((&buf[start..end], end))
}

/// Skip the value of a field whose tag has already been read.
///
/// Only varint and length-delimited values can be skipped; any other wire
/// type is an error rather than a guess.
pub fn skip_field(buf: &[u8], offset: usize, tag: Tag) -> Result<usize, WireError> {
    match tag.wire_type() {
        Some(WireType::Varint) => read_varint(buf, offset).map(|(_, next)| next),
        Some(WireType::LengthDelimited) => read_length_delimited(buf, offset).map(|(_, next)| next),
        None => Err(WireError::UnsupportedWireType {
            field: tag.field,
            wire_type: tag.raw_wire_type,
            offset,
        }),
    }
}

/// Walk the top-level fields of a message, checking every wire type is skippable.
pub fn check_fields(buf: &[u8]) -> Result<(), WireError> {
    let mut offset = 0;
    while offset < buf.len() {
        let (tag, next) = read_tag(buf, offset)?;
        offset = skip_field(buf, next, tag)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_single_and_multi_byte() {
        assert_eq!(read_varint(&[0x01], 0).unwrap(), (1, 1));
        // 300 = 0b1_0010_1100
        assert_eq!(read_varint(&[0xAC, 0x02], 0).unwrap(), (300, 2));
        assert_eq!(read_varint(&[0xFF, 0xAC, 0x02, 0x00], 1).unwrap(), (300, 3));
    }

    #[test]
    fn varint_max_and_overflow() {
        let max = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert_eq!(read_varint(&max, 0).unwrap(), (u64::MAX, 10));
        let too_long = [0xFF; 11];
        assert_eq!(read_varint(&too_long, 0), Err(WireError::VarintOverflow(0)));
    }

    #[test]
    fn varint_truncated() {
        assert_eq!(read_varint(&[0x80, 0x80], 0), Err(WireError::Truncated(2)));
    }

    #[test]
    fn tag_splits_field_and_wire_type() {
        let (tag, next) = read_tag(&[0x0A], 0).unwrap();
        assert_eq!((tag.field, tag.wire_type(), next), (1, Some(WireType::LengthDelimited), 1));
        // field 255, wire type 0 => key 2040 => [0xF8, 0x0F]
        let (tag, next) = read_tag(&[0xF8, 0x0F], 0).unwrap();
        assert_eq!((tag.field, tag.wire_type(), next), (255, Some(WireType::Varint), 2));
        assert_eq!(read_tag(&[0x02], 0), Err(WireError::InvalidFieldNumber(0)));
    }

    #[test]
    fn length_delimited_bounds() {
        let buf = [0x03, b'a', b'b', b'c', 0x09];
        assert_eq!(read_length_delimited(&buf, 0).unwrap(), (&b"abc"[..], 4));
        assert!(matches!(
            read_length_delimited(&[0x05, b'a'], 0),
            Err(WireError::Truncated(_))
        ));
    }

    #[test]
    fn skip_rejects_fixed_width() {
        let (tag, next) = read_tag(&[0x0D, 0, 0, 0, 0], 0).unwrap();
        assert!(matches!(
            skip_field(&[0x0D, 0, 0, 0, 0], next, tag),
            Err(WireError::UnsupportedWireType { field: 1, wire_type: 5, .. })
        ));
    }

    #[test]
    fn check_fields_walks_whole_message() {
        // field 1 varint 300, field 2 string "hi"
        let msg = [0x08, 0xAC, 0x02, 0x12, 0x02, b'h', b'i'];
        assert!(check_fields(&msg).is_ok());
        // field 3 fixed64
        let bad = [0x19, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(check_fields(&bad).is_err());
    }
}
