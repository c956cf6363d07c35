//! On-disk block framing for compressed streams.
//!
//! Each block of a compressed stream (`compression-method != none`) is:
//!
//! ```text
//! [ compr_size   : u32 big-endian ]
//! [ uncompr_size : u32 big-endian ]
//! [ compressed payload : compr_size bytes ]
//! ```
//!
//! A `compr_size` of zero is the logical end-of-stream sentinel, allowing a
//! compressed sub-stream to be embedded inside a larger enclosing stream
//! without consuming it to EOF. When the bound compression method is `none`,
//! none of this framing is written or expected; see [`crate::iobuf::IoBuffer`].

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{CoreError, Result, Site};

/// The `compr_size` value reserved as the end-of-stream sentinel.
pub const END_OF_STREAM: u32 = 0;

#[derive(Debug)]
pub struct BlockHeader {
    pub compr_size: u32,
    pub uncompr_size: u32,
}

/// Reads one 8-byte block header. Returns `Ok(None)` at the end-of-stream
/// sentinel (`compr_size == 0`). A short read on the first byte of the
/// header (clean EOF) is also treated as end-of-stream; a short read in the
/// middle of the 8 bytes is a [`CoreError::ShortRead`].
pub fn read_block_header(r: &mut dyn Read, site: Site) -> Result<Option<BlockHeader>> {
    let mut first = [0u8; 4];
    match read_exact_or_eof(r, &mut first) {
        ReadOutcome::Eof => return Ok(None),
        ReadOutcome::Short(got) => {
            return Err(CoreError::ShortRead { site, expected: 4, got })
        }
        ReadOutcome::Full => {}
    }
    let compr_size = (&first[..]).read_u32::<BigEndian>().map_err(|e| CoreError::io(site, e))?;
    if compr_size == END_OF_STREAM {
        return Ok(None);
    }
    let uncompr_size = r
        .read_u32::<BigEndian>()
        .map_err(|e| CoreError::io(site, e))?;
    Ok(Some(BlockHeader { compr_size, uncompr_size }))
}

/// Writes one block header (not used for the end-of-stream sentinel; use
/// [`write_end_of_stream`] for that).
pub fn write_block_header(w: &mut dyn Write, header: &BlockHeader, site: Site) -> Result<()> {
    w.write_u32::<BigEndian>(header.compr_size)
        .map_err(|e| CoreError::io(site, e))?;
    w.write_u32::<BigEndian>(header.uncompr_size)
        .map_err(|e| CoreError::io(site, e))
}

/// Writes the end-of-stream sentinel (`compr_size = 0`, no `uncompr_size`
/// field, matching the embeddable sub-stream framing described above).
pub fn write_end_of_stream(w: &mut dyn Write, site: Site) -> Result<()> {
    w.write_u32::<BigEndian>(END_OF_STREAM)
        .map_err(|e| CoreError::io(site, e))
}

enum ReadOutcome {
    Full,
    Short(usize),
    Eof,
}

fn read_exact_or_eof(r: &mut dyn Read, buf: &mut [u8]) -> ReadOutcome {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 { ReadOutcome::Eof } else { ReadOutcome::Short(filled) };
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return ReadOutcome::Short(filled),
        }
    }
    ReadOutcome::Full
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = BlockHeader { compr_size: 1234, uncompr_size: 5678 };
        let mut buf = Vec::new();
        write_block_header(&mut buf, &header, "test").unwrap();
        let mut cursor = &buf[..];
        let read = read_block_header(&mut cursor, "test").unwrap().unwrap();
        assert_eq!(read.compr_size, 1234);
        assert_eq!(read.uncompr_size, 5678);
    }

    #[test]
    fn end_of_stream_sentinel_round_trips_to_none() {
        let mut buf = Vec::new();
        write_end_of_stream(&mut buf, "test").unwrap();
        let mut cursor = &buf[..];
        assert!(read_block_header(&mut cursor, "test").unwrap().is_none());
    }

    #[test]
    fn clean_eof_before_any_bytes_is_end_of_stream() {
        let buf: Vec<u8> = Vec::new();
        let mut cursor = &buf[..];
        assert!(read_block_header(&mut cursor, "test").unwrap().is_none());
    }

    #[test]
    fn truncated_header_is_short_read() {
        let buf = vec![0u8, 0, 0, 5]; // compr_size=5 (non-zero) then nothing
        let mut cursor = &buf[..];
        let err = read_block_header(&mut cursor, "test").unwrap_err();
        assert!(matches!(err, CoreError::Io { .. } | CoreError::ShortRead { .. }));
    }
}
