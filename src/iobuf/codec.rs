//! Compression method registry.
//!
//! A [`CompressionMethod`] is the on-disk byte stored in a file header and in
//! each block-stream prefix; a [`Codec`] is the in-process behavior bound to
//! that id. `none` is always available and never goes through the
//! size-prefixed block format (see [`crate::iobuf::block`]); the others are
//! looked up through [`codec_for`].

use std::io;

use crate::error::{CoreError, Result};

/// On-disk compression method id, as carried in a file header's start record
/// and in each compressed block's implicit framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    None,
    Zlib,
    Lzo,
    Snappy,
}

impl CompressionMethod {
    pub fn to_wire(self) -> u8 {
        match self {
            CompressionMethod::None => 0,
            CompressionMethod::Zlib => 1,
            CompressionMethod::Lzo => 2,
            CompressionMethod::Snappy => 3,
        }
    }

    pub fn from_wire(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(CompressionMethod::None),
            1 => Ok(CompressionMethod::Zlib),
            2 => Ok(CompressionMethod::Lzo),
            3 => Ok(CompressionMethod::Snappy),
            other => Err(CoreError::BadCompression { method: other }),
        }
    }
}

/// A compression codec bound to a [`CompressionMethod`].
///
/// `compress`/`decompress` operate on whole blocks already sized by the
/// caller; codecs never see the size-prefix framing.
pub trait Codec {
    fn compress(&self, src: &[u8]) -> io::Result<Vec<u8>>;

    /// Decompresses `src` into a buffer sized `expected_len + pad` bytes,
    /// where `pad` is [`crate::config::DECOMPRESS_OVERRUN_PAD`]. Returns the
    /// number of bytes actually produced; callers must verify this equals
    /// `expected_len`.
    fn decompress(&self, src: &[u8], expected_len: usize) -> io::Result<Vec<u8>>;
}

struct NoneCodec;

impl Codec for NoneCodec {
    fn compress(&self, src: &[u8]) -> io::Result<Vec<u8>> {
        Ok(src.to_vec())
    }

    fn decompress(&self, src: &[u8], _expected_len: usize) -> io::Result<Vec<u8>> {
        Ok(src.to_vec())
    }
}

struct ZlibCodec;

impl Codec for ZlibCodec {
    fn compress(&self, src: &[u8]) -> io::Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(src)?;
        encoder.finish()
    }

    fn decompress(&self, src: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        let mut decoder = ZlibDecoder::new(src);
        let mut out = Vec::with_capacity(expected_len + crate::config::DECOMPRESS_OVERRUN_PAD);
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

struct SnappyCodec;

impl Codec for SnappyCodec {
    fn compress(&self, src: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = snap::raw::Encoder::new();
        encoder
            .compress_vec(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn decompress(&self, src: &[u8], _expected_len: usize) -> io::Result<Vec<u8>> {
        let mut decoder = snap::raw::Decoder::new();
        decoder
            .decompress_vec(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Returns the codec implementation for `method`, or `None` when the method
/// is a recognized on-disk id that this build does not compile in (`lzo`).
pub fn codec_for(method: CompressionMethod) -> Option<Box<dyn Codec>> {
    match method {
        CompressionMethod::None => Some(Box::new(NoneCodec)),
        CompressionMethod::Zlib => Some(Box::new(ZlibCodec)),
        CompressionMethod::Snappy => Some(Box::new(SnappyCodec)),
        CompressionMethod::Lzo => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip_all_methods() {
        for m in [
            CompressionMethod::None,
            CompressionMethod::Zlib,
            CompressionMethod::Lzo,
            CompressionMethod::Snappy,
        ] {
            assert_eq!(CompressionMethod::from_wire(m.to_wire()).unwrap(), m);
        }
    }

    #[test]
    fn unknown_wire_byte_is_bad_compression() {
        assert!(matches!(
            CompressionMethod::from_wire(200),
            Err(CoreError::BadCompression { method: 200 })
        ));
    }

    #[test]
    fn lzo_is_recognized_but_not_compiled_in() {
        assert!(codec_for(CompressionMethod::Lzo).is_none());
    }

    #[test]
    fn zlib_round_trip() {
        let codec = codec_for(CompressionMethod::Zlib).unwrap();
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let compressed = codec.compress(&data).unwrap();
        let decompressed = codec.decompress(&compressed, data.len()).unwrap();
        assert_eq!(&decompressed[..data.len()], &data[..]);
    }

    #[test]
    fn snappy_round_trip() {
        let codec = codec_for(CompressionMethod::Snappy).unwrap();
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let compressed = codec.compress(&data).unwrap();
        let decompressed = codec.decompress(&compressed, data.len()).unwrap();
        assert_eq!(&decompressed[..data.len()], &data[..]);
    }
}
