//! Block-structured buffered reader/writer with transparent per-block
//! compression.
//!
//! A buffer is bound to a channel for read xor write, never both — this is
//! expressed as two distinct types, [`IoReader`] and [`IoWriter`], rather
//! than one type with a runtime mode flag, so a reader can never accidentally
//! be asked to write and `Drop`'s best-effort final flush only exists where
//! it is meaningful. Both share the same block size / record size
//! configuration surface and the same [`CompressionMethod`] set.
//!
//! `record_size` is used purely as a padding quantum so records are never
//! split across a compressed block boundary; the buffer itself is agnostic
//! of record content.
//!
//! Readers that also implement [`std::io::Seek`] get random-access
//! skip-forward ([`IoReader::skip`]) for free; others must call `read` and
//! discard the result.

pub mod block;
pub mod codec;

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::config::{BLOCK_SIZE_DEFAULT, BLOCK_SIZE_MAX, RECORD_SIZE_DEFAULT};
use crate::error::{CoreError, Result, Site};
pub use codec::CompressionMethod;

/// Configuration shared by [`IoReader`] and [`IoWriter`]. Frozen after first
/// use; see [`CoreError::CallOrder`].
struct BufConfig {
    block_size: usize,
    record_size: usize,
    method: CompressionMethod,
    frozen: bool,
}

impl BufConfig {
    fn new() -> Self {
        BufConfig {
            block_size: BLOCK_SIZE_DEFAULT,
            record_size: RECORD_SIZE_DEFAULT,
            method: CompressionMethod::None,
            frozen: false,
        }
    }

    fn reject_if_frozen(&self, site: Site) -> Result<()> {
        if self.frozen {
            return Err(CoreError::CallOrder {
                site,
                detail: "block-size/record-size are frozen after first read or write".into(),
            });
        }
        Ok(())
    }

    fn set_block_size(&mut self, size: usize) -> Result<()> {
        self.reject_if_frozen("set_block_size")?;
        if size == 0 || size > BLOCK_SIZE_MAX {
            return Err(CoreError::args("set_block_size", format!("{size} out of range")));
        }
        self.block_size = size;
        Ok(())
    }

    fn set_record_size(&mut self, size: usize) -> Result<()> {
        self.reject_if_frozen("set_record_size")?;
        if size == 0 {
            return Err(CoreError::args("set_record_size", "record size must be nonzero"));
        }
        self.record_size = size;
        Ok(())
    }

    fn aligned_block_capacity(&self) -> usize {
        self.block_size - (self.block_size % self.record_size)
    }
}

/// A block-level buffered reader over an abstract byte channel.
pub struct IoReader<C> {
    channel: C,
    cfg: BufConfig,
    total_bytes: usize,
    first_error: Option<String>,
    decoded: Vec<u8>,
    decoded_pos: usize,
    at_eof: bool,
}

impl<C: Read> IoReader<C> {
    /// Binds `channel` for reading under `method`. Block size and record
    /// size default to [`crate::config::BLOCK_SIZE_DEFAULT`] /
    /// [`crate::config::RECORD_SIZE_DEFAULT`]; set them before the first
    /// `read` if different values are required.
    pub fn bind(channel: C, method: CompressionMethod) -> Self {
        IoReader {
            channel,
            cfg: BufConfig { method, ..BufConfig::new() },
            total_bytes: 0,
            first_error: None,
            decoded: Vec::new(),
            decoded_pos: 0,
            at_eof: false,
        }
    }

    pub fn set_block_size(&mut self, size: usize) -> Result<()> {
        self.cfg.set_block_size(size)
    }

    pub fn set_record_size(&mut self, size: usize) -> Result<()> {
        self.cfg.set_record_size(size)
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn last_error_message(&self) -> Option<&str> {
        self.first_error.as_deref()
    }

    fn note_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            if self.first_error.is_none() {
                self.first_error = Some(e.to_string());
            }
        }
        result
    }

    /// Reads exactly `n` bytes, looping over blocks as needed. Returns fewer
    /// than `n` bytes only at end-of-stream.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        self.cfg.frozen = true;
        let result = self.read_inner(n);
        self.note_error(result)
    }

    fn read_inner(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if self.decoded_pos >= self.decoded.len() {
                if self.at_eof {
                    break;
                }
                if !self.fill_next_block()? {
                    self.at_eof = true;
                    break;
                }
            }
            let avail = self.decoded.len() - self.decoded_pos;
            let take = avail.min(n - out.len());
            out.extend_from_slice(&self.decoded[self.decoded_pos..self.decoded_pos + take]);
            self.decoded_pos += take;
        }
        self.total_bytes += out.len();
        Ok(out)
    }

    /// Reads bytes up to and including the first occurrence of `byte`, or to
    /// end-of-stream if `byte` never appears.
    pub fn read_until(&mut self, byte: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let chunk = self.read(1)?;
            if chunk.is_empty() {
                break;
            }
            let hit = chunk[0] == byte;
            out.push(chunk[0]);
            if hit {
                break;
            }
        }
        Ok(out)
    }

    /// Pushes bytes back onto the front of the read cursor so a subsequent
    /// `read` sees them again. Used by parsers that peek before deciding how
    /// much to consume.
    pub fn unget(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let remaining: Vec<u8> = self.decoded[self.decoded_pos..].to_vec();
        self.decoded.clear();
        self.decoded.extend_from_slice(bytes);
        self.decoded.extend_from_slice(&remaining);
        self.decoded_pos = 0;
        self.total_bytes = self.total_bytes.saturating_sub(bytes.len());
    }

    /// Decodes the next block into `self.decoded`, resetting the read
    /// cursor. Returns `Ok(false)` at end-of-stream.
    fn fill_next_block(&mut self) -> Result<bool> {
        if self.cfg.method == CompressionMethod::None {
            let cap = self.cfg.aligned_block_capacity();
            let mut buf = vec![0u8; cap];
            let n = read_best_effort(&mut self.channel, &mut buf)
                .map_err(|e| CoreError::io("fill_next_block", e))?;
            if n == 0 {
                return Ok(false);
            }
            buf.truncate(n);
            self.decoded = buf;
            self.decoded_pos = 0;
            return Ok(true);
        }

        let header = block::read_block_header(&mut self.channel, "fill_next_block")?;
        let Some(header) = header else {
            return Ok(false);
        };
        let decoded = self.decode_known_block(&header)?;
        self.decoded = decoded;
        self.decoded_pos = 0;
        Ok(true)
    }

    fn decode_known_block(&mut self, header: &block::BlockHeader) -> Result<Vec<u8>> {
        let mut compressed = vec![0u8; header.compr_size as usize];
        self.channel.read_exact(&mut compressed).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                CoreError::ShortRead { site: "decode_known_block", expected: compressed.len(), got: 0 }
            } else {
                CoreError::io("decode_known_block", e)
            }
        })?;
        let codec = codec::codec_for(self.cfg.method)
            .ok_or(CoreError::BadCompression { method: self.cfg.method.to_wire() })?;
        // `decompress` is handed `expected_len` so codecs that pre-allocate
        // can reserve `expected_len + DECOMPRESS_OVERRUN_PAD` slack for
        // decompressors that write past their logical output in 4-byte
        // units; the advertised `uncompr_size` remains the authoritative
        // length regardless of how much the codec actually produced.
        let decoded = codec
            .decompress(&compressed, header.uncompr_size as usize)
            .map_err(|e| CoreError::io("decode_known_block", e))?;
        if decoded.len() != header.uncompr_size as usize {
            return Err(CoreError::BadHeader {
                site: "decode_known_block",
                detail: format!(
                    "decompressed {} bytes, header advertised {}",
                    decoded.len(),
                    header.uncompr_size
                ),
            });
        }
        Ok(decoded)
    }
}

impl<C: Read + Seek> IoReader<C> {
    /// Discards the next `n` bytes. When the bound channel supports seeking,
    /// whole blocks are skipped via `seek` instead of being decompressed; if
    /// a seek would land past EOF this falls back to decoding the final
    /// block so it is still delivered to a subsequent `read`. When `n` falls
    /// inside a block, that block is decoded and the cursor advanced within
    /// it — it is never worth seeking for less than a full block.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.cfg.frozen = true;
        let result = self.skip_inner(n);
        self.note_error(result)
    }

    fn skip_inner(&mut self, mut remaining: usize) -> Result<()> {
        while remaining > 0 {
            if self.decoded_pos < self.decoded.len() {
                let avail = self.decoded.len() - self.decoded_pos;
                let take = avail.min(remaining);
                self.decoded_pos += take;
                remaining -= take;
                self.total_bytes += take;
                continue;
            }
            if self.at_eof {
                break;
            }
            if self.cfg.method == CompressionMethod::None {
                if !self.fill_next_block()? {
                    self.at_eof = true;
                }
                continue;
            }
            let header = block::read_block_header(&mut self.channel, "skip")?;
            let Some(header) = header else {
                self.at_eof = true;
                break;
            };
            if remaining < header.uncompr_size as usize {
                // Skip lands inside this block: decode it and let the loop
                // top consume what's needed from `self.decoded`.
                self.decoded = self.decode_known_block(&header)?;
                self.decoded_pos = 0;
                continue;
            }
            let before = self
                .channel
                .stream_position()
                .map_err(|e| CoreError::io("skip", e))?;
            let target = before + header.compr_size as u64;
            let end = self.channel.seek(SeekFrom::End(0)).map_err(|e| CoreError::io("skip", e))?;
            if target > end {
                // Landed past EOF: rewind and decode the final block for real.
                self.channel
                    .seek(SeekFrom::Start(end.saturating_sub(header.compr_size as u64)))
                    .map_err(|e| CoreError::io("skip", e))?;
                self.decoded = self.decode_known_block(&header)?;
                self.decoded_pos = 0;
                continue;
            }
            self.channel.seek(SeekFrom::Start(target)).map_err(|e| CoreError::io("skip", e))?;
            remaining -= header.uncompr_size as usize;
            self.total_bytes += header.uncompr_size as usize;
        }
        Ok(())
    }
}

/// A block-level buffered writer over an abstract byte channel.
pub struct IoWriter<C: Write> {
    channel: C,
    cfg: BufConfig,
    total_bytes: usize,
    first_error: Option<String>,
    pending: Vec<u8>,
    finished: bool,
}

impl<C: Write> IoWriter<C> {
    pub fn bind(channel: C, method: CompressionMethod) -> Self {
        IoWriter {
            channel,
            cfg: BufConfig { method, ..BufConfig::new() },
            total_bytes: 0,
            first_error: None,
            pending: Vec::new(),
            finished: false,
        }
    }

    pub fn set_block_size(&mut self, size: usize) -> Result<()> {
        self.cfg.set_block_size(size)
    }

    pub fn set_record_size(&mut self, size: usize) -> Result<()> {
        self.cfg.set_record_size(size)
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn last_error_message(&self) -> Option<&str> {
        self.first_error.as_deref()
    }

    fn note_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            if self.first_error.is_none() {
                self.first_error = Some(e.to_string());
            }
        }
        result
    }

    /// Buffers `data`, flushing full blocks to the channel as the pending
    /// buffer reaches the record-aligned block capacity.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.cfg.frozen = true;
        let result = self.write_inner(data);
        self.note_error(result)
    }

    fn write_inner(&mut self, data: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(data);
        let capacity = self.cfg.aligned_block_capacity();
        while capacity > 0 && self.pending.len() >= capacity {
            let block: Vec<u8> = self.pending.drain(..capacity).collect();
            self.emit_block(&block)?;
        }
        self.total_bytes += data.len();
        Ok(())
    }

    /// Flushes any partial block (which must already be record-aligned).
    pub fn flush(&mut self) -> Result<()> {
        let result = self.flush_inner();
        self.note_error(result)
    }

    fn flush_inner(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            let block = std::mem::take(&mut self.pending);
            self.emit_block(&block)?;
        }
        self.channel.flush().map_err(|e| CoreError::io("flush", e))
    }

    /// Writes the end-of-stream sentinel for compressed streams (a no-op for
    /// `none`). Idempotent; safe to call more than once.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if self.cfg.method != CompressionMethod::None {
            block::write_end_of_stream(&mut self.channel, "finish")?;
        }
        Ok(())
    }

    fn emit_block(&mut self, block: &[u8]) -> Result<()> {
        if self.cfg.method == CompressionMethod::None {
            return self.channel.write_all(block).map_err(|e| CoreError::io("write", e));
        }
        let codec = codec::codec_for(self.cfg.method)
            .ok_or(CoreError::BadCompression { method: self.cfg.method.to_wire() })?;
        let compressed = codec.compress(block).map_err(|e| CoreError::io("write", e))?;
        let header =
            block::BlockHeader { compr_size: compressed.len() as u32, uncompr_size: block.len() as u32 };
        block::write_block_header(&mut self.channel, &header, "write")?;
        self.channel.write_all(&compressed).map_err(|e| CoreError::io("write", e))
    }
}

impl<C: Write> Drop for IoWriter<C> {
    fn drop(&mut self) {
        // Best-effort: a destructor must not fail. Any flush/finish error is
        // swallowed here; callers that need to observe it must call
        // `flush`/`finish` explicitly before the writer goes out of scope.
        let _ = self.flush();
        let _ = self.finish();
    }
}

/// Reads from `r` into `buf`, looping until `buf` is full or EOF. Never
/// returns a partial fill except at true end-of-stream.
fn read_best_effort(r: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
