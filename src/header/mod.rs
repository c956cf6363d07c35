//! Typed, extensible file header shared by every on-disk artifact this crate
//! produces.
//!
//! A header is a fixed 16-byte [`HeaderStart`] followed by an ordered list of
//! typed [`HeaderEntry`] records, padded so the payload that follows starts
//! at a multiple of the header's padding modulus. [`FileHeader`] owns the
//! entry list and tracks a one-way [`Lock`] state that restricts further
//! structural mutation.

pub mod registry;

use std::io::{Read, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::config::HEADER_PADDING_MODULUS_DEFAULT;
use crate::error::{CoreError, Result};
use crate::iobuf::CompressionMethod;

/// The four magic bytes that open every header produced by this crate.
pub const MAGIC: u32 = 0xDEAD_BEEF;

/// Header-entry type-id reserved for padding; skipped on read, emitted on
/// write to align the payload to the header's padding modulus.
pub const ENTRY_PADDING: u32 = 0;

/// Header-entry type-id marking the end of the entry list.
pub const ENTRY_END: u32 = 1;

/// File-format id for a prefix-map file (see [`crate::pmap`]).
pub const FT_PREFIXMAP: u8 = 1;

/// Fixed-layout bytes that open every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderStart {
    pub big_endian: bool,
    pub file_format: u8,
    pub file_version: u8,
    pub compression: CompressionMethod,
    pub writer_tool_version: u32,
    pub record_size: u16,
    pub record_version: u16,
}

const START_LEN: usize = 16;

impl HeaderStart {
    fn file_flags(&self) -> u8 {
        if self.big_endian {
            0b0000_0001
        } else {
            0
        }
    }

    pub(crate) fn write(&self, w: &mut dyn Write) -> Result<()> {
        let site = "HeaderStart::write";
        w.write_u32::<BigEndian>(MAGIC).map_err(|e| CoreError::io(site, e))?;
        w.write_u8(self.file_flags()).map_err(|e| CoreError::io(site, e))?;
        w.write_u8(self.file_format).map_err(|e| CoreError::io(site, e))?;
        w.write_u8(self.file_version).map_err(|e| CoreError::io(site, e))?;
        w.write_u8(self.compression.to_wire()).map_err(|e| CoreError::io(site, e))?;
        if self.big_endian {
            w.write_u32::<BigEndian>(self.writer_tool_version).map_err(|e| CoreError::io(site, e))?;
            w.write_u16::<BigEndian>(self.record_size).map_err(|e| CoreError::io(site, e))?;
            w.write_u16::<BigEndian>(self.record_version).map_err(|e| CoreError::io(site, e))?;
        } else {
            w.write_u32::<LittleEndian>(self.writer_tool_version).map_err(|e| CoreError::io(site, e))?;
            w.write_u16::<LittleEndian>(self.record_size).map_err(|e| CoreError::io(site, e))?;
            w.write_u16::<LittleEndian>(self.record_version).map_err(|e| CoreError::io(site, e))?;
        }
        Ok(())
    }

    pub(crate) fn read(r: &mut dyn Read) -> Result<Self> {
        let site = "HeaderStart::read";
        let magic = r.read_u32::<BigEndian>().map_err(|e| CoreError::io(site, e))?;
        if magic != MAGIC {
            return Err(CoreError::BadMagic { found: magic });
        }
        let flags = r.read_u8().map_err(|e| CoreError::io(site, e))?;
        let big_endian = flags & 0b0000_0001 != 0;
        let file_format = r.read_u8().map_err(|e| CoreError::io(site, e))?;
        let file_version = r.read_u8().map_err(|e| CoreError::io(site, e))?;
        let compression_byte = r.read_u8().map_err(|e| CoreError::io(site, e))?;
        let compression = CompressionMethod::from_wire(compression_byte)?;
        let (writer_tool_version, record_size, record_version) = if big_endian {
            (
                r.read_u32::<BigEndian>().map_err(|e| CoreError::io(site, e))?,
                r.read_u16::<BigEndian>().map_err(|e| CoreError::io(site, e))?,
                r.read_u16::<BigEndian>().map_err(|e| CoreError::io(site, e))?,
            )
        } else {
            (
                r.read_u32::<LittleEndian>().map_err(|e| CoreError::io(site, e))?,
                r.read_u16::<LittleEndian>().map_err(|e| CoreError::io(site, e))?,
                r.read_u16::<LittleEndian>().map_err(|e| CoreError::io(site, e))?,
            )
        };
        Ok(HeaderStart {
            big_endian,
            file_format,
            file_version,
            compression,
            writer_tool_version,
            record_size,
            record_version,
        })
    }
}

/// One typed entry in a header's entry list.
#[derive(Debug, Clone)]
pub struct HeaderEntry {
    pub type_id: u32,
    pub payload: Vec<u8>,
}

impl HeaderEntry {
    /// Total on-disk size of this entry, including its 8-byte type/length
    /// prefix.
    pub fn wire_len(&self) -> usize {
        8 + self.payload.len()
    }
}

/// One-way lock state restricting structural mutation of a [`FileHeader`].
/// Transitions only ever move right: `Mutable -> FixedStructure -> ReadOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lock {
    Mutable,
    FixedStructure,
    ReadOnly,
}

/// An in-memory header: a [`HeaderStart`] plus an ordered entry list.
#[derive(Debug)]
pub struct FileHeader {
    pub start: HeaderStart,
    entries: Vec<HeaderEntry>,
    lock: Lock,
    padding_modulus: usize,
}

impl FileHeader {
    pub fn create(file_format: u8, big_endian: bool) -> Self {
        FileHeader {
            start: HeaderStart {
                big_endian,
                file_format,
                file_version: crate::config::EXPANDED_INIT_VERSION,
                compression: CompressionMethod::None,
                writer_tool_version: 1,
                record_size: 0,
                record_version: 0,
            },
            entries: Vec::new(),
            lock: Lock::Mutable,
            padding_modulus: HEADER_PADDING_MODULUS_DEFAULT,
        }
    }

    pub fn set_file_format(&mut self, id: u8) -> Result<()> {
        self.reject_if_locked_at_or_beyond(Lock::FixedStructure, "set_file_format")?;
        self.start.file_format = id;
        Ok(())
    }

    pub fn set_record_version(&mut self, version: u16) -> Result<()> {
        self.reject_if_locked_at_or_beyond(Lock::FixedStructure, "set_record_version")?;
        self.start.record_version = version;
        Ok(())
    }

    pub fn set_compression(&mut self, method: CompressionMethod) -> Result<()> {
        self.reject_if_locked_at_or_beyond(Lock::FixedStructure, "set_compression")?;
        self.start.compression = method;
        Ok(())
    }

    pub fn set_byte_order(&mut self, big_endian: bool) -> Result<()> {
        self.reject_if_locked_at_or_beyond(Lock::FixedStructure, "set_byte_order")?;
        self.start.big_endian = big_endian;
        Ok(())
    }

    pub fn set_padding_modulus(&mut self, modulus: usize) -> Result<()> {
        self.reject_if_locked_at_or_beyond(Lock::FixedStructure, "set_padding_modulus")?;
        if modulus == 0 {
            return Err(CoreError::args("set_padding_modulus", "modulus must be nonzero"));
        }
        self.padding_modulus = modulus;
        Ok(())
    }

    /// Moves the lock state forward. A request to move to a state at or
    /// before the current one is a no-op (the transition is one-way, not an
    /// error, to let callers call this defensively).
    pub fn lock(&mut self, to: Lock) {
        if to > self.lock {
            self.lock = to;
        }
    }

    pub fn lock_state(&self) -> Lock {
        self.lock
    }

    fn reject_if_locked_at_or_beyond(&self, limit: Lock, site: &'static str) -> Result<()> {
        if self.lock >= limit {
            return Err(CoreError::Locked { site });
        }
        Ok(())
    }

    /// Appends `entry`. Fails once the header's lock is at or beyond
    /// [`Lock::FixedStructure`].
    pub fn add_entry(&mut self, entry: HeaderEntry) -> Result<()> {
        self.reject_if_locked_at_or_beyond(Lock::FixedStructure, "add_entry")?;
        self.entries.push(entry);
        Ok(())
    }

    /// Returns the first entry with the given `type_id`, if any.
    pub fn get_first_matching(&self, type_id: u32) -> Option<&HeaderEntry> {
        self.entries.iter().find(|e| e.type_id == type_id)
    }

    pub fn entries(&self) -> &[HeaderEntry] {
        &self.entries
    }

    /// Writes the start record, the entry list, a padding entry sized to
    /// reach the configured padding modulus, and the end-of-header sentinel.
    /// Returns the total number of bytes written (the payload that follows
    /// in the file begins at this offset).
    pub fn write(&self, w: &mut dyn Write) -> Result<usize> {
        self.start.write(w)?;
        let mut written = START_LEN;
        for entry in &self.entries {
            written += self.write_entry(w, entry)?;
        }

        if written % self.padding_modulus != 0 {
            // A padding entry costs at least 8 bytes (its own type/length
            // header); pick the smallest target offset that is both a
            // multiple of the modulus and leaves room for that header.
            let mut target = written + 8;
            let rem = target % self.padding_modulus;
            if rem != 0 {
                target += self.padding_modulus - rem;
            }
            let padding = HeaderEntry { type_id: ENTRY_PADDING, payload: vec![0u8; target - written - 8] };
            written += self.write_entry(w, &padding)?;
        }

        let end = HeaderEntry { type_id: ENTRY_END, payload: Vec::new() };
        written += self.write_entry(w, &end)?;
        Ok(written)
    }

    fn write_entry(&self, w: &mut dyn Write, entry: &HeaderEntry) -> Result<usize> {
        let site = "FileHeader::write_entry";
        let len = entry.wire_len() as u32;
        if self.start.big_endian {
            w.write_u32::<BigEndian>(entry.type_id).map_err(|e| CoreError::io(site, e))?;
            w.write_u32::<BigEndian>(len).map_err(|e| CoreError::io(site, e))?;
        } else {
            w.write_u32::<LittleEndian>(entry.type_id).map_err(|e| CoreError::io(site, e))?;
            w.write_u32::<LittleEndian>(len).map_err(|e| CoreError::io(site, e))?;
        }
        w.write_all(&entry.payload).map_err(|e| CoreError::io(site, e))?;
        Ok(entry.wire_len())
    }

    /// Reads a start record followed by an entry list, stopping at (and
    /// consuming) the end-of-header sentinel. Padding entries are skipped
    /// and not retained. Returns the parsed header and the number of bytes
    /// consumed (the offset the payload begins at).
    ///
    /// If `start.file_version < EXPANDED_INIT_VERSION` and a legacy
    /// record-size function is registered for `start.file_format`, the
    /// entry list is not present on disk at all: this returns immediately
    /// after the start record, with `record_size` filled in from
    /// [`registry::legacy_record_size_fn`] and no entries. A pre-extensible
    /// file format whose id is not registered falls through to ordinary
    /// entry-list parsing, on the assumption that its version numbering
    /// happens to fall under the same threshold without predating the
    /// extensible format.
    pub fn read(r: &mut dyn Read) -> Result<(Self, usize)> {
        let start = HeaderStart::read(r)?;
        if start.file_version < crate::config::EXPANDED_INIT_VERSION {
            if let Some(record_size_fn) = registry::legacy_record_size_fn(start.file_format) {
                let mut header = FileHeader {
                    start,
                    entries: Vec::new(),
                    lock: Lock::FixedStructure,
                    padding_modulus: HEADER_PADDING_MODULUS_DEFAULT,
                };
                header.start.record_size = record_size_fn(start.file_version);
                return Ok((header, START_LEN));
            }
        }

        let mut header = FileHeader {
            start,
            entries: Vec::new(),
            lock: Lock::Mutable,
            padding_modulus: HEADER_PADDING_MODULUS_DEFAULT,
        };
        let mut consumed = START_LEN;

        loop {
            let site = "FileHeader::read";
            let (type_id, len) = if start.big_endian {
                (
                    r.read_u32::<BigEndian>().map_err(|e| CoreError::io(site, e))?,
                    r.read_u32::<BigEndian>().map_err(|e| CoreError::io(site, e))?,
                )
            } else {
                (
                    r.read_u32::<LittleEndian>().map_err(|e| CoreError::io(site, e))?,
                    r.read_u32::<LittleEndian>().map_err(|e| CoreError::io(site, e))?,
                )
            };
            if len < 8 {
                return Err(CoreError::BadHeader {
                    site,
                    detail: format!("entry length {len} is smaller than the 8-byte entry header"),
                });
            }
            let payload_len = (len - 8) as usize;
            let mut payload = vec![0u8; payload_len];
            r.read_exact(&mut payload).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    CoreError::BadHeader { site, detail: "entry payload truncated".into() }
                } else {
                    CoreError::io(site, e)
                }
            })?;
            consumed += len as usize;

            if type_id == ENTRY_END {
                break;
            }
            if type_id == ENTRY_PADDING {
                continue;
            }
            header.entries.push(HeaderEntry { type_id, payload });
        }

        header.lock = Lock::FixedStructure;
        Ok((header, consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_round_trips_little_endian() {
        let start = HeaderStart {
            big_endian: false,
            file_format: FT_PREFIXMAP,
            file_version: 2,
            compression: CompressionMethod::Zlib,
            writer_tool_version: 0x0102_0304,
            record_size: 8,
            record_version: 1,
        };
        let mut buf = Vec::new();
        start.write(&mut buf).unwrap();
        assert_eq!(buf.len(), START_LEN);
        assert_eq!(&buf[0..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
        let read_back = HeaderStart::read(&mut &buf[..]).unwrap();
        assert_eq!(read_back, start);
    }

    #[test]
    fn start_round_trips_big_endian() {
        let start = HeaderStart {
            big_endian: true,
            file_format: FT_PREFIXMAP,
            file_version: 4,
            compression: CompressionMethod::None,
            writer_tool_version: 7,
            record_size: 1,
            record_version: 0,
        };
        let mut buf = Vec::new();
        start.write(&mut buf).unwrap();
        let read_back = HeaderStart::read(&mut &buf[..]).unwrap();
        assert_eq!(read_back, start);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let buf = vec![0u8; START_LEN];
        let err = HeaderStart::read(&mut &buf[..]).unwrap_err();
        assert!(matches!(err, CoreError::BadMagic { found: 0 }));
    }

    #[test]
    fn header_round_trips_with_entries_and_padding() {
        let mut header = FileHeader::create(FT_PREFIXMAP, false);
        header.set_padding_modulus(16).unwrap();
        header
            .add_entry(HeaderEntry { type_id: 42, payload: b"hello\0".to_vec() })
            .unwrap();

        let mut buf = Vec::new();
        let written = header.write(&mut buf).unwrap();
        assert_eq!(written, buf.len());
        assert_eq!(written % 16, 0);

        let (read_back, consumed) = FileHeader::read(&mut &buf[..]).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(read_back.entries().len(), 1);
        assert_eq!(read_back.entries()[0].type_id, 42);
        assert_eq!(read_back.entries()[0].payload, b"hello\0");
    }

    #[test]
    fn pre_extensible_version_dispatches_through_the_legacy_registry() {
        const LEGACY_FORMAT: u8 = 250;
        fn legacy_record_size(version: u8) -> u16 {
            if version == 3 {
                24
            } else {
                0
            }
        }
        registry::register_legacy(LEGACY_FORMAT, legacy_record_size);

        let start = HeaderStart {
            big_endian: false,
            file_format: LEGACY_FORMAT,
            file_version: 3,
            compression: CompressionMethod::None,
            writer_tool_version: 1,
            record_size: 0,
            record_version: 0,
        };
        let mut buf = Vec::new();
        start.write(&mut buf).unwrap();
        // A legacy stream carries no entry list at all; anything past the
        // start record belongs to the payload, not the header.
        buf.extend_from_slice(b"payload-bytes-not-a-header-entry");

        let (header, consumed) = FileHeader::read(&mut &buf[..]).unwrap();
        assert_eq!(consumed, START_LEN);
        assert_eq!(header.start.record_size, 24);
        assert!(header.entries().is_empty());
        assert_eq!(header.lock_state(), Lock::FixedStructure);
    }

    #[test]
    fn locked_header_rejects_add_entry() {
        let mut header = FileHeader::create(FT_PREFIXMAP, false);
        header.lock(Lock::FixedStructure);
        let err = header.add_entry(HeaderEntry { type_id: 1, payload: vec![] }).unwrap_err();
        assert!(matches!(err, CoreError::Locked { .. }));
    }

    #[test]
    fn lock_transitions_are_one_way() {
        let mut header = FileHeader::create(FT_PREFIXMAP, false);
        header.lock(Lock::ReadOnly);
        header.lock(Lock::Mutable);
        assert_eq!(header.lock_state(), Lock::ReadOnly);
    }

    #[test]
    fn truncated_entry_is_bad_header() {
        let mut buf = Vec::new();
        let header = FileHeader::create(FT_PREFIXMAP, false);
        header.start.write(&mut buf).unwrap();
        buf.extend_from_slice(&20u32.to_le_bytes()); // type_id
        buf.extend_from_slice(&20u32.to_le_bytes()); // length=20, payload=12 bytes but none follow
        let err = FileHeader::read(&mut &buf[..]).unwrap_err();
        assert!(matches!(err, CoreError::BadHeader { .. }));
    }
}
