//! Prefix map: a binary trie over IPv4/IPv6/proto-port keys backed by a
//! flat, append-only record array, plus the case-insensitive dictionary that
//! gives its leaf codes human-readable labels.

pub mod dict;
pub mod key;
pub mod trie;

use std::io::{Read, Write};
use std::sync::Once;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{CoreError, Result};
use crate::header::registry::{self, EntryVTable};
use crate::header::{FileHeader, HeaderEntry, Lock, FT_PREFIXMAP};
use crate::iobuf::{CompressionMethod, IoReader, IoWriter};

pub use dict::Dictionary;
pub use key::{KeyKind, MAX_VALUE, NOT_FOUND};
use trie::{Child, Record, Trie};

/// Header-entry type-id carrying a prefix map's optional name.
pub const PREFIXMAP_ID: u32 = 100;

static REGISTER_ONCE: Once = Once::new();

fn ensure_registered() {
    REGISTER_ONCE.call_once(|| {
        registry::register(
            PREFIXMAP_ID,
            EntryVTable {
                name: "pmap-name",
                print: Some(|payload| {
                    if payload.len() < 4 {
                        return String::new();
                    }
                    String::from_utf8_lossy(&payload[4..]).trim_end_matches('\0').to_string()
                }),
            },
        );
    });
}

/// An in-memory prefix map: trie + dictionary + optional display name.
pub struct PrefixMap {
    kind: KeyKind,
    trie: Trie,
    dict: Dictionary,
    name: Option<String>,
    dict_present: bool,
    mutated: bool,
}

impl PrefixMap {
    /// Creates an empty map over `kind`, with every key initially resolving
    /// to [`NOT_FOUND`]. Proto-port maps always carry a dictionary; IPv4/IPv6
    /// maps default to carrying one too (use [`PrefixMap::without_dictionary`]
    /// for the no-dictionary on-disk variants, versions 1 and 5).
    pub fn create_empty(kind: KeyKind) -> Self {
        PrefixMap {
            kind,
            trie: Trie::new(kind.width(), NOT_FOUND),
            dict: Dictionary::new(),
            name: None,
            dict_present: true,
            mutated: false,
        }
    }

    /// As [`PrefixMap::create_empty`], but the map will be written without a
    /// dictionary section (on-disk versions 1 and 5). Not valid for
    /// [`KeyKind::ProtoPort`], which always carries a dictionary.
    pub fn without_dictionary(kind: KeyKind) -> Result<Self> {
        if kind == KeyKind::ProtoPort {
            return Err(CoreError::args(
                "PrefixMap::without_dictionary",
                "proto/port maps always carry a dictionary",
            ));
        }
        let mut m = PrefixMap::create_empty(kind);
        m.dict_present = false;
        Ok(m)
    }

    pub fn content_kind(&self) -> KeyKind {
        self.kind
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the code every unmapped key resolves to. Only valid before any
    /// range has been inserted; afterwards returns [`CoreError::NotEmpty`].
    pub fn set_default_code(&mut self, code: u32) -> Result<()> {
        if self.mutated {
            return Err(CoreError::NotEmpty { site: "PrefixMap::set_default_code" });
        }
        self.trie.records[0] = Record { left: Child::Leaf(code), right: Child::Leaf(code) };
        Ok(())
    }

    /// Inserts `[low, high] -> code`, overriding any previously inserted
    /// overlapping range.
    pub fn add_range(&mut self, low: u128, high: u128, code: u32) -> Result<()> {
        if low > high || high > self.kind.max_key() {
            return Err(CoreError::args("PrefixMap::add_range", "low > high or high exceeds key domain"));
        }
        self.trie.add_range(low, high, code);
        self.mutated = true;
        Ok(())
    }

    pub fn find_code(&self, key: u128) -> Result<u32> {
        self.trie.lookup(key).map(|(code, _)| code)
    }

    /// Returns `(start, end, code)`: the maximal contiguous range containing
    /// `key` that resolves to a single code.
    pub fn find_range(&self, key: u128) -> Result<(u128, u128, u32)> {
        let (code, consulted) = self.trie.lookup(key)?;
        let free_bits = self.kind.width() - consulted;
        let mask = if free_bits == 0 { 0 } else { (1u128 << free_bits) - 1 };
        let start = key & !mask;
        let end = key | mask;
        Ok((start, end, code))
    }

    /// Returns the dictionary label for the code found at `key`.
    pub fn find_label(&self, key: u128) -> Result<String> {
        let code = self.find_code(key)?;
        Ok(self.dict.label_for(code))
    }

    pub fn dict_insert(&mut self, code: u32, word: &str) -> Result<()> {
        self.dict.insert(code, word)
    }

    pub fn dict_lookup_word(&self, word: &str) -> Option<u32> {
        self.dict.lookup_word(word)
    }

    pub fn dict_get_label(&self, code: u32) -> String {
        self.dict.label_for(code)
    }

    /// Enumerates maximal contiguous `(start, end, code)` ranges across the
    /// whole key domain, in ascending key order.
    pub fn iterate(&self) -> Result<Vec<(u128, u128, u32)>> {
        let mut out = Vec::new();
        let max = self.kind.max_key();
        let mut key = 0u128;
        loop {
            let range = self.find_range(key)?;
            let end = range.1;
            out.push(range);
            if end >= max {
                break;
            }
            key = end + 1;
        }
        Ok(out)
    }

    fn disk_version(&self) -> u8 {
        match (self.kind, self.dict_present) {
            (KeyKind::Ipv4, false) => 1,
            (KeyKind::Ipv4, true) => 2,
            (KeyKind::ProtoPort, _) => 3,
            (KeyKind::Ipv6, true) => 4,
            (KeyKind::Ipv6, false) => 5,
        }
    }

    fn version_layout(version: u8) -> Result<(KeyKind, bool)> {
        match version {
            1 => Ok((KeyKind::Ipv4, false)),
            2 => Ok((KeyKind::Ipv4, true)),
            3 => Ok((KeyKind::ProtoPort, true)),
            4 => Ok((KeyKind::Ipv6, true)),
            5 => Ok((KeyKind::Ipv6, false)),
            other => Err(CoreError::BadVersion { site: "PrefixMap::load", version: other as u32 }),
        }
    }

    /// Writes the file header followed by the record array and (if present)
    /// dictionary payload, through a compressed block stream bound to
    /// `compression`.
    pub fn save(&self, w: &mut dyn Write, big_endian: bool, compression: CompressionMethod) -> Result<()> {
        ensure_registered();
        let mut header = FileHeader::create(FT_PREFIXMAP, big_endian);
        header.set_compression(compression)?;
        header.set_record_version(self.disk_version() as u16)?;
        if let Some(name) = &self.name {
            let mut payload = Vec::new();
            if big_endian {
                payload.write_u32::<BigEndian>(1).expect("write to Vec<u8> is infallible");
            } else {
                payload.write_u32::<LittleEndian>(1).expect("write to Vec<u8> is infallible");
            }
            payload.extend_from_slice(name.as_bytes());
            payload.push(0);
            header.add_entry(HeaderEntry { type_id: PREFIXMAP_ID, payload })?;
        }
        header.lock(Lock::FixedStructure);
        header.write(w)?;

        let mut body = Vec::new();
        let write_u32 = |buf: &mut Vec<u8>, v: u32| {
            if big_endian {
                buf.write_u32::<BigEndian>(v).expect("write to Vec<u8> is infallible");
            } else {
                buf.write_u32::<LittleEndian>(v).expect("write to Vec<u8> is infallible");
            }
        };
        write_u32(&mut body, self.trie.records.len() as u32);
        for record in &self.trie.records {
            write_u32(&mut body, record.left.pack());
            write_u32(&mut body, record.right.pack());
        }
        if self.dict_present {
            let mut dict_bytes = Vec::new();
            for (code, word) in self.dict.iter() {
                write_u32(&mut dict_bytes, code);
                dict_bytes.extend_from_slice(word.as_bytes());
                dict_bytes.push(0);
            }
            write_u32(&mut body, dict_bytes.len() as u32);
            body.extend_from_slice(&dict_bytes);
        }

        let mut iow = IoWriter::bind(&mut *w, compression);
        iow.write(&body)?;
        iow.flush()?;
        iow.finish()?;
        Ok(())
    }

    /// Reads back a map written by [`PrefixMap::save`].
    pub fn load(r: &mut dyn Read) -> Result<Self> {
        ensure_registered();
        let (header, _) = FileHeader::read(r)?;
        if header.start.file_format != FT_PREFIXMAP {
            return Err(CoreError::BadHeader {
                site: "PrefixMap::load",
                detail: format!("file-format id {} is not a prefix map", header.start.file_format),
            });
        }
        let (kind, dict_present) = Self::version_layout(header.start.record_version as u8)?;
        let big_endian = header.start.big_endian;
        let name = header.get_first_matching(PREFIXMAP_ID).and_then(|e| {
            if e.payload.len() < 4 {
                None
            } else {
                Some(String::from_utf8_lossy(&e.payload[4..]).trim_end_matches('\0').to_string())
            }
        });

        let mut ior = IoReader::bind(r, header.start.compression);
        let decode_u32 = |buf: &[u8]| -> Result<u32> {
            if buf.len() != 4 {
                return Err(CoreError::ShortRead { site: "PrefixMap::load", expected: 4, got: buf.len() });
            }
            Ok(if big_endian {
                (&buf[..]).read_u32::<BigEndian>().expect("slice of exactly 4 bytes")
            } else {
                (&buf[..]).read_u32::<LittleEndian>().expect("slice of exactly 4 bytes")
            })
        };

        let record_count = decode_u32(&ior.read(4)?)?;
        let mut records = Vec::with_capacity(record_count as usize);
        for _ in 0..record_count {
            let left = Child::unpack(decode_u32(&ior.read(4)?)?);
            let right = Child::unpack(decode_u32(&ior.read(4)?)?);
            records.push(Record { left, right });
        }

        let mut dict = Dictionary::new();
        if dict_present {
            let dict_len = decode_u32(&ior.read(4)?)? as usize;
            let dict_bytes = ior.read(dict_len)?;
            let mut pos = 0;
            while pos + 4 <= dict_bytes.len() {
                let code = decode_u32(&dict_bytes[pos..pos + 4])?;
                pos += 4;
                let start = pos;
                while pos < dict_bytes.len() && dict_bytes[pos] != 0 {
                    pos += 1;
                }
                let word = String::from_utf8_lossy(&dict_bytes[start..pos]).to_string();
                pos += 1; // skip NUL
                if !word.is_empty() {
                    dict.insert(code, &word)?;
                }
            }
        }

        let mut trie = Trie::from_records(kind.width(), records);
        trie.validate()?;

        Ok(PrefixMap { kind, trie, dict, name, dict_present, mutated: record_count > 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn scenario_s1_ipv4_ranges_and_iteration() {
        let mut m = PrefixMap::create_empty(KeyKind::Ipv4);
        let low1 = key::ipv4_key(Ipv4Addr::new(10, 0, 0, 0));
        let high1 = key::ipv4_key(Ipv4Addr::new(10, 0, 0, 255));
        let low2 = key::ipv4_key(Ipv4Addr::new(10, 0, 1, 0));
        let high2 = key::ipv4_key(Ipv4Addr::new(10, 0, 1, 255));
        m.add_range(low1, high1, 1).unwrap();
        m.add_range(low2, high2, 2).unwrap();
        m.dict_insert(1, "A").unwrap();
        m.dict_insert(2, "B").unwrap();

        assert_eq!(m.find_code(key::ipv4_key(Ipv4Addr::new(10, 0, 0, 5))).unwrap(), 1);
        assert_eq!(m.find_label(key::ipv4_key(Ipv4Addr::new(10, 0, 0, 5))).unwrap(), "A");
        assert_eq!(m.find_code(key::ipv4_key(Ipv4Addr::new(10, 0, 1, 255))).unwrap(), 2);
        assert_eq!(m.find_label(key::ipv4_key(Ipv4Addr::new(10, 0, 1, 255))).unwrap(), "B");
        assert_eq!(m.find_code(key::ipv4_key(Ipv4Addr::new(10, 0, 2, 0))).unwrap(), NOT_FOUND);

        let ranges = m.iterate().unwrap();
        let matching: Vec<_> = ranges.iter().filter(|(_, _, c)| *c != NOT_FOUND).collect();
        assert_eq!(matching.len(), 2);
        assert_eq!(matching[0], &(low1, high1, 1));
        assert_eq!(matching[1], &(low2, high2, 2));
    }

    #[test]
    fn scenario_s2_save_load_round_trip_preserves_ranges() {
        let mut m = PrefixMap::create_empty(KeyKind::Ipv4);
        m.add_range(0x0A00_0000, 0x0A00_00FF, 1).unwrap();
        m.dict_insert(1, "A").unwrap();

        let mut buf = Vec::new();
        m.save(&mut buf, false, CompressionMethod::None).unwrap();
        assert_eq!(&buf[0..4], &[0xDE, 0xAD, 0xBE, 0xEF]);

        let loaded = PrefixMap::load(&mut &buf[..]).unwrap();
        assert_eq!(loaded.iterate().unwrap(), m.iterate().unwrap());
        assert_eq!(loaded.find_label(0x0A00_0050).unwrap(), "A");
    }

    #[test]
    fn scenario_s2_round_trip_survives_zlib_compression() {
        let mut m = PrefixMap::create_empty(KeyKind::Ipv4);
        m.add_range(0, 0xFFFF_FFFF, 7).unwrap();

        let mut buf = Vec::new();
        m.save(&mut buf, true, CompressionMethod::Zlib).unwrap();
        let loaded = PrefixMap::load(&mut &buf[..]).unwrap();
        assert_eq!(loaded.find_code(0x1234_5678).unwrap(), 7);
    }

    #[test]
    fn scenario_s3_proto_port_map() {
        let mut m = PrefixMap::create_empty(KeyKind::ProtoPort);
        m.dict_insert(1, "http").unwrap();
        m.dict_insert(2, "https").unwrap();
        let http = key::proto_port_key(6, 80);
        let https = key::proto_port_key(6, 443);
        m.add_range(http, http, 1).unwrap();
        m.add_range(https, https, 2).unwrap();

        assert_eq!(m.find_label(http).unwrap(), "http");
        assert_eq!(m.find_label(https).unwrap(), "https");
        assert_eq!(m.find_code(key::proto_port_key(6, 8080)).unwrap(), NOT_FOUND);
    }

    #[test]
    fn set_default_code_after_insert_is_not_empty() {
        let mut m = PrefixMap::create_empty(KeyKind::Ipv4);
        m.add_range(0, 10, 1).unwrap();
        assert!(matches!(m.set_default_code(5), Err(CoreError::NotEmpty { .. })));
    }

    #[test]
    fn out_of_domain_range_is_rejected() {
        let mut m = PrefixMap::create_empty(KeyKind::Ipv4);
        assert!(m.add_range(0, u128::MAX, 1).is_err());
    }

    #[test]
    fn without_dictionary_rejects_proto_port() {
        assert!(PrefixMap::without_dictionary(KeyKind::ProtoPort).is_err());
    }

    #[test]
    fn name_round_trips_through_header_entry() {
        let mut m = PrefixMap::create_empty(KeyKind::Ipv4);
        m.set_name("test-map");
        m.add_range(0, 10, 1).unwrap();
        let mut buf = Vec::new();
        m.save(&mut buf, false, CompressionMethod::None).unwrap();
        let loaded = PrefixMap::load(&mut &buf[..]).unwrap();
        assert_eq!(loaded.get_name(), Some("test-map"));
    }
}
