//! End-to-end coverage of the typed file header: entry round-trips, the
//! process-wide entry-name registry, and lock-state enforcement.

use flowcore::header::registry::{self, EntryVTable};
use flowcore::header::{FileHeader, HeaderEntry, Lock, FT_PREFIXMAP};
use flowcore::iobuf::CompressionMethod;

const CUSTOM_ENTRY_ID: u32 = 900;

#[test]
fn header_with_multiple_entries_round_trips_and_preserves_order() {
    registry::register(
        CUSTOM_ENTRY_ID,
        EntryVTable { name: "e2e-custom-entry", print: Some(|p| String::from_utf8_lossy(p).to_string()) },
    );

    let mut header = FileHeader::create(FT_PREFIXMAP, true);
    header.set_compression(CompressionMethod::Zlib).unwrap();
    header.set_padding_modulus(32).unwrap();
    header.add_entry(HeaderEntry { type_id: CUSTOM_ENTRY_ID, payload: b"alpha".to_vec() }).unwrap();
    header.add_entry(HeaderEntry { type_id: CUSTOM_ENTRY_ID + 1, payload: b"beta".to_vec() }).unwrap();
    header.lock(Lock::FixedStructure);

    let mut buf = Vec::new();
    let written = header.write(&mut buf).unwrap();
    assert_eq!(written % 32, 0);

    let (read_back, consumed) = FileHeader::read(&mut &buf[..]).unwrap();
    assert_eq!(consumed, written);
    assert_eq!(read_back.start.compression, CompressionMethod::Zlib);
    assert!(read_back.start.big_endian);
    assert_eq!(read_back.entries().len(), 2);

    let entry = read_back.get_first_matching(CUSTOM_ENTRY_ID).unwrap();
    assert_eq!(registry::name_for(CUSTOM_ENTRY_ID), Some("e2e-custom-entry"));
    assert_eq!(registry::print_entry(CUSTOM_ENTRY_ID, &entry.payload), "alpha");
}

#[test]
fn locking_prevents_every_structural_mutation() {
    let mut header = FileHeader::create(FT_PREFIXMAP, false);
    header.lock(Lock::ReadOnly);

    assert!(header.add_entry(HeaderEntry { type_id: 1, payload: vec![] }).is_err());
    assert!(header.set_compression(CompressionMethod::Zlib).is_err());
    assert!(header.set_byte_order(true).is_err());
    assert!(header.set_padding_modulus(8).is_err());
    assert!(header.set_record_version(2).is_err());
}

#[test]
fn unregistered_entry_type_falls_back_to_a_hex_dump() {
    let rendered = registry::print_entry(0xFFFF_FFF0, &[0xDE, 0xAD]);
    assert!(rendered.contains("de") || rendered.contains("DE"));
}
