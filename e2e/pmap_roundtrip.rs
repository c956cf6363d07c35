//! End-to-end coverage of the IPv4 prefix map: build, serialize through
//! every compression method, reload, and re-check lookups and iteration.

use flowcore::iobuf::CompressionMethod;
use flowcore::pmap::{key, KeyKind, PrefixMap, NOT_FOUND};
use std::net::Ipv4Addr;

fn build_sample_map() -> PrefixMap {
    let mut m = PrefixMap::create_empty(KeyKind::Ipv4);
    m.set_name("corp-network");
    m.dict_insert(1, "engineering").unwrap();
    m.dict_insert(2, "finance").unwrap();
    m.add_range(
        key::ipv4_key(Ipv4Addr::new(10, 1, 0, 0)),
        key::ipv4_key(Ipv4Addr::new(10, 1, 255, 255)),
        1,
    )
    .unwrap();
    m.add_range(
        key::ipv4_key(Ipv4Addr::new(10, 2, 0, 0)),
        key::ipv4_key(Ipv4Addr::new(10, 2, 0, 255)),
        2,
    )
    .unwrap();
    m
}

#[test]
fn round_trips_through_every_compression_method() {
    for (method, big_endian) in [
        (CompressionMethod::None, false),
        (CompressionMethod::None, true),
        (CompressionMethod::Zlib, false),
        (CompressionMethod::Snappy, true),
    ] {
        let original = build_sample_map();
        let mut buf = Vec::new();
        original.save(&mut buf, big_endian, method).unwrap();

        let loaded = PrefixMap::load(&mut &buf[..]).unwrap();
        assert_eq!(loaded.get_name(), Some("corp-network"));
        assert_eq!(loaded.iterate().unwrap(), original.iterate().unwrap());
        assert_eq!(
            loaded.find_label(key::ipv4_key(Ipv4Addr::new(10, 1, 5, 5))).unwrap(),
            "engineering"
        );
        assert_eq!(
            loaded.find_label(key::ipv4_key(Ipv4Addr::new(10, 2, 0, 5))).unwrap(),
            "finance"
        );
        assert_eq!(loaded.find_code(key::ipv4_key(Ipv4Addr::new(192, 168, 0, 1))).unwrap(), NOT_FOUND);
    }
}

#[test]
fn iteration_covers_the_whole_ipv4_domain_without_gaps() {
    let m = build_sample_map();
    let ranges = m.iterate().unwrap();
    let mut next_expected = 0u128;
    for (start, end, _) in &ranges {
        assert_eq!(*start, next_expected, "ranges must tile the domain with no gap");
        next_expected = end + 1;
    }
    assert_eq!(next_expected, 0x1_0000_0000);
}

#[test]
fn overlapping_insert_overrides_the_earlier_range() {
    let mut m = PrefixMap::create_empty(KeyKind::Ipv4);
    m.add_range(0, 0xFFFF_FFFF, 9).unwrap();
    m.add_range(
        key::ipv4_key(Ipv4Addr::new(10, 0, 0, 0)),
        key::ipv4_key(Ipv4Addr::new(10, 0, 0, 255)),
        1,
    )
    .unwrap();
    assert_eq!(m.find_code(key::ipv4_key(Ipv4Addr::new(10, 0, 0, 5))).unwrap(), 1);
    assert_eq!(m.find_code(key::ipv4_key(Ipv4Addr::new(8, 8, 8, 8))).unwrap(), 9);
}
