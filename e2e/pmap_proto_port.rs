//! End-to-end coverage of the proto/port prefix map variant (24-bit keys,
//! always dictionary-backed, version 3 on disk).

use flowcore::iobuf::CompressionMethod;
use flowcore::pmap::{key, KeyKind, PrefixMap, NOT_FOUND};

#[test]
fn builds_labels_well_known_ports_and_round_trips() {
    let mut m = PrefixMap::create_empty(KeyKind::ProtoPort);
    m.dict_insert(1, "ssh").unwrap();
    m.dict_insert(2, "http").unwrap();
    m.dict_insert(3, "https").unwrap();

    let ssh = key::proto_port_key(6, 22);
    let http = key::proto_port_key(6, 80);
    let https = key::proto_port_key(6, 443);
    m.add_range(ssh, ssh, 1).unwrap();
    m.add_range(http, http, 2).unwrap();
    m.add_range(https, https, 3).unwrap();

    let mut buf = Vec::new();
    m.save(&mut buf, true, CompressionMethod::Zlib).unwrap();
    let loaded = PrefixMap::load(&mut &buf[..]).unwrap();

    assert_eq!(loaded.find_label(ssh).unwrap(), "ssh");
    assert_eq!(loaded.find_label(http).unwrap(), "http");
    assert_eq!(loaded.find_label(https).unwrap(), "https");
    assert_eq!(loaded.find_code(key::proto_port_key(17, 53)).unwrap(), NOT_FOUND);
}

#[test]
fn without_dictionary_is_rejected_for_proto_port() {
    assert!(PrefixMap::without_dictionary(KeyKind::ProtoPort).is_err());
}

#[test]
fn a_whole_proto_range_can_be_labeled_at_once() {
    let mut m = PrefixMap::create_empty(KeyKind::ProtoPort);
    m.dict_insert(1, "tcp-ephemeral").unwrap();
    let low = key::proto_port_key(6, 49152);
    let high = key::proto_port_key(6, 65535);
    m.add_range(low, high, 1).unwrap();
    assert_eq!(m.find_label(key::proto_port_key(6, 50000)).unwrap(), "tcp-ephemeral");
    assert_eq!(m.find_code(key::proto_port_key(6, 49151)).unwrap(), NOT_FOUND);
}
