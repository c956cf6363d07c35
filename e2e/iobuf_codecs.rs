//! End-to-end coverage of the compressed block stream across process-level
//! boundaries: writing through one `IoWriter`, reading back through a fresh
//! `IoReader` bound to an independent in-memory channel.

use flowcore::iobuf::{CompressionMethod, IoReader, IoWriter};
use std::io::Cursor;

fn round_trip_via_buffer(method: CompressionMethod, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut w = IoWriter::bind(&mut out, method);
        w.write(payload).unwrap();
        w.flush().unwrap();
        w.finish().unwrap();
    }
    let mut r = IoReader::bind(Cursor::new(&out[..]), method);
    r.read(payload.len()).unwrap()
}

#[test]
fn every_compression_method_round_trips_mixed_content() {
    let payload = {
        let mut v = Vec::new();
        v.extend_from_slice(&b"the quick brown fox jumps over the lazy dog, ".repeat(50));
        v.extend((0u32..5000).map(|i| (i % 256) as u8));
        v
    };
    for method in [CompressionMethod::None, CompressionMethod::Zlib, CompressionMethod::Snappy] {
        assert_eq!(round_trip_via_buffer(method, &payload), payload, "method {method:?} mismatch");
    }
}

#[test]
fn empty_payload_round_trips() {
    for method in [CompressionMethod::None, CompressionMethod::Zlib, CompressionMethod::Snappy] {
        assert_eq!(round_trip_via_buffer(method, &[]), Vec::<u8>::new());
    }
}

#[test]
fn lzo_is_a_recognized_but_unavailable_codec() {
    assert!(flowcore::iobuf::CompressionMethod::from_wire(2).is_ok());
    let mut out = Vec::new();
    let mut w = IoWriter::bind(&mut out, CompressionMethod::Lzo);
    let err = w.write(b"x").unwrap_err();
    assert!(matches!(err, flowcore::CoreError::BadCompression { method: 2 }));
}

#[test]
fn read_until_delimiter_stops_after_the_match() {
    let mut out = Vec::new();
    {
        let mut w = IoWriter::bind(&mut out, CompressionMethod::None);
        w.write(b"first-line\nsecond-line\n").unwrap();
        w.flush().unwrap();
    }
    let mut r = IoReader::bind(Cursor::new(&out[..]), CompressionMethod::None);
    assert_eq!(r.read_until(b'\n').unwrap(), b"first-line\n");
    assert_eq!(r.read_until(b'\n').unwrap(), b"second-line\n");
    assert!(r.read_until(b'\n').unwrap().is_empty());
}

#[test]
fn unget_replays_peeked_bytes() {
    let mut out = Vec::new();
    {
        let mut w = IoWriter::bind(&mut out, CompressionMethod::None);
        w.write(b"abcdef").unwrap();
        w.flush().unwrap();
    }
    let mut r = IoReader::bind(Cursor::new(&out[..]), CompressionMethod::None);
    let peeked = r.read(3).unwrap();
    assert_eq!(peeked, b"abc");
    r.unget(&peeked);
    assert_eq!(r.read(6).unwrap(), b"abcdef");
}
