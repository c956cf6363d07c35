//! Criterion benchmarks for the compressed block stream.
//!
//! Run with:
//!   cargo bench --bench iobuf_roundtrip

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowcore::iobuf::{CompressionMethod, IoReader, IoWriter};
use std::io::Cursor;

fn payload(size: usize) -> Vec<u8> {
    "the quick brown fox jumps over the lazy dog, ".bytes().cycle().take(size).collect()
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("iobuf_write");
    for method in [CompressionMethod::None, CompressionMethod::Zlib, CompressionMethod::Snappy] {
        for &size in &[65_536usize, 1_048_576] {
            let data = payload(size);
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(format!("{method:?}"), size), &data, |b, data| {
                b.iter(|| {
                    let mut out = Vec::new();
                    let mut w = IoWriter::bind(&mut out, method);
                    w.write(data).unwrap();
                    w.flush().unwrap();
                    w.finish().unwrap();
                })
            });
        }
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("iobuf_read");
    for method in [CompressionMethod::None, CompressionMethod::Zlib, CompressionMethod::Snappy] {
        for &size in &[65_536usize, 1_048_576] {
            let data = payload(size);
            let mut encoded = Vec::new();
            {
                let mut w = IoWriter::bind(&mut encoded, method);
                w.write(&data).unwrap();
                w.flush().unwrap();
                w.finish().unwrap();
            }
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(format!("{method:?}"), size), &encoded, |b, encoded| {
                b.iter(|| {
                    let mut r = IoReader::bind(Cursor::new(&encoded[..]), method);
                    r.read(size).unwrap()
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_write, bench_read);
criterion_main!(benches);
