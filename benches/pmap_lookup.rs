//! Criterion benchmarks for prefix-map lookups.
//!
//! Run with:
//!   cargo bench --bench pmap_lookup

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowcore::pmap::{key, KeyKind, PrefixMap};
use std::net::Ipv4Addr;

fn build_map(range_count: u32) -> PrefixMap {
    let mut m = PrefixMap::create_empty(KeyKind::Ipv4);
    for i in 0..range_count {
        let low = key::ipv4_key(Ipv4Addr::new(10, (i / 256) as u8, (i % 256) as u8, 0));
        let high = low + 255;
        m.add_range(low, high, i + 1).unwrap();
    }
    m
}

fn bench_find_code(c: &mut Criterion) {
    let mut group = c.benchmark_group("pmap_find_code");

    for &range_count in &[64u32, 4096] {
        let map = build_map(range_count);
        let probe = key::ipv4_key(Ipv4Addr::new(10, (range_count / 512) as u8, 1, 1));

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("lookup", range_count), &probe, |b, probe| {
            b.iter(|| map.find_code(*probe).unwrap())
        });
    }

    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("pmap_iterate");
    for &range_count in &[64u32, 4096] {
        let map = build_map(range_count);
        group.throughput(Throughput::Elements(range_count as u64));
        group.bench_with_input(BenchmarkId::new("iterate", range_count), &map, |b, map| {
            b.iter(|| map.iterate().unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_code, bench_iterate);
criterion_main!(benches);
