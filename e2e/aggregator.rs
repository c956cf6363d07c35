//! End-to-end coverage of the net-structure aggregator: a realistic ascending
//! IPv4 stream through the default spec, and a custom IPv6 spec string.

use flowcore::aggregator::{Aggregator, AggregatorSpec, Family};
use flowcore::pmap::key;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

fn row_by_prefix(rows: &[flowcore::aggregator::Row], prefix_len: u32, network: u128) -> u128 {
    rows.iter()
        .find(|r| r.prefix_len == prefix_len && r.network == network)
        .unwrap_or_else(|| panic!("no row for /{prefix_len} network {network}"))
        .counter
}

#[test]
fn default_v4_spec_rolls_up_a_realistic_stream() {
    let spec = AggregatorSpec::default_v4();
    let mut agg = Aggregator::new(&spec);

    let entries: Vec<(Ipv4Addr, u128)> = vec![
        (Ipv4Addr::new(10, 0, 0, 1), 3),
        (Ipv4Addr::new(10, 0, 0, 9), 7),
        (Ipv4Addr::new(10, 0, 5, 1), 4),
        (Ipv4Addr::new(10, 1, 0, 1), 11),
        (Ipv4Addr::new(192, 168, 0, 1), 2),
        (Ipv4Addr::new(192, 168, 0, 2), 6),
    ];
    for (addr, counter) in &entries {
        agg.add_key_counter(key::ipv4_key(*addr), *counter).unwrap();
    }
    let rows = agg.finalize();

    let total: u128 = entries.iter().map(|(_, c)| c).sum();
    assert_eq!(row_by_prefix(&rows, 0, 0), total);

    let ten_net = key::ipv4_key(Ipv4Addr::new(10, 0, 0, 0)) & !0xFF_FFFFu128;
    assert_eq!(row_by_prefix(&rows, 8, ten_net), 25);

    let oneninetwo_net = key::ipv4_key(Ipv4Addr::new(192, 168, 0, 0)) & !0xFF_FFFFu128;
    assert_eq!(row_by_prefix(&rows, 8, oneninetwo_net), 8);

    // every printed row must also appear, and printed rows use the spec's printed flags
    let printed_prefixes: Vec<u32> = rows.iter().filter(|r| r.printed).map(|r| r.prefix_len).collect();
    assert!(printed_prefixes.contains(&0));
    assert!(printed_prefixes.contains(&32));
}

#[test]
fn custom_v6_spec_string_drives_the_engine_end_to_end() {
    let spec = AggregatorSpec::parse("v6:T/32,48,64").unwrap();
    assert_eq!(spec.family, Family::V6);
    let mut agg = Aggregator::new(&spec);

    let addrs = [
        (Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1), 1u128),
        (Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2), 2u128),
        (Ipv6Addr::new(0x2001, 0xdb8, 0, 1, 0, 0, 0, 1), 5u128),
        (Ipv6Addr::new(0x2001, 0xdb9, 0, 0, 0, 0, 0, 1), 9u128),
    ];
    for (addr, counter) in addrs {
        agg.add_key_counter(key::ipv6_key(addr), counter).unwrap();
    }
    let rows = agg.finalize();

    let total: u128 = addrs.iter().map(|(_, c)| c).sum();
    assert_eq!(row_by_prefix(&rows, 0, 0), total);

    let mut by_prefix: HashMap<u32, Vec<&flowcore::aggregator::Row>> = HashMap::new();
    for row in &rows {
        by_prefix.entry(row.prefix_len).or_default().push(row);
    }
    assert!(by_prefix.contains_key(&32));
    assert!(by_prefix.contains_key(&48));
    assert!(by_prefix.contains_key(&64));
}

#[test]
fn non_ascending_keys_are_rejected_end_to_end() {
    let spec = AggregatorSpec::default_v4();
    let mut agg = Aggregator::new(&spec);
    agg.add_key_counter(key::ipv4_key(Ipv4Addr::new(10, 0, 0, 5)), 1).unwrap();
    let err = agg.add_key_counter(key::ipv4_key(Ipv4Addr::new(10, 0, 0, 1)), 1).unwrap_err();
    assert!(format!("{err}").len() > 0);
}
