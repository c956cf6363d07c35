//! Net-structure aggregator: streaming hierarchical CIDR rollup over an
//! ascending sequence of `(address, counter)` pairs.

pub mod counter;
pub mod spec;

use crate::error::{CoreError, Result};
use counter::Counter;
pub use spec::{AggregatorSpec, Family, Level};

/// One emitted row: a level's final accumulated state at the point it was
/// superseded by a change of network (or at [`Aggregator::finalize`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub prefix_len: u32,
    pub printed: bool,
    pub network: u128,
    pub counter: u128,
    pub sub_block_count: u64,
}

struct LevelState {
    prefix_len: u32,
    printed: bool,
    network: u128,
    counter: Counter,
    sub_block_count: u64,
}

impl LevelState {
    fn reset(&mut self, network: u128) {
        self.network = network;
        self.counter = Counter::zero();
        self.sub_block_count = 0;
    }

    fn to_row(&self) -> Row {
        Row {
            prefix_len: self.prefix_len,
            printed: self.printed,
            network: self.network,
            counter: self.counter.value(),
            sub_block_count: self.sub_block_count,
        }
    }
}

/// Streaming CIDR rollup aggregator. Construct with [`Aggregator::new`],
/// feed strictly-ascending `(key, counter)` pairs via
/// [`Aggregator::add_key_counter`], then call [`Aggregator::finalize`] to
/// flush the remaining open levels and retrieve every emitted row.
///
/// Levels are held coarsest-first (ascending prefix length). On each new
/// key, the smallest-index level whose network differs from the previous
/// key's is the "boundary": every level at or finer than the boundary is
/// flushed and restarted against the new key, while coarser levels keep
/// accumulating. Network equality at a finer prefix implies equality at
/// every coarser prefix, so once a mismatch appears it holds for the rest
/// of the level list.
pub struct Aggregator {
    width: u32,
    levels: Vec<LevelState>,
    last_key: Option<u128>,
    rows: Vec<Row>,
    finished: bool,
}

fn network_mask(free_bits: u32) -> u128 {
    if free_bits == 0 {
        0
    } else if free_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << free_bits) - 1
    }
}

fn network_of(key: u128, prefix_len: u32, width: u32) -> u128 {
    key & !network_mask(width - prefix_len)
}

impl Aggregator {
    pub fn new(spec: &AggregatorSpec) -> Self {
        let width = spec.family.width();
        let levels = spec
            .levels
            .iter()
            .map(|l| LevelState {
                prefix_len: l.prefix_len,
                printed: l.printed,
                network: 0,
                counter: Counter::zero(),
                sub_block_count: 0,
            })
            .collect();
        Aggregator { width, levels, last_key: None, rows: Vec::new(), finished: false }
    }

    /// Feeds one `(key, counter)` pair. `key` must be strictly greater than
    /// every previously fed key.
    pub fn add_key_counter(&mut self, key: u128, counter: u128) -> Result<()> {
        if self.finished {
            return Err(CoreError::CallOrder {
                site: "Aggregator::add_key_counter",
                detail: "called after finalize".into(),
            });
        }
        if let Some(last) = self.last_key {
            if key <= last {
                return Err(CoreError::args(
                    "Aggregator::add_key_counter",
                    "keys must be fed in strictly ascending order",
                ));
            }
        }

        let width = self.width;
        if self.last_key.is_none() {
            for level in &mut self.levels {
                let net = network_of(key, level.prefix_len, width);
                level.reset(net);
            }
        } else {
            let boundary = self
                .levels
                .iter()
                .position(|l| network_of(key, l.prefix_len, width) != l.network)
                .unwrap_or(self.levels.len());

            for idx in boundary..self.levels.len() {
                self.rows.push(self.levels[idx].to_row());
            }
            if boundary > 0 {
                self.levels[boundary - 1].sub_block_count += 1;
            }
            for idx in boundary..self.levels.len() {
                let net = network_of(key, self.levels[idx].prefix_len, width);
                self.levels[idx].reset(net);
            }
        }

        for level in &mut self.levels {
            level.counter.add(counter)?;
        }
        self.last_key = Some(key);
        Ok(())
    }

    /// Flushes every remaining open level (including the grand total) and
    /// returns every row emitted over the aggregator's lifetime, in the
    /// order it was emitted.
    pub fn finalize(&mut self) -> Vec<Row> {
        if !self.finished {
            for level in &self.levels {
                self.rows.push(level.to_row());
            }
            self.levels.clear();
            self.finished = true;
        }
        self.rows.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals_for(rows: &[Row], prefix_len: u32) -> Vec<(u128, u128)> {
        rows.iter()
            .filter(|r| r.prefix_len == prefix_len)
            .map(|r| (r.network, r.counter))
            .collect()
    }

    #[test]
    fn strictly_ascending_is_enforced() {
        let spec = AggregatorSpec::default_v4();
        let mut agg = Aggregator::new(&spec);
        agg.add_key_counter(10, 1).unwrap();
        assert!(agg.add_key_counter(10, 1).is_err());
        assert!(agg.add_key_counter(5, 1).is_err());
    }

    // Spec scenario S5: "TS/ABCXH" over
    // {(10.0.0.1,3), (10.0.0.2,7), (10.0.1.1,5), (11.0.0.1,2)}
    // expects TOTAL=17, 10.0.0.0/24=10, 10.0.0.0/16=15, 10.0.0.0/8=15, 11.0.0.0/8=2.
    #[test]
    fn scenario_s5_ipv4_boundary_rollup() {
        let spec = AggregatorSpec::default_v4();
        let mut agg = Aggregator::new(&spec);

        let a = |o1: u128, o2: u128, o3: u128, o4: u128| (o1 << 24) | (o2 << 16) | (o3 << 8) | o4;
        agg.add_key_counter(a(10, 0, 0, 1), 3).unwrap();
        agg.add_key_counter(a(10, 0, 0, 2), 7).unwrap();
        agg.add_key_counter(a(10, 0, 1, 1), 5).unwrap();
        agg.add_key_counter(a(11, 0, 0, 1), 2).unwrap();
        let rows = agg.finalize();

        let total: u128 = rows.iter().filter(|r| r.prefix_len == 0).map(|r| r.counter).sum();
        assert_eq!(total, 17);

        let slash24 = totals_for(&rows, 24);
        assert_eq!(slash24.iter().find(|(n, _)| *n == a(10, 0, 0, 0)).unwrap().1, 10);

        let slash16 = totals_for(&rows, 16);
        assert_eq!(slash16.iter().find(|(n, _)| *n == a(10, 0, 0, 0)).unwrap().1, 15);

        let slash8 = totals_for(&rows, 8);
        assert_eq!(slash8.iter().find(|(n, _)| *n == a(10, 0, 0, 0)).unwrap().1, 15);
        assert_eq!(slash8.iter().find(|(n, _)| *n == a(11, 0, 0, 0)).unwrap().1, 2);
    }

    // Spec scenario S6: "v6:TS/48,64" smoke test — just check the rollup
    // doesn't confuse address families and totals still add up.
    #[test]
    fn scenario_s6_ipv6_spec_accumulates() {
        let spec = AggregatorSpec::default_v6();
        let mut agg = Aggregator::new(&spec);
        let base: u128 = 0x2001_0db8_0000_0001_0000_0000_0000_0000;
        agg.add_key_counter(base, 4).unwrap();
        agg.add_key_counter(base + 1, 6).unwrap();
        agg.add_key_counter(base + (1 << 64), 9).unwrap();
        let rows = agg.finalize();
        let total: u128 = rows.iter().filter(|r| r.prefix_len == 0).map(|r| r.counter).sum();
        assert_eq!(total, 19);
    }

    #[test]
    fn single_key_flushes_every_level_on_finalize() {
        let spec = AggregatorSpec::default_v4();
        let mut agg = Aggregator::new(&spec);
        agg.add_key_counter(0xC0A8_0001, 1).unwrap();
        let rows = agg.finalize();
        assert_eq!(rows.len(), spec.levels.len());
    }

    #[test]
    fn finalize_is_idempotent() {
        let spec = AggregatorSpec::default_v4();
        let mut agg = Aggregator::new(&spec);
        agg.add_key_counter(1, 1).unwrap();
        let first = agg.finalize();
        let second = agg.finalize();
        assert_eq!(first, second);
    }

    #[test]
    fn add_after_finalize_is_rejected() {
        let spec = AggregatorSpec::default_v4();
        let mut agg = Aggregator::new(&spec);
        agg.add_key_counter(1, 1).unwrap();
        agg.finalize();
        assert!(agg.add_key_counter(2, 1).is_err());
    }
}
