//! The binary trie backing a prefix map: a record array of tagged child
//! words, range insertion with leaf splitting, and load-time validation.

use crate::error::{CoreError, Result};

/// One child slot: either a leaf value in `[0, MAX_VALUE] ∪ {NOT_FOUND}`, or
/// an index into the owning [`Trie`]'s record array.
///
/// Packed to/from its single `u32` wire word only at the load/save boundary
/// (bit 31 is the tag: set means `Index`, clear means `Leaf`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    Index(u32),
    Leaf(u32),
}

const TAG_BIT: u32 = 0x8000_0000;

impl Child {
    pub fn pack(self) -> u32 {
        match self {
            Child::Index(i) => i | TAG_BIT,
            Child::Leaf(v) => v & !TAG_BIT,
        }
    }

    pub fn unpack(word: u32) -> Child {
        if word & TAG_BIT != 0 {
            Child::Index(word & !TAG_BIT)
        } else {
            Child::Leaf(word)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Record {
    pub left: Child,
    pub right: Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// An absolute safety limit on DFS depth during load-time validation,
/// independent of the key width (see §4.3.6).
const VALIDATION_DEPTH_LIMIT: u32 = 128;

pub struct Trie {
    pub records: Vec<Record>,
    width: u32,
}

impl Trie {
    /// A fresh trie with a single root record whose children are both the
    /// leaf `default_code`.
    pub fn new(width: u32, default_code: u32) -> Self {
        Trie {
            records: vec![Record { left: Child::Leaf(default_code), right: Child::Leaf(default_code) }],
            width,
        }
    }

    pub fn from_records(width: u32, records: Vec<Record>) -> Self {
        Trie { records, width }
    }

    fn child(&self, node: usize, side: Side) -> Child {
        match side {
            Side::Left => self.records[node].left,
            Side::Right => self.records[node].right,
        }
    }

    fn set_child(&mut self, node: usize, side: Side, child: Child) {
        match side {
            Side::Left => self.records[node].left = child,
            Side::Right => self.records[node].right = child,
        }
    }

    /// Returns the index of the index-child on `side`, splitting a leaf
    /// child into a fresh record (both of whose children are the leaf's
    /// former value) if necessary.
    fn ensure_index_child(&mut self, node: usize, side: Side) -> usize {
        match self.child(node, side) {
            Child::Index(idx) => idx as usize,
            Child::Leaf(value) => {
                let new_idx = self.records.len() as u32;
                self.records.push(Record { left: Child::Leaf(value), right: Child::Leaf(value) });
                self.set_child(node, side, Child::Index(new_idx));
                new_idx as usize
            }
        }
    }

    /// Inserts `[low, high] -> code` into the subtree rooted at `node`,
    /// splitting bit position `bit` (counting down from `width - 1`). See
    /// the design notes on range insertion: the left and right subtrees are
    /// handled independently, since a range can intersect either, both, or
    /// neither.
    fn insert_range(&mut self, node: usize, bit: u32, low: u128, high: u128, code: u32) {
        let low_bit = (low >> bit) & 1;
        let high_bit = (high >> bit) & 1;
        let low_mask = if bit == 0 { 0 } else { (1u128 << bit) - 1 };
        let low_bottom_zero = (low & low_mask) == 0;
        let high_bottom_one = (high & low_mask) == low_mask;

        if low_bit == 0 {
            let covered = low_bottom_zero && (high_bit == 1 || high_bottom_one);
            if covered {
                self.set_child(node, Side::Left, Child::Leaf(code));
            } else {
                let child_high = if high_bit == 1 { low_mask } else { high };
                let left_idx = self.ensure_index_child(node, Side::Left);
                self.insert_range(left_idx, bit - 1, low, child_high, code);
            }
        }

        if high_bit == 1 {
            let covered = high_bottom_one && (low_bit == 0 || low_bottom_zero);
            if covered {
                self.set_child(node, Side::Right, Child::Leaf(code));
            } else {
                let child_low = if low_bit == 0 { 1u128 << bit } else { low };
                let right_idx = self.ensure_index_child(node, Side::Right);
                self.insert_range(right_idx, bit - 1, child_low, high, code);
            }
        }
    }

    /// Inserts `[low, high] -> code` from the root.
    pub fn add_range(&mut self, low: u128, high: u128, code: u32) {
        if self.width == 0 {
            return;
        }
        self.insert_range(0, self.width - 1, low, high, code);
    }

    /// Walks from the root for `key`, returning `(code, consulted_depth)`
    /// where `consulted_depth` is the number of bits examined before a leaf
    /// was reached (the CIDR prefix length of the matched range).
    pub fn lookup(&self, key: u128) -> Result<(u32, u32)> {
        let mut node = 0usize;
        for i in 0..self.width {
            let bit = self.width - 1 - i;
            let side = if (key >> bit) & 1 == 0 { Side::Left } else { Side::Right };
            match self.child(node, side) {
                Child::Leaf(value) => return Ok((value, i + 1)),
                Child::Index(idx) => node = idx as usize,
            }
        }
        Err(CoreError::CorruptTree { site: "Trie::lookup", detail: "depth exceeded key width".into() })
    }

    /// Validates the record array per §4.3.6: truncates the used record
    /// count at the first out-of-range child index, then rejects the tree if
    /// a bounded DFS from the root still finds an index past the truncated
    /// count or a depth overflow.
    pub fn validate(&mut self) -> Result<()> {
        let mut used = self.records.len();
        for (i, record) in self.records.iter().enumerate() {
            for child in [record.left, record.right] {
                if let Child::Index(idx) = child {
                    if idx as usize >= self.records.len() {
                        used = i;
                        break;
                    }
                }
            }
            if used == i {
                break;
            }
        }
        self.records.truncate(used);

        let depth_limit = self.width.min(VALIDATION_DEPTH_LIMIT);
        self.validate_dfs(0, 0, depth_limit)
    }

    fn validate_dfs(&self, node: usize, depth: u32, depth_limit: u32) -> Result<()> {
        if depth > depth_limit {
            return Err(CoreError::CorruptTree {
                site: "Trie::validate",
                detail: format!("depth {depth} exceeds limit {depth_limit}"),
            });
        }
        if node >= self.records.len() {
            return Err(CoreError::CorruptTree {
                site: "Trie::validate",
                detail: format!("child index {node} at or beyond truncated record count"),
            });
        }
        for child in [self.records[node].left, self.records[node].right] {
            if let Child::Index(idx) = child {
                self.validate_dfs(idx as usize, depth + 1, depth_limit)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_pack_round_trips() {
        assert_eq!(Child::unpack(Child::Index(12).pack()), Child::Index(12));
        assert_eq!(Child::unpack(Child::Leaf(99).pack()), Child::Leaf(99));
    }

    #[test]
    fn fresh_trie_resolves_default_everywhere() {
        let t = Trie::new(32, 0x7FFF_FFFF);
        let (code, _) = t.lookup(0xDEAD_BEEF).unwrap();
        assert_eq!(code, 0x7FFF_FFFF);
    }

    #[test]
    fn insert_exact_half_sets_single_leaf() {
        let mut t = Trie::new(4, 0x7FFF_FFFF);
        t.add_range(0b0000, 0b0111, 1); // top bit 0 half
        let (code, depth) = t.lookup(0b0101).unwrap();
        assert_eq!(code, 1);
        assert_eq!(depth, 1);
    }

    #[test]
    fn insert_spans_both_halves() {
        let mut t = Trie::new(4, 0x7FFF_FFFF);
        t.add_range(0b0110, 0b1001, 5);
        for k in 0b0110u128..=0b1001 {
            assert_eq!(t.lookup(k).unwrap().0, 5, "key {k:#06b}");
        }
        assert_ne!(t.lookup(0b0101).unwrap().0, 5);
        assert_ne!(t.lookup(0b1010).unwrap().0, 5);
    }

    #[test]
    fn later_insert_overrides_earlier_overlap() {
        let mut t = Trie::new(8, 0x7FFF_FFFF);
        t.add_range(0, 255, 1);
        t.add_range(100, 150, 2);
        assert_eq!(t.lookup(50).unwrap().0, 1);
        assert_eq!(t.lookup(120).unwrap().0, 2);
        assert_eq!(t.lookup(200).unwrap().0, 1);
    }

    #[test]
    fn single_point_insert_reaches_full_depth() {
        let mut t = Trie::new(8, 0x7FFF_FFFF);
        t.add_range(42, 42, 9);
        let (code, depth) = t.lookup(42).unwrap();
        assert_eq!(code, 9);
        assert_eq!(depth, 8);
    }

    #[test]
    fn validate_truncates_unreachable_out_of_range_tail() {
        let mut t = Trie::from_records(
            4,
            vec![
                Record { left: Child::Leaf(0), right: Child::Leaf(1) },
                Record { left: Child::Leaf(0), right: Child::Index(99) },
            ],
        );
        t.validate().unwrap();
        assert_eq!(t.records.len(), 1);
    }

    #[test]
    fn validate_rejects_reachable_out_of_range_child() {
        let mut t = Trie::from_records(
            4,
            vec![
                Record { left: Child::Index(1), right: Child::Leaf(0) },
                Record { left: Child::Leaf(0), right: Child::Index(99) },
            ],
        );
        assert!(t.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_tree() {
        let mut t = Trie::new(8, 0x7FFF_FFFF);
        t.add_range(0, 127, 1);
        t.add_range(128, 255, 2);
        t.validate().unwrap();
    }
}
