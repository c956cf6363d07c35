//! Core data structures for a network-flow analysis toolkit: compressed
//! block I/O, an extensible typed file header, a binary-trie prefix map over
//! IPv4/IPv6/proto-port keys, a streaming CIDR rollup aggregator, and the
//! glue that exposes a loaded map as filter predicates and printable fields.
//!
//! # Layering
//!
//! `iobuf` is the lowest layer (no dependency on anything else in this
//! crate). `header` builds on it for the compression-method wire encoding.
//! `pmap` builds on both. `aggregator` and `filterglue` are independent
//! consumers of `pmap`'s public types.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod filterglue;
pub mod header;
pub mod iobuf;
pub mod pmap;

pub use error::{CoreError, Result};
