//! Compile-time and environment-overridable tunables.
//!
//! Centralizes the handful of defaults the design allows callers to vary
//! without threading a configuration object through every constructor. Each
//! constant here is read once; nothing in this crate watches these values for
//! changes after a component has been constructed.

/// Default uncompressed block size for the I/O buffer: 64 KiB.
pub const BLOCK_SIZE_DEFAULT: usize = 64 * 1024;

/// Upper bound on the configurable block size: 2^24 bytes.
pub const BLOCK_SIZE_MAX: usize = 1 << 24;

/// Default record-size alignment quantum (no alignment beyond a single byte).
pub const RECORD_SIZE_DEFAULT: usize = 1;

/// Slack bytes appended past the advertised uncompressed length when
/// allocating a decompression buffer. See the design notes on codecs that
/// write in 4-byte units past the logical end of their output.
pub const DECOMPRESS_OVERRUN_PAD: usize = 3;

/// Default padding modulus for a freshly created file header, when the
/// caller has not set an explicit record size.
pub const HEADER_PADDING_MODULUS_DEFAULT: usize = 4;

/// File-format version at and above which the extensible header format
/// (magic + typed entries) applies; below it, a legacy reader is dispatched.
pub const EXPANDED_INIT_VERSION: u8 = 16;

/// Default column width for aggregator counter columns.
pub const AGGREGATOR_COUNT_WIDTH_DEFAULT: usize = 10;

/// Reads `FLOWCORE_BLOCK_SIZE` from the environment, falling back to
/// [`BLOCK_SIZE_DEFAULT`] when unset or unparseable. Clamped to
/// [`BLOCK_SIZE_MAX`].
pub fn block_size_from_env() -> usize {
    std::env::var("FLOWCORE_BLOCK_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .map(|n| n.min(BLOCK_SIZE_MAX))
        .unwrap_or(BLOCK_SIZE_DEFAULT)
}

/// Reads `FLOWCORE_RECORD_SIZE` from the environment, falling back to
/// [`RECORD_SIZE_DEFAULT`] when unset, unparseable, or zero.
pub fn record_size_from_env() -> usize {
    std::env::var("FLOWCORE_RECORD_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(RECORD_SIZE_DEFAULT)
}
