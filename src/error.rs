//! Shared error taxonomy for every subsystem in this crate.
//!
//! Every fallible operation across the I/O buffer, file header, prefix map,
//! and aggregator returns [`CoreError`]. There is no per-subsystem error type:
//! a single enum keeps the taxonomy from §7 of the design in one place and
//! lets the demonstration CLI convert any of them to `anyhow::Error` at its
//! outer boundary with a single `?`.
//!
//! Internal invariants (e.g. "a validated record index is in bounds") are
//! guarded with `debug_assert!` rather than returned as errors: those reflect
//! a bug in this crate, not malformed external input.

use std::fmt;
use std::io;

/// The call-site context captured alongside most error variants.
///
/// Mirrors the reference implementation's habit of recording the raising
/// line; here it is a short, static description of the operation instead of
/// a file/line pair; that tells the caller rather more than a line number
/// paired with an invisible file.
pub type Site = &'static str;

#[derive(Debug)]
pub enum CoreError {
    /// A caller-supplied argument was null, empty, or out of its legal domain.
    Args { site: Site, detail: String },
    /// An allocation failed (reported, never silently ignored).
    Memory { site: Site },
    /// The underlying channel's read/write/seek failed. The channel is
    /// considered invalid for any further operation once this is raised.
    Io { site: Site, source: io::Error },
    /// The channel returned fewer bytes than the operation required and the
    /// shortfall was not an expected end-of-stream condition.
    ShortRead { site: Site, expected: usize, got: usize },
    /// A write did not accept the full buffer.
    ShortWrite { site: Site, expected: usize, got: usize },
    /// A file header's magic number did not match.
    BadMagic { found: u32 },
    /// A file or record version fell outside the range this build accepts.
    BadVersion { site: Site, version: u32 },
    /// An unknown or unavailable compression method id.
    BadCompression { method: u8 },
    /// A header entry was truncated or its declared length overran the stream.
    BadHeader { site: Site, detail: String },
    /// The trie failed validation: depth overflow, a child index past the
    /// truncated record count, or a cycle.
    CorruptTree { site: Site, detail: String },
    /// A dictionary word is already bound to a different code.
    Duplicate { code: u32, existing_code: u32 },
    /// An operation that requires an as-yet-unmutated object found it already
    /// mutated (e.g. setting a default code after inserts began).
    NotEmpty { site: Site },
    /// An IPv6 payload was presented to a build that excludes IPv6 support.
    NoIpv6,
    /// An operation was attempted out of the order the API requires (e.g.
    /// changing the block size after the first read/write).
    CallOrder { site: Site, detail: String },
    /// A header mutation was attempted after the header's lock state forbids it.
    Locked { site: Site },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Args { site, detail } => write!(f, "{site}: invalid argument: {detail}"),
            CoreError::Memory { site } => write!(f, "{site}: allocation failed"),
            CoreError::Io { site, source } => write!(f, "{site}: I/O error: {source}"),
            CoreError::ShortRead { site, expected, got } => {
                write!(f, "{site}: short read: expected {expected} bytes, got {got}")
            }
            CoreError::ShortWrite { site, expected, got } => {
                write!(f, "{site}: short write: expected {expected} bytes, wrote {got}")
            }
            CoreError::BadMagic { found } => {
                write!(f, "bad magic number: found {found:#010x}")
            }
            CoreError::BadVersion { site, version } => {
                write!(f, "{site}: unsupported version {version}")
            }
            CoreError::BadCompression { method } => {
                write!(f, "unknown or unavailable compression method id {method}")
            }
            CoreError::BadHeader { site, detail } => write!(f, "{site}: malformed header: {detail}"),
            CoreError::CorruptTree { site, detail } => {
                write!(f, "{site}: corrupt prefix-map trie: {detail}")
            }
            CoreError::Duplicate { code, existing_code } => write!(
                f,
                "dictionary word already bound to code {existing_code}, not {code}"
            ),
            CoreError::NotEmpty { site } => write!(f, "{site}: object already mutated"),
            CoreError::NoIpv6 => write!(f, "IPv6 support is not compiled into this build"),
            CoreError::CallOrder { site, detail } => write!(f, "{site}: wrong call order: {detail}"),
            CoreError::Locked { site } => write!(f, "{site}: header is locked against mutation"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl CoreError {
    pub fn io(site: Site, source: io::Error) -> Self {
        CoreError::Io { site, source }
    }

    pub fn args(site: Site, detail: impl Into<String>) -> Self {
        CoreError::Args { site, detail: detail.into() }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
