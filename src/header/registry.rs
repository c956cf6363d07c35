//! Process-wide registry of header-entry types and legacy file-format
//! dispatch.
//!
//! Each subsystem that defines a header-entry id (the prefix map defines
//! [`crate::pmap::PREFIXMAP_ID`]) registers a [`EntryVTable`] for it,
//! idempotently, the first time any header is read or written. The registry
//! itself only needs `print`/`unpack` for entries this process does not
//! statically know about — an unknown type-id encountered on read is
//! preserved as opaque bytes rather than rejected, so a tool built without a
//! given subsystem linked in can still pass its files through unmodified.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Behavior associated with a header-entry type-id.
///
/// `print` is used by diagnostic/dump tooling; it is optional because not
/// every entry type has a useful textual form.
pub struct EntryVTable {
    pub name: &'static str,
    pub print: Option<fn(&[u8]) -> String>,
}

fn registry() -> &'static Mutex<HashMap<u32, EntryVTable>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u32, EntryVTable>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers `vtable` under `type_id`, replacing any prior registration.
/// Safe to call more than once for the same id (idempotent from the caller's
/// perspective: the last registration wins, and subsystems only ever
/// register their own fixed id with the same vtable).
pub fn register(type_id: u32, vtable: EntryVTable) {
    registry().lock().unwrap().insert(type_id, vtable);
}

/// Looks up the display name for `type_id`, if a subsystem has registered one.
pub fn name_for(type_id: u32) -> Option<&'static str> {
    registry().lock().unwrap().get(&type_id).map(|v| v.name)
}

/// Renders `payload` using the registered `print` callback for `type_id`, if
/// any; otherwise renders it as a hex dump.
pub fn print_entry(type_id: u32, payload: &[u8]) -> String {
    let printer = registry().lock().unwrap().get(&type_id).and_then(|v| v.print);
    match printer {
        Some(f) => f(payload),
        None => payload.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(""),
    }
}

/// A legacy file-format reader: given the raw bytes following the start
/// record, produces the record size implied by the pre-extensible-header
/// version. Files whose version is below
/// [`crate::config::EXPANDED_INIT_VERSION`] are dispatched here instead of
/// through entry-list parsing.
pub type LegacyRecordSizeFn = fn(version: u8) -> u16;

fn legacy_registry() -> &'static Mutex<HashMap<u8, LegacyRecordSizeFn>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u8, LegacyRecordSizeFn>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers the legacy record-size function for `file_format_id`.
pub fn register_legacy(file_format_id: u8, f: LegacyRecordSizeFn) {
    legacy_registry().lock().unwrap().insert(file_format_id, f);
}

/// Returns the legacy record-size function registered for `file_format_id`,
/// if any.
pub fn legacy_record_size_fn(file_format_id: u8) -> Option<LegacyRecordSizeFn> {
    legacy_registry().lock().unwrap().get(&file_format_id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup_name() {
        register(900, EntryVTable { name: "test-entry", print: None });
        assert_eq!(name_for(900), Some("test-entry"));
    }

    #[test]
    fn unknown_type_id_prints_as_hex() {
        assert_eq!(print_entry(99999, &[0xDE, 0xAD]), "dead");
    }

    #[test]
    fn legacy_registration_round_trips() {
        fn rs(_v: u8) -> u16 {
            16
        }
        register_legacy(250, rs);
        assert_eq!(legacy_record_size_fn(250).map(|f| f(1)), Some(16));
        assert_eq!(legacy_record_size_fn(251), None);
    }
}
