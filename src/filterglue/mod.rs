//! Exposes a loaded [`PrefixMap`] as filter predicates and printable fields
//! for a flow-record collaborator: match-source, match-destination,
//! match-either, plus a source-side and dest-side label field.

use std::collections::HashSet;

use crate::error::{CoreError, Result};
use crate::pmap::{KeyKind, PrefixMap};

/// Which side of a flow record a predicate or field reads its key from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

/// A predicate's match mode: one side, or either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Source,
    Destination,
    Either,
}

/// The five option/field names a loaded map contributes to the invocation,
/// derived either from its carried name or from the legacy unnamed aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSet {
    pub filter_src: String,
    pub filter_dst: String,
    pub filter_any: String,
    pub field_src: String,
    pub field_dst: String,
}

impl NameSet {
    fn all(&self) -> [&str; 5] {
        [&self.filter_src, &self.filter_dst, &self.filter_any, &self.field_src, &self.field_dst]
    }

    fn derive(name: Option<&str>, kind: KeyKind) -> Self {
        match name {
            Some(n) => NameSet {
                filter_src: format!("pmap-src-{n}"),
                filter_dst: format!("pmap-dst-{n}"),
                filter_any: format!("pmap-any-{n}"),
                field_src: format!("pmap-src-{n}"),
                field_dst: format!("pmap-dst-{n}"),
            },
            None => {
                let legacy = match kind {
                    KeyKind::ProtoPort => "port-proto",
                    KeyKind::Ipv4 | KeyKind::Ipv6 => "address",
                };
                NameSet {
                    filter_src: format!("pmap-s-{legacy}"),
                    filter_dst: format!("pmap-d-{legacy}"),
                    filter_any: format!("pmap-any-{legacy}"),
                    field_src: format!("pmap-s-{legacy}"),
                    field_dst: format!("pmap-d-{legacy}"),
                }
            }
        }
    }
}

/// Tracks option/field names claimed so far in one invocation so that two
/// loaded maps never collide on a name or a derived option name.
#[derive(Debug, Default)]
pub struct GlueRegistry {
    used: HashSet<String>,
}

impl GlueRegistry {
    pub fn new() -> Self {
        GlueRegistry::default()
    }

    /// Reserves the option/field names a map (named or legacy-unnamed) would
    /// expose, failing if any of them is already taken.
    pub fn register(&mut self, name: Option<&str>, kind: KeyKind) -> Result<NameSet> {
        let names = NameSet::derive(name, kind);
        for candidate in names.all() {
            if self.used.contains(candidate) {
                return Err(CoreError::args(
                    "GlueRegistry::register",
                    format!("option name '{candidate}' is already claimed by another loaded map"),
                ));
            }
        }
        for candidate in names.all() {
            self.used.insert(candidate.to_string());
        }
        Ok(names)
    }
}

/// A parsed, code-checked set of enabled labels for one filter predicate.
#[derive(Debug, Clone, Default)]
pub struct EnabledCodes(HashSet<u32>);

impl EnabledCodes {
    /// Parses a comma-separated label list against `map`: each label is
    /// looked up in the dictionary, or else parsed as a decimal code and
    /// existence-checked against the map's code set.
    pub fn parse(map: &PrefixMap, spec: &str) -> Result<Self> {
        let mut codes = HashSet::new();
        for label in spec.split(',') {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            let code = match map.dict_lookup_word(label) {
                Some(code) => code,
                None => {
                    let numeric: u32 = label.parse().map_err(|_| {
                        CoreError::args(
                            "EnabledCodes::parse",
                            format!("'{label}' is neither a known label nor a numeric code"),
                        )
                    })?;
                    let present = map.iterate()?.iter().any(|&(_, _, code)| code == numeric);
                    if !present {
                        return Err(CoreError::args(
                            "EnabledCodes::parse",
                            format!("code {numeric} does not appear in this map"),
                        ));
                    }
                    numeric
                }
            };
            codes.insert(code);
        }
        Ok(EnabledCodes(codes))
    }

    pub fn contains(&self, code: u32) -> bool {
        self.0.contains(&code)
    }
}

/// One active filter predicate bound to a specific map.
pub struct MapFilter<'a> {
    map: &'a PrefixMap,
    kind: FilterKind,
    enabled: EnabledCodes,
}

impl<'a> MapFilter<'a> {
    pub fn new(map: &'a PrefixMap, kind: FilterKind, label_spec: &str) -> Result<Self> {
        let enabled = EnabledCodes::parse(map, label_spec)?;
        Ok(MapFilter { map, kind, enabled })
    }

    /// Tests one record's `(source_key, destination_key)` pair.
    pub fn accepts(&self, source_key: u128, destination_key: u128) -> Result<bool> {
        match self.kind {
            FilterKind::Source => Ok(self.enabled.contains(self.map.find_code(source_key)?)),
            FilterKind::Destination => Ok(self.enabled.contains(self.map.find_code(destination_key)?)),
            FilterKind::Either => {
                let src_code = self.map.find_code(source_key)?;
                let dst_code = self.map.find_code(destination_key)?;
                Ok(self.enabled.contains(src_code) || self.enabled.contains(dst_code))
            }
        }
    }
}

/// A conjunction of every active filter in one invocation: a record passes
/// iff every filter accepts it.
#[derive(Default)]
pub struct FilterSet<'a> {
    filters: Vec<MapFilter<'a>>,
}

impl<'a> FilterSet<'a> {
    pub fn new() -> Self {
        FilterSet::default()
    }

    pub fn push(&mut self, filter: MapFilter<'a>) {
        self.filters.push(filter);
    }

    pub fn accepts(&self, source_key: u128, destination_key: u128) -> Result<bool> {
        for filter in &self.filters {
            if !filter.accepts(source_key, destination_key)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A printable field backed by a map's dictionary label for one side of a
/// flow record.
pub struct MapField<'a> {
    map: &'a PrefixMap,
    side: Side,
}

impl<'a> MapField<'a> {
    pub fn new(map: &'a PrefixMap, side: Side) -> Self {
        MapField { map, side }
    }

    pub fn render(&self, source_key: u128, destination_key: u128) -> Result<String> {
        let key = match self.side {
            Side::Source => source_key,
            Side::Destination => destination_key,
        };
        self.map.find_label(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmap::key;
    use std::net::Ipv4Addr;

    fn sample_map() -> PrefixMap {
        let mut m = PrefixMap::create_empty(KeyKind::Ipv4);
        m.dict_insert(1, "corp").unwrap();
        m.dict_insert(2, "guest").unwrap();
        let corp_lo = key::ipv4_key(Ipv4Addr::new(10, 0, 0, 0));
        let corp_hi = key::ipv4_key(Ipv4Addr::new(10, 0, 0, 255));
        let guest_lo = key::ipv4_key(Ipv4Addr::new(10, 0, 1, 0));
        let guest_hi = key::ipv4_key(Ipv4Addr::new(10, 0, 1, 255));
        m.add_range(corp_lo, corp_hi, 1).unwrap();
        m.add_range(guest_lo, guest_hi, 2).unwrap();
        m
    }

    #[test]
    fn named_map_gets_src_dst_any_option_names() {
        let mut registry = GlueRegistry::new();
        let names = registry.register(Some("zones"), KeyKind::Ipv4).unwrap();
        assert_eq!(names.filter_src, "pmap-src-zones");
        assert_eq!(names.filter_dst, "pmap-dst-zones");
        assert_eq!(names.filter_any, "pmap-any-zones");
    }

    #[test]
    fn unnamed_ipv4_map_gets_legacy_address_aliases() {
        let mut registry = GlueRegistry::new();
        let names = registry.register(None, KeyKind::Ipv4).unwrap();
        assert_eq!(names.filter_src, "pmap-s-address");
        assert_eq!(names.filter_any, "pmap-any-address");
    }

    #[test]
    fn unnamed_proto_port_map_gets_legacy_port_proto_aliases() {
        let mut registry = GlueRegistry::new();
        let names = registry.register(None, KeyKind::ProtoPort).unwrap();
        assert_eq!(names.filter_src, "pmap-s-port-proto");
    }

    #[test]
    fn second_map_with_same_name_is_rejected() {
        let mut registry = GlueRegistry::new();
        registry.register(Some("zones"), KeyKind::Ipv4).unwrap();
        assert!(registry.register(Some("zones"), KeyKind::Ipv6).is_err());
    }

    #[test]
    fn two_unnamed_maps_of_the_same_kind_collide() {
        let mut registry = GlueRegistry::new();
        registry.register(None, KeyKind::Ipv4).unwrap();
        assert!(registry.register(None, KeyKind::Ipv4).is_err());
    }

    #[test]
    fn source_filter_matches_only_source_side() {
        let map = sample_map();
        let filter = MapFilter::new(&map, FilterKind::Source, "corp").unwrap();
        let corp_addr = key::ipv4_key(Ipv4Addr::new(10, 0, 0, 5));
        let guest_addr = key::ipv4_key(Ipv4Addr::new(10, 0, 1, 5));
        assert!(filter.accepts(corp_addr, guest_addr).unwrap());
        assert!(!filter.accepts(guest_addr, corp_addr).unwrap());
    }

    #[test]
    fn either_filter_matches_if_any_side_matches() {
        let map = sample_map();
        let filter = MapFilter::new(&map, FilterKind::Either, "corp").unwrap();
        let corp_addr = key::ipv4_key(Ipv4Addr::new(10, 0, 0, 5));
        let outside = key::ipv4_key(Ipv4Addr::new(192, 168, 0, 1));
        assert!(filter.accepts(outside, corp_addr).unwrap());
        assert!(!filter.accepts(outside, outside).unwrap());
    }

    #[test]
    fn numeric_label_is_existence_checked() {
        let map = sample_map();
        assert!(MapFilter::new(&map, FilterKind::Source, "1").is_ok());
        assert!(MapFilter::new(&map, FilterKind::Source, "99").is_err());
    }

    #[test]
    fn unknown_word_label_is_rejected() {
        let map = sample_map();
        assert!(MapFilter::new(&map, FilterKind::Source, "nope").is_err());
    }

    #[test]
    fn filter_set_is_a_conjunction() {
        let map = sample_map();
        let corp_only = MapFilter::new(&map, FilterKind::Source, "corp").unwrap();
        let mut set = FilterSet::new();
        set.push(corp_only);
        let corp_addr = key::ipv4_key(Ipv4Addr::new(10, 0, 0, 5));
        let guest_addr = key::ipv4_key(Ipv4Addr::new(10, 0, 1, 5));
        assert!(set.accepts(corp_addr, guest_addr).unwrap());
        assert!(!set.accepts(guest_addr, corp_addr).unwrap());
    }

    #[test]
    fn field_renders_dictionary_label_for_its_side() {
        let map = sample_map();
        let src_field = MapField::new(&map, Side::Source);
        let dst_field = MapField::new(&map, Side::Destination);
        let corp_addr = key::ipv4_key(Ipv4Addr::new(10, 0, 0, 5));
        let guest_addr = key::ipv4_key(Ipv4Addr::new(10, 0, 1, 5));
        assert_eq!(src_field.render(corp_addr, guest_addr).unwrap(), "corp");
        assert_eq!(dst_field.render(corp_addr, guest_addr).unwrap(), "guest");
    }
}
