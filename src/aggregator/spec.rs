//! Grammar for an aggregator specification string:
//! `"[v4:|v6:]<set1>[/<set2>]"`.

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn width(self) -> u32 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }
}

/// One rollup level: a CIDR prefix length and whether its row is part of the
/// printed hierarchy (before the `/`) or summed-only (after the `/`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub prefix_len: u32,
    pub printed: bool,
}

#[derive(Debug, Clone)]
pub struct AggregatorSpec {
    pub family: Family,
    pub levels: Vec<Level>,
    pub summary: bool,
}

impl AggregatorSpec {
    pub fn default_v4() -> Self {
        AggregatorSpec::parse("TS/ABCXH").expect("built-in default spec parses")
    }

    pub fn default_v6() -> Self {
        AggregatorSpec::parse("v6:TS/48,64").expect("built-in default spec parses")
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (family, rest) = if let Some(r) = s.strip_prefix("v4:") {
            (Family::V4, r)
        } else if let Some(r) = s.strip_prefix("v6:") {
            (Family::V6, r)
        } else {
            (Family::V4, s)
        };

        let (printed_part, summed_part) = match rest.split_once('/') {
            Some((a, b)) => (a, Some(b)),
            None => (rest, None),
        };

        let mut levels: Vec<Level> = Vec::new();
        let mut summary = false;
        parse_token_list(family, printed_part, true, &mut levels, &mut summary)?;
        if let Some(part) = summed_part {
            parse_token_list(family, part, false, &mut levels, &mut summary)?;
        }
        if levels.is_empty() {
            return Err(CoreError::args("AggregatorSpec::parse", "spec string names no levels"));
        }
        levels.sort_by_key(|l| l.prefix_len);
        Ok(AggregatorSpec { family, levels, summary })
    }
}

fn parse_token_list(
    family: Family,
    part: &str,
    printed: bool,
    levels: &mut Vec<Level>,
    summary: &mut bool,
) -> Result<()> {
    for tok in part.split(',') {
        let tok = tok.trim();
        if tok.is_empty() {
            continue;
        }
        if tok.eq_ignore_ascii_case("S") {
            *summary = true;
            continue;
        }
        let prefix_len = parse_token(family, tok)?;
        match levels.iter_mut().find(|l| l.prefix_len == prefix_len) {
            Some(existing) => existing.printed |= printed,
            None => levels.push(Level { prefix_len, printed }),
        }
    }
    Ok(())
}

fn parse_token(family: Family, tok: &str) -> Result<u32> {
    let width = family.width();
    let upper = tok.to_ascii_uppercase();
    let prefix_len = match upper.as_str() {
        "T" => 0,
        "H" => width,
        "A" if family == Family::V4 => 8,
        "B" if family == Family::V4 => 16,
        "C" if family == Family::V4 => 24,
        "X" if family == Family::V4 => 27,
        _ => tok
            .parse::<u32>()
            .map_err(|_| CoreError::args("AggregatorSpec::parse", format!("unrecognized token '{tok}'")))?,
    };
    if prefix_len > width {
        return Err(CoreError::args(
            "AggregatorSpec::parse",
            format!("prefix length {prefix_len} exceeds address width {width}"),
        ));
    }
    Ok(prefix_len)
}
