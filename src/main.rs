//! `flowcore`: a thin demonstration CLI over the library's prefix map and
//! net-structure aggregator. No business logic lives here — every subcommand
//! is a direct call into `flowcore::pmap` or `flowcore::aggregator`.

use std::fs::File;
use std::io::{self, BufRead, BufWriter};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use flowcore::aggregator::{Aggregator, AggregatorSpec};
use flowcore::iobuf::CompressionMethod;
use flowcore::pmap::{key, KeyKind, PrefixMap};

#[derive(Parser)]
#[command(name = "flowcore", version, about = "Prefix-map and CIDR rollup toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build, inspect, or dump a prefix map file.
    Pmap {
        #[command(subcommand)]
        action: PmapAction,
    },
    /// Roll an ascending `address,counter` stream up into CIDR totals.
    Rollup {
        /// Spec string, e.g. "TS/ABCXH" or "v6:TS/48,64".
        #[arg(long)]
        spec: String,
    },
}

#[derive(Subcommand)]
enum PmapAction {
    /// Build a prefix map from `low-high=code` range specs and write it to a file.
    Build {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = CompressionArg::None)]
        compression: CompressionArg,
        /// One or more `low-high=code` range specifications.
        ranges: Vec<String>,
    },
    /// Load a prefix map and print the code, label, and range matched by one key.
    Lookup { path: PathBuf, key: String },
    /// Load a prefix map and print every iterated range.
    Dump { path: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    V4,
    V6,
    Port,
}

impl From<KindArg> for KeyKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::V4 => KeyKind::Ipv4,
            KindArg::V6 => KeyKind::Ipv6,
            KindArg::Port => KeyKind::ProtoPort,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressionArg {
    None,
    Zlib,
    Snappy,
}

impl From<CompressionArg> for CompressionMethod {
    fn from(c: CompressionArg) -> Self {
        match c {
            CompressionArg::None => CompressionMethod::None,
            CompressionArg::Zlib => CompressionMethod::Zlib,
            CompressionArg::Snappy => CompressionMethod::Snappy,
        }
    }
}

/// Parses one endpoint of a range spec against `kind`'s textual convention:
/// a dotted-quad for IPv4, colon-hex for IPv6, `proto:port` for proto/port.
fn parse_endpoint(kind: KeyKind, s: &str) -> anyhow::Result<u128> {
    match kind {
        KeyKind::Ipv4 => Ok(key::ipv4_key(s.parse::<Ipv4Addr>()?)),
        KeyKind::Ipv6 => Ok(key::ipv6_key(s.parse::<Ipv6Addr>()?)),
        KeyKind::ProtoPort => {
            let (proto, port) = s
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("proto/port key '{s}' is not in 'proto:port' form"))?;
            Ok(key::proto_port_key(proto.parse()?, port.parse()?))
        }
    }
}

fn format_key(kind: KeyKind, value: u128) -> String {
    match kind {
        KeyKind::Ipv4 => Ipv4Addr::from(value as u32).to_string(),
        KeyKind::Ipv6 => Ipv6Addr::from(value).to_string(),
        KeyKind::ProtoPort => format!("{}:{}", value >> 16, value & 0xFFFF),
    }
}

/// Parses `"low-high=code"` into `(low, high, code)`.
fn parse_range_spec(kind: KeyKind, spec: &str) -> anyhow::Result<(u128, u128, u32)> {
    let (range_part, code_part) = spec
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("range spec '{spec}' is missing '=<code>'"))?;
    let (low_part, high_part) = range_part
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("range spec '{spec}' is missing '-' between endpoints"))?;
    let low = parse_endpoint(kind, low_part)?;
    let high = parse_endpoint(kind, high_part)?;
    let code: u32 = code_part.parse()?;
    Ok((low, high, code))
}

fn run_pmap_build(
    kind: KindArg,
    out: PathBuf,
    compression: CompressionArg,
    ranges: Vec<String>,
) -> anyhow::Result<()> {
    let kind: KeyKind = kind.into();
    let mut map = PrefixMap::create_empty(kind);
    for spec in &ranges {
        let (low, high, code) = parse_range_spec(kind, spec)?;
        map.add_range(low, high, code)?;
    }
    let mut w = BufWriter::new(File::create(&out)?);
    map.save(&mut w, cfg!(target_endian = "big"), compression.into())?;
    log::info!("wrote {} ranges to {}", ranges.len(), out.display());
    Ok(())
}

fn run_pmap_lookup(path: PathBuf, key_str: String) -> anyhow::Result<()> {
    let mut r = File::open(&path)?;
    let map = PrefixMap::load(&mut r)?;
    let kind = map.content_kind();
    let key_val = parse_endpoint(kind, &key_str)?;
    let (start, end, code) = map.find_range(key_val)?;
    let label = map.dict_get_label(code);
    println!(
        "code={code} label={label} range={}-{}",
        format_key(kind, start),
        format_key(kind, end)
    );
    Ok(())
}

fn run_pmap_dump(path: PathBuf) -> anyhow::Result<()> {
    let mut r = File::open(&path)?;
    let map = PrefixMap::load(&mut r)?;
    let kind = map.content_kind();
    for (start, end, code) in map.iterate()? {
        let label = map.dict_get_label(code);
        println!("{}-{} code={code} label={label}", format_key(kind, start), format_key(kind, end));
    }
    Ok(())
}

fn run_rollup(spec: String) -> anyhow::Result<()> {
    let parsed_spec = AggregatorSpec::parse(&spec)?;
    let family = parsed_spec.family;
    let mut agg = Aggregator::new(&parsed_spec);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (addr_part, counter_part) = line
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("line '{line}' is not 'address,counter'"))?;
        let key_val = match family {
            flowcore::aggregator::Family::V4 => key::ipv4_key(addr_part.parse::<Ipv4Addr>()?),
            flowcore::aggregator::Family::V6 => key::ipv6_key(addr_part.parse::<Ipv6Addr>()?),
        };
        let counter: u128 = counter_part.trim().parse()?;
        agg.add_key_counter(key_val, counter)?;
    }

    for row in agg.finalize() {
        if !row.printed {
            continue;
        }
        let network = match family {
            flowcore::aggregator::Family::V4 => Ipv4Addr::from(row.network as u32).to_string(),
            flowcore::aggregator::Family::V6 => Ipv6Addr::from(row.network).to_string(),
        };
        println!("{network}/{} total={} blocks={}", row.prefix_len, row.counter, row.sub_block_count);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Pmap { action } => match action {
            PmapAction::Build { kind, out, compression, ranges } => run_pmap_build(kind, out, compression, ranges)?,
            PmapAction::Lookup { path, key } => run_pmap_lookup(path, key)?,
            PmapAction::Dump { path } => run_pmap_dump(path)?,
        },
        Command::Rollup { spec } => run_rollup(spec)?,
    }
    Ok(())
}
