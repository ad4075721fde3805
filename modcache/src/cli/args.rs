//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "modcache",
    about = "Resolve instruction addresses to the modules that own them",
    after_help = "\
EXAMPLES:
    modcache --list                              Modules of modcache itself
    modcache --pid 1234 0x7f1c3a229c40           Which module owns an address
    modcache --process my-app --symbolize 0x55d0c8a03120
    modcache --pid 1234 --perf-map /tmp/perf-1234.map --json 0x7f2ba4401010"
)]
pub struct Args {
    /// Addresses to resolve (hex with 0x prefix, or decimal)
    #[arg(value_name = "ADDRESS", value_parser = parse_address)]
    pub addresses: Vec<u64>,

    /// Process ID to inspect (defaults to this process)
    #[arg(short, long, conflicts_with = "process")]
    pub pid: Option<i32>,

    /// Process name to inspect (auto-detects the PID)
    #[arg(short = 'n', long)]
    pub process: Option<String>,

    /// Perf JIT map describing generated code regions
    #[arg(long, value_name = "FILE")]
    pub perf_map: Option<PathBuf>,

    /// Resolve native addresses to functions and source lines
    #[arg(short, long)]
    pub symbolize: bool,

    /// List every module cached after resolving the addresses
    #[arg(short, long)]
    pub list: bool,

    /// Print a JSON document instead of text
    #[arg(long)]
    pub json: bool,

    /// Don't open binaries to read their build ids
    #[arg(long)]
    pub no_build_id: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Parse an address given as `0x`-prefixed hex or decimal
///
/// # Errors
/// Returns a message suitable for clap if the value is not a number.
pub fn parse_address(value: &str) -> Result<u64, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => value.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid address '{value}': {e}"))
}
