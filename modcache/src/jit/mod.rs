//! Generated code regions
//!
//! JIT compilers that support Linux `perf` describe the code they emit in
//! `/tmp/perf-<pid>.map`. This module turns those descriptions into
//! non-native modules of a [`ModuleCache`](crate::cache::ModuleCache).

pub mod perf_map;

pub use perf_map::{install_entry, parse_perf_map, PerfMapEntry, PerfMapLoader};
