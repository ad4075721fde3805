//! # OS Module Enumeration (Linux)
//!
//! Describes the binaries mapped into a process by reading its memory maps.
//!
//! ## Address Space Layout
//!
//! A shared library or PIE executable is mapped as several consecutive
//! segments of the same file, at a base address randomized by ASLR:
//!
//! ```text
//! 7f1c3a200000-7f1c3a228000 r--p 00000000 fd:01 1712  /usr/lib/libc.so.6   ◄─ base
//! 7f1c3a228000-7f1c3a3bd000 r-xp 00028000 fd:01 1712  /usr/lib/libc.so.6
//! 7f1c3a3bd000-7f1c3a415000 r--p 001bd000 fd:01 1712  /usr/lib/libc.so.6
//! 7f1c3a415000-7f1c3a41b000 rw-p 00214000 fd:01 1712  /usr/lib/libc.so.6   ◄─ end
//! ```
//!
//! The module's extent is the span of that run of mappings. Its identifier is
//! the GNU build-id note read from the file with the `object` crate.
//!
//! ## Module Structure
//!
//! - **`memory_maps`**: parses `/proc/<pid>/maps` lines
//! - **`build_id`**: reads build-id notes and formats them for symbol servers
//! - **`proc_maps`**: [`ProcMapsEnumerator`], the cache's default enumerator
//!
//! ## Limitations
//!
//! - **Linux only**: relies on procfs
//! - **Mount namespaces**: paths are resolved in the caller's namespace, so
//!   build ids of binaries in other containers may be unreadable

pub mod build_id;
pub mod memory_maps;
mod proc_maps;

pub use build_id::{hex_id, read_build_id, symbol_server_id};
pub use memory_maps::{find_image, parse_maps, read_maps, MapsEntry};
pub use proc_maps::ProcMapsEnumerator;
