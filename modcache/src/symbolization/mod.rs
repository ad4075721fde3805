//! # Offline Symbolization
//!
//! Turns a sampled address into function names and source locations, once
//! the [`ModuleCache`](crate::cache::ModuleCache) has told us which module the
//! address belongs to.
//!
//! ## Address Translation
//!
//! Modules are loaded at randomized base addresses (ASLR), while DWARF
//! describes code by the addresses the linker assigned. The module base
//! corresponds to the binary's first segment, so:
//!
//! ```text
//! module offset  = runtime address - module base
//! linker address = first segment address (page aligned) + module offset
//! ```
//!
//! For PIE executables and shared libraries the first segment sits at 0 and
//! the two are equal.
//!
//! ## Module Structure
//!
//! - **`symbolizer`**: DWARF lookup for one binary, via `addr2line`/`gimli`,
//!   with a symbol table fallback and `rustc-demangle` for Rust names
//! - **`module_symbolizer`**: one symbolizer per native module file
//!
//! Only native modules with a backing file can be symbolized. Generated code
//! has no DWARF; its debug basename is all we know about it.

pub mod module_symbolizer;
pub mod symbolizer;

pub use module_symbolizer::ModuleSymbolizer;
pub use symbolizer::{InlinedFrame, ResolvedFrame, SourceLocation, Symbolizer};
