//! # modcache - Address to Module Cache for Sampling Profilers
//!
//! A sampling profiler records raw instruction pointers. To attribute them to
//! source code it first has to know which binary module owns each address:
//! an executable, a shared library, or a region of JIT-generated code. Asking
//! the OS for every sample is slow, so modcache caches module descriptors by
//! the address range they occupy.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                Sampler / Symbolizer (caller)                     │
//! └───────────┬──────────────────────────────────┬───────────────────┘
//!             │ get_module_for_address(ip)       │ update_non_native_modules
//!             ▼                                  ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        ModuleCache                               │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────┐      │
//! │  │  non-native    │  │    native      │  │    retired     │      │
//! │  │  (sorted Vec)  │  │  (BTreeMap)    │  │  (kept alive)  │      │
//! │  └────────────────┘  └───────▲────────┘  └────────────────┘      │
//! └──────────────────────────────┼───────────────────────────────────┘
//!                                │ on miss
//!             ┌──────────────────┴─────────────────┐
//!             ▼                                    ▼
//!   ┌───────────────────┐              ┌─────────────────────────┐
//!   │ ModuleEnumerator  │ ── none ──▶  │ AuxiliaryModuleProvider │
//!   │ (/proc/pid/maps)  │              │    (optional, one)      │
//!   └───────────────────┘              └─────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`module`]: the [`Module`](module::Module) trait and its native and
//!   non-native descriptors
//! - [`cache`]: [`ModuleCache`](cache::ModuleCache) and its range indices
//! - [`os`]: the Linux enumerator reading `/proc/<pid>/maps` and build ids
//! - [`jit`]: loads perf JIT maps into the non-native tier
//! - [`symbolization`]: DWARF symbolization of native module offsets
//! - [`report`]: text and JSON output of the `modcache` binary
//! - [`cli`], [`process_lookup`], [`preflight`]: the binary's plumbing
//! - [`domain`]: error types
//!
//! ## Typical Usage
//!
//! ```rust,no_run
//! use modcache::cache::ModuleCache;
//!
//! let mut cache = ModuleCache::new();
//! let ip = 0x7f1c_3a22_9c40;
//! if let Some(module) = cache.get_module_for_address(ip) {
//!     println!("{}+0x{:x}", module.debug_basename().display(), ip - module.base_address());
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod domain;
pub mod jit;
pub mod module;
pub mod os;
pub mod preflight;
pub mod process_lookup;
pub mod report;
pub mod symbolization;
