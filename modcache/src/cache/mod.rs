//! # Module Cache
//!
//! Maps instruction addresses to the module that owns them. Looking a module
//! up from scratch is expensive (it means reading `/proc/<pid>/maps` and
//! parsing ELF headers), so the cache remembers every module it has seen,
//! keyed by the address range the module occupies.
//!
//! ## Tiers
//!
//! ```text
//! lookup(addr)
//!   │
//!   ├─► non-native index   generated code, checked first since a region
//!   │                      may be nested inside a native image
//!   ├─► native index       executables and shared libraries seen so far
//!   ├─► ModuleEnumerator   on miss; result inserted into native index
//!   └─► AuxiliaryModuleProvider   if the enumerator found nothing
//! ```
//!
//! Non-native modules removed by
//! [`ModuleCache::update_non_native_modules`] move to a retired archive
//! instead of being dropped, so that handles taken while sampling still
//! describe the code that was sampled.
//!
//! ## Contract violations
//!
//! Overlapping insertions, retiring a module that is not active, and
//! mismatched provider registration are programmer errors. The panicking
//! operations report them with a panic; the `try_` variants return a
//! [`ContractViolation`](crate::domain::ContractViolation). Either way the
//! cache is left untouched.

mod module_cache;
mod native_index;
mod non_native_index;
mod provider;

pub use module_cache::{CacheStats, ModuleCache};
pub use native_index::NativeModuleIndex;
pub use non_native_index::NonNativeModuleIndex;
pub use provider::{AuxiliaryModuleProvider, ModuleEnumerator, NoModules};

use crate::domain::ContractViolation;
use crate::module::{MemoryRange, ModuleRef};

/// Set of modules with mutually disjoint ranges, ordered by base address
pub trait ModuleIndex {
    /// Module whose range contains `address`
    fn find(&self, address: u64) -> Option<&ModuleRef>;

    /// Modules colliding with `range`, in ascending base address order
    fn find_overlapping(&self, range: MemoryRange) -> Vec<ModuleRef>;

    /// Add a module.
    ///
    /// # Errors
    /// Returns [`ContractViolation::Overlap`] if the module collides with one
    /// already present. The index is unchanged in that case.
    fn insert(&mut self, module: ModuleRef) -> Result<(), ContractViolation>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
