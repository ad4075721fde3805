//! Sources of native module descriptors
//!
//! The cache never inspects the address space itself. On a miss it asks its
//! [`ModuleEnumerator`] first and then the registered
//! [`AuxiliaryModuleProvider`], if any.

use crate::module::ModuleRef;

/// Primary source of native modules, usually backed by the OS.
///
/// A returned module must contain `address`. Implementations may block on
/// I/O while reading binary headers.
pub trait ModuleEnumerator {
    fn create_module_for_address(&self, address: u64) -> Option<ModuleRef>;
}

/// Fallback for native modules the enumerator cannot describe, such as
/// modules that need custom handling.
///
/// At most one provider is registered with a cache at any time.
pub trait AuxiliaryModuleProvider: Send + Sync {
    fn try_create_module_for_address(&self, address: u64) -> Option<ModuleRef>;
}

impl<F> ModuleEnumerator for F
where
    F: Fn(u64) -> Option<ModuleRef>,
{
    fn create_module_for_address(&self, address: u64) -> Option<ModuleRef> {
        self(address)
    }
}

impl<F> AuxiliaryModuleProvider for F
where
    F: Fn(u64) -> Option<ModuleRef> + Send + Sync,
{
    fn try_create_module_for_address(&self, address: u64) -> Option<ModuleRef> {
        self(address)
    }
}

/// Enumerator that never finds a module.
///
/// Useful for caches fed exclusively through explicit insertion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModules;

impl ModuleEnumerator for NoModules {
    fn create_module_for_address(&self, _address: u64) -> Option<ModuleRef> {
        None
    }
}
