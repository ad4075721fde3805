//! # Module Descriptors
//!
//! A module is a contiguous region of the address space holding executable
//! code. Two kinds exist:
//!
//! - **Native** modules are executables and shared libraries mapped by the OS
//!   loader. They are discovered lazily by a
//!   [`ModuleEnumerator`](crate::cache::ModuleEnumerator) or added explicitly.
//! - **Non-native** modules are regions of generated code, such as the output
//!   of a JIT compiler. They are supplied by the caller in bulk and may be
//!   nested inside a native module's mapping.
//!
//! Descriptors are immutable once built and are handed around as
//! [`ModuleRef`] handles. A handle obtained while collecting a sample keeps
//! the descriptor alive until the sample has been symbolized, however the
//! cache changes in between.

mod native;
mod non_native;
mod range;

pub use native::NativeModule;
pub use non_native::NonNativeModule;
pub use range::MemoryRange;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Shared handle to a module descriptor
pub type ModuleRef = Arc<dyn Module>;

/// Read-only view of one module's identity and extent
pub trait Module: fmt::Debug + Send + Sync {
    /// Base address of the module
    fn base_address(&self) -> u64;

    /// Opaque binary string that identifies a particular build of the module
    /// with high probability.
    ///
    /// For binaries produced by GNU tools this is the contents of the
    /// `.note.gnu.build-id` note. Empty when the module has no identifier.
    fn id(&self) -> &[u8];

    /// Basename of the file holding the module's debug information
    fn debug_basename(&self) -> &Path;

    /// Size of the module in bytes
    fn size(&self) -> u64;

    /// True if the module was loaded by the OS loader
    fn is_native(&self) -> bool;

    /// Backing file of the module, when it was loaded from one
    fn file_path(&self) -> Option<&Path> {
        None
    }

    fn range(&self) -> MemoryRange {
        MemoryRange::from_base_and_size(self.base_address(), self.size())
    }

    /// Check if an address falls within this module
    fn contains(&self, address: u64) -> bool {
        self.range().contains(address)
    }
}

/// Check if two handles refer to the same descriptor
#[must_use]
pub fn same_module(a: &ModuleRef, b: &ModuleRef) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
