//! Index of non-native modules
//!
//! Non-native modules change in infrequent batches and have to be moved out
//! of the index on retirement, so a sorted vector is enough here. Searches use
//! `partition_point` on the base address.

use std::sync::Arc;

use super::ModuleIndex;
use crate::domain::ContractViolation;
use crate::module::{same_module, MemoryRange, ModuleRef};

#[derive(Debug, Default, Clone)]
pub struct NonNativeModuleIndex {
    modules: Vec<ModuleRef>,
}

impl NonNativeModuleIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Modules in ascending base address order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRef> + '_ {
        self.modules.iter()
    }

    /// Take `module` out of the index, matching by identity.
    ///
    /// Returns `None` when that exact descriptor is not present, even if an
    /// equal-looking one is.
    pub fn remove(&mut self, module: &ModuleRef) -> Option<ModuleRef> {
        let base = module.base_address();
        let idx = self.modules.partition_point(|m| m.base_address() < base);
        if self.modules.get(idx).is_some_and(|m| same_module(m, module)) {
            Some(self.modules.remove(idx))
        } else {
            None
        }
    }

    /// Position of the last module starting at or below `address`
    fn predecessor(&self, address: u64) -> Option<usize> {
        self.modules.partition_point(|m| m.base_address() <= address).checked_sub(1)
    }

    fn candidates(&self, range: MemoryRange) -> impl Iterator<Item = &ModuleRef> + '_ {
        let first = self.predecessor(range.start).unwrap_or(0);
        self.modules[first..]
            .iter()
            .take_while(move |m| m.base_address() <= range.start || m.base_address() < range.end)
            .filter(move |m| m.range().overlaps(&range))
    }
}

impl ModuleIndex for NonNativeModuleIndex {
    fn find(&self, address: u64) -> Option<&ModuleRef> {
        self.predecessor(address)
            .map(|idx| &self.modules[idx])
            .filter(|module| module.contains(address))
    }

    fn find_overlapping(&self, range: MemoryRange) -> Vec<ModuleRef> {
        self.candidates(range).map(Arc::clone).collect()
    }

    fn insert(&mut self, module: ModuleRef) -> Result<(), ContractViolation> {
        let range = module.range();
        if let Some(existing) = self.candidates(range).next() {
            return Err(ContractViolation::Overlap { new: range, existing: existing.range() });
        }
        let idx = self.modules.partition_point(|m| m.base_address() < range.start);
        self.modules.insert(idx, module);
        Ok(())
    }

    fn len(&self) -> usize {
        self.modules.len()
    }
}
