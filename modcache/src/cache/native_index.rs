//! Index of native modules
//!
//! Native modules arrive one at a time over the whole life of the process, as
//! lookups touch modules the cache has not seen yet, so this index is a
//! `BTreeMap` keyed by base address: single insertions stay O(log n).

use std::collections::BTreeMap;
use std::sync::Arc;

use super::ModuleIndex;
use crate::domain::ContractViolation;
use crate::module::{MemoryRange, ModuleRef};

#[derive(Debug, Default)]
pub struct NativeModuleIndex {
    modules: BTreeMap<u64, ModuleRef>,
}

impl NativeModuleIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Modules in ascending base address order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRef> + '_ {
        self.modules.values()
    }

    /// Walk the modules that may collide with `range`.
    ///
    /// Ranges in the index never overlap, so only the last module starting at
    /// or below `range.start` can reach into it from the left.
    fn candidates(&self, range: MemoryRange) -> impl Iterator<Item = &ModuleRef> + '_ {
        let first = self
            .modules
            .range(..=range.start)
            .next_back()
            .map_or(range.start, |(&base, _)| base);

        self.modules
            .range(first..)
            .take_while(move |&(&base, _)| base <= range.start || base < range.end)
            .map(|(_, module)| module)
            .filter(move |module| module.range().overlaps(&range))
    }
}

impl ModuleIndex for NativeModuleIndex {
    fn find(&self, address: u64) -> Option<&ModuleRef> {
        self.modules
            .range(..=address)
            .next_back()
            .map(|(_, module)| module)
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
        self.modules.insert(range.start, module);
        Ok(())
    }

    fn len(&self) -> usize {
        self.modules.len()
    }
}
