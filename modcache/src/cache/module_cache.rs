use log::{debug, info, warn};
use std::sync::Arc;

use super::{
    AuxiliaryModuleProvider, ModuleEnumerator, ModuleIndex, NativeModuleIndex,
    NonNativeModuleIndex,
};
use crate::domain::ContractViolation;
use crate::module::{same_module, MemoryRange, ModuleRef};
use crate::os::ProcMapsEnumerator;

/// Cached lookup of modules by address.
///
/// Handles returned by the cache stay valid for as long as the caller holds
/// them, regardless of later insertions or retirements.
///
/// The cache is not synchronized internally: every mutating operation takes
/// `&mut self`. Share it across threads behind a lock.
pub struct ModuleCache<E = ProcMapsEnumerator> {
    enumerator: E,
    native: NativeModuleIndex,
    non_native: NonNativeModuleIndex,
    /// Non-native modules no longer mapped. Unordered, and may hold several
    /// modules loaded at the same base address over time.
    retired: Vec<ModuleRef>,
    auxiliary_provider: Option<Arc<dyn AuxiliaryModuleProvider>>,
    misses: u64,
    created: u64,
}

/// Snapshot of the cache's size and miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub native_modules: usize,
    pub non_native_modules: usize,
    pub retired_modules: usize,
    /// Lookups that found no module anywhere
    pub misses: u64,
    /// Native modules created by the enumerator or auxiliary provider
    pub created: u64,
}

impl ModuleCache<ProcMapsEnumerator> {
    /// Cache for the current process, backed by `/proc/self/maps`
    #[must_use]
    pub fn new() -> Self {
        Self::with_enumerator(ProcMapsEnumerator::current_process())
    }
}

impl Default for ModuleCache<ProcMapsEnumerator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ModuleEnumerator> ModuleCache<E> {
    pub fn with_enumerator(enumerator: E) -> Self {
        Self {
            enumerator,
            native: NativeModuleIndex::new(),
            non_native: NonNativeModuleIndex::new(),
            retired: Vec::new(),
            auxiliary_provider: None,
            misses: 0,
            created: 0,
        }
    }

    /// Get the module containing `address`, creating and caching a native
    /// module on a miss.
    ///
    /// Misses are not remembered: a later call for the same address asks the
    /// enumerator and auxiliary provider again.
    pub fn get_module_for_address(&mut self, address: u64) -> Option<ModuleRef> {
        if let Some(module) = self.get_existing_module_for_address(address) {
            return Some(module);
        }

        let created = self.enumerator.create_module_for_address(address).or_else(|| {
            self.auxiliary_provider
                .as_ref()
                .and_then(|provider| provider.try_create_module_for_address(address))
        });

        let Some(module) = created else {
            self.misses += 1;
            debug!("No module found for address 0x{address:x}");
            return None;
        };

        if !module.contains(address) {
            warn!(
                "Discarding module {} ({}): it does not contain address 0x{address:x}",
                module.debug_basename().display(),
                module.range()
            );
            self.misses += 1;
            return None;
        }

        // A different module may have been loaded over a range we still hold
        // for an unloaded one. The stale entry stays authoritative.
        if let Err(violation) = self.native.insert(Arc::clone(&module)) {
            warn!(
                "Discarding module {} for address 0x{address:x}: {violation}",
                module.debug_basename().display()
            );
            self.misses += 1;
            return None;
        }

        self.created += 1;
        debug!(
            "Cached native module {} at {} for address 0x{address:x}",
            module.debug_basename().display(),
            module.range()
        );
        Some(module)
    }

    /// Get the module containing `address` if it is already cached.
    ///
    /// Never calls the enumerator or the auxiliary provider. Intended for
    /// callers that create native modules themselves.
    pub fn get_existing_module_for_address(&self, address: u64) -> Option<ModuleRef> {
        self.non_native
            .find(address)
            .or_else(|| self.native.find(address))
            .map(Arc::clone)
    }

    /// All active modules, native and non-native, in ascending base address
    /// order. Native modules come first on equal base addresses.
    pub fn get_modules(&self) -> Vec<ModuleRef> {
        let mut modules: Vec<ModuleRef> =
            self.native.iter().chain(self.non_native.iter()).map(Arc::clone).collect();
        modules.sort_by_key(|module| module.base_address());
        modules
    }

    /// Retire `defunct` non-native modules and activate `new_modules`.
    ///
    /// Retirement happens first, so a new module may reuse the range of a
    /// module retired in the same call. Retired modules no longer take part in
    /// lookups but remain alive for the lifetime of the cache.
    ///
    /// # Panics
    /// Panics if a `defunct` module is not an active non-native module, or if
    /// a new module overlaps an active non-native module or another new one.
    pub fn update_non_native_modules(&mut self, defunct: &[ModuleRef], new_modules: Vec<ModuleRef>) {
        if let Err(violation) = self.try_update_non_native_modules(defunct, new_modules) {
            panic!("{violation}");
        }
    }

    /// Fallible form of [`update_non_native_modules`](Self::update_non_native_modules).
    ///
    /// The update is all or nothing: on error, no module has been retired or
    /// added.
    ///
    /// # Errors
    /// [`ContractViolation::StaleDefunctModule`] or
    /// [`ContractViolation::Overlap`].
    pub fn try_update_non_native_modules(
        &mut self,
        defunct: &[ModuleRef],
        new_modules: Vec<ModuleRef>,
    ) -> Result<(), ContractViolation> {
        let mut next = self.non_native.clone();
        let mut retiring: Vec<ModuleRef> = Vec::with_capacity(defunct.len());

        for module in defunct {
            if retiring.iter().any(|retired| same_module(retired, module)) {
                continue;
            }
            let removed = next
                .remove(module)
                .ok_or_else(|| ContractViolation::StaleDefunctModule(module.range()))?;
            retiring.push(removed);
        }

        let added = new_modules.len();
        for module in new_modules {
            next.insert(module)?;
        }

        info!(
            "Updated non-native modules: {} retired, {added} added, {} active",
            retiring.len(),
            next.len()
        );
        self.non_native = next;
        self.retired.append(&mut retiring);
        Ok(())
    }

    /// Add a native module the enumerator would not find on its own.
    ///
    /// # Panics
    /// Panics if the module overlaps an active native module.
    pub fn add_custom_native_module(&mut self, module: ModuleRef) {
        if let Err(violation) = self.try_add_custom_native_module(module) {
            panic!("{violation}");
        }
    }

    /// Fallible form of [`add_custom_native_module`](Self::add_custom_native_module).
    ///
    /// # Errors
    /// [`ContractViolation::Overlap`] if the module overlaps an active native
    /// module.
    pub fn try_add_custom_native_module(&mut self, module: ModuleRef) -> Result<(), ContractViolation> {
        let range = module.range();
        self.native.insert(module)?;
        debug!("Added custom native module at {range}");
        Ok(())
    }

    /// Register the fallback used when the enumerator finds no module.
    ///
    /// # Panics
    /// Panics if a provider is already registered.
    pub fn register_auxiliary_module_provider(&mut self, provider: Arc<dyn AuxiliaryModuleProvider>) {
        assert!(
            self.auxiliary_provider.is_none(),
            "{}",
            ContractViolation::ProviderAlreadyRegistered
        );
        self.auxiliary_provider = Some(provider);
    }

    /// Unregister the provider passed to
    /// [`register_auxiliary_module_provider`](Self::register_auxiliary_module_provider).
    ///
    /// # Panics
    /// Panics if no provider is registered, or if `provider` is not the
    /// registered one.
    pub fn unregister_auxiliary_module_provider(&mut self, provider: &Arc<dyn AuxiliaryModuleProvider>) {
        let Some(registered) = &self.auxiliary_provider else {
            panic!("{}", ContractViolation::ProviderNotRegistered);
        };
        assert!(same_provider(registered, provider), "{}", ContractViolation::ProviderMismatch);
        self.auxiliary_provider = None;
    }

    #[must_use]
    pub fn has_auxiliary_module_provider(&self) -> bool {
        self.auxiliary_provider.is_some()
    }

    /// Active non-native modules colliding with `range`.
    ///
    /// Handy for building the `defunct` list when new code replaces old code
    /// at the same addresses.
    pub fn non_native_modules_overlapping(&self, range: MemoryRange) -> Vec<ModuleRef> {
        self.non_native.find_overlapping(range)
    }

    /// Non-native modules retired so far, in retirement order
    pub fn retired_modules(&self) -> &[ModuleRef] {
        &self.retired
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            native_modules: self.native.len(),
            non_native_modules: self.non_native.len(),
            retired_modules: self.retired.len(),
            misses: self.misses,
            created: self.created,
        }
    }
}

fn same_provider(a: &Arc<dyn AuxiliaryModuleProvider>, b: &Arc<dyn AuxiliaryModuleProvider>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoModules;
    use crate::module::{Module, NativeModule, NonNativeModule};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn native(base: u64, size: u64) -> ModuleRef {
        Arc::new(NativeModule::new(base, size, "native.so"))
    }

    fn non_native(base: u64, size: u64) -> ModuleRef {
        Arc::new(NonNativeModule::new(base, size).with_name("jit"))
    }

    /// Provider that hands out a fixed module and counts its invocations
    struct CountingProvider {
        module: Option<ModuleRef>,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new(module: Option<ModuleRef>) -> Arc<Self> {
            Arc::new(Self { module, calls: AtomicUsize::new(0) })
        }
    }

    impl AuxiliaryModuleProvider for CountingProvider {
        fn try_create_module_for_address(&self, address: u64) -> Option<ModuleRef> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.module.clone().filter(|module| module.contains(address))
        }
    }

    #[test]
    fn test_custom_native_module_lookup() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let module = native(0x1000, 0x1000);
        cache.add_custom_native_module(Arc::clone(&module));

        let found = cache.get_module_for_address(0x1500).unwrap();
        assert!(same_module(&found, &module));
        assert!(cache.get_module_for_address(0x3000).is_none());
    }

    #[test]
    fn test_non_native_takes_precedence_over_enclosing_native() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let outer = native(0x1000, 0x10000);
        let inner = non_native(0x4000, 0x100);
        cache.add_custom_native_module(Arc::clone(&outer));
        cache.update_non_native_modules(&[], vec![Arc::clone(&inner)]);

        for address in [0x4000, 0x4080, 0x40ff] {
            let found = cache.get_module_for_address(address).unwrap();
            assert!(same_module(&found, &inner));
        }
        assert!(same_module(&cache.get_module_for_address(0x4100).unwrap(), &outer));
        assert!(same_module(&cache.get_module_for_address(0x3fff).unwrap(), &outer));
    }

    #[test]
    fn test_retired_module_stays_valid() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        cache.update_non_native_modules(&[], vec![non_native(0x2000, 0x100)]);

        let retained = cache.get_module_for_address(0x2050).unwrap();
        cache.update_non_native_modules(&[Arc::clone(&retained)], vec![]);

        assert!(cache.get_existing_module_for_address(0x2050).is_none());
        assert!(!retained.is_native());
        assert_eq!(retained.base_address(), 0x2000);
        assert_eq!(cache.retired_modules().len(), 1);
        assert!(same_module(&cache.retired_modules()[0], &retained));
    }

    #[test]
    fn test_retire_and_reuse_range_in_one_update() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let old = non_native(0x2000, 0x100);
        let new = non_native(0x2000, 0x100);
        cache.update_non_native_modules(&[], vec![Arc::clone(&old)]);

        cache.update_non_native_modules(&[Arc::clone(&old)], vec![Arc::clone(&new)]);

        let found = cache.get_existing_module_for_address(0x2000).unwrap();
        assert!(same_module(&found, &new));
        assert_eq!(cache.stats().non_native_modules, 1);
        assert_eq!(cache.stats().retired_modules, 1);
    }

    #[test]
    fn test_duplicate_defunct_entries_retire_once() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let module = non_native(0x2000, 0x100);
        cache.update_non_native_modules(&[], vec![Arc::clone(&module)]);

        cache.update_non_native_modules(&[Arc::clone(&module), Arc::clone(&module)], vec![]);

        assert_eq!(cache.retired_modules().len(), 1);
    }

    #[test]
    #[should_panic(expected = "is not an active non-native module")]
    fn test_stale_defunct_module_panics() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let module = non_native(0x2000, 0x100);
        cache.update_non_native_modules(&[], vec![Arc::clone(&module)]);
        cache.update_non_native_modules(&[Arc::clone(&module)], vec![]);

        cache.update_non_native_modules(&[module], vec![]);
    }

    #[test]
    fn test_failed_update_changes_nothing() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let first = non_native(0x1000, 0x100);
        let second = non_native(0x2000, 0x100);
        cache.update_non_native_modules(&[], vec![Arc::clone(&first), Arc::clone(&second)]);

        // Retiring `first` is valid, but the new module collides with `second`.
        let result = cache.try_update_non_native_modules(
            &[Arc::clone(&first)],
            vec![non_native(0x1000, 0x100), non_native(0x2080, 0x10)],
        );

        assert!(matches!(result, Err(ContractViolation::Overlap { .. })));
        assert!(same_module(&cache.get_existing_module_for_address(0x1000).unwrap(), &first));
        assert!(cache.retired_modules().is_empty());
        assert_eq!(cache.stats().non_native_modules, 2);
    }

    #[test]
    fn test_new_non_native_modules_may_not_overlap_each_other() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let result = cache
            .try_update_non_native_modules(&[], vec![non_native(0x1000, 0x100), non_native(0x10f0, 0x100)]);

        assert!(result.is_err());
        assert!(cache.get_modules().is_empty());
    }

    #[test]
    #[should_panic(expected = "overlaps existing module")]
    fn test_overlapping_custom_native_module_panics() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        cache.add_custom_native_module(native(0x1000, 0x1000));
        cache.add_custom_native_module(native(0x1fff, 0x10));
    }

    #[test]
    fn test_enumerator_result_is_cached() {
        let calls = AtomicUsize::new(0);
        let enumerator = |address: u64| -> Option<ModuleRef> {
            calls.fetch_add(1, Ordering::SeqCst);
            (0x10_000..0x20_000).contains(&address).then(|| native(0x10_000, 0x10_000))
        };
        let mut cache = ModuleCache::with_enumerator(enumerator);

        let first = cache.get_module_for_address(0x10_010).unwrap();
        let second = cache.get_module_for_address(0x1f_fff).unwrap();

        assert!(same_module(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().created, 1);
    }

    #[test]
    fn test_misses_are_not_cached() {
        let calls = AtomicUsize::new(0);
        let enumerator = |_address: u64| -> Option<ModuleRef> {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        };
        let mut cache = ModuleCache::with_enumerator(enumerator);

        for _ in 0..3 {
            assert!(cache.get_module_for_address(0x5000).is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.get_modules().is_empty());
        assert_eq!(cache.stats().misses, 3);
    }

    #[test]
    fn test_existing_lookup_never_creates() {
        let cache = ModuleCache::with_enumerator(|address: u64| -> Option<ModuleRef> {
            Some(native(address, 0x10))
        });

        assert!(cache.get_existing_module_for_address(0x5000).is_none());
        assert!(cache.get_modules().is_empty());
    }

    #[test]
    fn test_auxiliary_provider_is_fallback() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let provided = native(0x8000, 0x1000);
        let provider = CountingProvider::new(Some(Arc::clone(&provided)));
        let handle: Arc<dyn AuxiliaryModuleProvider> = provider.clone();
        cache.register_auxiliary_module_provider(Arc::clone(&handle));

        let found = cache.get_module_for_address(0x8800).unwrap();
        assert!(same_module(&found, &provided));
        // Served from the native index from now on.
        assert!(same_module(&cache.get_module_for_address(0x8000).unwrap(), &provided));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().native_modules, 1);

        cache.unregister_auxiliary_module_provider(&handle);
        assert!(!cache.has_auxiliary_module_provider());
    }

    #[test]
    fn test_provider_not_consulted_when_enumerator_succeeds() {
        let mut cache = ModuleCache::with_enumerator(|address: u64| -> Option<ModuleRef> {
            Some(native(address & !0xfff, 0x1000))
        });
        let provider = CountingProvider::new(None);
        cache.register_auxiliary_module_provider(provider.clone());

        assert!(cache.get_module_for_address(0x3456).is_some());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_second_provider_registration_panics() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        cache.register_auxiliary_module_provider(CountingProvider::new(None));
        cache.register_auxiliary_module_provider(CountingProvider::new(None));
    }

    #[test]
    fn test_provider_can_be_replaced_after_unregistering() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let first: Arc<dyn AuxiliaryModuleProvider> = CountingProvider::new(None);
        let second: Arc<dyn AuxiliaryModuleProvider> = CountingProvider::new(None);

        cache.register_auxiliary_module_provider(Arc::clone(&first));
        cache.unregister_auxiliary_module_provider(&first);
        cache.register_auxiliary_module_provider(Arc::clone(&second));

        assert!(cache.has_auxiliary_module_provider());
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_unregistering_other_provider_panics() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let registered: Arc<dyn AuxiliaryModuleProvider> = CountingProvider::new(None);
        let other: Arc<dyn AuxiliaryModuleProvider> = CountingProvider::new(None);
        cache.register_auxiliary_module_provider(registered);

        cache.unregister_auxiliary_module_provider(&other);
    }

    #[test]
    #[should_panic(expected = "No auxiliary module provider is registered")]
    fn test_unregistering_without_provider_panics() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let provider: Arc<dyn AuxiliaryModuleProvider> = CountingProvider::new(None);

        cache.unregister_auxiliary_module_provider(&provider);
    }

    #[test]
    fn test_overlapping_enumerator_result_is_discarded() {
        // Simulates a module unloaded and replaced by a larger one at an
        // overlapping address between two lookups.
        let mut cache = ModuleCache::with_enumerator(|address: u64| -> Option<ModuleRef> {
            if address < 0x2000 {
                Some(native(0x1000, 0x1000))
            } else {
                Some(native(0x1800, 0x2000))
            }
        });

        let original = cache.get_module_for_address(0x1100).unwrap();
        assert!(cache.get_module_for_address(0x2800).is_none());

        assert_eq!(cache.get_modules().len(), 1);
        assert!(same_module(&cache.get_module_for_address(0x1fff).unwrap(), &original));
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().created, 1);
    }

    #[test]
    fn test_enumerator_result_not_containing_address_is_discarded() {
        let mut cache = ModuleCache::with_enumerator(|_address: u64| -> Option<ModuleRef> {
            Some(native(0x1000, 0x10))
        });

        assert!(cache.get_module_for_address(0x9000).is_none());
        assert!(cache.get_modules().is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_get_modules_orders_by_base_and_excludes_retired() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        let gone = non_native(0x500, 0x10);
        cache.add_custom_native_module(native(0x3000, 0x1000));
        cache.add_custom_native_module(native(0x1000, 0x1000));
        cache.update_non_native_modules(
            &[],
            vec![non_native(0x3000, 0x10), non_native(0x2000, 0x10), Arc::clone(&gone)],
        );
        cache.update_non_native_modules(&[gone], vec![]);

        let layout: Vec<(u64, bool)> =
            cache.get_modules().iter().map(|m| (m.base_address(), m.is_native())).collect();
        assert_eq!(
            layout,
            vec![(0x1000, true), (0x2000, false), (0x3000, true), (0x3000, false)]
        );
    }

    #[test]
    fn test_handles_survive_heavy_churn() {
        let mut cache = ModuleCache::with_enumerator(NoModules);
        cache.update_non_native_modules(&[], vec![non_native(0x1000, 0x100)]);
        let first = cache.get_existing_module_for_address(0x1000).unwrap();

        let mut current = Arc::clone(&first);
        for generation in 1..=50u64 {
            let replacement = non_native(0x1000, 0x100 + generation);
            cache.update_non_native_modules(&[current], vec![Arc::clone(&replacement)]);
            cache.add_custom_native_module(native(0x10_0000 * generation, 0x1000));
            current = replacement;
        }

        assert_eq!(first.base_address(), 0x1000);
        assert_eq!(first.size(), 0x100);
        assert_eq!(cache.retired_modules().len(), 50);
        assert_eq!(cache.get_existing_module_for_address(0x1000).unwrap().size(), 0x100 + 50);
    }
}
