use modcache::cache::{AuxiliaryModuleProvider, ModuleCache, NoModules};
use modcache::module::{same_module, MemoryRange, Module, ModuleRef, NativeModule, NonNativeModule};
use std::sync::Arc;

fn native(base: u64, size: u64) -> ModuleRef {
    Arc::new(NativeModule::new(base, size, "libtest.so"))
}

fn jit(base: u64, size: u64) -> ModuleRef {
    Arc::new(NonNativeModule::new(base, size).with_name("jit-code"))
}

/// Small deterministic generator, enough to shuffle operations around
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

fn assert_disjoint(modules: &[ModuleRef]) {
    for (i, a) in modules.iter().enumerate() {
        for b in &modules[i + 1..] {
            assert!(
                !a.range().overlaps(&b.range()),
                "{} overlaps {}",
                a.range(),
                b.range()
            );
        }
    }
}

#[test]
fn test_custom_native_module_scenario() {
    let mut cache = ModuleCache::with_enumerator(NoModules);
    let m1 = native(0x1000, 0x1000);
    cache.add_custom_native_module(Arc::clone(&m1));

    assert!(same_module(&cache.get_module_for_address(0x1500).unwrap(), &m1));
    assert!(cache.get_module_for_address(0x3000).is_none());
}

#[test]
fn test_non_native_retire_scenario() {
    let mut cache = ModuleCache::with_enumerator(NoModules);
    cache.update_non_native_modules(&[], vec![jit(0x2000, 0x100)]);

    let n1 = cache.get_module_for_address(0x2050).unwrap();
    assert_eq!(n1.base_address(), 0x2000);

    cache.update_non_native_modules(&[Arc::clone(&n1)], vec![]);

    assert!(cache.get_existing_module_for_address(0x2050).is_none());
    assert!(!n1.is_native());
    assert_eq!(n1.range(), MemoryRange { start: 0x2000, end: 0x2100 });
}

#[test]
fn test_provider_slot_scenario() {
    let mut cache = ModuleCache::with_enumerator(NoModules);
    let first: Arc<dyn AuxiliaryModuleProvider> = Arc::new(|_: u64| -> Option<ModuleRef> { None });
    let second: Arc<dyn AuxiliaryModuleProvider> =
        Arc::new(|address: u64| -> Option<ModuleRef> { Some(native(address & !0xffff, 0x10000)) });

    cache.register_auxiliary_module_provider(Arc::clone(&first));
    let double_registration = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cache.register_auxiliary_module_provider(Arc::clone(&second));
    }));
    assert!(double_registration.is_err());

    cache.unregister_auxiliary_module_provider(&first);
    cache.register_auxiliary_module_provider(Arc::clone(&second));

    let module = cache.get_module_for_address(0x12_3456).unwrap();
    assert_eq!(module.base_address(), 0x12_0000);
    assert!(module.is_native());
}

#[test]
fn test_lookup_result_always_contains_address() {
    let mut cache = ModuleCache::with_enumerator(|address: u64| -> Option<ModuleRef> {
        (address % 3 == 0).then(|| native(address & !0xfff, 0x1000))
    });
    cache.update_non_native_modules(&[], vec![jit(0x4_0100, 0x80), jit(0x9_0000, 0x2000)]);

    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
    for _ in 0..2000 {
        let address = rng.below(0x10_0000);
        if let Some(module) = cache.get_module_for_address(address) {
            assert!(module.contains(address), "0x{address:x} not in {}", module.range());
        }
    }
}

#[test]
fn test_random_operations_keep_tiers_disjoint_and_handles_stable() {
    let mut cache = ModuleCache::with_enumerator(NoModules);
    let mut rng = XorShift(0x1234_5678_9abc_def1);
    let mut retained: Vec<(ModuleRef, MemoryRange, bool)> = Vec::new();

    for _ in 0..500 {
        let base = rng.below(0x400) * 0x100;
        let size = (rng.below(16) + 1) * 0x40;

        match rng.below(3) {
            0 => {
                let module = native(base, size);
                if cache.try_add_custom_native_module(Arc::clone(&module)).is_ok() {
                    retained.push((module, MemoryRange::from_base_and_size(base, size), true));
                }
            }
            1 => {
                let module = jit(base, size);
                let defunct = cache.non_native_modules_overlapping(module.range());
                cache.update_non_native_modules(&defunct, vec![Arc::clone(&module)]);
                retained.push((module, MemoryRange::from_base_and_size(base, size), false));
            }
            _ => {
                let active: Vec<ModuleRef> =
                    cache.get_modules().into_iter().filter(|m| !m.is_native()).collect();
                if !active.is_empty() {
                    let victim = Arc::clone(&active[rng.below(active.len() as u64) as usize]);
                    cache.update_non_native_modules(&[victim], vec![]);
                }
            }
        }

        let (natives, jits): (Vec<ModuleRef>, Vec<ModuleRef>) =
            cache.get_modules().into_iter().partition(|m| m.is_native());
        assert_disjoint(&natives);
        assert_disjoint(&jits);
    }

    for (module, range, is_native) in &retained {
        assert_eq!(module.range(), *range);
        assert_eq!(module.is_native(), *is_native);
    }

    let stats = cache.stats();
    let jit_count = retained.iter().filter(|(_, _, is_native)| !is_native).count();
    assert_eq!(stats.non_native_modules + stats.retired_modules, jit_count);
}

#[test]
fn test_non_native_region_embedded_in_native_image() {
    let mut cache = ModuleCache::with_enumerator(|address: u64| -> Option<ModuleRef> {
        (0x10_0000..0x20_0000).contains(&address).then(|| native(0x10_0000, 0x10_0000))
    });
    let builtins = jit(0x15_0000, 0x1000);
    cache.update_non_native_modules(&[], vec![Arc::clone(&builtins)]);

    let outer = cache.get_module_for_address(0x10_0010).unwrap();
    assert!(outer.is_native());
    assert!(same_module(&cache.get_module_for_address(0x15_0800).unwrap(), &builtins));
    assert!(same_module(&cache.get_existing_module_for_address(0x15_1000).unwrap(), &outer));
}
