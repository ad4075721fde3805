use log::warn;
use std::collections::HashMap;
use std::path::PathBuf;

use super::symbolizer::{ResolvedFrame, Symbolizer};
use crate::module::Module;

/// Symbolizes addresses against the native modules that contain them.
///
/// Keeps one [`Symbolizer`] per module file. Files that fail to load are
/// remembered, so they are not parsed again for every frame.
#[derive(Default)]
pub struct ModuleSymbolizer {
    symbolizers: HashMap<PathBuf, Option<Symbolizer>>,
}

impl ModuleSymbolizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `address` within `module`.
    ///
    /// Returns `None` for non-native modules, modules without a backing
    /// file, and addresses outside the module.
    pub fn symbolize(&mut self, module: &dyn Module, address: u64) -> Option<ResolvedFrame> {
        if !module.is_native() || !module.contains(address) {
            return None;
        }
        let path = module.file_path()?;

        let symbolizer = self
            .symbolizers
            .entry(path.to_path_buf())
            .or_insert_with(|| match Symbolizer::new(path) {
                Ok(symbolizer) => Some(symbolizer),
                Err(e) => {
                    warn!("Cannot symbolize {}: {e:#}", path.display());
                    None
                }
            })
            .as_ref()?;

        Some(symbolizer.resolve(address - module.base_address()))
    }
}
