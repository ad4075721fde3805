use std::path::{Path, PathBuf};

use super::Module;

/// Region of generated code, such as a JIT-compiled function or code space
#[derive(Debug, Clone)]
pub struct NonNativeModule {
    base_address: u64,
    size: u64,
    id: Vec<u8>,
    debug_basename: PathBuf,
}

impl NonNativeModule {
    #[must_use]
    pub fn new(base_address: u64, size: u64) -> Self {
        Self { base_address, size, id: Vec::new(), debug_basename: PathBuf::new() }
    }

    /// Name reported as the region's debug basename
    #[must_use]
    pub fn with_name(mut self, name: impl Into<PathBuf>) -> Self {
        self.debug_basename = name.into();
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.id = id.into();
        self
    }
}

impl Module for NonNativeModule {
    fn base_address(&self) -> u64 {
        self.base_address
    }

    fn id(&self) -> &[u8] {
        &self.id
    }

    fn debug_basename(&self) -> &Path {
        &self.debug_basename
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_native(&self) -> bool {
        false
    }
}
