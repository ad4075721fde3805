use std::path::{Path, PathBuf};

use super::{MemoryRange, Module};

/// Executable or shared library mapped by the OS loader
#[derive(Debug, Clone)]
pub struct NativeModule {
    base_address: u64,
    size: u64,
    id: Vec<u8>,
    debug_basename: PathBuf,
    path: Option<PathBuf>,
}

impl NativeModule {
    #[must_use]
    pub fn new(base_address: u64, size: u64, debug_basename: impl Into<PathBuf>) -> Self {
        Self { base_address, size, id: Vec::new(), debug_basename: debug_basename.into(), path: None }
    }

    /// Describe a module mapped from `path` over `range`.
    ///
    /// The debug basename is the file name of `path`.
    #[must_use]
    pub fn from_file(range: MemoryRange, path: PathBuf, id: Vec<u8>) -> Self {
        let debug_basename = path.file_name().map(PathBuf::from).unwrap_or_default();
        Self {
            base_address: range.start,
            size: range.len(),
            id,
            debug_basename,
            path: Some(path),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl Module for NativeModule {
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
        true
    }

    fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
