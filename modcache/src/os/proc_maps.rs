use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::build_id::read_build_id;
use super::memory_maps::{find_image, read_maps};
use crate::cache::ModuleEnumerator;
use crate::module::{ModuleRef, NativeModule};

/// Module enumerator backed by a `/proc/<pid>/maps` file.
///
/// The maps file is re-read on every call, so modules loaded after the
/// enumerator was created are found too.
#[derive(Debug, Clone)]
pub struct ProcMapsEnumerator {
    maps_path: PathBuf,
    read_build_ids: bool,
}

impl ProcMapsEnumerator {
    #[must_use]
    pub fn current_process() -> Self {
        Self::from_maps_file("/proc/self/maps")
    }

    #[must_use]
    pub fn for_pid(pid: i32) -> Self {
        Self::from_maps_file(format!("/proc/{pid}/maps"))
    }

    /// Enumerate modules from any file in maps format, e.g. a saved copy
    pub fn from_maps_file(path: impl Into<PathBuf>) -> Self {
        Self { maps_path: path.into(), read_build_ids: true }
    }

    /// Whether to open each binary to read its build id (on by default)
    #[must_use]
    pub fn with_build_ids(mut self, enabled: bool) -> Self {
        self.read_build_ids = enabled;
        self
    }

    #[must_use]
    pub fn maps_path(&self) -> &Path {
        &self.maps_path
    }
}

impl ModuleEnumerator for ProcMapsEnumerator {
    fn create_module_for_address(&self, address: u64) -> Option<ModuleRef> {
        let entries = match read_maps(&self.maps_path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("{e}");
                return None;
            }
        };

        let (range, path) = find_image(&entries, address)?;
        let path = PathBuf::from(path);
        let id = if self.read_build_ids { read_build_id(&path).unwrap_or_default() } else { Vec::new() };

        debug!("Found {} at {range} ({} byte build id)", path.display(), id.len());
        Some(Arc::new(NativeModule::from_file(range, path, id)))
    }
}
