//! Perf JIT map files
//!
//! One region per line, start address and size in hex, then the symbol name:
//!
//! ```text
//! 7f2ba4401000 1a0 LazyCompile:~main /srv/app.js:1
//! ```
//!
//! Runtimes only ever append to the file. When code is regenerated at an
//! address that already holds code, the newer line wins.

use log::{debug, info};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{ModuleCache, ModuleEnumerator};
use crate::domain::{ContractViolation, PerfMapError};
use crate::module::{ModuleRef, NonNativeModule};

/// One code region from a perf map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfMapEntry {
    pub start: u64,
    pub size: u64,
    pub name: String,
}

impl PerfMapEntry {
    /// Parse one perf map line; `None` if it is malformed
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim().splitn(3, char::is_whitespace);
        let start = parse_hex(fields.next()?)?;
        let size = parse_hex(fields.next()?)?;
        let name = fields.next().unwrap_or_default().trim().to_string();
        Some(Self { start, size, name })
    }
}

fn parse_hex(field: &str) -> Option<u64> {
    let digits = field.strip_prefix("0x").unwrap_or(field);
    u64::from_str_radix(digits, 16).ok()
}

/// Parse a whole perf map, skipping blank lines
///
/// # Errors
/// Returns [`PerfMapError::MalformedLine`] for the first line that does not
/// parse.
pub fn parse_perf_map(text: &str) -> Result<Vec<PerfMapEntry>, PerfMapError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            PerfMapEntry::parse(line).ok_or_else(|| PerfMapError::MalformedLine {
                line_number: idx + 1,
                line: line.to_string(),
            })
        })
        .collect()
}

/// Activate `entry` as a non-native module, retiring the active regions it
/// overwrites.
///
/// Returns `false` for empty regions, which are skipped.
///
/// # Errors
/// Only if the cache state is inconsistent; the overlapping regions are
/// retired in the same update that installs the new one.
pub fn install_entry<E: ModuleEnumerator>(
    cache: &mut ModuleCache<E>,
    entry: &PerfMapEntry,
) -> Result<bool, ContractViolation> {
    if entry.size == 0 {
        return Ok(false);
    }

    let module: ModuleRef =
        Arc::new(NonNativeModule::new(entry.start, entry.size).with_name(entry.name.as_str()));
    let defunct = cache.non_native_modules_overlapping(module.range());
    if !defunct.is_empty() {
        debug!("{} replaces {} region(s) at {}", entry.name, defunct.len(), module.range());
    }
    cache.try_update_non_native_modules(&defunct, vec![module])?;
    Ok(true)
}

/// Incremental reader of a perf map file.
///
/// Remembers how far the file has been consumed, so polling it while the
/// target keeps compiling only processes new lines. A trailing line without
/// its newline is left for the next call.
#[derive(Debug)]
pub struct PerfMapLoader {
    path: PathBuf,
    consumed: u64,
    lines_read: usize,
}

impl PerfMapLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), consumed: 0, lines_read: 0 }
    }

    /// Loader for the conventional `/tmp/perf-<pid>.map`
    #[must_use]
    pub fn for_pid(pid: i32) -> Self {
        Self::new(format!("/tmp/perf-{pid}.map"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Install every complete line appended since the previous call.
    ///
    /// Returns the number of regions installed.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a line is malformed.
    /// Lines before the malformed one stay installed, and the next call
    /// resumes after it.
    pub fn load_new_entries<E: ModuleEnumerator>(
        &mut self,
        cache: &mut ModuleCache<E>,
    ) -> Result<usize, PerfMapError> {
        let read_error = |source| PerfMapError::Read { path: self.path.clone(), source };

        let mut file = File::open(&self.path).map_err(read_error)?;
        file.seek(SeekFrom::Start(self.consumed)).map_err(read_error)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(read_error)?;

        let complete = data.iter().rposition(|&b| b == b'\n').map_or(0, |idx| idx + 1);
        let mut installed = 0;

        for raw in data[..complete].split_inclusive(|&b| b == b'\n') {
            self.consumed += raw.len() as u64;
            self.lines_read += 1;

            // Symbol names come from the runtime and need not be UTF-8.
            let text = String::from_utf8_lossy(raw);
            let line = text.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            let entry = PerfMapEntry::parse(line).ok_or_else(|| PerfMapError::MalformedLine {
                line_number: self.lines_read,
                line: line.to_string(),
            })?;
            if install_entry(cache, &entry)? {
                installed += 1;
            }
        }

        info!("Loaded {installed} JIT regions from {}", self.path.display());
        Ok(installed)
    }
}
