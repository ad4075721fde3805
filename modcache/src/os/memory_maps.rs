//! Parsing of `/proc/<pid>/maps`
//!
//! Each line describes one mapping:
//!
//! ```text
//! 55f3a2b4c000-55f3a2b4d000 r--p 00000000 fd:01 1835021    /usr/bin/my-app
//! start        end          perms offset  dev   inode      pathname
//! ```
//!
//! The pathname is padded with spaces and may itself contain spaces, so it is
//! taken as the remainder of the line.

use log::debug;
use std::fs;
use std::path::Path;

use crate::domain::MapsError;
use crate::module::MemoryRange;

/// One line of a maps file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapsEntry {
    pub range: MemoryRange,
    pub perms: String,
    pub offset: u64,
    pub inode: u64,
    pub pathname: Option<String>,
}

/// Appended by the kernel when the mapped file has been unlinked
const DELETED_SUFFIX: &str = " (deleted)";

impl MapsEntry {
    /// Parse a single maps line
    ///
    /// # Errors
    /// Returns [`MapsError::MalformedLine`] if a mandatory field is missing or
    /// not a number.
    pub fn parse(line: &str) -> Result<Self, MapsError> {
        let malformed = |reason| MapsError::MalformedLine { line: line.to_string(), reason };

        let mut fields = line.splitn(6, ' ');
        let range = fields.next().filter(|f| !f.is_empty()).ok_or_else(|| malformed("missing range"))?;
        let perms = fields.next().ok_or_else(|| malformed("missing permissions"))?;
        let offset = fields.next().ok_or_else(|| malformed("missing offset"))?;
        let _dev = fields.next().ok_or_else(|| malformed("missing device"))?;
        let inode = fields.next().ok_or_else(|| malformed("missing inode"))?;
        let pathname = fields
            .next()
            .map(|p| p.trim().trim_end_matches(DELETED_SUFFIX))
            .filter(|p| !p.is_empty());

        let (start, end) = range.split_once('-').ok_or_else(|| malformed("range without '-'"))?;
        let start = u64::from_str_radix(start, 16).map_err(|_| malformed("bad range start"))?;
        let end = u64::from_str_radix(end, 16).map_err(|_| malformed("bad range end"))?;
        if end < start {
            return Err(malformed("range end below start"));
        }

        Ok(Self {
            range: MemoryRange { start, end },
            perms: perms.to_string(),
            offset: u64::from_str_radix(offset, 16).map_err(|_| malformed("bad offset"))?,
            inode: inode.parse().map_err(|_| malformed("bad inode"))?,
            pathname: pathname.map(str::to_string),
        })
    }

    /// True for mappings of a regular file, as opposed to anonymous memory or
    /// pseudo mappings such as `[heap]` and `[vdso]`
    #[must_use]
    pub fn is_file_backed(&self) -> bool {
        self.inode != 0 && self.pathname.as_deref().is_some_and(|p| p.starts_with('/'))
    }

    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.perms.contains('x')
    }

    fn same_file(&self, other: &MapsEntry) -> bool {
        self.inode == other.inode && self.pathname == other.pathname
    }
}

/// Parse the contents of a maps file.
///
/// Lines that do not parse are skipped.
#[must_use]
pub fn parse_maps(contents: &str) -> Vec<MapsEntry> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match MapsEntry::parse(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping maps line: {e}");
                None
            }
        })
        .collect()
}

/// Read and parse a maps file such as `/proc/self/maps`
///
/// # Errors
/// Returns [`MapsError::Read`] if the file cannot be read.
pub fn read_maps(path: &Path) -> Result<Vec<MapsEntry>, MapsError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| MapsError::Read { path: path.to_path_buf(), source })?;
    Ok(parse_maps(&contents))
}

/// Find the file-backed image containing `address`.
///
/// A loaded binary shows up as a run of consecutive mappings of the same
/// file (one per segment). Returns the range spanning that whole run and the
/// file's path, or `None` if `address` is unmapped or not backed by a file.
#[must_use]
pub fn find_image(entries: &[MapsEntry], address: u64) -> Option<(MemoryRange, &str)> {
    let hit = entries.iter().position(|e| e.range.contains(address))?;
    let entry = &entries[hit];
    if !entry.is_file_backed() {
        return None;
    }

    let first = entries[..hit].iter().rev().take_while(|e| e.same_file(entry)).count();
    let last = entries[hit + 1..].iter().take_while(|e| e.same_file(entry)).count();
    let run = &entries[hit - first..=hit + last];

    let range = MemoryRange {
        start: run.iter().map(|e| e.range.start).min().unwrap_or(entry.range.start),
        end: run.iter().map(|e| e.range.end).max().unwrap_or(entry.range.end),
    };
    Some((range, entry.pathname.as_deref()?))
}
