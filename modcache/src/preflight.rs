//! Pre-flight checks for modcache
//!
//! Fail early, with an actionable message, when the target process cannot be
//! inspected at all.

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Make sure `/proc/<pid>/maps` exists and is readable
///
/// # Errors
/// Returns an error if the process does not exist or its maps are not
/// readable by us.
pub fn check_target(pid: i32) -> Result<()> {
    if !Path::new(&format!("/proc/{pid}")).exists() {
        bail!(
            "Process {pid} not found.\n\n\
             Is the process still running? Check with: ps -p {pid}"
        );
    }

    let maps_path = format!("/proc/{pid}/maps");
    std::fs::File::open(&maps_path).with_context(|| {
        format!(
            "Cannot read {maps_path}\n\n\
             Inspecting another user's process requires ptrace access\n\
             (run as the same user, or with sudo)"
        )
    })?;
    Ok(())
}

/// Warn when a perf map was requested but does not exist yet
pub fn check_perf_map(path: &Path, quiet: bool) {
    if !quiet && !path.exists() {
        eprintln!(
            "warning: {} does not exist; is the runtime started with perf map support?",
            path.display()
        );
    }
}
