//! Find a process by name.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A running process
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: i32,
    pub exe_path: PathBuf,
    pub command: String,
}

/// Find the single process matching `name`.
///
/// Exact matches on the command name (from `/proc/<pid>/stat`) or the
/// executable basename win over substring matches. Our own process is never
/// a candidate.
///
/// # Errors
/// - No process matches
/// - Several processes match equally well
pub fn find_process_by_name(name: &str) -> Result<ProcessInfo> {
    let own_pid = i32::try_from(std::process::id()).unwrap_or(-1);
    let candidates: Vec<ProcessInfo> =
        list_processes()?.into_iter().filter(|p| p.pid != own_pid).collect();
    select_process(candidates, name)
}

/// Every process whose executable we are allowed to see
fn list_processes() -> Result<Vec<ProcessInfo>> {
    let proc_dir = fs::read_dir("/proc").context("Failed to read /proc")?;

    Ok(proc_dir
        .flatten()
        .filter_map(|entry| entry.file_name().to_str()?.parse::<i32>().ok())
        .filter_map(|pid| {
            // Kernel threads and processes of other users have no readable exe
            let exe_path = fs::read_link(format!("/proc/{pid}/exe")).ok()?;
            let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
            let command = extract_comm(&stat)?.to_string();
            Some(ProcessInfo { pid, exe_path, command })
        })
        .collect())
}

fn select_process(candidates: Vec<ProcessInfo>, name: &str) -> Result<ProcessInfo> {
    let wanted = Path::new(name).file_name().and_then(|n| n.to_str()).unwrap_or(name);

    let graded: Vec<(Match, ProcessInfo)> = candidates
        .into_iter()
        .filter_map(|p| Some((match_quality(&p, wanted)?, p)))
        .collect();
    let best = if graded.iter().any(|(quality, _)| *quality == Match::Exact) {
        Match::Exact
    } else {
        Match::Partial
    };
    let mut matches: Vec<ProcessInfo> =
        graded.into_iter().filter(|(quality, _)| *quality == best).map(|(_, p)| p).collect();

    match matches.len() {
        0 => bail!(
            "No process matching '{name}' found.\n\
             Check running processes with: ps aux | grep {name}"
        ),
        1 => Ok(matches.remove(0)),
        _ => {
            let list: Vec<String> =
                matches.iter().map(|m| format!("  {} ({})", m.pid, m.command)).collect();
            bail!(
                "Multiple processes match '{name}':\n{}\n\n\
                 Specify the PID explicitly: modcache --pid <PID>",
                list.join("\n")
            )
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Match {
    Exact,
    Partial,
}

fn match_quality(process: &ProcessInfo, wanted: &str) -> Option<Match> {
    let exe_basename = process.exe_path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if process.command == wanted || exe_basename == wanted {
        Some(Match::Exact)
    } else if process.command.contains(wanted) || exe_basename.contains(wanted) {
        Some(Match::Partial)
    } else {
        None
    }
}

/// Extract the command name from a `/proc/<pid>/stat` line.
/// Format: "pid (comm) state ..."; comm may itself contain parentheses.
fn extract_comm(stat_line: &str) -> Option<&str> {
    let open = stat_line.find('(')?;
    let close = stat_line.rfind(')')?;
    (open < close).then(|| &stat_line[open + 1..close])
}
