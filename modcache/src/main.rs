//! # modcache - Main Entry Point
//!
//! Resolves addresses of a running process (or of modcache itself) to the
//! modules that own them, optionally loading JIT regions from a perf map and
//! symbolizing native frames.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::io::Write;
use std::path::Path;

use modcache::cache::ModuleCache;
use modcache::cli::Args;
use modcache::jit::PerfMapLoader;
use modcache::os::{read_maps, ProcMapsEnumerator};
use modcache::preflight::{check_perf_map, check_target};
use modcache::process_lookup::find_process_by_name;
use modcache::report::{AddressReport, ModuleReport, Report};
use modcache::symbolization::ModuleSymbolizer;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires ptrace") {
        EXIT_NOPERM
    } else if msg.contains("nothing to do") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// Resolve the target PID: explicit `--pid`, `--process` lookup, or ourselves
fn resolve_pid(args: &Args) -> Result<i32> {
    if let Some(pid) = args.pid {
        return Ok(pid);
    }
    if let Some(ref name) = args.process {
        let process = find_process_by_name(name)?;
        info!("Found {} as PID {} ({})", name, process.pid, process.exe_path.display());
        return Ok(process.pid);
    }
    i32::try_from(std::process::id()).context("PID out of range")
}

/// Look up every executable file mapping so `--list` shows the whole process
fn prime_cache(cache: &mut ModuleCache, pid: i32) -> Result<()> {
    let entries = read_maps(Path::new(&format!("/proc/{pid}/maps")))?;
    for entry in entries.iter().filter(|e| e.is_file_backed() && e.is_executable()) {
        cache.get_module_for_address(entry.range.start);
    }
    Ok(())
}

fn run() -> Result<()> {
    let args = Args::parse();

    if args.addresses.is_empty() && !args.list {
        anyhow::bail!(
            "Nothing to do: give at least one ADDRESS or --list\n\n\
             Run 'modcache --help' for usage"
        );
    }

    let pid = resolve_pid(&args)?;
    check_target(pid)?;

    let enumerator = ProcMapsEnumerator::for_pid(pid).with_build_ids(!args.no_build_id);
    let mut cache = ModuleCache::with_enumerator(enumerator);

    if let Some(ref path) = args.perf_map {
        check_perf_map(path, args.quiet);
        let mut loader = PerfMapLoader::new(path);
        let regions = loader
            .load_new_entries(&mut cache)
            .with_context(|| format!("Failed to load perf map {}", path.display()))?;
        if !args.quiet && !args.json {
            println!("loaded {regions} JIT regions from {}", path.display());
        }
    }

    if args.list {
        prime_cache(&mut cache, pid)?;
    }

    let mut symbolizer = args.symbolize.then(ModuleSymbolizer::new);
    let addresses: Vec<AddressReport> = args
        .addresses
        .iter()
        .map(|&address| {
            let module = cache.get_module_for_address(address);
            let symbol = match (symbolizer.as_mut(), module.as_deref()) {
                (Some(symbolizer), Some(module)) => symbolizer.symbolize(module, address),
                _ => None,
            };
            AddressReport::new(address, module.as_deref(), symbol)
        })
        .collect();

    let modules: Vec<ModuleReport> = if args.list || args.json {
        cache.get_modules().iter().map(|module| ModuleReport::from_module(module.as_ref())).collect()
    } else {
        Vec::new()
    };

    let stats = cache.stats();
    info!(
        "{} native, {} non-native, {} retired modules; {} misses",
        stats.native_modules, stats.non_native_modules, stats.retired_modules, stats.misses
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if args.json {
        let report = Report { pid, addresses, modules };
        serde_json::to_writer_pretty(&mut out, &report).context("Failed to write JSON report")?;
        writeln!(out)?;
        return Ok(());
    }

    for address in &addresses {
        writeln!(out, "{}", address.format())?;
    }

    if args.list {
        if !addresses.is_empty() {
            writeln!(out)?;
        }
        if !args.quiet {
            writeln!(out, "modules of pid {pid}:")?;
        }
        for module in &modules {
            writeln!(out, "{}", module.format_row())?;
        }
    }

    Ok(())
}
