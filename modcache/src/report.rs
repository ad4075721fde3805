//! Address and module reports for the command line tool
//!
//! The same structures back the text output and the `--json` document.

#![allow(clippy::format_push_string)]

use serde::Serialize;

use crate::module::Module;
use crate::os::{hex_id, symbol_server_id};
use crate::symbolization::ResolvedFrame;

/// One active module
#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub base: String,
    pub end: String,
    pub size: u64,
    pub debug_basename: String,
    pub native: bool,
    pub build_id: String,
    /// Breakpad form of the build id, for native modules that have one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ModuleReport {
    #[must_use]
    pub fn from_module(module: &dyn Module) -> Self {
        let range = module.range();
        let id = module.id();
        Self {
            base: format!("0x{:x}", range.start),
            end: format!("0x{:x}", range.end),
            size: module.size(),
            debug_basename: module.debug_basename().display().to_string(),
            native: module.is_native(),
            build_id: hex_id(id),
            symbol_server_id: (module.is_native() && !id.is_empty()).then(|| symbol_server_id(id)),
            path: module.file_path().map(|p| p.display().to_string()),
        }
    }

    /// One row of the module table
    #[must_use]
    pub fn format_row(&self) -> String {
        format!(
            "{:>18}-{:<18} {:<6} {:<32} {}",
            self.base,
            self.end,
            kind(self.native),
            self.debug_basename,
            if self.build_id.is_empty() { "-" } else { self.build_id.as_str() }
        )
    }
}

/// Resolution of one sampled address
#[derive(Debug, Clone, Serialize)]
pub struct AddressReport {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<bool>,
    /// Hex build id of the owning module, empty if it has none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<ResolvedFrame>,
}

impl AddressReport {
    #[must_use]
    pub fn new(address: u64, module: Option<&dyn Module>, symbol: Option<ResolvedFrame>) -> Self {
        Self {
            address: format!("0x{address:x}"),
            module: module.map(|m| m.debug_basename().display().to_string()),
            offset: module.map(|m| address.saturating_sub(m.base_address())),
            native: module.map(|m| m.is_native()),
            build_id: module.map(|m| hex_id(m.id())),
            symbol,
        }
    }

    /// Human readable form, one line plus one line per symbolized frame
    #[must_use]
    pub fn format(&self) -> String {
        let mut output = format!("{:<18}", self.address);

        match (&self.module, self.offset, self.native) {
            (Some(module), Some(offset), Some(native)) => {
                let build_id = self.build_id.as_deref().filter(|id| !id.is_empty()).unwrap_or("-");
                output.push_str(&format!(" {module}+0x{offset:x} [{}] {build_id}", kind(native)));
            }
            _ => output.push_str(" <unknown>"),
        }

        if let Some(ref symbol) = self.symbol {
            for frame in &symbol.frames {
                output.push_str(&format!("\n    {}", frame.function));
                if let Some(ref loc) = frame.location {
                    output.push_str(&format!("\n        at {loc}"));
                }
            }
        }

        output
    }
}

/// Full `--json` document
#[derive(Debug, Serialize)]
pub struct Report {
    pub pid: i32,
    pub addresses: Vec<AddressReport>,
    pub modules: Vec<ModuleReport>,
}

fn kind(native: bool) -> &'static str {
    if native {
        "native"
    } else {
        "jit"
    }
}
