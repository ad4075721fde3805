use addr2line::Context;
use anyhow::{Context as _, Result};
use gimli::{EndianRcSlice, RunTimeEndian};
use object::{Object, ObjectSection, ObjectSegment};
use rustc_demangle::demangle;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

const UNKNOWN_FUNCTION: &str = "<unknown>";

/// Symbolizer for one binary, resolving module-relative offsets to source
/// locations.
///
/// DWARF is consulted first; binaries without it fall back to the symbol
/// table. Resolutions are cached by offset.
pub struct Symbolizer {
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
    /// Lowest segment address, i.e. the virtual address of module offset 0
    image_base: u64,
    /// Function symbols sorted by address
    symbols: Vec<(u64, String)>,
    cache: RefCell<HashMap<u64, ResolvedFrame>>,
}

impl Symbolizer {
    /// Create a new symbolizer for the given binary
    ///
    /// # Errors
    /// Returns an error if the binary file cannot be read or parsed
    pub fn new<P: AsRef<Path>>(binary_path: P) -> Result<Self> {
        let binary_path = binary_path.as_ref();
        let binary_data = fs::read(binary_path)
            .with_context(|| format!("Failed to read binary file {}", binary_path.display()))?;

        let obj_file = object::File::parse(&*binary_data).context("Failed to parse object file")?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)?;
        let ctx = Context::from_dwarf(dwarf).context("Failed to load DWARF debug information")?;

        // Mappings start on a page boundary, so module offset 0 is the first
        // segment's address rounded down to the page.
        let image_base =
            obj_file.segments().map(|segment| segment.address()).min().unwrap_or(0) & !0xfff;

        let mut symbols: Vec<(u64, String)> = obj_file
            .symbol_map()
            .symbols()
            .iter()
            .map(|symbol| (symbol.address(), symbol.name().to_string()))
            .collect();
        symbols.sort_by_key(|(address, _)| *address);

        Ok(Self { ctx, image_base, symbols, cache: RefCell::new(HashMap::new()) })
    }

    /// Resolve an offset from the module's base address
    pub fn resolve(&self, offset: u64) -> ResolvedFrame {
        if let Some(cached) = self.cache.borrow().get(&offset) {
            return cached.clone();
        }

        let address = self.image_base.wrapping_add(offset);
        let mut frames = self.dwarf_frames(address);
        if frames.is_empty() {
            let function = self
                .symbol_for(address)
                .map_or_else(|| UNKNOWN_FUNCTION.to_string(), Self::demangle_symbol);
            frames.push(InlinedFrame { function, location: None });
        }

        let resolved = ResolvedFrame { offset, frames };
        self.cache.borrow_mut().insert(offset, resolved.clone());
        resolved
    }

    fn dwarf_frames(&self, address: u64) -> Vec<InlinedFrame> {
        let mut result = Vec::new();

        if let Ok(mut frame_iter) = self.ctx.find_frames(address).skip_all_loads() {
            while let Ok(Some(frame)) = frame_iter.next() {
                let Some(function) =
                    frame.function.and_then(|f| f.demangle().ok().map(|s| s.to_string()))
                else {
                    continue;
                };

                let location = frame.location.map(|loc| SourceLocation {
                    file: loc.file.map(std::string::ToString::to_string),
                    line: loc.line,
                    column: loc.column,
                });

                result.push(InlinedFrame { function, location });
            }
        }

        result
    }

    /// Nearest symbol at or below `address`
    fn symbol_for(&self, address: u64) -> Option<&str> {
        let idx = self.symbols.partition_point(|(start, _)| *start <= address).checked_sub(1)?;
        Some(self.symbols[idx].1.as_str())
    }

    /// Demangle a Rust symbol name
    #[must_use]
    pub fn demangle_symbol(symbol: &str) -> String {
        format!("{:#}", demangle(symbol))
    }
}

/// A resolved offset (may contain multiple inlined frames, innermost first)
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFrame {
    pub offset: u64,
    pub frames: Vec<InlinedFrame>,
}

impl ResolvedFrame {
    /// Outermost function at this offset
    #[must_use]
    pub fn function(&self) -> &str {
        self.frames.last().map_or(UNKNOWN_FUNCTION, |frame| frame.function.as_str())
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.frames.iter().all(|frame| frame.function == UNKNOWN_FUNCTION)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InlinedFrame {
    pub function: String,
    pub location: Option<SourceLocation>,
}

/// Source code location
#[derive(Debug, Clone, Serialize)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file.as_deref().unwrap_or("??"))?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}
