//! Structured error types for modcache
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;
use thiserror::Error;

use crate::module::MemoryRange;

/// Misuse of the module cache by its caller.
///
/// These are programmer errors rather than data errors. The cache checks for
/// them before mutating anything, so its state is still consistent when one
/// is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("Module {new} overlaps existing module {existing}")]
    Overlap { new: MemoryRange, existing: MemoryRange },

    #[error("Defunct module {0} is not an active non-native module")]
    StaleDefunctModule(MemoryRange),

    #[error("An auxiliary module provider is already registered")]
    ProviderAlreadyRegistered,

    #[error("No auxiliary module provider is registered")]
    ProviderNotRegistered,

    #[error("Auxiliary module provider does not match the registered provider")]
    ProviderMismatch,
}

#[derive(Error, Debug)]
pub enum MapsError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed maps line ({reason}): {line}")]
    MalformedLine { line: String, reason: &'static str },
}

#[derive(Error, Debug)]
pub enum PerfMapError {
    #[error("Failed to read perf map {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed perf map line {line_number}: {line}")]
    MalformedLine { line_number: usize, line: String },

    #[error(transparent)]
    Conflict(#[from] ContractViolation),
}
