//! Domain model for modcache
//!
//! This module contains the error types shared across the crate:
//! - Contract violations raised by the module cache
//! - Recoverable failures of the `/proc` and perf-map readers

pub mod errors;

pub use errors::{ContractViolation, MapsError, PerfMapError};
