//! Normalized record model and raw-record normalization.
//!
//! This module owns the canonical vocabulary of the merge: registries,
//! address families, classifications, raw and normalized records, and
//! CIDR-aligned prefixes.

pub mod normalizer;
pub mod types;

// Re-export commonly used types
pub use normalizer::{normalize, NormalizeError, Normalized};
pub use types::{
    AddressFamily, AllocationRecord, Classification, Prefix, RawRecord, Registry, UNKNOWN_COUNTRY,
};
