//! # nromerge - Consolidated NRO delegation statistics
//!
//! This library merges the daily extended delegation statistics published by
//! the five Regional Internet Registries (AfriNIC, APNIC, ARIN, LACNIC and
//! the RIPE NCC) into a single, de-duplicated, maximally aggregated view of
//! global IPv4 and IPv6 address space for a given calendar date.
//!
//! ## Overview
//!
//! Each registry publishes one flat record-per-range statistics file per
//! day. Ranges come at arbitrary granularity (IPv4 counts need not be powers
//! of two), registries are occasionally silent on a date, and independent
//! files can carry overlapping or redundant claims. The merge resolves all
//! of that into the fewest, largest possible covering prefixes:
//!
//! 1. Snapshots are located on the statistics mirror, falling forward to
//!    the nearest available day when a registry has an archive gap.
//! 2. Raw record tuples are normalized into canonical allocation records.
//! 3. IPv4 ranges are decomposed into minimal CIDR-aligned prefix sets.
//! 4. Prefixes go into one radix trie per family, where conflicting claims
//!    are resolved deterministically and sibling prefixes with identical
//!    metadata are coalesced bottom-up.
//! 5. The surviving prefixes are written as one CSV per family, together
//!    with a JSON audit report of everything skipped or contested.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `settings`: run settings (mirror, search window, cache) and YAML loading
//! - `record`: the canonical data model and raw-record normalization
//! - `decompose`: range-to-CIDR decomposition
//! - `radix`: per-family prefix tries, conflict resolution, and coalescing
//! - `merge`: orchestration across registries and families, audit log
//! - `archive`: snapshot location, retrieval, decompression, and parsing
//! - `output`: ordered emission of the consolidated CSV files
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use nromerge::{archive, merge, output, settings::Settings};
//!
//! let settings = Settings::default();
//! let fetcher = archive::Fetcher::new(&settings)?;
//! let date = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
//!
//! let (streams, notes) = archive::collect_streams(&fetcher, &settings, date);
//! let mut outcome = merge::merge(streams);
//! outcome.audit.snapshots = notes;
//!
//! output::write_outputs(&outcome, std::path::Path::new("nrostats_output"), date)?;
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Determinism
//!
//! Classification conflicts between registries resolve through an explicit
//! total order rather than insertion order, so running the merge twice on
//! the same snapshots yields byte-identical output regardless of how the
//! registries are processed.
//!
//! ## Error Handling
//!
//! Per-record and per-registry problems are accumulated into an audit log
//! and never abort a run; the application boundary uses `color_eyre` for
//! error reporting while modules expose typed `thiserror` enums.

pub mod archive;
pub mod decompose;
pub mod merge;
pub mod output;
pub mod radix;
pub mod record;
pub mod settings;
