//! Extended statistics file parsing.
//!
//! Snapshot files are line-oriented with `|`-separated fields. Alongside the
//! record lines they carry a version header, per-type summary lines, and the
//! occasional comment; all of those are skipped here and only raw record
//! tuples are handed onward.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::record::{RawRecord, Registry};

/// Compiled patterns for the non-record line shapes.
struct StatsPatterns {
    /// Match the version header: "2|apnic|20110101|43660|19830613|20110101|+1000"
    version: Regex,
    /// Match summary lines: "apnic|*|ipv4|*|22831|summary"
    summary: Regex,
}

impl StatsPatterns {
    fn new() -> Self {
        Self {
            version: Regex::new(r"^\d+(\.\d+)?\|").expect("invalid version regex"),
            summary: Regex::new(r"\|summary$").expect("invalid summary regex"),
        }
    }
}

static PATTERNS: LazyLock<StatsPatterns> = LazyLock::new(StatsPatterns::new);

/// Parse one registry's decompressed snapshot body into raw record tuples.
///
/// Tolerant by design: unrecognized or short lines are skipped and counted,
/// never fatal. Field contents are not interpreted here; that is the
/// normalizer's job.
pub fn parse_snapshot(registry: Registry, body: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            skipped += 1;
            continue;
        }
        if PATTERNS.version.is_match(line) || PATTERNS.summary.is_match(line) {
            skipped += 1;
            continue;
        }

        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < 7 {
            skipped += 1;
            debug!("{}: skipping short line `{}`", registry, line);
            continue;
        }

        records.push(RawRecord {
            registry: fields[0].to_string(),
            country: fields[1].to_string(),
            rtype: fields[2].to_string(),
            start: fields[3].to_string(),
            value: fields[4].to_string(),
            date: fields[5].to_string(),
            status: fields[6].to_string(),
            opaque_id: fields
                .get(7)
                .map(|field| field.to_string())
                .filter(|field| !field.is_empty()),
        });
    }

    debug!(
        "{}: {} record lines, {} other lines skipped",
        registry,
        records.len(),
        skipped
    );
    records
}
