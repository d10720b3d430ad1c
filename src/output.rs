//! Output emission.
//!
//! Walks the coalesced tries in ascending base-address order and writes the
//! consolidated statistics as one CSV per address family, plus a JSON audit
//! report, into the caller's output directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use color_eyre::eyre::{Context, Result};
use csv::Writer;
use log::info;

use crate::merge::MergeOutcome;
use crate::radix::PrefixTrie;
use crate::record::{AddressFamily, Prefix};

/// Column order of the consolidated statistics files.
const CSV_HEADER: [&str; 7] = [
    "registry", "country", "type", "start", "extent", "date", "status",
];

/// One surviving prefix rendered for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub prefix: Prefix,
    pub registry: String,
    pub country: String,
    pub date: NaiveDate,
    pub status: String,
}

/// Render a coalesced trie as output rows. Order is a strict total order on
/// base address (ties broken shortest prefix first), so identical input
/// always yields identical output.
pub fn emit_rows(trie: &PrefixTrie) -> Vec<OutputRow> {
    trie.walk()
        .into_iter()
        .map(|(prefix, meta)| OutputRow {
            prefix,
            registry: meta.source.to_string(),
            country: meta.country.clone(),
            date: meta.date,
            status: meta.classification.to_string(),
        })
        .collect()
}

/// The `extent` column mirrors the input convention: an address count for
/// IPv4, a prefix length for IPv6.
fn extent_field(prefix: &Prefix) -> String {
    match prefix.family {
        AddressFamily::Ipv4 => prefix.address_count().to_string(),
        AddressFamily::Ipv6 => prefix.len.to_string(),
    }
}

/// Write one family's consolidated statistics. Returns the number of rows.
pub fn write_family_csv(trie: &PrefixTrie, path: &Path) -> Result<usize> {
    let mut writer = Writer::from_path(path)
        .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
    writer.write_record(CSV_HEADER)?;

    let rows = emit_rows(trie);
    for row in &rows {
        let start = row.prefix.base_addr_string();
        let extent = extent_field(&row.prefix);
        let date = row.date.format("%Y%m%d").to_string();
        writer.write_record([
            row.registry.as_str(),
            row.country.as_str(),
            row.prefix.family.type_label(),
            start.as_str(),
            extent.as_str(),
            date.as_str(),
            row.status.as_str(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(rows.len())
}

/// File paths for one run's outputs under `output_dir`.
pub fn output_paths(output_dir: &Path, date: NaiveDate) -> (PathBuf, PathBuf, PathBuf) {
    let stamp = date.format("%Y%m%d");
    (
        output_dir.join(format!("nrostats-{stamp}-v4.csv")),
        output_dir.join(format!("nrostats-{stamp}-v6.csv")),
        output_dir.join(format!("nrostats-{stamp}-audit.json")),
    )
}

/// Write both family CSVs and the audit report for a finished merge.
pub fn write_outputs(outcome: &MergeOutcome, output_dir: &Path, date: NaiveDate) -> Result<()> {
    let (v4_path, v6_path, audit_path) = output_paths(output_dir, date);

    let v4_rows = write_family_csv(&outcome.v4, &v4_path)?;
    info!("wrote {} IPv4 prefixes to {}", v4_rows, v4_path.display());

    let v6_rows = write_family_csv(&outcome.v6, &v6_path)?;
    info!("wrote {} IPv6 prefixes to {}", v6_rows, v6_path.display());

    let audit_json = serde_json::to_string_pretty(&outcome.audit)
        .context("Failed to serialize audit report to JSON")?;
    fs::write(&audit_path, audit_json)
        .with_context(|| format!("Failed to write audit report to '{}'", audit_path.display()))?;
    info!("wrote audit report to {}", audit_path.display());

    Ok(())
}
