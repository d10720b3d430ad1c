//! Merge orchestration.
//!
//! Drives the five registries' record streams through normalization,
//! decomposition, and trie insertion in a fixed registry order, then
//! coalesces each family's trie. The two families are independent and
//! aggregate on parallel workers.

pub mod audit;

use log::{debug, info, warn};

use crate::decompose::CidrBlocks;
use crate::radix::{InsertOutcome, NodeMeta, PrefixTrie};
use crate::record::{
    normalize, AddressFamily, AllocationRecord, NormalizeError, Prefix, RawRecord, Registry,
};
use audit::{AlignmentFailure, AuditLog, MalformedRecord, PrefixConflict, UnknownStatus};

use chrono::NaiveDate;

/// One registry's parsed snapshot, resolved to a concrete date.
#[derive(Debug, Clone)]
pub struct RegistryStream {
    pub registry: Registry,
    pub resolved_date: NaiveDate,
    pub records: Vec<RawRecord>,
}

/// Result of a merge run: one coalesced trie per family plus the audit log.
pub struct MergeOutcome {
    pub v4: PrefixTrie,
    pub v6: PrefixTrie,
    pub audit: AuditLog,
}

/// Merge the given registry streams into aggregated per-family tries.
///
/// Streams are processed in the canonical registry order regardless of the
/// order supplied, so first-writer-wins attribution is reproducible. A
/// family with no records at all simply produces an empty trie.
pub fn merge(mut streams: Vec<RegistryStream>) -> MergeOutcome {
    streams.sort_by_key(|stream| stream.registry);

    let mut audit = AuditLog::default();
    let mut v4_records: Vec<AllocationRecord> = Vec::new();
    let mut v6_records: Vec<AllocationRecord> = Vec::new();

    for stream in &streams {
        let mut accepted = 0usize;
        let mut skipped_asn = 0usize;
        let mut rejected = 0usize;

        for (index, raw) in stream.records.iter().enumerate() {
            match normalize(raw, stream.registry, stream.resolved_date) {
                Ok(normalized) => {
                    accepted += 1;
                    if let Some(status) = normalized.unknown_status {
                        audit.unknown_statuses.push(UnknownStatus {
                            registry: stream.registry,
                            start: raw.start.clone(),
                            status,
                        });
                    }
                    match normalized.record.family {
                        AddressFamily::Ipv4 => v4_records.push(normalized.record),
                        AddressFamily::Ipv6 => v6_records.push(normalized.record),
                    }
                }
                // Every snapshot is full of ASN delegations; dropping them is
                // routine, not an audit event.
                Err(NormalizeError::NotAddressType(_)) => skipped_asn += 1,
                Err(err) => {
                    rejected += 1;
                    audit.malformed.push(MalformedRecord {
                        registry: stream.registry,
                        index: index + 1,
                        reason: err.to_string(),
                        raw: raw.clone(),
                    });
                }
            }
        }

        info!(
            "{}: {} address records accepted, {} non-address records skipped, {} rejected",
            stream.registry, accepted, skipped_asn, rejected
        );
    }

    let ((v4, v4_audit), (v6, v6_audit)) = rayon::join(
        || aggregate_family(AddressFamily::Ipv4, &v4_records),
        || aggregate_family(AddressFamily::Ipv6, &v6_records),
    );

    audit.absorb(v4_audit);
    audit.absorb(v6_audit);

    MergeOutcome { v4, v6, audit }
}

/// Build and coalesce one family's trie from its normalized records.
fn aggregate_family(
    family: AddressFamily,
    records: &[AllocationRecord],
) -> (PrefixTrie, AuditLog) {
    let mut trie = PrefixTrie::new(family);
    let mut audit = AuditLog::default();

    if records.is_empty() {
        info!("{family}: no records from any registry, output will be empty");
        return (trie, audit);
    }

    for record in records {
        let meta = NodeMeta::from_record(record);
        match family {
            AddressFamily::Ipv4 => {
                for prefix in CidrBlocks::new(family, record.start, u128::from(record.extent)) {
                    apply_insert(&mut trie, prefix.base, prefix.len, meta.clone(), record, &mut audit);
                }
            }
            AddressFamily::Ipv6 => {
                // IPv6 records already name a single CIDR block.
                apply_insert(&mut trie, record.start, record.extent as u8, meta, record, &mut audit);
            }
        }
    }

    let merges = trie.coalesce();
    info!(
        "{}: {} prefixes remain after {} coalescing merges",
        family,
        trie.node_count(),
        merges
    );

    (trie, audit)
}

fn apply_insert(
    trie: &mut PrefixTrie,
    base: u128,
    len: u8,
    meta: NodeMeta,
    record: &AllocationRecord,
    audit: &mut AuditLog,
) {
    match trie.insert(base, len, meta) {
        Ok(InsertOutcome::Inserted) => {}
        Ok(InsertOutcome::Duplicate) => {
            debug!(
                "{}: {} already claimed with identical metadata",
                record.registry,
                Prefix { family: trie.family(), base, len }
            );
        }
        Ok(InsertOutcome::Conflict { previous }) => {
            let prefix = Prefix {
                family: trie.family(),
                base,
                len,
            };
            // The node now carries the resolved metadata.
            let node = trie
                .get(base, len)
                .expect("conflicting node must exist after insertion");
            warn!(
                "{}: conflicting claims on {} (was {} {} from {}, kept {})",
                record.registry,
                prefix,
                previous.classification,
                previous.country,
                previous.source,
                node.classification
            );
            audit.conflicts.push(PrefixConflict {
                prefix: prefix.to_string(),
                registries: node.contributors.clone(),
                kept: node.classification,
                country: node.country.clone(),
            });
        }
        Err(err) => {
            warn!("{}: dropped one insertion: {}", record.registry, err);
            audit.alignment_errors.push(AlignmentFailure {
                registry: record.registry,
                start: record_start_string(record),
                detail: err.to_string(),
            });
        }
    }
}

fn record_start_string(record: &AllocationRecord) -> String {
    match record.family {
        AddressFamily::Ipv4 => std::net::Ipv4Addr::from(record.start as u32).to_string(),
        AddressFamily::Ipv6 => std::net::Ipv6Addr::from(record.start).to_string(),
    }
}
