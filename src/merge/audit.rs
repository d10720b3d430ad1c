//! Audit log for one merge run.
//!
//! Per-record and per-registry problems never abort a merge; they are
//! accumulated here and written out alongside the consolidated statistics so
//! the caller can see exactly what was skipped, defaulted, or contested.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::record::{Classification, RawRecord, Registry};

/// How a registry's snapshot request for the target date was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SnapshotOutcome {
    /// A snapshot was found, possibly on a later day than requested.
    Resolved { date: NaiveDate },
    /// The target date predates the registry's archive; an empty stream is
    /// used.
    BeforeArchive,
    /// No snapshot inside the forward search window.
    NotFound { window_days: u32 },
    /// Retrieval failed outright (network error, unexpected status).
    Failed { error: String },
}

/// One registry's snapshot resolution for the run.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotNote {
    pub registry: Registry,
    pub requested: NaiveDate,
    #[serde(flatten)]
    pub outcome: SnapshotOutcome,
}

/// A raw tuple that failed normalization and was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct MalformedRecord {
    pub registry: Registry,
    /// 1-based record index within the registry's snapshot, counting only
    /// record lines.
    pub index: usize,
    pub reason: String,
    pub raw: RawRecord,
}

/// A record whose status string was not recognized and was defaulted to
/// `reserved`.
#[derive(Debug, Clone, Serialize)]
pub struct UnknownStatus {
    pub registry: Registry,
    pub start: String,
    pub status: String,
}

/// Overlapping claims on one prefix by registries with differing metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PrefixConflict {
    pub prefix: String,
    pub registries: BTreeSet<Registry>,
    /// Classification the conflict resolved to.
    pub kept: Classification,
    pub country: String,
}

/// An insertion rejected for violating prefix alignment invariants.
#[derive(Debug, Clone, Serialize)]
pub struct AlignmentFailure {
    pub registry: Registry,
    pub start: String,
    pub detail: String,
}

/// Everything noteworthy that happened during a merge run.
#[derive(Debug, Default, Serialize)]
pub struct AuditLog {
    pub snapshots: Vec<SnapshotNote>,
    pub malformed: Vec<MalformedRecord>,
    pub unknown_statuses: Vec<UnknownStatus>,
    pub conflicts: Vec<PrefixConflict>,
    pub alignment_errors: Vec<AlignmentFailure>,
}

impl AuditLog {
    /// Fold another audit log into this one. Used to combine the per-family
    /// logs produced by parallel aggregation.
    pub fn absorb(&mut self, other: AuditLog) {
        self.snapshots.extend(other.snapshots);
        self.malformed.extend(other.malformed);
        self.unknown_statuses.extend(other.unknown_statuses);
        self.conflicts.extend(other.conflicts);
        self.alignment_errors.extend(other.alignment_errors);
    }

    pub fn has_entries(&self) -> bool {
        !(self.malformed.is_empty()
            && self.unknown_statuses.is_empty()
            && self.conflicts.is_empty()
            && self.alignment_errors.is_empty())
    }

    /// Summarize the log at `info` level after a run.
    pub fn log_summary(&self) {
        for note in &self.snapshots {
            match &note.outcome {
                SnapshotOutcome::Resolved { date } if *date != note.requested => {
                    log::info!(
                        "{}: no snapshot for {}, used {} instead",
                        note.registry,
                        note.requested,
                        date
                    );
                }
                SnapshotOutcome::Resolved { .. } => {}
                SnapshotOutcome::BeforeArchive => {
                    log::info!(
                        "{}: {} predates the archive, treated as empty",
                        note.registry,
                        note.requested
                    );
                }
                SnapshotOutcome::NotFound { window_days } => {
                    log::warn!(
                        "{}: no snapshot within {} days of {}",
                        note.registry,
                        window_days,
                        note.requested
                    );
                }
                SnapshotOutcome::Failed { error } => {
                    log::warn!(
                        "{}: snapshot retrieval failed, registry skipped: {}",
                        note.registry,
                        error
                    );
                }
            }
        }
        if self.has_entries() {
            log::info!(
                "audit: {} malformed, {} unknown statuses, {} conflicts, {} alignment errors",
                self.malformed.len(),
                self.unknown_statuses.len(),
                self.conflicts.len(),
                self.alignment_errors.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_concatenates_entries() {
        let mut a = AuditLog::default();
        a.unknown_statuses.push(UnknownStatus {
            registry: Registry::Apnic,
            start: "203.0.113.0".to_string(),
            status: "experimental".to_string(),
        });

        let mut b = AuditLog::default();
        b.conflicts.push(PrefixConflict {
            prefix: "203.0.113.0/24".to_string(),
            registries: BTreeSet::from([Registry::Apnic, Registry::Arin]),
            kept: Classification::Allocated,
            country: "AU".to_string(),
        });

        a.absorb(b);
        assert_eq!(a.unknown_statuses.len(), 1);
        assert_eq!(a.conflicts.len(), 1);
        assert!(a.has_entries());
    }

    #[test]
    fn empty_log_has_no_entries() {
        let log = AuditLog::default();
        assert!(!log.has_entries());
    }

    #[test]
    fn snapshot_notes_serialize_with_flattened_outcome() {
        let note = SnapshotNote {
            registry: Registry::RipeNcc,
            requested: NaiveDate::from_ymd_opt(2011, 1, 1).unwrap(),
            outcome: SnapshotOutcome::NotFound { window_days: 14 },
        };
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["registry"], "ripencc");
        assert_eq!(json["outcome"], "not_found");
        assert_eq!(json["window_days"], 14);
    }
}
