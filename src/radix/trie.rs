//! Arena-backed prefix trie for one address family.
//!
//! Nodes are stored in per-length ordered maps keyed by base address rather
//! than as linked nodes, which keeps ownership flat and lets tests inspect
//! the trie shape directly. Parent, child, and sibling relations are all
//! derivable from `(base, len)` alone.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::record::{AddressFamily, AllocationRecord, Classification, Prefix, Registry};

/// Attribution of a trie node: the single registry that contributed it, or
/// an explicit conflict marker when registries disagreed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Registry(Registry),
    Conflict,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Registry(registry) => write!(f, "{registry}"),
            Source::Conflict => write!(f, "conflict"),
        }
    }
}

/// Metadata carried by one stored prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeMeta {
    pub classification: Classification,
    pub source: Source,
    pub country: String,
    pub date: NaiveDate,
    /// Every registry that claimed this prefix, kept for the audit report.
    pub contributors: BTreeSet<Registry>,
}

impl NodeMeta {
    /// Node metadata for a freshly inserted record.
    pub fn from_record(record: &AllocationRecord) -> NodeMeta {
        NodeMeta {
            classification: record.classification,
            source: Source::Registry(record.registry),
            country: record.country.clone(),
            date: record.date,
            contributors: BTreeSet::from([record.registry]),
        }
    }

    /// The fields that must match for two sibling leaves to coalesce:
    /// classification, attribution, and country. Dates are allowed to
    /// differ (conflict nodes can mix snapshot dates).
    fn coalesce_key(&self) -> (Classification, Source, &str) {
        (self.classification, self.source, self.country.as_str())
    }

    /// True when `other` may be merged with this metadata by coalescing.
    pub fn coalesces_with(&self, other: &NodeMeta) -> bool {
        self.coalesce_key() == other.coalesce_key()
    }

    /// Merge two coalescible metadata values into the parent's.
    pub fn merged_with(&self, other: &NodeMeta) -> NodeMeta {
        let mut contributors = self.contributors.clone();
        contributors.extend(other.contributors.iter().copied());
        NodeMeta {
            classification: self.classification,
            source: self.source,
            country: self.country.clone(),
            date: self.date.max(other.date),
            contributors,
        }
    }

    /// Rank used to resolve conflicting claims deterministically: the most
    /// restrictive classification wins; ties fall to the lexicographically
    /// smaller country, then to the later snapshot date. Taking the maximum
    /// under this order is commutative and associative, so the outcome does
    /// not depend on registry processing order.
    fn conflict_rank(&self) -> (Classification, std::cmp::Reverse<&str>, NaiveDate) {
        (
            self.classification,
            std::cmp::Reverse(self.country.as_str()),
            self.date,
        )
    }
}

/// Outcome of a single prefix insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// No node existed at this prefix; one was created.
    Inserted,
    /// A node with identical classification and country already existed;
    /// first-writer-wins attribution kept it unchanged.
    Duplicate,
    /// A node with differing metadata existed; it is now marked as a
    /// conflict. Carries the node's metadata before resolution.
    Conflict { previous: NodeMeta },
}

/// Invariant violations rejected at insertion time. Each failure aborts only
/// the offending insertion, never the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrieError {
    #[error("prefix length {len} exceeds the {family} address width")]
    LengthOutOfRange { family: AddressFamily, len: u8 },

    #[error("base address {base:#x} is not aligned to a /{len} boundary")]
    Misaligned { base: u128, len: u8 },
}

/// One address family's radix trie.
pub struct PrefixTrie {
    family: AddressFamily,
    /// `levels[len]` holds the nodes of prefix length `len`, ordered by base
    /// address.
    levels: Vec<BTreeMap<u128, NodeMeta>>,
}

impl PrefixTrie {
    pub fn new(family: AddressFamily) -> PrefixTrie {
        PrefixTrie {
            family,
            levels: vec![BTreeMap::new(); usize::from(family.bits()) + 1],
        }
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Number of stored prefixes.
    pub fn node_count(&self) -> usize {
        self.levels.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(BTreeMap::is_empty)
    }

    pub(crate) fn level(&self, len: u8) -> &BTreeMap<u128, NodeMeta> {
        &self.levels[usize::from(len)]
    }

    pub(crate) fn level_mut(&mut self, len: u8) -> &mut BTreeMap<u128, NodeMeta> {
        &mut self.levels[usize::from(len)]
    }

    /// Look up the node stored at exactly this prefix.
    pub fn get(&self, base: u128, len: u8) -> Option<&NodeMeta> {
        self.levels.get(usize::from(len))?.get(&base)
    }

    /// Insert a prefix carrying `meta`, resolving any collision with an
    /// earlier insertion at the same prefix.
    ///
    /// A node at a shorter, containing prefix is left untouched: the new,
    /// more specific node simply overrides it within its range under
    /// longest-prefix-match semantics.
    pub fn insert(
        &mut self,
        base: u128,
        len: u8,
        meta: NodeMeta,
    ) -> Result<InsertOutcome, TrieError> {
        let bits = self.family.bits();
        if len > bits {
            return Err(TrieError::LengthOutOfRange {
                family: self.family,
                len,
            });
        }
        let host_bits = u32::from(bits - len);
        let aligned = if host_bits >= 128 {
            base == 0
        } else {
            base & ((1u128 << host_bits) - 1) == 0
        };
        if !aligned {
            return Err(TrieError::Misaligned { base, len });
        }

        match self.levels[usize::from(len)].entry(base) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(meta);
                Ok(InsertOutcome::Inserted)
            }
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if existing.classification == meta.classification
                    && existing.country == meta.country
                {
                    // Idempotent re-insertion; the first writer keeps the
                    // attribution.
                    Ok(InsertOutcome::Duplicate)
                } else {
                    let previous = existing.clone();
                    resolve_conflict(existing, meta);
                    Ok(InsertOutcome::Conflict { previous })
                }
            }
        }
    }

    /// All stored prefixes in ascending base-address order, containing
    /// prefixes before their more-specific children.
    pub fn walk(&self) -> Vec<(Prefix, &NodeMeta)> {
        let mut nodes: Vec<(Prefix, &NodeMeta)> = Vec::with_capacity(self.node_count());
        for (len, level) in self.levels.iter().enumerate() {
            for (&base, meta) in level {
                let prefix = Prefix {
                    family: self.family,
                    base,
                    len: len as u8,
                };
                nodes.push((prefix, meta));
            }
        }
        nodes.sort_by_key(|(prefix, _)| (prefix.base, prefix.len));
        nodes
    }
}

/// Fold a conflicting claim into an existing node. The node keeps the
/// highest-ranked metadata, is marked as a conflict, and remembers every
/// contributing registry.
fn resolve_conflict(existing: &mut NodeMeta, incoming: NodeMeta) {
    if incoming.conflict_rank() > existing.conflict_rank() {
        existing.classification = incoming.classification;
        existing.country = incoming.country;
        existing.date = incoming.date;
    }
    existing.source = Source::Conflict;
    existing.contributors.extend(incoming.contributors);
}
