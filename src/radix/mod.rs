//! Per-family radix aggregation.
//!
//! One [`PrefixTrie`] per address family collects decomposed prefixes,
//! resolves conflicting claims between registries, and coalesces sibling
//! prefixes into the largest uniformly-classified blocks.

pub mod coalesce;
pub mod trie;

pub use trie::{InsertOutcome, NodeMeta, PrefixTrie, Source, TrieError};
