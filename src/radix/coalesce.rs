//! Bottom-up coalescing of sibling prefixes.
//!
//! After insertion, adjacent same-metadata prefixes are merged into their
//! shared parent until no merge applies, producing the smallest set of
//! largest uniformly-classified prefixes.

use std::collections::HashSet;

use log::debug;

use super::trie::PrefixTrie;

impl PrefixTrie {
    /// Merge sibling leaf pairs with identical classification, attribution,
    /// and country into their parent, repeatedly, bottom-up. Returns the
    /// number of merges performed.
    ///
    /// A node with stored descendants is never merged: its more specific
    /// children still override parts of its range, so folding it into a
    /// larger prefix would change longest-prefix-match results. Likewise a
    /// node whose sibling is absent keeps its exact extent, since the
    /// sibling's half of the parent is unclaimed space.
    pub fn coalesce(&mut self) -> usize {
        let bits = u32::from(self.family().bits());
        let mut merges = 0;

        // Bases at the level below the current one that have stored nodes at
        // or beneath them. A stored node whose base is in this set is not a
        // leaf.
        let mut covered: HashSet<u128> = HashSet::new();

        for len in (1..=self.family().bits()).rev() {
            let sibling_bit = 1u128 << (bits - u32::from(len));

            let bases: Vec<u128> = self.level(len).keys().copied().collect();
            for base in bases {
                // Visit each pair once, from its low sibling.
                if base & sibling_bit != 0 {
                    continue;
                }
                let other = base | sibling_bit;
                if covered.contains(&base) || covered.contains(&other) {
                    continue;
                }
                let (Some(low), Some(high)) =
                    (self.level(len).get(&base), self.level(len).get(&other))
                else {
                    continue;
                };
                if !low.coalesces_with(high) {
                    continue;
                }

                let merged = low.merged_with(high);
                let level = self.level_mut(len);
                level.remove(&base);
                level.remove(&other);
                // The parent may already be stored as an inserted prefix; the
                // children covered its whole range with uniform metadata, so
                // their metadata supersedes it.
                self.level_mut(len - 1).insert(base, merged);
                merges += 1;
            }

            // Roll coverage up one level: a parent has stored descendants if
            // any child base was covered or still holds a node.
            let mut parent_covered = HashSet::with_capacity(covered.len());
            for base in covered {
                parent_covered.insert(base & !sibling_bit);
            }
            for &base in self.level(len).keys() {
                parent_covered.insert(base & !sibling_bit);
            }
            covered = parent_covered;
        }

        if merges > 0 {
            debug!(
                "{}: coalesced {} sibling pairs, {} prefixes remain",
                self.family(),
                merges,
                self.node_count()
            );
        }
        merges
    }
}
