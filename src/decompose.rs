//! Range-to-CIDR decomposition.
//!
//! IPv4 delegation records describe ranges by start address and address
//! count, and the count is frequently not a power of two. [`CidrBlocks`]
//! turns such a range into the minimal sequence of CIDR-aligned prefixes
//! that exactly covers it, largest aligned block first.

use crate::record::{AddressFamily, Prefix};

/// Lazy iterator over the minimal CIDR cover of `[start, start + count)`.
///
/// At each step the block size is the larger power of two permitted by both
/// the alignment of the current start address and the remaining count; this
/// greedy choice yields the provably minimal decomposition. The iterator is
/// finite and non-restartable.
#[derive(Debug, Clone)]
pub struct CidrBlocks {
    family: AddressFamily,
    cursor: u128,
    remaining: u128,
}

impl CidrBlocks {
    /// Decompose `[start, start + count)` within `family`'s address space.
    ///
    /// The caller is responsible for the range fitting the address space;
    /// normalization checks this before any decomposition happens. A zero
    /// `count` yields an empty sequence.
    pub fn new(family: AddressFamily, start: u128, count: u128) -> Self {
        CidrBlocks {
            family,
            cursor: start,
            remaining: count,
        }
    }
}

impl Iterator for CidrBlocks {
    type Item = Prefix;

    fn next(&mut self) -> Option<Prefix> {
        if self.remaining == 0 {
            return None;
        }

        let bits = u32::from(self.family.bits());

        // Maximum alignment available at the current start address. A start
        // of zero is aligned to the whole space.
        let align = if self.cursor == 0 {
            bits
        } else {
            self.cursor.trailing_zeros().min(bits)
        };

        // Largest power of two not exceeding the remaining count.
        let span = 127 - self.remaining.leading_zeros();

        let block_log = align.min(span);
        let block_size = 1u128 << block_log;

        let prefix = Prefix {
            family: self.family,
            base: self.cursor,
            len: (bits - block_log) as u8,
        };

        self.cursor += block_size;
        self.remaining -= block_size;

        Some(prefix)
    }
}
