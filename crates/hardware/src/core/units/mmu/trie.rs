//! Longest-prefix-match index over translation keys (A.3 "TrieIndex",
//! A.4.1 "longest-prefix match, smaller pages shadow larger pages").
//!
//! A literal radix trie isn't the only idiomatic shape for this: keys are
//! only ever masked to one of three fixed widths (55, 46, or full precision,
//! i.e. one per Sv39 page size), so a width-bucketed hash map gives the same
//! longest-prefix semantics without pointer-chasing.

use std::collections::HashMap;

use crate::core::units::mmu::key::{mask_to_width, TlbKey};

/// Opaque handle to an installed trie entry, returned by [`TrieIndex::insert`]
/// and required by [`TrieIndex::remove`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrieHandle {
    width: u32,
    masked_key: TlbKey,
}

/// Width-bucketed longest-prefix-match index from translation keys to
/// partition-local backing slots.
#[derive(Debug, Default)]
pub struct TrieIndex {
    /// One bucket per distinct significant-bit width in use, each a direct
    /// key-to-slot map. Buckets are walked widest-first on lookup so a
    /// smaller page (more significant bits, a narrower prefix) always wins
    /// over a super-page covering the same address.
    buckets: HashMap<u32, HashMap<TlbKey, usize>>,
}

impl TrieIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `slot` under `key` masked to `width` significant bits.
    /// Returns the handle needed to remove it later.
    pub fn insert(&mut self, key: TlbKey, width: u32, slot: usize) -> TrieHandle {
        let masked_key = mask_to_width(key, width);
        let _ = self
            .buckets
            .entry(width)
            .or_default()
            .insert(masked_key, slot);
        TrieHandle { width, masked_key }
    }

    /// Looks up the entry covering `key`, preferring the narrowest-prefix
    /// (most specific, smallest-page) match across all installed widths.
    pub fn lookup(&self, key: TlbKey) -> Option<usize> {
        let mut widths: Vec<u32> = self.buckets.keys().copied().collect();
        widths.sort_unstable_by(|a, b| b.cmp(a));
        for width in widths {
            let masked_key = mask_to_width(key, width);
            if let Some(&slot) = self.buckets.get(&width).and_then(|b| b.get(&masked_key)) {
                return Some(slot);
            }
        }
        None
    }

    /// Removes a previously installed entry. No-op if already removed.
    pub fn remove(&mut self, handle: TrieHandle) {
        if let Some(bucket) = self.buckets.get_mut(&handle.width) {
            let _ = bucket.remove(&handle.masked_key);
            if bucket.is_empty() {
                let _ = self.buckets.remove(&handle.width);
            }
        }
    }

    /// Removes every entry, leaving the index empty.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Number of entries currently installed, across all widths.
    pub fn len(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    /// True iff no entries are installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::mmu::key::{build_key, significant_bits};
    use crate::common::constants::{LOG_BYTES_1G, LOG_BYTES_2M, LOG_BYTES_4K};

    #[test]
    fn smaller_page_shadows_larger_page_at_same_address() {
        let mut trie = TrieIndex::new();
        let key_4k = build_key(0x1000, 3);
        let _ = trie.insert(key_4k, significant_bits(LOG_BYTES_1G), 100);
        let _ = trie.insert(key_4k, significant_bits(LOG_BYTES_4K), 200);

        assert_eq!(trie.lookup(key_4k), Some(200), "4K entry must shadow the 1G entry");
    }

    #[test]
    fn superpage_covers_addresses_outside_the_shadowing_4k_entry() {
        let mut trie = TrieIndex::new();
        let asid = 9;
        let covered_4k = build_key(0x40, asid);
        let elsewhere = build_key(0x41, asid);
        let _ = trie.insert(covered_4k, significant_bits(LOG_BYTES_1G), 1);
        let _ = trie.insert(covered_4k, significant_bits(LOG_BYTES_4K), 2);

        assert_eq!(trie.lookup(covered_4k), Some(2));
        assert_eq!(trie.lookup(elsewhere), Some(1), "1G entry must still cover a sibling 4K region");
    }

    #[test]
    fn remove_clears_only_the_targeted_entry() {
        let mut trie = TrieIndex::new();
        let key = build_key(0x7, 0);
        let handle = trie.insert(key, significant_bits(LOG_BYTES_2M), 42);
        assert_eq!(trie.lookup(key), Some(42));
        trie.remove(handle);
        assert_eq!(trie.lookup(key), None);
        assert!(trie.is_empty());
    }

    #[test]
    fn distinct_asids_do_not_alias() {
        let mut trie = TrieIndex::new();
        let a = build_key(0x10, 1);
        let b = build_key(0x10, 2);
        let _ = trie.insert(a, significant_bits(LOG_BYTES_4K), 7);
        assert_eq!(trie.lookup(b), None);
    }
}
