//! L1 TLB: a flat, fully-associative 4 KiB-only cache in front of L2 (A.3 "L1TLB").

use crate::core::units::mmu::entry::{PageLevel, TlbEntry};
use crate::core::units::mmu::key::{build_key, significant_bits};
use crate::core::units::mmu::trie::TrieIndex;

/// Flat L1 TLB. Every resident entry covers exactly one 4 KiB page; L1 never
/// caches super-pages (A.3: "L1TLB: ... 4 KiB pages only").
#[derive(Debug)]
pub struct L1Tlb {
    capacity: usize,
    entries: Vec<TlbEntry>,
    trie: TrieIndex,
    lru_clock: u64,
}

impl L1Tlb {
    /// Creates an empty L1 with room for `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
            trie: TrieIndex::new(),
            lru_clock: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.lru_clock += 1;
        self.lru_clock
    }

    /// Looks up `(vpn, asid)`. On hit, refreshes the entry's recency and
    /// returns a reference to it (A.8 invariant 1).
    pub fn lookup(&mut self, vpn: u64, asid: u16) -> Option<&TlbEntry> {
        let key = build_key(vpn, asid);
        let slot = self.trie.lookup(key)?;
        let seq = self.next_seq();
        let entry = &mut self.entries[slot];
        entry.lru_seq = seq;
        Some(&self.entries[slot])
    }

    /// Inserts a new 4 KiB entry, evicting the least-recently-used resident
    /// entry if L1 is at capacity.
    pub fn insert(&mut self, vaddr: u64, paddr: u64, asid: u16, pte: u64) {
        let vpn = vaddr;
        let key = build_key(vpn, asid);

        if self.entries.len() >= self.capacity {
            self.evict_lru();
        }

        let seq = self.next_seq();
        let slot = self.entries.len();
        let handle = self
            .trie
            .insert(key, significant_bits(PageLevel::Kb4.log_bytes()), slot);
        self.entries.push(TlbEntry {
            vaddr,
            paddr,
            asid,
            pte,
            level: PageLevel::Kb4,
            lru_seq: seq,
            index: 0,
            trie_handle: Some(handle),
        });
    }

    fn evict_lru(&mut self) {
        let Some((slot, _)) = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.lru_seq)
        else {
            return;
        };
        self.remove_slot(slot);
    }

    fn remove_slot(&mut self, slot: usize) {
        if let Some(handle) = self.entries[slot].trie_handle.take() {
            self.trie.remove(handle);
        }
        let _ = self.entries.swap_remove(slot);
        if slot < self.entries.len() {
            let moved_key = build_key(self.entries[slot].vaddr, self.entries[slot].asid);
            if let Some(handle) = self.entries[slot].trie_handle.take() {
                self.trie.remove(handle);
                let new_handle = self.trie.insert(
                    moved_key,
                    significant_bits(self.entries[slot].log_bytes()),
                    slot,
                );
                self.entries[slot].trie_handle = Some(new_handle);
            }
        }
    }

    /// Removes every resident entry (A.4.2 `sfence.vma` with no operands).
    pub fn flush_all(&mut self) {
        self.entries.clear();
        self.trie.clear();
    }

    /// Removes the entry covering `vaddr` for `asid`, if present
    /// (A.4.2 `sfence.vma vaddr, asid`).
    pub fn demap_page(&mut self, vaddr: u64, asid: u16) {
        let key = build_key(vaddr, asid);
        if let Some(slot) = self.trie.lookup(key) {
            self.remove_slot(slot);
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff L1 holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_hits() {
        let mut l1 = L1Tlb::new(4);
        l1.insert(0x10, 0x1000, 1, 0xF);
        let hit = l1.lookup(0x10, 1).expect("must hit after insert");
        assert_eq!(hit.paddr, 0x1000);
    }

    #[test]
    fn eviction_at_capacity_drops_lru() {
        let mut l1 = L1Tlb::new(2);
        l1.insert(1, 0x1000, 0, 0xF);
        l1.insert(2, 0x2000, 0, 0xF);
        let _ = l1.lookup(1, 0);
        l1.insert(3, 0x3000, 0, 0xF);

        assert!(l1.lookup(2, 0).is_none(), "entry 2 was least recently used and must be evicted");
        assert!(l1.lookup(1, 0).is_some());
        assert!(l1.lookup(3, 0).is_some());
    }

    #[test]
    fn demap_page_removes_only_that_entry() {
        let mut l1 = L1Tlb::new(4);
        l1.insert(1, 0x1000, 0, 0xF);
        l1.insert(2, 0x2000, 0, 0xF);
        l1.demap_page(1, 0);
        assert!(l1.lookup(1, 0).is_none());
        assert!(l1.lookup(2, 0).is_some());
    }

    #[test]
    fn flush_all_clears_everything() {
        let mut l1 = L1Tlb::new(4);
        l1.insert(1, 0x1000, 0, 0xF);
        l1.flush_all();
        assert!(l1.is_empty());
        assert!(l1.lookup(1, 0).is_none());
    }
}
