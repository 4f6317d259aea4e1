//! L2 TLB: five partitions sharing one super-page backing store, link-group
//! eviction, and a mix of fully-associative and set-indexed replacement
//! (A.3 "L2TLB", A.4.3, A.9 Design Notes).

use crate::common::constants::{
    L2_INDEX_MASK, L2_INDEX_MAX_GROUPS, L2_INDEX_SHIFT, L3_INDEX_MASK, L3_INDEX_MAX_GROUPS,
    L3_INDEX_SHIFT, LINK_GROUP_SIZE,
};
use crate::core::units::mmu::entry::{PageLevel, TlbEntry};
use crate::core::units::mmu::group::GroupAllocator;
use crate::core::units::mmu::key::{build_key, significant_bits};
use crate::core::units::mmu::trie::TrieIndex;

/// Which of the five L2 partitions an entry lives in. `l2sp` is one shared
/// backing partition split by `entry.level` into the `Sp1`/`Sp2` roles
/// (A.9 Design Notes: "the shared super-page partition is modeled as one
/// partition tagged by level, not two separate partitions").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Partition {
    /// 4 KiB entries demoted from L1 (`l2l1`).
    L2l1,
    /// Set-indexed 4 KiB entries (`l2l2`).
    L2l2,
    /// Set-indexed 4 KiB entries (`l2l3`).
    L2l3,
    /// Shared super-page partition, 1 GiB role (`l2sp1`, `flevel = 4`).
    L2sp1,
    /// Shared super-page partition, 2 MiB role (`l2sp2`, `flevel = 5`).
    L2sp2,
}

impl Partition {
    /// Probe order resolved for `lookup_l2tlb` (see the core-spec
    /// implementation note on the l2l3/l2sp2/l2sp1/l2l2/l2l1 ordering).
    pub const PROBE_ORDER: [Partition; 5] = [
        Partition::L2l3,
        Partition::L2sp2,
        Partition::L2sp1,
        Partition::L2l2,
        Partition::L2l1,
    ];

    /// `flevel` tag used by `do_l2tlb_hit_schedule` and fault bookkeeping.
    pub fn flevel(self) -> u32 {
        match self {
            Partition::L2l1 => 1,
            Partition::L2l2 => 2,
            Partition::L2l3 => 3,
            Partition::L2sp1 => 4,
            Partition::L2sp2 => 5,
        }
    }

    fn uses_set_index(self) -> bool {
        matches!(self, Partition::L2l2 | Partition::L2l3)
    }
}

struct PartitionState {
    entries: Vec<TlbEntry>,
    trie: TrieIndex,
    groups: GroupAllocator,
}

impl PartitionState {
    fn new(group_count: usize) -> Self {
        Self {
            entries: Vec::new(),
            trie: TrieIndex::new(),
            groups: GroupAllocator::new(group_count),
        }
    }
}

/// L2 TLB: five logical partitions, backed by link groups of
/// [`LINK_GROUP_SIZE`] entries apiece.
pub struct L2Tlb {
    l2l1: PartitionState,
    l2l2: PartitionState,
    l2l3: PartitionState,
    /// l2sp1/l2sp2 share this single backing partition, disambiguated by
    /// `entry.level` at lookup time.
    l2sp: PartitionState,
    lru_clock: u64,
}

impl L2Tlb {
    /// Creates an L2 with `l2l1_groups`/`l2sp_groups` fully-associative
    /// groups and the spec-fixed `L2_INDEX_MAX_GROUPS`/`L3_INDEX_MAX_GROUPS`
    /// set-indexed groups for l2l2/l2l3.
    pub fn new(l2l1_groups: usize, l2sp_groups: usize) -> Self {
        Self {
            l2l1: PartitionState::new(l2l1_groups),
            l2l2: PartitionState::new(L2_INDEX_MAX_GROUPS),
            l2l3: PartitionState::new(L3_INDEX_MAX_GROUPS),
            l2sp: PartitionState::new(l2sp_groups),
            lru_clock: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.lru_clock += 1;
        self.lru_clock
    }

    fn state(&self, partition: Partition) -> &PartitionState {
        match partition {
            Partition::L2l1 => &self.l2l1,
            Partition::L2l2 => &self.l2l2,
            Partition::L2l3 => &self.l2l3,
            Partition::L2sp1 | Partition::L2sp2 => &self.l2sp,
        }
    }

    fn state_mut(&mut self, partition: Partition) -> &mut PartitionState {
        match partition {
            Partition::L2l1 => &mut self.l2l1,
            Partition::L2l2 => &mut self.l2l2,
            Partition::L2l3 => &mut self.l2l3,
            Partition::L2sp1 | Partition::L2sp2 => &mut self.l2sp,
        }
    }

    /// Probes every partition in the resolved order, returning the first hit
    /// (A.4.3/A.4.4 "lookup_l2tlb"). Refreshes the hit entry's and its
    /// link group's recency.
    pub fn lookup_l2tlb(&mut self, vpn: u64, asid: u16) -> Option<(Partition, TlbEntry)> {
        for partition in Partition::PROBE_ORDER {
            if let Some(entry) = self.lookup_partition(partition, vpn, asid) {
                return Some((partition, entry));
            }
        }
        None
    }

    fn lookup_partition(&mut self, partition: Partition, vpn: u64, asid: u16) -> Option<TlbEntry> {
        let key = build_key(vpn, asid);
        let slot = self.state(partition).trie.lookup(key)?;

        if partition == Partition::L2sp1 || partition == Partition::L2sp2 {
            let level_matches = self.l2sp.entries[slot].level
                == if partition == Partition::L2sp1 {
                    PageLevel::Gb1
                } else {
                    PageLevel::Mb2
                };
            if !level_matches {
                return None;
            }
        }

        let seq = self.next_seq();
        let state = self.state_mut(partition);
        state.entries[slot].lru_seq = seq;
        let group_idx = state
            .groups
            .group_of(slot)
            .expect("resident entry must belong to a link group");
        debug_assert!(
            state.groups.group(group_idx).contains(slot),
            "sibling lookup invariant: a hit entry's group must still list it"
        );
        state.groups.touch(group_idx, seq);
        Some(state.entries[slot].clone())
    }

    /// Installs a new entry into `partition`, evicting a whole link group if
    /// every group is full (A.3: "entries are installed and evicted eight at
    /// a time").
    pub fn insert(
        &mut self,
        partition: Partition,
        vaddr: u64,
        paddr: u64,
        asid: u16,
        pte: u64,
        level: PageLevel,
        index: u32,
    ) {
        let key = build_key(vaddr, asid);
        let width = significant_bits(level.log_bytes());
        let seq = self.next_seq();

        let group_idx = self.select_group_for_insert(partition, index);
        let state = self.state_mut(partition);

        if state.groups.group(group_idx).is_full() {
            Self::evict_group(state, group_idx);
        }

        let slot = state.entries.len();
        let handle = state.trie.insert(key, width, slot);
        state.entries.push(TlbEntry {
            vaddr,
            paddr,
            asid,
            pte,
            level,
            lru_seq: seq,
            index,
            trie_handle: Some(handle),
        });
        state.groups.place(group_idx, slot, seq);
    }

    fn select_group_for_insert(&mut self, partition: Partition, index: u32) -> usize {
        let uses_set_index = partition.uses_set_index();
        let state = self.state_mut(partition);
        let group_count = state.groups.group_count();

        if uses_set_index {
            (index as usize) % group_count
        } else {
            (0..group_count)
                .find(|&g| !state.groups.group(g).is_full())
                .unwrap_or_else(|| {
                    state
                        .groups
                        .least_recently_used(&(0..group_count).collect::<Vec<_>>())
                        .unwrap_or(0)
                })
        }
    }

    fn evict_group(state: &mut PartitionState, group_idx: usize) {
        let members: Vec<usize> = state
            .groups
            .group(group_idx)
            .members
            .iter()
            .filter_map(|m| *m)
            .collect();
        for slot in members {
            if let Some(handle) = state.entries[slot].trie_handle.take() {
                state.trie.remove(handle);
            }
        }
        for slot in members_sorted_desc(&state.groups.group(group_idx).members) {
            state.groups.evict_slot(slot);
            remove_entry_slot(state, slot);
        }
    }

    /// Set-partition index for l2l2 (`(vaddr >> 24) & 0x1F`, A.3 "Partition-specific index selection").
    pub fn l2l2_index(vaddr: u64) -> u32 {
        ((vaddr >> L2_INDEX_SHIFT) & L2_INDEX_MASK) as u32
    }

    /// Set-partition index for l2l3 (`(vaddr >> 15) & 0x7F`, A.3 "Partition-specific index selection").
    pub fn l2l3_index(vaddr: u64) -> u32 {
        ((vaddr >> L3_INDEX_SHIFT) & L3_INDEX_MASK) as u32
    }

    /// Removes every resident entry across all partitions (`sfence.vma` global).
    pub fn flush_all(&mut self) {
        for state in [&mut self.l2l1, &mut self.l2l2, &mut self.l2l3, &mut self.l2sp] {
            state.entries.clear();
            state.trie.clear();
            let count = state.groups.group_count();
            state.groups = GroupAllocator::new(count);
        }
    }

    /// Removes the entry covering `vaddr` for `asid` from every partition.
    pub fn demap_page(&mut self, vaddr: u64, asid: u16) {
        for partition in Partition::PROBE_ORDER {
            let key = build_key(vaddr, asid);
            let state = self.state_mut(partition);
            if let Some(slot) = state.trie.lookup(key) {
                if let Some(handle) = state.entries[slot].trie_handle.take() {
                    state.trie.remove(handle);
                }
                state.groups.evict_slot(slot);
                remove_entry_slot(state, slot);
            }
        }
    }
}

fn members_sorted_desc(members: &[Option<usize>; LINK_GROUP_SIZE]) -> Vec<usize> {
    let mut v: Vec<usize> = members.iter().filter_map(|m| *m).collect();
    v.sort_unstable_by(|a, b| b.cmp(a));
    v
}

/// Removes `slot` from `state.entries` via `swap_remove`, then repairs the
/// trie handle and link-group membership of whatever entry `swap_remove`
/// moved into `slot`'s old position (the former last element).
fn remove_entry_slot(state: &mut PartitionState, slot: usize) {
    let last_index = state.entries.len() - 1;
    let _ = state.entries.swap_remove(slot);
    if slot != last_index {
        reindex_moved_entry(state, last_index, slot);
    }
}

fn reindex_moved_entry(state: &mut PartitionState, old_slot: usize, new_slot: usize) {
    let key = build_key(state.entries[new_slot].vaddr, state.entries[new_slot].asid);
    let width = significant_bits(state.entries[new_slot].log_bytes());
    if let Some(handle) = state.entries[new_slot].trie_handle.take() {
        state.trie.remove(handle);
    }
    let new_handle = state.trie.insert(key, width, new_slot);
    state.entries[new_slot].trie_handle = Some(new_handle);
    state.groups.rebind_slot(old_slot, new_slot);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_hit_refreshes_group_recency() {
        let mut l2 = L2Tlb::new(4, 4);
        l2.insert(Partition::L2l1, 0x10, 0x2000, 1, 0xF, PageLevel::Kb4, 0);
        let hit = l2.lookup_l2tlb(0x10, 1);
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().0, Partition::L2l1);
    }

    #[test]
    fn l2sp1_and_l2sp2_share_backing_but_do_not_alias() {
        let mut l2 = L2Tlb::new(4, 4);
        l2.insert(Partition::L2sp1, 0x10, 0x1000, 0, 0xF, PageLevel::Gb1, 0);
        l2.insert(Partition::L2sp2, 0x20, 0x2000, 0, 0xF, PageLevel::Mb2, 0);

        let (p1, e1) = l2.lookup_l2tlb(0x10, 0).expect("gb1 entry must hit");
        assert_eq!(p1, Partition::L2sp1);
        assert_eq!(e1.level, PageLevel::Gb1);

        let (p2, e2) = l2.lookup_l2tlb(0x20, 0).expect("mb2 entry must hit");
        assert_eq!(p2, Partition::L2sp2);
        assert_eq!(e2.level, PageLevel::Mb2);
    }

    #[test]
    fn l2l2_set_index_routes_by_address() {
        let idx_a = L2Tlb::l2l2_index(0x00);
        let idx_b = L2Tlb::l2l2_index(0x1_0000_0000);
        assert_ne!(idx_a, idx_b);
    }

    #[test]
    fn demap_page_removes_from_every_partition() {
        let mut l2 = L2Tlb::new(4, 4);
        l2.insert(Partition::L2l1, 0x5, 0x1000, 2, 0xF, PageLevel::Kb4, 0);
        l2.demap_page(0x5, 2);
        assert!(l2.lookup_l2tlb(0x5, 2).is_none());
    }
}
