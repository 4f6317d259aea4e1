//! Link-group allocation for L2 partitions (A.3 "link groups": entries are
//! installed and evicted eight at a time, and an access to any member
//! refreshes the whole group's recency).

use crate::common::constants::LINK_GROUP_SIZE;

/// One fixed-size group of backing slots, all evicted together.
#[derive(Clone, Debug)]
pub struct LinkGroup {
    /// Backing-store slot indices belonging to this group, `None` where unfilled.
    pub members: [Option<usize>; LINK_GROUP_SIZE],
    /// This group's recency stamp; refreshed on any member hit.
    pub lru_seq: u64,
}

impl LinkGroup {
    fn empty() -> Self {
        Self {
            members: [None; LINK_GROUP_SIZE],
            lru_seq: 0,
        }
    }

    /// True iff every slot in the group is filled.
    pub fn is_full(&self) -> bool {
        self.members.iter().all(Option::is_some)
    }

    /// First unfilled slot position, if any.
    pub fn free_slot(&self) -> Option<usize> {
        self.members.iter().position(Option::is_none)
    }

    /// True iff `slot` is one of this group's members.
    pub fn contains(&self, slot: usize) -> bool {
        self.members.iter().any(|m| *m == Some(slot))
    }
}

/// Owns the fixed set of link groups backing one L2 partition and hands out
/// group indices for insertion, eviction, and group-wide LRU refresh.
#[derive(Clone, Debug)]
pub struct GroupAllocator {
    groups: Vec<LinkGroup>,
}

impl GroupAllocator {
    /// Creates an allocator with `group_count` empty groups.
    pub fn new(group_count: usize) -> Self {
        Self {
            groups: (0..group_count).map(|_| LinkGroup::empty()).collect(),
        }
    }

    /// Number of groups this allocator manages.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Borrows a group by index.
    pub fn group(&self, index: usize) -> &LinkGroup {
        &self.groups[index]
    }

    /// Finds the group index containing `slot`, if any.
    pub fn group_of(&self, slot: usize) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(slot))
    }

    /// Installs `slot` into the first free position of group `index`.
    /// Panics if the group is already full; callers must evict first.
    pub fn place(&mut self, index: usize, slot: usize, lru_seq: u64) {
        let group = &mut self.groups[index];
        let pos = group
            .free_slot()
            .expect("place called on a full link group; evict before inserting");
        group.members[pos] = Some(slot);
        group.lru_seq = lru_seq;
    }

    /// Removes `slot` from whichever group holds it.
    pub fn evict_slot(&mut self, slot: usize) {
        for group in &mut self.groups {
            for member in &mut group.members {
                if *member == Some(slot) {
                    *member = None;
                }
            }
        }
    }

    /// Updates whichever group holds `old_slot` to reference `new_slot`
    /// instead, used after a backing-store `swap_remove` moves an entry to
    /// a new index. A no-op if `old_slot` is not currently held.
    pub fn rebind_slot(&mut self, old_slot: usize, new_slot: usize) {
        for group in &mut self.groups {
            for member in &mut group.members {
                if *member == Some(old_slot) {
                    *member = Some(new_slot);
                }
            }
        }
    }

    /// Refreshes a group's recency stamp on a hit against any of its members
    /// (A.3: "a hit against any member refreshes the whole group's recency").
    pub fn touch(&mut self, index: usize, lru_seq: u64) {
        self.groups[index].lru_seq = lru_seq;
    }

    /// The least-recently-used group among `candidates`, by group `lru_seq`.
    pub fn least_recently_used(&self, candidates: &[usize]) -> Option<usize> {
        candidates
            .iter()
            .copied()
            .min_by_key(|&idx| self.groups[idx].lru_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_fills_first_free_slot() {
        let mut alloc = GroupAllocator::new(2);
        alloc.place(0, 11, 1);
        alloc.place(0, 12, 2);
        assert_eq!(alloc.group(0).members[0], Some(11));
        assert_eq!(alloc.group(0).members[1], Some(12));
        assert_eq!(alloc.group_of(12), Some(0));
    }

    #[test]
    fn group_full_after_eight_placements() {
        let mut alloc = GroupAllocator::new(1);
        for slot in 0..LINK_GROUP_SIZE {
            alloc.place(0, slot, slot as u64);
        }
        assert!(alloc.group(0).is_full());
    }

    #[test]
    fn evict_slot_frees_its_position() {
        let mut alloc = GroupAllocator::new(1);
        alloc.place(0, 3, 1);
        alloc.evict_slot(3);
        assert_eq!(alloc.group_of(3), None);
        assert_eq!(alloc.group(0).free_slot(), Some(0));
    }

    #[test]
    fn least_recently_used_picks_lowest_seq() {
        let mut alloc = GroupAllocator::new(3);
        alloc.touch(0, 10);
        alloc.touch(1, 3);
        alloc.touch(2, 7);
        assert_eq!(alloc.least_recently_used(&[0, 1, 2]), Some(1));
    }
}
