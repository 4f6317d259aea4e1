//! `TranslateDriver`: the top-level `translate` operation tying L1TLB,
//! L2TLB, and the page-table walker together (A.4.4, A.4.5).

use tracing::{debug, trace};

use crate::common::addr::{PhysAddr, VirtAddr};
use crate::common::error::{Trap, TranslationResult};
use crate::core::arch::csr::{Satp, Status};
use crate::core::arch::mode::PrivilegeMode;
use crate::core::units::mmu::entry::{pte_bits, PageLevel, TlbEntry};
use crate::core::units::mmu::l1::L1Tlb;
use crate::core::units::mmu::l2::{L2Tlb, Partition};
use crate::core::units::mmu::walker::{AccessType, Request, Translation, WalkResult, Walker};

/// Global execution mode threaded through the driver at construction
/// (A.9 Design Notes: "thread a `SystemMode` through the TranslateDriver").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemMode {
    /// Full hardware-accurate translation through SATP and the page tables.
    FullSystem,
    /// Syscall-emulation: bypasses the TLB and consults the host process's
    /// page table directly. Not modeled beyond pass-through in this crate.
    SyscallEmulation,
}

/// Ties the L1/L2 TLBs and a [`Walker`] together behind the `translate*`
/// entry points (A.4.4).
pub struct TranslateDriver {
    l1: L1Tlb,
    l2: L2Tlb,
    mode: SystemMode,
}

/// Remaining walk depth represented by a partition match, per A.4.4 step 5
/// (`0` for l2l3, `1` for l2l2/l2sp2, `2` for l2l1/l2sp1).
fn remaining_levels(partition: Partition) -> u32 {
    match partition {
        Partition::L2l3 => 0,
        Partition::L2l2 | Partition::L2sp2 => 1,
        Partition::L2l1 | Partition::L2sp1 => 2,
    }
}

fn page_fault(vaddr: u64, access: AccessType) -> Trap {
    match access {
        AccessType::Fetch => Trap::InstructionPageFault(vaddr),
        AccessType::Read => Trap::LoadPageFault(vaddr),
        AccessType::Write => Trap::StorePageFault(vaddr),
    }
}

fn access_fault(vaddr: u64, access: AccessType) -> Trap {
    match access {
        AccessType::Fetch => Trap::InstructionAccessFault(vaddr),
        AccessType::Read => Trap::LoadAccessFault(vaddr),
        AccessType::Write => Trap::StoreAccessFault(vaddr),
    }
}

/// Validates R/W/X, U-mode, and A/D bits of a matched PTE against the
/// requested access (A.4.4 step 5's `l2tlb_check`, A.4.5).
fn check_permissions(
    pte: u64,
    access: AccessType,
    privilege: PrivilegeMode,
    status: Status,
    vaddr: u64,
) -> Option<Trap> {
    if pte & pte_bits::V == 0 || (pte & pte_bits::R == 0 && pte & pte_bits::W != 0) {
        return Some(page_fault(vaddr, access));
    }

    let readable = pte & pte_bits::R != 0;
    let writable = pte & pte_bits::W != 0;
    let executable = pte & pte_bits::X != 0;
    let user = pte & pte_bits::U != 0;

    match access {
        AccessType::Write if !writable => return Some(page_fault(vaddr, access)),
        AccessType::Fetch if !executable => return Some(page_fault(vaddr, access)),
        AccessType::Read if !(readable || (executable && status.mxr())) => {
            return Some(page_fault(vaddr, access))
        }
        _ => {}
    }

    if privilege == PrivilegeMode::User && !user {
        return Some(page_fault(vaddr, access));
    }
    if privilege == PrivilegeMode::Supervisor && user {
        if !status.sum() {
            return Some(page_fault(vaddr, access));
        }
        if access == AccessType::Fetch {
            return Some(page_fault(vaddr, access));
        }
    }

    if pte & pte_bits::A == 0 {
        return Some(page_fault(vaddr, access));
    }
    if access == AccessType::Write && pte & pte_bits::D == 0 {
        return Some(page_fault(vaddr, access));
    }

    None
}

impl TranslateDriver {
    /// Creates a driver over fresh, empty L1/L2 TLBs.
    pub fn new(
        l1_size: usize,
        l2l1_groups: usize,
        l2sp_groups: usize,
        mode: SystemMode,
    ) -> Self {
        Self {
            l1: L1Tlb::new(l1_size),
            l2: L2Tlb::new(l2l1_groups, l2sp_groups),
            mode,
        }
    }

    /// Synchronous translation: resolves fully before returning, no walker
    /// callback involved (A.4.4 "atomic" mode).
    pub fn translate_atomic(
        &mut self,
        req: &mut impl Request,
        satp: Satp,
        status: Status,
        privilege: PrivilegeMode,
        walker: &mut impl Walker,
    ) -> TranslationResult {
        self.translate(req, satp, status, privilege, walker, TranslateKind::Atomic)
    }

    /// Timing translation: may complete asynchronously via `translation.finish`
    /// (A.4.4 "timing" mode).
    pub fn translate_timing(
        &mut self,
        req: &mut impl Request,
        satp: Satp,
        status: Status,
        privilege: PrivilegeMode,
        walker: &mut impl Walker,
        translation: &mut impl Translation,
    ) -> TranslationResult {
        let result = self.translate(req, satp, status, privilege, walker, TranslateKind::Timing);
        if result.delayed() {
            translation.mark_delayed();
        } else {
            translation.finish(result.trap, result.paddr.val());
        }
        result
    }

    /// Side-effect-free probe: no LRU mutation, no walker scheduling
    /// (A.4.4 "functional" mode).
    pub fn translate_functional(
        &mut self,
        req: &mut impl Request,
        satp: Satp,
        status: Status,
        privilege: PrivilegeMode,
        walker: &mut impl Walker,
    ) -> TranslationResult {
        self.translate(
            req,
            satp,
            status,
            privilege,
            walker,
            TranslateKind::Functional,
        )
    }

    fn translate(
        &mut self,
        req: &mut impl Request,
        satp: Satp,
        status: Status,
        privilege: PrivilegeMode,
        walker: &mut impl Walker,
        kind: TranslateKind,
    ) -> TranslationResult {
        if self.mode == SystemMode::SyscallEmulation {
            let paddr = PhysAddr::new(req.vaddr());
            req.set_paddr(paddr.val());
            return TranslationResult::success(paddr, 0);
        }

        // Step 1: M-mode or SATP.mode == Bare is physical-address pass-through.
        if privilege == PrivilegeMode::Machine || !satp.is_sv39() {
            let paddr = PhysAddr::new(req.vaddr());
            req.set_paddr(paddr.val());
            return TranslationResult::success(paddr, 0);
        }

        // Step 2: sign-extend to the architectural VA width.
        let vaddr = VirtAddr::sign_extend_sv39(req.vaddr());
        let access = access_type(req);
        let asid = satp.asid();

        // Step 4: L1TLB lookup.
        let hidden = matches!(kind, TranslateKind::Functional);
        if !hidden {
            let hit = self.l1.lookup(vaddr.vpn(), asid).cloned();
            if let Some(entry) = hit {
                trace!(vpn = vaddr.vpn(), "l1 tlb hit");
                return self.finish_from_entry(entry, vaddr, access, privilege, status, req);
            }
        }

        // Step 5: L2TLB probes in the resolved order.
        if !hidden {
            if let Some((partition, entry)) = self.l2.lookup_l2tlb(vaddr.vpn(), asid) {
                return self.handle_l2_hit(partition, entry, vaddr, access, privilege, status, req, walker);
            }
        }

        // Step 6: complete miss, dispatch the walker from the root.
        debug!(vpn = vaddr.vpn(), "tlb miss, dispatching walker");
        let walk = if hidden {
            walker.start_functional(satp.root_ppn(), vaddr.val(), access, privilege)
        } else {
            walker.start(satp.root_ppn(), vaddr.val(), access, privilege, 2, false)
        };

        if walk.delayed {
            return TranslationResult {
                paddr: PhysAddr::new(0),
                cycles: 0,
                trap: None,
            };
        }

        if let Some(trap) = walk.fault {
            return TranslationResult::fault(trap, 0);
        }

        let entry = TlbEntry {
            vaddr: vaddr.vpn() & !((1u64 << (walk.level.log_bytes() - 12)) - 1),
            paddr: walk.ppn,
            asid,
            pte: walk.pte,
            level: walk.level,
            lru_seq: 0,
            index: 0,
            trie_handle: None,
        };
        if !hidden {
            self.install(&entry);
        }
        self.finish_from_entry(entry, vaddr, access, privilege, status, req)
    }

    fn handle_l2_hit(
        &mut self,
        partition: Partition,
        entry: TlbEntry,
        vaddr: VirtAddr,
        access: AccessType,
        privilege: PrivilegeMode,
        status: Status,
        req: &mut impl Request,
        walker: &mut impl Walker,
    ) -> TranslationResult {
        if let Some(trap) = check_permissions(entry.pte, access, privilege, status, vaddr.val()) {
            return TranslationResult::fault(trap, 0);
        }

        let level = remaining_levels(partition);
        let hit_in_sp = level == entry.level as u32;

        if hit_in_sp {
            self.l1.insert(vaddr.vpn(), entry.paddr, entry.asid, entry.pte);
            walker.do_l2tlb_hit_schedule(self.resolve_paddr(&entry, vaddr).val(), None);
            return TranslationResult {
                paddr: PhysAddr::new(0),
                cycles: 0,
                trap: None,
            };
        }

        let walk = walker.start(entry.pte >> pte_bits::PPN_SHIFT, vaddr.val(), access, privilege, level, true);
        if walk.delayed {
            return TranslationResult {
                paddr: PhysAddr::new(0),
                cycles: 0,
                trap: None,
            };
        }
        if let Some(trap) = walk.fault {
            return TranslationResult::fault(trap, 0);
        }
        let resolved = TlbEntry {
            vaddr: entry.vaddr,
            paddr: walk.ppn,
            asid: entry.asid,
            pte: walk.pte,
            level: walk.level,
            lru_seq: 0,
            index: 0,
            trie_handle: None,
        };
        self.install(&resolved);
        self.finish_from_entry(resolved, vaddr, access, privilege, status, req)
    }

    fn finish_from_entry(
        &mut self,
        entry: TlbEntry,
        vaddr: VirtAddr,
        access: AccessType,
        privilege: PrivilegeMode,
        status: Status,
        req: &mut impl Request,
    ) -> TranslationResult {
        if let Some(trap) = check_permissions(entry.pte, access, privilege, status, vaddr.val()) {
            return TranslationResult::fault(trap, 0);
        }
        let paddr = self.resolve_paddr(&entry, vaddr);
        if paddr.is_negative() {
            return TranslationResult::fault(access_fault(vaddr.val(), access), 0);
        }
        req.set_paddr(paddr.val());
        TranslationResult::success(paddr, 0)
    }

    fn resolve_paddr(&self, entry: &TlbEntry, vaddr: VirtAddr) -> PhysAddr {
        let page_mask = entry.level.page_bytes() - 1;
        PhysAddr::new((entry.paddr << 12) | (vaddr.val() & page_mask))
    }

    fn install(&mut self, entry: &TlbEntry) {
        match entry.level {
            PageLevel::Kb4 => {
                self.l1.insert(entry.vaddr, entry.paddr, entry.asid, entry.pte);
                let idx = L2Tlb::l2l3_index(entry.vaddr << 12);
                self.l2.insert(
                    Partition::L2l3,
                    entry.vaddr,
                    entry.paddr,
                    entry.asid,
                    entry.pte,
                    entry.level,
                    idx,
                );
            }
            PageLevel::Mb2 => {
                self.l2.insert(
                    Partition::L2sp2,
                    entry.vaddr,
                    entry.paddr,
                    entry.asid,
                    entry.pte,
                    entry.level,
                    0,
                );
            }
            PageLevel::Gb1 => {
                self.l2.insert(
                    Partition::L2sp1,
                    entry.vaddr,
                    entry.paddr,
                    entry.asid,
                    entry.pte,
                    entry.level,
                    0,
                );
            }
        }
    }

    /// Invalidates every resident entry in both TLB levels.
    pub fn flush_all(&mut self) {
        self.l1.flush_all();
        self.l2.flush_all();
    }

    /// Invalidates the entry covering `vaddr` for `asid` in both TLB levels.
    /// `(vaddr = 0, asid = 0)` is equivalent to [`Self::flush_all`] (A.8 invariant 4).
    pub fn demap_page(&mut self, vaddr: u64, asid: u16) {
        if vaddr == 0 && asid == 0 {
            self.flush_all();
            return;
        }
        self.l1.demap_page(vaddr >> 12, asid);
        self.l2.demap_page(vaddr >> 12, asid);
    }
}

enum TranslateKind {
    Atomic,
    Timing,
    Functional,
}

impl TranslationResult {
    fn delayed(&self) -> bool {
        self.trap.is_none() && self.paddr.val() == 0 && self.cycles == 0
    }
}

fn access_type(req: &impl Request) -> AccessType {
    if req.is_inst_fetch() {
        AccessType::Fetch
    } else if req.is_write() {
        AccessType::Write
    } else {
        AccessType::Read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRequest {
        vaddr: u64,
        paddr: u64,
        fetch: bool,
    }

    impl Request for FakeRequest {
        fn vaddr(&self) -> u64 {
            self.vaddr
        }
        fn set_paddr(&mut self, paddr: u64) {
            self.paddr = paddr;
        }
        fn size(&self) -> u64 {
            8
        }
        fn is_inst_fetch(&self) -> bool {
            self.fetch
        }
        fn is_write(&self) -> bool {
            false
        }
        fn prefetch_source(&self) -> crate::core::units::mmu::walker::PrefetchSource {
            crate::core::units::mmu::walker::PrefetchSource::None
        }
        fn prefetch_depth(&self) -> u32 {
            0
        }
    }

    struct FakeWalker;
    impl Walker for FakeWalker {
        fn start(
            &mut self,
            _root_ppn: u64,
            _vaddr: u64,
            _access: AccessType,
            _privilege: PrivilegeMode,
            _start_level: u32,
            _from_l2: bool,
        ) -> WalkResult {
            WalkResult {
                ppn: 0xABCDE,
                level: PageLevel::Kb4,
                pte: 0xCF, // v|r|w|x|a|d
                fault: None,
                delayed: false,
            }
        }
        fn start_functional(
            &mut self,
            root_ppn: u64,
            vaddr: u64,
            access: AccessType,
            privilege: PrivilegeMode,
        ) -> WalkResult {
            self.start(root_ppn, vaddr, access, privilege, 2, false)
        }
        fn do_l2tlb_hit_schedule(&mut self, _paddr: u64, _trap: Option<Trap>) {}
    }

    #[test]
    fn bare_satp_is_pass_through() {
        let mut driver = TranslateDriver::new(4, 4, 4, SystemMode::FullSystem);
        let mut req = FakeRequest { vaddr: 0x1234, paddr: 0, fetch: false };
        let mut walker = FakeWalker;
        let satp = Satp::new(0);
        let status = Status::new(0);
        let result = driver.translate_atomic(&mut req, satp, status, PrivilegeMode::Supervisor, &mut walker);
        assert_eq!(result.paddr.val(), 0x1234);
    }

    #[test]
    fn miss_dispatches_walker_and_installs_entry() {
        let mut driver = TranslateDriver::new(4, 4, 4, SystemMode::FullSystem);
        let mut req = FakeRequest { vaddr: 0x12345_678, paddr: 0, fetch: false };
        let mut walker = FakeWalker;
        let satp = Satp::new((8u64 << 60) | 5);
        let status = Status::new(0);

        let result = driver.translate_atomic(&mut req, satp, status, PrivilegeMode::Supervisor, &mut walker);
        assert!(result.is_ok());
        assert_eq!(result.paddr.val(), 0xABCDE_678);

        let second = driver.translate_atomic(&mut req, satp, status, PrivilegeMode::Supervisor, &mut walker);
        assert!(second.is_ok());
    }

    #[test]
    fn demap_zero_zero_is_flush_all() {
        let mut driver = TranslateDriver::new(4, 4, 4, SystemMode::FullSystem);
        let mut req = FakeRequest { vaddr: 0x12345_678, paddr: 0, fetch: false };
        let mut walker = FakeWalker;
        let satp = Satp::new((8u64 << 60) | 5);
        let status = Status::new(0);
        let _ = driver.translate_atomic(&mut req, satp, status, PrivilegeMode::Supervisor, &mut walker);
        driver.demap_page(0, 0);
        assert!(driver.l1.is_empty());
    }
}
