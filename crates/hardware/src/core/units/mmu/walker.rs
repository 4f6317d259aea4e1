//! Collaborator traits `TranslateDriver` dispatches to: the page-table
//! walker, the timing-mode completion callback, and the request object
//! (A.6 "External Interfaces").

use crate::common::error::Trap;
use crate::core::arch::mode::PrivilegeMode;
use crate::core::units::mmu::entry::PageLevel;

/// The kind of memory access a request represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    /// Instruction fetch.
    Fetch,
    /// Data load.
    Read,
    /// Data store.
    Write,
}

/// Which prefetcher, if any, originated a request (A.6 "Request object").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefetchSource {
    /// Ordinary demand access.
    None,
    /// Originated from the Berti prefetcher.
    Berti,
    /// Originated from the CDP prefetcher.
    Cdp,
}

/// The request object `TranslateDriver` operates on (A.6 "Request object").
pub trait Request {
    /// The virtual address to translate.
    fn vaddr(&self) -> u64;
    /// Installs the resolved physical address.
    fn set_paddr(&mut self, paddr: u64);
    /// Access width in bytes.
    fn size(&self) -> u64;
    /// True iff this request is an instruction fetch.
    fn is_inst_fetch(&self) -> bool;
    /// True iff this request is a store.
    fn is_write(&self) -> bool;
    /// Which prefetcher originated this request, if any.
    fn prefetch_source(&self) -> PrefetchSource;
    /// Pointer-chain depth, for CDP's depth gate.
    fn prefetch_depth(&self) -> u32;
}

/// Outcome of a single page-table-walker step: either the walk finished
/// (synchronously or was scheduled) producing a fault-or-success, or it
/// must be resumed at a reduced level.
#[derive(Clone, Copy, Debug)]
pub struct WalkResult {
    /// Physical page number resolved by the walk, if it completed.
    pub ppn: u64,
    /// Level in the three-level table at which resolution completed (0 = leaf 4K).
    pub level: PageLevel,
    /// Raw PTE bits of the leaf entry.
    pub pte: u64,
    /// Any fault encountered during the walk.
    pub fault: Option<Trap>,
    /// True iff completion was scheduled for later delivery via `Translation::finish`.
    pub delayed: bool,
}

/// Callee of `TranslateDriver` (A.6 "Walker contract").
pub trait Walker {
    /// Walks from `root_ppn` at `start_level`, in the current privilege mode,
    /// for the given access type. `from_l2` marks a walk resumed from a
    /// partial L2TLB hit rather than starting at the table root.
    fn start(
        &mut self,
        root_ppn: u64,
        vaddr: u64,
        access: AccessType,
        privilege: PrivilegeMode,
        start_level: u32,
        from_l2: bool,
    ) -> WalkResult;

    /// Synchronous, side-effect-free resolution used by functional-mode
    /// translation; never schedules a delayed completion.
    fn start_functional(
        &mut self,
        root_ppn: u64,
        vaddr: u64,
        access: AccessType,
        privilege: PrivilegeMode,
    ) -> WalkResult;

    /// Enqueues a future `Translation::finish` for an L2TLB super-page hit
    /// that requires no further walking.
    fn do_l2tlb_hit_schedule(&mut self, paddr: u64, trap: Option<Trap>);
}

/// Caller of `TranslateDriver` in timing mode (A.6 "Translation callback").
pub trait Translation {
    /// Delivered once the translation (possibly delayed) completes.
    fn finish(&mut self, fault: Option<Trap>, paddr: u64);
    /// Notification that completion is pending and will arrive later.
    fn mark_delayed(&mut self);
}
