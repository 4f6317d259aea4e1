//! The resident TLB entry (A.3 "TlbEntry").

use crate::common::constants::{LOG_BYTES_1G, LOG_BYTES_2M, LOG_BYTES_4K};
use crate::core::units::mmu::trie::TrieHandle;

/// Page size an entry covers, carrying A.3's numbering (`0 = 4 KiB`, `1 = 1 GiB
/// super`, `2 = 2 MiB super`) so `entry.level` round-trips through the same
/// values the spec's l2sp disambiguation check compares against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageLevel {
    /// 4 KiB leaf page.
    Kb4 = 0,
    /// 1 GiB super-page.
    Gb1 = 1,
    /// 2 MiB super-page.
    Mb2 = 2,
}

impl PageLevel {
    /// `logBytes`: `12` for 4 KiB, `21` for 2 MiB, `30` for 1 GiB.
    pub fn log_bytes(self) -> u32 {
        match self {
            PageLevel::Kb4 => LOG_BYTES_4K,
            PageLevel::Gb1 => LOG_BYTES_1G,
            PageLevel::Mb2 => LOG_BYTES_2M,
        }
    }

    /// Byte size of the page this level covers.
    pub fn page_bytes(self) -> u64 {
        1u64 << self.log_bytes()
    }
}

/// PTE permission/status bit positions (RISC-V Sv39, shared across all entries).
pub mod pte_bits {
    /// Valid bit.
    pub const V: u64 = 1 << 0;
    /// Readable bit.
    pub const R: u64 = 1 << 1;
    /// Writable bit.
    pub const W: u64 = 1 << 2;
    /// Executable bit.
    pub const X: u64 = 1 << 3;
    /// User-accessible bit.
    pub const U: u64 = 1 << 4;
    /// Accessed bit.
    pub const A: u64 = 1 << 6;
    /// Dirty bit.
    pub const D: u64 = 1 << 7;
    /// Shift to the PPN field.
    pub const PPN_SHIFT: u32 = 10;
}

/// A resident translation entry (A.3 "TlbEntry").
#[derive(Clone, Debug)]
pub struct TlbEntry {
    /// The VPN, masked to this entry's page size.
    pub vaddr: u64,
    /// The physical page number this entry maps to.
    pub paddr: u64,
    /// 16-bit address-space identifier.
    pub asid: u16,
    /// Raw 64-bit PTE (bit fields: v, r, w, x, u, a, d, ppn).
    pub pte: u64,
    /// Page size this entry covers.
    pub level: PageLevel,
    /// Monotonic access counter; strictly increasing on every non-hidden hit (A.8 invariant 1).
    pub lru_seq: u64,
    /// Partition-local set-associative-by-hash index (A.3 "Partition-specific index selection").
    pub index: u32,
    /// Non-`None` iff this entry is currently installed in its partition's trie.
    pub trie_handle: Option<TrieHandle>,
}

impl TlbEntry {
    /// `logBytes` for this entry's page size.
    pub fn log_bytes(&self) -> u32 {
        self.level.log_bytes()
    }

    /// Valid bit (`pte.v`).
    pub fn valid(&self) -> bool {
        self.pte & pte_bits::V != 0
    }

    /// Readable bit (`pte.r`).
    pub fn readable(&self) -> bool {
        self.pte & pte_bits::R != 0
    }

    /// Writable bit (`pte.w`).
    pub fn writable(&self) -> bool {
        self.pte & pte_bits::W != 0
    }

    /// Executable bit (`pte.x`).
    pub fn executable(&self) -> bool {
        self.pte & pte_bits::X != 0
    }

    /// User-accessible bit (`pte.u`).
    pub fn user(&self) -> bool {
        self.pte & pte_bits::U != 0
    }

    /// Accessed bit (`pte.a`).
    pub fn accessed(&self) -> bool {
        self.pte & pte_bits::A != 0
    }

    /// Dirty bit (`pte.d`).
    pub fn dirty(&self) -> bool {
        self.pte & pte_bits::D != 0
    }
}
