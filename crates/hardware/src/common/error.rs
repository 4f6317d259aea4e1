//! Trap and Translation Result definitions.
//!
//! This module defines the error handling and trap mechanisms for the memory
//! translation subsystem. It provides:
//! 1. **Trap Representation:** The synchronous exceptions address translation can raise.
//! 2. **Translation Results:** Reporting the outcome of virtual-to-physical address translation.
//! 3. **Error Handling:** Integrating with standard Rust error traits for system-level reporting.

use thiserror::Error;

use super::addr::PhysAddr;

/// Traps that can be raised while translating an address (A.7 Error Handling Design).
///
/// Structural invariant violations (a corrupt link group, a missing group
/// sibling, an over-limit index set) are never represented here: per A.7
/// they are bugs, not runtime conditions, and are reported with
/// `assert!`/`debug_assert!` instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Trap {
    /// Instruction address misaligned exception.
    ///
    /// The associated value is the misaligned address.
    #[error("instruction address misaligned: {0:#x}")]
    InstructionAddressMisaligned(u64),

    /// Instruction access fault: hardware-level illegal fetch (A.7 `INST_ACCESS`).
    #[error("instruction access fault: {0:#x}")]
    InstructionAccessFault(u64),

    /// Load access fault: hardware-level illegal load (A.7 `LOAD_ACCESS`).
    #[error("load access fault: {0:#x}")]
    LoadAccessFault(u64),

    /// Store access fault: hardware-level illegal store (A.7 `STORE_ACCESS`).
    #[error("store access fault: {0:#x}")]
    StoreAccessFault(u64),

    /// Instruction page fault: recoverable by the OS (A.7 `INST_PAGE`).
    #[error("instruction page fault: {0:#x}")]
    InstructionPageFault(u64),

    /// Load page fault: recoverable by the OS (A.7 `LOAD_PAGE`).
    #[error("load page fault: {0:#x}")]
    LoadPageFault(u64),

    /// Store page fault: recoverable by the OS (A.7 `STORE_PAGE`).
    #[error("store page fault: {0:#x}")]
    StorePageFault(u64),
}

/// Result of a virtual-to-physical address translation operation (A.4.4).
///
/// This structure encapsulates the outcome of an HTLB/walker translation,
/// including performance metrics and any fault that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TranslationResult {
    /// The translated physical address, or zero if translation failed.
    pub paddr: PhysAddr,
    /// Number of cycles consumed by the translation operation.
    pub cycles: u64,
    /// Trap that occurred during translation, if any.
    pub trap: Option<Trap>,
}

impl TranslationResult {
    /// Creates a successful translation result.
    #[inline]
    pub fn success(paddr: PhysAddr, cycles: u64) -> Self {
        Self {
            paddr,
            cycles,
            trap: None,
        }
    }

    /// Creates a translation result indicating a fault occurred.
    #[inline]
    pub fn fault(trap: Trap, cycles: u64) -> Self {
        Self {
            paddr: PhysAddr(0),
            cycles,
            trap: Some(trap),
        }
    }

    /// True if the translation succeeded.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.trap.is_none()
    }
}
