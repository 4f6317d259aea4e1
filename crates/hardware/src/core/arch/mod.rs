//! RISC-V architecture-specific components consumed by address translation.
//!
//! This module includes:
//! 1. **CSRs:** The `SATP`/`SSTATUS` field layout `TranslateDriver` reads.
//! 2. **Modes:** Privilege mode definitions used for permission checks.

/// Control and Status Register fields consumed by address translation.
pub mod csr;

/// Privilege mode definitions and transitions.
pub mod mode;
