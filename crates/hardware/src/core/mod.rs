//! Core address-translation and prefetch implementation.
//!
//! This module contains the architecture-specific register fields the
//! translation path reads and the execution units (HTLB, prefetchers)
//! that carry it out.

/// Architecture-specific components (CSR fields, privilege modes).
pub mod arch;

/// Execution units (HTLB, prefetchers).
pub mod units;
