//! Hierarchical TLB and hardware prefetch engines for a RISC-V Sv39 core.
//!
//! This crate implements:
//! 1. **Core:** the Hierarchical TLB (L1 + five-partition L2) and the
//!    `TranslateDriver` that ties it to a page-table walker.
//! 2. **Prefetch:** the Berti delta-correlation prefetcher and the CDP
//!    cache-content-directed prefetcher, both independent observers of the
//!    translation path.
//! 3. **Common:** address types, Sv39/link-group constants, and the trap
//!    taxonomy address translation can raise.

/// Common types and constants (addresses, constants, traps).
pub mod common;
/// HTLB and prefetch engine configuration.
pub mod config;
/// Address-translation core: arch register fields and execution units.
pub mod core;
/// Statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The `TranslateDriver`, `TlbEntry`, and walker collaborator traits.
pub use crate::core::units::mmu;
/// The Berti and CDP prefetcher implementations.
pub use crate::core::units::prefetch;
