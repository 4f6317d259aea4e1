//! Hierarchical Memory Management Unit.
//!
//! Submodules, from lowest level up:
//! - [`key`] / [`trie`]: the `(asid, vpn)` key and the longest-prefix-match
//!   index every partition is built on.
//! - [`entry`] / [`group`]: the resident entry representation and the
//!   eight-slot link-group allocator.
//! - [`l1`] / [`l2`]: the two cache levels.
//! - [`walker`] / [`driver`]: the collaborator contracts and the top-level
//!   `translate*` operations.

/// Translation key construction.
pub mod key;
/// Longest-prefix-match index.
pub mod trie;
/// Resident entry representation.
pub mod entry;
/// Link-group allocation.
pub mod group;
/// L1 TLB.
pub mod l1;
/// L2 TLB.
pub mod l2;
/// Walker/Translation/Request collaborator traits.
pub mod walker;
/// Top-level translate driver.
pub mod driver;

pub use driver::{SystemMode, TranslateDriver};
pub use entry::{PageLevel, TlbEntry};
pub use l2::Partition;
pub use walker::{AccessType, PrefetchSource, Request, Translation, WalkResult, Walker};
