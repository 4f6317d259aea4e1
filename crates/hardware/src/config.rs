//! Configuration system for the HTLB and prefetch engines.
//!
//! This module defines all configuration structures used to parameterize
//! address translation and the hardware prefetchers. It provides:
//! 1. **Defaults:** Baseline geometry and tuning constants (A.6).
//! 2. **Structures:** `HtlbConfig`, `BertiConfig`, `CdpConfig`, rolled up into `Config`.
//!
//! Configuration is supplied via JSON (checkpoint/harness integration) or
//! `Config::default()` for standalone use.

use serde::Deserialize;

use crate::common::constants::{
    CDP_DEPTH_THRESHOLD, DEFAULT_BERTI_ADDRLIST_SIZE, DEFAULT_BERTI_DELTALIST_SIZE,
    DEFAULT_BERTI_MAX_DELTAFOUND, L2_INDEX_MAX_GROUPS, L3_INDEX_MAX_GROUPS,
};

/// Default configuration constants not already named in `common::constants`
/// (those are the *architectural* constants; these are tunable defaults).
mod defaults {
    /// Default L1 TLB entry count.
    pub const L1_SIZE: usize = 64;

    /// Default number of fully-associative link groups in `l2l1`.
    pub const L2TLB_L1_GROUPS: usize = 8;

    /// Default number of fully-associative link groups shared by `l2sp1`/`l2sp2`.
    pub const L2TLB_SP_GROUPS: usize = 4;

    /// Default Berti history-table geometry (number of tracked PCs).
    pub const BERTI_HISTORY_TABLE_ENTRIES: usize = 64;

    /// Default CDP candidate cap per cache-fill trigger.
    pub const CDP_MAX_PFS: usize = 16;
}

/// Root configuration for the HTLB and both prefetchers (B.3).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Hierarchical TLB geometry.
    pub htlb: HtlbConfig,
    /// Berti prefetcher tuning.
    pub berti: BertiConfig,
    /// CDP prefetcher tuning.
    pub cdp: CdpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            htlb: HtlbConfig::default(),
            berti: BertiConfig::default(),
            cdp: CdpConfig::default(),
        }
    }
}

/// L1/L2 TLB geometry (A.6 "Configuration parameters").
#[derive(Debug, Clone, Deserialize)]
pub struct HtlbConfig {
    /// L1 TLB entry count.
    #[serde(default = "HtlbConfig::default_l1_size")]
    pub l1_size: usize,

    /// Number of fully-associative link groups in `l2l1`.
    #[serde(default = "HtlbConfig::default_l2tlb_l1_groups")]
    pub l2tlb_l1_groups: usize,

    /// Number of set-indexed link groups in `l2l2` (fixed by the index
    /// formula's 32-set, max-2-groups-per-set geometry; see
    /// `L2_INDEX_MAX_GROUPS`).
    #[serde(default = "HtlbConfig::default_l2tlb_l2_groups")]
    pub l2tlb_l2_groups: usize,

    /// Number of set-indexed link groups in `l2l3` (fixed by `L3_INDEX_MAX_GROUPS`).
    #[serde(default = "HtlbConfig::default_l2tlb_l3_groups")]
    pub l2tlb_l3_groups: usize,

    /// Number of fully-associative link groups shared by `l2sp1`/`l2sp2`.
    #[serde(default = "HtlbConfig::default_l2tlb_sp_groups")]
    pub l2tlb_sp_groups: usize,
}

impl HtlbConfig {
    fn default_l1_size() -> usize {
        defaults::L1_SIZE
    }

    fn default_l2tlb_l1_groups() -> usize {
        defaults::L2TLB_L1_GROUPS
    }

    fn default_l2tlb_l2_groups() -> usize {
        L2_INDEX_MAX_GROUPS
    }

    fn default_l2tlb_l3_groups() -> usize {
        L3_INDEX_MAX_GROUPS
    }

    fn default_l2tlb_sp_groups() -> usize {
        defaults::L2TLB_SP_GROUPS
    }
}

impl Default for HtlbConfig {
    fn default() -> Self {
        Self {
            l1_size: defaults::L1_SIZE,
            l2tlb_l1_groups: defaults::L2TLB_L1_GROUPS,
            l2tlb_l2_groups: L2_INDEX_MAX_GROUPS,
            l2tlb_l3_groups: L3_INDEX_MAX_GROUPS,
            l2tlb_sp_groups: defaults::L2TLB_SP_GROUPS,
        }
    }
}

/// Berti prefetcher tuning (A.4.6, A.6).
#[derive(Debug, Clone, Deserialize)]
pub struct BertiConfig {
    /// Per-PC history FIFO capacity.
    #[serde(default = "BertiConfig::default_addrlist_size")]
    pub addrlist_size: usize,

    /// Per-PC delta-table capacity.
    #[serde(default = "BertiConfig::default_deltalist_size")]
    pub deltalist_size: usize,

    /// Maximum timely deltas collected per `search_timely_deltas` call.
    #[serde(default = "BertiConfig::default_max_deltafound")]
    pub max_deltafound: usize,

    /// Emit one candidate per non-`NoPref` delta instead of just `best_delta`.
    #[serde(default)]
    pub aggressive_pf: bool,

    /// Express deltas/candidates in raw byte addresses instead of block indices.
    #[serde(default)]
    pub use_byte_addr: bool,

    /// Enable the `trigger_pht` side-channel hook (B.5).
    #[serde(default)]
    pub trigger_pht: bool,

    /// Number of PC slots the history table holds.
    #[serde(default = "BertiConfig::default_history_table_entries")]
    pub history_table_entries: usize,
}

impl BertiConfig {
    fn default_addrlist_size() -> usize {
        DEFAULT_BERTI_ADDRLIST_SIZE
    }

    fn default_deltalist_size() -> usize {
        DEFAULT_BERTI_DELTALIST_SIZE
    }

    fn default_max_deltafound() -> usize {
        DEFAULT_BERTI_MAX_DELTAFOUND
    }

    fn default_history_table_entries() -> usize {
        defaults::BERTI_HISTORY_TABLE_ENTRIES
    }
}

impl Default for BertiConfig {
    fn default() -> Self {
        Self {
            addrlist_size: DEFAULT_BERTI_ADDRLIST_SIZE,
            deltalist_size: DEFAULT_BERTI_DELTALIST_SIZE,
            max_deltafound: DEFAULT_BERTI_MAX_DELTAFOUND,
            aggressive_pf: false,
            use_byte_addr: false,
            trigger_pht: false,
            history_table_entries: defaults::BERTI_HISTORY_TABLE_ENTRIES,
        }
    }
}

/// CDP prefetcher tuning (A.4.7, A.6).
#[derive(Debug, Clone, Deserialize)]
pub struct CdpConfig {
    /// Pointer-chase depth cap.
    #[serde(default = "CdpConfig::default_depth_threshold")]
    pub depth_threshold: u32,

    /// Maximum candidates emitted per cache-fill trigger.
    #[serde(default = "CdpConfig::default_max_pfs")]
    pub max_pfs: usize,

    /// True for big-endian lane interpretation; false for little-endian.
    #[serde(default)]
    pub big_endian: bool,
}

impl CdpConfig {
    fn default_depth_threshold() -> u32 {
        CDP_DEPTH_THRESHOLD
    }

    fn default_max_pfs() -> usize {
        defaults::CDP_MAX_PFS
    }
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            depth_threshold: CDP_DEPTH_THRESHOLD,
            max_pfs: defaults::CDP_MAX_PFS,
            big_endian: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_named_defaults() {
        let config = Config::default();
        assert_eq!(config.htlb.l1_size, defaults::L1_SIZE);
        assert_eq!(config.cdp.depth_threshold, CDP_DEPTH_THRESHOLD);
    }

    #[test]
    fn partial_json_fills_in_remaining_defaults() {
        let json = r#"{
            "htlb": {},
            "berti": { "aggressive_pf": true },
            "cdp": {}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.berti.aggressive_pf);
        assert_eq!(config.berti.addrlist_size, DEFAULT_BERTI_ADDRLIST_SIZE);
        assert_eq!(config.htlb.l1_size, defaults::L1_SIZE);
    }
}
