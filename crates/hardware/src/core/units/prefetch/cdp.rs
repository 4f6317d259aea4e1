//! CDP: a cache-content-directed prefetcher that scans filled cache lines
//! for plausible pointers and chases them (A.4.7).

use std::collections::HashMap;

use tracing::debug;

use crate::common::addr::VirtAddr;
use crate::common::constants::{CACHE_LINE_BYTES, CDP_DEPTH_THRESHOLD, CDP_LANE_BYTES, CDP_SUPPRESS_ACCURACY};
use crate::config::CdpConfig;
use crate::core::units::prefetch::{AddrPriority, PrefetchSource, RecentPrefetchFilter};

/// Byte order CDP should interpret scanned lanes in, inherited from the
/// system rather than configured independently (A.6 "endianness inherited
/// from system").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    /// Little-endian lane interpretation.
    Little,
    /// Big-endian lane interpretation.
    Big,
}

impl Endianness {
    fn from_config(config: &CdpConfig) -> Self {
        if config.big_endian { Self::Big } else { Self::Little }
    }
}

/// Confidence entry for a `(vpn2, vpn1)` pair observed on a demand miss
/// (A.3 "VpnTable").
#[derive(Clone, Copy, Debug, Default)]
struct VpnConfidence {
    confidence: u32,
}

/// Remembers recently missed `(vpn2, vpn1)` pairs, gating which scanned
/// pointers are plausible enough to chase.
struct VpnTable {
    table: HashMap<(u64, u64), VpnConfidence>,
    capacity: usize,
}

impl VpnTable {
    fn new(capacity: usize) -> Self {
        Self { table: HashMap::new(), capacity }
    }

    fn record_miss(&mut self, vpn2: u64, vpn1: u64) {
        if self.table.len() >= self.capacity && !self.table.contains_key(&(vpn2, vpn1)) {
            if let Some(victim) = self.table.keys().next().copied() {
                let _ = self.table.remove(&victim);
            }
        }
        let _ = self.table.insert((vpn2, vpn1), VpnConfidence::default());
    }

    fn contains(&self, vpn2: u64, vpn1: u64) -> bool {
        self.table.contains_key(&(vpn2, vpn1))
    }
}

/// Splits a Sv39 virtual address into its `(vpn2, vpn1, vpn0)` fields.
fn vpn_fields(addr: u64) -> (u64, u64, u64) {
    let vpn = addr >> 12;
    (vpn >> 18 & 0x1FF, vpn >> 9 & 0x1FF, vpn & 0x1FF)
}

/// A.4.7 step 2's acceptance filter: canonical, non-zero `vpn0`, 8-byte
/// aligned, and confirmed present in the VPN table.
fn is_plausible_pointer(candidate: u64, vpn_table: &VpnTable) -> bool {
    if candidate >> 39 != 0 {
        return false;
    }
    if candidate & 0x3 != 0 {
        return false;
    }
    let (vpn2, vpn1, vpn0) = vpn_fields(candidate);
    if vpn0 == 0 {
        return false;
    }
    vpn_table.contains(vpn2, vpn1)
}

fn read_lane(bytes: &[u8], endianness: Endianness) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    match endianness {
        Endianness::Little => u64::from_le_bytes(buf),
        Endianness::Big => u64::from_be_bytes(buf),
    }
}

fn block_address(addr: u64) -> u64 {
    addr & !(CACHE_LINE_BYTES - 1)
}

/// Cache-content-directed prefetcher (A.4.7).
pub struct CdpPrefetcher {
    config: CdpConfig,
    endianness: Endianness,
    vpn_table: VpnTable,
    filter: RecentPrefetchFilter,
    /// Per-source suppression flags, flipped by [`Self::pf_hit_notify`] when
    /// measured accuracy drops below [`CDP_SUPPRESS_ACCURACY`] (B.5).
    suppressed: Vec<bool>,
}

/// Number of distinct upstream sources CDP tracks suppression for.
const SOURCE_COUNT: usize = 2;

impl CdpPrefetcher {
    /// Creates a prefetcher with the given configuration.
    pub fn new(config: CdpConfig) -> Self {
        let endianness = Endianness::from_config(&config);
        Self {
            config,
            endianness,
            vpn_table: VpnTable::new(256),
            filter: RecentPrefetchFilter::new(64, 6),
            suppressed: vec![false; SOURCE_COUNT],
        }
    }

    fn source_suppressed(&self, source: usize) -> bool {
        self.suppressed.get(source).copied().unwrap_or(false)
    }

    /// Scans a filled cache line for pointer-shaped lanes and emits chase
    /// candidates (A.4.7 "Trigger on cache fill").
    ///
    /// `is_inst_fetch` and `is_prefetch_originated` gate out fills this
    /// trigger must ignore per step 0. `source` identifies the caller for
    /// suppression bookkeeping.
    pub fn notify_fill(
        &mut self,
        data: &[u8],
        vaddr: VirtAddr,
        depth: u32,
        is_inst_fetch: bool,
        is_prefetch_originated: bool,
        source: usize,
    ) -> Vec<AddrPriority> {
        if is_inst_fetch || is_prefetch_originated || self.source_suppressed(source) {
            return Vec::new();
        }

        // A.4.7 step 3: the depth gate aborts the entire remaining lane
        // scan once hit, not just the current lane (see SPEC_FULL.md's
        // implementation note on this).
        if depth >= self.config.depth_threshold {
            return Vec::new();
        }
        let next_depth = if depth == 0 { 4 } else { depth + 1 };

        let mut out = Vec::new();
        let lane_count = data.len() / CDP_LANE_BYTES as usize;
        for lane in 0..lane_count {
            if out.len() >= self.config.max_pfs {
                break;
            }
            let start = lane * CDP_LANE_BYTES as usize;
            let candidate = read_lane(&data[start..start + CDP_LANE_BYTES as usize], self.endianness);

            if !is_plausible_pointer(candidate, &self.vpn_table) {
                continue;
            }

            let base = block_address(candidate);
            for (target, priority) in [
                (base, 29 + next_depth as i32),
                (base + CACHE_LINE_BYTES, 29 + next_depth as i32 - 10),
            ] {
                if self.filter.contains(target) {
                    continue;
                }
                self.filter.insert(target);
                out.push(AddrPriority {
                    addr: VirtAddr::new(target),
                    priority,
                    source: PrefetchSource::Cdp,
                });
            }
        }

        debug!(emitted = out.len(), vaddr = vaddr.val(), "cdp scan complete");
        out
    }

    /// Records a demand miss's `(vpn2, vpn1)` pair and, if it arrived with a
    /// propagated depth of 2 or 4, also scans its payload for pointers at
    /// depth 1 (A.4.7 "Trigger on demand miss").
    pub fn notify_miss(
        &mut self,
        vaddr: VirtAddr,
        propagated_depth: Option<u32>,
        payload: Option<&[u8]>,
        source: usize,
    ) -> Vec<AddrPriority> {
        let (vpn2, vpn1, _) = vpn_fields(vaddr.val());
        self.vpn_table.record_miss(vpn2, vpn1);

        match (propagated_depth, payload) {
            (Some(2) | Some(4), Some(data)) => {
                self.notify_fill(data, vaddr, 1, false, false, source)
            }
            _ => Vec::new(),
        }
    }

    /// Feedback hook: when measured accuracy drops below
    /// [`CDP_SUPPRESS_ACCURACY`], suppresses further expansion from `source`
    /// (A.4.7 "Feedback hook").
    pub fn pf_hit_notify(&mut self, accuracy: f64, source: usize) {
        if accuracy < CDP_SUPPRESS_ACCURACY {
            if let Some(flag) = self.suppressed.get_mut(source) {
                *flag = true;
                debug!(source, accuracy, "cdp source suppressed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_line_with_pointer(ptr: u64) -> Vec<u8> {
        let mut data = vec![0u8; CACHE_LINE_BYTES as usize];
        data[0..8].copy_from_slice(&ptr.to_le_bytes());
        data
    }

    #[test]
    fn rejects_pointer_not_in_vpn_table() {
        let mut cdp = CdpPrefetcher::new(CdpConfig::default());
        let ptr = 0x1_2345_6780u64;
        let line = make_line_with_pointer(ptr);
        let out = cdp.notify_fill(&line, VirtAddr::new(0x9000), 0, false, false, 0);
        assert!(out.is_empty(), "candidate must be rejected until its vpn2/vpn1 is known");
    }

    #[test]
    fn accepts_confirmed_pointer_and_emits_two_candidates() {
        let mut cdp = CdpPrefetcher::new(CdpConfig::default());
        let ptr = 0x1_2345_6780u64;
        let (vpn2, vpn1, _) = vpn_fields(ptr);
        cdp.vpn_table.record_miss(vpn2, vpn1);

        let line = make_line_with_pointer(ptr);
        let out = cdp.notify_fill(&line, VirtAddr::new(0x9000), 0, false, false, 0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].priority, 29 + 4);
        assert_eq!(out[1].priority, 29 + 4 - 10);
    }

    #[test]
    fn depth_at_threshold_emits_nothing() {
        let mut cdp = CdpPrefetcher::new(CdpConfig::default());
        let ptr = 0x1_2345_6780u64;
        let (vpn2, vpn1, _) = vpn_fields(ptr);
        cdp.vpn_table.record_miss(vpn2, vpn1);
        let line = make_line_with_pointer(ptr);
        let out = cdp.notify_fill(&line, VirtAddr::new(0x9000), CDP_DEPTH_THRESHOLD, false, false, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn zero_vpn0_is_never_emitted() {
        let mut cdp = CdpPrefetcher::new(CdpConfig::default());
        let ptr = 0xFFFF_FFFF_FFFF_E000u64; // canonical but vpn0 == 0
        let line = make_line_with_pointer(ptr);
        let out = cdp.notify_fill(&line, VirtAddr::new(0x9000), 0, false, false, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn suppressed_source_emits_nothing() {
        let mut cdp = CdpPrefetcher::new(CdpConfig::default());
        cdp.pf_hit_notify(0.01, 0);
        let ptr = 0x1_2345_6780u64;
        let (vpn2, vpn1, _) = vpn_fields(ptr);
        cdp.vpn_table.record_miss(vpn2, vpn1);
        let line = make_line_with_pointer(ptr);
        let out = cdp.notify_fill(&line, VirtAddr::new(0x9000), 0, false, false, 0);
        assert!(out.is_empty());
    }
}
