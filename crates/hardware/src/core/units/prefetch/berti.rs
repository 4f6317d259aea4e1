//! Berti: a delta-correlation prefetcher keyed by PC history (A.4.6).
//!
//! Each PC gets a bounded FIFO of recently referenced addresses and a
//! bounded multiset of observed deltas between them. When a reference hits
//! the history table, timely deltas are re-derived from that FIFO and used
//! to emit prefetch candidates ahead of the current address.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use crate::common::addr::VirtAddr;
use crate::common::constants::{
    BERTI_CONFIDENCE_DECAY_THRESHOLD, BERTI_CONFIDENT_COVERAGE, BERTI_STATUS_UPDATE_THRESHOLD,
    BERTI_TRIGGER_PHT_COVERAGE, CACHE_LINE_BYTES,
};
use crate::config::BertiConfig;
use crate::core::units::prefetch::{AddrPriority, PrefetchSource, RecentPrefetchFilter};

/// Confidence tier a delta is classified into once enough trainings have
/// accumulated (A.4.6 `searchTimelyDeltas`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaStatus {
    /// Not confident enough to prefetch.
    NoPref,
    /// Confident enough to prefetch into a lower cache level.
    L2Pref,
    /// Confident enough to prefetch directly into L1.
    L1Pref,
}

/// One observed delta and how often it has proven timely.
#[derive(Clone, Copy, Debug)]
struct DeltaEntry {
    delta: i64,
    coverage: u32,
    status: DeltaStatus,
}

/// One recorded reference in a history entry's FIFO.
#[derive(Clone, Copy, Debug)]
struct HistoryRef {
    vaddr: u64,
    timestamp: u64,
}

/// Per-PC training state (A.3 "BertiHistoryEntry").
struct BertiHistoryEntry {
    pc: u64,
    hysteresis: bool,
    counter: u32,
    history: VecDeque<HistoryRef>,
    deltas: Vec<DeltaEntry>,
    best_delta: Option<i64>,
}

impl BertiHistoryEntry {
    fn new(pc: u64) -> Self {
        Self {
            pc,
            hysteresis: true,
            counter: 0,
            history: VecDeque::new(),
            deltas: Vec::new(),
            best_delta: None,
        }
    }
}

fn hash_pc(pc: u64) -> u64 {
    pc.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32
}

fn block_index(vaddr: u64) -> i64 {
    (vaddr / CACHE_LINE_BYTES) as i64
}

/// Result of a single demand reference, beyond the emitted candidates: the
/// optional PHT side-channel address (B.5 `triggerPht`/`local_delta_pf_addr`).
pub struct BertiReference {
    /// Candidate prefetches to dispatch, if any.
    pub prefetches: Vec<AddrPriority>,
    /// Non-`None` when `trigger_pht` is enabled and this PC's `bestDelta`
    /// reached [`BERTI_TRIGGER_PHT_COVERAGE`], naming the projected address
    /// for an out-of-scope page-history-table collaborator to consume.
    pub pht_trigger: Option<VirtAddr>,
}

/// Delta-correlation prefetcher keyed by instruction PC (A.4.6).
pub struct BertiPrefetcher {
    config: BertiConfig,
    history: HashMap<u64, BertiHistoryEntry>,
    filter: RecentPrefetchFilter,
}

impl BertiPrefetcher {
    /// Creates a prefetcher with the given configuration.
    pub fn new(config: BertiConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
            filter: RecentPrefetchFilter::new(64, 6),
        }
    }

    /// Processes one demand reference, training history and emitting
    /// prefetch candidates per A.4.6's three steps.
    pub fn on_reference(
        &mut self,
        pc: u64,
        vaddr: VirtAddr,
        current_cycle: u64,
        last_fill_latency: u64,
    ) -> BertiReference {
        let key = hash_pc(pc);
        let hit = self.history.contains_key(&key);
        let mut pht_trigger = None;

        if hit {
            let entry = self.history.get_mut(&key).expect("checked contains_key above");
            pht_trigger = search_timely_deltas(
                entry,
                last_fill_latency,
                current_cycle,
                vaddr.val(),
                self.config.max_deltafound,
                self.config.deltalist_size,
                self.config.use_byte_addr,
                self.config.trigger_pht,
            );
        }

        self.update_history_table(key, pc, vaddr.val(), current_cycle);

        let prefetches = if hit {
            self.emit_candidates(key, vaddr)
        } else {
            Vec::new()
        };

        BertiReference { prefetches, pht_trigger }
    }

    fn update_history_table(&mut self, key: u64, pc: u64, vaddr: u64, current_cycle: u64) {
        if let Some(entry) = self.history.get_mut(&key) {
            let duplicate = entry.history.back().is_some_and(|r| r.vaddr == vaddr);
            if !duplicate {
                if entry.history.len() >= self.config.addrlist_size {
                    let _ = entry.history.pop_front();
                }
                entry.history.push_back(HistoryRef { vaddr, timestamp: current_cycle });
            }
            entry.hysteresis = true;
            return;
        }

        if self.history.len() >= self.config.history_table_entries {
            if let Some(victim_key) = self.pick_victim() {
                let give_another_chance = self
                    .history
                    .get(&victim_key)
                    .is_some_and(|e| e.hysteresis);
                if give_another_chance {
                    if let Some(victim) = self.history.get_mut(&victim_key) {
                        victim.hysteresis = false;
                    }
                    trace!(pc = victim_key, "berti victim granted one more chance");
                } else {
                    let _ = self.history.remove(&victim_key);
                    debug!(pc = victim_key, "berti history entry evicted");
                }
            }
            if self.history.len() >= self.config.history_table_entries {
                return;
            }
        }

        let mut entry = BertiHistoryEntry::new(pc);
        entry.history.push_back(HistoryRef { vaddr, timestamp: current_cycle });
        let _ = self.history.insert(key, entry);
    }

    fn pick_victim(&self) -> Option<u64> {
        self.history
            .iter()
            .find(|(_, e)| !e.hysteresis)
            .or_else(|| self.history.iter().next())
            .map(|(k, _)| *k)
    }

    fn emit_candidates(&mut self, key: u64, vaddr: VirtAddr) -> Vec<AddrPriority> {
        let Some(entry) = self.history.get(&key) else {
            return Vec::new();
        };

        let mut wanted: Vec<(i64, bool)> = Vec::new();
        if self.config.aggressive_pf {
            for d in &entry.deltas {
                if !matches!(d.status, DeltaStatus::NoPref) {
                    wanted.push((d.delta, matches!(d.status, DeltaStatus::L1Pref)));
                }
            }
        } else if let Some(best) = entry.best_delta {
            let confident = entry
                .deltas
                .iter()
                .find(|d| d.delta == best)
                .is_some_and(|d| d.coverage >= BERTI_CONFIDENT_COVERAGE);
            wanted.push((best, confident));
        }

        let use_byte_addr = self.config.use_byte_addr;
        let mut out = Vec::new();
        for (delta, confident) in wanted {
            let target = if use_byte_addr {
                (vaddr.val() as i64 + delta) as u64
            } else {
                ((block_index(vaddr.val()) + delta) as u64) << 6
            };
            if self.filter.contains(target) {
                continue;
            }
            self.filter.insert(target);
            out.push(AddrPriority {
                addr: VirtAddr::new(target),
                priority: if confident { 20 } else { 10 },
                source: PrefetchSource::Berti,
            });
        }

        out
    }
}

/// A.4.6 `searchTimelyDeltas`: walks the PC's history FIFO, keeps deltas
/// that are both non-trivial and timely, and periodically recomputes
/// confidence tiers and `bestDelta`.
#[allow(clippy::too_many_arguments)]
fn search_timely_deltas(
    entry: &mut BertiHistoryEntry,
    latency: u64,
    demand_cycle: u64,
    trigger_addr: u64,
    max_deltafound: usize,
    deltalist_size: usize,
    use_byte_addr: bool,
    trigger_pht: bool,
) -> Option<VirtAddr> {
    let trigger = if use_byte_addr {
        trigger_addr as i64
    } else {
        block_index(trigger_addr)
    };
    let min_delta = if use_byte_addr { CACHE_LINE_BYTES as i64 } else { 8 };

    let mut found = 0usize;
    let mut deltas_to_record = Vec::new();
    for h in entry.history.iter().rev() {
        if found >= max_deltafound {
            break;
        }
        let h_val = if use_byte_addr { h.vaddr as i64 } else { block_index(h.vaddr) };
        let delta = trigger - h_val;
        if delta.unsigned_abs() as i64 <= min_delta {
            continue;
        }
        if h.timestamp + latency >= demand_cycle {
            continue;
        }
        deltas_to_record.push(delta);
        found += 1;
    }
    for delta in deltas_to_record {
        record_delta(entry, delta, deltalist_size);
    }

    entry.counter += 1;

    let mut trigger_addr_out = None;
    if entry.counter >= BERTI_STATUS_UPDATE_THRESHOLD {
        recompute_status(entry);
        if trigger_pht {
            if let Some(best) = entry.best_delta {
                if let Some(d) = entry.deltas.iter().find(|d| d.delta == best) {
                    if d.coverage >= BERTI_TRIGGER_PHT_COVERAGE {
                        let projected = if use_byte_addr {
                            (trigger_addr as i64 + best) as u64
                        } else {
                            ((block_index(trigger_addr) + best) as u64) << 6
                        };
                        trigger_addr_out = Some(VirtAddr::new(projected));
                    }
                }
            }
        }
    }
    if entry.counter >= BERTI_CONFIDENCE_DECAY_THRESHOLD {
        for d in &mut entry.deltas {
            d.coverage = d.coverage.saturating_sub(1);
        }
        entry.counter = 0;
    }

    trigger_addr_out
}

fn record_delta(entry: &mut BertiHistoryEntry, delta: i64, deltalist_size: usize) {
    if let Some(d) = entry.deltas.iter_mut().find(|d| d.delta == delta) {
        d.coverage += 1;
        return;
    }
    if entry.deltas.len() >= deltalist_size {
        if let Some(min_idx) = entry
            .deltas
            .iter()
            .enumerate()
            .min_by_key(|(_, d)| d.coverage)
            .map(|(i, _)| i)
        {
            let _ = entry.deltas.swap_remove(min_idx);
        }
    }
    entry.deltas.push(DeltaEntry { delta, coverage: 1, status: DeltaStatus::NoPref });
}

fn recompute_status(entry: &mut BertiHistoryEntry) {
    for d in &mut entry.deltas {
        d.status = if d.coverage >= BERTI_CONFIDENT_COVERAGE {
            DeltaStatus::L1Pref
        } else if d.coverage >= BERTI_TRIGGER_PHT_COVERAGE {
            DeltaStatus::L2Pref
        } else {
            DeltaStatus::NoPref
        };
    }
    entry.best_delta = entry
        .deltas
        .iter()
        .max_by_key(|d| d.coverage)
        .map(|d| d.delta);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_on_constant_stride() {
        let config = BertiConfig { use_byte_addr: true, ..BertiConfig::default() };
        let mut berti = BertiPrefetcher::new(config);
        let pc = 0x400;
        let stride: i64 = 0x40;
        let mut addr: i64 = 0x1000;
        let mut cycle = 0u64;

        for _ in 0..8 {
            let _ = berti.on_reference(pc, VirtAddr::new(addr as u64), cycle, 1);
            addr += stride;
            cycle += 4;
        }

        let key = hash_pc(pc);
        let entry = berti.history.get(&key).expect("pc must be resident");
        assert_eq!(entry.best_delta, Some(stride), "bestDelta must converge to the stride");
    }

    #[test]
    fn emits_no_candidates_on_first_reference() {
        let mut berti = BertiPrefetcher::new(BertiConfig::default());
        let result = berti.on_reference(0x800, VirtAddr::new(0x2000), 0, 1);
        assert!(result.prefetches.is_empty());
    }

    #[test]
    fn aggressive_mode_can_emit_multiple_candidates() {
        let config = BertiConfig { use_byte_addr: true, aggressive_pf: true, ..BertiConfig::default() };
        let mut berti = BertiPrefetcher::new(config);
        let pc = 0x900;
        for (addr, cycle) in [(0x1000u64, 0u64), (0x1040, 4), (0x2000, 8), (0x1080, 12), (0x2040, 16)] {
            let _ = berti.on_reference(pc, VirtAddr::new(addr), cycle, 1);
        }
        let result = berti.on_reference(pc, VirtAddr::new(0x10C0), 20, 1);
        assert!(!result.prefetches.is_empty());
    }
}
