//! Statistics collection and reporting for the HTLB and prefetch engines.
//!
//! This module tracks performance metrics the rest of the crate is silent
//! about by design (A.4.2/A.4.3 "increments read/write hit/miss counters").
//! It provides:
//! 1. **HTLB hit/miss counters:** per partition, split by read/write.
//! 2. **Berti delta histogram:** a bounded tally of recently-confirmed deltas (B.5).
//! 3. **CDP counters:** candidates issued and per-source suppressions.

use std::time::Instant;

/// Per-partition hit/miss counters (A.4.2's "increments read/write hit/miss
/// counters as appropriate").
#[derive(Clone, Copy, Debug, Default)]
pub struct PartitionStats {
    /// Read hits against this partition.
    pub read_hits: u64,
    /// Read misses against this partition.
    pub read_misses: u64,
    /// Write hits against this partition.
    pub write_hits: u64,
    /// Write misses against this partition.
    pub write_misses: u64,
}

impl PartitionStats {
    fn total(&self) -> u64 {
        self.read_hits + self.read_misses + self.write_hits + self.write_misses
    }

    fn hit_rate(&self) -> f64 {
        let hits = self.read_hits + self.write_hits;
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            100.0 * hits as f64 / total as f64
        }
    }
}

/// HTLB statistics: one [`PartitionStats`] per cache level/partition, plus a
/// page-walk counter (gem5 `TlbStats`, B.5).
#[derive(Clone, Copy, Debug, Default)]
pub struct HtlbStats {
    start_time: Option<Instant>,
    /// L1 TLB counters.
    pub l1: PartitionStats,
    /// `l2l1` partition counters.
    pub l2l1: PartitionStats,
    /// `l2l2` partition counters.
    pub l2l2: PartitionStats,
    /// `l2l3` partition counters.
    pub l2l3: PartitionStats,
    /// Shared `l2sp1`/`l2sp2` partition counters.
    pub l2sp: PartitionStats,
    /// Number of page-table walks dispatched (on complete L2TLB miss).
    pub page_walks: u64,
    /// Number of structural demaps/flushes performed.
    pub invalidations: u64,
}

impl HtlbStats {
    /// Creates a zeroed stats block with the clock started now.
    pub fn new() -> Self {
        Self { start_time: Some(Instant::now()), ..Default::default() }
    }

    /// Prints a summary to stdout, following the teacher crate's
    /// `==...==` bannered section convention.
    pub fn print(&self) {
        println!("\n==========================================================");
        println!("HTLB STATISTICS");
        println!("==========================================================");
        let print_partition = |name: &str, p: &PartitionStats| {
            println!(
                "  {:<6} accesses: {:<10} | hit_rate: {:.2}%",
                name,
                p.total(),
                p.hit_rate()
            );
        };
        print_partition("L1", &self.l1);
        print_partition("l2l1", &self.l2l1);
        print_partition("l2l2", &self.l2l2);
        print_partition("l2l3", &self.l2l3);
        print_partition("l2sp", &self.l2sp);
        println!("  page_walks             {}", self.page_walks);
        println!("  invalidations          {}", self.invalidations);
        println!("==========================================================");
    }
}

/// Bounded tally of recently-confirmed Berti deltas, kept for reporting
/// beyond each PC's own per-entry `deltas` table (B.5 "Berti's delta
/// histogram as a bounded tally").
#[derive(Clone, Debug, Default)]
pub struct BertiStats {
    /// `(delta, times confirmed timely)`, capped at `capacity` entries.
    histogram: Vec<(i64, u64)>,
    capacity: usize,
    /// Total number of prefetch candidates emitted.
    pub prefetches_issued: u64,
    /// Total number of history-table entries evicted (hysteresis exhausted).
    pub history_evictions: u64,
}

impl BertiStats {
    /// Creates an empty histogram capped at `capacity` distinct deltas.
    pub fn new(capacity: usize) -> Self {
        Self { histogram: Vec::new(), capacity, prefetches_issued: 0, history_evictions: 0 }
    }

    /// Records a confirmed-timely observation of `delta`, evicting the
    /// least-confirmed tracked delta if the histogram is full.
    pub fn record_delta(&mut self, delta: i64) {
        if let Some(slot) = self.histogram.iter_mut().find(|(d, _)| *d == delta) {
            slot.1 += 1;
            return;
        }
        if self.histogram.len() >= self.capacity {
            if let Some(min_idx) = self
                .histogram
                .iter()
                .enumerate()
                .min_by_key(|(_, (_, count))| *count)
                .map(|(i, _)| i)
            {
                let _ = self.histogram.swap_remove(min_idx);
            }
        }
        self.histogram.push((delta, 1));
    }

    /// The most frequently confirmed delta, if any have been recorded.
    pub fn top_delta(&self) -> Option<i64> {
        self.histogram.iter().max_by_key(|(_, count)| *count).map(|(d, _)| *d)
    }
}

/// CDP issued/suppressed counters (A.4.7 "Feedback hook").
#[derive(Clone, Copy, Debug, Default)]
pub struct CdpStats {
    /// Candidates emitted from cache-fill scans.
    pub issued_from_fill: u64,
    /// Candidates emitted from demand-miss payload scans.
    pub issued_from_miss: u64,
    /// Number of sources suppressed by `pf_hit_notify`.
    pub sources_suppressed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_hit_rate_ignores_empty_partition() {
        let stats = PartitionStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn berti_histogram_tracks_top_delta() {
        let mut hist = BertiStats::new(2);
        hist.record_delta(0x40);
        hist.record_delta(0x40);
        hist.record_delta(0x80);
        assert_eq!(hist.top_delta(), Some(0x40));
    }

    #[test]
    fn berti_histogram_evicts_least_confirmed_when_full() {
        let mut hist = BertiStats::new(1);
        hist.record_delta(0x40);
        hist.record_delta(0x80);
        assert_eq!(hist.top_delta(), Some(0x80));
    }
}
