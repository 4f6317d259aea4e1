//! Global System Constants.
//!
//! This module defines system-wide constants for Sv39 address translation,
//! the L2TLB partition index formulas, and the prefetch engines. It includes:
//! 1. **Memory Constants:** Page sizes, masks, and shifts for address translation.
//! 2. **Sv39 Constants:** Page-table level widths and canonical-address bit position.
//! 3. **L2TLB Constants:** Link-group size and per-partition index formulas.
//! 4. **Prefetch Constants:** Berti and CDP tuning thresholds.

/// Page size in bytes (4 KiB).
pub const PAGE_SIZE: u64 = 4096;

/// Number of bits to shift to convert between bytes and pages.
pub const PAGE_SHIFT: u64 = 12;

/// Mask for extracting the page offset from an address.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

/// Mask for extracting the virtual page number (VPN) from an address.
pub const VPN_MASK: u64 = 0x7FF_FFFF;

/// Number of significant virtual-address bits in Sv39 (bit 38 is the sign bit).
pub const SV39_VA_BITS: u64 = 39;

/// Number of Sv39 page-table levels (VPN\[2\], VPN\[1\], VPN\[0\]).
pub const SV39_LEVELS: u32 = 3;

/// Width in bits of a single Sv39 VPN field.
pub const VPN_FIELD_BITS: u32 = 9;

/// Mask for a single 9-bit Sv39 VPN field.
pub const VPN_FIELD_MASK: u64 = (1 << VPN_FIELD_BITS) - 1;

/// `logBytes` of a 4 KiB leaf page (Sv39 level 0).
pub const LOG_BYTES_4K: u32 = 12;
/// `logBytes` of a 2 MiB super-page (Sv39 level 1).
pub const LOG_BYTES_2M: u32 = 21;
/// `logBytes` of a 1 GiB super-page (Sv39 level 2).
pub const LOG_BYTES_1G: u32 = 30;

/// Width, in bits, of the `(asid << 48) | vpn` translation key (A.3 "Key").
///
/// `significantBits = MAX_KEY_BITS - logBytes` reduces to "all 64 key bits
/// minus the super-page's don't-care low VPN bits" for every valid
/// `logBytes` in `{12, 21, 30}`: a 4 KiB entry is fully significant
/// (`64 - (12 - 12) = 64`), a 2 MiB entry discards the low 9 VPN bits
/// (`64 - (21 - 12) = 55`), a 1 GiB entry discards the low 18
/// (`64 - (30 - 12) = 46`).
pub const MAX_KEY_BITS: u32 = 76;

/// Number of entries in a single "link group" (A.3 link-group invariant).
pub const LINK_GROUP_SIZE: usize = 8;

/// Bit shift for the 2 MiB partition's set-associative-by-hash index.
pub const L2_INDEX_SHIFT: u64 = 24;
/// Mask for the 2 MiB partition's set-associative-by-hash index (32 sets).
pub const L2_INDEX_MASK: u64 = 0x1F;
/// Maximum resident groups sharing one `l2_index` value before eviction is a logic error.
pub const L2_INDEX_MAX_GROUPS: usize = 2;

/// Bit shift for the 4 KiB partition's set-associative-by-hash index.
pub const L3_INDEX_SHIFT: u64 = 15;
/// Mask for the 4 KiB partition's set-associative-by-hash index (128 sets).
pub const L3_INDEX_MASK: u64 = 0x7F;
/// Maximum resident groups sharing one `l3_index` value before eviction is a logic error.
pub const L3_INDEX_MAX_GROUPS: usize = 4;

/// Default Berti history-per-PC capacity (`addrlist_size`).
pub const DEFAULT_BERTI_ADDRLIST_SIZE: usize = 8;
/// Default Berti per-PC delta-table capacity (`deltalist_size`).
pub const DEFAULT_BERTI_DELTALIST_SIZE: usize = 4;
/// Default maximum timely deltas collected per search (`max_deltafound`).
pub const DEFAULT_BERTI_MAX_DELTAFOUND: usize = 4;
/// Training rounds before Berti recomputes delta status and `bestDelta`.
pub const BERTI_STATUS_UPDATE_THRESHOLD: u32 = 6;
/// Training rounds before Berti decays confidence (A.4.6 `searchTimelyDeltas`).
pub const BERTI_CONFIDENCE_DECAY_THRESHOLD: u32 = 16;
/// Coverage counter at or above which a delta is reported "confident".
pub const BERTI_CONFIDENT_COVERAGE: u32 = 8;
/// Coverage counter at or above which Berti's PHT side-channel fires (B.5).
pub const BERTI_TRIGGER_PHT_COVERAGE: u32 = 5;

/// CDP pointer-chase depth cap (A.4.7, hardcoded to 3 in the source this is modeled on).
pub const CDP_DEPTH_THRESHOLD: u32 = 3;
/// CDP accuracy threshold below which `pfHitNotify` suppresses a source (A.4.7).
pub const CDP_SUPPRESS_ACCURACY: f64 = 0.1;
/// Cache-line size in bytes CDP scans 8-byte lanes from.
pub const CACHE_LINE_BYTES: u64 = 64;
/// Byte width of one CDP pointer-scan lane.
pub const CDP_LANE_BYTES: u64 = 8;
