//! Translation key construction (A.3 "Key").
//!
//! `Key = (asid << 48) | vpn`; the trie performs longest-prefix match on the
//! high `MAX_KEY_BITS - logBytes` bits of this value, so entries installed
//! for larger pages cover wider, less-specific prefixes.

use crate::common::constants::MAX_KEY_BITS;

/// Shift applied to the ASID before it is OR'd with the VPN to form a [`TlbKey`].
const ASID_SHIFT: u32 = 48;

/// The `(asid, vpn)` composite key the trie indexes.
pub type TlbKey = u64;

/// Builds the translation key for a `(vpn, asid)` pair (A.3 "Key").
#[inline]
pub fn build_key(vpn: u64, asid: u16) -> TlbKey {
    ((asid as u64) << ASID_SHIFT) | vpn
}

/// The number of high bits of a [`TlbKey`] that are significant for an entry
/// whose page size is `log_bytes` bytes (`logBytes` in A.3/A.4.1 terms).
///
/// `MAX_KEY_BITS - log_bytes` collapses to `64 - (log_bytes - 12)` for every
/// valid Sv39 `log_bytes` (12, 21, 30): the ASID half of the key is always
/// fully significant, and only the super-page's low, "don't care" VPN bits
/// are masked away.
#[inline]
pub fn significant_bits(log_bytes: u32) -> u32 {
    MAX_KEY_BITS - log_bytes
}

/// Masks `key` down to its top `width` significant bits, zeroing the rest.
#[inline]
pub fn mask_to_width(key: TlbKey, width: u32) -> TlbKey {
    if width >= 64 {
        key
    } else {
        key & (u64::MAX << (64 - width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::{LOG_BYTES_1G, LOG_BYTES_2M, LOG_BYTES_4K};

    #[test]
    fn significant_bits_matches_page_sizes() {
        assert_eq!(significant_bits(LOG_BYTES_4K), 64);
        assert_eq!(significant_bits(LOG_BYTES_2M), 55);
        assert_eq!(significant_bits(LOG_BYTES_1G), 46);
    }

    #[test]
    fn build_key_packs_asid_high() {
        let key = build_key(0x1_2345, 7);
        assert_eq!(key >> ASID_SHIFT, 7);
        assert_eq!(key & ((1u64 << ASID_SHIFT) - 1), 0x1_2345);
    }

    #[test]
    fn mask_to_width_drops_superpage_bits() {
        let key = build_key(0b11_1111_1111, 0);
        let masked = mask_to_width(key, significant_bits(LOG_BYTES_2M));
        assert_eq!(masked & 0x1FF, 0, "low 9 VPN bits must be don't-care for a 2 MiB entry");
    }
}
