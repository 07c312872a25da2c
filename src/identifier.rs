//! Ring arithmetic on an m-bit identifier space.
//!
//! All routing, ownership tests, and finger-target computation funnel
//! through [`in_interval`]. Mis-handling the wrap-around case is the most
//! common protocol bug in Chord implementations; callers must not reason
//! about ring position any other way.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::rng::DeterministicRng;

/// A point on the identifier ring. Backed by an arbitrary-precision
/// unsigned integer so that `m` can range from the 8-bit rings used in
/// tests up to the production default of 160 bits without a dedicated
/// fixed-width type.
pub type Identifier = BigUint;

/// `2^bits`, the size of the identifier space.
pub fn modulus(bits: u32) -> BigUint {
    BigUint::one() << bits
}

/// `(a + b) mod 2^bits`.
pub fn mod_add(a: &Identifier, b: &Identifier, bits: u32) -> Identifier {
    (a + b) % modulus(bits)
}

/// `(a - b) mod 2^bits`.
pub fn mod_sub(a: &Identifier, b: &Identifier, bits: u32) -> Identifier {
    let m = modulus(bits);
    (&m + a - b) % m
}

/// `(id + 2^exp) mod 2^bits`, the target identifier for finger table slot `exp`.
pub fn finger_start(id: &Identifier, exp: u32, bits: u32) -> Identifier {
    mod_add(id, &(BigUint::one() << exp), bits)
}

/// Returns whether `key` lies on the clockwise arc from `start` to `end`.
///
/// `inc_start`/`inc_end` control endpoint inclusion. When `start == end`
/// the arc is either empty (both endpoints excluded) or the entire ring
/// (either endpoint included) — this is a deliberate special case absent
/// from the naive wrap-around test, which otherwise treats a zero-width
/// exclusive interval as spanning the whole ring.
pub fn in_interval(
    key: &Identifier,
    start: &Identifier,
    end: &Identifier,
    inc_start: bool,
    inc_end: bool,
    bits: u32,
) -> bool {
    let m = modulus(bits);
    let key = key % &m;
    let start = start % &m;
    let end = end % &m;

    if start == end {
        return inc_start || inc_end;
    }

    if key == start {
        return inc_start;
    }
    if key == end {
        return inc_end;
    }

    if start < end {
        start < key && key < end
    } else {
        key > start || key < end
    }
}

/// Draws a uniformly random identifier with exactly `bits` random bits.
pub fn random_identifier(rng: &mut DeterministicRng, bits: u32) -> Identifier {
    let mut value = BigUint::zero();
    let mut produced = 0u32;
    while produced < bits {
        let take = (bits - produced).min(64);
        let mut word = rng.next_u64();
        if take < 64 {
            word &= (1u64 << take) - 1;
        }
        value += BigUint::from(word) << produced;
        produced += take;
    }
    value
}

/// Binary-search the authoritative owner of `key` in a sorted ring of
/// active node identifiers: the first id greater than or equal to `key`,
/// wrapping to the smallest id if `key` is past the last entry.
pub fn owner_in_ring(ring: &[Identifier], key: &Identifier) -> Identifier {
    let idx = ring.partition_point(|id| id < key);
    if idx == ring.len() {
        ring[0].clone()
    } else {
        ring[idx].clone()
    }
}

/// `ceil(log2(n))`, floored at 0 for `n <= 1`.
pub fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u64) -> Identifier {
        BigUint::from(v)
    }

    #[test]
    fn ordinary_interval_excludes_both_endpoints_by_default() {
        assert!(!in_interval(&id(3), &id(3), &id(7), false, false, 8));
        assert!(!in_interval(&id(7), &id(3), &id(7), false, false, 8));
        assert!(in_interval(&id(5), &id(3), &id(7), false, false, 8));
    }

    #[test]
    fn ordinary_interval_respects_inclusion_flags() {
        assert!(in_interval(&id(3), &id(3), &id(7), true, false, 8));
        assert!(in_interval(&id(7), &id(3), &id(7), false, true, 8));
    }

    #[test]
    fn wrapping_interval_spans_through_zero() {
        // 8-bit ring, arc from 250 clockwise to 5 wraps through 0.
        assert!(in_interval(&id(253), &id(250), &id(5), false, false, 8));
        assert!(in_interval(&id(2), &id(250), &id(5), false, false, 8));
        assert!(!in_interval(&id(10), &id(250), &id(5), false, false, 8));
    }

    #[test]
    fn zero_width_interval_is_empty_when_both_endpoints_excluded() {
        for x in 0u64..=255 {
            assert!(!in_interval(&id(x), &id(42), &id(42), false, false, 8));
        }
    }

    #[test]
    fn zero_width_interval_spans_whole_ring_when_either_endpoint_included() {
        for x in 0u64..=255 {
            assert!(in_interval(&id(x), &id(42), &id(42), true, true, 8));
            assert!(in_interval(&id(x), &id(42), &id(42), true, false, 8));
            assert!(in_interval(&id(x), &id(42), &id(42), false, true, 8));
        }
    }

    #[test]
    fn mod_add_and_mod_sub_wrap() {
        assert_eq!(mod_add(&id(250), &id(10), 8), id(4));
        assert_eq!(mod_sub(&id(4), &id(10), 8), id(250));
    }

    #[test]
    fn identifier_wrap_at_ring_boundary() {
        let ring = vec![id(0), id(16), id(200)];
        assert_eq!(owner_in_ring(&ring, &id(0)), id(0));
        assert_eq!(owner_in_ring(&ring, &id(255)), id(0));
        assert_eq!(owner_in_ring(&ring, &id(17)), id(200));
    }

    #[test]
    fn ceil_log2_matches_expected_values() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4096), 12);
        assert_eq!(ceil_log2(4097), 13);
    }

    #[test]
    fn random_identifier_stays_within_bits() {
        let mut rng = DeterministicRng::new(7);
        for _ in 0..50 {
            let v = random_identifier(&mut rng, 16);
            assert!(v < modulus(16));
        }
    }
}
