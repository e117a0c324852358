//! Deterministic pseudo-random number generator.
//!
//! A xorshift64 generator plus a splitmix64 keying step. Row designs and the
//! dense constraint rows are derived from `(id, seed)` key pairs, so encoder and
//! decoder sessions rebuild identical matrices without exchanging them.
//!
//! # Determinism
//!
//! Given the same key, the sequence of generated numbers is always identical on
//! every platform. All arithmetic is wrapping 64-bit integer arithmetic.

/// A deterministic pseudo-random number generator using xorshift64.
///
/// It is NOT cryptographically secure.
#[derive(Debug, Clone)]
pub struct DetRng {
    state: u64,
}

/// One round of the splitmix64 finalizer.
///
/// Used to spread small, highly correlated keys (row ids, seeds) over the
/// whole 64-bit state space before xorshift takes over.
#[must_use]
pub const fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// 64-bit key derived from an integer pair.
#[must_use]
pub const fn key_pair(x: u32, y: u32) -> u64 {
    splitmix64(splitmix64(y as u64).wrapping_add(x as u64))
}

impl DetRng {
    /// Creates a new PRNG with the given seed.
    ///
    /// The seed must be non-zero. If zero is provided, it will be replaced with 1.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Creates a PRNG keyed by an integer pair.
    ///
    /// `(x, y)` and `(y, x)` produce unrelated streams.
    #[must_use]
    pub const fn from_key_pair(x: u32, y: u32) -> Self {
        Self::new(key_pair(x, y))
    }

    /// Generates the next pseudo-random u64 value.
    #[allow(clippy::missing_const_for_fn)] // Cannot be const: mutates self
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64 algorithm
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Generates a pseudo-random u32 value from the high half of the next u64.
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_sequence() {
        let mut rng1 = DetRng::new(42);
        let mut rng2 = DetRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn zero_seed_handled() {
        let mut rng = DetRng::new(0);
        assert_ne!(rng.next_u64(), 0);
    }

    #[test]
    fn splitmix_reference_values() {
        assert_eq!(splitmix64(0), 0xe220_a839_7b1d_cdaf);
        assert_eq!(splitmix64(42), 0xbdd7_3226_2feb_6e95);
    }

    #[test]
    fn key_pair_stream_is_pinned() {
        // Row designs depend on this exact stream; changing it changes every code.
        let mut rng = DetRng::from_key_pair(7, 42);
        assert_eq!(rng.next_u32(), 2_751_248_713);
        assert_eq!(rng.next_u32(), 1_418_890_977);
        assert_eq!(rng.next_u32(), 1_548_230_502);
    }

    #[test]
    fn key_pair_is_ordered() {
        let mut a = DetRng::from_key_pair(1, 2);
        let mut b = DetRng::from_key_pair(2, 1);
        assert_ne!(a.next_u64(), b.next_u64());
    }
}
