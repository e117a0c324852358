//! Row and column generator.
//!
//! Every row of the generator matrix is described by a handful of integers
//! drawn from a PRNG keyed by `(row_id, seed)`. The columns themselves are never
//! stored: they are re-walked on demand with a stepped modular walk over the
//! next prime above the domain size, folded back into range when the walk
//! lands past the last real column.
//!
//! ```text
//! (row_id, seed) ──► DetRng ──► weight, step, start ──► ColumnWalk ──► columns
//! ```

use super::weight::sample_weight;
use super::CodecError;
use crate::util::{key_pair, splitmix64, DetRng};

/// Largest supported message block count.
///
/// Column and row indices are 16-bit; the top of the range is reserved for
/// list terminators.
pub const MAX_BLOCK_COUNT: u16 = 64_000;

/// Largest supported check (dense) block count.
pub const MAX_CHECK_BLOCKS: u16 = 64_000;

/// Smallest odd number at or above `n | 1` with no odd divisor.
///
/// Even inputs are bumped to the next odd value first, so the result is never 2.
#[must_use]
pub fn next_prime(n: u32) -> u32 {
    let mut n = n | 1;
    loop {
        if is_odd_prime(n) {
            return n;
        }
        n += 2;
    }
}

fn is_odd_prime(n: u32) -> bool {
    let mut p = 3u32;
    while p * p <= n {
        if n % p == 0 {
            return false;
        }
        p += 2;
    }
    true
}

// ============================================================================
// Column walk
// ============================================================================

/// Iterator over the distinct columns of one row.
///
/// Emits `start`, then repeatedly steps by `step` modulo `prime`. A step that
/// lands at or beyond `domain` is folded back with
/// `((step << 16) + x - prime) % step`, which keeps the walk rejection-free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnWalk {
    next: u64,
    step: u64,
    prime: u64,
    domain: u64,
    remaining: u16,
}

impl ColumnWalk {
    /// Creates a walk of `count` columns over `0..domain`.
    #[must_use]
    pub fn new(start: u16, step: u16, count: u16, domain: u16, prime: u32) -> Self {
        Self {
            next: u64::from(start),
            step: u64::from(step),
            prime: u64::from(prime),
            domain: u64::from(domain),
            remaining: count,
        }
    }

    /// Number of columns this walk yields in total.
    #[must_use]
    pub const fn remaining(&self) -> u16 {
        self.remaining
    }
}

impl Iterator for ColumnWalk {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next;
        if self.remaining > 0 {
            let mut x = (current + self.step) % self.prime;
            if x >= self.domain {
                x = ((self.step << 16) + x - self.prime) % self.step;
            }
            self.next = x;
        }
        Some(current as u16)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::from(self.remaining);
        (n, Some(n))
    }
}

impl ExactSizeIterator for ColumnWalk {}

// ============================================================================
// Row design
// ============================================================================

/// The regenerable description of a single matrix row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDesign {
    /// Walk over the K peeling columns.
    pub peel: ColumnWalk,
    /// Walk over the M mixing (dense) columns.
    pub mix: ColumnWalk,
}

impl RowDesign {
    /// Peeling columns of this row.
    #[must_use]
    pub fn peel_columns(&self) -> ColumnWalk {
        self.peel.clone()
    }

    /// Mixing columns of this row, in `0..M`.
    #[must_use]
    pub fn mix_columns(&self) -> ColumnWalk {
        self.mix.clone()
    }

    /// Number of peeling columns.
    #[must_use]
    pub const fn peel_weight(&self) -> u16 {
        self.peel.remaining()
    }

    /// Number of mixing columns.
    #[must_use]
    pub const fn mix_weight(&self) -> u16 {
        self.mix.remaining()
    }
}

/// Matrix design for one `(K, M, seed)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Design {
    block_count: u16,
    check_blocks: u16,
    seed: u32,
    peel_prime: u32,
    mix_prime: u32,
    mix_weight: u16,
}

impl Design {
    /// Validates the parameters and precomputes the walk primes.
    pub fn new(block_count: u16, check_blocks: u16, seed: u32) -> Result<Self, CodecError> {
        if !(2..=MAX_BLOCK_COUNT).contains(&block_count) {
            return Err(CodecError::invalid_params(format!(
                "block count {block_count} outside 2..={MAX_BLOCK_COUNT}"
            )));
        }
        if !(2..=MAX_CHECK_BLOCKS).contains(&check_blocks) {
            return Err(CodecError::invalid_params(format!(
                "check block count {check_blocks} outside 2..={MAX_CHECK_BLOCKS}"
            )));
        }
        Ok(Self {
            block_count,
            check_blocks,
            seed,
            peel_prime: next_prime(u32::from(block_count)),
            mix_prime: next_prime(u32::from(check_blocks)),
            mix_weight: if check_blocks > 3 { 3 } else { check_blocks - 1 },
        })
    }

    /// K: message block count.
    #[must_use]
    pub const fn block_count(&self) -> u16 {
        self.block_count
    }

    /// M: dense column count.
    #[must_use]
    pub const fn check_blocks(&self) -> u16 {
        self.check_blocks
    }

    /// Generator seed.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// K + M: number of intermediate blocks.
    #[must_use]
    pub const fn intermediate_count(&self) -> usize {
        self.block_count as usize + self.check_blocks as usize
    }

    /// Regenerates the design of row `id`.
    ///
    /// Ids at or above K describe synthetic rows for extra output blocks.
    #[must_use]
    pub fn row(&self, id: u32) -> RowDesign {
        let k = self.block_count;
        let m = self.check_blocks;
        let mut rng = DetRng::from_key_pair(id, self.seed);

        let peel_weight = sample_weight(rng.next_u32(), k - 1);
        let rv = rng.next_u32();
        let peel_step = ((rv & 0xffff) % u32::from(k - 1) + 1) as u16;
        let peel_start = ((rv >> 16) % u32::from(k)) as u16;

        let rv = rng.next_u32();
        let mix_step = ((rv & 0xffff) % u32::from(m - 1) + 1) as u16;
        let mix_start = ((rv >> 16) % u32::from(m)) as u16;

        RowDesign {
            peel: ColumnWalk::new(peel_start, peel_step, peel_weight, k, self.peel_prime),
            mix: ColumnWalk::new(mix_start, mix_step, self.mix_weight, m, self.mix_prime),
        }
    }

    /// Packed words per dense row over the K peeling columns.
    #[must_use]
    pub const fn dense_pitch(&self) -> usize {
        (self.block_count as usize).div_ceil(64)
    }

    /// Stream of the M dense constraint rows.
    #[must_use]
    pub fn dense_rows(&self) -> DenseRows {
        let k = usize::from(self.block_count);
        let tail = k % 64;
        DenseRows {
            state: key_pair(self.seed, !u32::from(self.block_count)),
            pitch: self.dense_pitch(),
            last_mask: if tail == 0 { u64::MAX } else { (1u64 << tail) - 1 },
            remaining: self.check_blocks,
        }
    }
}

/// Golden-ratio increment of the splitmix64 counter.
const SPLITMIX_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Generator for the dense rows, keyed by `(seed, !K)`.
///
/// Words come from a splitmix64 counter rather than xorshift: xorshift is
/// linear over GF(2), so rows cut from it span at most 64 dimensions.
#[derive(Debug, Clone)]
pub struct DenseRows {
    state: u64,
    pitch: usize,
    last_mask: u64,
    remaining: u16,
}

impl DenseRows {
    /// Writes the next dense row into `out[..pitch]`.
    ///
    /// Returns `false` once all M rows have been produced.
    pub fn fill_next(&mut self, out: &mut [u64]) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        for word in &mut out[..self.pitch] {
            *word = splitmix64(self.state);
            self.state = self.state.wrapping_add(SPLITMIX_GAMMA);
        }
        out[self.pitch - 1] &= self.last_mask;
        true
    }
}
