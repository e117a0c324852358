//! Elimination and back-substitution.
//!
//! [`SolvePlan::build`] performs every structural step (peeling, greedy
//! deferral, compression and Gaussian elimination) without touching block
//! data. [`SolvePlan::solve`] then replays the recorded operations on real
//! blocks:
//!
//! 1. **Forward**: each GE pivot's value is its right-hand side (message blocks
//!    named by the deferred row and the compress-row markers) XOR the values of
//!    the earlier pivots that were eliminated into it.
//! 2. **Diagonal**: from the last pivot back to the first, pivot rows are XORed
//!    into earlier rows that still carry their bit, leaving the identity.
//! 3. **Substitute**: peeled columns are computed from their solving rows,
//!    oldest peel first, now that every other column they touch is known.
//!
//! Elimination keeps the GE matrix strictly upper-triangular by recording
//! each row operation in a separate lower matrix instead of in the GE rows.

use serde::{Deserialize, Serialize};

use super::bits::BitMatrix;
use super::block::{xor_into, BlockStore};
use super::compress::Compression;
use super::generator::Design;
use super::peel::PeelOutcome;
use super::CodecError;
use crate::tracing_compat::{debug, warn};

// ============================================================================
// Statistics
// ============================================================================

/// Counters collected while solving, useful for tuning and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveStats {
    /// K: message blocks.
    pub block_count: usize,
    /// M: dense check blocks.
    pub check_blocks: usize,
    /// Generator seed.
    pub seed: u32,
    /// Rows resolved by peeling.
    pub peeled: usize,
    /// Rows (and columns) deferred to elimination.
    pub deferred: usize,
    /// Columns chosen by greedy deferral.
    pub greedy_picks: usize,
    /// Row visits made by avalanches.
    pub avalanche_steps: usize,
    /// R = deferred + M: side of the GE matrix.
    pub ge_size: usize,
    /// Compress-row updates while folding peeled rows.
    pub fold_xors: usize,
    /// Row XORs during triangularization.
    pub elimination_xors: usize,
    /// Block XORs during back-substitution.
    pub block_xors: usize,
}

impl SolveStats {
    /// Fraction of rows that needed elimination.
    #[must_use]
    pub fn deferral_ratio(&self) -> f64 {
        if self.block_count == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let deferred = self.deferred as f64;
            #[allow(clippy::cast_precision_loss)]
            let total = self.block_count as f64;
            deferred / total
        }
    }
}

impl std::fmt::Display for SolveStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SolveStats(K={}, M={}, seed={}, peeled={}, deferred={}, R={}, \
             greedy={}, elim_xors={}, block_xors={})",
            self.block_count,
            self.check_blocks,
            self.seed,
            self.peeled,
            self.deferred,
            self.ge_size,
            self.greedy_picks,
            self.elimination_xors,
            self.block_xors,
        )
    }
}

// ============================================================================
// Triangularization
// ============================================================================

/// Pivot permutation and recorded row operations.
#[derive(Debug, Clone)]
struct Triangle {
    /// `pivots[p]` is the physical GE row holding pivot `p`.
    pivots: Vec<usize>,
    /// Bit `(x, p)` set when pivot row `p` was XORed into row `x`.
    lower: BitMatrix,
    xors: usize,
}

/// Gaussian elimination over GF(2) on a square packed matrix.
///
/// Rows are never moved; only `pivots` is permuted. Fails with
/// [`CodecError::SingularMatrix`] when some column has no pivot.
fn triangulate(ge: &mut BitMatrix) -> Result<Triangle, CodecError> {
    let r = ge.rows();
    let mut pivots: Vec<usize> = (0..r).collect();
    let mut lower = BitMatrix::try_zeros(r, r)?;
    let mut xors = 0usize;

    for p in 0..r {
        let Some(found) = (p..r).find(|&q| ge.get(pivots[q], p)) else {
            warn!(pivot = p, size = r, "generator matrix is singular");
            return Err(CodecError::SingularMatrix { pivot: p, size: r });
        };
        pivots.swap(p, found);

        let pivot_row = pivots[p];
        let from_word = p / 64;
        for &row in &pivots[p + 1..] {
            if ge.get(row, p) {
                ge.xor_row(row, pivot_row, from_word);
                lower.set(row, p);
                xors += 1;
            }
        }
    }

    Ok(Triangle {
        pivots,
        lower,
        xors,
    })
}

// ============================================================================
// Plan
// ============================================================================

/// A fully eliminated generator matrix, ready to be applied to block data.
#[derive(Debug, Clone)]
pub struct SolvePlan {
    design: Design,
    peel: PeelOutcome,
    compression: Compression,
    triangle: Triangle,
    stats: SolveStats,
}

impl SolvePlan {
    /// Runs all structural phases for `design`.
    pub fn build(design: &Design) -> Result<Self, CodecError> {
        let peel = PeelOutcome::solve(design)?;
        let mut compression = Compression::build(design, &peel)?;
        let triangle = triangulate(compression.ge_mut())?;

        let stats = SolveStats {
            block_count: usize::from(design.block_count()),
            check_blocks: usize::from(design.check_blocks()),
            seed: design.seed(),
            peeled: peel.peeled_count(),
            deferred: peel.deferred_count(),
            greedy_picks: peel.greedy_picks(),
            avalanche_steps: peel.avalanche_steps(),
            ge_size: compression.ge_size(),
            fold_xors: compression.fold_xors(),
            elimination_xors: triangle.xors,
            block_xors: 0,
        };
        debug!(
            ge_size = stats.ge_size,
            elimination_xors = stats.elimination_xors,
            "elimination complete"
        );

        Ok(Self {
            design: design.clone(),
            peel,
            compression,
            triangle,
            stats,
        })
    }

    /// The design this plan was built from.
    #[must_use]
    pub const fn design(&self) -> &Design {
        &self.design
    }

    /// Structural statistics.
    #[must_use]
    pub const fn stats(&self) -> &SolveStats {
        &self.stats
    }

    /// Peeling result.
    #[must_use]
    pub const fn peel(&self) -> &PeelOutcome {
        &self.peel
    }

    /// Pivot-to-row permutation.
    #[must_use]
    pub fn pivots(&self) -> &[usize] {
        &self.triangle.pivots
    }

    /// Checks that the permuted GE matrix is upper-triangular with a unit diagonal.
    #[must_use]
    pub fn is_upper_triangular(&self) -> bool {
        let ge = self.compression.ge();
        self.triangle
            .pivots
            .iter()
            .enumerate()
            .all(|(p, &row)| ge.ones(row).next() == Some(p))
    }

    /// Computes the K + M intermediate blocks for `message`.
    ///
    /// `message` must hold exactly K blocks. Consumes the plan: the diagonal
    /// pass rewrites the GE matrix.
    pub fn solve(mut self, message: &BlockStore) -> Result<(BlockStore, SolveStats), CodecError> {
        let k = usize::from(self.design.block_count());
        if message.count() != k {
            return Err(CodecError::invalid_params(format!(
                "message has {} blocks, plan expects {k}",
                message.count()
            )));
        }
        let m = usize::from(self.design.check_blocks());
        let mut store = BlockStore::try_zeroed(k + m, message.block_size())?;
        let mut xors = 0usize;

        xors += self.forward(message, &mut store);
        xors += self.diagonal(&mut store);
        xors += self.substitute(message, &mut store);

        self.stats.block_xors = xors;
        debug!(block_xors = xors, "back-substitution complete");
        Ok((store, self.stats))
    }

    fn forward(&self, message: &BlockStore, store: &mut BlockStore) -> usize {
        let comp = &self.compression;
        let mut xors = 0;
        for (p, &row) in self.triangle.pivots.iter().enumerate() {
            let slot = comp.column_slot(p);
            if let Some(source) = comp.deferred_row(row) {
                xor_into(store.block_mut(slot), message.block(usize::from(source)));
                xors += 1;
            }
            for col in comp.compress().ones(row) {
                if let Some(source) = self.peel.solving_row(col as u16) {
                    xor_into(store.block_mut(slot), message.block(usize::from(source)));
                    xors += 1;
                }
            }
            for j in self.triangle.lower.ones(row) {
                store.xor_block(slot, comp.column_slot(j));
                xors += 1;
            }
        }
        xors
    }

    fn diagonal(&mut self, store: &mut BlockStore) -> usize {
        let r = self.triangle.pivots.len();
        let mut xors = 0;
        for p in (0..r).rev() {
            let pivot_row = self.triangle.pivots[p];
            let slot = self.compression.column_slot(p);
            for q in 0..p {
                let row = self.triangle.pivots[q];
                if self.compression.ge().get(row, p) {
                    self.compression.ge_mut().xor_row(row, pivot_row, p / 64);
                    store.xor_block(self.compression.column_slot(q), slot);
                    xors += 1;
                }
            }
        }
        xors
    }

    fn substitute(&self, message: &BlockStore, store: &mut BlockStore) -> usize {
        let k = usize::from(self.design.block_count());
        let newest_first: Vec<u16> = self.peel.peeled_rows().collect();
        let mut xors = 0;
        for &row in newest_first.iter().rev() {
            let Some(solved) = self.peel.solved_column(row) else {
                continue;
            };
            let solved = usize::from(solved);
            store
                .block_mut(solved)
                .copy_from_slice(message.block(usize::from(row)));

            let design = self.design.row(u32::from(row));
            for col in design.peel_columns() {
                let col = usize::from(col);
                if col != solved {
                    store.xor_block(solved, col);
                    xors += 1;
                }
            }
            for col in design.mix_columns() {
                store.xor_block(solved, k + usize::from(col));
                xors += 1;
            }
        }
        xors
    }
}
