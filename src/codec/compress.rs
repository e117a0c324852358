//! Compression of the peeled system into a square elimination problem.
//!
//! With D deferred rows and M dense rows (R = D + M), two matrices are built:
//!
//! ```text
//!            K peeling columns              M dense   D deferred
//!          ┌─────────────────────┐        ┌─────────┬──────────┐
//! D rows   │ deferred row walks  │        │ mix walk│          │
//!          ├─────────────────────┤   GE   ├─────────┤  copied  │
//! M rows   │ dense random bits   │        │    I    │  later   │
//!          └─────────────────────┘        └─────────┴──────────┘
//!               compress (R x K)                 (R x R)
//! ```
//!
//! Peeled rows are then folded in, newest first. For a row that solved column
//! `c`, every compress row with bit `c` set absorbs the peeled row's peeling
//! pattern and, in the GE matrix, its mixing pattern. Bit `c` stays set: it
//! records that the peeled row's message block belongs on that GE row's
//! right-hand side. Finally each deferred column is moved out of the compress
//! matrix into its own GE column, leaving only those markers behind.

use smallvec::SmallVec;

use super::bits::BitMatrix;
use super::generator::Design;
use super::peel::PeelOutcome;
use super::CodecError;
use crate::tracing_compat::debug;

/// Result of compression: a square GE system plus its right-hand-side recipe.
#[derive(Debug, Clone)]
pub struct Compression {
    compress: BitMatrix,
    ge: BitMatrix,
    deferred_rows: Vec<u16>,
    deferred_cols: Vec<u16>,
    block_count: usize,
    check_blocks: usize,
    fold_xors: usize,
}

impl Compression {
    /// Builds and folds both matrices for a finished peel.
    pub fn build(design: &Design, peel: &PeelOutcome) -> Result<Self, CodecError> {
        let k = usize::from(design.block_count());
        let m = usize::from(design.check_blocks());
        let deferred_rows: Vec<u16> = peel.deferred_rows().collect();
        let deferred_cols: Vec<u16> = peel.deferred_columns().collect();
        let d = deferred_rows.len();
        let r = d + m;

        let mut this = Self {
            compress: BitMatrix::try_zeros(r, k)?,
            ge: BitMatrix::try_zeros(r, r)?,
            deferred_rows,
            deferred_cols,
            block_count: k,
            check_blocks: m,
            fold_xors: 0,
        };
        this.fill(design);
        this.fold(design, peel);
        this.copy_deferred_columns();

        debug!(
            ge_size = r,
            deferred = d,
            dense = m,
            fold_xors = this.fold_xors,
            "compression complete"
        );
        Ok(this)
    }

    fn fill(&mut self, design: &Design) {
        let d = self.deferred_rows.len();
        for (g, &row) in self.deferred_rows.iter().enumerate() {
            let row_design = design.row(u32::from(row));
            for col in row_design.peel_columns() {
                self.compress.set(g, usize::from(col));
            }
            for col in row_design.mix_columns() {
                self.ge.set(g, usize::from(col));
            }
        }

        let mut dense = design.dense_rows();
        for j in 0..self.check_blocks {
            dense.fill_next(self.compress.row_mut(d + j));
            self.ge.set(d + j, j);
        }
    }

    fn fold(&mut self, design: &Design, peel: &PeelOutcome) {
        let rows = self.compress.rows();
        for row in peel.peeled_rows() {
            let Some(solved) = peel.solved_column(row) else {
                continue;
            };
            let solved = usize::from(solved);
            let row_design = design.row(u32::from(row));
            let pattern: SmallVec<[u16; 32]> = row_design.peel_columns().collect();
            let mixing: SmallVec<[u16; 4]> = row_design.mix_columns().collect();

            for g in 0..rows {
                if !self.compress.get(g, solved) {
                    continue;
                }
                for &col in &pattern {
                    self.compress.flip(g, usize::from(col));
                }
                self.compress.set(g, solved);
                for &col in &mixing {
                    self.ge.flip(g, usize::from(col));
                }
                self.fold_xors += 1;
            }
        }
    }

    fn copy_deferred_columns(&mut self) {
        let m = self.check_blocks;
        for (t, &col) in self.deferred_cols.iter().enumerate() {
            let col = usize::from(col);
            for g in 0..self.compress.rows() {
                if self.compress.get(g, col) {
                    self.ge.set(g, m + t);
                    self.compress.clear(g, col);
                }
            }
        }
    }

    /// R: side length of the GE matrix.
    #[must_use]
    pub fn ge_size(&self) -> usize {
        self.ge.rows()
    }

    /// The square GE matrix.
    #[must_use]
    pub const fn ge(&self) -> &BitMatrix {
        &self.ge
    }

    /// Mutable access for elimination.
    pub fn ge_mut(&mut self) -> &mut BitMatrix {
        &mut self.ge
    }

    /// The compress matrix; after folding only right-hand-side markers remain.
    #[must_use]
    pub const fn compress(&self) -> &BitMatrix {
        &self.compress
    }

    /// Message row whose block seeds GE row `g`, if `g` is a deferred row.
    #[must_use]
    pub fn deferred_row(&self, g: usize) -> Option<u16> {
        self.deferred_rows.get(g).copied()
    }

    /// Deferred columns in GE column order (after the M dense columns).
    #[must_use]
    pub fn deferred_columns(&self) -> &[u16] {
        &self.deferred_cols
    }

    /// Intermediate block slot solved by GE column `p`.
    ///
    /// Dense columns map to slots `K..K+M`; deferred columns to their own
    /// peeling slot.
    #[must_use]
    pub fn column_slot(&self, p: usize) -> usize {
        if p < self.check_blocks {
            self.block_count + p
        } else {
            usize::from(self.deferred_cols[p - self.check_blocks])
        }
    }

    /// Compress-row updates made while folding peeled rows.
    #[must_use]
    pub const fn fold_xors(&self) -> usize {
        self.fold_xors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(k: u16, m: u16, seed: u32) -> (Design, PeelOutcome, Compression) {
        let design = Design::new(k, m, seed).unwrap();
        let peel = PeelOutcome::solve(&design).unwrap();
        let comp = Compression::build(&design, &peel).unwrap();
        (design, peel, comp)
    }

    #[test]
    fn square_and_sized_by_deferred_plus_dense() {
        let (_, peel, comp) = build(200, 15, 7);
        assert_eq!(comp.ge_size(), peel.deferred_count() + 15);
        assert_eq!(comp.ge().cols(), comp.ge_size());
        assert_eq!(comp.compress().cols(), 200);
    }

    #[test]
    fn only_peeled_markers_remain() {
        let (_, peel, comp) = build(200, 15, 7);
        for &col in comp.deferred_columns() {
            for g in 0..comp.ge_size() {
                assert!(!comp.compress().get(g, usize::from(col)));
            }
        }
        for g in 0..comp.ge_size() {
            for col in comp.compress().ones(g) {
                assert!(peel.solving_row(col as u16).is_some());
            }
        }
    }

    #[test]
    fn dense_rows_keep_identity_over_dense_columns_before_folding() {
        let design = Design::new(5, 2, 42).unwrap();
        let peel = PeelOutcome::solve(&design).unwrap();
        let mut comp = Compression {
            compress: BitMatrix::try_zeros(4, 5).unwrap(),
            ge: BitMatrix::try_zeros(4, 4).unwrap(),
            deferred_rows: peel.deferred_rows().collect(),
            deferred_cols: peel.deferred_columns().collect(),
            block_count: 5,
            check_blocks: 2,
            fold_xors: 0,
        };
        comp.fill(&design);
        assert_eq!(comp.compress.ones(2).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(comp.compress.ones(3).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert!(comp.ge.get(2, 0) && comp.ge.get(3, 1));
        // Deferred rows 3 and 4 walk [4, 1, 3] and [3, 0, 2, 4].
        assert_eq!(comp.compress.ones(0).collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(comp.compress.ones(1).collect::<Vec<_>>(), vec![0, 2, 3, 4]);
    }

    #[test]
    fn column_slots() {
        let (_, _, comp) = build(5, 2, 42);
        assert_eq!(comp.column_slot(0), 5);
        assert_eq!(comp.column_slot(1), 6);
        assert_eq!(comp.column_slot(2), 3);
        assert_eq!(comp.column_slot(3), 4);
        assert_eq!(comp.deferred_row(0), Some(3));
        assert_eq!(comp.deferred_row(2), None);
    }
}
