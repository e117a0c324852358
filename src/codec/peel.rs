//! Peeling solver with greedy deferral.
//!
//! Rows are ingested in id order. A row with exactly one unresolved column
//! solves it ("peels"), which may leave further rows with a single unresolved
//! column; resolving those in turn is the avalanche. When nothing is left to
//! peel, the greedy pass forces the most promising column into Gaussian
//! elimination and lets the avalanche run again.
//!
//! Rows and columns live in flat arenas and are threaded onto intrusive
//! singly-linked lists through 16-bit index links, terminated by
//! [`LIST_TERM`]:
//!
//! - peeled rows, newest first
//! - deferred rows, newest first
//! - deferred columns, newest first
//!
//! Only the structure of the matrix is solved here. No block data is touched.

use smallvec::SmallVec;

use super::generator::Design;
use super::CodecError;
use crate::tracing_compat::{debug, warn};

/// List terminator for the intrusive index links.
pub const LIST_TERM: u16 = u16::MAX;

/// Maximum number of rows that may reference one column.
pub const REF_LIST_MAX: usize = 64;

/// Resolution state of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Still has two or more unresolved columns.
    Pending,
    /// Solved exactly one column.
    Peeled,
    /// Handed to Gaussian elimination.
    Deferred,
}

/// Resolution mark of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMark {
    /// Not yet resolved.
    Unresolved,
    /// Solved by a peeled row.
    Peeled,
    /// Forced into Gaussian elimination.
    Deferred,
}

#[derive(Debug, Clone)]
struct PeelRow {
    state: RowState,
    /// Unresolved peeling columns, tracked exactly only once it drops to 2.
    unresolved: u16,
    /// The two unresolved columns while `unresolved == 2`; `[solved, _]` once peeled.
    unmarked: [u16; 2],
    next: u16,
}

#[derive(Debug, Clone)]
struct PeelColumn {
    mark: ColumnMark,
    /// References from rows that had exactly two unresolved columns.
    w2_refs: u16,
    rows: SmallVec<[u16; 8]>,
    /// Row that solved this column, when peeled.
    solver: u16,
    next: u16,
}

/// Finished peeling state: every column is marked and every row resolved.
#[derive(Debug, Clone)]
pub struct PeelOutcome {
    rows: Vec<PeelRow>,
    cols: Vec<PeelColumn>,
    peel_head: u16,
    defer_head: u16,
    defer_col_head: u16,
    peeled_count: usize,
    deferred_count: usize,
    greedy_picks: usize,
    avalanche_steps: usize,
}

impl PeelOutcome {
    /// Runs peeling and greedy deferral over rows `0..K` of `design`.
    pub fn solve(design: &Design) -> Result<Self, CodecError> {
        PeelSolver::new(design, REF_LIST_MAX).run()
    }

    /// Like [`solve`](Self::solve) with a custom reference-list bound.
    pub(crate) fn solve_with_ref_capacity(
        design: &Design,
        capacity: usize,
    ) -> Result<Self, CodecError> {
        PeelSolver::new(design, capacity).run()
    }

    /// Number of columns (K).
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.cols.len()
    }

    /// Peeled rows from the most recently peeled to the first.
    pub fn peeled_rows(&self) -> RowList<'_> {
        RowList {
            rows: &self.rows,
            cursor: self.peel_head,
        }
    }

    /// Deferred rows, most recently deferred first.
    pub fn deferred_rows(&self) -> RowList<'_> {
        RowList {
            rows: &self.rows,
            cursor: self.defer_head,
        }
    }

    /// Deferred columns, most recently selected first.
    pub fn deferred_columns(&self) -> ColumnList<'_> {
        ColumnList {
            cols: &self.cols,
            cursor: self.defer_col_head,
        }
    }

    /// State of row `row`.
    #[must_use]
    pub fn row_state(&self, row: u16) -> RowState {
        self.rows[usize::from(row)].state
    }

    /// Mark of column `col`.
    #[must_use]
    pub fn column_mark(&self, col: u16) -> ColumnMark {
        self.cols[usize::from(col)].mark
    }

    /// Column solved by a peeled row.
    #[must_use]
    pub fn solved_column(&self, row: u16) -> Option<u16> {
        let r = &self.rows[usize::from(row)];
        (r.state == RowState::Peeled).then_some(r.unmarked[0])
    }

    /// Row that solved a peeled column.
    #[must_use]
    pub fn solving_row(&self, col: u16) -> Option<u16> {
        let c = &self.cols[usize::from(col)];
        (c.mark == ColumnMark::Peeled).then_some(c.solver)
    }

    /// Total rows referencing `col`.
    #[must_use]
    pub fn reference_count(&self, col: u16) -> usize {
        self.cols[usize::from(col)].rows.len()
    }

    /// Rows resolved by peeling.
    #[must_use]
    pub const fn peeled_count(&self) -> usize {
        self.peeled_count
    }

    /// Rows (and columns) handed to elimination.
    #[must_use]
    pub const fn deferred_count(&self) -> usize {
        self.deferred_count
    }

    /// Columns chosen by the greedy pass.
    #[must_use]
    pub const fn greedy_picks(&self) -> usize {
        self.greedy_picks
    }

    /// Row visits made by all avalanches.
    #[must_use]
    pub const fn avalanche_steps(&self) -> usize {
        self.avalanche_steps
    }
}

/// Walks a row list from its head.
#[derive(Debug, Clone)]
pub struct RowList<'a> {
    rows: &'a [PeelRow],
    cursor: u16,
}

impl Iterator for RowList<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.cursor == LIST_TERM {
            return None;
        }
        let current = self.cursor;
        self.cursor = self.rows[usize::from(current)].next;
        Some(current)
    }
}

/// Walks the deferred column list from its head.
#[derive(Debug, Clone)]
pub struct ColumnList<'a> {
    cols: &'a [PeelColumn],
    cursor: u16,
}

impl Iterator for ColumnList<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.cursor == LIST_TERM {
            return None;
        }
        let current = self.cursor;
        self.cursor = self.cols[usize::from(current)].next;
        Some(current)
    }
}

// ============================================================================
// Solver
// ============================================================================

struct PeelSolver<'a> {
    design: &'a Design,
    capacity: usize,
    out: PeelOutcome,
    /// Avalanche frames: (resolved column, next reference to visit).
    stack: Vec<(u16, usize)>,
}

impl<'a> PeelSolver<'a> {
    fn new(design: &'a Design, capacity: usize) -> Self {
        let k = usize::from(design.block_count());
        let row = PeelRow {
            state: RowState::Pending,
            unresolved: 0,
            unmarked: [LIST_TERM; 2],
            next: LIST_TERM,
        };
        let col = PeelColumn {
            mark: ColumnMark::Unresolved,
            w2_refs: 0,
            rows: SmallVec::new(),
            solver: LIST_TERM,
            next: LIST_TERM,
        };
        Self {
            design,
            capacity,
            out: PeelOutcome {
                rows: vec![row; k],
                cols: vec![col; k],
                peel_head: LIST_TERM,
                defer_head: LIST_TERM,
                defer_col_head: LIST_TERM,
                peeled_count: 0,
                deferred_count: 0,
                greedy_picks: 0,
                avalanche_steps: 0,
            },
            stack: Vec::new(),
        }
    }

    fn run(mut self) -> Result<PeelOutcome, CodecError> {
        for row in 0..self.design.block_count() {
            self.ingest(row)?;
        }
        debug!(
            peeled = self.out.peeled_count,
            deferred = self.out.deferred_count,
            "initial peeling complete"
        );

        self.greedy();

        debug_assert!(self.out.rows.iter().all(|r| r.state != RowState::Pending));
        debug_assert!(self
            .out
            .cols
            .iter()
            .all(|c| c.mark != ColumnMark::Unresolved));
        debug_assert_eq!(
            self.out.peeled_count + self.out.deferred_count,
            self.out.rows.len()
        );
        debug!(
            peeled = self.out.peeled_count,
            deferred = self.out.deferred_count,
            greedy_picks = self.out.greedy_picks,
            avalanche_steps = self.out.avalanche_steps,
            "peeling finished"
        );
        Ok(self.out)
    }

    /// Registers `row` with its columns and resolves it if possible.
    fn ingest(&mut self, row: u16) -> Result<(), CodecError> {
        let mut unmarked: SmallVec<[u16; 2]> = SmallVec::new();
        let mut unresolved = 0u16;
        for col in self.design.row(u32::from(row)).peel_columns() {
            let column = &mut self.out.cols[usize::from(col)];
            if column.rows.len() >= self.capacity {
                warn!(column = col, limit = self.capacity, "column reference list overflow");
                return Err(CodecError::CapacityOverflow {
                    column: col,
                    limit: self.capacity,
                });
            }
            column.rows.push(row);
            if column.mark == ColumnMark::Unresolved {
                unresolved += 1;
                if unmarked.len() < 2 {
                    unmarked.push(col);
                }
            }
        }
        self.out.rows[usize::from(row)].unresolved = unresolved;

        match unresolved {
            0 => self.defer_row(row),
            1 => {
                self.mark_peeled(row, unmarked[0]);
                self.avalanche(unmarked[0]);
            }
            2 => {
                self.out.rows[usize::from(row)].unmarked = [unmarked[0], unmarked[1]];
                self.out.cols[usize::from(unmarked[0])].w2_refs += 1;
                self.out.cols[usize::from(unmarked[1])].w2_refs += 1;
            }
            _ => {}
        }
        Ok(())
    }

    /// Picks deferred columns until every column is marked.
    ///
    /// Highest weight-2 reference count wins, then highest total reference
    /// count, then the lowest column index.
    fn greedy(&mut self) {
        loop {
            let mut best: Option<(u16, u16, usize)> = None;
            for (index, col) in self.out.cols.iter().enumerate() {
                if col.mark != ColumnMark::Unresolved {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((_, w2, refs)) => {
                        col.w2_refs > w2 || (col.w2_refs == w2 && col.rows.len() > refs)
                    }
                };
                if better {
                    best = Some((index as u16, col.w2_refs, col.rows.len()));
                }
            }
            let Some((col, _, _)) = best else {
                return;
            };

            let column = &mut self.out.cols[usize::from(col)];
            column.mark = ColumnMark::Deferred;
            column.next = self.out.defer_col_head;
            self.out.defer_col_head = col;
            self.out.greedy_picks += 1;

            self.avalanche(col);
        }
    }

    fn mark_peeled(&mut self, row: u16, col: u16) {
        let column = &mut self.out.cols[usize::from(col)];
        column.mark = ColumnMark::Peeled;
        column.solver = row;

        let r = &mut self.out.rows[usize::from(row)];
        r.state = RowState::Peeled;
        r.unmarked[0] = col;
        r.next = self.out.peel_head;
        self.out.peel_head = row;
        self.out.peeled_count += 1;
    }

    fn defer_row(&mut self, row: u16) {
        let r = &mut self.out.rows[usize::from(row)];
        r.state = RowState::Deferred;
        r.next = self.out.defer_head;
        self.out.defer_head = row;
        self.out.deferred_count += 1;
    }

    /// Propagates the resolution of `col` through every row that references it.
    ///
    /// Depth-first: a column peeled along the way is fully propagated before
    /// the remaining references of its parent are visited.
    fn avalanche(&mut self, col: u16) {
        let mut stack = std::mem::take(&mut self.stack);
        stack.push((col, 0));

        while let Some(frame) = stack.last_mut() {
            let (current, pos) = *frame;
            let refs = &self.out.cols[usize::from(current)].rows;
            if pos >= refs.len() {
                stack.pop();
                continue;
            }
            let row = refs[pos];
            frame.1 += 1;

            if let Some(peeled) = self.resolve_step(row, current) {
                stack.push((peeled, 0));
            }
        }

        self.stack = stack;
    }

    /// Accounts for one newly resolved column in `row`.
    ///
    /// Returns the column this row peeled, if any.
    fn resolve_step(&mut self, row: u16, resolved: u16) -> Option<u16> {
        let r = &mut self.out.rows[usize::from(row)];
        if r.state != RowState::Pending {
            return None;
        }
        self.out.avalanche_steps += 1;
        r.unresolved -= 1;

        match r.unresolved {
            1 => {
                let other = if r.unmarked[0] == resolved {
                    r.unmarked[1]
                } else {
                    r.unmarked[0]
                };
                if self.out.cols[usize::from(other)].mark == ColumnMark::Unresolved {
                    self.mark_peeled(row, other);
                    Some(other)
                } else {
                    self.defer_row(row);
                    None
                }
            }
            2 => {
                // The counter may lag behind marks made deeper in this
                // avalanche, so recount from the row's columns.
                let mut found: SmallVec<[u16; 2]> = SmallVec::new();
                let mut count = 0usize;
                for col in self.design.row(u32::from(row)).peel_columns() {
                    let column = &mut self.out.cols[usize::from(col)];
                    if column.mark == ColumnMark::Unresolved {
                        column.w2_refs += 1;
                        count += 1;
                        if found.len() < 2 {
                            found.push(col);
                        }
                    }
                }
                match count {
                    0 => {
                        self.defer_row(row);
                        None
                    }
                    1 => {
                        self.mark_peeled(row, found[0]);
                        Some(found[0])
                    }
                    _ => {
                        self.out.rows[usize::from(row)].unmarked = [found[0], found[1]];
                        None
                    }
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(k: u16, m: u16, seed: u32) -> PeelOutcome {
        PeelOutcome::solve(&Design::new(k, m, seed).unwrap()).unwrap()
    }

    fn assert_consistent(out: &PeelOutcome) {
        let k = out.block_count();
        let peeled: Vec<u16> = out.peeled_rows().collect();
        let deferred: Vec<u16> = out.deferred_rows().collect();
        let deferred_cols: Vec<u16> = out.deferred_columns().collect();

        assert_eq!(peeled.len() + deferred.len(), k);
        assert_eq!(deferred.len(), deferred_cols.len());
        assert_eq!(peeled.len(), out.peeled_count());
        assert_eq!(deferred.len(), out.deferred_count());

        let mut seen_rows = vec![false; k];
        for &r in peeled.iter().chain(&deferred) {
            assert!(!seen_rows[usize::from(r)], "row {r} on two lists");
            seen_rows[usize::from(r)] = true;
        }

        let mut peeled_cols = 0;
        for col in 0..k as u16 {
            match out.column_mark(col) {
                ColumnMark::Peeled => {
                    peeled_cols += 1;
                    let row = out.solving_row(col).unwrap();
                    assert_eq!(out.solved_column(row), Some(col));
                    assert_eq!(out.row_state(row), RowState::Peeled);
                }
                ColumnMark::Deferred => assert!(deferred_cols.contains(&col)),
                ColumnMark::Unresolved => panic!("column {col} left unresolved"),
            }
        }
        assert_eq!(peeled_cols, peeled.len());
    }

    #[test]
    fn small_design_lists() {
        let out = outcome(5, 2, 42);
        assert_consistent(&out);
        assert_eq!(out.peeled_rows().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(out.deferred_rows().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(out.deferred_columns().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(out.greedy_picks(), 2);
        for row in 0..3 {
            assert_eq!(out.solved_column(row), Some(row));
        }
        assert_eq!(out.reference_count(4), 5);
    }

    #[test]
    fn every_column_marked_once() {
        for (k, m, seed) in [(2u16, 2u16, 0u32), (3, 2, 1), (17, 5, 9), (200, 15, 7), (1000, 32, 1)]
        {
            assert_consistent(&outcome(k, m, seed));
        }
    }

    #[test]
    fn deferred_set_stays_small() {
        let out = outcome(1000, 32, 1);
        assert_eq!(out.deferred_count(), 25);
        assert_eq!(out.greedy_picks(), 25);
        let out = outcome(200, 15, 7);
        assert_eq!(out.deferred_count(), 9);
    }

    #[test]
    fn peel_order_respects_dependencies() {
        // A peeled row's other columns were all resolved before it peeled.
        let design = Design::new(300, 18, 4).unwrap();
        let out = PeelOutcome::solve(&design).unwrap();
        let order: Vec<u16> = out.peeled_rows().collect::<Vec<_>>().into_iter().rev().collect();
        let mut position = vec![usize::MAX; 300];
        for (i, &row) in order.iter().enumerate() {
            position[usize::from(out.solved_column(row).unwrap())] = i;
        }
        for (i, &row) in order.iter().enumerate() {
            let solved = out.solved_column(row).unwrap();
            for col in design.row(u32::from(row)).peel_columns() {
                if col != solved && out.column_mark(col) == ColumnMark::Peeled {
                    assert!(position[usize::from(col)] < i);
                }
            }
        }
    }

    #[test]
    fn reference_overflow_is_fatal() {
        let design = Design::new(5, 2, 42).unwrap();
        let err = PeelOutcome::solve_with_ref_capacity(&design, 4).unwrap_err();
        assert_eq!(
            err,
            CodecError::CapacityOverflow {
                column: 4,
                limit: 4
            }
        );
        assert!(PeelOutcome::solve_with_ref_capacity(&design, 5).is_ok());
    }
}
