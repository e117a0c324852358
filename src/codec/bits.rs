//! Packed GF(2) bit matrices.
//!
//! Rows are stored back to back as 64-bit words; bit `c` of a row lives in word
//! `c / 64` at position `c % 64`. Addition over GF(2) is XOR, so row operations
//! reduce to word-wise XOR.

use super::CodecError;

/// Number of 64-bit words needed for `cols` bits.
#[inline]
#[must_use]
pub const fn words_for(cols: usize) -> usize {
    cols.div_ceil(64)
}

/// Allocates a zeroed vector, reporting allocator refusal as an error.
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>, CodecError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| CodecError::AllocationFailed {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    v.resize(len, T::default());
    Ok(v)
}

/// A dense bit matrix over GF(2).
#[derive(Clone, PartialEq, Eq)]
pub struct BitMatrix {
    rows: usize,
    cols: usize,
    pitch: usize,
    words: Vec<u64>,
}

impl BitMatrix {
    /// Creates an all-zero `rows x cols` matrix.
    pub fn try_zeros(rows: usize, cols: usize) -> Result<Self, CodecError> {
        let pitch = words_for(cols);
        let len = rows
            .checked_mul(pitch)
            .ok_or(CodecError::AllocationFailed { bytes: usize::MAX })?;
        Ok(Self {
            rows,
            cols,
            pitch,
            words: try_zeroed(len)?,
        })
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Words per row.
    #[inline]
    #[must_use]
    pub const fn pitch(&self) -> usize {
        self.pitch
    }

    /// Returns bit `(row, col)`.
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> bool {
        debug_assert!(row < self.rows && col < self.cols);
        (self.words[row * self.pitch + col / 64] >> (col % 64)) & 1 == 1
    }

    /// Sets bit `(row, col)`.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize) {
        debug_assert!(row < self.rows && col < self.cols);
        self.words[row * self.pitch + col / 64] |= 1u64 << (col % 64);
    }

    /// Clears bit `(row, col)`.
    #[inline]
    pub fn clear(&mut self, row: usize, col: usize) {
        debug_assert!(row < self.rows && col < self.cols);
        self.words[row * self.pitch + col / 64] &= !(1u64 << (col % 64));
    }

    /// Toggles bit `(row, col)`.
    #[inline]
    pub fn flip(&mut self, row: usize, col: usize) {
        debug_assert!(row < self.rows && col < self.cols);
        self.words[row * self.pitch + col / 64] ^= 1u64 << (col % 64);
    }

    /// Packed words of `row`.
    #[inline]
    #[must_use]
    pub fn row(&self, row: usize) -> &[u64] {
        &self.words[row * self.pitch..(row + 1) * self.pitch]
    }

    /// Mutable packed words of `row`.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [u64] {
        &mut self.words[row * self.pitch..(row + 1) * self.pitch]
    }

    /// `row[dst] ^= row[src]`, touching words `from_word..pitch` only.
    ///
    /// Callers pass a non-zero `from_word` when both rows are known to be zero
    /// below it.
    pub fn xor_row(&mut self, dst: usize, src: usize, from_word: usize) {
        debug_assert_ne!(dst, src);
        let pitch = self.pitch;
        for w in from_word..pitch {
            let v = self.words[src * pitch + w];
            self.words[dst * pitch + w] ^= v;
        }
    }

    /// Column indices of the set bits of `row`, ascending.
    pub fn ones(&self, row: usize) -> Ones<'_> {
        Ones {
            words: self.row(row),
            index: 0,
            current: self.row(row).first().copied().unwrap_or(0),
        }
    }
}

impl std::fmt::Debug for BitMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BitMatrix({}x{})", self.rows, self.cols)?;
        for r in 0..self.rows {
            for c in 0..self.cols {
                f.write_str(if self.get(r, c) { "1" } else { "0" })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Iterator over set bit positions in one packed row.
#[derive(Debug, Clone)]
pub struct Ones<'a> {
    words: &'a [u64],
    index: usize,
    current: u64,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.current == 0 {
            self.index += 1;
            if self.index >= self.words.len() {
                return None;
            }
            self.current = self.words[self.index];
        }
        let bit = self.current.trailing_zeros() as usize;
        self.current &= self.current - 1;
        Some(self.index * 64 + bit)
    }
}
