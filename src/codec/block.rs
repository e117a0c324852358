//! Block storage and the XOR primitive.

use super::bits::try_zeroed;
use super::CodecError;

/// XORs `src` into `dst` (`dst ^= src`), eight bytes at a time.
///
/// # Panics
///
/// Panics if `src.len() != dst.len()`.
#[inline]
pub fn xor_into(dst: &mut [u8], src: &[u8]) {
    assert_eq!(dst.len(), src.len(), "block length mismatch");
    let mut d_chunks = dst.chunks_exact_mut(8);
    let mut s_chunks = src.chunks_exact(8);
    for (d_chunk, s_chunk) in d_chunks.by_ref().zip(s_chunks.by_ref()) {
        let mut d_arr = [0u8; 8];
        let mut s_arr = [0u8; 8];
        d_arr.copy_from_slice(d_chunk);
        s_arr.copy_from_slice(s_chunk);
        let result = u64::from_ne_bytes(d_arr) ^ u64::from_ne_bytes(s_arr);
        d_chunk.copy_from_slice(&result.to_ne_bytes());
    }
    for (d, s) in d_chunks
        .into_remainder()
        .iter_mut()
        .zip(s_chunks.remainder())
    {
        *d ^= s;
    }
}

/// A contiguous array of equally sized blocks.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockStore {
    block_size: usize,
    count: usize,
    data: Vec<u8>,
}

impl BlockStore {
    /// Allocates `count` zeroed blocks of `block_size` bytes.
    pub fn try_zeroed(count: usize, block_size: usize) -> Result<Self, CodecError> {
        let len = count
            .checked_mul(block_size)
            .ok_or(CodecError::AllocationFailed { bytes: usize::MAX })?;
        Ok(Self {
            block_size,
            count,
            data: try_zeroed(len)?,
        })
    }

    /// Splits `bytes` into blocks, zero-padding the final partial block.
    pub fn from_padded(bytes: &[u8], block_size: usize) -> Result<Self, CodecError> {
        let count = bytes.len().div_ceil(block_size);
        let mut store = Self::try_zeroed(count, block_size)?;
        store.data[..bytes.len()].copy_from_slice(bytes);
        Ok(store)
    }

    /// Number of blocks.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Bytes per block.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// All blocks, back to back.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Block `index`.
    #[inline]
    #[must_use]
    pub fn block(&self, index: usize) -> &[u8] {
        &self.data[index * self.block_size..(index + 1) * self.block_size]
    }

    /// Mutable block `index`.
    #[inline]
    pub fn block_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.data[index * self.block_size..(index + 1) * self.block_size]
    }

    /// `block[dst] ^= block[src]` within this store.
    pub fn xor_block(&mut self, dst: usize, src: usize) {
        debug_assert_ne!(dst, src);
        let bs = self.block_size;
        if dst < src {
            let (lo, hi) = self.data.split_at_mut(src * bs);
            xor_into(&mut lo[dst * bs..(dst + 1) * bs], &hi[..bs]);
        } else {
            let (lo, hi) = self.data.split_at_mut(dst * bs);
            xor_into(&mut hi[..bs], &lo[src * bs..(src + 1) * bs]);
        }
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("count", &self.count)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}
