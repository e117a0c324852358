//! Reference decoder.
//!
//! Every received block is one GF(2) equation over the K + M intermediate
//! blocks: its row design names the slots, its payload is the right-hand
//! side. The M dense rows contribute equations with a zero right-hand side.
//! Equations are reduced into an echelon basis as they arrive, indexed by
//! their lowest set column, so rank is known after every block. Once the
//! basis is full, back-substitution yields the intermediate blocks and the
//! message rows are regenerated from them.
//!
//! Exactly K received blocks are not always enough: the K rows plus the dense
//! rows have to reach full rank, which holds for most subsets but not all.
//!
//! The basis is a dense `n x n` bit matrix with `n = K + M`, so memory grows
//! as `n² / 8` bytes (about 528 MB at K = 64000) and reducing one block costs
//! up to `n² / 64` word XORs. Allocation failure surfaces as
//! [`CodecError::AllocationFailed`]. Large K is better served by a decoder
//! that peels before eliminating.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::bits::{words_for, BitMatrix};
use super::block::{xor_into, BlockStore};
use super::encoder::block_count_for;
use super::generator::Design;
use super::params::{CodeParams, ParameterPolicy, SimulatedParams};
use super::wire::Block;
use super::CodecError;
use crate::tracing_compat::{debug, info};

/// State after feeding a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeProgress {
    /// More independent blocks are needed.
    NeedMore {
        /// Rank reached so far, dense rows included.
        rank: usize,
        /// Rank required.
        needed: usize,
    },
    /// The message can be reconstructed.
    Ready,
}

/// Decoder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStats {
    /// Blocks fed.
    pub received: usize,
    /// Blocks that added no rank.
    pub redundant: usize,
    /// Current rank, dense rows included.
    pub rank: usize,
    /// Block XORs performed while reducing.
    pub xor_ops: usize,
}

/// Incremental decoder for one message.
#[derive(Debug, Clone)]
pub struct Decoder {
    design: Design,
    params: CodeParams,
    message_len: usize,
    basis: BitMatrix,
    values: BlockStore,
    occupied: Vec<bool>,
    scratch_bits: Vec<u64>,
    scratch_block: Vec<u8>,
    stats: DecodeStats,
    solved: OnceLock<BlockStore>,
}

impl Decoder {
    /// Decoder matching an encoder built with the default policy.
    pub fn new(message_len: usize, block_size: usize) -> Result<Self, CodecError> {
        Self::with_policy(message_len, block_size, SimulatedParams::global())
    }

    /// Decoder for explicit `(M, seed)`.
    pub fn with_params(
        message_len: usize,
        block_size: usize,
        params: CodeParams,
    ) -> Result<Self, CodecError> {
        let block_count = block_count_for(message_len, block_size)?;
        let design = Design::new(block_count, params.check_blocks, params.seed)?;
        let n = design.intermediate_count();

        let mut this = Self {
            params,
            message_len,
            basis: BitMatrix::try_zeros(n, n)?,
            values: BlockStore::try_zeroed(n, block_size)?,
            occupied: vec![false; n],
            scratch_bits: vec![0; words_for(n)],
            scratch_block: vec![0; block_size],
            stats: DecodeStats::default(),
            solved: OnceLock::new(),
            design,
        };
        this.seed_dense_rows();

        info!(
            block_count,
            check_blocks = params.check_blocks,
            seed = params.seed,
            block_size,
            "decoder initialized"
        );
        Ok(this)
    }

    /// Decoder whose `(M, seed)` comes from `policy`.
    pub fn with_policy<P: ParameterPolicy + ?Sized>(
        message_len: usize,
        block_size: usize,
        policy: &P,
    ) -> Result<Self, CodecError> {
        let block_count = block_count_for(message_len, block_size)?;
        Self::with_params(message_len, block_size, policy.select(block_count)?)
    }

    fn seed_dense_rows(&mut self) {
        let k = usize::from(self.design.block_count());
        let mut dense = self.design.dense_rows();
        let mut words = vec![0u64; self.design.dense_pitch()];
        let mut j = 0;
        while dense.fill_next(&mut words) {
            self.scratch_bits.fill(0);
            self.scratch_bits[..words.len()].copy_from_slice(&words);
            set_bit(&mut self.scratch_bits, k + j);
            self.scratch_block.fill(0);
            self.insert();
            j += 1;
        }
    }

    /// K.
    #[must_use]
    pub const fn block_count(&self) -> u16 {
        self.design.block_count()
    }

    /// Bytes per block.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.values.block_size()
    }

    /// Parameters in use.
    #[must_use]
    pub const fn params(&self) -> CodeParams {
        self.params
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Rank required for reconstruction (K + M).
    #[must_use]
    pub const fn needed(&self) -> usize {
        self.design.intermediate_count()
    }

    /// True once every intermediate block is determined.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.stats.rank == self.design.intermediate_count()
    }

    fn progress(&self) -> DecodeProgress {
        if self.is_ready() {
            DecodeProgress::Ready
        } else {
            DecodeProgress::NeedMore {
                rank: self.stats.rank,
                needed: self.needed(),
            }
        }
    }

    /// Adds output block `id`.
    pub fn feed(&mut self, id: u32, payload: &[u8]) -> Result<DecodeProgress, CodecError> {
        if payload.len() != self.block_size() {
            return Err(CodecError::malformed(format!(
                "payload is {} bytes, block size is {}",
                payload.len(),
                self.block_size()
            )));
        }
        self.stats.received += 1;
        if self.is_ready() {
            self.stats.redundant += 1;
            return Ok(DecodeProgress::Ready);
        }

        let k = usize::from(self.design.block_count());
        let row = self.design.row(id);
        self.scratch_bits.fill(0);
        for col in row.peel_columns() {
            set_bit(&mut self.scratch_bits, usize::from(col));
        }
        for col in row.mix_columns() {
            set_bit(&mut self.scratch_bits, k + usize::from(col));
        }
        self.scratch_block.copy_from_slice(payload);

        if !self.insert() {
            self.stats.redundant += 1;
        }
        if self.is_ready() {
            debug!(
                received = self.stats.received,
                redundant = self.stats.redundant,
                "decoder reached full rank"
            );
        }
        Ok(self.progress())
    }

    /// Adds a parsed block.
    pub fn feed_block(&mut self, block: &Block) -> Result<DecodeProgress, CodecError> {
        self.feed(block.id, &block.payload)
    }

    /// Parses and adds one wire frame.
    pub fn feed_wire(&mut self, frame: &[u8]) -> Result<DecodeProgress, CodecError> {
        let block = Block::from_wire(frame, self.block_size())?;
        self.feed_block(&block)
    }

    /// Reduces the scratch equation into the basis. Returns false if it was dependent.
    fn insert(&mut self) -> bool {
        loop {
            let Some(lead) = lowest_set_bit(&self.scratch_bits) else {
                return false;
            };
            if !self.occupied[lead] {
                self.basis.row_mut(lead).copy_from_slice(&self.scratch_bits);
                self.values
                    .block_mut(lead)
                    .copy_from_slice(&self.scratch_block);
                self.occupied[lead] = true;
                self.stats.rank += 1;
                return true;
            }
            let basis_row = self.basis.row(lead);
            for (dst, src) in self.scratch_bits.iter_mut().zip(basis_row).skip(lead / 64) {
                *dst ^= src;
            }
            xor_into(&mut self.scratch_block, self.values.block(lead));
            self.stats.xor_ops += 1;
        }
    }

    /// Back-substitutes the basis into the intermediate blocks.
    ///
    /// Runs once; the basis cannot change after full rank.
    fn intermediates(&self) -> Result<&BlockStore, CodecError> {
        if !self.is_ready() {
            return Err(CodecError::InsufficientBlocks {
                rank: self.stats.rank,
                needed: self.needed(),
            });
        }
        if let Some(solved) = self.solved.get() {
            return Ok(solved);
        }
        let mut solved = self.values.clone();
        for c in (0..self.needed()).rev() {
            for j in self.basis.ones(c).filter(|&j| j > c) {
                solved.xor_block(c, j);
            }
        }
        Ok(self.solved.get_or_init(|| solved))
    }

    fn evaluate_row(&self, solved: &BlockStore, id: u32, out: &mut [u8]) {
        let k = usize::from(self.design.block_count());
        let row = self.design.row(id);
        out.fill(0);
        for col in row.peel_columns() {
            xor_into(out, solved.block(usize::from(col)));
        }
        for col in row.mix_columns() {
            xor_into(out, solved.block(k + usize::from(col)));
        }
    }

    /// Rebuilds the original message.
    pub fn reconstruct(&self) -> Result<Vec<u8>, CodecError> {
        let solved = self.intermediates()?;
        let k = usize::from(self.design.block_count());
        let bs = self.block_size();
        let mut out = Vec::new();
        out.try_reserve_exact(k * bs)
            .map_err(|_| CodecError::AllocationFailed { bytes: k * bs })?;
        let mut block = vec![0u8; bs];
        for id in 0..k {
            self.evaluate_row(solved, id as u32, &mut block);
            out.extend_from_slice(&block);
        }
        out.truncate(self.message_len);
        Ok(out)
    }

    /// Writes output block `id` into `out[..block_size]`.
    ///
    /// Ids below K give message blocks, the last one zero padded; higher ids
    /// give the same payload the encoder would emit.
    pub fn reconstruct_block(&self, id: u32, out: &mut [u8]) -> Result<(), CodecError> {
        let bs = self.block_size();
        if out.len() < bs {
            return Err(CodecError::invalid_params(format!(
                "output buffer is {} bytes, block size is {bs}",
                out.len()
            )));
        }
        let solved = self.intermediates()?;
        self.evaluate_row(solved, id, &mut out[..bs]);
        Ok(())
    }
}

/// Creates a decoder with the default parameter policy.
pub fn initialize_decoder(message_len: usize, block_size: usize) -> Result<Decoder, CodecError> {
    Decoder::new(message_len, block_size)
}

fn set_bit(words: &mut [u64], bit: usize) {
    words[bit / 64] |= 1u64 << (bit % 64);
}

fn lowest_set_bit(words: &[u64]) -> Option<usize> {
    words
        .iter()
        .position(|&w| w != 0)
        .map(|i| i * 64 + words[i].trailing_zeros() as usize)
}
