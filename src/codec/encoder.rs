//! Encoder session.
//!
//! Initialization splits the message into K zero-padded blocks, asks a
//! [`ParameterPolicy`] for `(M, seed)`, builds the [`SolvePlan`] and solves for
//! the K + M intermediate blocks. After that the session is read-only:
//! [`Encoder::generate`] is a pure function of the id, and ids past K + M work
//! as a rateless source.

use super::block::{xor_into, BlockStore};
use super::generator::{Design, MAX_BLOCK_COUNT};
use super::params::{CodeParams, ParameterPolicy, SimulatedParams};
use super::solver::{SolvePlan, SolveStats};
use super::wire::{Block, MAX_WIRE_ID, WIRE_ID_BYTES};
use super::CodecError;
use crate::config::CodecConfig;
use crate::tracing_compat::info;

/// The intermediate slots combined by one output id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEquation {
    /// Output id.
    pub id: u32,
    /// Peeling columns, slots `0..K`.
    pub peel: Vec<u16>,
    /// Dense columns, slots `K..K+M` after offsetting by K.
    pub mix: Vec<u16>,
    block_count: u16,
}

impl RowEquation {
    /// All intermediate slots, peeling first, dense columns offset by K.
    pub fn slots(&self) -> impl Iterator<Item = usize> + '_ {
        let k = usize::from(self.block_count);
        self.peel
            .iter()
            .map(|&c| usize::from(c))
            .chain(self.mix.iter().map(move |&c| k + usize::from(c)))
    }
}

/// A precomputed encoding session for one message.
#[derive(Debug, Clone)]
pub struct Encoder {
    design: Design,
    params: CodeParams,
    message: BlockStore,
    message_len: usize,
    intermediate: BlockStore,
    stats: SolveStats,
    next_id: u32,
}

impl Encoder {
    /// Creates a session using the process-wide simulated parameter policy.
    pub fn new(message: &[u8], block_size: usize) -> Result<Self, CodecError> {
        Self::with_policy(message, block_size, SimulatedParams::global())
    }

    /// Creates a session with explicit `(M, seed)`.
    pub fn with_params(
        message: &[u8],
        block_size: usize,
        params: CodeParams,
    ) -> Result<Self, CodecError> {
        let block_count = block_count_for(message.len(), block_size)?;
        Self::build(message, block_size, block_count, params)
    }

    /// Creates a session, letting `policy` choose `(M, seed)`.
    pub fn with_policy<P: ParameterPolicy + ?Sized>(
        message: &[u8],
        block_size: usize,
        policy: &P,
    ) -> Result<Self, CodecError> {
        let block_count = block_count_for(message.len(), block_size)?;
        let params = policy.select(block_count)?;
        Self::build(message, block_size, block_count, params)
    }

    /// Creates a session from a validated configuration.
    pub fn from_config(message: &[u8], config: &CodecConfig) -> crate::Result<Self> {
        config.validate()?;
        let policy = config.parameter_policy();
        Ok(Self::with_policy(message, config.block_size, policy.as_ref())?)
    }

    fn build(
        message: &[u8],
        block_size: usize,
        block_count: u16,
        params: CodeParams,
    ) -> Result<Self, CodecError> {
        let design = Design::new(block_count, params.check_blocks, params.seed)?;
        let plan = SolvePlan::build(&design)?;
        let blocks = BlockStore::from_padded(message, block_size)?;
        let (intermediate, stats) = plan.solve(&blocks)?;

        info!(
            block_count,
            check_blocks = params.check_blocks,
            seed = params.seed,
            block_size,
            deferred = stats.deferred,
            ge_size = stats.ge_size,
            "encoder initialized"
        );

        Ok(Self {
            design,
            params,
            message: blocks,
            message_len: message.len(),
            intermediate,
            stats,
            next_id: 0,
        })
    }

    /// K: message block count.
    #[must_use]
    pub const fn block_count(&self) -> u16 {
        self.design.block_count()
    }

    /// M: dense check block count.
    #[must_use]
    pub const fn check_block_count(&self) -> u16 {
        self.design.check_blocks()
    }

    /// Bytes per block.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.message.block_size()
    }

    /// Unpadded message length.
    #[must_use]
    pub const fn message_len(&self) -> usize {
        self.message_len
    }

    /// Parameters in use; a decoder must be built with the same pair.
    #[must_use]
    pub const fn params(&self) -> CodeParams {
        self.params
    }

    /// Generator seed.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.params.seed
    }

    /// Solve statistics.
    #[must_use]
    pub const fn stats(&self) -> &SolveStats {
        &self.stats
    }

    /// The matrix design behind this session.
    #[must_use]
    pub const fn design(&self) -> &Design {
        &self.design
    }

    /// Intermediate block `slot` (`0..K+M`).
    #[must_use]
    pub fn intermediate_block(&self, slot: usize) -> Option<&[u8]> {
        (slot < self.intermediate.count()).then(|| self.intermediate.block(slot))
    }

    /// Slots whose XOR equals output `id`.
    #[must_use]
    pub fn row_equation(&self, id: u32) -> RowEquation {
        let row = self.design.row(id);
        RowEquation {
            id,
            peel: row.peel_columns().collect(),
            mix: row.mix_columns().collect(),
            block_count: self.design.block_count(),
        }
    }

    /// Output block `id`.
    #[must_use]
    pub fn generate(&self, id: u32) -> Vec<u8> {
        let mut out = vec![0u8; self.block_size()];
        self.generate_into(id, &mut out);
        out
    }

    /// Writes output block `id` into the first `block_size` bytes of `out`.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than the block size.
    pub fn generate_into(&self, id: u32, out: &mut [u8]) {
        let bs = self.block_size();
        assert!(out.len() >= bs, "output buffer smaller than block size");
        let out = &mut out[..bs];

        if id < u32::from(self.design.block_count()) {
            out.copy_from_slice(self.message.block(id as usize));
            return;
        }

        let k = usize::from(self.design.block_count());
        let row = self.design.row(id);
        let mut slots = row
            .peel_columns()
            .map(usize::from)
            .chain(row.mix_columns().map(|c| k + usize::from(c)));
        // Peel weight is at least one, so there is always a first slot.
        if let Some(first) = slots.next() {
            out.copy_from_slice(self.intermediate.block(first));
        }
        for slot in slots {
            xor_into(out, self.intermediate.block(slot));
        }
    }

    /// Id the next [`Encoder::next_block`] call will emit.
    #[must_use]
    pub const fn next_block_id(&self) -> u32 {
        self.next_id
    }

    /// Emits the block at the cursor and advances it.
    pub fn next_block(&mut self) -> Block {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        Block::new(id, self.generate(id))
    }

    /// Writes the wire frame of the block at the cursor, advancing it on success.
    pub fn write_next(&mut self, out: &mut [u8]) -> Result<usize, CodecError> {
        let id = self.next_id;
        if id > MAX_WIRE_ID {
            return Err(CodecError::BlockIdOutOfRange { id });
        }
        let len = WIRE_ID_BYTES + self.block_size();
        if out.len() < len {
            return Err(CodecError::malformed(format!(
                "output buffer holds {} bytes, frame needs {len}",
                out.len()
            )));
        }
        out[..WIRE_ID_BYTES].copy_from_slice(&id.to_le_bytes()[..WIRE_ID_BYTES]);
        self.generate_into(id, &mut out[WIRE_ID_BYTES..len]);
        self.next_id += 1;
        Ok(len)
    }
}

/// Creates an encoder session with the default parameter policy.
pub fn initialize_encoder(message: &[u8], block_size: usize) -> Result<Encoder, CodecError> {
    Encoder::new(message, block_size)
}

/// K for a message of `message_len` bytes.
pub(crate) fn block_count_for(message_len: usize, block_size: usize) -> Result<u16, CodecError> {
    if block_size == 0 {
        return Err(CodecError::invalid_params("block size must be non-zero"));
    }
    if message_len == 0 {
        return Err(CodecError::invalid_params("message is empty"));
    }
    let count = message_len.div_ceil(block_size);
    match u16::try_from(count) {
        Ok(k) if k <= MAX_BLOCK_COUNT => Ok(k),
        _ => Err(CodecError::invalid_params(format!(
            "{count} blocks exceeds the limit of {MAX_BLOCK_COUNT}"
        ))),
    }
}
