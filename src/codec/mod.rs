//! Wirehair-style erasure codec over GF(2).
//!
//! # Architecture
//!
//! ```text
//! message ──► K blocks
//!                │
//!   Design (K, M, seed) ──► row walks + dense rows
//!                │
//!   PeelOutcome ──► peel, avalanche, greedy deferral
//!                │
//!   Compression ──► compress (R x K) + GE (R x R), R = deferred + M
//!                │
//!   SolvePlan   ──► triangulate, then forward / diagonal / substitute
//!                │
//!   intermediate blocks (K + M) ──► Encoder::generate(id), any id
//! ```
//!
//! The encoder is systematic: ids below K reproduce the message blocks, and
//! every id (message or not) is the XOR of the intermediate blocks named by its
//! row design. [`Decoder`] inverts that relation from any sufficiently large set
//! of received blocks.

pub mod bits;
pub mod block;
pub mod compress;
pub mod decoder;
pub mod encoder;
pub mod generator;
pub mod params;
pub mod peel;
pub mod solver;
pub mod weight;
pub mod wire;

pub use block::{xor_into, BlockStore};
pub use decoder::{initialize_decoder, DecodeProgress, DecodeStats, Decoder};
pub use encoder::{initialize_encoder, Encoder, RowEquation};
pub use generator::{Design, RowDesign, MAX_BLOCK_COUNT, MAX_CHECK_BLOCKS};
pub use params::{
    default_check_blocks, CodeParams, FixedParams, ParameterPolicy, SimulatedParams, TableParams,
    DEFAULT_SEED_ATTEMPTS,
};
pub use solver::{SolvePlan, SolveStats};
pub use wire::{Block, MAX_WIRE_ID, WIRE_ID_BYTES};

/// Errors raised by the codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Block size, block count or check block count out of range.
    #[error("invalid parameters: {reason}")]
    InvalidParameters {
        /// What was wrong.
        reason: String,
    },
    /// A column gained more row references than the solver tracks.
    #[error("column {column} referenced by more than {limit} rows")]
    CapacityOverflow {
        /// Offending column.
        column: u16,
        /// Reference-list bound.
        limit: usize,
    },
    /// Gaussian elimination found no pivot.
    #[error("singular generator matrix: no pivot for column {pivot} of {size}")]
    SingularMatrix {
        /// Pivot position that failed.
        pivot: usize,
        /// Side of the GE matrix.
        size: usize,
    },
    /// The parameter search found no seed that yields a solvable matrix.
    #[error("no usable seed for {block_count} blocks after {attempts} attempts")]
    NoUsableSeed {
        /// K.
        block_count: u16,
        /// Seeds tried.
        attempts: u32,
    },
    /// A matrix or block buffer could not be allocated.
    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed {
        /// Requested size.
        bytes: usize,
    },
    /// The decoder does not yet have a full-rank system.
    #[error("insufficient blocks: rank {rank} of {needed}")]
    InsufficientBlocks {
        /// Current rank.
        rank: usize,
        /// Rank required (K + M).
        needed: usize,
    },
    /// A wire frame or payload had the wrong shape.
    #[error("malformed block: {reason}")]
    MalformedBlock {
        /// What was wrong.
        reason: String,
    },
    /// The id does not fit the 24-bit wire field.
    #[error("block id {id} does not fit the 24-bit wire field")]
    BlockIdOutOfRange {
        /// Offending id.
        id: u32,
    },
}

impl CodecError {
    pub(crate) fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedBlock {
            reason: reason.into(),
        }
    }

    /// True when a different seed or check block count may succeed.
    #[must_use]
    pub const fn is_parameter_failure(&self) -> bool {
        matches!(
            self,
            Self::CapacityOverflow { .. } | Self::SingularMatrix { .. }
        )
    }
}
