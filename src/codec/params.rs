//! Parameter selection: check block count and generator seed per block count.
//!
//! Roughly three seeds in four produce a singular GE matrix for any given
//! `(K, M)`, so usable parameters have to be found by simulation. The solver
//! itself never retries; a [`ParameterPolicy`] decides which `(M, seed)` a
//! session uses.
//!
//! - [`FixedParams`]: a constant choice, no search.
//! - [`SimulatedParams`]: runs the data-free structural solve for seeds
//!   `0, 1, 2, ...` and memoizes the first one that works.
//! - [`TableParams`]: a lookup table, typically exported from a simulation run.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::generator::Design;
use super::solver::SolvePlan;
use super::CodecError;
use crate::tracing_compat::{debug, trace};

/// Default number of seeds tried per block count.
pub const DEFAULT_SEED_ATTEMPTS: u32 = 256;

/// Check block count and generator seed for one block count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeParams {
    /// M: dense check columns.
    pub check_blocks: u16,
    /// Generator seed.
    pub seed: u32,
}

impl CodeParams {
    /// Creates a parameter pair.
    #[must_use]
    pub const fn new(check_blocks: u16, seed: u32) -> Self {
        Self { check_blocks, seed }
    }
}

/// Default M for K blocks: `max(2, ceil(sqrt(K)), ceil(K / 64))`.
///
/// Peeling defers a little over one row in a hundred once K reaches the
/// thousands. The GE system is only full rank when M keeps up with the
/// deferred count, which `sqrt(K)` stops doing above K = 4096.
#[must_use]
pub fn default_check_blocks(block_count: u16) -> u16 {
    let k = u32::from(block_count);
    let mut root = 0u32;
    while root * root < k {
        root += 1;
    }
    let linear = k.div_ceil(64);
    (root.max(linear) as u16).max(2)
}

/// Chooses code parameters for a block count.
pub trait ParameterPolicy: Send + Sync {
    /// Returns the parameters to use for `block_count` message blocks.
    fn select(&self, block_count: u16) -> Result<CodeParams, CodecError>;
}

impl<P: ParameterPolicy + ?Sized> ParameterPolicy for &P {
    fn select(&self, block_count: u16) -> Result<CodeParams, CodecError> {
        (**self).select(block_count)
    }
}

impl<P: ParameterPolicy + ?Sized> ParameterPolicy for Box<P> {
    fn select(&self, block_count: u16) -> Result<CodeParams, CodecError> {
        (**self).select(block_count)
    }
}

// ============================================================================
// Fixed
// ============================================================================

/// Always returns the same seed; M is fixed or derived from K.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedParams {
    check_blocks: Option<u16>,
    seed: u32,
}

impl FixedParams {
    /// Fixed M and seed.
    #[must_use]
    pub const fn new(params: CodeParams) -> Self {
        Self {
            check_blocks: Some(params.check_blocks),
            seed: params.seed,
        }
    }

    /// Fixed seed with the default M for each K.
    #[must_use]
    pub const fn seed_only(seed: u32) -> Self {
        Self {
            check_blocks: None,
            seed,
        }
    }

    /// Two check blocks, seed 0, for every block count.
    #[must_use]
    pub const fn placeholder() -> Self {
        Self::new(CodeParams::new(2, 0))
    }
}

impl ParameterPolicy for FixedParams {
    fn select(&self, block_count: u16) -> Result<CodeParams, CodecError> {
        Ok(CodeParams {
            check_blocks: self
                .check_blocks
                .unwrap_or_else(|| default_check_blocks(block_count)),
            seed: self.seed,
        })
    }
}

// ============================================================================
// Simulated
// ============================================================================

/// Finds working seeds by running the structural solve, memoizing results.
#[derive(Debug)]
pub struct SimulatedParams {
    check_blocks: Option<u16>,
    max_attempts: u32,
    cache: Mutex<BTreeMap<u16, CodeParams>>,
}

impl SimulatedParams {
    /// Default M per K, [`DEFAULT_SEED_ATTEMPTS`] seeds per K.
    #[must_use]
    pub fn new() -> Self {
        Self {
            check_blocks: None,
            max_attempts: DEFAULT_SEED_ATTEMPTS,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Process-wide instance with default settings.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<SimulatedParams> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Uses a fixed M instead of the default for each K.
    #[must_use]
    pub fn with_check_blocks(mut self, check_blocks: u16) -> Self {
        self.check_blocks = Some(check_blocks);
        self
    }

    /// Caps the number of seeds tried per K.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Searches seeds without consulting or filling the cache.
    pub fn search(&self, block_count: u16) -> Result<CodeParams, CodecError> {
        let check_blocks = self
            .check_blocks
            .unwrap_or_else(|| default_check_blocks(block_count));

        for seed in 0..self.max_attempts {
            let design = Design::new(block_count, check_blocks, seed)?;
            match SolvePlan::build(&design) {
                Ok(_) => {
                    debug!(block_count, check_blocks, seed, "seed search succeeded");
                    return Ok(CodeParams { check_blocks, seed });
                }
                Err(err) if err.is_parameter_failure() => {
                    trace!(block_count, seed, error = %err, "seed rejected");
                }
                Err(err) => return Err(err),
            }
        }
        Err(CodecError::NoUsableSeed {
            block_count,
            attempts: self.max_attempts,
        })
    }

    /// Number of memoized block counts.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }

    /// Snapshot of the memoized results as a [`TableParams`]-compatible JSON array.
    pub fn export_table(&self) -> Result<String, serde_json::Error> {
        let entries: Vec<TableEntry> = self
            .cache
            .lock()
            .iter()
            .map(|(&block_count, params)| TableEntry {
                block_count,
                check_blocks: params.check_blocks,
                seed: params.seed,
            })
            .collect();
        serde_json::to_string_pretty(&entries)
    }
}

impl Default for SimulatedParams {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterPolicy for SimulatedParams {
    fn select(&self, block_count: u16) -> Result<CodeParams, CodecError> {
        if let Some(params) = self.cache.lock().get(&block_count) {
            return Ok(*params);
        }
        // Searched without the lock held; a racing duplicate search finds the same seed.
        let params = self.search(block_count)?;
        self.cache.lock().insert(block_count, params);
        Ok(params)
    }
}

// ============================================================================
// Table
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct TableEntry {
    block_count: u16,
    check_blocks: u16,
    seed: u32,
}

/// Lookup table of known-good parameters with a fallback policy.
pub struct TableParams {
    table: BTreeMap<u16, CodeParams>,
    fallback: Box<dyn ParameterPolicy>,
}

impl TableParams {
    /// Empty table delegating every lookup to `fallback`.
    #[must_use]
    pub fn new(fallback: Box<dyn ParameterPolicy>) -> Self {
        Self {
            table: BTreeMap::new(),
            fallback,
        }
    }

    /// Parses a JSON array of `{block_count, check_blocks, seed}` entries.
    pub fn from_json(json: &str, fallback: Box<dyn ParameterPolicy>) -> Result<Self, CodecError> {
        let entries: Vec<TableEntry> = serde_json::from_str(json)
            .map_err(|err| CodecError::invalid_params(format!("parameter table: {err}")))?;
        let mut this = Self::new(fallback);
        for entry in entries {
            this.insert(entry.block_count, CodeParams::new(entry.check_blocks, entry.seed));
        }
        Ok(this)
    }

    /// Adds or replaces the entry for `block_count`.
    pub fn insert(&mut self, block_count: u16, params: CodeParams) {
        self.table.insert(block_count, params);
    }

    /// Number of table entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl std::fmt::Debug for TableParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableParams")
            .field("entries", &self.table.len())
            .finish_non_exhaustive()
    }
}

impl ParameterPolicy for TableParams {
    fn select(&self, block_count: u16) -> Result<CodeParams, CodecError> {
        match self.table.get(&block_count) {
            Some(params) => Ok(*params),
            None => self.fallback.select(block_count),
        }
    }
}
