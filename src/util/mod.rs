//! Internal utilities.
//!
//! Kept dependency-free so that every generated matrix is reproducible from
//! its key alone.

pub mod det_rng;

pub use det_rng::{key_pair, splitmix64, DetRng};
