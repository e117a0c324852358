//! Tracing compatibility layer for structured logging.
//!
//! With the `tracing-integration` feature the `tracing` macros are re-exported
//! unchanged. Without it the same names expand to nothing, so the codec can log
//! freely with zero cost in default builds.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wirehair::tracing_compat::{debug, info};
//!
//! info!(block_count, seed, "encoder initialized");
//! debug!(ge_size, "elimination complete");
//! ```
//!
//! # Feature Flag
//!
//! ```toml
//! wirehair = { version = "0.1", features = ["tracing-integration"] }
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! No-op implementations when tracing is disabled.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;
