//! Test utilities for Wirehair.
//!
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Deterministic message builders

use std::sync::Once;

use tracing_subscriber::fmt::format::FmtSpan;

use crate::util::DetRng;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// `len` pseudo-random bytes, reproducible from `seed`.
#[must_use]
pub fn pattern_message(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = DetRng::new(seed);
    (0..len).map(|_| (rng.next_u32() >> 24) as u8).collect()
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_messages_are_reproducible() {
        init_test_logging();
        crate::test_section!("pattern_messages_are_reproducible");
        assert_eq!(pattern_message(64, 3), pattern_message(64, 3));
        assert_ne!(pattern_message(64, 3), pattern_message(64, 4));
        assert_eq!(pattern_message(0, 1), Vec::<u8>::new());
    }
}
