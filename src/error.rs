//! Error types and error handling strategy for Wirehair.
//!
//! The codec reports failures as [`CodecError`](crate::codec::CodecError) and
//! configuration as [`ConfigError`](crate::config::ConfigError). Both convert
//! into the crate-level [`Error`], which adds a classification:
//!
//! - **Parameters**: the message or block size cannot be encoded at all
//! - **Precompute**: the chosen `(M, seed)` produced an unusable matrix
//! - **Decoding**: the decoder has not yet received enough blocks
//! - **Wire**: a frame or id does not fit the wire layout
//! - **Config**: configuration could not be read or failed validation
//!
//! # Recovery Classification
//!
//! All errors can be classified by [`Recoverability`]:
//! - `Permanent`: retrying with the same input fails the same way
//! - `Reparameterize`: a different seed or check block count may succeed
//! - `NeedMoreData`: feed more blocks and try again

use core::fmt;
use std::sync::Arc;

use crate::codec::CodecError;
use crate::config::ConfigError;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Parameters ===
    /// Block size, block count or check block count out of range.
    InvalidParameters,

    // === Precompute ===
    /// A column exceeded its row-reference capacity.
    CapacityOverflow,
    /// The GE matrix is singular for this seed.
    SingularMatrix,
    /// Seed search was exhausted.
    NoUsableSeed,
    /// Matrix or block storage could not be allocated.
    AllocationFailed,

    // === Decoding ===
    /// Not enough independent blocks yet.
    InsufficientBlocks,

    // === Wire ===
    /// Frame or payload of the wrong shape.
    MalformedBlock,
    /// Id does not fit the 24-bit wire field.
    BlockIdOutOfRange,

    // === Config ===
    /// Configuration could not be loaded or is invalid.
    Config,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidParameters => ErrorCategory::Parameters,
            Self::CapacityOverflow
            | Self::SingularMatrix
            | Self::NoUsableSeed
            | Self::AllocationFailed => ErrorCategory::Precompute,
            Self::InsufficientBlocks => ErrorCategory::Decoding,
            Self::MalformedBlock | Self::BlockIdOutOfRange => ErrorCategory::Wire,
            Self::Config => ErrorCategory::Config,
        }
    }

    /// Returns the recoverability classification for this error kind.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        match self {
            Self::CapacityOverflow | Self::SingularMatrix | Self::NoUsableSeed => {
                Recoverability::Reparameterize
            }
            Self::InsufficientBlocks => Recoverability::NeedMoreData,
            Self::InvalidParameters
            | Self::AllocationFailed
            | Self::MalformedBlock
            | Self::BlockIdOutOfRange
            | Self::Config => Recoverability::Permanent,
        }
    }
}

/// Classification of error recoverability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recoverability {
    /// Retrying with the same input cannot succeed.
    Permanent,
    /// A different `(M, seed)` may succeed.
    Reparameterize,
    /// More received blocks may succeed.
    NeedMoreData,
}

impl Recoverability {
    /// Returns true if this error should never be retried.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent)
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Input shape failures.
    Parameters,
    /// Encoder precomputation failures.
    Precompute,
    /// Decoder failures.
    Decoding,
    /// Wire format failures.
    Wire,
    /// Configuration failures.
    Config,
}

/// The main error type for Wirehair operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Adds a message to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the recoverability classification.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        self.kind.recoverability()
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// True if the decoder needs more blocks.
    #[must_use]
    pub const fn needs_more_data(&self) -> bool {
        matches!(self.kind.recoverability(), Recoverability::NeedMoreData)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        let kind = match &e {
            CodecError::InvalidParameters { .. } => ErrorKind::InvalidParameters,
            CodecError::CapacityOverflow { .. } => ErrorKind::CapacityOverflow,
            CodecError::SingularMatrix { .. } => ErrorKind::SingularMatrix,
            CodecError::NoUsableSeed { .. } => ErrorKind::NoUsableSeed,
            CodecError::AllocationFailed { .. } => ErrorKind::AllocationFailed,
            CodecError::InsufficientBlocks { .. } => ErrorKind::InsufficientBlocks,
            CodecError::MalformedBlock { .. } => ErrorKind::MalformedBlock,
            CodecError::BlockIdOutOfRange { .. } => ErrorKind::BlockIdOutOfRange,
        };
        Self::new(kind).with_message(e.to_string()).with_source(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::new(ErrorKind::Config)
            .with_message(e.to_string())
            .with_source(e)
    }
}

/// Extension trait for adding context to Results.
#[allow(clippy::result_large_err)]
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for Wirehair operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
