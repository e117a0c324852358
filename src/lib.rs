//! Wirehair: a systematic fountain code over GF(2).
//!
//! # Overview
//!
//! A message is split into K equal blocks. The encoder emits the K blocks
//! unchanged, followed by any number of extra blocks, each the XOR of a small
//! pseudo-random set of intermediate blocks. A receiver that collects roughly K
//! of them, in any mix, can rebuild the message.
//!
//! The expensive part is a one-time precomputation per message: a sparse
//! generator matrix is solved mostly by peeling, with the residue handed to
//! dense Gaussian elimination. After that, generating a block is a handful of
//! XORs.
//!
//! # Module Structure
//!
//! - [`codec`]: matrix design, solver, encoder, decoder, wire format
//! - [`config`]: layered codec configuration
//! - [`error`]: crate error type and classification
//! - [`tracing_compat`]: optional structured logging
//! - [`util`]: deterministic PRNG
//!
//! # Example
//!
//! ```
//! use wirehair::codec::{DecodeProgress, Decoder, Encoder};
//!
//! let message: Vec<u8> = (0..1000u32).map(|i| (i * 7) as u8).collect();
//! let encoder = Encoder::new(&message, 100)?;
//! let mut decoder = Decoder::new(message.len(), 100)?;
//!
//! // Lose block 3; keep feeding until the decoder has enough.
//! let mut id = 0;
//! loop {
//!     if id != 3 && decoder.feed(id, &encoder.generate(id))? == DecodeProgress::Ready {
//!         break;
//!     }
//!     id += 1;
//! }
//! assert_eq!(decoder.reconstruct()?, message);
//! # Ok::<(), wirehair::codec::CodecError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod codec;
pub mod config;
pub mod error;
pub mod tracing_compat;
pub mod util;

#[cfg(test)]
pub(crate) mod test_utils;

pub use codec::{
    initialize_decoder, initialize_encoder, Block, CodeParams, CodecError, DecodeProgress,
    Decoder, Encoder, ParameterPolicy,
};
pub use config::{CodecConfig, CodecProfile, ConfigError, ConfigLoader};
pub use error::{Error, ErrorCategory, ErrorKind, Recoverability, Result, ResultExt};
