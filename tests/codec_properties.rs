//! Property-based tests for the codec.
//!
//! # Encoder
//! - Deterministic: two encoders over the same message agree on every id
//! - Systematic: ids below K return the message blocks, zero padded
//! - Idempotent: `generate` and `generate_into` agree and repeat exactly
//! - Every output block is the XOR of the intermediate blocks its row names
//!
//! # Decoder
//! - Any loss pattern is recovered once enough blocks arrive
//! - Rank is monotone and bounded by K + M
//! - Wire frames decode like direct feeds

#[macro_use]
mod common;

use common::*;
use proptest::prelude::*;
use wirehair::codec::{Block, DecodeProgress, Decoder, Encoder, MAX_WIRE_ID};

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Message length, block size and content seed for 2..=64 blocks.
fn arb_shape() -> impl Strategy<Value = (usize, usize, u64)> {
    (1usize..=32, 2usize..=64, any::<u64>()).prop_flat_map(|(block_size, blocks, seed)| {
        let min = (blocks - 1) * block_size + 1;
        let max = blocks * block_size;
        (min..=max, Just(block_size), Just(seed))
    })
}

fn arb_id() -> impl Strategy<Value = u32> {
    prop_oneof![0u32..256, 0u32..=MAX_WIRE_ID, Just(MAX_WIRE_ID)]
}

// ============================================================================
// Encoder properties
// ============================================================================

proptest! {
    #![proptest_config(test_proptest_config(64))]

    /// Two independently built encoders produce identical blocks.
    #[test]
    fn encoders_are_deterministic(shape in arb_shape(), id in arb_id()) {
        init_test_logging();
        let (len, block_size, seed) = shape;
        let message = make_message(len, seed);
        let a = Encoder::new(&message, block_size).unwrap();
        let b = Encoder::new(&message, block_size).unwrap();
        prop_assert_eq!(a.params(), b.params());
        prop_assert_eq!(a.generate(id), b.generate(id));
    }

    /// Message ids reproduce the message, with a zero-padded tail.
    #[test]
    fn message_ids_are_systematic(shape in arb_shape()) {
        init_test_logging();
        let (len, block_size, seed) = shape;
        let message = make_message(len, seed);
        let encoder = Encoder::new(&message, block_size).unwrap();
        let k = usize::from(encoder.block_count());
        prop_assert_eq!(k, len.div_ceil(block_size));

        let mut joined = Vec::with_capacity(k * block_size);
        for id in 0..k as u32 {
            let block = encoder.generate(id);
            prop_assert_eq!(block.len(), block_size);
            joined.extend_from_slice(&block);
        }
        prop_assert_eq!(&joined[..len], message.as_slice());
        prop_assert!(joined[len..].iter().all(|&b| b == 0));
    }

    /// `generate` is a pure function of the id.
    #[test]
    fn generate_is_idempotent(shape in arb_shape(), id in arb_id()) {
        init_test_logging();
        let (len, block_size, seed) = shape;
        let message = make_message(len, seed);
        let encoder = Encoder::new(&message, block_size).unwrap();

        let first = encoder.generate(id);
        let mut into = vec![0xA5; block_size];
        encoder.generate_into(id, &mut into);
        prop_assert_eq!(&first, &into);
        prop_assert_eq!(first, encoder.generate(id));
    }

    /// Each block equals the XOR of the intermediate blocks its row names.
    #[test]
    fn blocks_satisfy_row_equations(shape in arb_shape(), ids in prop::collection::vec(arb_id(), 1..8)) {
        init_test_logging();
        let (len, block_size, seed) = shape;
        let message = make_message(len, seed);
        let encoder = Encoder::new(&message, block_size).unwrap();
        let k = encoder.block_count();
        let m = encoder.check_block_count();

        for id in ids {
            let eq = encoder.row_equation(id);
            prop_assert!(!eq.peel.is_empty());
            prop_assert!(!eq.mix.is_empty());
            prop_assert!(eq.peel.iter().all(|&c| c < k));
            prop_assert!(eq.mix.iter().all(|&c| c < m));
            prop_assert_eq!(evaluate(&encoder, &eq), encoder.generate(id), "id {}", id);
        }
    }
}

// ============================================================================
// Decoder properties
// ============================================================================

proptest! {
    #![proptest_config(test_proptest_config(48))]

    /// Survivors plus repair blocks recover the message. Lost message blocks
    /// are fed last, which guarantees full rank even if repairs fall short.
    #[test]
    fn decoder_recovers_any_loss_pattern(
        shape in arb_shape(),
        loss in prop::collection::vec(any::<bool>(), 64),
        repairs in 0u32..48,
    ) {
        init_test_logging();
        let (len, block_size, seed) = shape;
        let message = make_message(len, seed);
        let encoder = Encoder::new(&message, block_size).unwrap();
        let k = u32::from(encoder.block_count());
        let mut decoder = Decoder::new(len, block_size).unwrap();
        prop_assert_eq!(decoder.params(), encoder.params());

        let lost: Vec<u32> = (0..k).filter(|&id| loss[id as usize]).collect();
        let schedule = (0..k)
            .filter(|&id| !loss[id as usize])
            .chain(k..k + repairs)
            .chain(lost.iter().copied());

        let mut last_rank = 0;
        let mut progress = DecodeProgress::NeedMore { rank: 0, needed: decoder.needed() };
        for id in schedule {
            progress = decoder.feed(id, &encoder.generate(id)).unwrap();
            let rank = decoder.stats().rank;
            prop_assert!(rank >= last_rank);
            prop_assert!(rank <= decoder.needed());
            last_rank = rank;
            if progress == DecodeProgress::Ready {
                break;
            }
        }
        prop_assert_eq!(progress, DecodeProgress::Ready);
        prop_assert_eq!(decoder.reconstruct().unwrap(), message);
    }

    /// Feeding wire frames is equivalent to feeding `(id, payload)` pairs.
    #[test]
    fn wire_frames_match_direct_feeds(shape in arb_shape(), start in 0u32..16) {
        init_test_logging();
        let (len, block_size, seed) = shape;
        let message = make_message(len, seed);
        let encoder = Encoder::new(&message, block_size).unwrap();
        let mut direct = Decoder::new(len, block_size).unwrap();
        let mut framed = Decoder::new(len, block_size).unwrap();

        let k = u32::from(encoder.block_count());
        let schedule = (start..start + 2 * k + 16).chain(0..start);
        for id in schedule {
            let payload = encoder.generate(id);
            let frame = Block::new(id, payload.clone()).to_wire().unwrap();
            let a = direct.feed(id, &payload).unwrap();
            let b = framed.feed_wire(&frame).unwrap();
            prop_assert_eq!(a, b);
            if a == DecodeProgress::Ready {
                break;
            }
        }
        prop_assert!(direct.is_ready());
        prop_assert_eq!(direct.stats(), framed.stats());
        prop_assert_eq!(framed.reconstruct().unwrap(), message);
    }
}
